//! Structured documents exchanged between pipeline stages.
//!
//! Each stage output is requested from the generation service with the
//! schema returned by [`StructuredOutput::response_schema`] and checked
//! against the limits below before it is accepted.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validation::{
    array, date, integer, nullable_string, number, object, string, string_array,
    StructuredOutput, ValidationError, Violations,
};

/// Minimum brief length accepted by the parser stage
pub const MIN_BRIEF_CHARS: usize = 10;

/// Maximum brief length accepted by the parser stage
pub const MAX_BRIEF_CHARS: usize = 50_000;

const MAX_SOURCE_NAME_CHARS: usize = 255;

/// Bundled metrics dataset for the report stage
const SAMPLE_METRICS: &str = include_str!("../../data/sample_metrics.json");

// ============================================================================
// Brief parsing
// ============================================================================

/// Raw brief text handed to the first stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefParserInput {
    pub raw_text: String,
    pub source_name: Option<String>,
}

impl BriefParserInput {
    /// Trim and validate raw input
    pub fn new(raw_text: &str, source_name: Option<&str>) -> Result<Self, ValidationError> {
        let raw_text = raw_text.trim().to_string();
        let source_name = source_name.map(|s| s.trim().to_string());

        let mut v = Violations::default();
        let len = raw_text.chars().count();
        if len < MIN_BRIEF_CHARS {
            return Err(ValidationError::single(
                "BriefParserInput",
                format!("raw_text: length {} below minimum {}", len, MIN_BRIEF_CHARS),
            ));
        }
        v.max_len("raw_text", &raw_text, MAX_BRIEF_CHARS);

        if let Some(ref name) = source_name {
            v.max_len("source_name", name, MAX_SOURCE_NAME_CHARS);
            if !is_safe_source_name(name) {
                return Err(ValidationError::single(
                    "BriefParserInput",
                    format!("source_name: '{}' contains disallowed characters", name),
                ));
            }
        }

        v.into_result("BriefParserInput")?;
        Ok(Self {
            raw_text,
            source_name,
        })
    }
}

/// Source names are bare file names: `[A-Za-z0-9_.-]+`, no path separators
fn is_safe_source_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefParserOutput {
    pub campaign_name: String,
    pub client_name: String,
    pub objectives: Vec<String>,
    pub target_audience: String,
    #[serde(default)]
    pub budget: Option<String>,
    pub timeline: String,
    pub kpis: Vec<String>,
    pub channels: Vec<String>,
    pub key_messages: Vec<String>,
    pub constraints: Vec<String>,
    pub raw_summary: String,
    #[serde(default)]
    pub missing_fields: Vec<String>,
}

impl StructuredOutput for BriefParserOutput {
    const SHAPE: &'static str = "BriefParserOutput";

    fn response_schema() -> Value {
        object(
            &[
                ("campaign_name", string()),
                ("client_name", string()),
                ("objectives", string_array()),
                ("target_audience", string()),
                ("budget", nullable_string()),
                ("timeline", string()),
                ("kpis", string_array()),
                ("channels", string_array()),
                ("key_messages", string_array()),
                ("constraints", string_array()),
                ("raw_summary", string()),
                ("missing_fields", string_array()),
            ],
            &["budget", "missing_fields"],
        )
    }

    fn validate(&self, v: &mut Violations) {
        v.max_len("campaign_name", &self.campaign_name, 200);
        v.max_len("client_name", &self.client_name, 200);
        v.string_list("objectives", &self.objectives, 10, 500);
        v.max_len("target_audience", &self.target_audience, 2000);
        v.max_len_opt("budget", self.budget.as_deref(), 200);
        v.max_len("timeline", &self.timeline, 500);
        v.string_list("kpis", &self.kpis, 10, 500);
        v.string_list("channels", &self.channels, 10, 100);
        v.string_list("key_messages", &self.key_messages, 10, 500);
        v.string_list("constraints", &self.constraints, 10, 500);
        v.max_len("raw_summary", &self.raw_summary, 1000);
        v.string_list("missing_fields", &self.missing_fields, 10, 100);
    }
}

// ============================================================================
// Audience research
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub age_range: String,
    pub description: String,
    pub motivations: Vec<String>,
    pub pain_points: Vec<String>,
    pub preferred_channels: Vec<String>,
    pub content_preferences: Vec<String>,
}

impl Persona {
    fn schema() -> Value {
        object(
            &[
                ("name", string()),
                ("age_range", string()),
                ("description", string()),
                ("motivations", string_array()),
                ("pain_points", string_array()),
                ("preferred_channels", string_array()),
                ("content_preferences", string_array()),
            ],
            &[],
        )
    }

    fn validate(&self, v: &mut Violations) {
        v.max_len("name", &self.name, 100);
        v.max_len("age_range", &self.age_range, 20);
        v.max_len("description", &self.description, 500);
        v.string_list("motivations", &self.motivations, 10, 300);
        v.string_list("pain_points", &self.pain_points, 10, 300);
        v.string_list("preferred_channels", &self.preferred_channels, 10, 100);
        v.string_list("content_preferences", &self.content_preferences, 10, 100);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudienceOutput {
    pub personas: Vec<Persona>,
    pub targeting_recommendations: Vec<String>,
    pub audience_size_estimate: String,
    pub key_insights: Vec<String>,
    pub suggested_tone: String,
}

impl StructuredOutput for AudienceOutput {
    const SHAPE: &'static str = "AudienceOutput";

    fn response_schema() -> Value {
        object(
            &[
                ("personas", array(Persona::schema())),
                ("targeting_recommendations", string_array()),
                ("audience_size_estimate", string()),
                ("key_insights", string_array()),
                ("suggested_tone", string()),
            ],
            &[],
        )
    }

    fn validate(&self, v: &mut Violations) {
        v.max_items("personas", &self.personas, 5);
        for (i, persona) in self.personas.iter().enumerate() {
            v.nested(&format!("personas[{}]", i), |inner| persona.validate(inner));
        }
        v.string_list("targeting_recommendations", &self.targeting_recommendations, 10, 500);
        v.max_len("audience_size_estimate", &self.audience_size_estimate, 200);
        v.string_list("key_insights", &self.key_insights, 10, 500);
        v.max_len("suggested_tone", &self.suggested_tone, 200);
    }
}

// ============================================================================
// Content calendar
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub week: u32,
    pub day: String,
    pub channel: String,
    pub content_type: String,
    pub topic: String,
    pub caption_hook: String,
    pub hashtags: Vec<String>,
    pub notes: String,
}

impl CalendarEntry {
    fn schema() -> Value {
        object(
            &[
                ("week", integer()),
                ("day", string()),
                ("channel", string()),
                ("content_type", string()),
                ("topic", string()),
                ("caption_hook", string()),
                ("hashtags", string_array()),
                ("notes", string()),
            ],
            &[],
        )
    }

    fn validate(&self, v: &mut Violations) {
        v.range("week", self.week, 1, 52);
        v.max_len("day", &self.day, 20);
        v.max_len("channel", &self.channel, 50);
        v.max_len("content_type", &self.content_type, 50);
        v.max_len("topic", &self.topic, 200);
        v.max_len("caption_hook", &self.caption_hook, 500);
        v.string_list("hashtags", &self.hashtags, 10, 100);
        v.max_len("notes", &self.notes, 500);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStrategy {
    pub channel: String,
    pub strategy: String,
}

impl ChannelStrategy {
    fn schema() -> Value {
        object(&[("channel", string()), ("strategy", string())], &[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarOutput {
    pub campaign_duration: String,
    pub posting_frequency: String,
    pub entries: Vec<CalendarEntry>,
    pub channel_strategies: Vec<ChannelStrategy>,
    pub content_mix_rationale: String,
}

impl StructuredOutput for CalendarOutput {
    const SHAPE: &'static str = "CalendarOutput";

    fn response_schema() -> Value {
        object(
            &[
                ("campaign_duration", string()),
                ("posting_frequency", string()),
                ("entries", array(CalendarEntry::schema())),
                ("channel_strategies", array(ChannelStrategy::schema())),
                ("content_mix_rationale", string()),
            ],
            &[],
        )
    }

    fn validate(&self, v: &mut Violations) {
        v.max_len("campaign_duration", &self.campaign_duration, 100);
        v.max_len("posting_frequency", &self.posting_frequency, 100);
        v.max_items("entries", &self.entries, 100);
        for (i, entry) in self.entries.iter().enumerate() {
            v.nested(&format!("entries[{}]", i), |inner| entry.validate(inner));
        }
        v.max_items("channel_strategies", &self.channel_strategies, 10);
        for (i, cs) in self.channel_strategies.iter().enumerate() {
            v.nested(&format!("channel_strategies[{}]", i), |inner| {
                inner.max_len("channel", &cs.channel, 50);
                inner.max_len("strategy", &cs.strategy, 500);
            });
        }
        v.max_len("content_mix_rationale", &self.content_mix_rationale, 1000);
    }
}

/// Condensed calendar handed to the creative brief stage.
///
/// Individual entries are dropped to keep the request small.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarSummary {
    pub campaign_duration: String,
    pub posting_frequency: String,
    pub channel_strategies: Vec<ChannelStrategy>,
    pub content_mix_rationale: String,
}

impl From<&CalendarOutput> for CalendarSummary {
    fn from(calendar: &CalendarOutput) -> Self {
        Self {
            campaign_duration: calendar.campaign_duration.clone(),
            posting_frequency: calendar.posting_frequency.clone(),
            channel_strategies: calendar.channel_strategies.clone(),
            content_mix_rationale: calendar.content_mix_rationale.clone(),
        }
    }
}

// ============================================================================
// Creative brief
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreativeBriefInput {
    pub brief_data: BriefParserOutput,
    pub audience_data: AudienceOutput,
    pub calendar_summary: CalendarSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeBriefOutput {
    pub project_name: String,
    pub prepared_for: String,
    pub date: NaiveDate,
    pub background: String,
    pub objective: String,
    pub target_audience_summary: String,
    pub key_message: String,
    pub supporting_messages: Vec<String>,
    pub tone_and_voice: String,
    pub visual_direction: String,
    pub deliverables: Vec<String>,
    pub timeline_summary: String,
    pub success_metrics: Vec<String>,
    pub mandatory_inclusions: Vec<String>,
}

impl StructuredOutput for CreativeBriefOutput {
    const SHAPE: &'static str = "CreativeBriefOutput";

    fn response_schema() -> Value {
        object(
            &[
                ("project_name", string()),
                ("prepared_for", string()),
                ("date", date()),
                ("background", string()),
                ("objective", string()),
                ("target_audience_summary", string()),
                ("key_message", string()),
                ("supporting_messages", string_array()),
                ("tone_and_voice", string()),
                ("visual_direction", string()),
                ("deliverables", string_array()),
                ("timeline_summary", string()),
                ("success_metrics", string_array()),
                ("mandatory_inclusions", string_array()),
            ],
            &[],
        )
    }

    fn validate(&self, v: &mut Violations) {
        v.max_len("project_name", &self.project_name, 200);
        v.max_len("prepared_for", &self.prepared_for, 200);
        v.max_len("background", &self.background, 2000);
        v.max_len("objective", &self.objective, 1000);
        v.max_len("target_audience_summary", &self.target_audience_summary, 1000);
        v.max_len("key_message", &self.key_message, 500);
        v.string_list("supporting_messages", &self.supporting_messages, 10, 500);
        v.max_len("tone_and_voice", &self.tone_and_voice, 500);
        v.max_len("visual_direction", &self.visual_direction, 1000);
        v.string_list("deliverables", &self.deliverables, 20, 300);
        v.max_len("timeline_summary", &self.timeline_summary, 500);
        v.string_list("success_metrics", &self.success_metrics, 10, 300);
        v.string_list("mandatory_inclusions", &self.mandatory_inclusions, 10, 300);
    }
}

// ============================================================================
// Performance report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetrics {
    pub channel: String,
    pub impressions: u64,
    pub reach: u64,
    pub engagement_rate: f64,
    pub clicks: u64,
    pub conversions: u64,
    pub spend: f64,
}

/// Metrics dataset consumed by the report stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceInput {
    pub campaign_name: String,
    pub reporting_period: String,
    pub channel_metrics: Vec<ChannelMetrics>,
    pub goals: Vec<String>,
}

impl PerformanceInput {
    /// The dataset shipped with the binary
    pub fn bundled() -> Result<Self> {
        Self::from_json(SAMPLE_METRICS).context("Bundled sample metrics are invalid")
    }

    /// Load a dataset from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read metrics file: {}", path.display()))?;

        Self::from_json(&content)
            .with_context(|| format!("Invalid metrics file: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let input: Self = serde_json::from_str(content).context("Failed to parse metrics JSON")?;

        let mut v = Violations::default();
        input.validate(&mut v);
        v.into_result("PerformanceInput")?;

        Ok(input)
    }

    pub fn validate(&self, v: &mut Violations) {
        const COUNT_MAX: u64 = 10_000_000_000;

        v.max_len("campaign_name", &self.campaign_name, 200);
        v.max_len("reporting_period", &self.reporting_period, 100);
        v.max_items("channel_metrics", &self.channel_metrics, 20);
        for (i, m) in self.channel_metrics.iter().enumerate() {
            v.nested(&format!("channel_metrics[{}]", i), |inner| {
                inner.max_len("channel", &m.channel, 50);
                inner.range("impressions", m.impressions, 0, COUNT_MAX);
                inner.range("reach", m.reach, 0, COUNT_MAX);
                inner.range("engagement_rate", m.engagement_rate, 0.0, 100.0);
                inner.range("clicks", m.clicks, 0, COUNT_MAX);
                inner.range("conversions", m.conversions, 0, COUNT_MAX);
                inner.range("spend", m.spend, 0.0, 100_000_000.0);
            });
        }
        v.string_list("goals", &self.goals, 10, 300);
    }

    /// Total spend across all channels
    pub fn total_spend(&self) -> f64 {
        self.channel_metrics.iter().map(|m| m.spend).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAnalysis {
    pub channel: String,
    pub performance_rating: String,
    pub key_metric: String,
    pub insight: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric_name: String,
    pub value: String,
    pub trend: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceOutput {
    pub executive_summary: String,
    pub overall_performance: String,
    pub channel_analysis: Vec<ChannelAnalysis>,
    pub top_performing_content: Vec<String>,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
    pub key_metrics_summary: Vec<MetricSummary>,
}

impl StructuredOutput for PerformanceOutput {
    const SHAPE: &'static str = "PerformanceOutput";

    fn response_schema() -> Value {
        let analysis = object(
            &[
                ("channel", string()),
                ("performance_rating", string()),
                ("key_metric", string()),
                ("insight", string()),
                ("recommendation", string()),
            ],
            &[],
        );
        let metric = object(
            &[("metric_name", string()), ("value", string()), ("trend", string())],
            &[],
        );

        object(
            &[
                ("executive_summary", string()),
                ("overall_performance", string()),
                ("channel_analysis", array(analysis)),
                ("top_performing_content", string_array()),
                ("recommendations", string_array()),
                ("next_steps", string_array()),
                ("key_metrics_summary", array(metric)),
            ],
            &[],
        )
    }

    fn validate(&self, v: &mut Violations) {
        v.max_len("executive_summary", &self.executive_summary, 2000);
        v.max_len("overall_performance", &self.overall_performance, 50);
        v.max_items("channel_analysis", &self.channel_analysis, 20);
        for (i, a) in self.channel_analysis.iter().enumerate() {
            v.nested(&format!("channel_analysis[{}]", i), |inner| {
                inner.max_len("channel", &a.channel, 50);
                inner.max_len("performance_rating", &a.performance_rating, 50);
                inner.max_len("key_metric", &a.key_metric, 200);
                inner.max_len("insight", &a.insight, 500);
                inner.max_len("recommendation", &a.recommendation, 500);
            });
        }
        v.string_list("top_performing_content", &self.top_performing_content, 10, 300);
        v.string_list("recommendations", &self.recommendations, 10, 500);
        v.string_list("next_steps", &self.next_steps, 10, 500);
        v.max_items("key_metrics_summary", &self.key_metrics_summary, 20);
        for (i, m) in self.key_metrics_summary.iter().enumerate() {
            v.nested(&format!("key_metrics_summary[{}]", i), |inner| {
                inner.max_len("metric_name", &m.metric_name, 100);
                inner.max_len("value", &m.value, 100);
                inner.max_len("trend", &m.trend, 50);
            });
        }
    }
}
