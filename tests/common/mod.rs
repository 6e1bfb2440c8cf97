//! Shared test doubles and fixtures for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use agencyflow::adapters::{GenerationClient, GenerationRequest, ServiceError};
use agencyflow::core::{Orchestrator, RateLimiter, ResilientCaller, RetryPolicy};
use agencyflow::domain::PerformanceInput;

pub const BRIEF: &str = "Lumen Skincare wants to launch Summer Glow, a mineral sunscreen line, \
to women aged 25-40 over six weeks on Instagram and TikTok with a $50,000 budget.";

pub const BRIEF_JSON: &str = r##"{
  "campaign_name": "Summer Glow Launch",
  "client_name": "Lumen Skincare",
  "objectives": ["Drive awareness of the mineral sunscreen line", "Generate 2,000 online sales"],
  "target_audience": "Women aged 25-40 who care about clean beauty",
  "budget": "$50,000",
  "timeline": "6 weeks starting June 1",
  "kpis": ["Reach", "Engagement rate", "Conversions"],
  "channels": ["Instagram", "TikTok"],
  "key_messages": ["Protection without compromise"],
  "constraints": ["No medical claims"],
  "raw_summary": "Six-week social launch for a mineral sunscreen line.",
  "missing_fields": []
}"##;

pub const AUDIENCE_JSON: &str = r##"{
  "personas": [
    {
      "name": "Outdoor Olivia",
      "age_range": "28-35",
      "description": "Weekend hiker who reads ingredient labels",
      "motivations": ["Healthy skin"],
      "pain_points": ["Greasy sunscreen"],
      "preferred_channels": ["Instagram"],
      "content_preferences": ["Reels", "Carousels"]
    },
    {
      "name": "Busy Bea",
      "age_range": "32-40",
      "description": "Working parent with a five-minute routine",
      "motivations": ["Simplicity"],
      "pain_points": ["Too many products"],
      "preferred_channels": ["TikTok"],
      "content_preferences": ["Short video"]
    }
  ],
  "targeting_recommendations": ["Interest targeting on clean beauty"],
  "audience_size_estimate": "4-6 million",
  "key_insights": ["Texture matters more than SPF number"],
  "suggested_tone": "Warm and confident"
}"##;

pub const CALENDAR_JSON: &str = r##"{
  "campaign_duration": "6 weeks",
  "posting_frequency": "4 posts per week",
  "entries": [
    {
      "week": 1,
      "day": "Monday",
      "channel": "Instagram",
      "content_type": "Reel",
      "topic": "Launch teaser",
      "caption_hook": "Your sunscreen should feel like nothing.",
      "hashtags": ["#SummerGlow"],
      "notes": "Golden hour footage"
    },
    {
      "week": 2,
      "day": "Thursday",
      "channel": "TikTok",
      "content_type": "Video",
      "topic": "Texture test",
      "caption_hook": "We tried the rub-in challenge.",
      "hashtags": ["#SunscreenCheck"],
      "notes": "Creator collaboration"
    }
  ],
  "channel_strategies": [
    { "channel": "Instagram", "strategy": "Polished reels and carousels" },
    { "channel": "TikTok", "strategy": "Creator-led texture demos" }
  ],
  "content_mix_rationale": "Video demonstrates texture better than static posts."
}"##;

pub const CREATIVE_BRIEF_JSON: &str = r##"{
  "project_name": "Summer Glow Launch",
  "prepared_for": "Lumen Skincare",
  "date": "2026-05-01",
  "background": "Lumen is entering the mineral sunscreen category.",
  "objective": "Make Summer Glow the default clean sunscreen for the season.",
  "target_audience_summary": "Label-reading women 25-40 with active lives.",
  "key_message": "Protection without compromise.",
  "supporting_messages": ["No white cast", "Reef-safe formula", "Light texture"],
  "tone_and_voice": "Warm and confident",
  "visual_direction": "Sunlit, natural skin, golden hour",
  "deliverables": ["6 reels", "4 carousels"],
  "timeline_summary": "Assets due May 20, launch June 1",
  "success_metrics": ["2,000 sales", "5% engagement"],
  "mandatory_inclusions": ["SPF 30 badge"]
}"##;

pub const PERFORMANCE_JSON: &str = r##"{
  "executive_summary": "The campaign is pacing ahead of its conversion goal.",
  "overall_performance": "On track",
  "channel_analysis": [
    {
      "channel": "Instagram",
      "performance_rating": "Strong",
      "key_metric": "1,420 conversions",
      "insight": "Carousels drove saves",
      "recommendation": "Shift 10% of budget to carousels"
    }
  ],
  "top_performing_content": ["Texture demos"],
  "recommendations": ["Increase creator spend"],
  "next_steps": ["Brief two new creators"],
  "key_metrics_summary": [
    { "metric_name": "ROAS", "value": "3.2x", "trend": "up" }
  ]
}"##;

/// Successful response for a document shape
pub fn fixture(shape: &str) -> Result<String, ServiceError> {
    let text = match shape {
        "BriefParserOutput" => BRIEF_JSON,
        "AudienceOutput" => AUDIENCE_JSON,
        "CalendarOutput" => CALENDAR_JSON,
        "CreativeBriefOutput" => CREATIVE_BRIEF_JSON,
        "PerformanceOutput" => PERFORMANCE_JSON,
        _ => return Err(ServiceError::EmptyResponse),
    };
    Ok(text.to_string())
}

pub fn status(code: u16) -> Result<String, ServiceError> {
    Err(ServiceError::Status {
        code,
        message: "scripted".to_string(),
    })
}

/// Generation client that answers by document shape.
///
/// Scripted outcomes are consumed first; once a shape's script is empty
/// the fixture for that shape is returned.
#[derive(Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, VecDeque<Result<String, ServiceError>>>>,
    calls: Mutex<HashMap<String, u32>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    panics: Mutex<HashSet<String>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue outcomes for a shape
    pub fn script(&self, shape: &str, outcomes: Vec<Result<String, ServiceError>>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(shape.to_string())
            .or_default()
            .extend(outcomes);
    }

    /// Block requests for a shape until permits are added to the returned semaphore
    pub fn gate(&self, shape: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates
            .lock()
            .unwrap()
            .insert(shape.to_string(), Arc::clone(&gate));
        gate
    }

    /// Panic inside the client when a shape is requested
    pub fn panic_on(&self, shape: &str) {
        self.panics.lock().unwrap().insert(shape.to_string());
    }

    pub fn calls(&self, shape: &str) -> u32 {
        self.calls.lock().unwrap().get(shape).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        let gate = self.gates.lock().unwrap().get(request.shape).cloned();
        if let Some(gate) = gate {
            let permit = gate.acquire().await.unwrap();
            permit.forget();
        }

        let panics = self.panics.lock().unwrap().contains(request.shape);
        if panics {
            panic!("scripted client panicked on {}", request.shape);
        }

        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.shape.to_string())
            .or_default() += 1;

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(request.shape)
            .and_then(|queue| queue.pop_front());

        scripted.unwrap_or_else(|| fixture(request.shape))
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Orchestrator over a scripted client with a generous rate limit
pub fn orchestrator(client: Arc<ScriptedClient>) -> Orchestrator {
    let caller = ResilientCaller::new(
        client,
        Arc::new(RateLimiter::new(600)),
        RetryPolicy::default(),
    );
    Orchestrator::new(caller, PerformanceInput::bundled().unwrap())
}
