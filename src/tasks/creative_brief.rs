//! Creative brief: synthesizes the brief, audience and calendar summary
//! into the document handed to designers and copywriters.

use chrono::Utc;
use tracing::instrument;

use crate::core::ResilientCaller;
use crate::domain::{CreativeBriefInput, CreativeBriefOutput};

use super::{join_or, TaskError, DATA_ONLY_NOTICE};

fn build_prompt(input: &CreativeBriefInput, today: &str) -> String {
    let brief = &input.brief_data;
    let audience = &input.audience_data;
    let calendar = &input.calendar_summary;

    let personas = audience
        .personas
        .iter()
        .map(|p| format!("{} ({}): {}", p.name, p.age_range, p.description))
        .collect::<Vec<_>>()
        .join("; ");

    let strategies = calendar
        .channel_strategies
        .iter()
        .map(|cs| format!("{}: {}", cs.channel, cs.strategy))
        .collect::<Vec<_>>()
        .join("; ");

    format!(
        "You are a Creative Director at a leading marketing agency. Write a professional creative brief \
         that will guide the creative team in producing campaign assets.\n\
         \n\
         The following content is compiled from campaign analysis. {notice}\n\
         \n\
         <campaign_brief>\n\
         Campaign: {campaign}\n\
         Client: {client}\n\
         Objectives: {objectives}\n\
         Target Audience: {target_audience}\n\
         Key Messages: {messages}\n\
         Timeline: {timeline}\n\
         Budget: {budget}\n\
         Constraints: {constraints}\n\
         </campaign_brief>\n\
         \n\
         <audience_research>\n\
         Primary Personas: {personas}\n\
         Suggested Tone: {tone}\n\
         Key Audience Insights: {insights}\n\
         </audience_research>\n\
         \n\
         <content_strategy>\n\
         Campaign Duration: {duration}\n\
         Posting Frequency: {frequency}\n\
         Channel Strategies: {strategies}\n\
         Content Mix Rationale: {rationale}\n\
         </content_strategy>\n\
         \n\
         Write a complete creative brief: project name, prepared for (the client), date ({today}), background, \
         objective, target audience summary, key message, 3-5 supporting messages, tone and voice, visual direction, \
         deliverables, timeline summary, success metrics and mandatory inclusions. \
         Use a professional, concise agency style.",
        notice = DATA_ONLY_NOTICE,
        campaign = brief.campaign_name,
        client = brief.client_name,
        objectives = join_or(&brief.objectives, "Not specified"),
        target_audience = brief.target_audience,
        messages = join_or(&brief.key_messages, "Not specified"),
        timeline = brief.timeline,
        budget = brief.budget.as_deref().unwrap_or("Not specified"),
        constraints = join_or(&brief.constraints, "None specified"),
        personas = personas,
        tone = audience.suggested_tone,
        insights = join_or(&audience.key_insights, "None"),
        duration = calendar.campaign_duration,
        frequency = calendar.posting_frequency,
        strategies = strategies,
        rationale = calendar.content_mix_rationale,
        today = today,
    )
}

/// Write the creative brief. Receives the calendar summary only, never
/// the full entry list.
#[instrument(skip_all, fields(campaign = %input.brief_data.campaign_name))]
pub async fn generate_creative_brief(
    input: &CreativeBriefInput,
    caller: &ResilientCaller,
) -> Result<CreativeBriefOutput, TaskError> {
    let today = Utc::now().date_naive().to_string();
    Ok(caller.call(build_prompt(input, &today)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::documents::{ChannelStrategy, Persona};
    use crate::domain::{AudienceOutput, BriefParserOutput, CalendarSummary};

    #[test]
    fn test_prompt_sections() {
        let input = CreativeBriefInput {
            brief_data: BriefParserOutput {
                campaign_name: "Launch".into(),
                client_name: "Acme".into(),
                objectives: vec!["Awareness".into()],
                target_audience: "Adults".into(),
                budget: None,
                timeline: "4 weeks".into(),
                kpis: vec![],
                channels: vec![],
                key_messages: vec![],
                constraints: vec![],
                raw_summary: "Summary".into(),
                missing_fields: vec![],
            },
            audience_data: AudienceOutput {
                personas: vec![Persona {
                    name: "Ava".into(),
                    age_range: "25-34".into(),
                    description: "Urban runner".into(),
                    motivations: vec![],
                    pain_points: vec![],
                    preferred_channels: vec![],
                    content_preferences: vec![],
                }],
                targeting_recommendations: vec![],
                audience_size_estimate: "1M".into(),
                key_insights: vec![],
                suggested_tone: "Upbeat".into(),
            },
            calendar_summary: CalendarSummary {
                campaign_duration: "4 weeks".into(),
                posting_frequency: "3x weekly".into(),
                channel_strategies: vec![ChannelStrategy {
                    channel: "Instagram".into(),
                    strategy: "Reels first".into(),
                }],
                content_mix_rationale: "Video drives reach".into(),
            },
        };

        let prompt = build_prompt(&input, "2026-03-01");
        assert!(prompt.contains("Primary Personas: Ava (25-34): Urban runner"));
        assert!(prompt.contains("Channel Strategies: Instagram: Reels first"));
        assert!(prompt.contains("Constraints: None specified"));
        assert!(prompt.contains("date (2026-03-01)"));
        assert!(prompt.contains("<content_strategy>"));
    }
}
