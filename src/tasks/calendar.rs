//! Content calendar: a multi-week posting plan across channels.

use std::collections::BTreeSet;

use tracing::instrument;

use crate::core::ResilientCaller;
use crate::domain::{AudienceOutput, BriefParserOutput, CalendarOutput};

use super::{join_or, TaskError, DATA_ONLY_NOTICE};

fn build_prompt(brief: &BriefParserOutput, audience: &AudienceOutput) -> String {
    let persona_names: Vec<String> = audience.personas.iter().map(|p| p.name.clone()).collect();

    // Deduplicated across personas, in a stable order
    let content_preferences: Vec<String> = audience
        .personas
        .iter()
        .flat_map(|p| p.content_preferences.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    format!(
        "You are a content strategist at a social-first marketing agency. Create a content calendar for a marketing campaign.\n\
         \n\
         The following content is extracted campaign and audience data. {notice}\n\
         \n\
         <campaign_brief>\n\
         Campaign: {campaign}\n\
         Client: {client}\n\
         Objectives: {objectives}\n\
         Channels: {channels}\n\
         Key Messages: {messages}\n\
         Timeline: {timeline}\n\
         Budget: {budget}\n\
         </campaign_brief>\n\
         \n\
         <audience_insights>\n\
         Target Personas: {personas}\n\
         Suggested Tone: {tone}\n\
         Key Insights: {insights}\n\
         Preferred Content Types: {preferences}\n\
         </audience_insights>\n\
         \n\
         Include the campaign duration and posting frequency, individual entries (week number, day, channel, \
         content type, topic, caption hook, hashtags, notes), one strategy per channel and a content mix rationale. \
         Plan for 2-4 weeks of content and write specific caption hooks, not placeholders.",
        notice = DATA_ONLY_NOTICE,
        campaign = brief.campaign_name,
        client = brief.client_name,
        objectives = join_or(&brief.objectives, "Not specified"),
        channels = join_or(&brief.channels, "Not specified"),
        messages = join_or(&brief.key_messages, "Not specified"),
        timeline = brief.timeline,
        budget = brief.budget.as_deref().unwrap_or("Not specified"),
        personas = join_or(&persona_names, "None"),
        tone = audience.suggested_tone,
        insights = join_or(&audience.key_insights, "None"),
        preferences = join_or(&content_preferences, "Not specified"),
    )
}

/// Plan content for the campaign
#[instrument(skip_all, fields(campaign = %brief.campaign_name, personas = audience.personas.len()))]
pub async fn generate_calendar(
    brief: &BriefParserOutput,
    audience: &AudienceOutput,
    caller: &ResilientCaller,
) -> Result<CalendarOutput, TaskError> {
    Ok(caller.call(build_prompt(brief, audience)).await?)
}
