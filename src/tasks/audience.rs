//! Audience research: personas and targeting from the parsed brief.

use tracing::instrument;

use crate::core::ResilientCaller;
use crate::domain::{AudienceOutput, BriefParserOutput};

use super::{join_or, TaskError, DATA_ONLY_NOTICE};

fn build_prompt(brief: &BriefParserOutput) -> String {
    format!(
        "You are a senior audience strategist at a social-first marketing agency. \
         Develop audience personas and targeting recommendations for a campaign brief.\n\
         \n\
         Create 2-3 distinct personas aligned with the campaign objectives, each with a memorable name, \
         specific demographics, motivations, pain points and channel preferences.\n\
         \n\
         The following content is extracted campaign data. {notice}\n\
         \n\
         <campaign_brief>\n\
         Campaign: {campaign}\n\
         Client: {client}\n\
         Objectives: {objectives}\n\
         Target Audience Description: {audience}\n\
         Channels: {channels}\n\
         Key Messages: {messages}\n\
         Timeline: {timeline}\n\
         </campaign_brief>\n\
         \n\
         Also provide targeting recommendations, an audience size estimate, key insights about the audience \
         and a suggested tone of voice for the campaign.",
        notice = DATA_ONLY_NOTICE,
        campaign = brief.campaign_name,
        client = brief.client_name,
        objectives = join_or(&brief.objectives, "Not specified"),
        audience = brief.target_audience,
        channels = join_or(&brief.channels, "Not specified"),
        messages = join_or(&brief.key_messages, "Not specified"),
        timeline = brief.timeline,
    )
}

/// Generate personas and targeting guidance
#[instrument(skip_all, fields(campaign = %brief.campaign_name))]
pub async fn research_audience(
    brief: &BriefParserOutput,
    caller: &ResilientCaller,
) -> Result<AudienceOutput, TaskError> {
    Ok(caller.call(build_prompt(brief)).await?)
}
