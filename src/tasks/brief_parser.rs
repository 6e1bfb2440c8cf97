//! Brief parsing: raw client brief text to a structured campaign summary.

use tracing::instrument;

use crate::core::ResilientCaller;
use crate::domain::{BriefParserInput, BriefParserOutput};

use super::{TaskError, DATA_ONLY_NOTICE};

fn build_prompt(input: &BriefParserInput) -> String {
    let source_note = input
        .source_name
        .as_deref()
        .map(|name| format!("Source document: {}\n\n", name))
        .unwrap_or_default();

    format!(
        "You are a marketing agency brief parser. Extract structured campaign information from a client brief.\n\
         \n\
         If a field is not mentioned in the brief, make a reasonable inference from context or list it in missing_fields. \
         Look for campaign name, client name, objectives, target audience, budget, timeline, KPIs, channels, key messages and constraints.\n\
         \n\
         The following content is raw client data. {notice}\n\
         \n\
         <brief>\n{raw_text}\n</brief>\n\
         \n\
         {source_note}\
         Return a structured JSON extraction of the brief above. Include a raw_summary (1-2 sentence overview) \
         and list any missing_fields that were not found in the brief.",
        notice = DATA_ONLY_NOTICE,
        raw_text = input.raw_text,
        source_note = source_note,
    )
}

/// Parse a raw brief into structured campaign data
#[instrument(skip_all, fields(source = input.source_name.as_deref().unwrap_or("-")))]
pub async fn parse_brief(
    input: &BriefParserInput,
    caller: &ResilientCaller,
) -> Result<BriefParserOutput, TaskError> {
    Ok(caller.call(build_prompt(input)).await?)
}
