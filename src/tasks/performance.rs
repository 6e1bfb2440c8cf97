//! Performance report: executive analysis of the campaign metrics dataset.

use tracing::instrument;

use crate::core::ResilientCaller;
use crate::domain::documents::ChannelMetrics;
use crate::domain::{PerformanceInput, PerformanceOutput};

use super::{join_or, TaskError, DATA_ONLY_NOTICE};

/// Thousands separators for counts, e.g. 1234567 -> "1,234,567"
fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn format_channel(m: &ChannelMetrics) -> String {
    format!(
        "- {}: {} impressions, {} reach, {}% engagement, {} clicks, {} conversions, ${:.2} spend",
        m.channel,
        group_digits(m.impressions),
        group_digits(m.reach),
        m.engagement_rate,
        group_digits(m.clicks),
        group_digits(m.conversions),
        m.spend,
    )
}

fn build_prompt(input: &PerformanceInput) -> String {
    let channel_data = input
        .channel_metrics
        .iter()
        .map(format_channel)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a Performance Analytics Lead at a data-driven marketing agency. \
         Analyze the following campaign metrics and produce an executive report.\n\
         \n\
         The following content is campaign performance data. {notice}\n\
         \n\
         <campaign_metrics>\n\
         Campaign: {campaign}\n\
         Reporting Period: {period}\n\
         Campaign Goals: {goals}\n\
         \n\
         Channel Performance:\n\
         {channel_data}\n\
         </campaign_metrics>\n\
         \n\
         Produce an executive summary, an overall performance rating (Exceeding targets, On track or Below target), \
         per-channel analysis (rating, standout metric, insight, recommendation), top performing content, \
         3-5 recommendations, next steps and a key metrics summary with values and trends. \
         Reference the actual numbers provided.",
        notice = DATA_ONLY_NOTICE,
        campaign = input.campaign_name,
        period = input.reporting_period,
        goals = join_or(&input.goals, "Not specified"),
        channel_data = channel_data,
    )
}

/// Analyze the metrics dataset
#[instrument(
    skip_all,
    fields(campaign = %input.campaign_name, channels = input.channel_metrics.len())
)]
pub async fn generate_report(
    input: &PerformanceInput,
    caller: &ResilientCaller,
) -> Result<PerformanceOutput, TaskError> {
    Ok(caller.call(build_prompt(input)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(999), "999");
        assert_eq!(group_digits(1000), "1,000");
        assert_eq!(group_digits(1234567), "1,234,567");
    }

    #[test]
    fn test_prompt_uses_bundled_metrics() {
        let input = PerformanceInput::bundled().unwrap();
        let prompt = build_prompt(&input);

        assert!(prompt.contains(&format!("Campaign: {}", input.campaign_name)));
        assert_eq!(
            prompt.matches("\n- ").count(),
            input.channel_metrics.len()
        );
        assert!(prompt.contains("</campaign_metrics>"));
    }
}
