use anyhow::{Context, Result};
use chrono::NaiveDate;
use meetgrid_core::codec;
use meetgrid_core::slot::parse_date_key;
use meetgrid_core::{AvailabilityStore, EventDefinition, MeetGridConfig, TimeRange};
use owo_colors::OwoColorize;

use super::open_store;
use crate::render::Render;

pub async fn run(
    config: &MeetGridConfig,
    title: String,
    description: Option<String>,
    timezone: Option<String>,
    ranges: Vec<String>,
    link: Option<String>,
) -> Result<()> {
    let timezone = timezone.unwrap_or_else(local_timezone);

    let mut definition = EventDefinition::new(&title, description.as_deref(), &timezone);
    for input in &ranges {
        let (date, range) = parse_range(input)?;
        definition.set_time_range(date, range);
    }
    let definition = definition.validated()?;

    let store = open_store(config);
    let event_id = store.create_event(&definition).await?;

    println!("{}", definition.render());
    println!();
    println!("{} {}", "Event id:".green(), event_id);
    println!("{} {}", "Payload:".dimmed(), codec::encode(&definition)?);
    if let Some(base) = link {
        println!("{} {}", "Share:".dimmed(), codec::share_link(&base, &event_id, &definition)?);
    }

    Ok(())
}

/// The zone this machine is set to, or UTC if it cannot be determined.
fn local_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Parse "MM/DD/YYYY=HH:mm-HH:mm".
fn parse_range(input: &str) -> Result<(NaiveDate, TimeRange)> {
    let (date, range) = input
        .split_once('=')
        .with_context(|| format!("Invalid range \"{}\". Expected MM/DD/YYYY=HH:mm-HH:mm", input))?;
    let date = parse_date_key(date.trim())?;
    let range = range.trim().parse::<TimeRange>()?;
    Ok((date, range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn parse_range_slash_date() {
        let (date, range) = parse_range("11/01/2024=09:00-17:30").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 11, 1).unwrap());
        assert_eq!(range.start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(range.end, NaiveTime::from_hms_opt(17, 30, 0).unwrap());
    }

    #[test]
    fn parse_range_needs_separator() {
        assert!(parse_range("11/01/2024 09:00-17:00").is_err());
    }

    #[test]
    fn parse_range_rejects_inverted_window() {
        assert!(parse_range("11/01/2024=17:00-09:00").is_err());
    }

    #[test]
    fn local_timezone_is_never_empty() {
        assert!(!local_timezone().is_empty());
    }
}
