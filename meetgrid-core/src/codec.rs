//! Event definitions as a single URL-safe string.
//!
//! The payload is the JSON form of the definition with dates as `MM/DD/YYYY`
//! and times as `HH:mm`, percent-encoded so it can ride in a query string.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{MeetGridError, MeetGridResult};
use crate::event::{EventDefinition, EventId, TimeRange};
use crate::slot::{format_date_key, format_time_key, parse_date_key, parse_time_key};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePayload {
    #[serde(default)]
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    timezone: String,
    #[serde(default)]
    dates: Vec<String>,
    #[serde(default)]
    time_ranges: BTreeMap<String, WireRange>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireRange {
    start: String,
    end: String,
}

impl From<&EventDefinition> for WirePayload {
    fn from(definition: &EventDefinition) -> Self {
        WirePayload {
            title: definition.title.clone(),
            description: definition.description.clone(),
            timezone: definition.timezone.clone(),
            dates: definition.dates.iter().map(format_date_key).collect(),
            time_ranges: definition
                .time_ranges
                .iter()
                .map(|(date, range)| {
                    (
                        format_date_key(date),
                        WireRange {
                            start: format_time_key(&range.start),
                            end: format_time_key(&range.end),
                        },
                    )
                })
                .collect(),
        }
    }
}

impl TryFrom<WirePayload> for EventDefinition {
    type Error = MeetGridError;

    fn try_from(wire: WirePayload) -> Result<Self, Self::Error> {
        let malformed = |e: MeetGridError| MeetGridError::MalformedPayload(e.to_string());

        let mut definition = EventDefinition {
            title: wire.title,
            description: wire.description,
            timezone: wire.timezone,
            ..EventDefinition::default()
        };

        for date in &wire.dates {
            definition.add_date(parse_date_key(date).map_err(malformed)?);
        }

        for (date, range) in &wire.time_ranges {
            let date = parse_date_key(date).map_err(malformed)?;
            let start = parse_time_key(&range.start).map_err(malformed)?;
            let end = parse_time_key(&range.end).map_err(malformed)?;
            let range = TimeRange::new(start, end).ok_or_else(|| {
                MeetGridError::MalformedPayload(format!(
                    "time range for {} ends before it starts",
                    format_date_key(&date)
                ))
            })?;
            definition.time_ranges.insert(date, range);
        }

        Ok(definition)
    }
}

/// Encode a definition for transport.
pub fn encode(definition: &EventDefinition) -> MeetGridResult<String> {
    let json = serde_json::to_string(&WirePayload::from(definition))
        .map_err(|e| MeetGridError::Serialization(e.to_string()))?;
    Ok(urlencoding::encode(&json).into_owned())
}

/// Decode a transport string. Anything that does not parse back into a
/// consistent definition is a [`MeetGridError::MalformedPayload`].
pub fn decode(payload: &str) -> MeetGridResult<EventDefinition> {
    let json = urlencoding::decode(payload.trim())
        .map_err(|e| MeetGridError::MalformedPayload(format!("not valid UTF-8: {e}")))?;
    let wire: WirePayload = serde_json::from_str(&json)
        .map_err(|e| MeetGridError::MalformedPayload(e.to_string()))?;
    EventDefinition::try_from(wire)
}

/// Result of decoding an optional payload. The definition is always usable;
/// `error` says why it is empty when decoding failed.
#[derive(Debug)]
pub struct Decoded {
    pub definition: EventDefinition,
    pub error: Option<MeetGridError>,
}

/// Decode a payload that may be absent. Absence means nothing has been
/// configured yet and is not an error.
pub fn decode_or_default(payload: Option<&str>) -> Decoded {
    match payload.filter(|p| !p.trim().is_empty()) {
        None => Decoded {
            definition: EventDefinition::default(),
            error: None,
        },
        Some(payload) => match decode(payload) {
            Ok(definition) => Decoded {
                definition,
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "discarding event payload");
                Decoded {
                    definition: EventDefinition::default(),
                    error: Some(e),
                }
            }
        },
    }
}

/// A link carrying both the event id and its encoded definition.
pub fn share_link(
    base_url: &str,
    event_id: &EventId,
    definition: &EventDefinition,
) -> MeetGridResult<String> {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    Ok(format!(
        "{}{}data={}&eventId={}",
        base_url,
        separator,
        encode(definition)?,
        urlencoding::encode(event_id.as_str())
    ))
}

#[derive(Debug)]
pub struct SharedEvent {
    pub event_id: Option<EventId>,
    pub decoded: Decoded,
}

/// Read `data` and `eventId` back out of a share link or its query string.
pub fn parse_share_query(link: &str) -> SharedEvent {
    let query = link.split_once('?').map_or(link, |(_, q)| q);
    let query = query.split_once('#').map_or(query, |(q, _)| q);

    let mut data = None;
    let mut event_id = None;
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("data", value)) => data = Some(value),
            Some(("eventId", value)) => {
                event_id = urlencoding::decode(value)
                    .ok()
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .map(EventId::new);
            }
            _ => {}
        }
    }

    SharedEvent {
        event_id,
        decoded: decode_or_default(data),
    }
}
