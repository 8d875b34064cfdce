use anyhow::Result;
use meetgrid_core::codec;
use owo_colors::OwoColorize;

use crate::render::Render;

/// Accepts a bare payload or a whole share link.
pub fn run(input: &str) -> Result<()> {
    let (event_id, decoded) = if input.contains("data=") || input.contains("eventId=") {
        let shared = codec::parse_share_query(input);
        (shared.event_id, shared.decoded)
    } else {
        (None, codec::decode_or_default(Some(input)))
    };

    if let Some(error) = decoded.error {
        return Err(error.into());
    }

    if decoded.definition.is_empty() {
        println!("{}", "Nothing configured.".dimmed());
    } else {
        println!("{}", decoded.definition.render());
        if let Err(e) = decoded.definition.validate() {
            eprintln!("{}", e.to_string().yellow());
        }
    }
    if let Some(id) = event_id {
        println!("{} {}", "Event id:".green(), id);
    }

    Ok(())
}
