use anyhow::{Context, Result};
use meetgrid_core::{MeetGridConfig, ParticipantSession, TimeSlot};
use owo_colors::OwoColorize;

use super::{load_event, open_store};
use crate::render::render_availability;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkMode {
    Toggle,
    Set(bool),
}

pub async fn run(
    config: &MeetGridConfig,
    event_id: &str,
    name: &str,
    slots: &[String],
    mode: MarkMode,
) -> Result<()> {
    let slots = parse_slots(slots)?;

    let store = open_store(config);
    let (event_id, definition) = load_event(&store, event_id).await?;
    let mut session =
        ParticipantSession::join(store, event_id, definition, name, config.session_options()?)
            .await?;

    let result = match mode {
        MarkMode::Set(available) => session.select(&slots, available).await,
        MarkMode::Toggle => toggle_all(&mut session, &slots).await,
    };

    if let Err(e) = result {
        let pending = session.pending().len();
        session.close();
        if e.is_recoverable() && pending > 0 {
            anyhow::bail!("{} ({} unsent, run the command again to retry)", e, pending);
        }
        return Err(e.into());
    }

    println!(
        "{}",
        render_availability(session.grid(), session.aggregate(), Some(session.participant()))
    );
    println!();
    println!(
        "{}",
        format!("{} has {} slot(s) marked", session.participant(), session.selection().len())
            .green()
    );
    session.close();

    Ok(())
}

async fn toggle_all(
    session: &mut ParticipantSession,
    slots: &[TimeSlot],
) -> meetgrid_core::MeetGridResult<()> {
    for slot in slots {
        let available = session.toggle(*slot).await?;
        let state = if available { "on".green().to_string() } else { "off".red().to_string() };
        println!("  {} {} {}", slot.date_key(), slot.label(), state);
    }
    Ok(())
}

fn parse_slots(inputs: &[String]) -> Result<Vec<TimeSlot>> {
    inputs
        .iter()
        .map(|input| {
            input
                .parse::<TimeSlot>()
                .with_context(|| format!("Invalid slot \"{}\". Expected \"MM/DD/YYYY HH:mm\"", input))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_slots_accepts_both_time_forms() {
        let slots = parse_slots(&["11/01/2024 09:30".into(), "11/01/2024 9:30 AM".into()]).unwrap();
        assert_eq!(slots[0], slots[1]);
        assert_eq!(slots[0].time_key(), "09:30");
    }

    #[test]
    fn parse_slots_rejects_garbage() {
        assert!(parse_slots(&["tomorrow".into()]).is_err());
    }
}
