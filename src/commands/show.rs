use anyhow::Result;
use meetgrid_core::aggregate::aggregate;
use meetgrid_core::{Aggregate, AvailabilityStore, MeetGridConfig};
use owo_colors::OwoColorize;

use super::{load_event, open_store};
use crate::render::{pluralize, render_availability};

pub async fn run(config: &MeetGridConfig, event_id: &str, name: Option<&str>) -> Result<()> {
    let store = open_store(config);
    let (event_id, definition) = load_event(&store, event_id).await?;
    let grid = config.grid_builder()?.build(&definition);
    let records = store.fetch_availability(&event_id).await?;
    let group = aggregate(&records);

    println!("{}", definition.title.bold());
    println!();
    println!("{}", render_availability(&grid, &group, name));
    println!();
    println!("{}", summary(&group));

    Ok(())
}

pub fn summary(group: &Aggregate) -> String {
    let participants = group.participants();
    if participants.is_empty() {
        return "Nobody has marked any slots yet.".dimmed().to_string();
    }

    let best = group.best_slots();
    let best_labels: Vec<_> = best
        .iter()
        .map(|slot| format!("{} {}", slot.date_key(), slot.label()))
        .collect();

    format!(
        "{} {}: {}\n{} ({} of {}): {}",
        participants.len(),
        pluralize("participant", participants.len()),
        participants.join(", "),
        "Best".green().bold(),
        group.max_count(),
        participants.len(),
        best_labels.join(", ")
    )
}
