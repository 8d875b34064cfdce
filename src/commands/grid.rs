use anyhow::Result;
use meetgrid_core::MeetGridConfig;
use owo_colors::OwoColorize;

use super::{load_event, open_store};
use crate::render::{Render, pluralize};

pub async fn run(config: &MeetGridConfig, event_id: &str) -> Result<()> {
    let store = open_store(config);
    let (_, definition) = load_event(&store, event_id).await?;
    let grid = config.grid_builder()?.build(&definition);

    println!("{}", definition.title.bold());
    println!("{}", grid.render());
    println!();
    println!(
        "{}",
        format!(
            "{} {} across {} {}",
            grid.len(),
            pluralize("slot", grid.len()),
            grid.days.len(),
            pluralize("day", grid.days.len())
        )
        .dimmed()
    );

    for error in grid.missing_range_errors() {
        eprintln!("{}", error.to_string().yellow());
    }

    Ok(())
}
