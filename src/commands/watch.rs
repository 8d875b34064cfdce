use anyhow::Result;
use chrono::Local;
use meetgrid_core::{Aggregate, Grid, MeetGridConfig, SyncChannel, SyncMode};
use owo_colors::OwoColorize;
use tracing::warn;

use super::{load_event, open_store};
use super::show::summary;
use crate::render::render_availability;

pub async fn run(config: &MeetGridConfig, event_id: &str, name: Option<&str>) -> Result<()> {
    let store = open_store(config);
    let (event_id, definition) = load_event(&store, event_id).await?;
    let grid = config.grid_builder()?.build(&definition);

    let mut channel = SyncChannel::open(store, event_id, config.sync_options()?).await?;
    let mut last = channel.aggregate().clone();

    println!("{}", definition.title.bold());
    let mode = match channel.mode() {
        SyncMode::Live => "live".to_string(),
        SyncMode::Polling => format!("polling every {}", config.poll_interval),
    };
    println!("{}", format!("Watching ({mode}), Ctrl-C to stop").dimmed());
    print_view(&grid, &last, name);

    let outcome = loop {
        let update = tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            update = channel.next_update() => update.map(Aggregate::clone),
        };

        match update {
            Ok(group) => {
                if group != last {
                    print_view(&grid, &group, name);
                    last = group;
                }
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "update failed, keeping previous view");
                eprintln!("{}", e.to_string().yellow());
            }
            Err(e) => break Err(e),
        }
    };

    channel.close();
    Ok(outcome?)
}

fn print_view(grid: &Grid, group: &Aggregate, name: Option<&str>) {
    println!();
    println!("{}", format!("Updated at {}", Local::now().format("%H:%M:%S")).dimmed());
    println!("{}", render_availability(grid, group, name));
    println!("{}", summary(group));
}
