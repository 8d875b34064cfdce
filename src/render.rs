//! Terminal rendering for meetgrid types.

use meetgrid_core::slot::format_date_key;
use meetgrid_core::{Aggregate, EventDefinition, Grid, GridDay, TimeSlot};
use owo_colors::OwoColorize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for EventDefinition {
    fn render(&self) -> String {
        let mut lines = vec![self.title.bold().to_string()];
        if let Some(description) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            lines.push(format!("   {}", description.dimmed()));
        }
        lines.push(format!("   {} {}", "Timezone:".dimmed(), self.timezone));
        for date in &self.dates {
            let range = match self.time_range(date) {
                Some(range) => range.to_string(),
                None => "no time range".red().to_string(),
            };
            lines.push(format!("   {} {}", day_heading(date), range));
        }
        lines.join("\n")
    }
}

impl Render for Grid {
    fn render(&self) -> String {
        let mut lines = Vec::new();
        for day in &self.days {
            let labels: Vec<_> = day.slots.iter().map(TimeSlot::short_label).collect();
            lines.push(format!("{} {}", day_heading(&day.date).bold(), labels.join("  ").dimmed()));
        }
        for date in &self.missing_ranges {
            lines.push(format!("{} {}", day_heading(date), "skipped: no time range".yellow()));
        }
        lines.join("\n")
    }
}

fn day_heading(date: &chrono::NaiveDate) -> String {
    format!("{} {}", date.format("%a"), format_date_key(date))
}

/// The group view: one line per slot with its count and members. Slots with
/// the highest count are highlighted; `participant`'s own slots are marked.
pub fn render_availability(grid: &Grid, aggregate: &Aggregate, participant: Option<&str>) -> String {
    let best = aggregate.best_slots();
    let mut lines = Vec::new();

    for (i, day) in grid.days.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.push(day_heading(&day.date).bold().to_string());
        lines.extend(render_day(day, aggregate, &best, participant));
    }

    if grid.is_empty() {
        lines.push("No slots to show.".dimmed().to_string());
    }

    lines.join("\n")
}

fn render_day(
    day: &GridDay,
    aggregate: &Aggregate,
    best: &[TimeSlot],
    participant: Option<&str>,
) -> Vec<String> {
    day.slots
        .iter()
        .map(|slot| {
            let cell = aggregate.cell(slot);
            let mine = participant.is_some_and(|p| cell.contains(p));
            let marker = if mine { "●".cyan().to_string() } else { " ".to_string() };
            let label = format!("{:>8}", slot.label());
            let bar = "■".repeat(cell.count);
            let members = cell.members.join(", ");

            if best.contains(slot) {
                format!(
                    " {} {} {} {} {}",
                    marker,
                    label.green().bold(),
                    bar.green(),
                    cell.count.green(),
                    members
                )
            } else if cell.count == 0 {
                format!(" {} {}", marker, label.dimmed())
            } else {
                format!(" {} {} {} {} {}", marker, label, bar.yellow(), cell.count, members.dimmed())
            }
        })
        .collect()
}

pub fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}
