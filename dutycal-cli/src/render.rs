//! TUI rendering traits for dutycal types.
//!
//! This module provides extension traits that add colored terminal rendering
//! to dutycal-core types using owo_colors.

use chrono::NaiveDate;
use dutycal_core::error::SyncFailure;
use dutycal_core::ingest::IngestReport;
use dutycal_core::remote::subscription::NotificationSubscription;
use dutycal_core::sync::SyncSummary;
use dutycal_core::{Assignment, Reason};
use owo_colors::OwoColorize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

/// "Today", "Tomorrow", or e.g. "Wed Feb 25"
pub fn date_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        -1 => "Yesterday".to_string(),
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%a %b %-d").to_string(),
    }
}

/// One line per assignment, with the date relative to `today`.
pub fn render_assignments(assignments: &[Assignment], today: NaiveDate) -> String {
    if assignments.is_empty() {
        return "No assignments".dimmed().to_string();
    }

    assignments
        .iter()
        .map(|a| {
            format!(
                "{:<12} {} {}",
                date_label(a.date, today),
                a.date.to_string().dimmed(),
                a.render()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl Render for Assignment {
    fn render(&self) -> String {
        let parent = if self.overridden {
            self.parent.as_str().yellow().bold().to_string()
        } else {
            self.parent.as_str().bold().to_string()
        };
        let synced = if self.external_ref.is_some() { "" } else { " *" };

        format!("{parent}{} {}", synced.dimmed(), self.reason.render())
    }
}

impl Render for Reason {
    fn render(&self) -> String {
        match self {
            Reason::Override => "(override)".yellow().to_string(),
            other => format!("({})", other.describe()).dimmed().to_string(),
        }
    }
}

impl Render for SyncSummary {
    fn render(&self) -> String {
        if self.is_noop() {
            return "Calendar already up to date".dimmed().to_string();
        }
        format!(
            "Synced: {} created, {} updated, {} removed",
            self.created.green(),
            self.updated.yellow(),
            self.removed.red()
        )
    }
}

impl Render for SyncFailure {
    fn render(&self) -> String {
        format!("   {} {}", self.date.to_string().red(), self.cause)
    }
}

impl Render for IngestReport {
    fn render(&self) -> String {
        if self.acknowledged {
            let mut line = "Handshake acknowledged".dimmed().to_string();
            if let Some(id) = &self.renewed {
                line.push_str(&format!("\nRenewed subscription {}", id.green()));
            }
            return line;
        }

        let mut lines = Vec::new();
        if let Some(id) = &self.renewed {
            lines.push(format!("Renewed subscription {}", id.green()));
        }
        for date in &self.applied {
            lines.push(format!("{} {}", "~".yellow(), date.to_string().yellow()));
        }
        lines.push(format!(
            "Overrides: {} applied, {} skipped, {} failed",
            self.applied.len(),
            self.skipped,
            if self.failed > 0 {
                self.failed.red().to_string()
            } else {
                self.failed.to_string()
            }
        ));
        lines.join("\n")
    }
}

impl Render for NotificationSubscription {
    fn render(&self) -> String {
        format!(
            "{} on {} (expires {})",
            self.subscription_id.bold(),
            self.calendar_ref,
            self.expires_at.format("%Y-%m-%d %H:%M UTC").dimmed()
        )
    }
}
