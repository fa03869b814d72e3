pub mod generate;
pub mod notify;
pub mod show;
pub mod sync;
pub mod watch;

use dutycal_core::DutyError;
use owo_colors::OwoColorize;

use crate::render::Render;

/// Print per-assignment detail for aggregated sync failures.
pub fn report_sync_error(error: &DutyError) {
    if let DutyError::Aggregate(aggregate) = error.root() {
        eprintln!(
            "{}",
            format!("{} assignment(s) could not be published:", aggregate.len()).red()
        );
        for failure in aggregate.failures() {
            eprintln!("{}", failure.render());
        }
    }
}
