use anyhow::Result;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::commands::report_sync_error;
use crate::render::Render;
use crate::utils::tui;

pub async fn run(
    app: &App,
    from: Option<&str>,
    to: Option<&str>,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let range = app.range(from, to)?;

    let assignments = tui::with_spinner(
        format!("Generating {} to {}", range.start(), range.end()),
        app.generator().generate(&range, cancel),
    )
    .await?;

    let reconciler = app.reconciler(&assignments, dry_run).await?;
    let result = tui::with_spinner(
        format!("Syncing {} days", assignments.len()),
        reconciler.sync(&assignments, cancel),
    )
    .await;

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            report_sync_error(&e);
            return Err(e.into());
        }
    };

    if dry_run {
        println!("{}", "Dry run, nothing was written to the calendar".dimmed());
    }
    println!("{}", summary.render());
    Ok(())
}
