use anyhow::{Context, Result};
use dutycal_core::remote::{Notification, ResourceState};
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::commands::report_sync_error;
use crate::render::Render;

/// Handle one change notification, as delivered to the webhook.
pub async fn run(
    app: &App,
    channel_id: String,
    resource_id: String,
    state: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let state: ResourceState = state
        .parse()
        .with_context(|| format!("Invalid --state '{state}'"))?;
    let notification = Notification {
        subscription_id: channel_id,
        resource_ref: resource_id,
        state,
    };

    let result = app
        .ingestor()?
        .handle_external_change(&notification, cancel)
        .await;

    match result {
        Ok(report) => {
            println!("{}", report.render());
            Ok(())
        }
        Err(e) => {
            report_sync_error(&e);
            Err(e.into())
        }
    }
}
