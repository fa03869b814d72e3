use anyhow::Result;
use dutycal_core::store::SubscriptionStore;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::render::Render;
use crate::utils::tui;

pub async fn start(app: &App, cancel: &CancellationToken) -> Result<()> {
    let calendar_ref = app.remote()?.calendar_ref();
    let ingestor = app.ingestor()?;

    let subscription = tui::with_spinner(
        format!("Watching {calendar_ref}"),
        ingestor.start_watch(&calendar_ref, cancel),
    )
    .await?;

    println!("{} {}", "Watching".green(), subscription.render());
    Ok(())
}

/// Stop one subscription, or every stored one when no id is given.
pub async fn stop(
    app: &App,
    subscription_id: Option<String>,
    cancel: &CancellationToken,
) -> Result<()> {
    let ids = match subscription_id {
        Some(id) => vec![id],
        None => app
            .store
            .list_subscriptions()
            .await?
            .into_iter()
            .map(|s| s.subscription_id)
            .collect(),
    };

    if ids.is_empty() {
        println!("{}", "No active subscriptions".dimmed());
        return Ok(());
    }

    let ingestor = app.ingestor()?;
    for id in ids {
        ingestor.stop_watch(&id, cancel).await?;
        println!("{} {}", "Stopped".red(), id);
    }
    Ok(())
}

pub async fn list(app: &App) -> Result<()> {
    let subscriptions = app.store.list_subscriptions().await?;

    if subscriptions.is_empty() {
        println!("{}", "No active subscriptions".dimmed());
        return Ok(());
    }

    for subscription in &subscriptions {
        println!("{}", subscription.render());
    }
    Ok(())
}
