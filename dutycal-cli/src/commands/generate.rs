use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::render::render_assignments;
use crate::utils::tui;

pub async fn run(
    app: &App,
    from: Option<&str>,
    to: Option<&str>,
    cancel: &CancellationToken,
) -> Result<()> {
    let range = app.range(from, to)?;
    let generator = app.generator();

    let assignments = tui::with_spinner(
        format!("Generating {} to {}", range.start(), range.end()),
        generator.generate(&range, cancel),
    )
    .await?;

    println!("{}", render_assignments(&assignments, app.today()?));
    Ok(())
}
