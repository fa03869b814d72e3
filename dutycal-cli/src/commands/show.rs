use anyhow::Result;
use dutycal_core::store::AssignmentStore;

use crate::app::App;
use crate::render::render_assignments;

pub async fn run(app: &App, from: Option<&str>, to: Option<&str>, json: bool) -> Result<()> {
    let range = app.range(from, to)?;
    let assignments = app.store.query_range(&range).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&assignments)?);
        return Ok(());
    }

    println!("{}", render_assignments(&assignments, app.today()?));
    Ok(())
}
