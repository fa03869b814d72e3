use std::future::Future;

use indicatif::{ProgressBar, ProgressStyle};

pub fn create_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_strings(&["-", "\\", "|", "/"])
        .template("{msg} {spinner}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// Run `future` behind a spinner, clearing it once the future settles.
pub async fn with_spinner<T>(message: impl Into<String>, future: impl Future<Output = T>) -> T {
    let spinner = create_spinner(message.into());
    let result = future.await;
    spinner.finish_and_clear();
    result
}
