//! dutycal-provider-google - Google Calendar provider for dutycal
//!
//! This binary implements the dutycal provider protocol, communicating
//! with dutycal via JSON over stdin/stdout. Logs go to stderr.
//!
//! Credentials live outside dutycal:
//!   DUTYCAL_GOOGLE_ACCESS_TOKEN, or
//!   ~/.config/dutycal/providers/google/session.toml (refreshed with app_config.toml)

mod app_config;
mod commands;
mod convert;
mod google;
mod remote_config;
mod session;
mod types;

use dutycal_core::remote::protocol::{Request, Response};
use std::io::{self, BufRead, Write};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to read stdin: {e}");
                break;
            }
        };

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handle_request(request).await,
            Err(e) => Response::error(&format!("Failed to parse request: {e}")),
        };

        if let Err(e) = writeln!(stdout, "{response}").and_then(|_| stdout.flush()) {
            error!("Failed to write response: {e}");
            break;
        }
    }
}

async fn handle_request(request: Request) -> String {
    debug!(command = ?request.command, "Handling request");

    match commands::dispatch(request.command, request.params).await {
        Ok(data) => Response::success(data),
        Err(e) => Response::error(&format!("{e:#}")),
    }
}
