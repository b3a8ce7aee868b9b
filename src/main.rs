mod credentials;
mod discord;
mod error;
mod lambda;
mod tasks;

use crate::credentials::{credential_source, LAMBDA_ENV_FLAG};
use crate::discord::Discord;
use crate::tasks::deadlines::query::NotionClient;
use crate::tasks::{DispatchResult, NotificationDispatcher};
use chrono::Local;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

type Error = Box<dyn std::error::Error + Send + Sync>;

fn running_in_lambda() -> bool {
    std::env::var_os(LAMBDA_ENV_FLAG).is_some()
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// A full reminder pass against the real Notion database and Discord channel.
pub async fn run_once(in_lambda: bool) -> DispatchResult {
    let credentials = credential_source(in_lambda).await;
    let notion = NotionClient::new();
    let today = Local::now().date_naive();
    NotificationDispatcher::new(credentials.as_ref(), &notion, &Discord)
        .run(today)
        .await
}

#[tokio::main]
async fn main() -> ExitCode {
    let in_lambda = running_in_lambda();
    init_logging(in_lambda);

    if in_lambda {
        return match lambda::serve().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("lambda runtime stopped: {e}");
                ExitCode::FAILURE
            }
        };
    }

    exit_code(&run_once(false).await)
}

fn exit_code(result: &DispatchResult) -> ExitCode {
    match result {
        DispatchResult {
            success: true,
            message_sent,
            ..
        } => {
            tracing::debug!("sent message: {}", message_sent.as_deref().unwrap_or_default());
            ExitCode::SUCCESS
        }
        _ => ExitCode::FAILURE,
    }
}
