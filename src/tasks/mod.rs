use crate::credentials::CredentialSource;
use crate::discord::{ChatService, ChatSession};
use crate::error::DispatchError;
use chrono::NaiveDate;
use deadlines::query::{DataSource, DeadlineQueryService};
use deadlines::{format, mapper};

pub mod deadlines;

/// How far a run got. `Failed` is reported alongside the stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    CredentialsLoaded,
    Fetched,
    Mapped,
    Rendered,
    Sent,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub success: bool,
    pub message_sent: Option<String>,
    pub error: Option<DispatchError>,
    pub failed_after: Option<Stage>,
}

pub struct NotificationDispatcher<'a> {
    credentials: &'a dyn CredentialSource,
    data_source: &'a dyn DataSource,
    chat: &'a dyn ChatService,
}

impl<'a> NotificationDispatcher<'a> {
    pub fn new(
        credentials: &'a dyn CredentialSource,
        data_source: &'a dyn DataSource,
        chat: &'a dyn ChatService,
    ) -> Self {
        Self {
            credentials,
            data_source,
            chat,
        }
    }

    /// One full pass: load secrets, query, map, render, send once. Never retries.
    pub async fn run(&self, today: NaiveDate) -> DispatchResult {
        let mut stage = Stage::Idle;
        match self.try_run(today, &mut stage).await {
            Ok(message) => {
                tracing::info!("deadline reminder sent ({} chars)", message.chars().count());
                DispatchResult {
                    success: true,
                    message_sent: Some(message),
                    error: None,
                    failed_after: None,
                }
            }
            Err(e) => {
                tracing::error!("{} after {:?}: {}", e.kind(), stage, e);
                DispatchResult {
                    success: false,
                    message_sent: None,
                    error: Some(e),
                    failed_after: Some(stage),
                }
            }
        }
    }

    async fn try_run(&self, today: NaiveDate, stage: &mut Stage) -> Result<String, DispatchError> {
        let creds = self.credentials.load().await?;
        *stage = Stage::CredentialsLoaded;

        let query =
            DeadlineQueryService::new(self.data_source, &creds.notion_token, &creds.database_id);
        let raws = query.fetch_due_soon(today).await?;
        *stage = Stage::Fetched;

        let assignments = mapper::map_all(&raws)?;
        *stage = Stage::Mapped;

        let message = format::format(&assignments)?;
        *stage = Stage::Rendered;

        let session = self.chat.open(&creds.discord_token).await?;
        let sent = deliver(session.as_ref(), creds.discord_channel_id, &message).await;
        session.close().await;
        sent?;
        *stage = Stage::Sent;

        tracing::info!(
            "message sent successfully to discord channel {}",
            creds.discord_channel_id
        );
        *stage = Stage::Done;
        Ok(message)
    }
}

async fn deliver(
    session: &dyn ChatSession,
    channel_id: u64,
    message: &str,
) -> Result<(), DispatchError> {
    let channel = session.resolve_channel(channel_id).await?;
    session.send(channel, message).await
}
