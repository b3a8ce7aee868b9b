use crate::error::DispatchError;
use async_trait::async_trait;
use serenity::all::{Channel, ChannelId, CreateMessage, Http};

/// Opens authenticated sessions against a chat service.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn open(&self, token: &str) -> Result<Box<dyn ChatSession>, DispatchError>;
}

/// A connected session. Callers must `close` it on every path.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Checks the channel exists and is visible to the bot.
    async fn resolve_channel(&self, channel_id: u64) -> Result<u64, DispatchError>;

    async fn send(&self, channel_id: u64, content: &str) -> Result<(), DispatchError>;

    async fn close(self: Box<Self>);
}

pub struct Discord;

#[async_trait]
impl ChatService for Discord {
    async fn open(&self, token: &str) -> Result<Box<dyn ChatSession>, DispatchError> {
        let http = Http::new(token);
        let me = http
            .get_current_user()
            .await
            .map_err(|e| DispatchError::delivery(format!("discord login failed: {e}")))?;
        tracing::info!("discord client connected as {}", me.name);
        Ok(Box::new(DiscordSession { http }))
    }
}

struct DiscordSession {
    http: Http,
}

#[async_trait]
impl ChatSession for DiscordSession {
    async fn resolve_channel(&self, channel_id: u64) -> Result<u64, DispatchError> {
        let channel = ChannelId::new(channel_id).to_channel(&self.http).await.map_err(|e| {
            DispatchError::delivery(format!(
                "discord channel {channel_id} not found or bot lacks access: {e}"
            ))
        })?;
        match channel {
            Channel::Guild(guild_channel) => Ok(guild_channel.id.get()),
            Channel::Private(private_channel) => Ok(private_channel.id.get()),
            _ => Err(DispatchError::delivery(format!(
                "discord channel {channel_id} can't receive messages"
            ))),
        }
    }

    async fn send(&self, channel_id: u64, content: &str) -> Result<(), DispatchError> {
        ChannelId::new(channel_id)
            .send_message(&self.http, CreateMessage::new().content(content))
            .await
            .map_err(|e| DispatchError::delivery(format!("discord send failed: {e}")))?;
        Ok(())
    }

    async fn close(self: Box<Self>) {
        // the rest client holds no gateway connection, dropping it is enough
        tracing::debug!("discord session closed");
    }
}
