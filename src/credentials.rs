use crate::error::DispatchError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ssm::Client as SsmClient;
use dotenvy::dotenv;
use std::collections::HashMap;

pub const LAMBDA_ENV_FLAG: &str = "AWS_LAMBDA_FUNCTION_NAME";

const NOTION_TOKEN: &str = "NOTION_TOKEN";
const NOTION_DATABASE_ID: &str = "NOTION_DATABASE_ID";
const DISCORD_TOKEN: &str = "DISCORD_TOKEN";
const DISCORD_CHANNEL_ID: &str = "DISCORD_CHANNEL_ID";

// (env var, parameter store name)
const KEYS: [(&str, &str); 4] = [
    (NOTION_TOKEN, "/daily-deadline/notion-token"),
    (NOTION_DATABASE_ID, "/daily-deadline/notion-database-id"),
    (DISCORD_TOKEN, "/daily-deadline/discord-token"),
    (DISCORD_CHANNEL_ID, "/daily-deadline/discord-channel-id"),
];

/// The four secrets one run needs. Loaded once, then handed to whoever needs them.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub notion_token: String,
    pub database_id: String,
    pub discord_token: String,
    pub discord_channel_id: u64,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("notion_token", &"<redacted>")
            .field("database_id", &self.database_id)
            .field("discord_token", &"<redacted>")
            .field("discord_channel_id", &self.discord_channel_id)
            .finish()
    }
}

impl Credentials {
    /// Builds the full set from a key lookup, failing on the first missing or invalid key.
    pub fn from_lookup<F>(mut lookup: F) -> Result<Self, DispatchError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut required = |key: &str| -> Result<String, DispatchError> {
            match lookup(key).map(|v| v.trim().to_string()) {
                Some(value) if !value.is_empty() => Ok(value),
                _ => Err(DispatchError::configuration(format!("missing {key}"))),
            }
        };
        let notion_token = required(NOTION_TOKEN)?;
        let database_id = required(NOTION_DATABASE_ID)?;
        let discord_token = required(DISCORD_TOKEN)?;
        let raw_channel_id = required(DISCORD_CHANNEL_ID)?;
        let discord_channel_id = match raw_channel_id.parse::<u64>() {
            Ok(id) if id != 0 => id,
            _ => {
                return Err(DispatchError::configuration(format!(
                    "{DISCORD_CHANNEL_ID} is not a valid channel id: {raw_channel_id}"
                )))
            }
        };

        Ok(Self {
            notion_token,
            database_id,
            discord_token,
            discord_channel_id,
        })
    }
}

#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn load(&self) -> Result<Credentials, DispatchError>;
}

/// `.env` file plus process environment.
pub struct LocalEnv;

#[async_trait]
impl CredentialSource for LocalEnv {
    async fn load(&self) -> Result<Credentials, DispatchError> {
        if dotenv().is_err() {
            tracing::debug!("no .env file found, using process environment only");
        }
        Credentials::from_lookup(|key| std::env::var(key).ok())
    }
}

/// AWS SSM parameter store, values fetched with decryption.
pub struct ParameterStore {
    client: SsmClient,
}

impl ParameterStore {
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self {
            client: SsmClient::new(&config),
        }
    }

    async fn fetch(&self, name: &str) -> Result<Option<String>, DispatchError> {
        let output = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| DispatchError::configuration(format!("failed to read {name}: {e}")))?;
        Ok(output.parameter().and_then(|p| p.value()).map(str::to_string))
    }
}

#[async_trait]
impl CredentialSource for ParameterStore {
    async fn load(&self) -> Result<Credentials, DispatchError> {
        let mut fetched = HashMap::with_capacity(KEYS.len());
        for (_, parameter) in KEYS {
            fetched.insert(parameter, self.fetch(parameter).await?);
        }
        from_parameters(&fetched)
    }
}

/// Maps parameter store values (keyed by parameter name) back onto the env keys.
fn from_parameters(
    fetched: &HashMap<&str, Option<String>>,
) -> Result<Credentials, DispatchError> {
    Credentials::from_lookup(|key| {
        let (_, parameter) = KEYS.iter().find(|(env_key, _)| *env_key == key)?;
        fetched.get(parameter).cloned().flatten()
    })
}

/// Parameter store inside Lambda, local environment everywhere else.
pub async fn credential_source(in_lambda: bool) -> Box<dyn CredentialSource> {
    if in_lambda {
        Box::new(ParameterStore::from_env().await)
    } else {
        Box::new(LocalEnv)
    }
}
