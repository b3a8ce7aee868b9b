use crate::tasks::DispatchResult;
use crate::Error;
use chrono::{DateTime, SecondsFormat, Utc};
use lambda_runtime::{service_fn, LambdaEvent};
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

/// What the scheduled trigger gets back. Failures are reported here, never thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub status_code: u16,
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<&'static str>,
    pub timestamp: String,
}

impl StatusRecord {
    pub fn from_result(result: &DispatchResult, now: DateTime<Utc>) -> Self {
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Micros, false);
        match &result.error {
            None => Self {
                status_code: 200,
                status: "success",
                message: "Deadline reminder sent successfully".to_string(),
                error_type: None,
                timestamp,
            },
            Some(e) => Self {
                status_code: 500,
                status: "error",
                message: e.to_string(),
                error_type: Some(e.kind()),
                timestamp,
            },
        }
    }
}

async fn handler(event: LambdaEvent<Value>) -> Result<StatusRecord, Error> {
    let context = &event.context;
    let remaining_ms = i64::try_from(context.deadline)
        .map(|deadline| deadline - Utc::now().timestamp_millis())
        .unwrap_or_default();
    let span = tracing::info_span!(
        "lambda",
        function_name = %context.env_config.function_name,
        request_id = %context.request_id,
    );

    async move {
        tracing::info!(
            remaining_time_ms = remaining_ms,
            "deadline reminder bot execution started"
        );
        let result = crate::run_once(true).await;
        let record = StatusRecord::from_result(&result, Utc::now());
        if result.success {
            tracing::info!(status = "SUCCESS", "deadline reminder sent successfully to discord");
        } else {
            tracing::error!(
                status = "ERROR",
                error_type = ?record.error_type,
                failed_after = ?result.failed_after,
                "lambda execution failed: {}",
                record.message
            );
        }
        Ok(record)
    }
    .instrument(span)
    .await
}

pub async fn serve() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handler)).await
}
