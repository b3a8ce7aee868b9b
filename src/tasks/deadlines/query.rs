use crate::error::DispatchError;
use crate::tasks::deadlines::window::horizon_end;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

const NOTION_API: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

pub const DONE_PROPERTY: &str = "To Do";
pub const DUE_PROPERTY: &str = "Due Date";
pub const TITLE_PROPERTY: &str = "Assignment";
pub const CLASS_PROPERTY: &str = "Class";
pub const TYPE_PROPERTY: &str = "Type";

/// One page of the assignments database, as Notion returns it.
///
/// Everything is optional here so a missing property reaches the mapper
/// instead of failing the whole response decode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub properties: RawProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProperties {
    #[serde(rename = "Assignment")]
    pub assignment: Option<TitleProperty>,
    #[serde(rename = "Class")]
    pub class: Option<SelectProperty>,
    #[serde(rename = "Type")]
    pub kind: Option<SelectProperty>,
    #[serde(rename = "Due Date")]
    pub due_date: Option<DateProperty>,
    #[serde(rename = "Notes")]
    pub notes: Option<RichTextProperty>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextSegment {
    #[serde(default)]
    pub plain_text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TitleProperty {
    #[serde(default)]
    pub title: Vec<TextSegment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectOption {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectProperty {
    pub select: Option<SelectOption>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateValue {
    pub start: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateProperty {
    pub date: Option<DateValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RichTextProperty {
    #[serde(default)]
    pub rich_text: Vec<TextSegment>,
}

#[derive(Deserialize)]
struct QueryEnvelope {
    results: Vec<RawRecord>,
}

/// Anything that can answer a filtered database query.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn query_database(
        &self,
        token: &str,
        database_id: &str,
        filter: Value,
    ) -> Result<Vec<RawRecord>, DispatchError>;
}

pub struct NotionClient {
    http: Client,
    base_url: String,
}

impl NotionClient {
    pub fn new() -> Self {
        Self::with_base_url(NOTION_API)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for NotionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for NotionClient {
    async fn query_database(
        &self,
        token: &str,
        database_id: &str,
        filter: Value,
    ) -> Result<Vec<RawRecord>, DispatchError> {
        let url = format!("{}/databases/{}/query", self.base_url, database_id);
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&json!({ "filter": filter }))
            .send()
            .await
            .map_err(|e| DispatchError::data_source(format!("notion request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            DispatchError::data_source(format!(
                "failed to read notion response (status {status}): {e}"
            ))
        })?;
        if !status.is_success() {
            return Err(DispatchError::data_source(format!(
                "notion returned {status}: {body}"
            )));
        }

        let envelope: QueryEnvelope = serde_json::from_str(&body)
            .map_err(|e| DispatchError::data_source(format!("unexpected notion response: {e}")))?;
        Ok(envelope.results)
    }
}

/// Not completed, has a due date, due on or before the horizon.
pub fn due_soon_filter(today: NaiveDate) -> Value {
    let horizon = horizon_end(today).format("%Y-%m-%d").to_string();
    json!({
        "and": [
            { "property": DONE_PROPERTY, "checkbox": { "equals": false } },
            { "property": DUE_PROPERTY, "date": { "is_not_empty": true } },
            { "property": DUE_PROPERTY, "date": { "on_or_before": horizon } },
        ]
    })
}

pub struct DeadlineQueryService<'a> {
    source: &'a dyn DataSource,
    token: &'a str,
    database_id: &'a str,
}

impl<'a> DeadlineQueryService<'a> {
    pub fn new(source: &'a dyn DataSource, token: &'a str, database_id: &'a str) -> Self {
        Self {
            source,
            token,
            database_id,
        }
    }

    /// One query, no paging, no retry.
    pub async fn fetch_due_soon(&self, today: NaiveDate) -> Result<Vec<RawRecord>, DispatchError> {
        let records = self
            .source
            .query_database(self.token, self.database_id, due_soon_filter(today))
            .await?;
        tracing::info!("retrieved {} pages from notion", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    #[derive(Default)]
    struct RecordingSource {
        calls: Mutex<Vec<(String, String, Value)>>,
        fail: bool,
    }

    #[async_trait]
    impl DataSource for RecordingSource {
        async fn query_database(
            &self,
            token: &str,
            database_id: &str,
            filter: Value,
        ) -> Result<Vec<RawRecord>, DispatchError> {
            self.calls
                .lock()
                .unwrap()
                .push((token.to_string(), database_id.to_string(), filter));
            if self.fail {
                return Err(DispatchError::data_source("401 unauthorized"));
            }
            Ok(vec![RawRecord::default()])
        }
    }

    #[test]
    fn filter_bounds_by_horizon() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 30).unwrap();
        let filter = due_soon_filter(today);
        let clauses = filter["and"].as_array().unwrap();
        assert_eq!(clauses.len(), 3);
        assert_eq!(clauses[0]["property"], "To Do");
        assert_eq!(clauses[0]["checkbox"]["equals"], false);
        assert_eq!(clauses[1]["date"]["is_not_empty"], true);
        assert_eq!(clauses[2]["property"], "Due Date");
        assert_eq!(clauses[2]["date"]["on_or_before"], "2025-02-02");
    }

    #[tokio::test]
    async fn issues_exactly_one_query() {
        let source = RecordingSource::default();
        let service = DeadlineQueryService::new(&source, "tok", "db");
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let records = service.fetch_due_soon(today).await.unwrap();
        assert_eq!(records.len(), 1);

        let calls = source.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "tok");
        assert_eq!(calls[0].1, "db");
        assert_eq!(calls[0].2, due_soon_filter(today));
    }

    #[tokio::test]
    async fn source_failure_propagates_unchanged() {
        let source = RecordingSource {
            fail: true,
            ..Default::default()
        };
        let service = DeadlineQueryService::new(&source, "tok", "db");
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let err = service.fetch_due_soon(today).await.unwrap_err();
        assert_eq!(err, DispatchError::data_source("401 unauthorized"));
    }

    #[test]
    fn decodes_notion_page() {
        let page = json!({
            "object": "page",
            "id": "abc",
            "properties": {
                "Assignment": { "type": "title", "title": [{ "plain_text": "Lab 3" }] },
                "Class": { "type": "select", "select": null },
                "Type": {
                    "type": "select",
                    "select": { "id": "x", "name": "Lab", "color": "red" }
                },
                "Due Date": { "type": "date", "date": { "start": "2025-01-22", "end": null } },
                "Notes": { "type": "rich_text", "rich_text": [] },
                "To Do": { "type": "checkbox", "checkbox": false }
            }
        });
        let record: RawRecord = serde_json::from_value(page).unwrap();
        assert_eq!(record.id, "abc");
        let props = record.properties;
        assert_eq!(props.assignment.unwrap().title[0].plain_text, "Lab 3");
        assert!(props.class.unwrap().select.is_none());
        assert_eq!(props.kind.unwrap().select.unwrap().name, "Lab");
        let due = props.due_date.unwrap().date.unwrap();
        assert_eq!(due.start.as_deref(), Some("2025-01-22"));
        assert!(props.notes.unwrap().rich_text.is_empty());
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(split) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..split]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        raw.len() >= split + 4 + length
    }

    /// Answers a single HTTP request with a canned response, hands back the raw request.
    async fn notion_stub(status: &'static str, body: Value) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&request) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let body = body.to_string();
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).into_owned()
        });
        (base_url, handle)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 21).unwrap()
    }

    #[tokio::test]
    async fn notion_client_decodes_results_and_ignores_paging() {
        let (base_url, server) = notion_stub(
            "200 OK",
            json!({
                "object": "list",
                "results": [{ "id": "a", "properties": {} }, { "id": "b", "properties": {} }],
                "has_more": true,
                "next_cursor": "c"
            }),
        )
        .await;
        let client = NotionClient::with_base_url(base_url);

        let records = client
            .query_database("secret_tok", "db123", due_soon_filter(today()))
            .await
            .unwrap();

        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /databases/db123/query HTTP/1.1"));
        let lowered = request.to_ascii_lowercase();
        assert!(lowered.contains("authorization: bearer secret_tok"));
        assert!(lowered.contains("notion-version: 2022-06-28"));
        assert!(request.contains(r#""on_or_before":"2025-01-24""#));
    }

    #[tokio::test]
    async fn notion_rejection_is_a_data_source_error() {
        let (base_url, _server) = notion_stub(
            "401 Unauthorized",
            json!({ "object": "error", "status": 401, "code": "unauthorized" }),
        )
        .await;
        let client = NotionClient::with_base_url(base_url);

        let err = client
            .query_database("bad", "db123", due_soon_filter(today()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "DataSourceError");
        let message = err.to_string();
        assert!(message.contains("401"));
        assert!(message.contains("unauthorized"));
    }

    #[tokio::test]
    async fn response_without_results_is_a_data_source_error() {
        let (base_url, _server) = notion_stub("200 OK", json!({ "object": "list" })).await;
        let client = NotionClient::with_base_url(base_url);

        let err = client
            .query_database("tok", "db123", due_soon_filter(today()))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::DataSource(_)));
    }

    #[tokio::test]
    async fn unreachable_notion_is_a_data_source_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let client = NotionClient::with_base_url(base_url);

        let err = client
            .query_database("tok", "db123", due_soon_filter(today()))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::DataSource(_)));
        assert!(err.to_string().contains("notion request failed"));
    }
}
