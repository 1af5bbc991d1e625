use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::MatrixError;
use crate::render::{markdown_to_html, HTML_FORMAT};
use crate::sync::SyncResponse;

/// Server-side long-poll window for `/sync`.
pub const SYNC_TIMEOUT_MS: u64 = 30_000;

/// Thin client-server API wrapper: only the four calls the bot makes.
pub struct MatrixClient {
    client: reqwest::Client,
    homeserver: String,
    access_token: String,
}

impl MatrixClient {
    pub fn new(homeserver: &str, access_token: impl Into<String>) -> Result<Self, MatrixError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(SYNC_TIMEOUT_MS) + Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            homeserver: homeserver.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/_matrix/client/v3{}", self.homeserver, path)
    }

    /// One `/sync` round. `timeout_ms = 0` returns immediately.
    pub async fn sync(&self, since: Option<&str>, timeout_ms: u64) -> Result<SyncResponse, MatrixError> {
        let mut query = vec![("timeout", timeout_ms.to_string())];
        if let Some(since) = since {
            query.push(("since", since.to_string()));
        }

        let resp = self
            .client
            .get(self.url("/sync"))
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await?;
        let resp = check(resp).await?;

        resp.json()
            .await
            .map_err(|e| MatrixError::Parse(e.to_string()))
    }

    pub async fn join(&self, room_id: &str) -> Result<(), MatrixError> {
        let path = format!("/rooms/{}/join", urlencoding::encode(room_id));
        let resp = self
            .client
            .post(self.url(&path))
            .bearer_auth(&self.access_token)
            .json(&json!({}))
            .send()
            .await?;
        check(resp).await?;
        debug!(room = %room_id, "matrix room joined");
        Ok(())
    }

    /// Send `text` as `m.text` with an HTML rendering alongside.
    pub async fn send_text(&self, room_id: &str, text: &str) -> Result<(), MatrixError> {
        let txn = uuid::Uuid::new_v4();
        let path = format!(
            "/rooms/{}/send/m.room.message/{txn}",
            urlencoding::encode(room_id)
        );
        let resp = self
            .client
            .put(self.url(&path))
            .bearer_auth(&self.access_token)
            .json(&text_content(text))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

/// Event content for an outbound `m.text` message.
pub fn text_content(text: &str) -> Value {
    json!({
        "msgtype": "m.text",
        "body": text,
        "format": HTML_FORMAT,
        "formatted_body": markdown_to_html(text),
    })
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, MatrixError> {
    let status = resp.status().as_u16();
    if status == 429 {
        let body: Value = resp.json().await.unwrap_or_default();
        let retry_after_ms = body
            .get("retry_after_ms")
            .and_then(Value::as_u64)
            .unwrap_or(5000);
        return Err(MatrixError::RateLimited { retry_after_ms });
    }
    if !resp.status().is_success() {
        let text = resp.text().await.unwrap_or_default();
        warn!(status, body = %text, "Matrix API error");
        return Err(MatrixError::Api {
            status,
            message: text,
        });
    }
    Ok(resp)
}
