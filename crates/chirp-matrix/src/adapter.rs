use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chirp_channels::{Channel, ChannelError, ChannelStatus, Dispatcher, ReplySink, StatusCell};
use chirp_core::config::MatrixConfig;
use chirp_core::types::{Message, Service};
use chirp_store::{get_or_default, require, set_logged, SharedStore};

use crate::client::{MatrixClient, SYNC_TIMEOUT_MS};
use crate::error::MatrixError;
use crate::sync::SyncResponse;

pub const ACCESS_TOKEN_KEY: &str = "matrix:access_token";
pub const USER_ID_KEY: &str = "matrix:user_id";
/// Sync cursor; absent on first start.
pub const NEXT_BATCH_KEY: &str = "matrix:next_batch";

#[derive(Default)]
struct MatrixSink {
    client: RwLock<Option<Arc<MatrixClient>>>,
}

#[async_trait]
impl ReplySink for MatrixSink {
    async fn send(&self, target: &str, text: &str) -> Result<(), ChannelError> {
        let client = self
            .client
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or_else(|| ChannelError::Disconnected("matrix is not connected".to_string()))?;
        client
            .send_text(target, text)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }
}

pub struct MatrixChannel {
    config: MatrixConfig,
    dispatcher: Arc<Dispatcher>,
    sink: Arc<MatrixSink>,
    status: StatusCell,
    stop: Mutex<Option<CancellationToken>>,
}

impl MatrixChannel {
    pub fn new(config: MatrixConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            sink: Arc::new(MatrixSink::default()),
            status: StatusCell::new(),
            stop: Mutex::new(None),
        }
    }

    fn fail(&self, err: ChannelError) -> ChannelError {
        self.status.set(ChannelStatus::Error(err.to_string()));
        err
    }

    async fn handle_sync(
        &self,
        client: &MatrixClient,
        user_id: &str,
        sync: &SyncResponse,
        sink: &Arc<dyn ReplySink>,
    ) {
        for room_id in sync.invites_from(&self.config.owner, user_id) {
            info!(room = %room_id, "matrix invite from owner");
            if let Err(e) = client.join(&room_id).await {
                warn!(room = %room_id, error = %e, "matrix join failed");
            }
        }

        for text in sync.text_messages() {
            let msg = Message::new(Service::Matrix, text.room_id, text.sender, text.body);
            self.dispatcher
                .dispatch(user_id, &msg, Arc::clone(sink))
                .await;
        }
    }

    async fn run(
        &self,
        client: Arc<MatrixClient>,
        user_id: &str,
        store: &SharedStore,
        token: CancellationToken,
    ) -> Result<(), MatrixError> {
        let mut since = get_or_default(store.as_ref(), NEXT_BATCH_KEY);

        // Without a cursor, skip the backlog instead of answering history.
        if since.is_empty() {
            let initial = client.sync(None, 0).await?;
            since = initial.next_batch;
            set_logged(store.as_ref(), NEXT_BATCH_KEY, &since);
            debug!("matrix backlog skipped");
        }

        self.status.set(ChannelStatus::Connected);
        info!(user = %user_id, homeserver = %self.config.homeserver, "matrix connected");

        let sink: Arc<dyn ReplySink> = self.sink.clone();
        loop {
            let sync = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                sync = client.sync(Some(&since), SYNC_TIMEOUT_MS) => sync,
            };
            let sync = match sync {
                Ok(sync) => sync,
                Err(MatrixError::RateLimited { retry_after_ms }) => {
                    warn!(retry_after_ms, "matrix sync rate limited");
                    tokio::select! {
                        _ = token.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(Duration::from_millis(retry_after_ms)) => continue,
                    }
                }
                Err(e) => return Err(e),
            };

            self.handle_sync(&client, user_id, &sync, &sink).await;

            since = sync.next_batch;
            set_logged(store.as_ref(), NEXT_BATCH_KEY, &since);
        }
    }
}

#[async_trait]
impl Channel for MatrixChannel {
    fn name(&self) -> &str {
        "matrix"
    }

    async fn connect(&self, store: SharedStore) -> Result<(), ChannelError> {
        self.status.set(ChannelStatus::Connecting);

        let access_token = require(store.as_ref(), ACCESS_TOKEN_KEY)
            .map_err(|e| self.fail(ChannelError::missing_credential(ACCESS_TOKEN_KEY, e)))?;
        let user_id = require(store.as_ref(), USER_ID_KEY)
            .map_err(|e| self.fail(ChannelError::missing_credential(USER_ID_KEY, e)))?;

        let client = MatrixClient::new(&self.config.homeserver, access_token)
            .map(Arc::new)
            .map_err(|e| self.fail(e.into()))?;

        let token = CancellationToken::new();
        *self.stop.lock().unwrap_or_else(|p| p.into_inner()) = Some(token.clone());
        *self.sink.client.write().unwrap_or_else(|p| p.into_inner()) = Some(Arc::clone(&client));

        let result = self.run(client, &user_id, &store, token).await;
        self.sink.client.write().unwrap_or_else(|p| p.into_inner()).take();

        match result {
            Ok(()) => {
                self.status.set(ChannelStatus::Disconnected);
                info!("matrix disconnected");
                Ok(())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    async fn disconnect(&self) -> Result<(), ChannelError> {
        if let Some(token) = self.stop.lock().unwrap_or_else(|p| p.into_inner()).take() {
            token.cancel();
        }
        Ok(())
    }

    async fn send(&self, target: &str, text: &str) -> Result<(), ChannelError> {
        self.sink.send(target, text).await
    }

    fn status(&self) -> ChannelStatus {
        self.status.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chirp_core::config::MatchMode;
    use chirp_plugins::Registry;
    use chirp_store::{MemoryStore, Store};
    use mockito::Matcher;

    fn channel(homeserver: &str, store: SharedStore) -> MatrixChannel {
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(Registry::builtin().unwrap()),
            store,
            "chirp",
            MatchMode::LastWins,
        ));
        MatrixChannel::new(
            MatrixConfig {
                homeserver: homeserver.to_string(),
                owner: "@owner:example.org".into(),
                restart: false,
            },
            dispatcher,
        )
    }

    #[tokio::test]
    async fn missing_token_is_fatal() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let ch = channel("http://127.0.0.1:1", store.clone());
        let err = ch.connect(store).await.unwrap_err();
        assert!(matches!(err, ChannelError::ConfigError(_)));
    }

    #[tokio::test]
    async fn send_while_disconnected_fails() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let ch = channel("http://127.0.0.1:1", store);
        assert!(matches!(
            ch.send("!r:example.org", "hi").await,
            Err(ChannelError::Disconnected(_))
        ));
    }

    #[tokio::test]
    async fn disconnect_interrupts_rate_limit_wait() {
        let mut server = mockito::Server::new_async().await;
        let _limited = server
            .mock("GET", "/_matrix/client/v3/sync")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body(r#"{"errcode":"M_LIMIT_EXCEEDED","retry_after_ms":600000}"#)
            .expect_at_least(1)
            .create_async()
            .await;

        let store: SharedStore = Arc::new(MemoryStore::with_entries([
            (ACCESS_TOKEN_KEY, "secret"),
            (USER_ID_KEY, "@chirp:example.org"),
            (NEXT_BATCH_KEY, "s1"),
        ]));
        let ch = Arc::new(channel(&server.url(), store.clone()));
        let run = tokio::spawn({
            let ch = Arc::clone(&ch);
            async move { ch.connect(store).await }
        });

        for _ in 0..100 {
            if ch.status() == ChannelStatus::Connected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // Let the loop reach the ten-minute back-off.
        tokio::time::sleep(Duration::from_millis(200)).await;
        ch.disconnect().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(ch.status(), ChannelStatus::Disconnected);
    }

    #[tokio::test]
    async fn one_sync_round_joins_answers_and_advances_cursor() {
        let mut server = mockito::Server::new_async().await;
        let sync = server
            .mock("GET", "/_matrix/client/v3/sync")
            .match_query(Matcher::UrlEncoded("since".into(), "s1".into()))
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "next_batch": "s2",
                    "rooms": {
                        "invite": { "!new:example.org": { "invite_state": { "events": [
                            { "type": "m.room.member", "sender": "@owner:example.org",
                              "state_key": "@chirp:example.org", "content": { "membership": "invite" } }
                        ]}}},
                        "join": { "!room:example.org": { "timeline": { "events": [
                            { "type": "m.room.message", "sender": "@chirp:example.org",
                              "content": { "msgtype": "m.text", "body": "chirp version" } },
                            { "type": "m.room.message", "sender": "@alice:example.org",
                              "content": { "msgtype": "m.text", "body": "chirp version" } }
                        ]}}}
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;
        // Later rounds: nothing new until the test stops the loop.
        let _idle = server
            .mock("GET", "/_matrix/client/v3/sync")
            .match_query(Matcher::UrlEncoded("since".into(), "s2".into()))
            .with_status(200)
            .with_body(r#"{"next_batch":"s2"}"#)
            .create_async()
            .await;
        let join = server
            .mock("POST", "/_matrix/client/v3/rooms/%21new%3Aexample.org/join")
            .with_status(200)
            .with_body(r#"{"room_id":"!new:example.org"}"#)
            .create_async()
            .await;
        let reply = server
            .mock(
                "PUT",
                Matcher::Regex(r"^/_matrix/client/v3/rooms/%21room%3Aexample\.org/send/".into()),
            )
            .with_status(200)
            .with_body(r#"{"event_id":"$1"}"#)
            .expect(1)
            .create_async()
            .await;

        let store: SharedStore = Arc::new(MemoryStore::with_entries([
            (ACCESS_TOKEN_KEY, "secret"),
            (USER_ID_KEY, "@chirp:example.org"),
            (NEXT_BATCH_KEY, "s1"),
        ]));
        let ch = Arc::new(channel(&server.url(), store.clone()));
        let run = tokio::spawn({
            let ch = Arc::clone(&ch);
            let store = store.clone();
            async move { ch.connect(store).await }
        });

        // Wait for the first round to be fully handled.
        for _ in 0..100 {
            if store.get(NEXT_BATCH_KEY).unwrap() == "s2" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        ch.disconnect().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        sync.assert_async().await;
        join.assert_async().await;
        reply.assert_async().await;
        assert_eq!(store.get(NEXT_BATCH_KEY).unwrap(), "s2");
        assert_eq!(ch.status(), ChannelStatus::Disconnected);
    }
}
