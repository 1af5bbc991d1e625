use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chirp_channels::{
    Channel, ChannelError, ChannelStatus, Dispatcher, Outbox, ReplySink, StatusCell,
};
use chirp_core::types::{Message, Service};
use chirp_store::{require, SharedStore};

use crate::codec::SignalCodec;
use crate::frames::{parse_frame, ChatEvent, SendRequest};

/// Store key holding the bot's own Signal account UUID.
pub const ACCOUNT_KEY: &str = "signal:account";

/// Outbound half: serializes send requests onto the writer task's queue.
///
/// Shared between the adapter and any deferred reply still in flight.
#[derive(Debug, Default)]
pub struct SignalSink {
    outbox: Outbox,
}

#[async_trait]
impl ReplySink for SignalSink {
    async fn send(&self, target: &str, text: &str) -> Result<(), ChannelError> {
        if !self.outbox.is_attached() {
            return Err(ChannelError::Disconnected("signal is not connected".to_string()));
        }
        let frame = serde_json::to_string(&SendRequest::new(target, text))
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        self.outbox.push(frame).await
    }
}

/// Signal chat adapter backed by a signal-cli JSON-RPC socket.
pub struct SignalChannel {
    socket_path: PathBuf,
    dispatcher: Arc<Dispatcher>,
    sink: Arc<SignalSink>,
    status: StatusCell,
    stop: Mutex<Option<CancellationToken>>,
}

impl SignalChannel {
    pub fn new(socket_path: impl Into<PathBuf>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            socket_path: socket_path.into(),
            dispatcher,
            sink: Arc::new(SignalSink::default()),
            status: StatusCell::new(),
            stop: Mutex::new(None),
        }
    }

    fn fail(&self, err: ChannelError) -> ChannelError {
        self.status.set(ChannelStatus::Error(err.to_string()));
        err
    }
}

#[async_trait]
impl Channel for SignalChannel {
    fn name(&self) -> &str {
        "signal"
    }

    async fn connect(&self, store: SharedStore) -> Result<(), ChannelError> {
        self.status.set(ChannelStatus::Connecting);

        let account = require(store.as_ref(), ACCOUNT_KEY)
            .map_err(|e| self.fail(ChannelError::missing_credential(ACCOUNT_KEY, e)))?;

        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            self.fail(ChannelError::ConnectionFailed(format!(
                "{}: {e}",
                self.socket_path.display()
            )))
        })?;
        let (read_half, write_half) = stream.into_split();

        let (inbound_tx, mut inbound_rx) = mpsc::channel::<ChatEvent>(1);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(1);

        let reader = tokio::spawn(async move {
            let mut frames = FramedRead::new(read_half, SignalCodec::new());
            while let Some(frame) = frames.next().await {
                match frame {
                    Ok(line) => {
                        let Some(event) = parse_frame(&line) else {
                            continue;
                        };
                        if inbound_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "signal read failed");
                        break;
                    }
                }
            }
            debug!("signal reader finished");
        });

        let writer = tokio::spawn(async move {
            let mut frames = FramedWrite::new(write_half, SignalCodec::new());
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = frames.send(frame).await {
                    warn!(error = %e, "signal write failed");
                    break;
                }
            }
            debug!("signal writer finished");
        });

        let token = CancellationToken::new();
        *self.stop.lock().unwrap_or_else(|p| p.into_inner()) = Some(token.clone());
        self.sink.outbox.attach(outbound_tx);
        self.status.set(ChannelStatus::Connected);
        info!(socket = %self.socket_path.display(), "signal connected");

        let sink: Arc<dyn ReplySink> = self.sink.clone();
        let stopped = loop {
            tokio::select! {
                _ = token.cancelled() => break true,
                event = inbound_rx.recv() => {
                    let Some(event) = event else { break false };
                    let msg = Message::new(Service::Signal, event.target, event.sender, event.body);
                    self.dispatcher.dispatch(&account, &msg, Arc::clone(&sink)).await;
                }
            }
        };

        // Dropping the last sender lets the writer drain and exit.
        self.sink.outbox.detach();
        reader.abort();
        let _ = writer.await;

        if stopped {
            self.status.set(ChannelStatus::Disconnected);
            info!("signal disconnected");
            Ok(())
        } else {
            Err(self.fail(ChannelError::Disconnected(
                "signal socket closed".to_string(),
            )))
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
    use std::time::Duration;

    use chirp_core::config::MatchMode;
    use chirp_plugins::Registry;
    use chirp_store::MemoryStore;
    use serde_json::Value;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::UnixListener;

    const BOT: &str = "00000000-0000-4000-8000-000000000001";
    const ALICE: &str = "6f1c2b9a-3d4e-4f5a-8b6c-7d8e9f0a1b2c";

    fn dispatcher(store: SharedStore) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            Arc::new(Registry::builtin().unwrap()),
            store,
            "chirp",
            MatchMode::LastWins,
        ))
    }

    #[tokio::test]
    async fn send_while_disconnected_fails() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let ch = SignalChannel::new("/nonexistent.sock", dispatcher(store));
        let err = ch.send(ALICE, "hi").await.unwrap_err();
        assert!(matches!(err, ChannelError::Disconnected(_)));
    }

    #[tokio::test]
    async fn missing_account_is_fatal() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let ch = SignalChannel::new("/nonexistent.sock", dispatcher(store.clone()));
        let err = ch.connect(store).await.unwrap_err();
        assert!(matches!(err, ChannelError::ConfigError(_)));
        assert!(matches!(ch.status(), ChannelStatus::Error(_)));
    }

    #[tokio::test]
    async fn answers_over_the_socket_until_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signal.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let store: SharedStore = Arc::new(MemoryStore::with_entries([(ACCOUNT_KEY, BOT)]));
        let ch = Arc::new(SignalChannel::new(&path, dispatcher(store.clone())));
        let run = tokio::spawn({
            let ch = Arc::clone(&ch);
            async move { ch.connect(store).await }
        });

        let (mut daemon, _) = listener.accept().await.unwrap();
        // A version request from Alice, a keepalive, and our own echo.
        let payload = format!(
            concat!(
                r#"{{"jsonrpc":"2.0","method":"receive","params":{{"envelope":{{"sourceUuid":"{alice}","dataMessage":{{"message":"chirp version"}}}}}}}}"#,
                "\n",
                r#"{{"jsonrpc":"2.0","method":"ping"}}"#,
                "\n",
                r#"{{"jsonrpc":"2.0","method":"receive","params":{{"envelope":{{"sourceUuid":"{bot}","dataMessage":{{"message":"chirp version"}}}}}}}}"#,
                "\n",
            ),
            alice = ALICE,
            bot = BOT
        );
        daemon.write_all(payload.as_bytes()).await.unwrap();

        let (read_half, _) = daemon.split();
        let mut lines = BufReader::new(read_half).lines();
        let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let sent: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(sent["method"], "send");
        assert_eq!(sent["params"]["recipient"][0], ALICE);
        assert!(sent["params"]["message"]
            .as_str()
            .unwrap()
            .starts_with("chirp "));
        assert_eq!(ch.status(), ChannelStatus::Connected);

        drop(lines);
        drop(daemon);
        let result = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(ChannelError::Disconnected(_))));
    }

    #[tokio::test]
    async fn malformed_line_does_not_end_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signal.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let store: SharedStore = Arc::new(MemoryStore::with_entries([(ACCOUNT_KEY, BOT)]));
        let ch = Arc::new(SignalChannel::new(&path, dispatcher(store.clone())));
        let run = tokio::spawn({
            let ch = Arc::clone(&ch);
            async move { ch.connect(store).await }
        });

        let (mut daemon, _) = listener.accept().await.unwrap();
        let mut payload = b"{\"junk\":\"\xff\xfe\"}\n".to_vec();
        payload.extend_from_slice(
            format!(
                r#"{{"jsonrpc":"2.0","method":"receive","params":{{"envelope":{{"sourceUuid":"{ALICE}","dataMessage":{{"message":"chirp version"}}}}}}}}"#
            )
            .as_bytes(),
        );
        payload.push(b'\n');
        daemon.write_all(&payload).await.unwrap();

        let (read_half, _) = daemon.split();
        let mut lines = BufReader::new(read_half).lines();
        let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let sent: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(sent["params"]["recipient"][0], ALICE);
        assert_eq!(ch.status(), ChannelStatus::Connected);
        assert!(!run.is_finished());

        ch.disconnect().await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
