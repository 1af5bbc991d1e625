//! IRC channel adapter.
//!
//! Plaintext TCP, one line per frame via `LinesCodec`. A writer task owns
//! the sink half so replies (including deferred ones) never block the read
//! loop.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chirp_channels::{
    Channel, ChannelError, ChannelStatus, Dispatcher, Outbox, ReplySink, StatusCell,
};
use chirp_core::config::IrcConfig;
use chirp_store::SharedStore;

use crate::error::IrcError;
use crate::handler::{privmsg, Action, Session};

/// RFC 1459 caps a line at 512 bytes; servers with IRCv3 tags send more.
const MAX_LINE_LEN: usize = 8192;

#[derive(Debug, Default)]
struct IrcSink {
    outbox: Outbox,
}

#[async_trait]
impl ReplySink for IrcSink {
    async fn send(&self, target: &str, text: &str) -> Result<(), ChannelError> {
        self.outbox.push(privmsg(target, text)).await
    }
}

pub struct IrcChannel {
    config: IrcConfig,
    dispatcher: Arc<Dispatcher>,
    sink: Arc<IrcSink>,
    status: StatusCell,
    stop: Mutex<Option<CancellationToken>>,
}

impl IrcChannel {
    pub fn new(config: IrcConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            sink: Arc::new(IrcSink::default()),
            status: StatusCell::new(),
            stop: Mutex::new(None),
        }
    }

    async fn run(&self, stream: TcpStream, token: CancellationToken) -> Result<(), IrcError> {
        let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LEN));
        let (mut lines_out, mut lines_in) = framed.split();

        let (tx, mut rx) = mpsc::channel::<String>(1);
        let writer = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                debug!(line = %line, "irc >>");
                if let Err(e) = lines_out.send(line).await {
                    warn!(error = %e, "irc write failed");
                    break;
                }
            }
        });
        self.sink.outbox.attach(tx);

        let mut session = Session::new(&self.config.nick, self.config.rooms.clone());
        for line in session.register(
            self.config.user.as_deref(),
            self.config.password.as_deref(),
        ) {
            if self.sink.outbox.push(line).await.is_err() {
                break;
            }
        }

        let sink: Arc<dyn ReplySink> = self.sink.clone();
        let result = loop {
            let line = tokio::select! {
                _ = token.cancelled() => {
                    let _ = self.sink.outbox.push("QUIT :bye".to_string()).await;
                    break Ok(());
                }
                line = lines_in.next() => line,
            };
            let line = match line {
                Some(Ok(line)) => line,
                Some(Err(e)) => break Err(IrcError::from(e)),
                None => break Err(IrcError::Closed),
            };

            for action in session.handle_line(&line) {
                match action {
                    Action::Send(reply) => {
                        if let Err(e) = self.sink.outbox.push(reply).await {
                            warn!(error = %e, "irc control reply dropped");
                        }
                    }
                    Action::Dispatch(msg) => {
                        self.dispatcher
                            .dispatch(session.nick(), &msg, Arc::clone(&sink))
                            .await;
                    }
                }
            }
            if session.is_registered() && !matches!(self.status.get(), ChannelStatus::Connected) {
                self.status.set(ChannelStatus::Connected);
            }
        };

        self.sink.outbox.detach();
        let _ = writer.await;
        result
    }
}

#[async_trait]
impl Channel for IrcChannel {
    fn name(&self) -> &str {
        "irc"
    }

    async fn connect(&self, _store: SharedStore) -> Result<(), ChannelError> {
        self.status.set(ChannelStatus::Connecting);

        let addr = (self.config.server.as_str(), self.config.port);
        let stream = TcpStream::connect(addr).await.map_err(|e| {
            let err = ChannelError::ConnectionFailed(format!(
                "{}:{}: {e}",
                self.config.server, self.config.port
            ));
            self.status.set(ChannelStatus::Error(err.to_string()));
            err
        })?;
        info!(server = %self.config.server, port = self.config.port, "irc connected");

        let token = CancellationToken::new();
        *self.stop.lock().unwrap_or_else(|p| p.into_inner()) = Some(token.clone());

        match self.run(stream, token).await {
            Ok(()) => {
                self.status.set(ChannelStatus::Disconnected);
                info!("irc disconnected");
                Ok(())
            }
            Err(e) => {
                let err = ChannelError::from(e);
                self.status.set(ChannelStatus::Error(err.to_string()));
                Err(err)
            }
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
