//! XMPP channel adapter.
//!
//! The `tokio_xmpp::Client` is owned by the event loop; replies reach it
//! through a capacity-1 queue so deferred sends never touch the stream
//! directly. Inbound messages are dispatched on their own tasks: the loop
//! is the only consumer of that queue and must never wait on a reply.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_xmpp::parsers::jid::{BareJid, Jid};
use tokio_xmpp::parsers::message::{Lang, Message as XmppMessage, MessageType};
use tokio_xmpp::parsers::presence::{Presence, Type as PresenceType};
use tokio_xmpp::{Client, Event, Stanza};
use tracing::{debug, info, warn};

use chirp_channels::{
    Channel, ChannelError, ChannelStatus, DispatchOutcome, Dispatcher, ReplySink, StatusCell,
};
use chirp_core::config::XmppConfig;
use chirp_core::types::{Message, Service};
use chirp_store::SharedStore;

use crate::error::XmppError;
use crate::route::route;

#[derive(Debug)]
struct Outgoing {
    to: String,
    text: String,
    groupchat: bool,
}

#[derive(Default)]
struct XmppSink {
    tx: RwLock<Option<mpsc::Sender<Outgoing>>>,
    /// Room JIDs we have seen groupchat traffic from.
    rooms: Mutex<HashSet<String>>,
}

impl XmppSink {
    fn remember_room(&self, room: &str) {
        self.rooms
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(room.to_string());
    }

    fn is_room(&self, jid: &str) -> bool {
        self.rooms
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(jid)
    }
}

#[async_trait]
impl ReplySink for XmppSink {
    async fn send(&self, target: &str, text: &str) -> Result<(), ChannelError> {
        let tx = self
            .tx
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or_else(|| ChannelError::Disconnected("xmpp is not connected".to_string()))?;
        let out = Outgoing {
            to: target.to_string(),
            text: text.to_string(),
            groupchat: self.is_room(target),
        };
        tx.send(out)
            .await
            .map_err(|_| ChannelError::Disconnected("xmpp stream has stopped".to_string()))
    }
}

pub struct XmppChannel {
    config: XmppConfig,
    dispatcher: Arc<Dispatcher>,
    sink: Arc<XmppSink>,
    status: StatusCell,
    stop: Mutex<Option<CancellationToken>>,
}

impl XmppChannel {
    pub fn new(config: XmppConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            sink: Arc::new(XmppSink::default()),
            status: StatusCell::new(),
            stop: Mutex::new(None),
        }
    }

    async fn run(
        &self,
        mut client: Client,
        own_jid: &str,
        mut rx: mpsc::Receiver<Outgoing>,
        token: CancellationToken,
    ) -> Result<(), XmppError> {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    if let Err(e) = client.send_end().await {
                        debug!(error = %e, "xmpp close failed");
                    }
                    return Ok(());
                }
                Some(out) = rx.recv() => {
                    match outgoing_stanza(&out) {
                        Ok(stanza) => {
                            if let Err(e) = client.send_stanza(stanza).await {
                                warn!(to = %out.to, error = %e, "xmpp send failed");
                            }
                        }
                        Err(e) => warn!(error = %e, "xmpp reply dropped"),
                    }
                }
                event = client.next() => {
                    let Some(event) = event else {
                        return Err(XmppError::Closed);
                    };
                    match event {
                        Event::Online { bound_jid, .. } => {
                            info!(jid = %bound_jid, "xmpp online");
                            let presence = Presence::new(PresenceType::None);
                            if let Err(e) = client.send_stanza(presence.into()).await {
                                warn!(error = %e, "xmpp presence failed");
                            }
                            self.status.set(ChannelStatus::Connected);
                        }
                        Event::Disconnected(e) => {
                            return Err(XmppError::Stream(e.to_string()));
                        }
                        Event::Stanza(Stanza::Message(msg)) => {
                            let dispatcher = Arc::clone(&self.dispatcher);
                            let sink = Arc::clone(&self.sink);
                            let own_jid = own_jid.to_string();
                            tokio::spawn(async move {
                                handle_message(&dispatcher, &sink, &msg, &own_jid).await;
                            });
                        }
                        Event::Stanza(Stanza::Presence(pres)) => {
                            debug!(from = ?pres.from, type_ = ?pres.type_, "xmpp presence");
                        }
                        Event::Stanza(Stanza::Iq(iq)) => {
                            debug!(id = iq.id(), "xmpp iq (unhandled)");
                        }
                    }
                }
            }
        }
    }
}

/// Normalize a message stanza. Returns the message and our self id for
/// its context; `None` for stanzas without a body or sender.
fn inbound(sink: &XmppSink, msg: &XmppMessage, own_jid: &str) -> Option<(Message, String)> {
    let body = msg
        .bodies
        .get(&Lang::default())
        .or_else(|| msg.bodies.values().next())?
        .clone();
    let sender = msg.from.as_ref()?.to_string();

    let groupchat = matches!(msg.type_, MessageType::Groupchat);
    let r = route(&sender, groupchat, own_jid);
    if groupchat {
        sink.remember_room(&r.to);
    }
    Some((Message::new(Service::Xmpp, r.to, r.from, body), r.self_id))
}

/// Dispatch one inbound stanza; replies are queued on the sink.
///
/// Must not run on the event loop: sends wait for the loop to drain the queue.
async fn handle_message(
    dispatcher: &Dispatcher,
    sink: &Arc<XmppSink>,
    msg: &XmppMessage,
    own_jid: &str,
) -> Option<DispatchOutcome> {
    let (message, self_id) = inbound(sink, msg, own_jid)?;
    let reply_sink: Arc<dyn ReplySink> = sink.clone();
    Some(dispatcher.dispatch(&self_id, &message, reply_sink).await)
}

fn outgoing_stanza(out: &Outgoing) -> Result<Stanza, XmppError> {
    let to = Jid::new(&out.to).map_err(|e| XmppError::InvalidJid {
        jid: out.to.clone(),
        reason: e.to_string(),
    })?;
    let mut msg = XmppMessage::new(Some(to));
    msg.type_ = if out.groupchat {
        MessageType::Groupchat
    } else {
        MessageType::Chat
    };
    msg.bodies.insert(Lang::default(), out.text.clone());
    Ok(msg.into())
}

#[async_trait]
impl Channel for XmppChannel {
    fn name(&self) -> &str {
        "xmpp"
    }

    async fn connect(&self, _store: SharedStore) -> Result<(), ChannelError> {
        self.status.set(ChannelStatus::Connecting);

        let jid = BareJid::new(&self.config.jid).map_err(|e| {
            let err: ChannelError = XmppError::InvalidJid {
                jid: self.config.jid.clone(),
                reason: e.to_string(),
            }
            .into();
            self.status.set(ChannelStatus::Error(err.to_string()));
            err
        })?;
        let own_jid = jid.to_string();
        let client = Client::new(jid, self.config.password.clone());

        let (tx, rx) = mpsc::channel(1);
        *self.sink.tx.write().unwrap_or_else(|p| p.into_inner()) = Some(tx);
        let token = CancellationToken::new();
        *self.stop.lock().unwrap_or_else(|p| p.into_inner()) = Some(token.clone());

        let result = self.run(client, &own_jid, rx, token).await;
        self.sink.tx.write().unwrap_or_else(|p| p.into_inner()).take();

        match result {
            Ok(()) => {
                self.status.set(ChannelStatus::Disconnected);
                info!("xmpp disconnected");
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
