//! HTTP-ingested channels (SMS gateway callbacks, notifications).
//!
//! The axum router owns the actual listener, so a [`WebhookChannel`] only
//! tracks lifecycle and holds the per-target queue that deferred replies
//! land in until a client polls `GET /notifications`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chirp_channels::{Channel, ChannelError, ChannelStatus, ReplySink, StatusCell};
use chirp_core::types::Service;
use chirp_store::SharedStore;

/// Lines kept per target when nobody polls; the oldest are dropped first.
pub const MAX_PENDING_PER_TARGET: usize = 100;

/// Pending outbound lines per routing target.
pub struct NotificationQueue {
    pending: DashMap<String, VecDeque<String>>,
    cap: usize,
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::with_capacity(MAX_PENDING_PER_TARGET)
    }
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            pending: DashMap::new(),
            cap: cap.max(1),
        }
    }

    pub fn push(&self, target: &str, text: &str) {
        let mut lines = self.pending.entry(target.to_string()).or_default();
        if lines.len() >= self.cap {
            lines.pop_front();
            warn!(target, cap = self.cap, "notification queue full, dropping oldest");
        }
        lines.push_back(text.to_string());
    }

    /// Remove and return everything queued for `target`, oldest first.
    pub fn drain(&self, target: &str) -> Vec<String> {
        self.pending
            .remove(target)
            .map(|(_, lines)| lines.into())
            .unwrap_or_default()
    }

    pub fn len(&self, target: &str) -> usize {
        self.pending.get(target).map(|l| l.len()).unwrap_or(0)
    }
}

pub struct WebhookChannel {
    service: Service,
    queue: Arc<NotificationQueue>,
    status: StatusCell,
    stop: Mutex<Option<CancellationToken>>,
}

impl WebhookChannel {
    pub fn new(service: Service, queue: Arc<NotificationQueue>) -> Self {
        Self {
            service,
            queue,
            status: StatusCell::new(),
            stop: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        self.service.as_str()
    }

    /// Stays connected until `disconnect`; requests arrive through the router.
    async fn connect(&self, _store: SharedStore) -> Result<(), ChannelError> {
        let token = CancellationToken::new();
        *self.stop.lock().unwrap_or_else(|p| p.into_inner()) = Some(token.clone());
        self.status.set(ChannelStatus::Connected);
        info!(channel = %self.service, "webhook channel ready");

        token.cancelled().await;
        self.status.set(ChannelStatus::Disconnected);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ChannelError> {
        if let Some(token) = self.stop.lock().unwrap_or_else(|p| p.into_inner()).take() {
            token.cancel();
        }
        Ok(())
    }

    async fn send(&self, target: &str, text: &str) -> Result<(), ChannelError> {
        self.queue.push(target, text);
        Ok(())
    }

    fn status(&self) -> ChannelStatus {
        self.status.get()
    }
}

/// Reply sink for one HTTP request.
///
/// Lines sent while the request is open become the response body; anything
/// arriving after [`RequestSink::finish`] (deferred replies) is queued.
pub struct RequestSink {
    captured: Mutex<Option<Vec<String>>>,
    queue: Arc<NotificationQueue>,
}

impl RequestSink {
    pub fn new(queue: Arc<NotificationQueue>) -> Self {
        Self {
            captured: Mutex::new(Some(Vec::new())),
            queue,
        }
    }

    /// Close the capture window and return the captured lines.
    pub fn finish(&self) -> Vec<String> {
        self.captured
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReplySink for RequestSink {
    async fn send(&self, target: &str, text: &str) -> Result<(), ChannelError> {
        let mut captured = self.captured.lock().unwrap_or_else(|p| p.into_inner());
        match captured.as_mut() {
            Some(lines) => lines.push(text.to_string()),
            None => {
                debug!(target, "queueing late webhook reply");
                self.queue.push(target, text);
            }
        }
        Ok(())
    }
}
