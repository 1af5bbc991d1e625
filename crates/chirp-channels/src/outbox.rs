use std::sync::RwLock;

use tokio::sync::mpsc;

use crate::error::ChannelError;

/// Handoff point to a connection's writer task.
///
/// Empty while the adapter is disconnected, so a send from a deferred reply
/// that outlived its connection fails with [`ChannelError::Disconnected`].
#[derive(Debug, Default)]
pub struct Outbox {
    tx: RwLock<Option<mpsc::Sender<String>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, tx: mpsc::Sender<String>) {
        *self.tx.write().unwrap_or_else(|p| p.into_inner()) = Some(tx);
    }

    /// Drop our sender so the writer can drain and exit.
    pub fn detach(&self) {
        self.tx.write().unwrap_or_else(|p| p.into_inner()).take();
    }

    pub fn is_attached(&self) -> bool {
        self.tx.read().unwrap_or_else(|p| p.into_inner()).is_some()
    }

    /// Queue one encoded frame, waiting while the writer is busy.
    pub async fn push(&self, frame: String) -> Result<(), ChannelError> {
        let tx = self
            .tx
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or_else(|| ChannelError::Disconnected("not connected".to_string()))?;
        tx.send(frame)
            .await
            .map_err(|_| ChannelError::Disconnected("writer has stopped".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_requires_attached_writer() {
        let outbox = Outbox::new();
        assert!(matches!(
            outbox.push("x".into()).await,
            Err(ChannelError::Disconnected(_))
        ));

        let (tx, mut rx) = mpsc::channel(1);
        outbox.attach(tx);
        outbox.push("hello".into()).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));

        outbox.detach();
        assert!(!outbox.is_attached());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn push_fails_once_writer_is_gone() {
        let outbox = Outbox::new();
        let (tx, rx) = mpsc::channel(1);
        outbox.attach(tx);
        drop(rx);
        assert!(outbox.push("late".into()).await.is_err());
    }
}
