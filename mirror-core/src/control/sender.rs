//! Control socket writer.
//!
//! A background task owns the write side of the control socket and
//! drains a bounded queue into it. [`ControlSender`] handles are cheap
//! to clone and never block: input that cannot be queued right away is
//! dropped, since stale input is worse than lost input.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;
use tracing::{debug, trace, warn};

use crate::control::message::{ControlCodec, ControlMessage};
use crate::error::MirrorError;

/// Queue depth between input producers and the socket writer.
pub const CONTROL_QUEUE_CAPACITY: usize = 64;

// ── SendOutcome ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotSentReason {
    /// No control socket, or it has closed.
    Disconnected,
    /// The writer is behind; the message was dropped.
    QueueFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    NotSent(NotSentReason),
}

impl SendOutcome {
    pub fn is_sent(self) -> bool {
        self == SendOutcome::Sent
    }
}

// ── ControlSender ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::Sender<ControlMessage>,
    connected: Arc<AtomicBool>,
}

impl ControlSender {
    /// A sender with no socket behind it; every send reports
    /// [`NotSentReason::Disconnected`].
    pub fn disconnected() -> Self {
        let (tx, _) = mpsc::channel(1);
        Self {
            tx,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A sender whose socket is attached later through
    /// [`PendingControl::attach`]. Until then it reports
    /// [`NotSentReason::Disconnected`].
    pub fn channel(capacity: usize) -> (Self, PendingControl) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let connected = Arc::new(AtomicBool::new(false));
        (
            Self {
                tx,
                connected: Arc::clone(&connected),
            },
            PendingControl { rx, connected },
        )
    }

    /// Start the writer task over `writer`.
    pub fn spawn<W>(writer: W, capacity: usize) -> (Self, ControlWriter)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (sender, pending) = Self::channel(capacity);
        (sender, pending.attach(writer))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn send(&self, msg: ControlMessage) -> SendOutcome {
        if !self.is_connected() {
            return SendOutcome::NotSent(NotSentReason::Disconnected);
        }
        match self.tx.try_send(msg) {
            Ok(()) => SendOutcome::Sent,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                trace!(kind = ?msg.message_type(), "control queue full; dropped");
                SendOutcome::NotSent(NotSentReason::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.connected.store(false, Ordering::Release);
                SendOutcome::NotSent(NotSentReason::Disconnected)
            }
        }
    }

    /// Send each message in order; returns how many were queued.
    pub fn send_all(&self, msgs: impl IntoIterator<Item = ControlMessage>) -> usize {
        msgs.into_iter()
            .map(|m| self.send(m))
            .filter(|o| o.is_sent())
            .count()
    }
}

async fn write_loop<W>(
    writer: W,
    mut rx: mpsc::Receiver<ControlMessage>,
    connected: Arc<AtomicBool>,
) where
    W: AsyncWrite + Send + Unpin + 'static,
{
    let mut sink = FramedWrite::new(writer, ControlCodec);
    while let Some(msg) = rx.recv().await {
        if let Err(e) = sink.send(msg).await {
            warn!("control socket write failed: {e}");
            break;
        }
    }
    connected.store(false, Ordering::Release);
    debug!("control writer finished");
}

// ── PendingControl ───────────────────────────────────────────────

/// The receiving end of a [`ControlSender::channel`], waiting for its
/// socket.
#[derive(Debug)]
pub struct PendingControl {
    rx: mpsc::Receiver<ControlMessage>,
    connected: Arc<AtomicBool>,
}

impl PendingControl {
    /// Start writing queued messages to `writer`.
    pub fn attach<W>(self, writer: W) -> ControlWriter
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.connected.store(true, Ordering::Release);
        let handle = tokio::spawn(write_loop(writer, self.rx, Arc::clone(&self.connected)));
        ControlWriter {
            handle,
            connected: self.connected,
        }
    }
}

// ── ControlWriter ────────────────────────────────────────────────

/// Owner handle of the writer task, held by the session.
#[derive(Debug)]
pub struct ControlWriter {
    handle: JoinHandle<()>,
    connected: Arc<AtomicBool>,
}

impl ControlWriter {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the writer to drain its queue and exit. It exits once
    /// every [`ControlSender`] is gone or the socket fails.
    pub async fn join(self) -> Result<(), MirrorError> {
        self.handle
            .await
            .map_err(|e| MirrorError::Other(format!("control writer failed: {e}")))
    }

    /// Mark every sender disconnected and close the socket.
    pub fn shutdown(self) {
        self.connected.store(false, Ordering::Release);
        self.handle.abort();
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::message::KeyAction;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn disconnected_sender_reports_not_sent() {
        let s = ControlSender::disconnected();
        assert_eq!(
            s.send(ControlMessage::RotateDevice),
            SendOutcome::NotSent(NotSentReason::Disconnected)
        );
    }

    #[tokio::test]
    async fn pending_sender_connects_on_attach() {
        let (sender, pending) = ControlSender::channel(4);
        assert_eq!(
            sender.send(ControlMessage::RotateDevice),
            SendOutcome::NotSent(NotSentReason::Disconnected)
        );

        let (client, mut server) = tokio::io::duplex(64);
        let _writer = pending.attach(client);
        assert!(sender.send(ControlMessage::ExpandNotificationPanel).is_sent());

        let mut buf = [0u8; 1];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [5]);
    }

    #[tokio::test]
    async fn messages_reach_the_socket_in_order() {
        let (client, mut server) = tokio::io::duplex(256);
        let (sender, _writer) = ControlSender::spawn(client, 8);

        assert!(sender.send(ControlMessage::RotateDevice).is_sent());
        assert_eq!(
            sender.send_all([
                ControlMessage::BackOrScreenOn(KeyAction::Down),
                ControlMessage::BackOrScreenOn(KeyAction::Up),
            ]),
            2
        );

        let mut buf = [0u8; 5];
        tokio::time::timeout(Duration::from_secs(2), server.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(buf, [10, 4, 0, 4, 1]);
    }

    #[tokio::test]
    async fn shutdown_disconnects_clones() {
        let (client, _server) = tokio::io::duplex(64);
        let (sender, writer) = ControlSender::spawn(client, 8);
        let clone = sender.clone();
        writer.shutdown();
        assert_eq!(
            clone.send(ControlMessage::RotateDevice),
            SendOutcome::NotSent(NotSentReason::Disconnected)
        );
    }

    #[tokio::test]
    async fn peer_close_marks_disconnected() {
        let (client, server) = tokio::io::duplex(64);
        let (sender, writer) = ControlSender::spawn(client, 8);
        drop(server);

        // The first write after the peer left fails and ends the writer.
        sender.send(ControlMessage::RotateDevice);
        tokio::time::timeout(Duration::from_secs(2), async {
            while !writer.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(!sender.is_connected());
    }

    #[tokio::test]
    async fn full_queue_drops() {
        // A pending writer: the duplex buffer is one byte and nobody reads.
        let (client, _server) = tokio::io::duplex(1);
        let (sender, _writer) = ControlSender::spawn(client, 1);
        let mut outcomes = Vec::new();
        for _ in 0..8 {
            outcomes.push(sender.send(ControlMessage::text("hello")));
            tokio::task::yield_now().await;
        }
        assert!(outcomes.contains(&SendOutcome::NotSent(NotSentReason::QueueFull)));
    }
}
