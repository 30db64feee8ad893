//! Client Session
//!
//! One live socket: the bounded outbound queue feeding the writer pump and
//! the cancellation signal shared by both pumps. The session records its
//! gateway by id only; resolving the id goes through the registry.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// State for one connected user socket.
pub struct ClientSession {
    user_id: String,
    gateway_id: String,
    session_id: String,
    sender: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
}

impl ClientSession {
    /// Create a session and the receiving half of its send queue (owned by
    /// the writer pump).
    pub fn new(
        user_id: impl Into<String>,
        gateway_id: impl Into<String>,
        queue_capacity: usize,
    ) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let session = Self {
            user_id: user_id.into(),
            gateway_id: gateway_id.into(),
            session_id: Uuid::new_v4().to_string(),
            sender,
            cancel: CancellationToken::new(),
        };
        (session, receiver)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn gateway_id(&self) -> &str {
        &self.gateway_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Non-blocking enqueue onto the send queue.
    ///
    /// Returns false when the queue is full or the writer is gone; the
    /// message is dropped for this recipient, never blocked on.
    pub fn try_send(&self, payload: &[u8]) -> bool {
        self.sender.try_send(payload.to_vec()).is_ok()
    }

    /// Signal both pumps to shut down. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
