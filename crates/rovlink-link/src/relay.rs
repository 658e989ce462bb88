//! FIFO relay of recognized command lines.
//!
//! The dispatch loop pushes each command once; the control or UI layer pops
//! them in the same order. Pushing never blocks. Popping suspends until a
//! command is available.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use rovlink_core::error::{Error, Result};

#[derive(Debug)]
enum Sender {
    Bounded(mpsc::Sender<String>),
    Unbounded(mpsc::UnboundedSender<String>),
}

#[derive(Debug)]
enum Receiver {
    Bounded(mpsc::Receiver<String>),
    Unbounded(mpsc::UnboundedReceiver<String>),
}

impl Receiver {
    async fn recv(&mut self) -> Option<String> {
        match self {
            Receiver::Bounded(rx) => rx.recv().await,
            Receiver::Unbounded(rx) => rx.recv().await,
        }
    }

    fn try_recv(&mut self) -> Option<String> {
        match self {
            Receiver::Bounded(rx) => rx.try_recv().ok(),
            Receiver::Unbounded(rx) => rx.try_recv().ok(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Receiver::Bounded(rx) => rx.len(),
            Receiver::Unbounded(rx) => rx.len(),
        }
    }
}

#[derive(Debug)]
struct Inner {
    tx: Sender,
    rx: Mutex<Receiver>,
}

/// Queue of command strings from the dispatch loop to its consumers.
///
/// Cloning yields another handle to the same queue; any handle may push
/// or pop. Concurrent poppers each receive distinct commands.
#[derive(Debug, Clone)]
pub struct CommandRelay {
    inner: Arc<Inner>,
}

impl CommandRelay {
    /// A relay that never rejects a push.
    pub fn unbounded() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self::from_parts(Sender::Unbounded(tx), Receiver::Unbounded(rx))
    }

    /// A relay holding at most `capacity` unconsumed commands.
    ///
    /// Fails with [`Error::InvalidParameter`] if `capacity` is zero.
    pub fn bounded(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidParameter(
                "command relay capacity must be non-zero".into(),
            ));
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok(Self::from_parts(Sender::Bounded(tx), Receiver::Bounded(rx)))
    }

    fn from_parts(tx: Sender, rx: Receiver) -> Self {
        Self {
            inner: Arc::new(Inner {
                tx,
                rx: Mutex::new(rx),
            }),
        }
    }

    /// Append `command` without blocking.
    ///
    /// A bounded relay that is full fails with [`Error::QueueFull`].
    pub fn push(&self, command: String) -> Result<()> {
        match &self.inner.tx {
            Sender::Unbounded(tx) => tx.send(command).map_err(|_| Error::StreamClosed),
            Sender::Bounded(tx) => tx.try_send(command).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => Error::QueueFull,
                mpsc::error::TrySendError::Closed(_) => Error::StreamClosed,
            }),
        }
    }

    /// Remove the oldest command, waiting until one is available.
    pub async fn pop(&self) -> String {
        let mut rx = self.inner.rx.lock().await;
        match rx.recv().await {
            Some(command) => command,
            // The relay owns its sender, so the channel never closes.
            None => std::future::pending().await,
        }
    }

    /// Remove the oldest command if one is queued right now.
    pub fn try_pop(&self) -> Option<String> {
        self.inner.rx.try_lock().ok()?.try_recv()
    }

    /// Number of commands waiting. Returns 0 while a consumer is mid-pop.
    pub fn len(&self) -> usize {
        self.inner.rx.try_lock().map(|rx| rx.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CommandRelay {
    fn default() -> Self {
        Self::unbounded()
    }
}
