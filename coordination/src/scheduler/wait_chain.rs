//! Wait chain for judge requests that found every judge busy.
//!
//! Blocked requests hold a one-shot continuation on a stack. A freed judge
//! goes to the most recently registered waiter; the waiters below it stay
//! armed for the next freed judge. Resumption order is LIFO, not FIFO.

use tokio::sync::oneshot;
use tracing::debug;

use crate::events::Participant;

#[derive(Debug, Default)]
pub struct WaitChain {
    waiters: Vec<oneshot::Sender<Participant>>,
}

impl WaitChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a request; the receiver resolves with the judge handed to it
    pub fn register(&mut self) -> oneshot::Receiver<Participant> {
        let (sender, receiver) = oneshot::channel();
        self.waiters.push(sender);
        debug!(waiting = self.waiters.len(), "Judge request parked");
        receiver
    }

    /// Hand a freed participant to the newest live waiter.
    ///
    /// Waiters whose receiver is gone are discarded. Returns the
    /// participant back when nobody took it.
    pub fn hand_off(&mut self, participant: Participant) -> Option<Participant> {
        let mut participant = participant;
        while let Some(waiter) = self.waiters.pop() {
            match waiter.send(participant) {
                Ok(()) => return None,
                Err(returned) => {
                    debug!("Dropping abandoned judge waiter");
                    participant = returned;
                }
            }
        }
        Some(participant)
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}
