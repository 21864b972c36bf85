use tokio::sync::watch;
use tracing::debug;

/// Kind of user input that unlocks gated playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Touch,
    Pointer,
}

/// Broadcasts user interactions to listeners armed after an autoplay rejection.
///
/// Each listener fires at most once, on the first interaction after it was armed.
#[derive(Debug)]
pub struct InteractionGate {
    tx: watch::Sender<u64>,
}

impl InteractionGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// Arm a listener; the current interaction count is already marked seen
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Report a touch or pointer interaction from the host
    pub fn interact(&self, kind: Interaction) {
        self.tx.send_modify(|count| *count += 1);
        debug!("User interaction ({:?}), {} listeners", kind, self.armed());
    }

    /// Number of listeners still waiting
    pub fn armed(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for InteractionGate {
    fn default() -> Self {
        Self::new()
    }
}
