//! Connection status state machine

use std::fmt;

use tokio::sync::watch;
use tracing::{info, warn};

/// Overall connection status shown to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Scanning,
    Connecting,
    Connected,
    Error(String),
}

impl ConnectionStatus {
    /// Whether moving from `self` to `next` is an allowed edge
    pub fn can_transition_to(&self, next: &ConnectionStatus) -> bool {
        use ConnectionStatus::*;

        matches!(
            (self, next),
            (Disconnected, Scanning)
                | (Scanning, Disconnected)
                | (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Error(_))
                | (Connected, Disconnected)
                | (Error(_), Disconnected)
                | (Error(_), Connecting)
                | (Error(_), Scanning)
                | (Scanning, Connecting)
                | (Connected, Connecting)
                | (Connecting, Disconnected)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Scanning => "scanning",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error(_) => "error",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Error(reason) => write!(f, "error: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}

/// Single writer cell for [`ConnectionStatus`]
///
/// Refuses transitions that are not edges of the state machine. Readers
/// subscribe through a `watch` receiver.
#[derive(Debug)]
pub struct StatusCell {
    tx: watch::Sender<ConnectionStatus>,
}

impl StatusCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self { tx }
    }

    pub fn current(&self) -> ConnectionStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }

    /// Move to `next` if the edge is allowed, returning whether it happened
    pub fn transition(&self, next: ConnectionStatus) -> bool {
        self.transition_when(|_| true, next)
    }

    /// Move to `next` only when `guard` accepts the current status
    ///
    /// The guard and the edge check run atomically with the write.
    pub fn transition_when<F>(&self, guard: F, next: ConnectionStatus) -> bool
    where
        F: FnOnce(&ConnectionStatus) -> bool,
    {
        let mut refused = None;
        let changed = self.tx.send_if_modified(|current| {
            if !guard(current) {
                return false;
            }
            if !current.can_transition_to(&next) {
                refused = Some(current.clone());
                return false;
            }
            info!(from = %current, to = %next, "connection status changed");
            *current = next.clone();
            true
        });

        if let Some(from) = refused {
            warn!(from = %from, to = %next, "refused invalid status transition");
        }
        changed
    }

    /// Force the cell back to `Disconnected` from any state
    pub fn reset(&self) {
        self.tx.send_if_modified(|current| {
            if *current == ConnectionStatus::Disconnected {
                return false;
            }
            info!(from = %current, "connection status reset");
            *current = ConnectionStatus::Disconnected;
            true
        });
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use ConnectionStatus::*;

    #[rstest]
    #[case(Disconnected, Scanning, true)]
    #[case(Scanning, Disconnected, true)]
    #[case(Disconnected, Connecting, true)]
    #[case(Connecting, Connected, true)]
    #[case(Connecting, Error("rejected".into()), true)]
    #[case(Connected, Disconnected, true)]
    #[case(Error("x".into()), Connecting, true)]
    #[case(Scanning, Connecting, true)]
    #[case(Disconnected, Connected, false)]
    #[case(Scanning, Connected, false)]
    #[case(Connected, Scanning, false)]
    #[case(Disconnected, Error("x".into()), false)]
    #[case(Connected, Connected, false)]
    fn test_transition_edges(
        #[case] from: ConnectionStatus,
        #[case] to: ConnectionStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(&to), allowed);
    }

    #[test]
    fn test_display() {
        assert_eq!(Scanning.to_string(), "scanning");
        assert_eq!(Error("pairing service unavailable".into()).to_string(), "error: pairing service unavailable");
    }

    #[test]
    fn test_cell_refuses_invalid_transition() {
        let cell = StatusCell::new();

        assert!(!cell.transition(Connected));
        assert_eq!(cell.current(), Disconnected);

        assert!(cell.transition(Connecting));
        assert!(cell.transition(Connected));
        assert_eq!(cell.current(), Connected);
    }

    #[test]
    fn test_transition_when_guard() {
        let cell = StatusCell::new();
        cell.transition(Connecting);

        // Discovery ending must not disturb a pairing flow
        assert!(!cell.transition_when(|s| *s == Scanning, Disconnected));
        assert_eq!(cell.current(), Connecting);
    }

    #[tokio::test]
    async fn test_subscribers_observe_transitions() {
        let cell = StatusCell::new();
        let mut rx = cell.subscribe();

        cell.transition(Scanning);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Scanning);

        cell.reset();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Disconnected);
    }
}
