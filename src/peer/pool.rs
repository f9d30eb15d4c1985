// Collection of peer session handles in configuration order.

use crate::peer::session::PeerHandle;
use std::time::Duration;
use tokio::time::{self, Instant};

const BOUND_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct PeerPool {
    peers: Vec<PeerHandle>,
}

impl PeerPool {
    pub fn new(peers: Vec<PeerHandle>) -> Self {
        PeerPool { peers }
    }

    pub fn get(&self, id: &str) -> Option<&PeerHandle> {
        self.peers.iter().find(|p| p.id() == id)
    }

    /// Peers in configuration order, which is also routing priority order.
    pub fn iter(&self) -> impl Iterator<Item = &PeerHandle> {
        self.peers.iter()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn any_bound(&self) -> bool {
        self.peers.iter().any(|p| p.is_bound())
    }

    /// Wait until at least one session is BOUND. Returns immediately when
    /// one already is; `false` once `timeout` elapses with none.
    pub async fn wait_for_any_bound(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.any_bound() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            time::sleep(BOUND_POLL_INTERVAL.min(remaining)).await;
        }
    }
}
