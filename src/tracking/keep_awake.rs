//! Screen wake lock seam

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

pub type WakeLockId = u64;

/// Best-effort "prevent display sleep" lock
///
/// The platform may drop a lock on its own (for example when the page goes to
/// the background). The owner learns about that through
/// [`TrackingSession::on_wake_lock_released`](super::session::TrackingSession::on_wake_lock_released).
#[async_trait]
pub trait KeepAwake: Send + Sync {
    /// Returns `None` when the capability is missing; never fails
    async fn acquire(&self) -> Option<WakeLockId>;

    async fn release(&self, lock: WakeLockId);
}

/// Wake lock granted to a remote tracker page
///
/// The page holds the real screen lock; this side only hands out lock ids when
/// the page declared support for the capability.
pub struct ClientKeepAwake {
    supported: bool,
    next_id: AtomicU64,
}

impl ClientKeepAwake {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            next_id: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl KeepAwake for ClientKeepAwake {
    async fn acquire(&self) -> Option<WakeLockId> {
        if !self.supported {
            tracing::warn!("Screen wake lock is not supported by the tracker page");
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!("Wake lock {} acquired", id);
        Some(id)
    }

    async fn release(&self, lock: WakeLockId) {
        tracing::debug!("Wake lock {} released", lock);
    }
}
