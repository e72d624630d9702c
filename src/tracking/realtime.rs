//! Realtime change feed for `registered_devices`
//!
//! Postgres notifies the identity of every changed row on [`CHANGE_CHANNEL`]
//! (see the migrations). A listener task re-reads the row and fans the change
//! out over an in-process broadcast bus. Subscribers are scoped to one owner
//! and only see row updates.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Device, DevicePatch},
    repository::Repository,
};

/// NOTIFY channel written by the `registered_devices_notify` trigger
pub const CHANGE_CHANNEL: &str = "registered_devices_changes";

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Notification payload: which row changed and how
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub id: Uuid,
    pub user_id: Uuid,
}

impl ChangeNotice {
    /// Attach the current row image, `None` for deleted rows
    pub fn into_change(self, row: Option<&Device>) -> RowChange {
        let new = row.and_then(|device| match serde_json::to_value(device) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Failed to encode device {}: {}", device.id, e);
                None
            }
        });
        RowChange { kind: self.kind, new }
    }
}

/// One row change with the row as it is now
#[derive(Debug, Clone, PartialEq)]
pub struct RowChange {
    pub kind: ChangeKind,
    pub new: Option<Value>,
}

impl RowChange {
    pub fn update(new: Value) -> Self {
        Self {
            kind: ChangeKind::Update,
            new: Some(new),
        }
    }

    /// Owner of the changed row, read from the new image
    pub fn owner(&self) -> Option<Uuid> {
        self.new
            .as_ref()?
            .get("user_id")?
            .as_str()?
            .parse()
            .ok()
    }

    /// Fields of the new image as a device patch
    pub fn device_patch(&self) -> Option<DevicePatch> {
        let new = self.new.clone()?;
        match serde_json::from_value(new) {
            Ok(patch) => Some(patch),
            Err(e) => {
                tracing::warn!("Ignoring malformed device change: {}", e);
                None
            }
        }
    }
}

/// What a subscriber is told
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Changed(DevicePatch),
    /// Changes were dropped; reload from the database
    Resync,
}

/// In-process fan-out of row changes
pub struct ChangeFeed {
    sender: broadcast::Sender<RowChange>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a change to all current subscribers; dropped when nobody listens
    pub fn publish(&self, change: RowChange) {
        let _ = self.sender.send(change);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Deliver update events for devices owned by `owner` to `on_event`
    ///
    /// Delivery is at-least-once with no ordering across devices. A
    /// subscriber that falls behind the feed gets [`FeedEvent::Resync`] in
    /// place of the changes it missed. The subscription ends when the
    /// returned handle is dropped.
    pub fn subscribe<F>(&self, owner: Uuid, mut on_event: F) -> Subscription
    where
        F: FnMut(FeedEvent) + Send + 'static,
    {
        let mut receiver = self.sender.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(change) => {
                        if change.kind != ChangeKind::Update || change.owner() != Some(owner) {
                            continue;
                        }
                        if let Some(patch) = change.device_patch() {
                            on_event(FeedEvent::Changed(patch));
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Realtime subscriber for {} skipped {} changes, resyncing", owner, skipped);
                        on_event(FeedEvent::Resync);
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Realtime feed closed");
                        break;
                    }
                }
            }
        });
        tracing::debug!("Realtime subscription opened for {}", owner);
        Subscription { owner, task }
    }
}

/// Live subscription handle; unsubscribes on drop
#[derive(Debug)]
pub struct Subscription {
    owner: Uuid,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!("Realtime subscription closed for {}", self.owner);
    }
}

/// Forward Postgres change notifications into `feed`
///
/// Reconnects after a delay when the listener connection drops.
pub fn spawn_listener(repository: Repository, feed: Arc<ChangeFeed>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = listen(&repository, &feed).await {
                tracing::error!("Realtime listener on {} failed: {}", CHANGE_CHANNEL, e);
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    })
}

async fn listen(repository: &Repository, feed: &ChangeFeed) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(&repository.pool).await?;
    listener.listen(CHANGE_CHANNEL).await?;
    tracing::info!("Listening for device changes on {}", CHANGE_CHANNEL);

    loop {
        let notification = listener.recv().await?;
        let notice = match serde_json::from_str::<ChangeNotice>(notification.payload()) {
            Ok(notice) => notice,
            Err(e) => {
                tracing::warn!("Ignoring undecodable notification: {}", e);
                continue;
            }
        };
        if feed.receiver_count() == 0 {
            continue;
        }
        if let Some(change) = resolve(repository, notice).await {
            feed.publish(change);
        }
    }
}

/// Re-read the row named by `notice`
async fn resolve(repository: &Repository, notice: ChangeNotice) -> Option<RowChange> {
    if notice.kind == ChangeKind::Delete {
        return Some(notice.into_change(None));
    }
    match repository.devices_get_by_id(notice.id).await {
        Ok(device) => Some(notice.into_change(Some(&device))),
        // deleted before we got to it
        Err(AppError::NotFound(_)) => None,
        Err(e) => {
            tracing::warn!("Failed to reload changed device {}: {}", notice.id, e);
            None
        }
    }
}
