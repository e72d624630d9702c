//! Track viewer state: device list, map and the realtime subscription

use serde::Serialize;
use tokio::sync::mpsc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::device_list::DeviceList;
use super::map_view::{MapFrame, TrackingMap};
use super::realtime::{ChangeFeed, FeedEvent, Subscription};
use crate::{
    config::MapConfig,
    models::{Device, DevicePatch},
};

/// Full state pushed when a viewer connects
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ViewerSnapshot {
    pub devices: Vec<Device>,
    pub frame: MapFrame,
}

/// One merged realtime change
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ViewerUpdate {
    pub device: Device,
    /// Short, low-priority notice naming the device
    pub notification: String,
    pub frame: MapFrame,
}

/// Next thing a viewer has to show
#[derive(Debug, Clone)]
pub enum ViewerEvent {
    Update(ViewerUpdate),
    /// Changes were missed; the list must be reloaded
    Resync,
}

pub fn update_notification(device: &Device) -> String {
    format!("Location updated for {}", device.device_name)
}

/// State of one open track viewer
///
/// The subscription is opened before the initial load so that changes made
/// while the list is loading are merged afterwards. Dropping the viewer
/// unsubscribes.
pub struct TrackViewer {
    owner: Uuid,
    devices: DeviceList,
    map: TrackingMap,
    changes: mpsc::UnboundedReceiver<FeedEvent>,
    _subscription: Subscription,
}

impl TrackViewer {
    pub fn subscribe(owner: Uuid, feed: &ChangeFeed, map: MapConfig) -> Self {
        let (tx, changes) = mpsc::unbounded_channel();
        let subscription = feed.subscribe(owner, move |event| {
            let _ = tx.send(event);
        });
        Self {
            owner,
            devices: DeviceList::default(),
            map: TrackingMap::new(map),
            changes,
            _subscription: subscription,
        }
    }

    pub fn owner(&self) -> Uuid {
        self.owner
    }

    pub fn devices(&self) -> &DeviceList {
        &self.devices
    }

    /// Load the owner's devices, replacing the whole list
    ///
    /// Used for the initial fetch and after a resync.
    pub fn load(&mut self, devices: Vec<Device>) -> ViewerSnapshot {
        self.devices.load(devices);
        self.snapshot()
    }

    pub fn snapshot(&mut self) -> ViewerSnapshot {
        ViewerSnapshot {
            devices: self.devices.to_vec(),
            frame: self.map.render(self.devices.iter()),
        }
    }

    /// Merge one change and describe the result
    ///
    /// Changes for devices that are not in the list yield `None`.
    pub fn apply(&mut self, patch: &DevicePatch) -> Option<ViewerUpdate> {
        let device = self.devices.merge(patch)?.clone();
        tracing::debug!("Viewer {} merged change for device {}", self.owner, device.id);
        Some(ViewerUpdate {
            notification: update_notification(&device),
            frame: self.map.render(self.devices.iter()),
            device,
        })
    }

    /// Wait for the next change that touches a listed device, or a resync
    ///
    /// Returns `None` once the feed is gone.
    pub async fn next_event(&mut self) -> Option<ViewerEvent> {
        loop {
            match self.changes.recv().await? {
                FeedEvent::Changed(patch) => {
                    if let Some(update) = self.apply(&patch) {
                        return Some(ViewerEvent::Update(update));
                    }
                }
                FeedEvent::Resync => return Some(ViewerEvent::Resync),
            }
        }
    }
}
