//! Track viewer: map frames and realtime viewers for an owner's devices

use std::sync::Arc;

use crate::{
    config::MapConfig,
    error::AppResult,
    models::UserClaims,
    repository::Repository,
    tracking::{
        map_view::{MapFrame, TrackingMap},
        viewer::ViewerSnapshot,
        ChangeFeed, TrackViewer,
    },
};

#[derive(Clone)]
pub struct ViewerService {
    repository: Repository,
    feed: Arc<ChangeFeed>,
    map: MapConfig,
}

impl ViewerService {
    pub fn new(repository: Repository, feed: Arc<ChangeFeed>, map: MapConfig) -> Self {
        Self { repository, feed, map }
    }

    /// One-shot frame of the caller's devices
    pub async fn map_frame(&self, claims: &UserClaims) -> AppResult<MapFrame> {
        let devices = self.repository.devices_list_for_owner(claims.sub).await?;
        Ok(TrackingMap::new(self.map.clone()).render(&devices))
    }

    /// Subscribe to the caller's device changes, then load the device list
    pub async fn open(&self, claims: &UserClaims) -> AppResult<(TrackViewer, ViewerSnapshot)> {
        let mut viewer = TrackViewer::subscribe(claims.sub, &self.feed, self.map.clone());
        let devices = self.repository.devices_list_for_owner(claims.sub).await?;
        let snapshot = viewer.load(devices);
        tracing::info!(
            "Track viewer opened by {} with {} devices",
            claims.sub,
            snapshot.devices.len()
        );
        Ok((viewer, snapshot))
    }

    /// Reload the viewer's list after it missed changes
    pub async fn reload(&self, viewer: &mut TrackViewer) -> AppResult<ViewerSnapshot> {
        let devices = self.repository.devices_list_for_owner(viewer.owner()).await?;
        tracing::info!("Track viewer for {} resynced", viewer.owner());
        Ok(viewer.load(devices))
    }
}
