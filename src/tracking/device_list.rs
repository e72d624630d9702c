use indexmap::IndexMap;
use uuid::Uuid;

use crate::models::{Device, DevicePatch};

/// In-memory device list of a track viewer, keyed by id in load order
///
/// Only the initial load replaces devices wholesale; afterwards changes are
/// merged field by field.
#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    devices: IndexMap<Uuid, Device>,
}

impl DeviceList {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices: devices.into_iter().map(|d| (d.id, d)).collect(),
        }
    }

    /// Replace the whole list with a fresh load
    pub fn load(&mut self, devices: Vec<Device>) {
        *self = Self::new(devices);
    }

    /// Merge a change into the matching device
    ///
    /// Returns the merged device, or `None` when the id is not in the list.
    /// Order is preserved and repeated patches are harmless.
    pub fn merge(&mut self, patch: &DevicePatch) -> Option<&Device> {
        let device = self.devices.get_mut(&patch.id)?;
        device.apply_patch(patch);
        Some(device)
    }

    pub fn get(&self, id: Uuid) -> Option<&Device> {
        self.devices.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Device> {
        self.devices.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::device::sample_device;
    use crate::models::DeviceStatus;
    use serde_json::json;

    fn patch(value: serde_json::Value) -> DevicePatch {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_merge_keeps_untouched_fields() {
        let d1 = Uuid::new_v4();
        let d2 = Uuid::new_v4();
        let mut list = DeviceList::new(vec![
            sample_device(d1, "Phone B"),
            sample_device(d2, "Phone A"),
        ]);

        let merged = list
            .merge(&patch(json!({ "id": d2, "status": "lost" })))
            .cloned()
            .unwrap();

        assert_eq!(merged.status, DeviceStatus::Lost);
        assert_eq!(merged.device_name, "Phone A");
        assert_eq!(list.get(d1).unwrap().status, DeviceStatus::Active);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let d1 = Uuid::new_v4();
        let mut list = DeviceList::new(vec![sample_device(d1, "Phone A")]);
        let change = patch(json!({
            "id": d1,
            "incident_latitude": -22.5609,
            "incident_longitude": 17.0658,
            "incident_location": "Live Tracker: -22.56090, 17.06580 (Accuracy: 12m)",
        }));

        list.merge(&change);
        let once = list.to_vec();
        list.merge(&change);

        assert_eq!(list.to_vec(), once);
    }

    #[test]
    fn test_merge_preserves_order_and_ignores_unknown_ids() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut list = DeviceList::new(
            ids.iter()
                .map(|id| sample_device(*id, "Phone"))
                .collect(),
        );

        list.merge(&patch(json!({ "id": ids[2], "status": "stolen" })));
        list.merge(&patch(json!({ "id": ids[0], "status": "lost" })));
        assert!(list.merge(&patch(json!({ "id": Uuid::new_v4(), "status": "lost" }))).is_none());

        let order: Vec<Uuid> = list.iter().map(|d| d.id).collect();
        assert_eq!(order, ids);
        assert_eq!(list.len(), 3);
    }
}
