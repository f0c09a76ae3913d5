//! Registry of devices that have delivered at least one reading.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Cheap to clone; every clone sees the same set.
///
/// Written by the ingestion loops, read by the trigger engine once per tick.
/// Devices are never removed.
#[derive(Debug, Clone, Default)]
pub struct DeviceTracker {
    devices: Arc<Mutex<BTreeSet<String>>>,
}

impl DeviceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, BTreeSet<String>> {
        match self.devices.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns `true` if the device was not known before.
    pub fn register(&self, device_id: &str) -> bool {
        let mut devices = self.guard();
        if devices.contains(device_id) {
            return false;
        }
        devices.insert(device_id.to_string())
    }

    /// Snapshot of the known devices in sorted order.
    pub fn list(&self) -> Vec<String> {
        self.guard().iter().cloned().collect()
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.guard().contains(device_id)
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}
