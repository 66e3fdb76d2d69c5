//! Keyed collection of virtual devices.
//!
//! The registry owns every device the host exposes, keyed by dSUID
//! (case-insensitive) and iterated in insertion order so announcements are
//! deterministic. Devices are handed out as [`SharedDevice`] so callers
//! never hold the registry lock while a device verb runs; verbs may be
//! user-supplied and could re-enter the host.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use vdc_proto::Dsuid;

use crate::device::Device;

/// A registered device behind its own lock.
pub type SharedDevice = Arc<Mutex<Device>>;

/// Lock a shared device, recovering from a poisoned lock.
///
/// A panic inside a user-supplied behavior must not permanently brick the
/// device, so poisoning is recovered by taking the inner state as-is.
pub fn lock_device(device: &SharedDevice) -> MutexGuard<'_, Device> {
    device.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Insertion-ordered device registry.
///
/// Structural mutations are serialized internally; device state is only
/// mutated through [`SharedDevice`] locks.
pub struct DeviceRegistry {
    vdc_dsuid: Dsuid,
    devices: RwLock<IndexMap<Dsuid, SharedDevice>>,
}

impl DeviceRegistry {
    /// Create an empty registry owned by the given vDC.
    #[must_use]
    pub fn new(vdc_dsuid: Dsuid) -> Self {
        Self {
            vdc_dsuid,
            devices: RwLock::new(IndexMap::new()),
        }
    }

    /// dSUID of the owning vDC.
    #[must_use]
    pub fn vdc_dsuid(&self) -> &Dsuid {
        &self.vdc_dsuid
    }

    /// Insert a device, stamping it with the owning vDC dSUID.
    ///
    /// Inserting a dSUID that is already registered replaces the previous
    /// device.
    pub fn add(&self, mut device: Device) -> SharedDevice {
        device.set_vdc_dsuid(self.vdc_dsuid.clone());
        let dsuid = device.dsuid().clone();
        let shared = Arc::new(Mutex::new(device));
        self.write().insert(dsuid, Arc::clone(&shared));
        shared
    }

    /// Remove a device by dSUID.
    pub fn remove(&self, dsuid: &Dsuid) -> Option<SharedDevice> {
        self.write().shift_remove(dsuid)
    }

    /// Exact-match lookup.
    #[must_use]
    pub fn lookup(&self, dsuid: &Dsuid) -> Option<SharedDevice> {
        self.read().get(dsuid).cloned()
    }

    /// Registered dSUIDs in insertion order.
    #[must_use]
    pub fn dsuids(&self) -> Vec<Dsuid> {
        self.read().keys().cloned().collect()
    }

    /// Number of registered devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<Dsuid, SharedDevice>> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<Dsuid, SharedDevice>> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceClass;

    const VDC: &str = "00000000000000000000000000000000AA";

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(Dsuid::new(VDC).unwrap())
    }

    fn device(dsuid: &str) -> Device {
        Device::new(
            Dsuid::new(dsuid).unwrap(),
            "dev",
            "Test",
            "vdc:test",
            DeviceClass::Light,
        )
    }

    #[test]
    fn add_stamps_the_owning_vdc() {
        let registry = registry();
        let shared = registry.add(device("CC000000000000000000000000000000C1"));

        let device = lock_device(&shared);
        assert_eq!(device.vdc_dsuid().map(Dsuid::as_str), Some(VDC));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = registry();
        registry.add(device("CC000000000000000000000000000000C1"));

        let lower = Dsuid::new("cc000000000000000000000000000000c1").unwrap();
        assert!(registry.lookup(&lower).is_some());
    }

    #[test]
    fn remove_deletes_the_device() {
        let registry = registry();
        let dsuid = Dsuid::new("CC000000000000000000000000000000C1").unwrap();
        registry.add(device(dsuid.as_str()));

        assert!(registry.remove(&dsuid).is_some());
        assert!(registry.lookup(&dsuid).is_none());
        assert!(registry.remove(&dsuid).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn dsuids_keep_insertion_order() {
        let registry = registry();
        registry.add(device("CC000000000000000000000000000000C3"));
        registry.add(device("CC000000000000000000000000000000C1"));
        registry.add(device("CC000000000000000000000000000000C2"));

        let order: Vec<_> = registry
            .dsuids()
            .iter()
            .map(|d| d.as_str().to_owned())
            .collect();
        assert_eq!(
            order,
            [
                "CC000000000000000000000000000000C3",
                "CC000000000000000000000000000000C1",
                "CC000000000000000000000000000000C2",
            ]
        );
        assert_eq!(registry.len(), 3);
    }
}
