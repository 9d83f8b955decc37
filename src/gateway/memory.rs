use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{parse_markers, GatewayError, PersistenceGateway};
use crate::point::{Point, PointSequence};

/// Process local store. Markers are kept as the same JSON blob the other
/// stores write, so malformed records can be simulated with `put_raw`.
pub struct MemoryGateway {
    records: Mutex<HashMap<String, String>>,
    available: AtomicBool,
    save_count: AtomicUsize,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            save_count: AtomicUsize::new(0),
        }
    }

    /// When unavailable every call fails as if the store was unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn put_raw(&self, user_id: &str, blob: &str) {
        self.lock_records()
            .insert(user_id.to_string(), blob.to_string());
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    pub fn stored(&self, user_id: &str) -> Option<PointSequence> {
        let blob = self.lock_records().get(user_id).cloned()?;
        parse_markers(user_id, &blob).ok()
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), GatewayError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(anyhow!("memory store is switched off").into())
        }
    }
}

impl PersistenceGateway for MemoryGateway {
    fn save(&self, user_id: &str, markers: &[Point]) -> Result<(), GatewayError> {
        self.check_available()?;
        let blob = serde_json::to_string(markers).map_err(anyhow::Error::from)?;
        self.lock_records().insert(user_id.to_string(), blob);
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self, user_id: &str) -> Result<PointSequence, GatewayError> {
        self.check_available()?;
        let blob = self
            .lock_records()
            .get(user_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(user_id.to_string()))?;
        parse_markers(user_id, &blob)
    }
}
