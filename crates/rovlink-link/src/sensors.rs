//! Latest-value table of sensor readings.
//!
//! The dispatch loop is the only writer. Front ends and control loops read
//! through [`SensorTable::snapshot`], which copies the table out so no lock
//! is held while the caller works with the values.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Shared mapping from sensor name to its latest value.
///
/// Cloning a `SensorTable` yields another handle to the same table.
/// Entries are created on first sighting and overwritten on every later
/// one; nothing is ever removed.
#[derive(Debug, Clone, Default)]
pub struct SensorTable {
    values: Arc<RwLock<HashMap<String, f64>>>,
}

impl SensorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the value for `name`.
    ///
    /// Only the dispatch loop writes, and only for names the classifier
    /// accepted as sensors, so every key is a valid sensor name.
    pub(crate) async fn upsert(&self, name: &str, value: f64) {
        let mut values = self.values.write().await;
        match values.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                tracing::debug!(sensor = name, value, "First reading for sensor");
                values.insert(name.to_string(), value);
            }
        }
    }

    /// A point-in-time copy of every reading.
    pub async fn snapshot(&self) -> HashMap<String, f64> {
        self.values.read().await.clone()
    }

    /// The latest value for `name`, if it has been seen.
    pub async fn get(&self, name: &str) -> Option<f64> {
        self.values.read().await.get(name).copied()
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_creates_entry() {
        let table = SensorTable::new();
        assert!(table.is_empty().await);

        table.upsert("depth_rov_offset", 3.5).await;
        assert_eq!(table.snapshot().await.get("depth_rov_offset"), Some(&3.5));
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn upsert_overwrites_not_accumulates() {
        let table = SensorTable::new();
        table.upsert("depth", 2.0).await;
        table.upsert("depth", 2.0).await;
        assert_eq!(table.get("depth").await, Some(2.0));

        table.upsert("depth", -0.5).await;
        assert_eq!(table.get("depth").await, Some(-0.5));
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn snapshot_is_detached_from_later_writes() {
        let table = SensorTable::new();
        table.upsert("roll", 1.0).await;
        let snap = table.snapshot().await;

        table.upsert("roll", 9.0).await;
        table.upsert("pitch", 4.0).await;

        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get("roll"), Some(&1.0));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let writer = SensorTable::new();
        let reader = writer.clone();
        writer.upsert("heading", 270.0).await;
        assert_eq!(reader.get("heading").await, Some(270.0));
    }
}
