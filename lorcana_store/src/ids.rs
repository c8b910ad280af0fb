//! ID generation
//!
//! Services never mint IDs themselves; they ask an [`IdGenerator`] so tests can
//! swap in [`SequentialIds`] and assert on exact values.

use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Source of identifiers for new records and snapshot files
pub trait IdGenerator: Send + Sync {
    /// ID for an imported card that arrived without one
    fn card_id(&self) -> String;
    /// ID for an imported set that arrived without one
    fn set_id(&self) -> String;
    /// Globally unique collection ID
    fn collection_id(&self) -> String;
    /// Token embedded in backup/export file names so repeated snapshots never collide
    fn file_token(&self) -> String;
}

/// Default generator: `<prefix>_<unix millis>_<9 base36 chars>` for records,
/// UUID v4 for collections
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl RandomIds {
    fn timestamped(prefix: &str) -> String {
        format!(
            "{}_{}_{}",
            prefix,
            chrono::Utc::now().timestamp_millis(),
            random_suffix(9)
        )
    }
}

impl IdGenerator for RandomIds {
    fn card_id(&self) -> String {
        Self::timestamped("card")
    }

    fn set_id(&self) -> String {
        Self::timestamped("set")
    }

    fn collection_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn file_token(&self) -> String {
        format!(
            "{}-{}",
            chrono::Utc::now().timestamp_millis(),
            random_suffix(6)
        )
    }
}

fn random_suffix(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect()
}

/// Deterministic generator: `card_1`, `set_2`, `collection_3`, `00004`...
///
/// One counter is shared across all kinds, so every value is distinct.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl IdGenerator for SequentialIds {
    fn card_id(&self) -> String {
        format!("card_{}", self.bump())
    }

    fn set_id(&self) -> String {
        format!("set_{}", self.bump())
    }

    fn collection_id(&self) -> String {
        format!("collection_{}", self.bump())
    }

    fn file_token(&self) -> String {
        format!("{:05}", self.bump())
    }
}
