use crate::session::KeyPool;

/// Scoped keyboard subscription for one running session.
///
/// Constructed when a session enters Running and dropped on every terminal
/// transition, so a listener can never leak into a future session. While it
/// exists it is the only path from raw key-down events to the evaluator.
#[derive(Debug, Clone)]
pub struct InputRouter {
    pool: KeyPool,
}

impl InputRouter {
    pub fn subscribe(pool: &KeyPool) -> InputRouter {
        InputRouter { pool: pool.clone() }
    }

    /// Case-insensitive key identifier normalization.
    pub fn normalize(raw: &str) -> String {
        raw.to_lowercase()
    }

    /// Forward a raw key-down event: `Some(normalized)` for pool members,
    /// `None` for everything else (dropped silently, never a failure).
    pub fn route(&self, raw: &str) -> Option<String> {
        let key = Self::normalize(raw);
        if self.pool.contains(&key) {
            Some(key)
        } else {
            None
        }
    }
}
