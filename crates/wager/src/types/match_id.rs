use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier of a match. Shared by the live and archive tables.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MatchId(pub i64);

impl MatchId {
    /// Get the inner integer value.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MatchId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
