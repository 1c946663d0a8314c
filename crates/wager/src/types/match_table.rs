use serde::{Deserialize, Serialize};
use std::fmt;

/// Which logical table a match row is read from.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTable {
    /// Open or in-progress matches (`matches`).
    #[default]
    Live,
    /// Settled matches (`match_history`). Append-only.
    History,
}

impl MatchTable {
    /// Name of the backing SQL table.
    pub const fn table_name(&self) -> &'static str {
        match self {
            Self::Live => "matches",
            Self::History => "match_history",
        }
    }

    pub const fn is_history(&self) -> bool {
        matches!(self, Self::History)
    }
}

impl fmt::Display for MatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}
