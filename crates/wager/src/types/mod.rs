mod account_id;
mod match_id;
mod match_table;

pub use account_id::AccountId;
pub use match_id::MatchId;
pub use match_table::MatchTable;
