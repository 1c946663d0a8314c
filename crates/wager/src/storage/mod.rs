pub mod memory_account;
pub mod memory_match;

#[cfg(feature = "sql")]
pub mod sql_account;

#[cfg(feature = "sql")]
pub mod sql_match;
