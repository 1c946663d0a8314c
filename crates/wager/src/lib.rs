//! Wagered challenge lifecycle and settlement archive.
//!
//! A [`Match`](entity::Match) is a challenge between two accounts for a stake.
//! It lives in the `matches` table while open and is moved to `match_history`
//! exactly once when settled. Storage and account lookup are injected through
//! the [`MatchStorage`](match_storage::MatchStorage) and
//! [`AccountResolver`](account::AccountResolver) traits.
//!
//! ```ignore
//! let lifecycle = MatchLifecycle::new(storage, accounts);
//! let mut m = lifecycle.create_match(50, &alice, &bob).await?;
//! m.set_accepted(true).await?;
//! m.set_winner(&alice);
//! m.set_match_time(Utc::now());
//! m.archive().await?;
//! let settled = lifecycle.get_match(m.id(), MatchTable::History).await?;
//! ```

pub mod account;
pub mod config;
pub mod entity;
pub mod error;
pub mod lifecycle;
pub mod match_storage;
pub mod metrics;
pub mod storage;
pub mod testing;
pub mod types;

pub use account::{Account, AccountResolver};
pub use entity::{Match, MatchRecord};
pub use error::{MatchError, StorageError};
pub use lifecycle::{MatchLifecycle, Reconciled};
pub use types::{AccountId, MatchId, MatchTable};
