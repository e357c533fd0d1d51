//! Shared-expense ledger engine.
//!
//! A group registers its participants in a [`UserRegistry`], closes it, and
//! then records costs in an append-only [`Ledger`]. Each cost is split
//! across the users by per-position ratios; [`Ledger::compute_balances`]
//! folds the ledger into what every user paid versus what they should have
//! paid.
//!
//! State is kept in plain files, one pair per group, managed by
//! [`GroupStore`]. Everything is synchronous.

pub use error::EngineError;
pub use group::{GroupKey, GroupKeyOrdering};
pub use ledger::{Balances, CostEntry, ExportZone, Ledger, LedgerEntries, NewCost};
pub use registry::{RESERVED_DELIMITERS, User, UserRegistry};
pub use store::{GroupSession, GroupStore};

mod error;
mod group;
mod ledger;
mod registry;
mod store;

pub type ResultEngine<T> = Result<T, EngineError>;
