//! Account records and the store that owns them.

pub mod domain;
pub mod store;

pub use domain::{Account, AccountFields, AccountInput, ActiveFlag, COUNTER_FIELD, COUNTER_KEY};
pub use store::AccountStore;
