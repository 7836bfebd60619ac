//! Service layer for the banking accounts API.
//! - `accounts`: account records, identifier allocation and CRUD semantics.
//! - `storage`: the hash-store abstraction the account store runs on, with
//!   Redis and in-memory backends.

pub mod errors;
pub mod storage;
pub mod accounts;
