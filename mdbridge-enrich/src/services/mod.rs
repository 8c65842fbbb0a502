//! Collaborator services for mdbridge-enrich
//!
//! The secret store and record store are external collaborators; the
//! traits here are their interface boundary, with default
//! implementations (file/env-backed secrets, SQLite records) so the
//! service runs end to end.

pub mod record_store;
pub mod secret_store;

pub use record_store::{RecordStore, SqliteRecordStore};
pub use secret_store::{FileSecretStore, SecretStore};
