// sentrygate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Sentry Gate SQLite Audit Store
// Description: Public API for the durable SQLite-backed AuditStore.
// Purpose: Implement C1 from the pipeline design.
// Dependencies: sentrygate-core, rusqlite
// ============================================================================

//! ## Overview
//! `sentrygate-store-sqlite` is the only crate in the workspace that
//! speaks `SQLite` directly. Every other crate depends on
//! [`sentrygate_core::AuditStore`] and is free to substitute a different
//! backend in tests.

pub mod store;

pub use store::SqliteAuditStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
