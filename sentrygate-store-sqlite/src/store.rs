// sentrygate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Audit Store
// Description: Durable AuditStore backed by SQLite WAL.
// Purpose: Persist safety-relevant decision records with deterministic
// canonical-JSON hashing, implementing C1 from the pipeline design.
// Dependencies: sentrygate-core, rusqlite, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! Every [`AuditRecord`] is written as a row plus a canonical-JSON snapshot
//! hash, so corruption of the on-disk row is detectable on read rather than
//! silently served. Security posture: the database is the system of
//! record for every safety decision; this module never loses a write it
//! has acknowledged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use sentrygate_core::AuditId;
use sentrygate_core::AuditRecord;
use sentrygate_core::AuditStatus;
use sentrygate_core::AuditStore;
use sentrygate_core::AuditStoreError;
use sentrygate_core::ReasonCode;
use sentrygate_core::RequestId;
use sentrygate_core::ReviewDecision;
use sentrygate_core::Severity;
use sentrygate_core::TraceId;
use sentrygate_core::UserId;
use sentrygate_core::core::hashing::DEFAULT_HASH_ALGORITHM;
use sentrygate_core::core::hashing::canonical_json_bytes;
use sentrygate_core::core::hashing::hash_bytes;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum total path length accepted for the database file.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy; single-writer deployments only).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// Configuration for the `SQLite` audit store.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    pub journal_mode: SqliteStoreMode,
}

impl SqliteStoreConfig {
    /// Builds a config for `path` with secure defaults (WAL, 5s busy
    /// timeout).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::Wal,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors, mapped onto [`AuditStoreError`] at the trait
/// boundary.
#[derive(Debug, thiserror::Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite audit store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite audit store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite audit store corruption: {0}")]
    Corrupt(String),
    /// Invalid store data.
    #[error("sqlite audit store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for AuditStoreError {
    fn from(error: SqliteStoreError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed [`AuditStore`] with WAL support.
pub struct SqliteAuditStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteAuditStore {
    /// Opens an `SQLite`-backed audit store, creating the schema if it
    /// does not already exist.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let connection = open_connection(config)?;
        initialize_schema(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Opens an in-memory `SQLite` audit store, used by tests and
    /// single-process demo deployments.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the in-memory schema could not be
    /// initialized.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let connection = Connection::open_in_memory().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        initialize_schema(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Lists the `limit` most recently updated records still in
    /// [`AuditStatus::Open`], most recent first. `/review` only ever needs
    /// escalated records ([`AuditStore::list_escalated`]); this exists for
    /// operators auditing refusals that never escalated.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the query fails.
    pub fn list_open(&self, limit: usize) -> Result<Vec<AuditRecord>, SqliteStoreError> {
        self.list_by_status(AuditStatus::Open, limit)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn insert(&self, record: AuditRecord) -> Result<(), AuditStoreError> {
        self.insert_record(&record).map_err(AuditStoreError::from)
    }

    async fn get(&self, audit_id: &AuditId) -> Result<AuditRecord, AuditStoreError> {
        self.get_record(audit_id)
            .map_err(AuditStoreError::from)?
            .ok_or_else(|| AuditStoreError::NotFound(audit_id.as_str().to_string()))
    }

    async fn get_by_request(&self, request_id: &RequestId) -> Result<Vec<AuditRecord>, AuditStoreError> {
        self.get_records_by_request(request_id).map_err(AuditStoreError::from)
    }

    async fn resolve(
        &self,
        audit_id: &AuditId,
        decision: ReviewDecision,
        reviewer_id: &str,
        notes: Option<&str>,
    ) -> Result<AuditRecord, AuditStoreError> {
        let mut record = self
            .get_record(audit_id)
            .map_err(AuditStoreError::from)?
            .ok_or_else(|| AuditStoreError::NotFound(audit_id.as_str().to_string()))?;
        if record.status != AuditStatus::Escalated {
            return Err(AuditStoreError::InvalidTransition {
                from: record.status,
                to: AuditStatus::Resolved,
            });
        }
        let now = OffsetDateTime::now_utc();
        record.status = AuditStatus::Resolved;
        record.decision = Some(decision);
        record.reviewer_id = Some(reviewer_id.to_string());
        record.notes = notes.map(ToString::to_string);
        record.updated_at = now;
        record.resolved_at = Some(now);
        self.insert_record(&record).map_err(AuditStoreError::from)?;
        Ok(record)
    }

    async fn list_escalated(&self, limit: usize) -> Result<Vec<AuditRecord>, AuditStoreError> {
        self.list_by_status(AuditStatus::Escalated, limit).map_err(AuditStoreError::from)
    }
}

impl SqliteAuditStore {
    fn insert_record(&self, record: &AuditRecord) -> Result<(), SqliteStoreError> {
        let canonical_json =
            canonical_json_bytes(record).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &canonical_json);
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO audit_records (
                    audit_id, request_id, trace_id, user_id, status, reason_code, severity,
                    event_type, record_json, record_hash, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                ON CONFLICT(audit_id) DO UPDATE SET
                    status = excluded.status,
                    record_json = excluded.record_json,
                    record_hash = excluded.record_hash,
                    updated_at = excluded.updated_at",
                params![
                    record.audit_id.as_str(),
                    record.request_id.as_str(),
                    record.trace_id.as_str(),
                    record.user_id.as_str(),
                    status_label(record.status),
                    record.reason_code.map(ReasonCode::as_str),
                    record.severity.map(severity_label),
                    record.event_type,
                    canonical_json,
                    digest.value,
                    format_timestamp(record.created_at)?,
                    format_timestamp(record.updated_at)?,
                ],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    fn get_record(&self, audit_id: &AuditId) -> Result<Option<AuditRecord>, SqliteStoreError> {
        let guard = self.lock()?;
        let row: Option<(Vec<u8>, String)> = guard
            .query_row(
                "SELECT record_json, record_hash FROM audit_records WHERE audit_id = ?1",
                params![audit_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let Some((bytes, stored_hash)) = row else {
            return Ok(None);
        };
        decode_record(&bytes, &stored_hash).map(Some)
    }

    fn get_records_by_request(&self, request_id: &RequestId) -> Result<Vec<AuditRecord>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT record_json, record_hash FROM audit_records WHERE request_id = ?1 ORDER BY rowid ASC",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![request_id.as_str()], |row| {
                Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut records = Vec::new();
        for row in rows {
            let (bytes, stored_hash) = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            records.push(decode_record(&bytes, &stored_hash)?);
        }
        Ok(records)
    }

    fn list_by_status(&self, status: AuditStatus, limit: usize) -> Result<Vec<AuditRecord>, SqliteStoreError> {
        let guard = self.lock()?;
        #[allow(clippy::cast_possible_wrap, reason = "limit is bounded well under i64::MAX by the caller")]
        let limit = limit as i64;
        let mut stmt = guard
            .prepare(
                "SELECT record_json, record_hash FROM audit_records WHERE status = ?1 \
                 ORDER BY updated_at DESC LIMIT ?2",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![status_label(status), limit], |row| {
                Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut records = Vec::new();
        for row in rows {
            let (bytes, stored_hash) = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            records.push(decode_record(&bytes, &stored_hash)?);
        }
        Ok(records)
    }
}

fn decode_record(bytes: &[u8], stored_hash: &str) -> Result<AuditRecord, SqliteStoreError> {
    let expected = hash_bytes(DEFAULT_HASH_ALGORITHM, bytes);
    if expected.value != stored_hash {
        return Err(SqliteStoreError::Corrupt("audit record hash mismatch".to_string()));
    }
    serde_json::from_slice(bytes).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

fn status_label(status: AuditStatus) -> &'static str {
    match status {
        AuditStatus::Open => "open",
        AuditStatus::Escalated => "escalated",
        AuditStatus::Resolved => "resolved",
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}

fn format_timestamp(value: OffsetDateTime) -> Result<String, SqliteStoreError> {
    value.format(&Rfc3339).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

fn initialize_schema(connection: &Connection) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = connection
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    if version.is_none() {
        connection
            .execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    }
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_records (
                audit_id TEXT PRIMARY KEY,
                request_id TEXT NOT NULL,
                trace_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                reason_code TEXT,
                severity TEXT,
                event_type TEXT NOT NULL,
                record_json BLOB NOT NULL,
                record_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audit_records_request ON audit_records (request_id);
            CREATE INDEX IF NOT EXISTS idx_audit_records_status ON audit_records (status, updated_at);",
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(audit_id: &str, status: AuditStatus) -> AuditRecord {
        let now = OffsetDateTime::now_utc();
        AuditRecord {
            audit_id: AuditId::from(audit_id),
            request_id: RequestId::from("req-1"),
            trace_id: TraceId::from("trace-1"),
            user_id: UserId::from("user-1"),
            status,
            reason_code: Some(ReasonCode::RuleMatch),
            severity: Some(Severity::High),
            event_type: "refusal".to_string(),
            input_text: None,
            withheld_output: None,
            decision: None,
            reviewer_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = SqliteAuditStore::open_in_memory().expect("open");
        let rec = record("a1", AuditStatus::Open);
        store.insert(rec.clone()).await.expect("insert");
        let fetched = store.get(&rec.audit_id).await.expect("get");
        assert_eq!(fetched.audit_id, rec.audit_id);
        assert_eq!(fetched.status, AuditStatus::Open);
    }

    #[tokio::test]
    async fn get_missing_record_is_not_found() {
        let store = SqliteAuditStore::open_in_memory().expect("open");
        let err = store.get(&AuditId::from("missing")).await.unwrap_err();
        assert!(matches!(err, AuditStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn resolve_requires_escalated_status() {
        let store = SqliteAuditStore::open_in_memory().expect("open");
        let rec = record("a2", AuditStatus::Open);
        store.insert(rec.clone()).await.expect("insert");
        let err = store.resolve(&rec.audit_id, ReviewDecision::Approve, "reviewer-1", None).await.unwrap_err();
        assert!(matches!(err, AuditStoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn resolve_escalated_record_transitions_to_resolved() {
        let store = SqliteAuditStore::open_in_memory().expect("open");
        let rec = record("a3", AuditStatus::Escalated);
        store.insert(rec.clone()).await.expect("insert");
        let resolved = store
            .resolve(&rec.audit_id, ReviewDecision::Block, "reviewer-1", Some("looks fine"))
            .await
            .expect("resolve");
        assert_eq!(resolved.status, AuditStatus::Resolved);
        assert_eq!(resolved.decision, Some(ReviewDecision::Block));
        assert_eq!(resolved.reviewer_id.as_deref(), Some("reviewer-1"));
        assert_eq!(resolved.notes.as_deref(), Some("looks fine"));
        assert!(resolved.resolved_at.is_some());
    }

    #[tokio::test]
    async fn list_escalated_only_returns_matching_status() {
        let store = SqliteAuditStore::open_in_memory().expect("open");
        store.insert(record("a4", AuditStatus::Open)).await.expect("insert");
        store.insert(record("a5", AuditStatus::Escalated)).await.expect("insert");
        let escalated = store.list_escalated(10).await.expect("list");
        assert_eq!(escalated.len(), 1);
        assert_eq!(escalated[0].audit_id.as_str(), "a5");
    }

    #[tokio::test]
    async fn list_open_only_returns_matching_status() {
        let store = SqliteAuditStore::open_in_memory().expect("open");
        store.insert(record("a8", AuditStatus::Open)).await.expect("insert");
        store.insert(record("a9", AuditStatus::Escalated)).await.expect("insert");
        let open = store.list_open(10).expect("list");
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].audit_id.as_str(), "a8");
    }

    #[tokio::test]
    async fn get_by_request_returns_insertion_order() {
        let store = SqliteAuditStore::open_in_memory().expect("open");
        store.insert(record("a6", AuditStatus::Open)).await.expect("insert");
        store.insert(record("a7", AuditStatus::Escalated)).await.expect("insert");
        let records = store.get_by_request(&RequestId::from("req-1")).await.expect("get_by_request");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].audit_id.as_str(), "a6");
        assert_eq!(records[1].audit_id.as_str(), "a7");
    }
}
