//! Append-only change ledger storage
//!
//! No update or delete interface exists on this table. Each entry links
//! to its predecessor through a SHA256 hash chain, so silent edits and
//! removed rows are both detectable after the fact.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use thiserror::Error;

use super::types::{
    AtomicChange, ChainBreak, ChainVerification, ChangeContext, ChangeField, ChangeLogEntry,
    ChangeLogListResponse, ChangeLogQuery, ChangeType,
};
use crate::utils::AppError;
use crate::utils::time;

/// Largest page a single ledger query may return
pub const MAX_PAGE_SIZE: i64 = 500;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt ledger entry {sequence}: {reason}")]
    Corrupt { sequence: i64, reason: String },
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Database(e) => AppError::database(e.to_string()),
            other => AppError::internal(other.to_string()),
        }
    }
}

/// Raw ledger row; `data` is still JSON text
#[derive(Debug, Clone, sqlx::FromRow)]
struct ChangeLogRow {
    sequence: i64,
    site_id: String,
    empid: String,
    month: u32,
    year: i32,
    field: String,
    change_type: String,
    description: String,
    data: String,
    changed_by: String,
    remark: Option<String>,
    timestamp: i64,
    prev_hash: String,
    curr_hash: String,
}

impl TryFrom<ChangeLogRow> for ChangeLogEntry {
    type Error = LedgerError;

    fn try_from(row: ChangeLogRow) -> Result<Self, Self::Error> {
        let field: ChangeField = row.field.parse().map_err(|reason| LedgerError::Corrupt {
            sequence: row.sequence,
            reason,
        })?;
        let change_type: ChangeType =
            row.change_type
                .parse()
                .map_err(|reason| LedgerError::Corrupt {
                    sequence: row.sequence,
                    reason,
                })?;
        Ok(Self {
            sequence: row.sequence,
            site_id: row.site_id,
            empid: row.empid,
            month: row.month,
            year: row.year,
            field,
            change_type,
            description: row.description,
            data: serde_json::from_str(&row.data)?,
            changed_by: row.changed_by,
            remark: row.remark,
            timestamp: row.timestamp,
            prev_hash: row.prev_hash,
            curr_hash: row.curr_hash,
        })
    }
}

/// Change ledger over SQLite
///
/// Append-only:
/// - only `record`, `query` and `verify_chain` exist
/// - sequence numbers are assigned under a lock, so concurrent writers
///   cannot collide or fork the chain
#[derive(Clone)]
pub struct ChangeLedger {
    pool: SqlitePool,
    /// Serializes appends; sequence assignment is read-modify-write
    append_lock: Arc<tokio::sync::Mutex<()>>,
}

impl ChangeLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            append_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Append one ledger entry per atomic change
    ///
    /// The whole batch is written under a single lock acquisition so the
    /// entries of one operation are contiguous in the chain. Returns the
    /// number of entries written.
    pub async fn record(
        &self,
        changes: &[AtomicChange],
        ctx: &ChangeContext,
    ) -> LedgerResult<usize> {
        if changes.is_empty() {
            return Ok(0);
        }

        let _guard = self.append_lock.lock().await;

        let mut written = 0;
        for change in changes {
            self.append_one(change, ctx).await?;
            written += 1;
        }
        Ok(written)
    }

    /// Append a single entry; caller must hold the append lock
    async fn append_one(
        &self,
        change: &AtomicChange,
        ctx: &ChangeContext,
    ) -> LedgerResult<ChangeLogEntry> {
        // 1. read the last sequence and hash
        let last = sqlx::query_as::<_, (i64, String)>(
            "SELECT sequence, curr_hash FROM change_log ORDER BY sequence DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let (sequence, prev_hash) = match last {
            Some((seq, hash)) => (seq + 1, hash),
            None => (1, "genesis".to_string()),
        };

        // 2. hash over every stored field
        let timestamp = time::now_millis();
        let data_json = serde_json::to_string(&change.data)?;
        let curr_hash = compute_entry_hash(
            &prev_hash,
            sequence,
            timestamp,
            &ctx.site_id,
            &ctx.empid,
            ctx.month,
            ctx.year,
            change.field.as_str(),
            change.change_type.as_str(),
            &change.description,
            &data_json,
            &ctx.changed_by,
            ctx.remark.as_deref(),
        );

        // 3. persist
        sqlx::query(
            "INSERT INTO change_log (sequence, site_id, empid, month, year, field, change_type, description, data, changed_by, remark, timestamp, prev_hash, curr_hash) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(sequence)
        .bind(&ctx.site_id)
        .bind(&ctx.empid)
        .bind(ctx.month)
        .bind(ctx.year)
        .bind(change.field.as_str())
        .bind(change.change_type.as_str())
        .bind(&change.description)
        .bind(&data_json)
        .bind(&ctx.changed_by)
        .bind(&ctx.remark)
        .bind(timestamp)
        .bind(&prev_hash)
        .bind(&curr_hash)
        .execute(&self.pool)
        .await?;

        Ok(ChangeLogEntry {
            sequence,
            site_id: ctx.site_id.clone(),
            empid: ctx.empid.clone(),
            month: ctx.month,
            year: ctx.year,
            field: change.field,
            change_type: change.change_type,
            description: change.description.clone(),
            data: change.data.clone(),
            changed_by: ctx.changed_by.clone(),
            remark: ctx.remark.clone(),
            timestamp,
            prev_hash,
            curr_hash,
        })
    }

    /// Query ledger entries, newest first
    pub async fn query(&self, q: &ChangeLogQuery) -> LedgerResult<ChangeLogListResponse> {
        let mut conditions: Vec<&str> = Vec::new();

        if q.site_id.is_some() {
            conditions.push("site_id = ?");
        }
        if q.empid.is_some() {
            conditions.push("empid = ?");
        }
        if q.field.is_some() {
            conditions.push("field = ?");
        }
        if q.change_type.is_some() {
            conditions.push("change_type = ?");
        }
        if q.changed_by.is_some() {
            conditions.push("changed_by = ?");
        }
        if q.from.is_some() {
            conditions.push("timestamp >= ?");
        }
        if q.to.is_some() {
            conditions.push("timestamp <= ?");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM change_log{where_clause}");
        let select_sql = format!(
            "SELECT sequence, site_id, empid, month, year, field, change_type, description, data, changed_by, remark, timestamp, prev_hash, curr_hash FROM change_log{where_clause} ORDER BY sequence DESC LIMIT ? OFFSET ?"
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(ref site_id) = q.site_id {
            count_query = count_query.bind(site_id);
        }
        if let Some(ref empid) = q.empid {
            count_query = count_query.bind(empid);
        }
        if let Some(field) = q.field {
            count_query = count_query.bind(field.as_str());
        }
        if let Some(change_type) = q.change_type {
            count_query = count_query.bind(change_type.as_str());
        }
        if let Some(ref changed_by) = q.changed_by {
            count_query = count_query.bind(changed_by);
        }
        if let Some(from) = q.from {
            count_query = count_query.bind(from);
        }
        if let Some(to) = q.to {
            count_query = count_query.bind(to);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let limit = q.limit.clamp(1, MAX_PAGE_SIZE);
        let offset = q.offset.max(0);
        let mut select_query = sqlx::query_as::<_, ChangeLogRow>(&select_sql);
        if let Some(ref site_id) = q.site_id {
            select_query = select_query.bind(site_id);
        }
        if let Some(ref empid) = q.empid {
            select_query = select_query.bind(empid);
        }
        if let Some(field) = q.field {
            select_query = select_query.bind(field.as_str());
        }
        if let Some(change_type) = q.change_type {
            select_query = select_query.bind(change_type.as_str());
        }
        if let Some(ref changed_by) = q.changed_by {
            select_query = select_query.bind(changed_by);
        }
        if let Some(from) = q.from {
            select_query = select_query.bind(from);
        }
        if let Some(to) = q.to {
            select_query = select_query.bind(to);
        }
        let rows = select_query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(ChangeLogEntry::try_from)
            .collect::<LedgerResult<Vec<_>>>()?;

        Ok(ChangeLogListResponse { items, total })
    }

    /// Recompute every entry hash and check chain linkage
    ///
    /// Hashes are recomputed from the raw stored strings, so a row whose
    /// enum text or JSON was tampered into garbage still reports a break
    /// instead of failing the walk.
    pub async fn verify_chain(&self) -> LedgerResult<ChainVerification> {
        let rows = sqlx::query_as::<_, ChangeLogRow>(
            "SELECT sequence, site_id, empid, month, year, field, change_type, description, data, changed_by, remark, timestamp, prev_hash, curr_hash FROM change_log ORDER BY sequence ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut breaks = Vec::new();
        let mut expected_prev = "genesis".to_string();

        for row in &rows {
            if row.prev_hash != expected_prev {
                breaks.push(ChainBreak {
                    sequence: row.sequence,
                    expected_hash: expected_prev.clone(),
                    actual_hash: row.prev_hash.clone(),
                });
            }

            let recomputed = compute_entry_hash(
                &row.prev_hash,
                row.sequence,
                row.timestamp,
                &row.site_id,
                &row.empid,
                row.month,
                row.year,
                &row.field,
                &row.change_type,
                &row.description,
                &row.data,
                &row.changed_by,
                row.remark.as_deref(),
            );
            if recomputed != row.curr_hash {
                breaks.push(ChainBreak {
                    sequence: row.sequence,
                    expected_hash: recomputed,
                    actual_hash: row.curr_hash.clone(),
                });
            }

            expected_prev = row.curr_hash.clone();
        }

        Ok(ChainVerification {
            total_entries: rows.len() as i64,
            chain_intact: breaks.is_empty(),
            breaks,
        })
    }
}

/// SHA256 over one entry's stored fields
///
/// Design points:
/// - variable-length fields are separated with `\x00` so `("ab","cd")`
///   and `("abc","d")` cannot collide
/// - fixed-width integers contribute LE bytes, no separator needed
/// - optional fields use a tag byte (`\x01`+bytes / `\x00`) so `None`
///   and `Some("")` differ
/// - `data` is hashed as the exact JSON text stored in the row
#[allow(clippy::too_many_arguments)]
fn compute_entry_hash(
    prev_hash: &str,
    sequence: i64,
    timestamp: i64,
    site_id: &str,
    empid: &str,
    month: u32,
    year: i32,
    field: &str,
    change_type: &str,
    description: &str,
    data_json: &str,
    changed_by: &str,
    remark: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();

    hasher.update(prev_hash.as_bytes());
    hasher.update(b"\x00");

    hasher.update(sequence.to_le_bytes());
    hasher.update(timestamp.to_le_bytes());

    hasher.update(site_id.as_bytes());
    hasher.update(b"\x00");
    hasher.update(empid.as_bytes());
    hasher.update(b"\x00");

    hasher.update(month.to_le_bytes());
    hasher.update(year.to_le_bytes());

    hasher.update(field.as_bytes());
    hasher.update(b"\x00");
    hasher.update(change_type.as_bytes());
    hasher.update(b"\x00");
    hasher.update(description.as_bytes());
    hasher.update(b"\x00");
    hasher.update(data_json.as_bytes());
    hasher.update(b"\x00");
    hasher.update(changed_by.as_bytes());
    hasher.update(b"\x00");

    hash_optional(&mut hasher, remark);

    format!("{:x}", hasher.finalize())
}

/// Optional field hashing: `\x00` = None, `\x01` + bytes = Some
fn hash_optional(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update(b"\x01");
            hasher.update(v.as_bytes());
        }
        None => {
            hasher.update(b"\x00");
        }
    }
    hasher.update(b"\x00");
}
