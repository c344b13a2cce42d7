// src/services/record_store.rs
//! RecordStore: CRUD over small JSON collections in one SQLite file.
//!
//! - Owns a single SQLite connection (WAL) behind a mutex; the lock is held
//!   across every read-modify-write, so concurrent updates both apply
//!   instead of racing last-write-wins.
//! - Each collection is one row in the `shelves` table holding the whole
//!   JSON array, the way the original key-value layout stored it.
//! - The shelf adapter enforces the byte quota and reports overflow as a
//!   typed [`StoreError::Exhausted`], so retention shrinking is a normal
//!   branch rather than error-string sniffing.

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;

use crate::entities::{InsertOrder, Record};
use crate::errors::StoreError;

pub struct RecordStore {
    conn: Mutex<Connection>,
    quota_bytes: usize,
    ids: IdGen,
}

impl RecordStore {
    /// Open/create the SQLite DB and ensure the shelf table.
    pub fn open(db_path: &Path, quota_bytes: usize) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;

        // WAL reduces writer/reader blocking; safe for our single-writer design.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS shelves (
              name        TEXT PRIMARY KEY,  -- collection name ("stories", ...)
              payload     TEXT NOT NULL,     -- the full JSON array
              updated_at  TEXT NOT NULL      -- RFC3339 UTC
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            quota_bytes,
            ids: IdGen::new(),
        })
    }

    /// List a collection, optionally sorted and truncated.
    ///
    /// `sort` takes a field name, `-` prefixed for descending (e.g.
    /// `"-created_date"`). Sorting happens on read; records missing the
    /// field keep their stored position relative to each other.
    pub fn list<R: Record>(
        &self,
        sort: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<R>, StoreError> {
        let conn = self.lock()?;
        let mut items = read_shelf(&conn, R::COLLECTION)?;
        drop(conn);

        if let Some(spec) = sort {
            sort_items(&mut items, spec);
        }
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        items
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .collect()
    }

    /// Create a record: assign a fresh id and creation timestamp, sanitize,
    /// and persist under the collection's insert order and retention window.
    ///
    /// A quota-triggered shrink of *older* history is silent here — the new
    /// record itself always survives the shrink.
    pub fn create<R: Record>(&self, mut record: R) -> Result<R, StoreError> {
        record.assign_identity(self.ids.next().to_string(), now_stamp());
        let record = record.sanitize();
        let value = serde_json::to_value(&record)?;

        let conn = self.lock()?;
        let mut items = read_shelf(&conn, R::COLLECTION)?;
        match R::INSERT {
            InsertOrder::Prepend => items.insert(0, value),
            InsertOrder::Append => items.push(value),
        }
        self.persist::<R>(&conn, items)?;
        Ok(record)
    }

    /// Merge `patch` into the record with the given id (shallow, patch
    /// wins) and persist the collection.
    ///
    /// Returns `Ok(None)` when the id is absent; the collection is left
    /// untouched. A quota failure that survives the retention shrink
    /// surfaces as [`StoreError::Exhausted`].
    pub fn update<R: Record>(&self, id: &str, patch: Value) -> Result<Option<R>, StoreError> {
        // Lock held across read-merge-write: concurrent updates serialize.
        let conn = self.lock()?;
        let mut items = read_shelf(&conn, R::COLLECTION)?;

        let Some(pos) = items
            .iter()
            .position(|v| v.get("id").and_then(Value::as_str) == Some(id))
        else {
            return Ok(None);
        };

        let mut merged = items[pos].clone();
        shallow_merge(&mut merged, patch);
        let record: R = serde_json::from_value(merged)?;
        let record = record.sanitize();
        items[pos] = serde_json::to_value(&record)?;

        self.persist::<R>(&conn, items)?;
        Ok(Some(record))
    }

    /// Linear equality scan: every `(field, value)` pair must match.
    pub fn filter<R: Record>(&self, fields: &[(&str, Value)]) -> Result<Vec<R>, StoreError> {
        let conn = self.lock()?;
        let items = read_shelf(&conn, R::COLLECTION)?;
        drop(conn);

        items
            .into_iter()
            .filter(|item| fields.iter().all(|(k, want)| item.get(*k) == Some(want)))
            .map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .collect()
    }

    /// Create a batch in one persist. Ids are `base + index` so they stay
    /// unique within the batch.
    pub fn bulk_create<R: Record>(&self, records: Vec<R>) -> Result<Vec<R>, StoreError> {
        let base = self.ids.reserve(records.len() as i64);
        let created = now_stamp();

        let mut out = Vec::with_capacity(records.len());
        let mut values = Vec::with_capacity(records.len());
        for (idx, mut record) in records.into_iter().enumerate() {
            record.assign_identity((base + idx as i64).to_string(), created.clone());
            let record = record.sanitize();
            values.push(serde_json::to_value(&record)?);
            out.push(record);
        }

        let conn = self.lock()?;
        let mut items = read_shelf(&conn, R::COLLECTION)?;
        match R::INSERT {
            InsertOrder::Prepend => {
                for value in values.into_iter().rev() {
                    items.insert(0, value);
                }
            }
            InsertOrder::Append => items.extend(values),
        }
        self.persist::<R>(&conn, items)?;
        Ok(out)
    }

    // Apply the retention cap, write, and on quota overflow shrink once to
    // the retention floor and retry. A second failure escapes as Exhausted.
    fn persist<R: Record>(
        &self,
        conn: &Connection,
        mut items: Vec<Value>,
    ) -> Result<(), StoreError> {
        if let Some(retention) = R::RETENTION {
            keep_newest(&mut items, retention.cap, R::INSERT);
        }

        match write_shelf(conn, R::COLLECTION, &items, self.quota_bytes) {
            Err(StoreError::Exhausted) => {
                let Some(retention) = R::RETENTION else {
                    return Err(StoreError::Exhausted);
                };
                tracing::warn!(
                    collection = R::COLLECTION,
                    floor = retention.floor,
                    "quota exceeded; shrinking retention window and retrying"
                );
                keep_newest(&mut items, retention.floor, R::INSERT);
                write_shelf(conn, R::COLLECTION, &items, self.quota_bytes)
            }
            other => other,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Fault("record store mutex poisoned".into()))
    }
}

// ---- shelf adapter (the only code that touches SQLite) --------------------

fn read_shelf(conn: &Connection, name: &str) -> Result<Vec<Value>, StoreError> {
    let payload: Option<String> = conn
        .query_row("SELECT payload FROM shelves WHERE name=?1", [name], |row| {
            row.get(0)
        })
        .optional()?;
    match payload {
        Some(text) => Ok(serde_json::from_str(&text)?),
        None => Ok(Vec::new()),
    }
}

fn write_shelf(
    conn: &Connection,
    name: &str,
    items: &[Value],
    quota_bytes: usize,
) -> Result<(), StoreError> {
    let payload = serde_json::to_string(items)?;

    // The quota covers the whole store, so count the other shelves too.
    let others: i64 = conn.query_row(
        "SELECT COALESCE(SUM(LENGTH(payload)), 0) FROM shelves WHERE name != ?1",
        [name],
        |row| row.get(0),
    )?;
    if others as usize + payload.len() > quota_bytes {
        return Err(StoreError::Exhausted);
    }

    let now = now_stamp();
    conn.execute(
        r#"
        INSERT INTO shelves(name, payload, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(name) DO UPDATE SET
          payload    = excluded.payload,
          updated_at = excluded.updated_at
        "#,
        (name, &payload, &now),
    )?;
    Ok(())
}

// ---- helpers --------------------------------------------------------------

// Millisecond-precision RFC3339 with a trailing Z, matching the layout the
// collections were written with originally.
fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn keep_newest(items: &mut Vec<Value>, n: usize, order: InsertOrder) {
    if items.len() <= n {
        return;
    }
    match order {
        InsertOrder::Prepend => items.truncate(n),
        InsertOrder::Append => {
            let drop = items.len() - n;
            items.drain(..drop);
        }
    }
}

fn shallow_merge(target: &mut Value, patch: Value) {
    if let (Value::Object(target), Value::Object(patch)) = (target, patch) {
        for (key, value) in patch {
            target.insert(key, value);
        }
    }
}

fn sort_items(items: &mut [Value], spec: &str) {
    let (field, descending) = match spec.strip_prefix('-') {
        Some(field) => (field, true),
        None => (spec, false),
    };
    // Stable sort; items without the field compare equal and keep their
    // stored order relative to each other.
    items.sort_by(|a, b| {
        let ka = a.get(field).and_then(Value::as_str).unwrap_or("");
        let kb = b.get(field).and_then(Value::as_str).unwrap_or("");
        if descending {
            kb.cmp(ka)
        } else {
            ka.cmp(kb)
        }
    });
}

// Time-based ids, monotonic within the process so same-millisecond creates
// never collide.
struct IdGen {
    last: Mutex<i64>,
}

impl IdGen {
    fn new() -> Self {
        Self { last: Mutex::new(0) }
    }

    fn next(&self) -> i64 {
        self.reserve(1)
    }

    fn reserve(&self, n: i64) -> i64 {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let base = (Utc::now().timestamp_millis()).max(*last + 1);
        *last = base + n - 1;
        base
    }
}
