//! Postgres-backed store implementation.
//!
//! Mirrors the in-memory semantics on a relational schema: one transaction
//! per commit covers the stream version check, the event inserts, the
//! snapshot row locks/updates and the ledger inserts, so a workflow action
//! and its movements land together or not at all.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | StoreError | Scenario |
//! |------------|-----------------|------------|----------|
//! | Database (unique violation) | `23505` | `Concurrency` | Concurrent append (unique `(tenant_id, aggregate_id, sequence_number)`) or duplicate operation |
//! | Database (serialization failure) | `40001` | `Concurrency` | Serializable transaction conflict |
//! | Database (check violation) | `23514` | `InvalidMovement` | Negative balance rejected by the schema |
//! | Database (other) | any | `Storage` | Other database errors |
//! | non-database errors | n/a | `Storage` | Pool closed, network failures, … |
//!
//! ## Locking
//!
//! Movements lock their snapshot rows with `SELECT … FOR UPDATE` in a fixed
//! key order (bin, item, batch), so concurrent batches on overlapping keys
//! serialize instead of deadlocking; disjoint keys proceed concurrently.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockline_core::{AggregateId, ExpectedVersion, TenantId};
use stockline_stock::{
    LedgerEntry, Movement, MovementBatch, MovementReason, MovementRef, StockSnapshot,
};

use super::r#trait::{CommitOutcome, StoreError, StoredEvent, UncommittedEvent};

/// Schema for the workflow streams, the stock ledger and its snapshot cache.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    event_id        UUID PRIMARY KEY,
    tenant_id       UUID NOT NULL,
    aggregate_id    UUID NOT NULL,
    aggregate_type  TEXT NOT NULL,
    sequence_number BIGINT NOT NULL CHECK (sequence_number > 0),
    event_type      TEXT NOT NULL,
    event_version   INT NOT NULL,
    occurred_at     TIMESTAMPTZ NOT NULL,
    payload         JSONB NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (tenant_id, aggregate_id, sequence_number)
);

CREATE TABLE IF NOT EXISTS stock_snapshots (
    tenant_id     UUID NOT NULL,
    bin_id        UUID NOT NULL,
    item_id       UUID NOT NULL,
    batch_no      TEXT,
    warehouse_id  UUID NOT NULL,
    qty_on_hand   BIGINT NOT NULL CHECK (qty_on_hand >= 0),
    qty_reserved  BIGINT NOT NULL CHECK (qty_reserved >= 0 AND qty_reserved <= qty_on_hand),
    expiry_date   DATE,
    updated_at    TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (tenant_id, bin_id, item_id, batch_no)
);

CREATE TABLE IF NOT EXISTS stock_ledger (
    id            UUID PRIMARY KEY,
    operation_id  UUID NOT NULL,
    tenant_id     UUID NOT NULL,
    warehouse_id  UUID NOT NULL,
    bin_id        UUID NOT NULL,
    item_id       UUID NOT NULL,
    batch_no      TEXT,
    reason        TEXT NOT NULL,
    qty_change    BIGINT NOT NULL CHECK (qty_change <> 0),
    qty_after     BIGINT NOT NULL CHECK (qty_after >= 0),
    expiry_date   DATE,
    reference     JSONB,
    occurred_at   TIMESTAMPTZ NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS stock_ledger_key_idx
    ON stock_ledger (tenant_id, bin_id, item_id, batch_no, created_at);
CREATE INDEX IF NOT EXISTS stock_ledger_operation_idx
    ON stock_ledger (operation_id);

CREATE TABLE IF NOT EXISTS batches (
    tenant_id   UUID NOT NULL,
    item_id     UUID NOT NULL,
    batch_no    TEXT NOT NULL,
    expiry_date DATE,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (tenant_id, item_id, batch_no)
);

CREATE TABLE IF NOT EXISTS movement_operations (
    operation_id UUID PRIMARY KEY,
    tenant_id    UUID NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#;

/// Postgres-backed store for workflow streams and the stock ledger.
///
/// Uses the SQLx connection pool (thread-safe, `Send + Sync`); every write
/// path runs inside one transaction.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the schema objects if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    /// Load all events for a tenant + aggregate stream, in sequence order.
    #[instrument(
        skip(self),
        fields(tenant_id = %tenant_id.as_uuid(), aggregate_id = %aggregate_id.as_uuid()),
        err
    )]
    pub async fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, tenant_id, aggregate_id, aggregate_type,
                   sequence_number, event_type, event_version, occurred_at, payload
            FROM events
            WHERE tenant_id = $1 AND aggregate_id = $2
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(aggregate_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stream", e))?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            stored.push(stored_event_from_row(&row)?);
        }
        Ok(stored)
    }

    /// Append events and post the accompanying movements in one transaction.
    #[instrument(
        skip(self, events, movements),
        fields(event_count = events.len(), expected_version = ?expected_version),
        err
    )]
    pub async fn append_with_movements(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
        movements: Option<MovementBatch>,
    ) -> Result<CommitOutcome, StoreError> {
        if events.is_empty() && movements.is_none() {
            return Ok(CommitOutcome::default());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let mut committed = Vec::with_capacity(events.len());
        if let Some(first) = events.first() {
            let tenant_id = first.tenant_id;
            let aggregate_id = first.aggregate_id;

            for (idx, e) in events.iter().enumerate() {
                if e.tenant_id != tenant_id {
                    return Err(StoreError::TenantIsolation(format!(
                        "batch contains multiple tenant_ids (index {idx})"
                    )));
                }
                if e.aggregate_id != aggregate_id {
                    return Err(StoreError::InvalidAppend(format!(
                        "batch contains multiple aggregate_ids (index {idx})"
                    )));
                }
            }
            if let Some(batch) = &movements
                && batch.tenant_id != tenant_id
            {
                return Err(StoreError::TenantIsolation(
                    "movement batch tenant does not match event tenant".to_string(),
                ));
            }

            let current: i64 = sqlx::query(
                r#"
                SELECT COALESCE(MAX(sequence_number), 0) AS version
                FROM events
                WHERE tenant_id = $1 AND aggregate_id = $2
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(aggregate_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("stream_version", e))?
            .try_get("version")
            .map_err(|e| StoreError::Storage(e.to_string()))?;

            if !expected_version.matches(current as u64) {
                return Err(StoreError::Concurrency(format!(
                    "expected {expected_version:?}, found {current}"
                )));
            }

            let mut next = (current as u64) + 1;
            for e in events {
                sqlx::query(
                    r#"
                    INSERT INTO events (event_id, tenant_id, aggregate_id, aggregate_type,
                                        sequence_number, event_type, event_version,
                                        occurred_at, payload)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(e.event_id)
                .bind(e.tenant_id.as_uuid())
                .bind(e.aggregate_id.as_uuid())
                .bind(&e.aggregate_type)
                .bind(next as i64)
                .bind(&e.event_type)
                .bind(e.event_version as i32)
                .bind(e.occurred_at)
                .bind(&e.payload)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_event", e))?;

                committed.push(StoredEvent {
                    event_id: e.event_id,
                    tenant_id: e.tenant_id,
                    aggregate_id: e.aggregate_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: next,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                });
                next += 1;
            }
        }

        let mut ledger_entries = Vec::new();
        if let Some(batch) = movements {
            ledger_entries = apply_batch_tx(&mut tx, &batch).await?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        Ok(CommitOutcome {
            events: committed,
            ledger_entries,
        })
    }

    /// Validate and post a movement batch in one transaction.
    ///
    /// A replayed `operation_id` returns the originally written entries.
    #[instrument(
        skip(self, batch),
        fields(operation_id = %batch.operation_id, movements = batch.movements.len()),
        err
    )]
    pub async fn apply_movements(
        &self,
        batch: MovementBatch,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let replayed = sqlx::query(
            "SELECT 1 AS seen FROM movement_operations WHERE operation_id = $1",
        )
        .bind(batch.operation_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("operation_lookup", e))?;

        if replayed.is_some() {
            let entries = self.ledger_for_operation(batch.operation_id).await?;
            return Ok(entries);
        }

        let entries = apply_batch_tx(&mut tx, &batch).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(entries)
    }

    /// Entries written by one operation, in write order.
    pub async fn ledger_for_operation(
        &self,
        operation_id: Uuid,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, operation_id, tenant_id, warehouse_id, bin_id, item_id, batch_no,
                   reason, qty_change, qty_after, expiry_date, reference,
                   occurred_at, created_at
            FROM stock_ledger
            WHERE operation_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(operation_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ledger_for_operation", e))?;

        rows.iter().map(ledger_entry_from_row).collect()
    }
}

/// Post one batch inside an open transaction: lock, validate, write.
async fn apply_batch_tx(
    tx: &mut Transaction<'_, Postgres>,
    batch: &MovementBatch,
) -> Result<Vec<LedgerEntry>, StoreError> {
    batch.validate().map_err(|e| match e {
        stockline_core::DomainError::InsufficientStock {
            requested,
            available,
        } => StoreError::InsufficientStock {
            requested,
            available,
        },
        other => StoreError::InvalidMovement(other.to_string()),
    })?;

    sqlx::query("INSERT INTO movement_operations (operation_id, tenant_id) VALUES ($1, $2)")
        .bind(batch.operation_id)
        .bind(batch.tenant_id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("register_operation", e))?;

    // Lock keys in a fixed order so overlapping batches serialize instead of
    // deadlocking.
    let mut ordered: Vec<&Movement> = batch.movements.iter().collect();
    ordered.sort_by_key(|m| {
        (
            *m.bin_id.as_uuid().as_bytes(),
            *m.item_id.as_uuid().as_bytes(),
            m.batch_no.clone(),
        )
    });

    let created_at = Utc::now();
    let mut entries_by_index: Vec<Option<LedgerEntry>> = vec![None; batch.movements.len()];

    for movement in ordered {
        let index = batch
            .movements
            .iter()
            .position(|m| std::ptr::eq(m, movement))
            .unwrap_or(0);

        let batch_no = movement.batch_no.as_ref().map(|b| b.as_str().to_string());
        let effective_expiry =
            resolve_batch_expiry(tx, batch.tenant_id, movement, created_at).await?;

        let row = sqlx::query(
            r#"
            SELECT warehouse_id, qty_on_hand, qty_reserved, expiry_date, updated_at
            FROM stock_snapshots
            WHERE tenant_id = $1 AND bin_id = $2 AND item_id = $3
              AND batch_no IS NOT DISTINCT FROM $4
            FOR UPDATE
            "#,
        )
        .bind(batch.tenant_id.as_uuid())
        .bind(movement.bin_id.as_uuid())
        .bind(movement.item_id.as_uuid())
        .bind(&batch_no)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_snapshot", e))?;

        let mut snapshot = match &row {
            Some(row) => snapshot_from_row(row)?,
            None => StockSnapshot::empty(movement.warehouse_id, effective_expiry, created_at),
        };

        if snapshot.warehouse_id != movement.warehouse_id {
            return Err(StoreError::InvalidMovement(format!(
                "bin {} belongs to a different warehouse",
                movement.bin_id
            )));
        }

        let qty_after = snapshot
            .post(movement.reason, movement.qty_change, created_at)
            .map_err(|e| match e {
                stockline_core::DomainError::InsufficientStock {
                    requested,
                    available,
                } => StoreError::InsufficientStock {
                    requested,
                    available,
                },
                other => StoreError::InvalidMovement(other.to_string()),
            })?;

        sqlx::query(
            r#"
            INSERT INTO stock_snapshots (tenant_id, bin_id, item_id, batch_no, warehouse_id,
                                         qty_on_hand, qty_reserved, expiry_date, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (tenant_id, bin_id, item_id, batch_no)
            DO UPDATE SET qty_on_hand = EXCLUDED.qty_on_hand,
                          qty_reserved = EXCLUDED.qty_reserved,
                          updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(batch.tenant_id.as_uuid())
        .bind(movement.bin_id.as_uuid())
        .bind(movement.item_id.as_uuid())
        .bind(&batch_no)
        .bind(movement.warehouse_id.as_uuid())
        .bind(snapshot.qty_on_hand)
        .bind(snapshot.qty_reserved)
        .bind(snapshot.expiry_date)
        .bind(snapshot.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_snapshot", e))?;

        let entry = LedgerEntry {
            id: Uuid::now_v7(),
            operation_id: batch.operation_id,
            tenant_id: batch.tenant_id,
            warehouse_id: movement.warehouse_id,
            bin_id: movement.bin_id,
            item_id: movement.item_id,
            batch_no: movement.batch_no.clone(),
            reason: movement.reason,
            qty_change: movement.qty_change,
            qty_after,
            expiry_date: effective_expiry,
            reference: movement.reference,
            occurred_at: batch.occurred_at,
            created_at,
        };

        let reference = entry
            .reference
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO stock_ledger (id, operation_id, tenant_id, warehouse_id, bin_id,
                                      item_id, batch_no, reason, qty_change, qty_after,
                                      expiry_date, reference, occurred_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(entry.id)
        .bind(entry.operation_id)
        .bind(entry.tenant_id.as_uuid())
        .bind(entry.warehouse_id.as_uuid())
        .bind(entry.bin_id.as_uuid())
        .bind(entry.item_id.as_uuid())
        .bind(&batch_no)
        .bind(entry.reason.as_str())
        .bind(entry.qty_change)
        .bind(entry.qty_after)
        .bind(entry.expiry_date)
        .bind(&reference)
        .bind(entry.occurred_at)
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_ledger_entry", e))?;

        entries_by_index[index] = Some(entry);
    }

    Ok(entries_by_index.into_iter().flatten().collect())
}

/// Register or validate the batch named by a movement; returns the expiry
/// the snapshot should carry.
async fn resolve_batch_expiry(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: TenantId,
    movement: &Movement,
    created_at: chrono::DateTime<Utc>,
) -> Result<Option<NaiveDate>, StoreError> {
    let Some(batch_no) = &movement.batch_no else {
        return Ok(None);
    };

    let row = sqlx::query(
        r#"
        SELECT expiry_date FROM batches
        WHERE tenant_id = $1 AND item_id = $2 AND batch_no = $3
        FOR UPDATE
        "#,
    )
    .bind(tenant_id.as_uuid())
    .bind(movement.item_id.as_uuid())
    .bind(batch_no.as_str())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("batch_lookup", e))?;

    match row {
        Some(row) => {
            let registered: Option<NaiveDate> = row
                .try_get("expiry_date")
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            if let (Some(incoming), Some(registered)) = (movement.expiry_date, registered)
                && incoming != registered
            {
                return Err(StoreError::InvalidMovement(format!(
                    "batch {batch_no} is registered with expiry {registered}, movement says {incoming}"
                )));
            }
            if registered.is_none() && movement.expiry_date.is_some() {
                sqlx::query(
                    "UPDATE batches SET expiry_date = $4 WHERE tenant_id = $1 AND item_id = $2 AND batch_no = $3",
                )
                .bind(tenant_id.as_uuid())
                .bind(movement.item_id.as_uuid())
                .bind(batch_no.as_str())
                .bind(movement.expiry_date)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("batch_update", e))?;
            }
            Ok(movement.expiry_date.or(registered))
        }
        None => {
            sqlx::query(
                r#"
                INSERT INTO batches (tenant_id, item_id, batch_no, expiry_date, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(movement.item_id.as_uuid())
            .bind(batch_no.as_str())
            .bind(movement.expiry_date)
            .bind(created_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("batch_insert", e))?;
            Ok(movement.expiry_date)
        }
    }
}

fn stored_event_from_row(row: &sqlx::postgres::PgRow) -> Result<StoredEvent, StoreError> {
    let storage = |e: sqlx::Error| StoreError::Storage(e.to_string());
    Ok(StoredEvent {
        event_id: row.try_get("event_id").map_err(storage)?,
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id").map_err(storage)?),
        aggregate_id: AggregateId::from_uuid(row.try_get("aggregate_id").map_err(storage)?),
        aggregate_type: row.try_get("aggregate_type").map_err(storage)?,
        sequence_number: row.try_get::<i64, _>("sequence_number").map_err(storage)? as u64,
        event_type: row.try_get("event_type").map_err(storage)?,
        event_version: row.try_get::<i32, _>("event_version").map_err(storage)? as u32,
        occurred_at: row.try_get("occurred_at").map_err(storage)?,
        payload: row.try_get("payload").map_err(storage)?,
    })
}

fn snapshot_from_row(row: &sqlx::postgres::PgRow) -> Result<StockSnapshot, StoreError> {
    let storage = |e: sqlx::Error| StoreError::Storage(e.to_string());
    Ok(StockSnapshot {
        warehouse_id: stockline_core::WarehouseId::from_uuid(
            row.try_get("warehouse_id").map_err(storage)?,
        ),
        qty_on_hand: row.try_get("qty_on_hand").map_err(storage)?,
        qty_reserved: row.try_get("qty_reserved").map_err(storage)?,
        expiry_date: row.try_get("expiry_date").map_err(storage)?,
        updated_at: row.try_get("updated_at").map_err(storage)?,
    })
}

fn ledger_entry_from_row(row: &sqlx::postgres::PgRow) -> Result<LedgerEntry, StoreError> {
    let storage = |e: sqlx::Error| StoreError::Storage(e.to_string());

    let reason: String = row.try_get("reason").map_err(storage)?;
    let reason = parse_reason(&reason)?;

    let batch_no: Option<String> = row.try_get("batch_no").map_err(storage)?;
    let batch_no = batch_no
        .map(stockline_core::BatchNo::new)
        .transpose()
        .map_err(|e| StoreError::Storage(e.to_string()))?;

    let reference: Option<serde_json::Value> = row.try_get("reference").map_err(storage)?;
    let reference: Option<MovementRef> = reference
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| StoreError::Storage(e.to_string()))?;

    Ok(LedgerEntry {
        id: row.try_get("id").map_err(storage)?,
        operation_id: row.try_get("operation_id").map_err(storage)?,
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id").map_err(storage)?),
        warehouse_id: stockline_core::WarehouseId::from_uuid(
            row.try_get("warehouse_id").map_err(storage)?,
        ),
        bin_id: stockline_core::BinId::from_uuid(row.try_get("bin_id").map_err(storage)?),
        item_id: stockline_core::ItemId::from_uuid(row.try_get("item_id").map_err(storage)?),
        batch_no,
        reason,
        qty_change: row.try_get("qty_change").map_err(storage)?,
        qty_after: row.try_get("qty_after").map_err(storage)?,
        expiry_date: row.try_get("expiry_date").map_err(storage)?,
        reference,
        occurred_at: row.try_get("occurred_at").map_err(storage)?,
        created_at: row.try_get("created_at").map_err(storage)?,
    })
}

fn parse_reason(value: &str) -> Result<MovementReason, StoreError> {
    match value {
        "receive" => Ok(MovementReason::Receive),
        "pick" => Ok(MovementReason::Pick),
        "ship" => Ok(MovementReason::Ship),
        "ibt_in" => Ok(MovementReason::IbtIn),
        "ibt_out" => Ok(MovementReason::IbtOut),
        "adjust" => Ok(MovementReason::Adjust),
        "scrap" => Ok(MovementReason::Scrap),
        "transfer" => Ok(MovementReason::Transfer),
        "return" => Ok(MovementReason::Return),
        other => Err(StoreError::Storage(format!(
            "unknown movement reason '{other}'"
        ))),
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") => {
                return StoreError::Concurrency(format!(
                    "{operation}: unique constraint violation ({})",
                    db.message()
                ));
            }
            Some("40001") => {
                return StoreError::Concurrency(format!(
                    "{operation}: serialization failure ({})",
                    db.message()
                ));
            }
            Some("23514") => {
                return StoreError::InvalidMovement(format!(
                    "{operation}: check constraint violation ({})",
                    db.message()
                ));
            }
            _ => {}
        }
    }
    StoreError::Storage(format!("{operation}: {err}"))
}
