//! # Cell Repository
//!
//! Storage cells, their contents, and the transactional commit.
//!
//! ## Commit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   ├── for each adjustment:                                              │
//! │   │     load cell + contents  ──►  StorageCell::apply(item, delta)     │
//! │   │     write new count (delete row at zero)                            │
//! │   ├── order lines: add picks, mark fulfilled                           │
//! │   │   or stock request: mark applied                                   │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any error drops the transaction, which rolls everything back.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use beacon_core::session::{CommitPlan, Completion};
use beacon_core::{Adjustment, CellKind, StorageCell, Zone};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{orders, stock};

const CELL_COLUMNS: &str = r#"
    SELECT c.cell_id, c.kind, c.capacity, cc.item_code, cc.quantity
    FROM storage_cells c
    LEFT JOIN cell_contents cc ON cc.cell_id = c.cell_id
"#;

/// Repository for storage cells.
#[derive(Debug, Clone)]
pub struct CellRepository {
    pool: SqlitePool,
}

impl CellRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CellRepository { pool }
    }

    /// Inserts a cell together with its initial contents.
    pub async fn insert(&self, cell: &StorageCell) -> DbResult<()> {
        debug!(cell_id = %cell.cell_id, kind = %cell.kind, "Inserting cell");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO storage_cells (cell_id, rack, side, slot, kind, capacity)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&cell.cell_id)
        .bind(&cell.zone.rack)
        .bind(&cell.zone.side)
        .bind(&cell.slot)
        .bind(cell.kind.as_str())
        .bind(cell.capacity)
        .execute(&mut *tx)
        .await?;

        for (item_code, quantity) in &cell.contents {
            write_quantity(&mut tx, &cell.cell_id, item_code, *quantity).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Cells holding at least one unit of `item_code`, with full contents.
    pub async fn find_containing(&self, item_code: &str) -> DbResult<Vec<StorageCell>> {
        let sql = format!(
            "{} WHERE c.cell_id IN (SELECT cell_id FROM cell_contents WHERE item_code = ?1) ORDER BY c.cell_id",
            CELL_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(item_code).fetch_all(&self.pool).await?;
        rows_to_cells(rows)
    }

    /// Gets a cell by id.
    pub async fn get(&self, cell_id: &str) -> DbResult<Option<StorageCell>> {
        let mut conn = self.pool.acquire().await?;
        load_cell(&mut conn, cell_id).await
    }

    /// All cells, ordered by id.
    pub async fn list(&self) -> DbResult<Vec<StorageCell>> {
        let sql = format!("{} ORDER BY c.cell_id", CELL_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows_to_cells(rows)
    }

    /// Lowest bin id in `zone`.
    pub async fn first_bin_in_zone(&self, zone: &Zone) -> DbResult<Option<String>> {
        let bin: Option<String> = sqlx::query_scalar(
            r#"
            SELECT cell_id FROM storage_cells
            WHERE rack = ?1 AND side = ?2 AND kind = 'bin'
            ORDER BY cell_id
            LIMIT 1
            "#,
        )
        .bind(&zone.rack)
        .bind(&zone.side)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bin)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM storage_cells")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Applies cell adjustments alone, all or nothing.
    pub async fn adjust(&self, adjustments: &[Adjustment]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        for adjustment in adjustments {
            apply_in(&mut tx, adjustment).await?;
        }
        tx.commit().await?;

        debug!(adjustments = adjustments.len(), "Adjustments applied");
        Ok(())
    }

    /// Applies a commit plan in one transaction.
    ///
    /// Returns [`DbError::Rejected`] when an adjustment would break a cell's
    /// capacity rules; nothing is written in that case.
    pub async fn commit(&self, plan: &CommitPlan) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        for adjustment in &plan.adjustments {
            apply_in(&mut tx, adjustment).await?;
        }

        match &plan.completion {
            Completion::OrderLines {
                order_no,
                picks,
                fulfilled_item_codes,
            } => {
                orders::record_picks_in(&mut tx, order_no, picks).await?;
                orders::mark_fulfilled_in(&mut tx, order_no, fulfilled_item_codes).await?;
            }
            Completion::StockRequest { request_no } => {
                stock::mark_applied_in(&mut tx, request_no).await?;
            }
        }

        tx.commit().await?;

        info!(
            zone = %plan.zone,
            adjustments = plan.adjustments.len(),
            "Commit applied"
        );
        Ok(())
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

async fn load_cell(conn: &mut SqliteConnection, cell_id: &str) -> DbResult<Option<StorageCell>> {
    let sql = format!("{} WHERE c.cell_id = ?1", CELL_COLUMNS);
    let rows = sqlx::query(&sql).bind(cell_id).fetch_all(&mut *conn).await?;
    Ok(rows_to_cells(rows)?.into_iter().next())
}

async fn apply_in(conn: &mut SqliteConnection, adjustment: &Adjustment) -> DbResult<()> {
    let mut cell = load_cell(conn, &adjustment.cell_id)
        .await?
        .ok_or_else(|| DbError::Rejected(beacon_core::CoreError::CellNotFound(adjustment.cell_id.clone())))?;

    cell.apply(&adjustment.item_code, adjustment.delta)
        .map_err(DbError::Rejected)?;

    write_quantity(
        conn,
        &cell.cell_id,
        &adjustment.item_code,
        cell.quantity_of(&adjustment.item_code),
    )
    .await
}

async fn write_quantity(
    conn: &mut SqliteConnection,
    cell_id: &str,
    item_code: &str,
    quantity: i64,
) -> DbResult<()> {
    if quantity == 0 {
        sqlx::query("DELETE FROM cell_contents WHERE cell_id = ?1 AND item_code = ?2")
            .bind(cell_id)
            .bind(item_code)
            .execute(&mut *conn)
            .await?;
    } else {
        sqlx::query(
            r#"
            INSERT INTO cell_contents (cell_id, item_code, quantity)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (cell_id, item_code) DO UPDATE SET quantity = excluded.quantity
            "#,
        )
        .bind(cell_id)
        .bind(item_code)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Folds joined cell/content rows (ordered by cell id) into cells.
fn rows_to_cells(rows: Vec<SqliteRow>) -> DbResult<Vec<StorageCell>> {
    let mut cells: BTreeMap<String, StorageCell> = BTreeMap::new();

    for row in rows {
        let cell_id: String = row.try_get("cell_id")?;

        if !cells.contains_key(&cell_id) {
            let kind: String = row.try_get("kind")?;
            let kind: CellKind = kind
                .parse()
                .map_err(|e: beacon_core::ValidationError| DbError::Internal(e.to_string()))?;
            let capacity: i64 = row.try_get("capacity")?;
            let cell = StorageCell::new(cell_id.clone(), kind, capacity)
                .map_err(|e| DbError::Internal(e.to_string()))?;
            cells.insert(cell_id.clone(), cell);
        }

        let item_code: Option<String> = row.try_get("item_code")?;
        let quantity: Option<i64> = row.try_get("quantity")?;
        if let (Some(item_code), Some(quantity), Some(cell)) = (item_code, quantity, cells.get_mut(&cell_id)) {
            cell.contents.insert(item_code, quantity);
        }
    }

    Ok(cells.into_values().collect())
}

// =============================================================================
// Tests
// =============================================================================
