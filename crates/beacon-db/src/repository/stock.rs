//! # Stock Request Repository
//!
//! Inbound stock waiting to be put away.

use beacon_core::StockRequest;
use chrono::Utc;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    pub async fn insert(&self, request: &StockRequest) -> DbResult<()> {
        debug!(request_no = %request.request_no, item_code = %request.item_code, "Inserting stock request");
        request.validate().map_err(|e| DbError::Rejected(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO stock_requests (request_no, item_code, quantity, applied)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&request.request_no)
        .bind(&request.item_code)
        .bind(request.quantity)
        .bind(request.applied)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Requests not yet applied, oldest first.
    pub async fn list_pending(&self) -> DbResult<Vec<StockRequest>> {
        let rows = sqlx::query(
            r#"
            SELECT request_no, item_code, quantity, applied
            FROM stock_requests
            WHERE applied = 0
            ORDER BY created_at, rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> DbResult<StockRequest> {
                Ok(StockRequest {
                    request_no: row.try_get("request_no")?,
                    item_code: row.try_get("item_code")?,
                    quantity: row.try_get("quantity")?,
                    applied: row.try_get("applied")?,
                })
            })
            .collect()
    }

    pub async fn mark_applied(&self, request_no: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        mark_applied_in(&mut conn, request_no).await
    }
}

/// Marks a pending request applied. A request that is already applied
/// (another station got there first) is reported as not found.
pub(crate) async fn mark_applied_in(conn: &mut SqliteConnection, request_no: &str) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE stock_requests SET applied = 1, applied_at = ?1 WHERE request_no = ?2 AND applied = 0",
    )
    .bind(Utc::now())
    .bind(request_no)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Pending stock request", request_no));
    }
    Ok(())
}
