//! # Order Repository
//!
//! Retrieval orders, their lines, and designated collection bins.
//!
//! Lines are returned in intake order so the oldest order is offered first.

use beacon_core::{Order, OrderLine, PickItem};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts an order. Rejects a malformed order or an order number that
    /// already exists.
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(order_no = %order.order_no, lines = order.lines.len(), "Inserting order");
        order.validate().map_err(|e| DbError::Rejected(e.into()))?;

        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_lines WHERE order_no = ?1")
            .bind(&order.order_no)
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Err(DbError::duplicate("order_no", &order.order_no));
        }

        for (idx, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (
                    order_no, line_no, item_code, required_quantity, picked_quantity, fulfilled
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&order.order_no)
            .bind(idx as i64 + 1)
            .bind(&line.item_code)
            .bind(line.required_quantity)
            .bind(line.picked_quantity)
            .bind(line.fulfilled)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets an order with all of its lines.
    pub async fn get(&self, order_no: &str) -> DbResult<Option<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT order_no, item_code, required_quantity, picked_quantity, fulfilled
            FROM order_lines
            WHERE order_no = ?1
            ORDER BY line_no
            "#,
        )
        .bind(order_no)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows_to_orders(rows)?.into_iter().next())
    }

    /// Orders with at least one open line, oldest first.
    pub async fn list_unfulfilled(&self) -> DbResult<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT order_no, item_code, required_quantity, picked_quantity, fulfilled
            FROM order_lines
            WHERE order_no IN (SELECT order_no FROM order_lines WHERE fulfilled = 0)
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows_to_orders(rows)
    }

    /// Every order, fulfilled or not, in intake order.
    pub async fn list_all(&self) -> DbResult<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT order_no, item_code, required_quantity, picked_quantity, fulfilled
            FROM order_lines
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows_to_orders(rows)
    }

    /// Removes an order's lines and its bin assignment.
    pub async fn delete(&self, order_no: &str) -> DbResult<()> {
        debug!(order_no, "Deleting order");

        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM order_lines WHERE order_no = ?1")
            .bind(order_no)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            return Err(DbError::not_found("Order", order_no));
        }

        sqlx::query("DELETE FROM order_bins WHERE order_no = ?1")
            .bind(order_no)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Marks every line of `order_no` with one of `item_codes` fulfilled.
    pub async fn mark_lines_fulfilled(&self, order_no: &str, item_codes: &[String]) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        mark_fulfilled_in(&mut conn, order_no, item_codes).await
    }

    /// Designated collection bin for an order.
    pub async fn bin_for(&self, order_no: &str) -> DbResult<Option<String>> {
        let bin: Option<String> = sqlx::query_scalar("SELECT bin_id FROM order_bins WHERE order_no = ?1")
            .bind(order_no)
            .fetch_optional(&self.pool)
            .await?;
        Ok(bin)
    }

    /// Assigns (or reassigns) the collection bin for an order.
    pub async fn assign_bin(&self, order_no: &str, bin_id: &str) -> DbResult<()> {
        debug!(order_no, bin_id, "Assigning bin");

        sqlx::query(
            r#"
            INSERT INTO order_bins (order_no, bin_id) VALUES (?1, ?2)
            ON CONFLICT (order_no) DO UPDATE SET bin_id = excluded.bin_id
            "#,
        )
        .bind(order_no)
        .bind(bin_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

/// Adds picked units to open lines, filling them in line order.
///
/// Fails with [`DbError::Conflict`] when a pick exceeds the units still
/// outstanding; the caller's transaction must then be dropped.
pub(crate) async fn record_picks_in(
    conn: &mut SqliteConnection,
    order_no: &str,
    picks: &[PickItem],
) -> DbResult<()> {
    let now = Utc::now();

    for pick in picks {
        let lines: Vec<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT line_no, required_quantity, picked_quantity
            FROM order_lines
            WHERE order_no = ?1 AND item_code = ?2 AND fulfilled = 0
            ORDER BY line_no
            "#,
        )
        .bind(order_no)
        .bind(&pick.item_code)
        .fetch_all(&mut *conn)
        .await?;

        if lines.is_empty() {
            return Err(DbError::not_found("Open order line", format!("{}/{}", order_no, pick.item_code)));
        }

        let mut left = pick.quantity;
        for (line_no, required, picked) in lines {
            if left <= 0 {
                break;
            }
            let take = left.min((required - picked).max(0));
            left -= take;
            let picked = picked + take;

            sqlx::query(
                r#"
                UPDATE order_lines
                SET picked_quantity = ?1,
                    fulfilled = ?2,
                    fulfilled_at = COALESCE(?3, fulfilled_at)
                WHERE order_no = ?4 AND line_no = ?5
                "#,
            )
            .bind(picked)
            .bind(picked >= required)
            .bind((picked >= required).then_some(now))
            .bind(order_no)
            .bind(line_no)
            .execute(&mut *conn)
            .await?;
        }

        if left > 0 {
            return Err(DbError::Conflict(format!(
                "order {} needs {} fewer of {} than the round takes",
                order_no, left, pick.item_code
            )));
        }
    }

    Ok(())
}

pub(crate) async fn mark_fulfilled_in(
    conn: &mut SqliteConnection,
    order_no: &str,
    item_codes: &[String],
) -> DbResult<()> {
    let now = Utc::now();

    for item_code in item_codes {
        sqlx::query(
            r#"
            UPDATE order_lines
            SET fulfilled = 1, fulfilled_at = COALESCE(fulfilled_at, ?1)
            WHERE order_no = ?2 AND item_code = ?3
            "#,
        )
        .bind(now)
        .bind(order_no)
        .bind(item_code)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Groups line rows into orders, keeping first-seen order.
fn rows_to_orders(rows: Vec<SqliteRow>) -> DbResult<Vec<Order>> {
    let mut orders: Vec<Order> = Vec::new();

    for row in rows {
        let order_no: String = row.try_get("order_no")?;
        let line = OrderLine {
            item_code: row.try_get("item_code")?,
            required_quantity: row.try_get("required_quantity")?,
            picked_quantity: row.try_get("picked_quantity")?,
            fulfilled: row.try_get("fulfilled")?,
        };

        match orders.iter_mut().find(|o| o.order_no == order_no) {
            Some(order) => order.lines.push(line),
            None => orders.push(Order::new(order_no, vec![line])),
        }
    }

    Ok(orders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_order_rejected() {
        let db = setup().await;
        let order = Order::new("SO-1", vec![OrderLine::new("A", 1)]);
        db.orders().insert(&order).await.unwrap();

        let err = db.orders().insert(&order).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_list_unfulfilled_in_intake_order() {
        let db = setup().await;
        let orders = db.orders();
        orders.insert(&Order::new("SO-9", vec![OrderLine::new("A", 1)])).await.unwrap();
        orders.insert(&Order::new("SO-1", vec![OrderLine::new("B", 1), OrderLine::new("C", 2)])).await.unwrap();

        let open = orders.list_unfulfilled().await.unwrap();
        assert_eq!(open.len(), 2);
        assert_eq!(open[0].order_no, "SO-9");
        assert_eq!(open[1].lines.len(), 2);

        orders.mark_lines_fulfilled("SO-9", &["A".to_string()]).await.unwrap();
        let open = orders.list_unfulfilled().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].order_no, "SO-1");
    }

    #[tokio::test]
    async fn test_record_picks_spreads_over_lines() {
        let db = setup().await;
        db.orders()
            .insert(&Order::new("SO-2", vec![OrderLine::new("A", 2), OrderLine::new("A", 3)]))
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        record_picks_in(&mut conn, "SO-2", &[PickItem::new("A", 4)]).await.unwrap();
        drop(conn);

        let order = db.orders().get("SO-2").await.unwrap().unwrap();
        assert!(order.lines[0].fulfilled);
        assert_eq!(order.lines[1].picked_quantity, 2);
        assert!(!order.lines[1].fulfilled);
    }

    #[tokio::test]
    async fn test_list_all_and_delete() {
        let db = setup().await;
        let orders = db.orders();
        orders.insert(&Order::new("SO-1", vec![OrderLine::new("A", 1)])).await.unwrap();
        orders.insert(&Order::new("SO-2", vec![OrderLine::new("B", 2)])).await.unwrap();
        orders.mark_lines_fulfilled("SO-1", &["A".to_string()]).await.unwrap();

        let all = orders.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].order_no, "SO-1");
        assert!(all[0].is_complete());

        orders.delete("SO-2").await.unwrap();
        assert!(orders.get("SO-2").await.unwrap().is_none());
        assert_eq!(orders.list_all().await.unwrap().len(), 1);

        let err = orders.delete("SO-2").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        // The number is free again.
        orders.insert(&Order::new("SO-2", vec![OrderLine::new("C", 1)])).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_clears_bin() {
        let db = setup().await;
        db.cells()
            .insert(&beacon_core::StorageCell::new("R1-S1-BIN1", beacon_core::CellKind::Bin, 50).unwrap())
            .await
            .unwrap();
        db.orders().insert(&Order::new("SO-3", vec![OrderLine::new("A", 1)])).await.unwrap();
        db.orders().assign_bin("SO-3", "R1-S1-BIN1").await.unwrap();

        db.orders().delete("SO-3").await.unwrap();
        assert_eq!(db.orders().bin_for("SO-3").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_order_rejected() {
        let db = setup().await;
        let err = db
            .orders()
            .insert(&Order::new("SO-4", vec![OrderLine::new("A", -1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rejected(beacon_core::CoreError::Validation(_))));
        assert!(db.orders().get("SO-4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bins() {
        let db = setup().await;
        db.cells()
            .insert(&beacon_core::StorageCell::new("R1-S1-BIN1", beacon_core::CellKind::Bin, 50).unwrap())
            .await
            .unwrap();

        assert_eq!(db.orders().bin_for("SO-1").await.unwrap(), None);
        db.orders().assign_bin("SO-1", "R1-S1-BIN1").await.unwrap();
        assert_eq!(db.orders().bin_for("SO-1").await.unwrap().as_deref(), Some("R1-S1-BIN1"));
    }
}
