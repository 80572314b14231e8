use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};

use crate::{
    db::DbPool,
    models::{Cart, Item, QuantityOverflow},
};

use super::{CartRepositoryAsync, StoreError, StoreResult};

// SQLSTATE raised when `INTEGER` arithmetic leaves the column's range.
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

// Upserting instead of `DO NOTHING` takes the row lock, so the cart cannot
// be deleted underneath the rest of the transaction.
const ENSURE_CART: &str = r#"
    INSERT INTO carts (customer_id)
    VALUES ($1)
    ON CONFLICT (customer_id) DO UPDATE SET customer_id = EXCLUDED.customer_id
"#;

const ADD_ITEM: &str = r#"
    INSERT INTO cart_items (cart_id, item_id, quantity, unit_price)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (cart_id, item_id)
    DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
    RETURNING item_id, quantity, unit_price
"#;

const UPDATE_ITEM: &str = r#"
    INSERT INTO cart_items (cart_id, item_id, quantity, unit_price)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (cart_id, item_id)
    DO UPDATE SET quantity = EXCLUDED.quantity
    RETURNING item_id, quantity, unit_price
"#;

const MERGE_ITEMS: &str = r#"
    INSERT INTO cart_items (cart_id, item_id, quantity, unit_price)
    SELECT $1, item_id, quantity, unit_price
    FROM cart_items
    WHERE cart_id = $2
    ON CONFLICT (cart_id, item_id)
    DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
"#;

// First source item whose merged quantity would not fit the column.
const MERGE_OVERFLOW: &str = r#"
    SELECT s.item_id
    FROM cart_items s
    JOIN cart_items t ON t.cart_id = $1 AND t.item_id = s.item_id
    WHERE s.cart_id = $2 AND t.quantity::BIGINT + s.quantity > 2147483647
    ORDER BY s.item_id
    LIMIT 1
"#;

#[derive(FromRow)]
struct ItemRow {
    item_id: String,
    quantity: i32,
    unit_price: Decimal,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item::new(row.item_id, row.quantity, row.unit_price)
    }
}

async fn ensure_cart(conn: &mut PgConnection, customer_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(ENSURE_CART)
        .bind(customer_id)
        .execute(conn)
        .await?;
    Ok(())
}

async fn lock_cart(conn: &mut PgConnection, customer_id: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT customer_id FROM carts WHERE customer_id = $1 FOR UPDATE")
            .bind(customer_id)
            .fetch_optional(conn)
            .await?;
    Ok(row.is_some())
}

fn item_write_error(err: sqlx::Error, item_id: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE) {
            return QuantityOverflow::new(item_id).into();
        }
    }
    err.into()
}

/// Postgres-backed cart store.
#[derive(Debug, Clone)]
pub struct PgCartRepository {
    pool: DbPool,
}

impl PgCartRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn upsert_item(&self, sql: &str, cart_id: &str, item: Item) -> StoreResult<Item> {
        let mut tx = self.pool.begin().await?;
        ensure_cart(&mut tx, cart_id).await?;

        let row = sqlx::query_as::<_, ItemRow>(sql)
            .bind(cart_id)
            .bind(&item.item_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| item_write_error(e, &item.item_id))?;

        tx.commit().await?;
        Ok(row.into())
    }
}

#[async_trait]
impl CartRepositoryAsync for PgCartRepository {
    async fn get_or_create_cart(&self, customer_id: &str) -> StoreResult<Cart> {
        sqlx::query("INSERT INTO carts (customer_id) VALUES ($1) ON CONFLICT (customer_id) DO NOTHING")
            .bind(customer_id)
            .execute(&self.pool)
            .await?;

        Ok(Cart {
            customer_id: customer_id.to_string(),
            items: self.get_items(customer_id).await?,
        })
    }

    async fn delete_cart(&self, customer_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM carts WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        tracing::info!(customer_id, removed, "cart deleted");
        Ok(removed)
    }

    async fn merge_carts(&self, target_id: &str, source_id: &str) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        if target_id == source_id {
            let exists = lock_cart(&mut tx, source_id).await?;
            tx.commit().await?;
            return Ok(exists);
        }

        // Lock both carts in id order so opposite merges cannot deadlock.
        let mut source_exists = false;
        let mut ids = [target_id, source_id];
        ids.sort_unstable();
        for id in ids {
            if id == target_id {
                ensure_cart(&mut tx, id).await?;
            } else {
                source_exists = lock_cart(&mut tx, id).await?;
            }
        }

        if !source_exists {
            tx.rollback().await?;
            tracing::debug!(target_id, source_id, "merge skipped, no source cart");
            return Ok(false);
        }

        let overflow: Option<(String,)> = sqlx::query_as(MERGE_OVERFLOW)
            .bind(target_id)
            .bind(source_id)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some((item_id,)) = overflow {
            tx.rollback().await?;
            return Err(QuantityOverflow::new(item_id).into());
        }

        let merged = sqlx::query(MERGE_ITEMS)
            .bind(target_id)
            .bind(source_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM carts WHERE customer_id = $1")
            .bind(source_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(target_id, source_id, merged, "carts merged");
        Ok(true)
    }

    async fn get_item(&self, cart_id: &str, item_id: &str) -> StoreResult<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(
            "SELECT item_id, quantity, unit_price FROM cart_items WHERE cart_id = $1 AND item_id = $2",
        )
        .bind(cart_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Item::from))
    }

    async fn get_items(&self, cart_id: &str) -> StoreResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT item_id, quantity, unit_price FROM cart_items WHERE cart_id = $1 ORDER BY item_id",
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn add_item(&self, cart_id: &str, item: Item) -> StoreResult<Item> {
        let stored = self.upsert_item(ADD_ITEM, cart_id, item).await?;
        tracing::debug!(cart_id, item_id = %stored.item_id, quantity = stored.quantity, "item added");
        Ok(stored)
    }

    async fn update_item(&self, cart_id: &str, item: Item) -> StoreResult<Item> {
        let stored = self.upsert_item(UPDATE_ITEM, cart_id, item).await?;
        tracing::debug!(cart_id, item_id = %stored.item_id, quantity = stored.quantity, "item updated");
        Ok(stored)
    }

    async fn delete_item(&self, cart_id: &str, item_id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND item_id = $2")
            .bind(cart_id)
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!(cart_id, item_id, removed = result.rows_affected() > 0, "item deleted");
        Ok(())
    }
}
