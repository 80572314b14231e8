//! Redis-backed cart store.
//!
//! Each cart is one hash under `carts:{customer_id}`:
//!
//! * `@` marks that the cart exists, even when it holds no items,
//! * `qty:{item_id}` holds the item quantity,
//! * `item:{item_id}` holds the remaining item fields as JSON.
//!
//! Adds and merges run as Lua scripts so the quantity bound is checked and
//! the write applied in one step.

use std::collections::BTreeMap;
use std::collections::HashMap;

use async_trait::async_trait;
use redis::{AsyncCommands, Script, aio::ConnectionManager};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Cart, Item, QuantityOverflow};

use super::{CartRepositoryAsync, StoreError, StoreResult};

const KEY_PREFIX: &str = "carts:";
const MARKER: &str = "@";
const QTY_PREFIX: &str = "qty:";
const ITEM_PREFIX: &str = "item:";

// KEYS[1] cart, ARGV: qty field, details field, details, quantity, max.
// Returns false without writing when the new quantity would pass the max.
const ADD_SCRIPT: &str = r#"
local quantity = tonumber(redis.call('HGET', KEYS[1], ARGV[1]) or '0') + tonumber(ARGV[4])
if quantity > tonumber(ARGV[5]) then
  return false
end
redis.call('HSETNX', KEYS[1], '@', '1')
redis.call('HSETNX', KEYS[1], ARGV[2], ARGV[3])
redis.call('HSET', KEYS[1], ARGV[1], quantity)
return {quantity, redis.call('HGET', KEYS[1], ARGV[2])}
"#;

// KEYS[1] target, KEYS[2] source, ARGV[1] max quantity.
// Returns {0, ''} when the source is missing, {1, ''} once merged and
// {-1, item_id} when that item would overflow; nothing is written then.
const MERGE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[2]) == 0 then
  return {0, ''}
end
if KEYS[1] == KEYS[2] then
  return {1, ''}
end
local fields = redis.call('HGETALL', KEYS[2])
local max = tonumber(ARGV[1])
for i = 1, #fields, 2 do
  local field = fields[i]
  if string.sub(field, 1, 4) == 'qty:' then
    local current = tonumber(redis.call('HGET', KEYS[1], field) or '0')
    if current + tonumber(fields[i + 1]) > max then
      return {-1, string.sub(field, 5)}
    end
  end
end
redis.call('HSETNX', KEYS[1], '@', '1')
for i = 1, #fields, 2 do
  local field = fields[i]
  local value = fields[i + 1]
  if string.sub(field, 1, 4) == 'qty:' then
    redis.call('HINCRBY', KEYS[1], field, value)
  elseif string.sub(field, 1, 5) == 'item:' then
    redis.call('HSETNX', KEYS[1], field, value)
  end
end
redis.call('DEL', KEYS[2])
return {1, ''}
"#;

/// Item fields stored next to the quantity.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemDetails {
    #[serde(with = "rust_decimal::serde::str")]
    unit_price: Decimal,
}

impl ItemDetails {
    fn of(item: &Item) -> Self {
        Self {
            unit_price: item.unit_price,
        }
    }

    fn into_item(self, item_id: &str, quantity: i32) -> Item {
        Item::new(item_id, quantity, self.unit_price)
    }
}

fn cart_key(customer_id: &str) -> String {
    format!("{KEY_PREFIX}{customer_id}")
}

fn qty_field(item_id: &str) -> String {
    format!("{QTY_PREFIX}{item_id}")
}

fn item_field(item_id: &str) -> String {
    format!("{ITEM_PREFIX}{item_id}")
}

fn decode_details(raw: Option<&str>) -> StoreResult<ItemDetails> {
    match raw {
        Some(raw) => Ok(serde_json::from_str(raw)?),
        None => Ok(ItemDetails {
            unit_price: Decimal::ZERO,
        }),
    }
}

/// Rebuilds the items of a cart hash, sorted by item id.
fn decode_items(fields: HashMap<String, String>) -> StoreResult<Vec<Item>> {
    let mut lines: BTreeMap<String, (Option<String>, Option<String>)> = BTreeMap::new();
    for (field, value) in fields {
        if let Some(item_id) = field.strip_prefix(QTY_PREFIX) {
            lines.entry(item_id.to_string()).or_default().0 = Some(value);
        } else if let Some(item_id) = field.strip_prefix(ITEM_PREFIX) {
            lines.entry(item_id.to_string()).or_default().1 = Some(value);
        }
    }

    lines
        .into_iter()
        .map(|(item_id, (quantity, details))| {
            let quantity = quantity
                .ok_or_else(|| StoreError::InvalidData(format!("item {item_id} has no quantity")))?
                .parse::<i32>()
                .map_err(|e| StoreError::InvalidData(format!("item {item_id}: {e}")))?;
            Ok(decode_details(details.as_deref())?.into_item(&item_id, quantity))
        })
        .collect()
}

#[derive(Clone)]
pub struct RedisCartRepository {
    conn: ConnectionManager,
    add_script: Script,
    merge_script: Script,
}

impl RedisCartRepository {
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("connected to redis");
        Ok(Self::new(conn))
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            add_script: Script::new(ADD_SCRIPT),
            merge_script: Script::new(MERGE_SCRIPT),
        }
    }
}

#[async_trait]
impl CartRepositoryAsync for RedisCartRepository {
    async fn get_or_create_cart(&self, customer_id: &str) -> StoreResult<Cart> {
        let key = cart_key(customer_id);
        let mut conn = self.conn.clone();

        let (fields,): (HashMap<String, String>,) = redis::pipe()
            .atomic()
            .hset_nx(&key, MARKER, 1)
            .ignore()
            .hgetall(&key)
            .query_async(&mut conn)
            .await?;

        Ok(Cart {
            customer_id: customer_id.to_string(),
            items: decode_items(fields)?,
        })
    }

    async fn delete_cart(&self, customer_id: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(cart_key(customer_id)).await?;
        tracing::info!(customer_id, removed = removed > 0, "cart deleted");
        Ok(removed > 0)
    }

    async fn merge_carts(&self, target_id: &str, source_id: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let (merged, item_id): (i64, String) = self
            .merge_script
            .key(cart_key(target_id))
            .key(cart_key(source_id))
            .arg(i32::MAX)
            .invoke_async(&mut conn)
            .await?;

        match merged {
            1 => {
                tracing::info!(target_id, source_id, "carts merged");
                Ok(true)
            }
            0 => {
                tracing::debug!(target_id, source_id, "merge skipped, no source cart");
                Ok(false)
            }
            _ => Err(QuantityOverflow::new(item_id).into()),
        }
    }

    async fn get_item(&self, cart_id: &str, item_id: &str) -> StoreResult<Option<Item>> {
        let mut conn = self.conn.clone();
        let (quantity, details): (Option<i32>, Option<String>) = conn
            .hget(cart_key(cart_id), vec![qty_field(item_id), item_field(item_id)])
            .await?;

        match quantity {
            Some(quantity) => {
                Ok(Some(decode_details(details.as_deref())?.into_item(item_id, quantity)))
            }
            None => Ok(None),
        }
    }

    async fn get_items(&self, cart_id: &str) -> StoreResult<Vec<Item>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(cart_key(cart_id)).await?;
        decode_items(fields)
    }

    async fn add_item(&self, cart_id: &str, item: Item) -> StoreResult<Item> {
        let details = serde_json::to_string(&ItemDetails::of(&item))?;
        let mut conn = self.conn.clone();

        let stored: Option<(i32, String)> = self
            .add_script
            .key(cart_key(cart_id))
            .arg(qty_field(&item.item_id))
            .arg(item_field(&item.item_id))
            .arg(details)
            .arg(item.quantity)
            .arg(i32::MAX)
            .invoke_async(&mut conn)
            .await?;
        let Some((quantity, stored)) = stored else {
            return Err(QuantityOverflow::new(item.item_id).into());
        };

        tracing::debug!(cart_id, item_id = %item.item_id, quantity, "item added");
        Ok(decode_details(Some(&stored))?.into_item(&item.item_id, quantity))
    }

    async fn update_item(&self, cart_id: &str, item: Item) -> StoreResult<Item> {
        let key = cart_key(cart_id);
        let details_field = item_field(&item.item_id);
        let details = serde_json::to_string(&ItemDetails::of(&item))?;
        let mut conn = self.conn.clone();

        let (stored,): (String,) = redis::pipe()
            .atomic()
            .hset_nx(&key, MARKER, 1)
            .ignore()
            .hset_nx(&key, &details_field, details)
            .ignore()
            .hset(&key, qty_field(&item.item_id), item.quantity)
            .ignore()
            .hget(&key, &details_field)
            .query_async(&mut conn)
            .await?;

        tracing::debug!(cart_id, item_id = %item.item_id, quantity = item.quantity, "item updated");
        Ok(decode_details(Some(&stored))?.into_item(&item.item_id, item.quantity))
    }

    async fn delete_item(&self, cart_id: &str, item_id: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .hdel(cart_key(cart_id), vec![qty_field(item_id), item_field(item_id)])
            .await?;
        tracing::debug!(cart_id, item_id, removed = removed > 0, "item deleted");
        Ok(())
    }
}
