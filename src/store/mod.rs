//! Cart storage.
//!
//! Every backend implements [`CartRepositoryAsync`]; [`SyncCartRepository`]
//! exposes any of them through the blocking [`CartRepository`] trait.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Cart, Item, QuantityOverflow};

pub mod memory;
pub mod postgres;
pub mod redis;
pub mod registry;
pub mod sync;

pub use memory::InMemoryCartRepository;
pub use postgres::PgCartRepository;
pub use self::redis::RedisCartRepository;
pub use registry::Backend;
pub use sync::{CartRepository, SyncCartRepository};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid stored data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    QuantityOverflow(#[from] QuantityOverflow),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Asynchronous cart storage contract.
///
/// Missing carts and items are reported through `bool` and `Option`
/// results; `Err` is reserved for backend failures.
#[async_trait]
pub trait CartRepositoryAsync: Send + Sync {
    /// Returns the customer's cart, creating an empty one if needed.
    async fn get_or_create_cart(&self, customer_id: &str) -> StoreResult<Cart>;

    /// Removes the cart and all of its items.
    ///
    /// Returns `false` if there was no cart to delete.
    async fn delete_cart(&self, customer_id: &str) -> StoreResult<bool>;

    /// Adds every item of the source cart into the target cart using the
    /// [`add_item`](Self::add_item) rule, then removes the source cart.
    ///
    /// Returns `false` without touching the target if the source cart
    /// does not exist. Fails with [`StoreError::QuantityOverflow`], leaving
    /// both carts as they were, if any merged quantity would overflow.
    async fn merge_carts(&self, target_id: &str, source_id: &str) -> StoreResult<bool>;

    async fn get_item(&self, cart_id: &str, item_id: &str) -> StoreResult<Option<Item>>;

    /// Returns the cart's items, empty if the cart does not exist.
    async fn get_items(&self, cart_id: &str) -> StoreResult<Vec<Item>>;

    /// Inserts the item, or increments the quantity of an item with the
    /// same id. Other fields of an existing item are kept as stored.
    /// A quantity that would pass `i32::MAX` is rejected without writing.
    async fn add_item(&self, cart_id: &str, item: Item) -> StoreResult<Item>;

    /// Inserts the item, or sets the quantity of an item with the same id.
    /// Other fields of an existing item are kept as stored.
    async fn update_item(&self, cart_id: &str, item: Item) -> StoreResult<Item>;

    async fn delete_item(&self, cart_id: &str, item_id: &str) -> StoreResult<()>;
}
