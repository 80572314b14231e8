//! Blocking access to an asynchronous cart store.

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::models::{Cart, Item};

use super::{CartRepositoryAsync, StoreResult};

/// Synchronous cart storage contract, mirroring [`CartRepositoryAsync`].
pub trait CartRepository {
    fn get_or_create_cart(&self, customer_id: &str) -> StoreResult<Cart>;
    fn delete_cart(&self, customer_id: &str) -> StoreResult<bool>;
    fn merge_carts(&self, target_id: &str, source_id: &str) -> StoreResult<bool>;
    fn get_item(&self, cart_id: &str, item_id: &str) -> StoreResult<Option<Item>>;
    fn get_items(&self, cart_id: &str) -> StoreResult<Vec<Item>>;
    fn add_item(&self, cart_id: &str, item: Item) -> StoreResult<Item>;
    fn update_item(&self, cart_id: &str, item: Item) -> StoreResult<Item>;
    fn delete_item(&self, cart_id: &str, item_id: &str) -> StoreResult<()>;
}

/// Runs each call of the wrapped store to completion on `handle`.
///
/// Errors are returned exactly as the store produced them and no timeout is
/// added. Must be used from a thread outside the runtime: `Handle::block_on`
/// panics when called from an async context.
#[derive(Clone)]
pub struct SyncCartRepository {
    inner: Arc<dyn CartRepositoryAsync>,
    handle: Handle,
}

impl SyncCartRepository {
    pub fn new(inner: Arc<dyn CartRepositoryAsync>, handle: Handle) -> Self {
        Self { inner, handle }
    }
}

impl CartRepository for SyncCartRepository {
    fn get_or_create_cart(&self, customer_id: &str) -> StoreResult<Cart> {
        self.handle.block_on(self.inner.get_or_create_cart(customer_id))
    }

    fn delete_cart(&self, customer_id: &str) -> StoreResult<bool> {
        self.handle.block_on(self.inner.delete_cart(customer_id))
    }

    fn merge_carts(&self, target_id: &str, source_id: &str) -> StoreResult<bool> {
        self.handle
            .block_on(self.inner.merge_carts(target_id, source_id))
    }

    fn get_item(&self, cart_id: &str, item_id: &str) -> StoreResult<Option<Item>> {
        self.handle.block_on(self.inner.get_item(cart_id, item_id))
    }

    fn get_items(&self, cart_id: &str) -> StoreResult<Vec<Item>> {
        self.handle.block_on(self.inner.get_items(cart_id))
    }

    fn add_item(&self, cart_id: &str, item: Item) -> StoreResult<Item> {
        self.handle.block_on(self.inner.add_item(cart_id, item))
    }

    fn update_item(&self, cart_id: &str, item: Item) -> StoreResult<Item> {
        self.handle.block_on(self.inner.update_item(cart_id, item))
    }

    fn delete_item(&self, cart_id: &str, item_id: &str) -> StoreResult<()> {
        self.handle.block_on(self.inner.delete_item(cart_id, item_id))
    }
}
