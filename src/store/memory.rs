use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{Cart, Item};

use super::{CartRepositoryAsync, StoreResult};

/// In-memory cart store.
///
/// All mutations take the write lock, so a merge is exclusive with every
/// other operation. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCartRepository {
    carts: RwLock<HashMap<String, Cart>>,
}

impl InMemoryCartRepository {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn cart_count(&self) -> usize {
        self.carts.read().await.len()
    }
}

fn sorted(mut cart: Cart) -> Cart {
    cart.sort_items();
    cart
}

#[async_trait]
impl CartRepositoryAsync for InMemoryCartRepository {
    async fn get_or_create_cart(&self, customer_id: &str) -> StoreResult<Cart> {
        if let Some(cart) = self.carts.read().await.get(customer_id) {
            return Ok(sorted(cart.clone()));
        }

        let mut carts = self.carts.write().await;
        let cart = carts
            .entry(customer_id.to_string())
            .or_insert_with(|| Cart::new(customer_id));
        Ok(sorted(cart.clone()))
    }

    async fn delete_cart(&self, customer_id: &str) -> StoreResult<bool> {
        let removed = self.carts.write().await.remove(customer_id).is_some();
        tracing::info!(customer_id, removed, "cart deleted");
        Ok(removed)
    }

    async fn merge_carts(&self, target_id: &str, source_id: &str) -> StoreResult<bool> {
        let mut carts = self.carts.write().await;
        let Some(source) = carts.get(source_id).cloned() else {
            tracing::debug!(target_id, source_id, "merge skipped, no source cart");
            return Ok(false);
        };
        if target_id == source_id {
            return Ok(true);
        }

        let merged = source.items.len();
        let mut target = carts
            .get(target_id)
            .cloned()
            .unwrap_or_else(|| Cart::new(target_id));
        target.merge(source)?;

        carts.remove(source_id);
        carts.insert(target_id.to_string(), target);
        tracing::info!(target_id, source_id, merged, "carts merged");
        Ok(true)
    }

    async fn get_item(&self, cart_id: &str, item_id: &str) -> StoreResult<Option<Item>> {
        let carts = self.carts.read().await;
        Ok(carts
            .get(cart_id)
            .and_then(|cart| cart.item(item_id))
            .cloned())
    }

    async fn get_items(&self, cart_id: &str) -> StoreResult<Vec<Item>> {
        let carts = self.carts.read().await;
        Ok(carts
            .get(cart_id)
            .cloned()
            .map(|cart| sorted(cart).items)
            .unwrap_or_default())
    }

    async fn add_item(&self, cart_id: &str, item: Item) -> StoreResult<Item> {
        let mut carts = self.carts.write().await;
        let stored = carts
            .entry(cart_id.to_string())
            .or_insert_with(|| Cart::new(cart_id))
            .add(item)?;

        tracing::debug!(cart_id, item_id = %stored.item_id, quantity = stored.quantity, "item added");
        Ok(stored)
    }

    async fn update_item(&self, cart_id: &str, item: Item) -> StoreResult<Item> {
        let mut carts = self.carts.write().await;
        let stored = carts
            .entry(cart_id.to_string())
            .or_insert_with(|| Cart::new(cart_id))
            .update(item);

        tracing::debug!(cart_id, item_id = %stored.item_id, quantity = stored.quantity, "item updated");
        Ok(stored)
    }

    async fn delete_item(&self, cart_id: &str, item_id: &str) -> StoreResult<()> {
        let mut carts = self.carts.write().await;
        if let Some(cart) = carts.get_mut(cart_id) {
            let removed = cart.remove(item_id);
            tracing::debug!(cart_id, item_id, removed, "item deleted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::store::StoreError;

    #[tokio::test]
    async fn get_or_create_registers_an_empty_cart() {
        let repo = InMemoryCartRepository::new();

        let cart = repo.get_or_create_cart("alice").await.unwrap();

        assert_eq!(cart, Cart::new("alice"));
        assert_eq!(repo.cart_count().await, 1);
    }

    #[tokio::test]
    async fn get_items_does_not_create_a_cart() {
        let repo = InMemoryCartRepository::new();

        assert!(repo.get_items("ghost").await.unwrap().is_empty());
        assert!(repo.get_item("ghost", "sku1").await.unwrap().is_none());
        assert_eq!(repo.cart_count().await, 0);
    }

    #[tokio::test]
    async fn delete_cart_reports_existence() {
        let repo = InMemoryCartRepository::new();
        repo.get_or_create_cart("alice").await.unwrap();

        assert!(repo.delete_cart("alice").await.unwrap());
        assert!(!repo.delete_cart("alice").await.unwrap());
    }

    #[tokio::test]
    async fn merge_of_empty_source_still_removes_it() {
        let repo = InMemoryCartRepository::new();
        repo.get_or_create_cart("session1").await.unwrap();

        assert!(repo.merge_carts("bob", "session1").await.unwrap());
        assert_eq!(repo.cart_count().await, 1);
        assert!(repo.get_items("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_adds_do_not_lose_increments() {
        let repo = Arc::new(InMemoryCartRepository::new());

        let mut handles = Vec::new();
        for _ in 0..50 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.add_item("alice", Item::new("sku1", 1, dec!(1)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let item = repo.get_item("alice", "sku1").await.unwrap().unwrap();
        assert_eq!(item.quantity, 50);
    }

    #[tokio::test]
    async fn concurrent_merges_move_items_once() {
        let repo = Arc::new(InMemoryCartRepository::new());
        repo.add_item("session42", Item::new("sku7", 2, dec!(3)))
            .await
            .unwrap();

        let a = tokio::spawn({
            let repo = Arc::clone(&repo);
            async move { repo.merge_carts("bob", "session42").await.unwrap() }
        });
        let b = tokio::spawn({
            let repo = Arc::clone(&repo);
            async move { repo.merge_carts("bob", "session42").await.unwrap() }
        });
        let merged = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(merged.iter().filter(|m| **m).count(), 1);
        let item = repo.get_item("bob", "sku7").await.unwrap().unwrap();
        assert_eq!(item.quantity, 2);
    }

    #[tokio::test]
    async fn add_past_i32_max_is_rejected() {
        let repo = InMemoryCartRepository::new();
        repo.add_item("alice", Item::new("sku1", i32::MAX, dec!(1)))
            .await
            .unwrap();

        let err = repo
            .add_item("alice", Item::new("sku1", i32::MAX, dec!(1)))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::QuantityOverflow(_)));
        let item = repo.get_item("alice", "sku1").await.unwrap().unwrap();
        assert_eq!(item.quantity, i32::MAX);
    }

    #[tokio::test]
    async fn overflowing_merge_keeps_both_carts() {
        let repo = InMemoryCartRepository::new();
        repo.add_item("bob", Item::new("sku1", i32::MAX, dec!(1)))
            .await
            .unwrap();
        repo.add_item("session42", Item::new("sku1", 1, dec!(1)))
            .await
            .unwrap();

        let err = repo.merge_carts("bob", "session42").await.unwrap_err();

        assert!(matches!(err, StoreError::QuantityOverflow(_)));
        assert_eq!(
            repo.get_items("session42").await.unwrap(),
            vec![Item::new("sku1", 1, dec!(1))]
        );
        let item = repo.get_item("bob", "sku1").await.unwrap().unwrap();
        assert_eq!(item.quantity, i32::MAX);
    }

    #[tokio::test]
    async fn merge_racing_source_delete_is_all_or_nothing() {
        for _ in 0..20 {
            let repo = Arc::new(InMemoryCartRepository::new());
            repo.add_item("session42", Item::new("sku7", 2, dec!(3)))
                .await
                .unwrap();

            let merge = tokio::spawn({
                let repo = Arc::clone(&repo);
                async move { repo.merge_carts("bob", "session42").await.unwrap() }
            });
            let delete = tokio::spawn({
                let repo = Arc::clone(&repo);
                async move { repo.delete_cart("session42").await.unwrap() }
            });
            let merged = merge.await.unwrap();
            let deleted = delete.await.unwrap();

            assert!(merged != deleted, "exactly one of merge and delete sees the source");
            let target = repo.get_items("bob").await.unwrap();
            if merged {
                assert_eq!(target, vec![Item::new("sku7", 2, dec!(3))]);
            } else {
                assert!(target.is_empty());
            }
            assert!(repo.get_items("session42").await.unwrap().is_empty());
        }
    }
}
