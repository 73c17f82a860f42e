//! In-memory order store.
//!
//! The store is the single source of truth for orders. It only knows how to
//! insert, look up, list and replace whole records; every business rule lives
//! above it in the mutation engine. Returned orders are owned clones, so no
//! caller can alias store-internal state.

use std::sync::RwLock;

use automata_common::Order;

use crate::errors::{OrderError, Result};

/// Persistence seam for orders. `MemoryOrderStore` is the only implementation
/// today; a durable engine can be dropped in behind the same trait.
pub trait OrderStore: Send + Sync {
    /// Add a new order. Fails with `InvalidValue` if the id is already taken.
    fn insert(&self, order: Order) -> Result<()>;

    fn find_by_id(&self, id: &str) -> Result<Option<Order>>;

    /// All orders in insertion order.
    fn list_all(&self) -> Result<Vec<Order>>;

    /// Replace the order with the given id. Fails with `NotFound` for unknown ids.
    fn replace(&self, id: &str, order: Order) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<Vec<Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the given orders, e.g. seed fixtures.
    pub fn with_orders(orders: Vec<Order>) -> Self {
        Self {
            orders: RwLock::new(orders),
        }
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> OrderError {
        OrderError::StoreUnavailable(format!("lock poisoned: {}", e))
    }
}

impl OrderStore for MemoryOrderStore {
    fn insert(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().map_err(Self::poisoned)?;
        if orders.iter().any(|o| o.id == order.id) {
            return Err(OrderError::invalid_value(
                "id",
                format!("order {} already exists", order.id),
            ));
        }
        orders.push(order);
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<Order>> {
        let orders = self.orders.read().map_err(Self::poisoned)?;
        Ok(orders.iter().find(|o| o.id == id).cloned())
    }

    fn list_all(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().map_err(Self::poisoned)?;
        Ok(orders.clone())
    }

    fn replace(&self, id: &str, order: Order) -> Result<()> {
        let mut orders = self.orders.write().map_err(Self::poisoned)?;
        let slot = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| OrderError::not_found(id))?;
        *slot = order;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::seed::blank_order;

    #[test]
    fn test_insert_and_find() {
        let store = MemoryOrderStore::new();
        store.insert(blank_order("ord-1")).unwrap();
        let found = store.find_by_id("ord-1").unwrap().unwrap();
        assert_eq!(found.id, "ord-1");
        assert!(store.find_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_insert_duplicate_id_is_rejected() {
        let store = MemoryOrderStore::new();
        store.insert(blank_order("ord-1")).unwrap();
        let err = store.insert(blank_order("ord-1")).unwrap_err();
        assert!(matches!(err, OrderError::InvalidValue { .. }));
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let store = MemoryOrderStore::new();
        for id in ["b", "a", "c"] {
            store.insert(blank_order(id)).unwrap();
        }
        let ids: Vec<String> = store.list_all().unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_replace_unknown_id_is_not_found() {
        let store = MemoryOrderStore::new();
        let err = store.replace("ghost", blank_order("ghost")).unwrap_err();
        assert!(matches!(err, OrderError::NotFound { .. }));
    }

    #[test]
    fn test_returned_orders_do_not_alias_store() {
        let store = MemoryOrderStore::new();
        store.insert(blank_order("ord-1")).unwrap();

        let mut copy = store.find_by_id("ord-1").unwrap().unwrap();
        copy.customer_name = "Mallory".to_string();

        let fresh = store.find_by_id("ord-1").unwrap().unwrap();
        assert_ne!(fresh.customer_name, "Mallory");
    }

    #[test]
    fn test_replace_swaps_whole_record() {
        let store = MemoryOrderStore::new();
        store.insert(blank_order("ord-1")).unwrap();
        let mut updated = store.find_by_id("ord-1").unwrap().unwrap();
        updated.order_summary = "A new adventure".to_string();
        store.replace("ord-1", updated).unwrap();
        assert_eq!(
            store.find_by_id("ord-1").unwrap().unwrap().order_summary,
            "A new adventure"
        );
    }
}
