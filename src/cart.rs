//! Cart State
//! In-memory POS cart. One store per process, created at startup and
//! never torn down during a session; independent of the listing flow.

use std::sync::Mutex;

use crate::models::CartEntry;

/// Fields snapshotted from an item when it enters the cart.
#[derive(Debug, Clone)]
pub struct CartItemSnapshot {
    pub item_id: String,
    pub name: String,
    pub price: f64,
    pub image: Option<String>,
    pub category: String,
    pub stock: String,
}

#[derive(Debug, Default)]
pub struct CartStore {
    entries: Mutex<Vec<CartEntry>>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one unit. An item already in the cart bumps its quantity; a
    /// new item appends an entry with quantity 1.
    pub fn add(&self, snapshot: CartItemSnapshot) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.iter_mut().find(|e| e.item_id == snapshot.item_id) {
            entry.quantity += 1;
            return;
        }
        entries.push(CartEntry {
            item_id: snapshot.item_id,
            name: snapshot.name,
            price: snapshot.price,
            quantity: 1,
            image: snapshot.image,
            category: snapshot.category,
            stock: snapshot.stock,
        });
    }

    pub fn remove(&self, item_id: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.item_id != item_id);
        entries.len() != before
    }

    /// Apply a signed quantity change. A quantity that would drop below 1
    /// removes the entry instead. Returns the new quantity, 0 when the
    /// entry was removed, or None when the item is not in the cart.
    pub fn update_quantity(&self, item_id: &str, change: i64) -> Option<i64> {
        let mut entries = self.entries.lock().unwrap();
        let index = entries.iter().position(|e| e.item_id == item_id)?;
        let new_quantity = entries[index].quantity + change;
        if new_quantity < 1 {
            entries.remove(index);
            return Some(0);
        }
        entries[index].quantity = new_quantity;
        Some(new_quantity)
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn entries(&self) -> Vec<CartEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn total(&self) -> f64 {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.price * e.quantity as f64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: &str, price: f64) -> CartItemSnapshot {
        CartItemSnapshot {
            item_id: id.to_string(),
            name: format!("Item {}", id),
            price,
            image: None,
            category: "Clothing".to_string(),
            stock: "available".to_string(),
        }
    }

    #[test]
    fn adding_same_item_twice_merges_into_one_entry() {
        let cart = CartStore::new();
        cart.add(snapshot("a", 10.0));
        cart.add(snapshot("a", 10.0));

        let entries = cart.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].quantity, 2);
    }

    #[test]
    fn quantity_dropping_below_one_removes_the_entry() {
        let cart = CartStore::new();
        cart.add(snapshot("a", 10.0));
        assert_eq!(cart.update_quantity("a", -1), Some(0));
        assert!(cart.entries().is_empty());
    }

    #[test]
    fn quantity_changes_accumulate() {
        let cart = CartStore::new();
        cart.add(snapshot("a", 10.0));
        assert_eq!(cart.update_quantity("a", 3), Some(4));
        assert_eq!(cart.update_quantity("a", -2), Some(2));
        assert_eq!(cart.update_quantity("missing", 1), None);
    }

    #[test]
    fn total_sums_price_times_quantity() {
        let cart = CartStore::new();
        cart.add(snapshot("a", 10.0));
        cart.add(snapshot("a", 10.0));
        cart.add(snapshot("b", 2.5));
        assert_eq!(cart.total(), 22.5);
    }

    #[test]
    fn remove_and_clear() {
        let cart = CartStore::new();
        cart.add(snapshot("a", 1.0));
        cart.add(snapshot("b", 1.0));
        assert!(cart.remove("a"));
        assert!(!cart.remove("a"));
        cart.clear();
        assert!(cart.entries().is_empty());
    }
}
