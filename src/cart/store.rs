//! Line-item cart for a single checkout session.

use crate::error::{CartError, Result};
use crate::listeners::{ListenerHandle, ListenerRegistry, StateReceiver, WatchConfig};
use crate::types::{CartItem, CartState, NewCartItem};
use crate::validation::{validate_item, validate_quantity};

/// The cart for one checkout session.
///
/// Lines are kept in insertion order and merged by item id. Every mutating
/// operation validates first and only then touches the lines, so an `Err`
/// always leaves the cart as it was.
///
/// Operations take `&mut self`: whoever owns the store serialises access.
pub struct CartStore {
    items: Vec<CartItem>,

    /// Cached sum of all line totals.
    total_cost: u64,

    listeners: ListenerRegistry<CartState>,
}

impl CartStore {
    /// Create an empty cart.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            total_cost: 0,
            listeners: ListenerRegistry::new(),
        }
    }

    /// Create a cart pre-filled with `items`, merging duplicate ids.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid item; nothing is built in that case.
    pub fn with_items(items: impl IntoIterator<Item = NewCartItem>) -> Result<Self> {
        let mut cart = Self::new();
        for item in items {
            cart.apply_add(item)?;
        }
        Ok(cart)
    }

    // --- Mutations ---

    /// Add an item, or increase the quantity of the existing line with the same id.
    ///
    /// When merging, the existing line keeps its name and unit price.
    pub fn add_item(&mut self, item: NewCartItem) -> Result<CartState> {
        self.apply_add(item)?;
        Ok(self.publish())
    }

    /// Remove the line with `id`. Removing an absent id is a no-op.
    pub fn remove_item(&mut self, id: &str) -> CartState {
        match self.position(id) {
            Some(index) => {
                self.take_line(index);
                self.publish()
            }
            None => {
                tracing::debug!(item_id = id, "remove_item: no such line");
                self.state()
            }
        }
    }

    /// Remove the line at `index` (insertion order).
    pub fn remove_by_index(&mut self, index: usize) -> Result<CartState> {
        if index >= self.items.len() {
            return Err(CartError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        self.take_line(index);
        Ok(self.publish())
    }

    /// Replace the quantity of an existing line.
    ///
    /// A quantity of zero is rejected like any other invalid quantity; use
    /// [`CartStore::remove_item`] to delete a line.
    pub fn set_quantity(&mut self, id: &str, quantity: i64) -> Result<CartState> {
        let quantity = validate_quantity(quantity)?;
        let index = self
            .position(id)
            .ok_or_else(|| CartError::ItemNotFound(id.to_string()))?;

        let line = &self.items[index];
        let old_total = line.line_total().unwrap_or_default();
        let new_total = line
            .unit_price
            .checked_mul(u64::from(quantity))
            .ok_or_else(|| CartError::AmountOverflow(id.to_string()))?;
        let total_cost = (self.total_cost - old_total)
            .checked_add(new_total)
            .ok_or_else(|| CartError::AmountOverflow(id.to_string()))?;

        self.items[index].quantity = quantity;
        self.total_cost = total_cost;

        tracing::debug!(item_id = id, quantity, "set line quantity");
        Ok(self.publish())
    }

    /// Remove every line.
    pub fn clear(&mut self) -> CartState {
        self.items.clear();
        self.total_cost = 0;
        self.publish()
    }

    // --- Reads ---

    /// Lines in insertion order.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Get the line for `id`.
    pub fn get(&self, id: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Sum of `unit_price * quantity` over all lines. Zero when empty.
    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }

    /// Total number of units across all lines.
    pub fn unit_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Snapshot of the whole cart.
    pub fn state(&self) -> CartState {
        CartState {
            items: self.items.clone(),
            total_cost: self.total_cost,
        }
    }

    // --- Listeners ---

    /// Call `listener` with the new state after every successful mutation.
    pub fn subscribe<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&CartState) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Receive the new state after every successful mutation on a channel.
    pub fn watch(&self, config: WatchConfig) -> StateReceiver<CartState> {
        self.listeners.watch(config)
    }

    // --- Internals ---

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Validate and apply an add without notifying.
    fn apply_add(&mut self, item: NewCartItem) -> Result<()> {
        let quantity = validate_quantity(item.quantity)?;
        validate_item(&item)?;

        match self.position(&item.id) {
            Some(index) => {
                let line = &self.items[index];
                let merged = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| CartError::AmountOverflow(item.id.clone()))?;
                let added = line
                    .unit_price
                    .checked_mul(u64::from(quantity))
                    .and_then(|amount| self.total_cost.checked_add(amount))
                    .ok_or_else(|| CartError::AmountOverflow(item.id.clone()))?;

                if line.unit_price != item.unit_price {
                    tracing::debug!(
                        item_id = %item.id,
                        kept = line.unit_price,
                        ignored = item.unit_price,
                        "merge keeps existing unit price"
                    );
                }

                self.items[index].quantity = merged;
                self.total_cost = added;
                tracing::debug!(item_id = %item.id, quantity = merged, "merged line");
            }
            None => {
                let line = CartItem {
                    id: item.id,
                    name: item.name,
                    unit_price: item.unit_price,
                    quantity,
                };
                let total_cost = line
                    .line_total()
                    .and_then(|amount| self.total_cost.checked_add(amount))
                    .ok_or_else(|| CartError::AmountOverflow(line.id.clone()))?;

                tracing::debug!(item_id = %line.id, quantity, "added line");
                self.items.push(line);
                self.total_cost = total_cost;
            }
        }

        Ok(())
    }

    fn take_line(&mut self, index: usize) {
        let line = self.items.remove(index);
        self.total_cost -= line.line_total().unwrap_or_default();
        tracing::debug!(item_id = %line.id, index, "removed line");
    }

    fn publish(&self) -> CartState {
        let state = self.state();
        self.listeners.notify(&state);
        state
    }
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("items", &self.items)
            .field("total_cost", &self.total_cost)
            .finish()
    }
}
