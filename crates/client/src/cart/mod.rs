//! Cart aggregation engine.
//!
//! Maintains the single in-progress sale with deterministic merge
//! semantics: adding a product already in the cart increments its line
//! instead of duplicating it, and a line's unit price is fixed at the
//! moment it was added - a later catalog price change never rewrites an
//! open cart.
//!
//! Every mutating operation serializes the whole cart to the persistent
//! store before returning, so a crash loses at most the last operation and
//! never leaves a torn snapshot. All operations are synchronous; nothing
//! here suspends.

mod error;

pub use error::CartError;

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tillpoint_core::{CustomerId, PaymentMethod, Price, ProductId};

use crate::store::PersistentStore;
use crate::types::{Product, SaleItemInput, SaleSubmission};

/// Store entry holding the serialized cart snapshot.
pub(crate) const CART_KEY: &str = "pos.cart";

/// One product line within the in-progress sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product this line refers to.
    pub product: ProductId,
    /// Product name at the time it was added, for receipts.
    pub name: String,
    /// Unit price recorded when the line was created.
    pub unit_price: Price,
    /// Units sold. Always positive; a zero quantity removes the line.
    pub quantity: u32,
    /// `unit_price * quantity`, maintained by the engine.
    pub line_total: Price,
}

/// The in-progress sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    /// Line items, at most one per product.
    pub items: Vec<LineItem>,
    /// Customer the sale is for, if selected.
    pub customer: Option<CustomerId>,
    /// How the sale will be paid.
    pub payment_method: PaymentMethod,
    /// Free-form note attached to the sale.
    pub notes: String,
}

impl Default for Cart {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            customer: None,
            payment_method: PaymentMethod::Cash,
            notes: String::new(),
        }
    }
}

/// Owner of the one cart per device session.
pub struct CartManager {
    store: Arc<dyn PersistentStore>,
    state: Mutex<Cart>,
}

impl CartManager {
    /// Load the cart from the store, or start empty.
    ///
    /// A snapshot that cannot be decoded (an unversioned entry from an
    /// incompatible build) is discarded with a warning rather than failing
    /// startup.
    #[must_use]
    pub fn load(store: Arc<dyn PersistentStore>) -> Self {
        let cart = match store.get(CART_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Cart>(&raw) {
                Ok(cart) => {
                    debug!(items = cart.items.len(), "cart rehydrated");
                    cart
                }
                Err(e) => {
                    warn!(error = %e, "discarding undecodable cart snapshot");
                    Cart::default()
                }
            },
            Ok(None) => Cart::default(),
            Err(e) => {
                warn!(error = %e, "cart store unreadable; starting empty");
                Cart::default()
            }
        };

        Self {
            store,
            state: Mutex::new(cart),
        }
    }

    // =========================================================================
    // Line items
    // =========================================================================

    /// Add `quantity` units of `product` to the sale.
    ///
    /// If the product is already in the cart its line is incremented and
    /// its total recomputed from the *recorded* unit price; otherwise a new
    /// line is appended at the product's current price.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if `quantity` is zero - a
    /// caller error, nothing is created. Returns `CartError::Store` if the
    /// snapshot cannot be persisted.
    pub fn add_item(&self, product: &Product, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let mut cart = self.lock_cart();

        if let Some(line) = cart.items.iter_mut().find(|l| l.product == product.id) {
            line.quantity += quantity;
            line.line_total = line.unit_price * line.quantity;
        } else {
            cart.items.push(LineItem {
                product: product.id,
                name: product.name.clone(),
                unit_price: product.price,
                quantity,
                line_total: product.price * quantity,
            });
        }

        self.persist(&cart)
    }

    /// Replace the quantity of the line for `product`.
    ///
    /// The line's total is recomputed from its recorded unit price, not the
    /// product's possibly-changed current price. A zero quantity removes
    /// the line; an unknown product is a no-op, so repeated calls with a
    /// stale id are harmless.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` if the snapshot cannot be persisted.
    pub fn update_item_quantity(&self, product: ProductId, quantity: u32) -> Result<(), CartError> {
        let mut cart = self.lock_cart();

        if quantity == 0 {
            cart.items.retain(|l| l.product != product);
            return self.persist(&cart);
        }

        let Some(line) = cart.items.iter_mut().find(|l| l.product == product) else {
            return Ok(());
        };
        line.quantity = quantity;
        line.line_total = line.unit_price * quantity;

        self.persist(&cart)
    }

    /// Remove the line for `product`, if present.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` if the snapshot cannot be persisted.
    pub fn remove_item(&self, product: ProductId) -> Result<(), CartError> {
        let mut cart = self.lock_cart();
        cart.items.retain(|l| l.product != product);
        self.persist(&cart)
    }

    /// Reset the sale: no items, no customer, cash payment, empty notes.
    ///
    /// This is the terminal state after a sale is submitted or abandoned.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` if the snapshot cannot be persisted.
    pub fn clear_cart(&self) -> Result<(), CartError> {
        let mut cart = self.lock_cart();
        *cart = Cart::default();
        self.persist(&cart)
    }

    // =========================================================================
    // Sale fields
    // =========================================================================

    /// Select the customer for this sale.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` if the snapshot cannot be persisted.
    pub fn set_customer(&self, customer: Option<CustomerId>) -> Result<(), CartError> {
        let mut cart = self.lock_cart();
        cart.customer = customer;
        self.persist(&cart)
    }

    /// Select the payment method.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` if the snapshot cannot be persisted.
    pub fn set_payment_method(&self, method: PaymentMethod) -> Result<(), CartError> {
        let mut cart = self.lock_cart();
        cart.payment_method = method;
        self.persist(&cart)
    }

    /// Attach a note to the sale.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` if the snapshot cannot be persisted.
    pub fn set_notes(&self, notes: impl Into<String>) -> Result<(), CartError> {
        let mut cart = self.lock_cart();
        cart.notes = notes.into();
        self.persist(&cart)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Snapshot of the current line items.
    #[must_use]
    pub fn items(&self) -> Vec<LineItem> {
        self.lock_cart().items.clone()
    }

    /// Snapshot of the whole cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.lock_cart().clone()
    }

    /// Sum of all line totals. Zero for an empty cart.
    #[must_use]
    pub fn total(&self) -> Price {
        self.lock_cart().items.iter().map(|l| l.line_total).sum()
    }

    /// Project the cart into a submission payload. Does not mutate.
    #[must_use]
    pub fn summary(&self) -> SaleSubmission {
        let cart = self.lock_cart();
        SaleSubmission {
            items: cart
                .items
                .iter()
                .map(|l| SaleItemInput {
                    product: l.product,
                    quantity: l.quantity,
                    price: l.unit_price,
                })
                .collect(),
            customer: cart.customer,
            total_amount: cart.items.iter().map(|l| l.line_total).sum(),
            payment_method: cart.payment_method,
            notes: cart.notes.clone(),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn lock_cart(&self) -> MutexGuard<'_, Cart> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serialize the whole cart to the store. Called with the state lock
    /// held, so the persisted snapshot always matches what callers observe.
    fn persist(&self, cart: &Cart) -> Result<(), CartError> {
        let raw = serde_json::to_string(cart)?;
        self.store.put(CART_KEY, &raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::str::FromStr;
    use tillpoint_core::CategoryId;

    fn product(id: i64, price: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            category: CategoryId::new(1),
            category_name: None,
            description: None,
            price: Price::from_str(price).expect("price"),
            stock: 100,
            image: None,
            barcode: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn manager() -> CartManager {
        CartManager::load(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_add_merges_same_product() {
        let cart = manager();
        let espresso = product(1, "10");

        cart.add_item(&espresso, 2).expect("add");
        assert_eq!(cart.total(), Price::from_major(20));

        cart.add_item(&espresso, 3).expect("add");
        let items = cart.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items.first().map(|l| l.quantity), Some(5));
        assert_eq!(cart.total(), Price::from_major(50));

        cart.remove_item(espresso.id).expect("remove");
        assert!(cart.items().is_empty());
        assert_eq!(cart.total(), Price::ZERO);
    }

    #[test]
    fn test_add_rejects_zero_quantity() {
        let cart = manager();
        let err = cart.add_item(&product(1, "5"), 0).expect_err("must reject");
        assert!(matches!(err, CartError::InvalidQuantity));
        assert!(cart.items().is_empty());
    }

    #[test]
    fn test_update_uses_recorded_price() {
        let cart = manager();
        let mut item = product(1, "10");
        cart.add_item(&item, 1).expect("add");

        // Catalog price changes after the line was created.
        item.price = Price::from_major(99);

        cart.update_item_quantity(item.id, 4).expect("update");
        let items = cart.items();
        assert_eq!(items.first().map(|l| l.unit_price), Some(Price::from_major(10)));
        assert_eq!(cart.total(), Price::from_major(40));
    }

    #[test]
    fn test_update_unknown_product_is_noop() {
        let cart = manager();
        cart.add_item(&product(1, "10"), 1).expect("add");

        cart.update_item_quantity(ProductId::new(999), 7)
            .expect("no-op");
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.total(), Price::from_major(10));
    }

    #[test]
    fn test_update_to_zero_removes_line() {
        let cart = manager();
        cart.add_item(&product(1, "10"), 2).expect("add");

        cart.update_item_quantity(ProductId::new(1), 0).expect("update");
        assert!(cart.items().is_empty());
        assert_eq!(cart.total(), Price::ZERO);
    }

    #[test]
    fn test_remove_unknown_product_is_noop() {
        let cart = manager();
        cart.remove_item(ProductId::new(42)).expect("no-op");
        assert_eq!(cart.total(), Price::ZERO);
    }

    #[test]
    fn test_clear_resets_all_fields() {
        let cart = manager();
        cart.add_item(&product(1, "10"), 1).expect("add");
        cart.set_customer(Some(CustomerId::new(5))).expect("customer");
        cart.set_payment_method(PaymentMethod::Card).expect("payment");
        cart.set_notes("gift wrap").expect("notes");

        cart.clear_cart().expect("clear");

        let snapshot = cart.cart();
        assert!(snapshot.items.is_empty());
        assert!(snapshot.customer.is_none());
        assert_eq!(snapshot.payment_method, PaymentMethod::Cash);
        assert!(snapshot.notes.is_empty());
    }

    #[test]
    fn test_summary_projects_without_mutating() {
        let cart = manager();
        cart.add_item(&product(1, "2.50"), 4).expect("add");
        cart.set_customer(Some(CustomerId::new(3))).expect("customer");
        cart.set_payment_method(PaymentMethod::Transfer).expect("payment");

        let before = cart.cart();
        let summary = cart.summary();

        assert_eq!(summary.items.len(), 1);
        assert_eq!(
            summary.items.first().map(|i| (i.quantity, i.price)),
            Some((4, Price::from_str("2.50").expect("price")))
        );
        assert_eq!(summary.total_amount, Price::from_major(10));
        assert_eq!(summary.customer, Some(CustomerId::new(3)));
        assert_eq!(summary.payment_method, PaymentMethod::Transfer);
        assert_eq!(cart.cart(), before);
    }

    #[test]
    fn test_persists_on_every_mutation_and_rehydrates() {
        let store = Arc::new(MemoryStore::new());
        {
            let cart = CartManager::load(Arc::clone(&store) as Arc<dyn PersistentStore>);
            cart.add_item(&product(1, "10"), 2).expect("add");
            cart.set_notes("till 3").expect("notes");
        }

        // Same store, fresh process.
        let restored = CartManager::load(store);
        assert_eq!(restored.total(), Price::from_major(20));
        assert_eq!(restored.cart().notes, "till 3");
    }

    #[test]
    fn test_corrupt_snapshot_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.put(CART_KEY, "{definitely not a cart").expect("seed");

        let cart = CartManager::load(store);
        assert!(cart.items().is_empty());
        assert_eq!(cart.total(), Price::ZERO);
    }

    #[test]
    fn test_total_tracks_mutations() {
        let cart = manager();
        cart.add_item(&product(1, "10"), 2).expect("add");
        cart.add_item(&product(2, "3.50"), 1).expect("add");
        assert_eq!(cart.total(), Price::from_str("23.50").expect("price"));

        cart.update_item_quantity(ProductId::new(2), 3).expect("update");
        assert_eq!(cart.total(), Price::from_str("30.50").expect("price"));

        cart.remove_item(ProductId::new(1)).expect("remove");
        assert_eq!(cart.total(), Price::from_str("10.50").expect("price"));

        cart.clear_cart().expect("clear");
        assert_eq!(cart.total(), Price::ZERO);
    }
}
