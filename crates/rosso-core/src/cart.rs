use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::products::{PriceTier, Product};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    ZeroQuantity,

    #[error("product {product_id} is not in the cart")]
    NotInCart { product_id: String },

    #[error("only {available} units of product {product_id} are available, requested {requested}")]
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: i64,
    },
}

/// One cart line: a snapshot of the product at the time it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub image: Option<String>,
}

impl CartItem {
    /// Snapshots `product` at the price `tier` sees.
    #[must_use]
    pub fn from_product(product: &Product, tier: PriceTier, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            sku: product.sku.clone(),
            unit_price: product.price_for(tier),
            quantity,
            image: product.primary_image().map(str::to_owned),
        }
    }

    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Product id to quantity, with totals always derived from the lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, product_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Adds `item.quantity` units, merging with an existing line for the same
    /// product. The line's price and name are refreshed from `item`.
    ///
    /// # Errors
    ///
    /// - [`CartError::ZeroQuantity`] if `item.quantity` is 0.
    /// - [`CartError::InsufficientStock`] if the merged quantity would exceed
    ///   `available_stock`; the cart is left unchanged.
    pub fn add(&mut self, item: CartItem, available_stock: i64) -> Result<(), CartError> {
        if item.quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }

        let existing = self.get(&item.product_id).map_or(0, |i| i.quantity);
        let requested = existing.saturating_add(item.quantity);
        check_stock(&item.product_id, requested, available_stock)?;

        if let Some(line) = self
            .items
            .iter_mut()
            .find(|i| i.product_id == item.product_id)
        {
            line.quantity = requested;
            line.unit_price = item.unit_price;
            line.name = item.name;
            line.sku = item.sku;
            line.image = item.image;
        } else {
            self.items.push(item);
        }
        Ok(())
    }

    /// Sets the quantity of an existing line; 0 removes it.
    ///
    /// # Errors
    ///
    /// - [`CartError::NotInCart`] if there is no line for `product_id`.
    /// - [`CartError::InsufficientStock`] if `quantity` exceeds `available_stock`.
    pub fn set_quantity(
        &mut self,
        product_id: &str,
        quantity: u32,
        available_stock: i64,
    ) -> Result<(), CartError> {
        let Some(pos) = self.position(product_id) else {
            return Err(not_in_cart(product_id));
        };
        if quantity == 0 {
            self.items.remove(pos);
            return Ok(());
        }
        check_stock(product_id, quantity, available_stock)?;
        if let Some(line) = self.items.get_mut(pos) {
            line.quantity = quantity;
        }
        Ok(())
    }

    /// Removes one unit. Removing the last unit drops the line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] if there is no line for `product_id`.
    pub fn decrement(&mut self, product_id: &str) -> Result<(), CartError> {
        let Some(pos) = self.position(product_id) else {
            return Err(not_in_cart(product_id));
        };
        let remaining = self.items.get(pos).map_or(0, |l| l.quantity.saturating_sub(1));
        if remaining == 0 {
            self.items.remove(pos);
        } else if let Some(line) = self.items.get_mut(pos) {
            line.quantity = remaining;
        }
        Ok(())
    }

    /// Drops the line for `product_id`, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] if there is no line for `product_id`.
    pub fn remove(&mut self, product_id: &str) -> Result<CartItem, CartError> {
        let pos = self
            .position(product_id)
            .ok_or_else(|| not_in_cart(product_id))?;
        Ok(self.items.remove(pos))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of unit price x quantity across all lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position(&self, product_id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.product_id == product_id)
    }
}

fn not_in_cart(product_id: &str) -> CartError {
    CartError::NotInCart {
        product_id: product_id.to_owned(),
    }
}

fn check_stock(product_id: &str, requested: u32, available: i64) -> Result<(), CartError> {
    if i64::from(requested) > available {
        return Err(CartError::InsufficientStock {
            product_id: product_id.to_owned(),
            requested,
            available,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, cents: i64, quantity: u32) -> CartItem {
        CartItem {
            product_id: id.to_string(),
            name: format!("Producto {id}"),
            sku: None,
            unit_price: Decimal::new(cents, 2),
            quantity,
            image: None,
        }
    }

    #[test]
    fn total_is_sum_of_price_times_quantity() {
        let mut cart = Cart::new();
        cart.add(item("a", 1_250, 2), 10).unwrap();
        cart.add(item("b", 999, 3), 10).unwrap();
        cart.add(item("a", 1_250, 1), 10).unwrap();

        let expected: Decimal = cart
            .items()
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum();
        assert_eq!(cart.total(), expected);
        assert_eq!(cart.total(), Decimal::new(6_747, 2));
        assert_eq!(cart.count(), 6);
        assert_eq!(cart.items().len(), 2, "same product merges into one line");
    }

    #[test]
    fn add_refreshes_price_on_merge() {
        let mut cart = Cart::new();
        cart.add(item("a", 1_000, 1), 5).unwrap();
        cart.add(item("a", 800, 1), 5).unwrap();
        assert_eq!(cart.get("a").unwrap().unit_price, Decimal::new(800, 2));
        assert_eq!(cart.total(), Decimal::new(1_600, 2));
    }

    #[test]
    fn add_rejects_zero_quantity() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(item("a", 100, 0), 5), Err(CartError::ZeroQuantity));
        assert!(cart.is_empty());
    }

    #[test]
    fn add_over_stock_leaves_cart_unchanged() {
        let mut cart = Cart::new();
        cart.add(item("a", 100, 2), 3).unwrap();
        let err = cart.add(item("a", 100, 2), 3).unwrap_err();
        assert!(matches!(
            err,
            CartError::InsufficientStock {
                requested: 4,
                available: 3,
                ..
            }
        ));
        assert_eq!(cart.get("a").unwrap().quantity, 2);
    }

    #[test]
    fn decrementing_last_unit_removes_line() {
        let mut cart = Cart::new();
        cart.add(item("a", 500, 2), 5).unwrap();
        cart.decrement("a").unwrap();
        assert_eq!(cart.get("a").unwrap().quantity, 1);
        cart.decrement("a").unwrap();
        assert!(cart.get("a").is_none());
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Decimal::ZERO);
        assert_eq!(cart.count(), 0);
    }

    #[test]
    fn set_quantity_zero_removes_line() {
        let mut cart = Cart::new();
        cart.add(item("a", 500, 2), 5).unwrap();
        cart.add(item("b", 500, 1), 5).unwrap();
        cart.set_quantity("a", 0, 5).unwrap();
        assert!(cart.get("a").is_none());
        assert_eq!(cart.count(), 1);
    }

    #[test]
    fn set_quantity_checks_stock_and_presence() {
        let mut cart = Cart::new();
        cart.add(item("a", 500, 1), 2).unwrap();
        assert!(matches!(
            cart.set_quantity("a", 3, 2),
            Err(CartError::InsufficientStock { .. })
        ));
        assert!(matches!(
            cart.set_quantity("zzz", 1, 2),
            Err(CartError::NotInCart { .. })
        ));
        cart.set_quantity("a", 2, 2).unwrap();
        assert_eq!(cart.count(), 2);
    }

    #[test]
    fn remove_and_clear() {
        let mut cart = Cart::new();
        cart.add(item("a", 500, 1), 2).unwrap();
        cart.add(item("b", 700, 1), 2).unwrap();
        let removed = cart.remove("a").unwrap();
        assert_eq!(removed.product_id, "a");
        assert!(cart.remove("a").is_err());
        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn serializes_as_item_list() {
        let mut cart = Cart::new();
        cart.add(item("a", 500, 1), 2).unwrap();
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json["items"][0]["product_id"], "a");
        assert_eq!(json["items"][0]["unit_price"], "5.00");
    }
}
