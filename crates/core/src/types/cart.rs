//! Cart lines and the arithmetic shared by the local and server carts.
//!
//! A line's identity is its product id. A quantity can never be zero:
//! reducing a line to zero removes it instead of storing it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{AccountId, ProductId};
use super::price::{CurrencyCode, Price};

/// Error returned when a quantity would be stored as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("quantity must be at least 1")]
pub struct QuantityError;

/// A line quantity, always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(1);

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError`] for zero.
    pub const fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 {
            Err(QuantityError)
        } else {
            Ok(Self(value))
        }
    }

    /// The raw count.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Add another quantity, saturating at `u32::MAX`.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

/// One product in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

impl CartLine {
    /// Price of the whole line.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity.get())
    }
}

/// An ordered collection of cart lines keyed by product id.
///
/// Serializes as a plain JSON list so the persisted layout is a list of
/// [`CartLine`] under a single namespace key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartLines(Vec<CartLine>);

impl CartLines {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CartLine> {
        self.0.iter()
    }

    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartLine> {
        self.0.iter().find(|line| line.product_id == product_id)
    }

    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.get(product_id).is_some()
    }

    /// Add a line, summing quantities when the product is already present.
    ///
    /// Name, price and image of an existing line are refreshed from the
    /// incoming line so the cart shows the latest catalog data.
    pub fn add(&mut self, line: CartLine) {
        if let Some(existing) = self
            .0
            .iter_mut()
            .find(|existing| existing.product_id == line.product_id)
        {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
            existing.name = line.name;
            existing.unit_price = line.unit_price;
            if line.image_ref.is_some() {
                existing.image_ref = line.image_ref;
            }
        } else {
            self.0.push(line);
        }
    }

    /// Remove a product. Returns whether a line was removed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.0.len();
        self.0.retain(|line| line.product_id != product_id);
        self.0.len() != before
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// Returns `false` when the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> bool {
        let Ok(quantity) = Quantity::new(quantity) else {
            return self.remove(product_id);
        };

        match self
            .0
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Add the line if absent, remove it if present.
    ///
    /// Returns `true` when the line is in the cart afterwards.
    pub fn toggle(&mut self, line: CartLine) -> bool {
        if self.remove(line.product_id) {
            false
        } else {
            self.0.push(line);
            true
        }
    }

    /// Keep only lines whose product id is in `product_ids`, preserving order.
    pub fn retain_only(&mut self, product_ids: &[ProductId]) {
        self.0.retain(|line| product_ids.contains(&line.product_id));
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Sum of all line quantities (the cart badge number).
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.0
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity.get()))
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.0.iter().map(CartLine::line_total).sum()
    }
}

impl From<Vec<CartLine>> for CartLines {
    /// Build a cart from raw lines, merging duplicate products.
    fn from(lines: Vec<CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            cart.add(line);
        }
        cart
    }
}

impl<'a> IntoIterator for &'a CartLines {
    type Item = &'a CartLine;
    type IntoIter = std::slice::Iter<'a, CartLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The authoritative cart for an account, as echoed by the back-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub account_id: AccountId,
    pub lines: CartLines,
    #[serde(default)]
    pub currency_code: CurrencyCode,
}

impl CartSnapshot {
    /// Badge number for the server cart.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.lines.total_quantity()
    }

    #[must_use]
    pub fn subtotal(&self) -> Price {
        Price::new(self.lines.subtotal(), self.currency_code)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i64, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            unit_price: Decimal::new(250, 2),
            quantity: Quantity::new(quantity).unwrap(),
            image_ref: None,
        }
    }

    #[test]
    fn test_quantity_rejects_zero() {
        assert_eq!(Quantity::new(0), Err(QuantityError));
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("3").unwrap().get(), 3);
    }

    #[test]
    fn test_add_sums_existing_product() {
        let mut cart = CartLines::new();
        cart.add(line(1, 2));
        cart.add(line(2, 1));
        cart.add(line(1, 3));

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity.get(), 5);
        assert_eq!(cart.total_quantity(), 6);
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let mut cart = CartLines::from(vec![line(1, 2), line(2, 1)]);

        assert!(cart.set_quantity(ProductId::new(1), 0));
        assert!(!cart.contains(ProductId::new(1)));
        assert!(!cart.set_quantity(ProductId::new(9), 4));

        assert!(cart.set_quantity(ProductId::new(2), 4));
        assert_eq!(cart.total_quantity(), 4);
    }

    #[test]
    fn test_toggle() {
        let mut cart = CartLines::new();
        assert!(cart.toggle(line(1, 1)));
        assert!(!cart.toggle(line(1, 1)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_retain_only_preserves_order() {
        let mut cart = CartLines::from(vec![line(1, 1), line(2, 1), line(3, 1)]);
        cart.retain_only(&[ProductId::new(3), ProductId::new(1)]);

        let ids: Vec<i64> = cart.iter().map(|l| l.product_id.get()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_subtotal() {
        let cart = CartLines::from(vec![line(1, 2), line(2, 1)]);
        assert_eq!(cart.subtotal(), Decimal::new(750, 2));
    }

    #[test]
    fn test_persisted_layout_is_a_list() {
        let cart = CartLines::from(vec![line(1, 2)]);
        let json = serde_json::to_value(&cart).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["productId"], 1);
        assert_eq!(json[0]["quantity"], 2);
        assert_eq!(json[0]["unitPrice"], "2.50");
    }
}
