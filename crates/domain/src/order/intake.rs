//! Cart validation against catalog state.
//!
//! Validation is a pure read over a snapshot of the referenced products. It
//! never reserves anything; the inventory ledger re-checks stock when it
//! actually decrements.

use std::collections::HashMap;

use common::ProductId;

use crate::product::Product;

use super::{CartLine, OrderError, PlaceOrder};

/// Bounds applied to every cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeLimits {
    /// Largest quantity accepted on a single line.
    pub max_line_quantity: u32,
}

impl Default for IntakeLimits {
    fn default() -> Self {
        Self {
            max_line_quantity: 100,
        }
    }
}

/// A cart line that passed validation, paired with the product it was
/// checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLine {
    product: Product,
    quantity: u32,
}

impl ValidatedLine {
    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// Validates the whole order request: shipping details, then every cart line.
pub fn validate_order(
    cmd: &PlaceOrder,
    products: &HashMap<ProductId, Product>,
    limits: &IntakeLimits,
) -> Result<Vec<ValidatedLine>, OrderError> {
    cmd.shipping.validate()?;
    validate_cart(&cmd.lines, products, limits)
}

/// Validates cart lines in order and stops at the first bad one.
///
/// Per line: positive quantity, known product, active product, stock, then
/// the line quantity cap. Line numbers in errors are 1-based. Stock is checked against the running
/// total per product, so two lines for the same product cannot together
/// exceed what is available.
pub fn validate_cart(
    lines: &[CartLine],
    products: &HashMap<ProductId, Product>,
    limits: &IntakeLimits,
) -> Result<Vec<ValidatedLine>, OrderError> {
    if lines.is_empty() {
        return Err(OrderError::EmptyCart);
    }

    let mut requested: HashMap<ProductId, u32> = HashMap::new();
    let mut validated = Vec::with_capacity(lines.len());

    for (index, line) in lines.iter().enumerate() {
        let line_no = index + 1;

        let invalid_quantity = || OrderError::InvalidQuantity {
            line: line_no,
            quantity: line.quantity,
            max: limits.max_line_quantity,
        };
        let quantity = u32::try_from(line.quantity)
            .ok()
            .filter(|q| *q >= 1)
            .ok_or_else(invalid_quantity)?;

        let product = products
            .get(&line.product_id)
            .ok_or(OrderError::ProductNotFound {
                line: line_no,
                product_id: line.product_id,
            })?;

        if !product.active {
            return Err(OrderError::ProductInactive {
                line: line_no,
                product_id: product.id,
            });
        }

        let total = requested.entry(product.id).or_insert(0);
        *total = total.saturating_add(quantity);
        if *total > product.stock {
            return Err(OrderError::InsufficientStock {
                line: line_no,
                product_id: product.id,
                requested: *total,
                available: product.stock,
            });
        }

        // Checked after stock so an over-stock line always reports the shortfall.
        if quantity > limits.max_line_quantity {
            return Err(invalid_quantity());
        }

        validated.push(ValidatedLine {
            product: product.clone(),
            quantity,
        });
    }

    Ok(validated)
}
