//! Exchange trading rules and order validation.
//!
//! Every instrument carries a tick size, a lot size, and a minimum notional.
//! Validation returns the corrected, exchange-aligned quantity and price
//! rather than forcing callers to redo the rounding themselves.

use crate::types::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-symbol trading rules as published by the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRules {
    /// Minimum price increment.
    pub tick_size: Decimal,
    /// Minimum quantity increment.
    pub lot_size: Decimal,
    /// Smallest accepted order quantity.
    pub min_quantity: Decimal,
    /// Smallest accepted quantity * price.
    pub min_notional: Decimal,
}

impl SymbolRules {
    /// Rules matching the BTCUSDT perpetual contract. Used by the simulator
    /// and as a test fixture.
    pub fn btc_usdt() -> Self {
        Self {
            tick_size: Decimal::new(1, 1),    // $0.1
            lot_size: Decimal::new(1, 3),     // 0.001 BTC
            min_quantity: Decimal::new(1, 3), // 0.001 BTC
            min_notional: Decimal::new(100, 1), // $10
        }
    }

    /// Validate an order against these rules, returning lot- and tick-aligned
    /// values. Quantity rounds down (never order more than asked); price
    /// rounds to the nearest tick.
    pub fn validate(
        &self,
        quantity: Decimal,
        price: Option<Price>,
    ) -> Result<ValidatedOrder, RuleError> {
        if quantity <= Decimal::ZERO {
            return Err(RuleError::NonPositiveQuantity(quantity));
        }

        let aligned_quantity = align_down(quantity, self.lot_size);
        if aligned_quantity < self.min_quantity {
            return Err(RuleError::QuantityTooSmall {
                quantity: aligned_quantity,
                minimum: self.min_quantity,
            });
        }

        let aligned_price = match price {
            Some(p) => Some(self.align_price(p)?),
            None => None,
        };

        if let Some(p) = aligned_price {
            let notional = aligned_quantity * p.value();
            if notional < self.min_notional {
                return Err(RuleError::BelowMinNotional {
                    notional,
                    minimum: self.min_notional,
                });
            }
        }

        Ok(ValidatedOrder {
            quantity: aligned_quantity,
            price: aligned_price,
        })
    }

    /// Round a price to the nearest tick.
    pub fn align_price(&self, price: Price) -> Result<Price, RuleError> {
        let ticks = (price.value() / self.tick_size).round();
        let rounded = ticks * self.tick_size;
        Price::new(rounded).ok_or(RuleError::InvalidPrice(price))
    }
}

/// Quantity and price after rule alignment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ValidatedOrder {
    pub quantity: Decimal,
    pub price: Option<Price>,
}

/// Round `value` down to a multiple of `step`. A zero step passes the value
/// through unchanged.
pub fn align_down(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }
    (value / step).floor() * step
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RuleError {
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),

    #[error("quantity {quantity} below minimum {minimum}")]
    QuantityTooSmall { quantity: Decimal, minimum: Decimal },

    #[error("notional {notional} below minimum {minimum}")]
    BelowMinNotional { notional: Decimal, minimum: Decimal },

    #[error("invalid price: {0}")]
    InvalidPrice(Price),
}
