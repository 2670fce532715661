// Cart state and signal payloads
// Decision: CartState is the workflow input and the payment activity input, so it must round-trip JSON
// Decision: Every field defaults so a workflow started without arguments begins with an empty cart

use serde::{Deserialize, Serialize};

use crate::error::CartError;

/// Names of the signal channels a cart workflow listens on
pub mod signal_names {
    pub const ADD_TO_CART: &str = "ADD_TO_CART_CHANNEL";
    pub const REMOVE_FROM_CART: &str = "REMOVE_FROM_CART_CHANNEL";
    pub const UPDATE_EMAIL: &str = "UPDATE_EMAIL_CHANNEL";
    pub const CHECKOUT: &str = "CHECKOUT_CHANNEL";
}

/// One line of a cart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CartItem {
    pub product_id: i64,
    pub quantity: i64,
}

impl CartItem {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Everything the cart workflow knows about a shopper's cart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CartState {
    pub items: Vec<CartItem>,
    pub email: String,
}

impl CartState {
    /// Add an item, merging quantities with an existing line for the same product.
    /// The cart is left unchanged when the merged quantity would overflow.
    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        match self
            .items
            .iter_mut()
            .find(|existing| existing.product_id == item.product_id)
        {
            Some(existing) => {
                existing.quantity = existing.quantity.checked_add(item.quantity).ok_or(
                    CartError::QuantityOverflow {
                        product_id: item.product_id,
                    },
                )?;
            }
            None => self.items.push(item),
        }
        Ok(())
    }

    /// Remove a quantity of a product; the line disappears once it reaches zero.
    /// Products not in the cart are ignored.
    pub fn remove_item(&mut self, item: &CartItem) -> Result<(), CartError> {
        let Some(index) = self
            .items
            .iter()
            .position(|existing| existing.product_id == item.product_id)
        else {
            return Ok(());
        };

        let remaining = self.items[index]
            .quantity
            .checked_sub(item.quantity)
            .ok_or(CartError::QuantityOverflow {
                product_id: item.product_id,
            })?;

        if remaining <= 0 {
            self.items.remove(index);
        } else {
            self.items[index].quantity = remaining;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_email(&self) -> bool {
        !self.email.is_empty()
    }
}

/// Payload of `ADD_TO_CART_CHANNEL`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AddToCartSignal {
    pub route: String,
    pub item: CartItem,
}

/// Payload of `REMOVE_FROM_CART_CHANNEL`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RemoveFromCartSignal {
    pub route: String,
    pub item: CartItem,
}

/// Payload of `UPDATE_EMAIL_CHANNEL`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UpdateEmailSignal {
    pub route: String,
    pub email: String,
}

/// Payload of `CHECKOUT_CHANNEL`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CheckoutSignal {
    pub route: String,
    pub email: String,
}
