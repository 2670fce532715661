// Error types for cart state and activities

use thiserror::Error;

/// Result type alias for activity operations
pub type Result<T> = std::result::Result<T, ActivityError>;

/// Errors that can occur while running a cart activity
#[derive(Debug, Error)]
pub enum ActivityError {
    /// Stripe rejected the charge
    #[error("Stripe charge failed with status {status}: {body}")]
    Stripe { status: u16, body: String },

    /// Mailgun rejected the message
    #[error("Mailgun send failed with status {status}: {body}")]
    Mailgun { status: u16, body: String },

    /// Transport-level failure talking to a provider
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The cart total does not fit in a charge amount
    #[error("cart total overflows at product {product_id}")]
    InvalidAmount { product_id: i64 },
}

/// Cart mutations that cannot be applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The resulting line quantity does not fit in an i64
    #[error("quantity for product {product_id} out of range")]
    QuantityOverflow { product_id: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stripe_error_display() {
        let err = ActivityError::Stripe {
            status: 402,
            body: "card_declined".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Stripe charge failed with status 402: card_declined"
        );
    }

    #[test]
    fn test_mailgun_error_display() {
        let err = ActivityError::Mailgun {
            status: 401,
            body: "Forbidden".to_string(),
        };
        assert!(err.to_string().contains("Mailgun"));
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_invalid_amount_display() {
        let err = ActivityError::InvalidAmount { product_id: 0 };
        assert_eq!(err.to_string(), "cart total overflows at product 0");
    }

    #[test]
    fn test_quantity_overflow_display() {
        let err = CartError::QuantityOverflow { product_id: 3 };
        assert_eq!(err.to_string(), "quantity for product 3 out of range");
    }
}
