// Cart activities
// Decision: Activities are plain async methods; the worker crate adapts them to its handler type
// Decision: Credentials are passed through untouched; an empty key is sent as-is and the provider decides
//
// Activities:
// - CreateStripeCharge: prices the cart against the catalog and charges it through Stripe
// - SendAbandonedCartEmail: reminds the shopper through Mailgun (no-op without an address)

use reqwest::Client;
use tracing::{info, warn};

use crate::cart::CartState;
use crate::error::{ActivityError, Result};
use crate::products::find_product;

const STRIPE_API_BASE: &str = "https://api.stripe.com";
const MAILGUN_API_BASE: &str = "https://api.mailgun.net";

const ABANDONED_CART_SUBJECT: &str = "You've abandoned your shopping cart!";
const ABANDONED_CART_TEXT: &str = "Did you mean to purchase the items in your cart?";

/// Constants for activity names (used for registration and invocation)
pub mod activity_names {
    pub const CREATE_STRIPE_CHARGE: &str = "CreateStripeCharge";
    pub const SEND_ABANDONED_CART_EMAIL: &str = "SendAbandonedCartEmail";
}

/// Amount and description of a charge, computed from a cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeSummary {
    /// Total in US cents
    pub amount_cents: i64,
    /// Product names joined with ", "
    pub description: String,
}

impl ChargeSummary {
    /// Price a cart against the catalog. Unknown products contribute nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ActivityError::InvalidAmount`] if the total overflows.
    pub fn for_cart(cart: &CartState) -> Result<Self> {
        let mut amount_cents: i64 = 0;
        let mut names = Vec::with_capacity(cart.items.len());

        for item in &cart.items {
            let Some(product) = find_product(item.product_id) else {
                warn!(product_id = item.product_id, "Unknown product in cart");
                continue;
            };
            amount_cents = item
                .quantity
                .checked_mul(product.price_cents)
                .and_then(|line| amount_cents.checked_add(line))
                .ok_or(ActivityError::InvalidAmount {
                    product_id: item.product_id,
                })?;
            names.push(product.name);
        }

        Ok(Self {
            amount_cents,
            description: names.join(", "),
        })
    }
}

/// Side-effecting cart activities and the credentials they need
#[derive(Clone)]
pub struct Activities {
    stripe_key: String,
    mailgun_domain: String,
    mailgun_key: String,
    stripe_api_base: String,
    mailgun_api_base: String,
    client: Client,
}

impl Activities {
    pub fn new(
        stripe_key: impl Into<String>,
        mailgun_domain: impl Into<String>,
        mailgun_key: impl Into<String>,
    ) -> Self {
        Self {
            stripe_key: stripe_key.into(),
            mailgun_domain: mailgun_domain.into(),
            mailgun_key: mailgun_key.into(),
            stripe_api_base: STRIPE_API_BASE.to_string(),
            mailgun_api_base: MAILGUN_API_BASE.to_string(),
            client: Client::new(),
        }
    }

    /// Point Stripe calls at a different base URL
    pub fn with_stripe_api_base(mut self, base: impl Into<String>) -> Self {
        self.stripe_api_base = base.into();
        self
    }

    /// Point Mailgun calls at a different base URL
    pub fn with_mailgun_api_base(mut self, base: impl Into<String>) -> Self {
        self.mailgun_api_base = base.into();
        self
    }

    /// Charge the cart total to the shopper's card
    pub async fn create_stripe_charge(&self, cart: CartState) -> Result<()> {
        let summary = ChargeSummary::for_cart(&cart)?;

        info!(
            amount_cents = summary.amount_cents,
            items = cart.items.len(),
            "Creating Stripe charge"
        );

        let url = format!("{}/v1/charges", self.stripe_api_base.trim_end_matches('/'));
        let amount = summary.amount_cents.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", "usd"),
            ("description", summary.description.as_str()),
            ("source", "tok_visa"),
            ("receipt_email", cart.email.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.stripe_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Stripe rejected charge");
            return Err(ActivityError::Stripe {
                status: status.as_u16(),
                body,
            });
        }

        info!(amount_cents = summary.amount_cents, "Stripe charge created");
        Ok(())
    }

    /// Remind the shopper about their cart. An empty address is a no-op.
    pub async fn send_abandoned_cart_email(&self, email: String) -> Result<()> {
        if email.is_empty() {
            info!("No email on cart, skipping abandoned cart email");
            return Ok(());
        }

        info!(email = %email, "Sending abandoned cart email");

        let url = format!(
            "{}/v3/{}/messages",
            self.mailgun_api_base.trim_end_matches('/'),
            self.mailgun_domain
        );
        let from = format!("noreply@{}", self.mailgun_domain);
        let form = [
            ("from", from.as_str()),
            ("to", email.as_str()),
            ("subject", ABANDONED_CART_SUBJECT),
            ("text", ABANDONED_CART_TEXT),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.mailgun_key))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Mailgun rejected message");
            return Err(ActivityError::Mailgun {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for Activities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activities")
            .field("stripe_key", &"<redacted>")
            .field("mailgun_domain", &self.mailgun_domain)
            .field("mailgun_key", &"<redacted>")
            .field("stripe_api_base", &self.stripe_api_base)
            .field("mailgun_api_base", &self.mailgun_api_base)
            .finish()
    }
}
