// Cart Domain
//
// This crate provides the engine-agnostic half of the checkout worker:
// the cart state a workflow accumulates from signals, the product catalog
// used to price it, and the side-effecting activities (payment charge and
// abandoned-cart email).
//
// Key design decisions:
// - No orchestration types leak in here; the worker crate adapts these to Temporal
// - Signal payloads keep the PascalCase field names used on the wire
// - Activities hold their credentials and an HTTP client, and are cheap to clone

pub mod activities;
pub mod cart;
pub mod error;
pub mod products;

pub use activities::{activity_names, Activities, ChargeSummary};
pub use cart::{
    signal_names, AddToCartSignal, CartItem, CartState, CheckoutSignal, RemoveFromCartSignal,
    UpdateEmailSignal,
};
pub use error::{ActivityError, CartError, Result};
pub use products::{find_product, Product, PRODUCTS};
