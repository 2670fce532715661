// Product catalog
//
// A fixed catalog is enough for pricing a cart; prices are stored in cents so
// charge amounts never go through floating point.

/// A product that can be put in a cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: i64,
    /// Shown in the charge description
    pub name: &'static str,
    /// Unit price in US cents
    pub price_cents: i64,
}

/// All products on sale
pub const PRODUCTS: &[Product] = &[
    Product {
        id: 0,
        name: "iPhone 12 Pro",
        price_cents: 99_900,
    },
    Product {
        id: 1,
        name: "iPhone 12",
        price_cents: 69_900,
    },
    Product {
        id: 2,
        name: "iPhone SE",
        price_cents: 39_900,
    },
    Product {
        id: 3,
        name: "iPhone 11",
        price_cents: 59_900,
    },
];

/// Look up a product by id
pub fn find_product(id: i64) -> Option<&'static Product> {
    PRODUCTS.iter().find(|p| p.id == id)
}
