//! Product Catalog
//!
//! Static product definitions. Every product lookup in the store goes through
//! [`Catalog::resolve`], which folds legacy aliases onto one canonical id.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Canonical product identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an id that is already canonical (rows read back from storage)
    pub fn from_canonical(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a product is delivered digitally or shipped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    Digital,
    Physical,
}

/// How a purchased product is fulfilled
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fulfillment {
    /// Storage path of the downloadable file
    Download { path: String },
    /// Booking flow the buyer is sent to after payment
    Booking { flow: String },
}

/// A catalog product
#[derive(Clone, Debug, Serialize)]
pub struct Product {
    /// Canonical id
    pub id: ProductId,

    /// Display name
    pub name: String,

    /// Short description shown at checkout
    pub description: String,

    /// Price in USD
    pub price: Decimal,

    /// Digital or physical
    pub kind: ProductKind,

    /// Fulfillment reference
    pub fulfillment: Fulfillment,

    /// Legacy identifiers that resolve to this product
    #[serde(skip)]
    pub aliases: &'static [&'static str],
}

impl Product {
    /// Price in minor currency units (cents)
    pub fn price_cents(&self) -> i64 {
        to_cents(self.price)
    }
}

/// Convert a USD amount to cents, rounding half away from zero
pub fn to_cents(amount: Decimal) -> i64 {
    (amount * dec!(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(i64::MAX)
}

/// The static product catalog
#[derive(Clone, Debug)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl Catalog {
    /// Build a catalog from explicit products
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// The store's product line
    pub fn standard() -> Self {
        Self::new(vec![
            Product {
                id: ProductId::from_canonical("ebook"),
                name: "AI Tools Mastery Guide 2025".into(),
                description: "30-page guide to the AI tools worth using this year".into(),
                price: dec!(15.00),
                kind: ProductKind::Digital,
                fulfillment: Fulfillment::Download {
                    path: "downloads/ai-tools-mastery-guide-2025.pdf".into(),
                },
                aliases: &["1", "ai-tools-mastery-guide", "ai-tools-mastery-guide-2025"],
            },
            Product {
                id: ProductId::from_canonical("prompts"),
                name: "AI Prompts Arsenal 2025".into(),
                description: "30 battle-tested prompts for content and code".into(),
                price: dec!(10.00),
                kind: ProductKind::Digital,
                fulfillment: Fulfillment::Download {
                    path: "downloads/ai-prompts-arsenal-2025.pdf".into(),
                },
                aliases: &["2", "ai-prompts", "ai-prompts-arsenal-2025"],
            },
            Product {
                id: ProductId::from_canonical("video-course"),
                name: "AI Web Creation Masterclass".into(),
                description: "Video course: ship a site with AI assistance".into(),
                price: dec!(50.00),
                kind: ProductKind::Digital,
                fulfillment: Fulfillment::Download {
                    path: "videos/ai-web-creation-masterclass".into(),
                },
                aliases: &["3", "masterclass", "ai-web-creation-masterclass"],
            },
            Product {
                id: ProductId::from_canonical("coaching"),
                name: "1-on-1 AI Coaching Session".into(),
                description: "Weekly support session with a Ventaro coach".into(),
                price: dec!(300.00),
                kind: ProductKind::Digital,
                fulfillment: Fulfillment::Booking {
                    flow: "coaching-booking".into(),
                },
                aliases: &["4", "support-package", "weekly-support-contract-2025"],
            },
        ])
    }

    /// Resolve an id or alias to its product
    pub fn resolve(&self, reference: &str) -> Result<&Product> {
        let needle = reference.trim().to_lowercase();
        self.products
            .iter()
            .find(|p| p.id.as_str() == needle || p.aliases.iter().any(|a| *a == needle))
            .ok_or_else(|| StoreError::InvalidProduct(reference.to_string()))
    }

    /// Look up by canonical id
    pub fn get(&self, id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|p| &p.id == id)
    }

    /// All products
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// All canonical ids
    pub fn ids(&self) -> impl Iterator<Item = &ProductId> {
        self.products.iter().map(|p| &p.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_aliases() {
        let catalog = Catalog::standard();
        for alias in ["ebook", "1", "AI-Tools-Mastery-Guide-2025", " ebook "] {
            assert_eq!(catalog.resolve(alias).unwrap().id.as_str(), "ebook");
        }
        assert_eq!(catalog.resolve("support-package").unwrap().id.as_str(), "coaching");
    }

    #[test]
    fn test_unknown_product() {
        let catalog = Catalog::standard();
        assert!(matches!(
            catalog.resolve("nope"),
            Err(StoreError::InvalidProduct(_))
        ));
    }

    #[test]
    fn test_price_cents() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.resolve("ebook").unwrap().price_cents(), 1500);
        assert_eq!(to_cents(dec!(19.995)), 2000);
        assert_eq!(to_cents(dec!(0.125)), 13);
    }

    #[test]
    fn test_aliases_are_unique() {
        let catalog = Catalog::standard();
        let mut seen = std::collections::HashSet::new();
        for product in catalog.products() {
            assert!(seen.insert(product.id.as_str().to_string()));
            for alias in product.aliases {
                assert!(seen.insert((*alias).to_string()), "duplicate alias {alias}");
            }
        }
    }
}
