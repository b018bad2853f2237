//! Demo catalog backed by a deliberately slow lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lookup latency of the demo catalog.
pub const DEFAULT_LOOKUP_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Price in cents.
    pub price_cents: u64,
}

impl ProductDetails {
    fn new(id: &str, name: &str, description: &str, price_cents: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            price_cents,
        }
    }
}

/// In-memory product table whose lookups block for `delay`.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Arc<HashMap<String, ProductDetails>>,
    delay: Duration,
}

impl Catalog {
    pub fn demo() -> Self {
        let products = [
            ProductDetails::new("keyboard", "Compact Keyboard", "60% mechanical keyboard", 14_999),
            ProductDetails::new("mouse", "Wireless Mouse", "Silent productivity mouse", 7_999),
            ProductDetails::new("monitor", "27\" Monitor", "1440p IPS panel", 42_900),
            ProductDetails::new("dock", "USB-C Dock", "Power delivery docking station", 18_950),
        ]
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();

        Self {
            products: Arc::new(products),
            delay: DEFAULT_LOOKUP_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Blocking lookup; sleeps for the configured delay first.
    pub fn find(&self, product_id: &str) -> Option<ProductDetails> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.products.get(product_id).cloned()
    }
}
