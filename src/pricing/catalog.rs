use parking_lot::RwLock;
use std::collections::HashMap;

use crate::errors::{Result, SettlementError};
use crate::pricing::Product;

/// read access to product definitions held by product administration
pub trait ProductCatalog: Send + Sync {
    /// `Ok(None)` when the code is unknown; `Err` when the store is unreachable
    fn find_product(&self, code: &str) -> Result<Option<Product>>;

    fn product(&self, code: &str) -> Result<Product> {
        self.find_product(code)?.ok_or_else(|| SettlementError::ProductNotFound {
            code: code.to_string(),
        })
    }
}

/// product catalog held in memory, loadable from JSON
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<HashMap<String, Product>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Result<Self> {
        let catalog = Self::new();
        for product in products {
            catalog.upsert(product)?;
        }
        Ok(catalog)
    }

    /// load a JSON array of products
    pub fn from_json_str(json: &str) -> Result<Self> {
        let products: Vec<Product> =
            serde_json::from_str(json).map_err(|e| SettlementError::InvalidConfiguration {
                message: format!("product catalog: {}", e),
            })?;
        Self::with_products(products)
    }

    /// insert or replace a product after validation
    pub fn upsert(&self, product: Product) -> Result<()> {
        product.validate()?;
        self.products.write().insert(product.code.clone(), product);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.read().is_empty()
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn find_product(&self, code: &str) -> Result<Option<Product>> {
        Ok(self.products.read().get(code).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::fixtures::standard_product;

    #[test]
    fn test_lookup() {
        let catalog = InMemoryProductCatalog::with_products(vec![standard_product()]).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.product("FD-STD").unwrap().code, "FD-STD");

        let err = catalog.product("FD-NONE").unwrap_err();
        assert_eq!(err, SettlementError::ProductNotFound { code: "FD-NONE".to_string() });
    }

    #[test]
    fn test_invalid_product_rejected() {
        let catalog = InMemoryProductCatalog::new();
        let mut product = standard_product();
        product.min_term_months = 0;
        assert!(catalog.upsert(product).is_err());
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_from_json_round() {
        let json = serde_json::to_string(&vec![standard_product()]).unwrap();
        let catalog = InMemoryProductCatalog::from_json_str(&json).unwrap();
        assert_eq!(catalog.product("FD-STD").unwrap(), standard_product());

        assert!(InMemoryProductCatalog::from_json_str("{").is_err());
    }
}
