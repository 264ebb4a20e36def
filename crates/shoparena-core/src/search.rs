//! Product search resolution
//!
//! Turns the optional query parameters of a product search into a single
//! [`ProductFilter`]. A named category is resolved to its id first; a name
//! that does not resolve aborts the search before the product relation is
//! touched.

use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::store::{CatalogStore, ProductFilter};
use crate::{ArenaError, Product, Result};

/// Raw search parameters as they arrive on the query string
///
/// Every field is optional. An empty string means "not supplied", and so
/// does a price of `0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub lower_price: String,
    pub upper_price: String,
    pub category: String,
    pub name: String,
}

impl SearchParams {
    pub fn new(
        lower_price: impl Into<String>,
        upper_price: impl Into<String>,
        category: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            lower_price: lower_price.into(),
            upper_price: upper_price.into(),
            category: category.into(),
            name: name.into(),
        }
    }
}

/// Parse a price bound; empty and zero both mean "no bound"
fn parse_price(field: &str, raw: &str) -> Result<Option<i64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let value: i64 = raw
        .parse()
        .map_err(|_| ArenaError::validation(field, format!("'{raw}' is not a whole number")))?;

    match value {
        0 => Ok(None),
        v if v < 0 => Err(ArenaError::validation(field, "must not be negative")),
        v => Ok(Some(v)),
    }
}

/// Resolves search parameters against the catalog
#[derive(Clone)]
pub struct SearchResolver {
    catalog: Arc<dyn CatalogStore>,
}

impl SearchResolver {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Build the product predicate, resolving the category name if one is given
    pub async fn resolve(&self, params: &SearchParams) -> Result<ProductFilter> {
        let min_price = parse_price("lower_price", &params.lower_price)?;
        let max_price = parse_price("upper_price", &params.upper_price)?;

        let category_id = if params.category.is_empty() {
            None
        } else {
            let category = self
                .catalog
                .find_category_by_name(&params.category)
                .await?
                .ok_or_else(|| ArenaError::NotFound(format!("Category '{}'", params.category)))?;
            Some(category.id)
        };

        Ok(ProductFilter {
            category_id,
            seller_id: None,
            min_price,
            max_price,
            title_contains: (!params.name.is_empty()).then(|| params.name.clone()),
        })
    }

    /// Run a product search
    pub async fn search(&self, params: &SearchParams) -> Result<Vec<Product>> {
        let filter = self.resolve(params).await?;
        debug!(?filter, "Searching products");
        self.catalog.query_products(&filter).await
    }

    /// Products listed by one seller
    pub async fn seller_products(&self, seller_id: i64) -> Result<Vec<Product>> {
        self.catalog
            .query_products(&ProductFilter {
                seller_id: Some(seller_id),
                ..Default::default()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use proptest::prelude::*;

    async fn electronics_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert_category(3, "Electronics").await;
        store.insert_category(7, "Books").await;
        store.insert_product(1, "Budget phone", 100, 3, 1).await;
        store.insert_product(2, "Flagship phone", 500, 3, 1).await;
        store.insert_product(3, "Phone repair guide", 100, 7, 2).await;
        store
    }

    fn ids(products: &[Product]) -> Vec<i64> {
        products.iter().map(|p| p.id).collect()
    }

    #[tokio::test]
    async fn test_lower_bound_within_category() {
        let store = electronics_store().await;
        let resolver = SearchResolver::new(store.clone());

        let found = resolver
            .search(&SearchParams::new("150", "", "Electronics", ""))
            .await
            .unwrap();

        assert_eq!(ids(&found), vec![2]);
        assert_eq!(found[0].price, 500);
        assert_eq!(found[0].category_id, 3);
    }

    #[tokio::test]
    async fn test_unknown_category_skips_product_query() {
        let store = electronics_store().await;
        let resolver = SearchResolver::new(store.clone());

        let err = resolver
            .search(&SearchParams::new("", "", "Garden", ""))
            .await
            .unwrap_err();

        assert!(matches!(err, ArenaError::NotFound(_)));
        assert_eq!(store.product_query_count(), 0);
    }

    #[tokio::test]
    async fn test_no_parameters_returns_every_product() {
        let store = electronics_store().await;
        let resolver = SearchResolver::new(store.clone());

        let found = resolver.search(&SearchParams::default()).await.unwrap();
        assert_eq!(ids(&found), vec![1, 2, 3]);
        assert_eq!(store.product_query_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_category_still_applies_other_filters() {
        let store = electronics_store().await;
        let resolver = SearchResolver::new(store);

        let found = resolver
            .search(&SearchParams::new("", "200", "", "phone"))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![1]);
    }

    #[tokio::test]
    async fn test_zero_price_is_unset() {
        let store = electronics_store().await;
        store.insert_product(4, "Free sample", 0, 3, 1).await;
        let resolver = SearchResolver::new(store);

        let zero_upper = resolver
            .search(&SearchParams::new("0", "0", "Electronics", ""))
            .await
            .unwrap();
        assert_eq!(ids(&zero_upper), vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn test_malformed_price_rejected_before_store() {
        let store = electronics_store().await;
        let resolver = SearchResolver::new(store.clone());

        let err = resolver
            .search(&SearchParams::new("cheap", "", "", ""))
            .await
            .unwrap_err();
        match err {
            ArenaError::Validation { field, .. } => assert_eq!(field, "lower_price"),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = resolver
            .search(&SearchParams::new("", "-5", "", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ArenaError::Validation { .. }));
        assert_eq!(store.product_query_count(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_surfaces() {
        let store = electronics_store().await;
        store.fail_product_queries(true);
        let resolver = SearchResolver::new(store);

        let err = resolver
            .search(&SearchParams::new("", "", "Electronics", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ArenaError::StoreFailure(_)));
    }

    #[tokio::test]
    async fn test_every_bound_combination_within_category() {
        let store = Arc::new(MemoryStore::new());
        store.insert_category(3, "Electronics").await;
        store.insert_category(7, "Books").await;
        let catalog = [
            (1, "usb cable", 50, 3),
            (2, "usb hub", 150, 3),
            (3, "monitor", 150, 3),
            (4, "usb charger", 300, 3),
            (5, "laptop", 900, 3),
            (6, "usb guide", 150, 7),
        ];
        for (id, title, price, category) in catalog {
            store.insert_product(id, title, price, category, 1).await;
        }
        let resolver = SearchResolver::new(store);

        let cases = [
            (("", "", ""), vec![1, 2, 3, 4, 5]),
            (("100", "", ""), vec![2, 3, 4, 5]),
            (("", "300", ""), vec![1, 2, 3, 4]),
            (("", "", "usb"), vec![1, 2, 4]),
            (("100", "300", ""), vec![2, 3, 4]),
            (("100", "", "usb"), vec![2, 4]),
            (("", "200", "usb"), vec![1, 2]),
            (("100", "200", "usb"), vec![2]),
        ];

        for ((lower, upper, name), expected) in cases {
            let found = resolver
                .search(&SearchParams::new(lower, upper, "Electronics", name))
                .await
                .unwrap();
            assert_eq!(
                ids(&found),
                expected,
                "lower={lower:?} upper={upper:?} name={name:?}"
            );
        }
    }

    fn product_strategy() -> impl Strategy<Value = (i64, String, i64)> {
        (
            1i64..=3,
            prop::sample::select(vec!["red mug", "blue mug", "red lamp", "desk", "lamp shade"]),
            0i64..1_000,
        )
            .prop_map(|(cat, title, price)| (cat, title.to_string(), price))
    }

    fn bound_strategy() -> impl Strategy<Value = String> {
        prop_oneof![Just(String::new()), (0i64..1_000).prop_map(|p| p.to_string())]
    }

    proptest! {
        #[test]
        fn prop_search_matches_conjunctive_oracle(
            products in prop::collection::vec(product_strategy(), 0..20),
            lower in bound_strategy(),
            upper in bound_strategy(),
            category in prop::sample::select(vec!["", "cat-1", "cat-2", "cat-3"]),
            name in prop::sample::select(vec!["", "red", "lamp", "mug", "zzz"]),
        ) {
            tokio_test::block_on(async {
                let store = Arc::new(MemoryStore::new());
                for id in 1..=3 {
                    store.insert_category(id, &format!("cat-{id}")).await;
                }
                for (i, (cat, title, price)) in products.iter().enumerate() {
                    store.insert_product(i as i64 + 1, title, *price, *cat, 1).await;
                }

                let resolver = SearchResolver::new(store);
                let found = resolver
                    .search(&SearchParams::new(lower.clone(), upper.clone(), category, name))
                    .await
                    .unwrap();

                let bound = |s: &str| s.parse::<i64>().ok().filter(|v| *v != 0);
                let lo = bound(&lower);
                let hi = bound(&upper);
                let cat_id = category.strip_prefix("cat-").and_then(|c| c.parse::<i64>().ok());
                let expected: Vec<i64> = products
                    .iter()
                    .enumerate()
                    .filter(|(_, (cat, title, price))| {
                        cat_id.map_or(true, |c| *cat == c)
                            && lo.map_or(true, |l| *price >= l)
                            && hi.map_or(true, |h| *price <= h)
                            && (name.is_empty() || title.contains(name))
                    })
                    .map(|(i, _)| i as i64 + 1)
                    .collect();

                assert_eq!(ids(&found), expected);
            });
        }
    }

    #[test]
    fn test_parse_price_rules() {
        assert_eq!(parse_price("lower_price", "").unwrap(), None);
        assert_eq!(parse_price("lower_price", "0").unwrap(), None);
        assert_eq!(parse_price("lower_price", " 42 ").unwrap(), Some(42));
        assert!(parse_price("upper_price", "4.5").is_err());
    }
}
