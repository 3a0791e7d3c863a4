//! Demo storefront: catalog data and the tools that operate on it.

mod catalog;
mod tools;

pub use catalog::{
    Catalog, ContactRequest, Order, OrderLine, OrderStatus, Product, ProductQuery,
};
pub use tools::{
    CheckOrderStatus, CreateOrder, GetAvailableCategories, ProductView, RequestHumanRepresentative,
    SearchProducts, SearchProductsRecommendations,
};

use std::sync::Arc;

use crate::tools::{RegistryError, ToolRegistry};

/// Standard storefront registry: five safe tools and the sensitive `create_order`.
pub fn registry(catalog: Arc<Catalog>) -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::builder()
        .tool(GetAvailableCategories::new(catalog.clone()))
        .tool(SearchProducts::new(catalog.clone()))
        .tool(SearchProductsRecommendations::new(catalog.clone()))
        .tool(CheckOrderStatus::new(catalog.clone()))
        .tool(RequestHumanRepresentative::new(catalog.clone()))
        .tool(CreateOrder::new(catalog))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolClass;

    #[test]
    fn test_registry_classification() {
        let registry = registry(Arc::new(Catalog::demo())).unwrap();
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.names_in(ToolClass::Sensitive), vec!["create_order"]);
        assert_eq!(
            registry.class_of("check_order_status"),
            Some(ToolClass::Safe)
        );
    }
}
