//! In-memory product catalog and order book.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::types::ToolError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: Decimal,
    pub quantity: u32,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: u64,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub customer_id: String,
    pub lines: Vec<OrderLine>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub id: u64,
    pub customer_id: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

/// Filter for [`Catalog::search`]; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub text: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

#[derive(Debug, Default)]
struct Inner {
    products: Vec<Product>,
    orders: Vec<Order>,
    contacts: Vec<ContactRequest>,
}

/// Shared storefront data behind the shop tools.
#[derive(Debug, Default)]
pub struct Catalog {
    inner: RwLock<Inner>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                products,
                ..Default::default()
            }),
        }
    }

    /// Small seeded catalog used by demos and tests.
    pub fn demo() -> Self {
        let product = |id, name: &str, category: &str, description: &str, price, quantity| Product {
            id,
            name: name.to_string(),
            category: category.to_string(),
            description: description.to_string(),
            price,
            quantity,
            image_url: Some(format!("https://images.example.com/products/{}.jpg", id)),
        };
        Self::new(vec![
            product(1, "Dell XPS 13", "Laptops", "13-inch ultrabook, 16GB RAM", dec!(1199.99), 8),
            product(2, "MacBook Air M3", "Laptops", "Fanless 13-inch laptop", dec!(1099.00), 5),
            product(3, "Sony WH-1000XM5", "Audio", "Noise cancelling headphones", dec!(349.99), 20),
            product(4, "AirPods Pro", "Audio", "In-ear wireless earbuds", dec!(249.00), 0),
            product(5, "Logitech MX Master 3S", "Accessories", "Wireless mouse", dec!(99.99), 40),
            product(6, "USB-C Dock", "Accessories", "Dual display docking station", dec!(189.50), 12),
            product(7, "Kindle Paperwhite", "E-readers", "6.8-inch e-ink reader", dec!(149.99), 15),
        ])
    }

    pub async fn categories(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .products
            .iter()
            .map(|p| p.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub async fn search(&self, query: &ProductQuery) -> Vec<Product> {
        let text = query.text.as_deref().map(str::to_lowercase);
        let category = query.category.as_deref().map(str::to_lowercase);
        let inner = self.inner.read().await;
        inner
            .products
            .iter()
            .filter(|p| {
                text.as_deref().is_none_or(|t| {
                    p.name.to_lowercase().contains(t) || p.description.to_lowercase().contains(t)
                })
            })
            .filter(|p| {
                category
                    .as_deref()
                    .is_none_or(|c| p.category.to_lowercase() == c)
            })
            .filter(|p| query.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| query.max_price.is_none_or(|max| p.price <= max))
            .cloned()
            .collect()
    }

    /// In-stock products from categories the customer has ordered before,
    /// excluding what they already bought. Falls back to any in-stock product.
    pub async fn recommendations(&self, customer_id: &str, limit: usize) -> Vec<Product> {
        let inner = self.inner.read().await;
        let past: Vec<&Order> = inner
            .orders
            .iter()
            .filter(|o| o.customer_id == customer_id)
            .collect();
        let bought: BTreeSet<u64> = past
            .iter()
            .flat_map(|o| o.lines.iter().map(|l| l.product_id))
            .collect();
        let categories: BTreeSet<&str> = inner
            .products
            .iter()
            .filter(|p| bought.contains(&p.id))
            .map(|p| p.category.as_str())
            .collect();

        let in_stock = inner
            .products
            .iter()
            .filter(|p| p.quantity > 0 && !bought.contains(&p.id));
        let mut picks: Vec<Product> = in_stock
            .clone()
            .filter(|p| categories.contains(p.category.as_str()))
            .take(limit)
            .cloned()
            .collect();
        if picks.is_empty() {
            picks = in_stock.take(limit).cloned().collect();
        }
        picks
    }

    pub async fn order(&self, order_id: u64) -> Option<Order> {
        let inner = self.inner.read().await;
        inner.orders.iter().find(|o| o.id == order_id).cloned()
    }

    pub async fn orders_for(&self, customer_id: &str) -> Vec<Order> {
        let inner = self.inner.read().await;
        inner
            .orders
            .iter()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect()
    }

    pub async fn product_quantity(&self, name: &str) -> Option<u32> {
        let inner = self.inner.read().await;
        inner
            .products
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.quantity)
    }

    /// Places an order after checking every line; stock is only touched when all lines fit.
    pub async fn place_order(
        &self,
        customer_id: &str,
        items: &[(String, u32)],
    ) -> Result<Order, ToolError> {
        if items.is_empty() {
            return Err(ToolError::invalid_input("an order needs at least one item"));
        }

        let mut inner = self.inner.write().await;
        let mut lines = Vec::with_capacity(items.len());
        // Units already claimed by earlier lines of this order, per product.
        let mut claimed: HashMap<u64, u32> = HashMap::new();
        for (name, quantity) in items {
            if *quantity == 0 {
                return Err(ToolError::invalid_input(format!(
                    "quantity for '{}' must be at least 1",
                    name
                )));
            }
            let product = inner
                .products
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| ToolError::not_found(format!("product '{}'", name)))?;
            let wanted = claimed
                .get(&product.id)
                .copied()
                .unwrap_or(0)
                .checked_add(*quantity)
                .ok_or_else(|| ToolError::invalid_input("order quantity is too large"))?;
            if product.quantity < wanted {
                return Err(ToolError::unavailable(format!(
                    "only {} of '{}' in stock, {} requested",
                    product.quantity, product.name, wanted
                )));
            }
            claimed.insert(product.id, wanted);
            lines.push(OrderLine {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: *quantity,
                unit_price: product.price,
            });
        }

        for product in inner.products.iter_mut() {
            if let Some(&wanted) = claimed.get(&product.id) {
                product.quantity = product.quantity.checked_sub(wanted).ok_or_else(|| {
                    ToolError::execution_failed(format!("stock for '{}' went negative", product.name))
                })?;
            }
        }

        let total = lines
            .iter()
            .map(|l| l.unit_price * Decimal::from(l.quantity))
            .sum();
        let order = Order {
            id: inner.orders.len() as u64 + 1,
            customer_id: customer_id.to_string(),
            lines,
            total,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        inner.orders.push(order.clone());
        Ok(order)
    }

    pub async fn record_contact(
        &self,
        customer_id: Option<String>,
        name: String,
        email: String,
        phone: String,
    ) -> ContactRequest {
        let mut inner = self.inner.write().await;
        let request = ContactRequest {
            id: inner.contacts.len() as u64 + 1,
            customer_id,
            name,
            email,
            phone,
            created_at: Utc::now(),
        };
        inner.contacts.push(request.clone());
        request
    }

    pub async fn contacts(&self) -> Vec<ContactRequest> {
        self.inner.read().await.contacts.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_categories_sorted_unique() {
        let catalog = Catalog::demo();
        assert_eq!(
            catalog.categories().await,
            vec!["Accessories", "Audio", "E-readers", "Laptops"]
        );
    }

    #[tokio::test]
    async fn test_search_filters() {
        let catalog = Catalog::demo();
        let laptops = catalog
            .search(&ProductQuery {
                category: Some("laptops".into()),
                max_price: Some(dec!(1150)),
                ..Default::default()
            })
            .await;
        assert_eq!(laptops.len(), 1);
        assert_eq!(laptops[0].name, "MacBook Air M3");

        let xps = catalog
            .search(&ProductQuery {
                text: Some("xps".into()),
                ..Default::default()
            })
            .await;
        assert_eq!(xps[0].id, 1);
    }

    #[tokio::test]
    async fn test_place_order_updates_stock() {
        let catalog = Catalog::demo();
        let order = catalog
            .place_order("123456789", &[("dell xps 13".into(), 2), ("USB-C Dock".into(), 1)])
            .await
            .unwrap();

        assert_eq!(order.id, 1);
        assert_eq!(order.total, dec!(2589.48));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(catalog.product_quantity("Dell XPS 13").await, Some(6));
        assert_eq!(catalog.order(1).await, Some(order));
    }

    #[tokio::test]
    async fn test_place_order_is_all_or_nothing() {
        let catalog = Catalog::demo();
        let err = catalog
            .place_order("1", &[("Dell XPS 13".into(), 1), ("AirPods Pro".into(), 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Unavailable { .. }));
        assert_eq!(catalog.product_quantity("Dell XPS 13").await, Some(8));
        assert!(catalog.orders_for("1").await.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_product_lines_share_stock() {
        let catalog = Catalog::demo();
        let err = catalog
            .place_order("123456789", &[("Dell XPS 13".into(), 5), ("dell xps 13".into(), 5)])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Unavailable { ref message } if message.contains("10 requested")));
        assert_eq!(catalog.product_quantity("Dell XPS 13").await, Some(8));

        let order = catalog
            .place_order("123456789", &[("Dell XPS 13".into(), 5), ("Dell XPS 13".into(), 3)])
            .await
            .unwrap();
        assert_eq!(order.lines.len(), 2);
        assert_eq!(catalog.product_quantity("Dell XPS 13").await, Some(0));
    }

    #[tokio::test]
    async fn test_recommendations_follow_past_categories() {
        let catalog = Catalog::demo();
        catalog
            .place_order("c1", &[("Sony WH-1000XM5".into(), 1)])
            .await
            .unwrap();

        // AirPods are out of stock, so no other audio product is left.
        let picks = catalog.recommendations("c1", 3).await;
        assert!(picks.iter().all(|p| p.name != "Sony WH-1000XM5"));
        assert!(!picks.is_empty());

        let fresh = catalog.recommendations("nobody", 2).await;
        assert_eq!(fresh.len(), 2);
        assert!(fresh.iter().all(|p| p.quantity > 0));
    }
}
