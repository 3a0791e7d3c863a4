//! Storefront tools offered to the reasoning collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::catalog::{Catalog, Order, Product, ProductQuery};
use crate::tools::SchemaTool;
use crate::types::{ToolClass, ToolError};

const RECOMMENDATION_LIMIT: usize = 5;

/// Product as shown to the customer.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: Decimal,
    pub in_stock: bool,
    pub quantity: u32,
    pub image_url: Option<String>,
}

impl From<Product> for ProductView {
    fn from(p: Product) -> Self {
        Self {
            in_stock: p.quantity > 0,
            name: p.name,
            category: p.category,
            description: p.description,
            price: p.price,
            quantity: p.quantity,
            image_url: p.image_url,
        }
    }
}

fn price_arg(name: &str, value: Option<f64>) -> Result<Option<Decimal>, ToolError> {
    value
        .map(|v| {
            Decimal::try_from(v)
                .map_err(|e| ToolError::invalid_input(format!("{} is not a valid price: {}", name, e)))
        })
        .transpose()
}

// ============================================================================
// Safe tools
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoInput {}

pub struct GetAvailableCategories {
    catalog: Arc<Catalog>,
}

impl GetAvailableCategories {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SchemaTool for GetAvailableCategories {
    type Input = NoInput;
    type Output = Vec<String>;
    const NAME: &'static str = "get_available_categories";
    const DESCRIPTION: &'static str = "List all product categories sold in the store.";

    async fn handle(&self, _input: NoInput) -> Result<Vec<String>, ToolError> {
        Ok(self.catalog.categories().await)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchProductsInput {
    /// Words to match against product names and descriptions.
    pub query: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

pub struct SearchProducts {
    catalog: Arc<Catalog>,
}

impl SearchProducts {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SchemaTool for SearchProducts {
    type Input = SearchProductsInput;
    type Output = Vec<ProductView>;
    const NAME: &'static str = "search_products";
    const DESCRIPTION: &'static str =
        "Search products by text, category and price range. Returns price, stock and image_url.";

    async fn handle(&self, input: SearchProductsInput) -> Result<Vec<ProductView>, ToolError> {
        let query = ProductQuery {
            text: input.query.filter(|q| !q.trim().is_empty()),
            category: input.category,
            min_price: price_arg("min_price", input.min_price)?,
            max_price: price_arg("max_price", input.max_price)?,
        };
        let products = self.catalog.search(&query).await;
        Ok(products.into_iter().map(ProductView::from).collect())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RecommendationsInput {
    pub customer_id: String,
}

pub struct SearchProductsRecommendations {
    catalog: Arc<Catalog>,
}

impl SearchProductsRecommendations {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SchemaTool for SearchProductsRecommendations {
    type Input = RecommendationsInput;
    type Output = Vec<ProductView>;
    const NAME: &'static str = "search_products_recommendations";
    const DESCRIPTION: &'static str =
        "Recommend in-stock products based on the customer's past purchases.";

    async fn handle(&self, input: RecommendationsInput) -> Result<Vec<ProductView>, ToolError> {
        let picks = self
            .catalog
            .recommendations(&input.customer_id, RECOMMENDATION_LIMIT)
            .await;
        Ok(picks.into_iter().map(ProductView::from).collect())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OrderStatusInput {
    pub order_id: u64,
}

pub struct CheckOrderStatus {
    catalog: Arc<Catalog>,
}

impl CheckOrderStatus {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SchemaTool for CheckOrderStatus {
    type Input = OrderStatusInput;
    type Output = Order;
    const NAME: &'static str = "check_order_status";
    const DESCRIPTION: &'static str =
        "Look up an order by id and return its status, date, products and total.";

    async fn handle(&self, input: OrderStatusInput) -> Result<Order, ToolError> {
        self.catalog
            .order(input.order_id)
            .await
            .ok_or_else(|| ToolError::not_found(format!("order {}", input.order_id)))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HumanRepresentativeInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub customer_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HumanRepresentativeOutput {
    pub request_id: u64,
    pub message: String,
}

fn validate_contact(input: &HumanRepresentativeInput) -> Result<(), ToolError> {
    if input.name.trim().is_empty() {
        return Err(ToolError::invalid_input("name must not be empty"));
    }
    let email = input.email.trim();
    let valid_email = email
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
    if !valid_email {
        return Err(ToolError::invalid_input(format!(
            "'{}' is not a valid email address",
            input.email
        )));
    }
    let digits = input.phone.chars().filter(char::is_ascii_digit).count();
    if !(7..=15).contains(&digits) {
        return Err(ToolError::invalid_input(format!(
            "'{}' is not a valid phone number",
            input.phone
        )));
    }
    Ok(())
}

pub struct RequestHumanRepresentative {
    catalog: Arc<Catalog>,
}

impl RequestHumanRepresentative {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SchemaTool for RequestHumanRepresentative {
    type Input = HumanRepresentativeInput;
    type Output = HumanRepresentativeOutput;
    const NAME: &'static str = "request_human_representative";
    const DESCRIPTION: &'static str =
        "Record the customer's name, email and phone so a human representative can call back.";

    async fn handle(
        &self,
        input: HumanRepresentativeInput,
    ) -> Result<HumanRepresentativeOutput, ToolError> {
        validate_contact(&input)?;
        let request = self
            .catalog
            .record_contact(
                input.customer_id,
                input.name.trim().to_string(),
                input.email.trim().to_string(),
                input.phone.trim().to_string(),
            )
            .await;
        Ok(HumanRepresentativeOutput {
            request_id: request.id,
            message: format!(
                "A representative will contact {} shortly.",
                request.name
            ),
        })
    }
}

// ============================================================================
// Sensitive tools
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OrderItemInput {
    pub product_name: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateOrderInput {
    pub customer_id: String,
    pub items: Vec<OrderItemInput>,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderOutput {
    pub order_id: u64,
    pub status: String,
    pub total: Decimal,
}

pub struct CreateOrder {
    catalog: Arc<Catalog>,
}

impl CreateOrder {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SchemaTool for CreateOrder {
    type Input = CreateOrderInput;
    type Output = CreateOrderOutput;
    const NAME: &'static str = "create_order";
    const DESCRIPTION: &'static str =
        "Place an order for the customer. Requires explicit approval before it runs.";
    const CLASS: ToolClass = ToolClass::Sensitive;

    async fn handle(&self, input: CreateOrderInput) -> Result<CreateOrderOutput, ToolError> {
        let items: Vec<(String, u32)> = input
            .items
            .into_iter()
            .map(|i| (i.product_name, i.quantity))
            .collect();
        let order = self.catalog.place_order(&input.customer_id, &items).await?;
        tracing::info!(
            order_id = order.id,
            customer_id = %order.customer_id,
            total = %order.total,
            "Order placed"
        );
        Ok(CreateOrderOutput {
            order_id: order.id,
            status: format!("{:?}", order.status),
            total: order.total,
        })
    }
}
