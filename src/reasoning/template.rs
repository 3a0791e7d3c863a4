//! System instructions for the reasoning collaborator.

use chrono::{DateTime, Utc};

use crate::conversation::CustomerId;

/// Storefront instructions; `{customer}` and `{time}` are filled per call.
pub const DEFAULT_INSTRUCTIONS: &str = "\
You are the virtual sales assistant of an online electronics store. Help customers \
find products, place orders and follow up on existing orders.

Use the tools you are given:
- get_available_categories to show what the store sells
- search_products and search_products_recommendations to find and suggest items; \
show each product's image with Markdown image syntax using its image_url
- check_order_status when the customer asks about an order; ask for the order id if it is missing
- request_human_representative after collecting the customer's full name, email and phone, one at a time
- create_order to place an order; confirm products, quantities and the total first

Returns are accepted within 30 days in original condition with proof of purchase. \
Clearance, perishable, opened personal care and custom items cannot be returned. \
Refunds go back to the original form of payment.

Be friendly and concise, ask clarifying questions when needed and offer alternatives \
when an item is unavailable. If a tool call is denied, respect the customer's reason \
and keep helping.

Current customer id: {customer}
Current time: {time}";

#[derive(Debug, Clone)]
pub struct InstructionTemplate {
    text: String,
}

impl InstructionTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn render(&self, customer: &CustomerId) -> String {
        self.render_at(customer, Utc::now())
    }

    pub fn render_at(&self, customer: &CustomerId, now: DateTime<Utc>) -> String {
        self.text
            .replace("{customer}", customer.as_str())
            .replace("{time}", &now.format("%Y-%m-%d %H:%M:%S UTC").to_string())
    }
}

impl Default for InstructionTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_render_substitutes_placeholders() {
        let template = InstructionTemplate::new("user={customer} at {time}");
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(
            template.render_at(&"42".into(), now),
            "user=42 at 2025-03-01 09:30:00 UTC"
        );
    }

    #[test]
    fn test_default_mentions_every_tool() {
        let text = InstructionTemplate::default().render(&CustomerId::default());
        for tool in [
            "get_available_categories",
            "search_products",
            "search_products_recommendations",
            "check_order_status",
            "request_human_representative",
            "create_order",
        ] {
            assert!(text.contains(tool), "missing {}", tool);
        }
        assert!(text.contains("123456789"));
        assert!(!text.contains("{time}"));
    }
}
