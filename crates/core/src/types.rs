use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::form::{FormData, FormReader, ValidationError};
use crate::money::Money;
use crate::schema::{EntityKind, FieldValue, Resource};

const NAME_MAX: usize = 200;
const DESCRIPTION_MAX: usize = 2000;
const SKU_MAX: usize = 64;
const PHONE_MAX: usize = 32;

/// Product grouping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub product_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
}

impl Resource for Category {
    type Input = CategoryInput;

    const KIND: EntityKind = EntityKind::Category;

    fn id(&self) -> i64 {
        self.id
    }

    fn title(&self) -> String {
        self.name.clone()
    }

    fn value(&self, field: &str) -> FieldValue {
        match field {
            "id" => FieldValue::Integer(self.id),
            "name" => FieldValue::Text(self.name.clone()),
            "description" => self.description.clone().into(),
            "product_count" => FieldValue::Integer(self.product_count),
            _ => FieldValue::Empty,
        }
    }

    fn parse_input(form: &FormData) -> Result<Self::Input, ValidationError> {
        let mut reader = FormReader::new(form);
        let name = reader.required_text("name", NAME_MAX);
        let description = reader.optional_text("description", DESCRIPTION_MAX);
        reader.finish()?;
        Ok(CategoryInput { name, description })
    }
}

/// Sellable item belonging to exactly one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub name: String,
    pub sku: String,
    pub price: Money,
    pub stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInput {
    pub category_id: i64,
    pub name: String,
    pub sku: String,
    pub price: Money,
    pub stock: i64,
}

impl Resource for Product {
    type Input = ProductInput;

    const KIND: EntityKind = EntityKind::Product;

    fn id(&self) -> i64 {
        self.id
    }

    fn title(&self) -> String {
        format!("{} ({})", self.name, self.sku)
    }

    fn value(&self, field: &str) -> FieldValue {
        match field {
            "id" => FieldValue::Integer(self.id),
            "name" => FieldValue::Text(self.name.clone()),
            "sku" => FieldValue::Text(self.sku.clone()),
            "category_id" => FieldValue::Reference {
                id: self.category_id,
                label: self.category_name.clone(),
            },
            "price" => FieldValue::Money(self.price),
            "stock" => FieldValue::Integer(self.stock),
            _ => FieldValue::Empty,
        }
    }

    fn parse_input(form: &FormData) -> Result<Self::Input, ValidationError> {
        let mut reader = FormReader::new(form);
        let name = reader.required_text("name", NAME_MAX);
        let sku = reader.required_text("sku", SKU_MAX).to_uppercase();
        let category_id = reader.reference("category_id");
        let price = reader.money("price");
        let stock = reader.non_negative_integer("stock");
        reader.finish()?;
        Ok(ProductInput {
            category_id,
            name,
            sku,
            price,
            stock,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub is_vip: bool,
    pub order_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub is_vip: bool,
}

impl Resource for Customer {
    type Input = CustomerInput;

    const KIND: EntityKind = EntityKind::Customer;

    fn id(&self) -> i64 {
        self.id
    }

    fn title(&self) -> String {
        self.name.clone()
    }

    fn value(&self, field: &str) -> FieldValue {
        match field {
            "id" => FieldValue::Integer(self.id),
            "name" => FieldValue::Text(self.name.clone()),
            "email" => FieldValue::Text(self.email.clone()),
            "phone" => self.phone.clone().into(),
            "is_vip" => FieldValue::Boolean(self.is_vip),
            "order_count" => FieldValue::Integer(self.order_count),
            _ => FieldValue::Empty,
        }
    }

    fn parse_input(form: &FormData) -> Result<Self::Input, ValidationError> {
        let mut reader = FormReader::new(form);
        let name = reader.required_text("name", NAME_MAX);
        let email = reader.email("email");
        let phone = reader.optional_text("phone", PHONE_MAX);
        let is_vip = reader.checkbox("is_vip");
        reader.finish()?;
        Ok(CustomerInput {
            name,
            email,
            phone,
            is_vip,
        })
    }
}

/// Order lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        Self::Pending,
        Self::Paid,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Returns the canonical database representation for the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value))
    }

    /// Cancelled orders carry no revenue.
    pub fn counts_as_revenue(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub customer_name: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub item_count: i64,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderInput {
    pub customer_id: i64,
    pub status: OrderStatus,
    /// Defaults to the time of insertion when absent.
    pub created_at: Option<DateTime<Utc>>,
}

impl Resource for Order {
    type Input = OrderInput;

    const KIND: EntityKind = EntityKind::Order;

    fn id(&self) -> i64 {
        self.id
    }

    fn title(&self) -> String {
        format!("Order #{} - {}", self.id, self.customer_name)
    }

    fn value(&self, field: &str) -> FieldValue {
        match field {
            "id" => FieldValue::Integer(self.id),
            "customer_id" => FieldValue::Reference {
                id: self.customer_id,
                label: self.customer_name.clone(),
            },
            "status" => FieldValue::Choice(self.status.as_str()),
            "created_at" => FieldValue::Timestamp(self.created_at),
            "item_count" => FieldValue::Integer(self.item_count),
            "total" => FieldValue::Money(self.total),
            _ => FieldValue::Empty,
        }
    }

    fn parse_input(form: &FormData) -> Result<Self::Input, ValidationError> {
        let mut reader = FormReader::new(form);
        let customer_id = reader.reference("customer_id");
        let status = reader.choice("status", OrderStatus::parse);
        let created_at = reader.optional_timestamp("created_at");
        reader.finish()?;
        Ok(OrderInput {
            customer_id,
            status,
            created_at,
        })
    }
}

/// Line of an order; the unit price is captured at the time of sale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemInput {
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// Falls back to the product's current price when absent.
    pub unit_price: Option<Money>,
}

impl Resource for OrderItem {
    type Input = OrderItemInput;

    const KIND: EntityKind = EntityKind::OrderItem;

    fn id(&self) -> i64 {
        self.id
    }

    fn title(&self) -> String {
        format!("{} x {} (order #{})", self.quantity, self.product_name, self.order_id)
    }

    fn value(&self, field: &str) -> FieldValue {
        match field {
            "id" => FieldValue::Integer(self.id),
            "order_id" => FieldValue::Reference {
                id: self.order_id,
                label: format!("Order #{}", self.order_id),
            },
            "product_id" => FieldValue::Reference {
                id: self.product_id,
                label: self.product_name.clone(),
            },
            "quantity" => FieldValue::Integer(self.quantity),
            "unit_price" => FieldValue::Money(self.unit_price),
            "line_total" => FieldValue::Money(self.line_total()),
            _ => FieldValue::Empty,
        }
    }

    fn parse_input(form: &FormData) -> Result<Self::Input, ValidationError> {
        let mut reader = FormReader::new(form);
        let order_id = reader.reference("order_id");
        let product_id = reader.reference("product_id");
        let quantity = reader.non_negative_integer("quantity");
        let unit_price = reader.optional_money("unit_price");
        reader.finish()?;
        Ok(OrderItemInput {
            order_id,
            product_id,
            quantity,
            unit_price,
        })
    }
}

/// Option presented by a reference select box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub id: i64,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn product_input_parses_and_normalizes_sku() {
        let input = Product::parse_input(&form(&[
            ("name", "Desk Lamp"),
            ("sku", "home-lamp-01"),
            ("category_id", "2"),
            ("price", "39.90"),
            ("stock", "12"),
        ]))
        .expect("valid product");

        assert_eq!(input.sku, "HOME-LAMP-01");
        assert_eq!(input.price, Money::from_cents(3990));
        assert_eq!(input.stock, 12);
        assert_eq!(input.category_id, 2);
    }

    #[test]
    fn product_input_rejects_negative_stock_and_price() {
        let err = Product::parse_input(&form(&[
            ("name", "Desk Lamp"),
            ("sku", "LAMP"),
            ("category_id", "2"),
            ("price", "-1"),
            ("stock", "-4"),
        ]))
        .unwrap_err();
        assert!(err.message_for("price").is_some());
        assert!(err.message_for("stock").is_some());
    }

    #[test]
    fn customer_vip_flag_defaults_to_false() {
        let input = Customer::parse_input(&form(&[
            ("name", "Ann"),
            ("email", "ann@example.com"),
        ]))
        .unwrap();
        assert!(!input.is_vip);
        assert_eq!(input.phone, None);
    }

    #[test]
    fn order_status_must_be_known() {
        let err = Order::parse_input(&form(&[("customer_id", "1"), ("status", "lost")]))
            .unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].field, "status");

        let ok = Order::parse_input(&form(&[("customer_id", "1"), ("status", "Shipped")]))
            .unwrap();
        assert_eq!(ok.status, OrderStatus::Shipped);
        assert_eq!(ok.created_at, None);
    }

    #[test]
    fn order_item_line_total_multiplies_quantity() {
        let item = OrderItem {
            id: 1,
            order_id: 1,
            product_id: 1,
            product_name: "Mug".to_string(),
            quantity: 3,
            unit_price: Money::from_cents(450),
        };
        assert_eq!(item.line_total(), Money::from_cents(1350));
        assert_eq!(item.value("line_total").display(), "13.50");
        assert_eq!(item.value("product_id").reference_id(), Some(1));
    }

    #[test]
    fn order_item_unit_price_is_optional() {
        let input = OrderItem::parse_input(&form(&[
            ("order_id", "1"),
            ("product_id", "4"),
            ("quantity", "0"),
        ]))
        .unwrap();
        assert_eq!(input.unit_price, None);
        assert_eq!(input.quantity, 0);
    }
}
