use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::form::{FormData, ValidationError};
use crate::listing::SortSpec;
use crate::money::Money;

/// The record types managed through the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Category,
    Product,
    Customer,
    Order,
    OrderItem,
}

/// A "has many" link from a parent entity to the child field referencing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRelation {
    pub kind: EntityKind,
    pub field: &'static str,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        Self::Category,
        Self::Product,
        Self::Customer,
        Self::Order,
        Self::OrderItem,
    ];

    /// Path segment used under `/admin`.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Product => "product",
            Self::Customer => "customer",
            Self::Order => "order",
            Self::OrderItem => "order_item",
        }
    }

    pub fn from_slug(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.slug() == value)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Category => "Category",
            Self::Product => "Product",
            Self::Customer => "Customer",
            Self::Order => "Order",
            Self::OrderItem => "Order Item",
        }
    }

    pub fn plural_label(self) -> &'static str {
        match self {
            Self::Category => "Categories",
            Self::Product => "Products",
            Self::Customer => "Customers",
            Self::Order => "Orders",
            Self::OrderItem => "Order Items",
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            Self::Category => "categories",
            Self::Product => "products",
            Self::Customer => "customers",
            Self::Order => "orders",
            Self::OrderItem => "order_items",
        }
    }

    /// Ordered field descriptors. Detail pages show every field, list pages and
    /// forms honour the per-field flags.
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            Self::Category => CATEGORY_FIELDS,
            Self::Product => PRODUCT_FIELDS,
            Self::Customer => CUSTOMER_FIELDS,
            Self::Order => ORDER_FIELDS,
            Self::OrderItem => ORDER_ITEM_FIELDS,
        }
    }

    pub fn field(self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|field| field.name == name)
    }

    pub fn list_fields(self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields().iter().filter(|field| field.in_list)
    }

    pub fn form_fields(self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields().iter().filter(|field| field.in_form)
    }

    /// Fields matched by the free-text search box.
    pub fn searchable_fields(self) -> &'static [&'static str] {
        match self {
            Self::Category => &["name", "description"],
            Self::Product => &["name", "sku", "category_id"],
            Self::Customer => &["name", "email", "phone"],
            Self::Order => &["customer_id", "status"],
            Self::OrderItem => &["product_id"],
        }
    }

    pub fn sortable_fields(self) -> &'static [&'static str] {
        match self {
            Self::Category => &["id", "name", "product_count"],
            Self::Product => &["id", "name", "sku", "category_id", "price", "stock"],
            Self::Customer => &["id", "name", "email", "is_vip", "order_count"],
            Self::Order => &["id", "customer_id", "status", "created_at", "item_count", "total"],
            Self::OrderItem => &[
                "id",
                "order_id",
                "product_id",
                "quantity",
                "unit_price",
                "line_total",
            ],
        }
    }

    pub fn is_sortable(self, field: &str) -> bool {
        self.sortable_fields().contains(&field)
    }

    pub fn default_sort(self) -> SortSpec {
        match self {
            Self::Category | Self::Product | Self::Customer => SortSpec::ascending("name"),
            Self::Order => SortSpec::descending("created_at"),
            Self::OrderItem => SortSpec::ascending("id"),
        }
    }

    pub fn children(self) -> &'static [ChildRelation] {
        match self {
            Self::Category => &[ChildRelation {
                kind: Self::Product,
                field: "category_id",
            }],
            Self::Product => &[ChildRelation {
                kind: Self::OrderItem,
                field: "product_id",
            }],
            Self::Customer => &[ChildRelation {
                kind: Self::Order,
                field: "customer_id",
            }],
            Self::Order => &[ChildRelation {
                kind: Self::OrderItem,
                field: "order_id",
            }],
            Self::OrderItem => &[],
        }
    }
}

/// Input widget / value family of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Id,
    Text,
    LongText,
    Email,
    Integer,
    Money,
    Boolean,
    Timestamp,
    Choice(&'static [&'static str]),
    Reference(EntityKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub in_list: bool,
    pub in_form: bool,
    pub required: bool,
}

impl FieldSpec {
    const fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            in_list: true,
            in_form: true,
            required: true,
        }
    }

    const fn optional(self) -> Self {
        Self {
            required: false,
            ..self
        }
    }

    const fn read_only(self) -> Self {
        Self {
            in_form: false,
            required: false,
            ..self
        }
    }

    const fn detail_only(self) -> Self {
        Self {
            in_list: false,
            ..self
        }
    }
}

const ORDER_STATUS_CHOICES: &[&str] = &["pending", "paid", "shipped", "delivered", "cancelled"];

const CATEGORY_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("id", "ID", FieldKind::Id).read_only(),
    FieldSpec::new("name", "Name", FieldKind::Text),
    FieldSpec::new("description", "Description", FieldKind::LongText).optional(),
    FieldSpec::new("product_count", "Products", FieldKind::Integer).read_only(),
];

const PRODUCT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("id", "ID", FieldKind::Id).read_only(),
    FieldSpec::new("name", "Name", FieldKind::Text),
    FieldSpec::new("sku", "SKU", FieldKind::Text),
    FieldSpec::new(
        "category_id",
        "Category",
        FieldKind::Reference(EntityKind::Category),
    ),
    FieldSpec::new("price", "Price", FieldKind::Money),
    FieldSpec::new("stock", "Stock", FieldKind::Integer),
];

const CUSTOMER_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("id", "ID", FieldKind::Id).read_only(),
    FieldSpec::new("name", "Name", FieldKind::Text),
    FieldSpec::new("email", "Email", FieldKind::Email),
    FieldSpec::new("phone", "Phone", FieldKind::Text).optional(),
    FieldSpec::new("is_vip", "VIP", FieldKind::Boolean).optional(),
    FieldSpec::new("order_count", "Orders", FieldKind::Integer).read_only(),
];

const ORDER_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("id", "ID", FieldKind::Id).read_only(),
    FieldSpec::new(
        "customer_id",
        "Customer",
        FieldKind::Reference(EntityKind::Customer),
    ),
    FieldSpec::new("status", "Status", FieldKind::Choice(ORDER_STATUS_CHOICES)),
    FieldSpec::new("created_at", "Placed At", FieldKind::Timestamp).optional(),
    FieldSpec::new("item_count", "Items", FieldKind::Integer).read_only(),
    FieldSpec::new("total", "Total", FieldKind::Money).read_only(),
];

const ORDER_ITEM_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("id", "ID", FieldKind::Id).read_only(),
    FieldSpec::new("order_id", "Order", FieldKind::Reference(EntityKind::Order)),
    FieldSpec::new(
        "product_id",
        "Product",
        FieldKind::Reference(EntityKind::Product),
    ),
    FieldSpec::new("quantity", "Quantity", FieldKind::Integer),
    FieldSpec::new("unit_price", "Unit Price", FieldKind::Money).optional(),
    FieldSpec::new("line_total", "Line Total", FieldKind::Money)
        .read_only()
        .detail_only(),
];

/// A single field value of a record, independent of how it is rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Empty,
    Integer(i64),
    Text(String),
    Money(Money),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Choice(&'static str),
    Reference { id: i64, label: String },
}

impl FieldValue {
    /// Human readable representation used in tables.
    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Integer(value) => value.to_string(),
            Self::Text(value) => value.clone(),
            Self::Money(value) => value.to_string(),
            Self::Boolean(true) => "Yes".to_string(),
            Self::Boolean(false) => "No".to_string(),
            Self::Timestamp(value) => value.format("%Y-%m-%d %H:%M").to_string(),
            Self::Choice(value) => value.to_string(),
            Self::Reference { label, .. } => label.clone(),
        }
    }

    /// Lossless representation written to CSV exports.
    pub fn export_value(&self) -> String {
        match self {
            Self::Timestamp(value) => value.to_rfc3339_opts(SecondsFormat::Millis, true),
            other => other.display(),
        }
    }

    /// Representation pre-filled into HTML inputs. Timestamps keep their
    /// milliseconds so re-submitting an untouched form does not move them.
    pub fn form_value(&self) -> String {
        match self {
            Self::Boolean(true) => "on".to_string(),
            Self::Boolean(false) => String::new(),
            Self::Timestamp(value) => value.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            Self::Reference { id, .. } => id.to_string(),
            other => other.display(),
        }
    }

    pub fn reference_id(&self) -> Option<i64> {
        match self {
            Self::Reference { id, .. } => Some(*id),
            _ => None,
        }
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map(Self::Text).unwrap_or(Self::Empty)
    }
}

/// A record type exposed through the admin surface.
pub trait Resource: Serialize + Send + Sync + Sized + 'static {
    /// Validated payload for create and update.
    type Input: Send + Sync;

    const KIND: EntityKind;

    fn id(&self) -> i64;

    /// Short label used in page titles and reference pickers.
    fn title(&self) -> String;

    /// Value of the named field; unknown names yield [`FieldValue::Empty`].
    fn value(&self, field: &str) -> FieldValue;

    fn parse_input(form: &FormData) -> Result<Self::Input, ValidationError>;
}
