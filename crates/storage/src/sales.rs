use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use shop_admin_core::types::{
    Customer, CustomerInput, Order, OrderInput, OrderItem, OrderItemInput, OrderStatus,
};
use shop_admin_core::{EntityKind, Money};

use crate::repository::{write_error, Repository, RepositoryError, TableSpec};
use crate::to_rfc3339;

static CUSTOMER_SPEC: TableSpec = TableSpec {
    kind: EntityKind::Customer,
    select: "SELECT cu.id, cu.name, cu.email, cu.phone, cu.is_vip, \
             (SELECT COUNT(*) FROM orders AS o WHERE o.customer_id = cu.id) AS order_count \
             FROM customers AS cu",
    columns: &[
        ("id", "cu.id"),
        ("name", "cu.name"),
        ("email", "cu.email"),
        ("phone", "cu.phone"),
        ("is_vip", "cu.is_vip"),
        ("order_count", "order_count"),
    ],
    references: &[],
    choices: Some("SELECT id, name AS label FROM customers ORDER BY name"),
};

static ORDER_SPEC: TableSpec = TableSpec {
    kind: EntityKind::Order,
    select: "SELECT o.id, o.customer_id, cu.name AS customer_name, o.status, o.created_at, \
             (SELECT COUNT(*) FROM order_items AS oi WHERE oi.order_id = o.id) AS item_count, \
             (SELECT COALESCE(SUM(oi.quantity * oi.unit_price_cents), 0) \
              FROM order_items AS oi WHERE oi.order_id = o.id) AS total_cents \
             FROM orders AS o \
             JOIN customers AS cu ON cu.id = o.customer_id",
    columns: &[
        ("id", "o.id"),
        ("customer_id", "cu.name"),
        ("status", "o.status"),
        ("created_at", "o.created_at"),
        ("item_count", "item_count"),
        ("total", "total_cents"),
    ],
    references: &[("customer_id", "o.customer_id")],
    choices: Some(
        "SELECT o.id, 'Order #' || o.id || ' - ' || cu.name AS label \
         FROM orders AS o JOIN customers AS cu ON cu.id = o.customer_id \
         ORDER BY o.id DESC",
    ),
};

static ORDER_ITEM_SPEC: TableSpec = TableSpec {
    kind: EntityKind::OrderItem,
    select: "SELECT oi.id, oi.order_id, oi.product_id, p.name AS product_name, \
             oi.quantity, oi.unit_price_cents \
             FROM order_items AS oi \
             JOIN products AS p ON p.id = oi.product_id",
    columns: &[
        ("id", "oi.id"),
        ("order_id", "oi.order_id"),
        ("product_id", "p.name"),
        ("quantity", "oi.quantity"),
        ("unit_price", "oi.unit_price_cents"),
        ("line_total", "oi.quantity * oi.unit_price_cents"),
    ],
    references: &[
        ("order_id", "oi.order_id"),
        ("product_id", "oi.product_id"),
    ],
    choices: None,
};

#[derive(Debug, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub is_vip: bool,
    pub order_count: i64,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            is_vip: row.is_vip,
            order_count: row.order_count,
        }
    }
}

#[derive(Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for CustomerRepository {
    type Record = Customer;
    type Row = CustomerRow;

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn spec(&self) -> &'static TableSpec {
        &CUSTOMER_SPEC
    }

    async fn create(&self, input: &CustomerInput) -> Result<Customer, RepositoryError> {
        let id = sqlx::query("INSERT INTO customers (name, email, phone, is_vip) VALUES (?, ?, ?, ?)")
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(input.is_vip)
            .execute(&self.pool)
            .await
            .map_err(write_error)?
            .last_insert_rowid();
        self.get(id).await
    }

    async fn update(&self, id: i64, input: &CustomerInput) -> Result<Customer, RepositoryError> {
        let result = sqlx::query(
            "UPDATE customers SET name = ?, email = ?, phone = ?, is_vip = ? WHERE id = ?",
        )
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(input.is_vip)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub customer_id: i64,
    pub customer_name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub item_count: i64,
    pub total_cents: i64,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
            status: OrderStatus::parse(&row.status).unwrap_or_default(),
            created_at: row.created_at,
            item_count: row.item_count,
            total: Money::from_cents(row.total_cents),
        }
    }
}

/// Repository for orders. Totals are derived from the order's items.
#[derive(Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for OrderRepository {
    type Record = Order;
    type Row = OrderRow;

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn spec(&self) -> &'static TableSpec {
        &ORDER_SPEC
    }

    async fn create(&self, input: &OrderInput) -> Result<Order, RepositoryError> {
        let created_at = input.created_at.unwrap_or_else(Utc::now);
        let id = sqlx::query("INSERT INTO orders (customer_id, status, created_at) VALUES (?, ?, ?)")
            .bind(input.customer_id)
            .bind(input.status.as_str())
            .bind(to_rfc3339(created_at))
            .execute(&self.pool)
            .await
            .map_err(write_error)?
            .last_insert_rowid();
        self.get(id).await
    }

    /// Keeps the stored placement time unless the input carries a new one.
    async fn update(&self, id: i64, input: &OrderInput) -> Result<Order, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET customer_id = ?, status = ?, created_at = COALESCE(?, created_at) \
             WHERE id = ?",
        )
        .bind(input.customer_id)
        .bind(input.status.as_str())
        .bind(input.created_at.map(to_rfc3339))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: Money::from_cents(row.unit_price_cents),
        }
    }
}

#[derive(Clone)]
pub struct OrderItemRepository {
    pool: SqlitePool,
}

impl OrderItemRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn resolve_unit_price(&self, input: &OrderItemInput) -> Result<Money, RepositoryError> {
        if let Some(price) = input.unit_price {
            return Ok(price);
        }
        let cents: Option<i64> = sqlx::query_scalar("SELECT price_cents FROM products WHERE id = ?")
            .bind(input.product_id)
            .fetch_optional(&self.pool)
            .await?;
        cents
            .map(Money::from_cents)
            .ok_or(RepositoryError::InvalidReference)
    }
}

#[async_trait]
impl Repository for OrderItemRepository {
    type Record = OrderItem;
    type Row = OrderItemRow;

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn spec(&self) -> &'static TableSpec {
        &ORDER_ITEM_SPEC
    }

    async fn create(&self, input: &OrderItemInput) -> Result<OrderItem, RepositoryError> {
        let unit_price = self.resolve_unit_price(input).await?;
        let id = sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, unit_price_cents) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(input.order_id)
        .bind(input.product_id)
        .bind(input.quantity)
        .bind(unit_price.cents())
        .execute(&self.pool)
        .await
        .map_err(write_error)?
        .last_insert_rowid();
        self.get(id).await
    }

    async fn update(&self, id: i64, input: &OrderItemInput) -> Result<OrderItem, RepositoryError> {
        let unit_price = self.resolve_unit_price(input).await?;
        let result = sqlx::query(
            "UPDATE order_items \
             SET order_id = ?, product_id = ?, quantity = ?, unit_price_cents = ? \
             WHERE id = ?",
        )
        .bind(input.order_id)
        .bind(input.product_id)
        .bind(input.quantity)
        .bind(unit_price.cents())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seeded_db, setup_db};
    use chrono::TimeZone;
    use shop_admin_core::listing::{ListQuery, SortSpec};

    fn customer(email: &str) -> CustomerInput {
        CustomerInput {
            name: "Dana".to_string(),
            email: email.to_string(),
            phone: None,
            is_vip: false,
        }
    }

    async fn first<R: Repository>(repo: &R, kind: EntityKind) -> R::Record {
        repo.list_all(&ListQuery::new(kind))
            .await
            .expect("list")
            .into_iter()
            .next()
            .expect("at least one row")
    }

    #[test]
    fn specs_map_every_searchable_and_sortable_field() {
        for spec in [&CUSTOMER_SPEC, &ORDER_SPEC, &ORDER_ITEM_SPEC] {
            for field in spec.kind.sortable_fields().iter().chain(spec.kind.searchable_fields()) {
                assert!(
                    spec.columns.iter().any(|(name, _)| name == field),
                    "{:?} lacks column for {field}",
                    spec.kind
                );
            }
            for child in spec.kind.children() {
                assert!(child.kind.fields().iter().any(|f| f.name == child.field));
            }
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let db = setup_db().await;
        db.customers()
            .create(&customer("dana@example.com"))
            .await
            .expect("create");
        let err = db
            .customers()
            .create(&customer("dana@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { ref field } if field == "email"));
    }

    #[tokio::test]
    async fn order_totals_follow_items() {
        let db = setup_db().await;
        let dana = db.customers().create(&customer("dana@example.com")).await.unwrap();
        let placed = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let order = db
            .orders()
            .create(&OrderInput {
                customer_id: dana.id,
                status: OrderStatus::Paid,
                created_at: Some(placed),
            })
            .await
            .expect("create order");
        assert_eq!(order.total, Money::ZERO);
        assert_eq!(order.created_at, placed);
        assert_eq!(order.customer_name, "Dana");

        let category = db
            .categories()
            .create(&shop_admin_core::types::CategoryInput {
                name: "Books".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let product = db
            .products()
            .create(&shop_admin_core::types::ProductInput {
                category_id: category.id,
                name: "Atlas".to_string(),
                sku: "BK-1".to_string(),
                price: Money::from_cents(1250),
                stock: 3,
            })
            .await
            .unwrap();

        let item = db
            .order_items()
            .create(&OrderItemInput {
                order_id: order.id,
                product_id: product.id,
                quantity: 2,
                unit_price: None,
            })
            .await
            .expect("create item");
        assert_eq!(item.unit_price, Money::from_cents(1250));
        assert_eq!(item.line_total(), Money::from_cents(2500));

        let order = db.orders().get(order.id).await.unwrap();
        assert_eq!(order.item_count, 1);
        assert_eq!(order.total, Money::from_cents(2500));
    }

    #[tokio::test]
    async fn order_update_keeps_timestamp_when_absent() {
        let db = seeded_db().await;
        let order = first(&db.orders(), EntityKind::Order).await;

        let updated = db
            .orders()
            .update(
                order.id,
                &OrderInput {
                    customer_id: order.customer_id,
                    status: OrderStatus::Cancelled,
                    created_at: None,
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.status, OrderStatus::Cancelled);
        assert_eq!(updated.created_at, order.created_at);
    }

    #[tokio::test]
    async fn order_item_for_missing_product_is_invalid_reference() {
        let db = seeded_db().await;
        let order = first(&db.orders(), EntityKind::Order).await;
        let err = db
            .order_items()
            .create(&OrderItemInput {
                order_id: order.id,
                product_id: 9999,
                quantity: 1,
                unit_price: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidReference));
    }

    #[tokio::test]
    async fn deleting_order_cascades_to_items() {
        let db = seeded_db().await;
        let items_before = db.order_items().count().await.unwrap();
        let order = first(&db.orders(), EntityKind::Order).await;
        assert!(order.item_count > 0);

        db.orders().delete(order.id).await.expect("delete order");

        let items_after = db.order_items().count().await.unwrap();
        assert_eq!(items_after, items_before - order.item_count as u64);
    }

    #[tokio::test]
    async fn customers_and_products_with_orders_are_restricted() {
        let db = seeded_db().await;
        let alice = db
            .customers()
            .list_all(&ListQuery {
                search: Some("alice".to_string()),
                ..ListQuery::new(EntityKind::Customer)
            })
            .await
            .unwrap()
            .remove(0);
        assert_eq!(alice.order_count, 1);
        assert!(alice.is_vip);
        let err = db.customers().delete(alice.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InUse));

        let item = first(&db.order_items(), EntityKind::OrderItem).await;
        let err = db.products().delete(item.product_id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InUse));
    }

    #[tokio::test]
    async fn orders_default_to_newest_first_and_filter_by_customer() {
        let db = seeded_db().await;
        let orders = db.orders().list_all(&ListQuery::new(EntityKind::Order)).await.unwrap();
        assert_eq!(orders.len(), 3);
        assert!(orders.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert_eq!(orders[0].status, OrderStatus::Pending);

        let carol = orders[0].customer_id;
        let query = ListQuery::new(EntityKind::Order)
            .with_filter("customer_id", carol)
            .unwrap();
        let page = db.orders().list(&query).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].customer_name, "Carol Diaz");
    }

    #[tokio::test]
    async fn order_items_sort_by_line_total() {
        let db = seeded_db().await;
        let query = ListQuery {
            sort: SortSpec::descending("line_total"),
            ..ListQuery::new(EntityKind::OrderItem)
        };
        let items = db.order_items().list_all(&query).await.unwrap();
        assert_eq!(items.len(), 5);
        let totals: Vec<_> = items.iter().map(|i| i.line_total().cents()).collect();
        assert!(totals.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(totals[0], 8999);
    }

    #[tokio::test]
    async fn order_choices_carry_customer_names() {
        let db = seeded_db().await;
        let choices = db.orders().choices().await.unwrap();
        assert_eq!(choices.len(), 3);
        assert!(choices.iter().all(|c| c.label.starts_with("Order #")));
        assert!(db.order_items().choices().await.unwrap().is_empty());
    }
}
