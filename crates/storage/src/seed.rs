use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info};

use shop_admin_core::seed::{SeedData, SeedError};

use crate::{to_rfc3339, Database};

/// Rows inserted by a seeding run, per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedCounts {
    pub categories: u64,
    pub products: u64,
    pub customers: u64,
    pub orders: u64,
    pub order_items: u64,
}

impl SeedCounts {
    pub fn total(&self) -> u64 {
        self.categories + self.products + self.customers + self.orders + self.order_items
    }

    /// `(table, rows)` pairs in insertion order.
    pub fn per_table(&self) -> [(&'static str, u64); 5] {
        [
            ("categories", self.categories),
            ("products", self.products),
            ("customers", self.customers),
            ("orders", self.orders),
            ("order_items", self.order_items),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Seeded(SeedCounts),
    /// The store already held rows; nothing was written.
    Skipped { existing_rows: u64 },
}

#[derive(Debug, Error)]
pub enum SeedingError {
    #[error("seed data is inconsistent: {0}")]
    Invalid(#[from] SeedError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Database {
    /// Inserts `data` when every table is empty.
    ///
    /// The emptiness check and the inserts share one transaction, so a
    /// concurrent or repeated start never duplicates rows. Order timestamps
    /// are placed `days_ago` days before `now`.
    pub async fn seed_if_empty(
        &self,
        data: &SeedData,
        now: DateTime<Utc>,
    ) -> Result<SeedOutcome, SeedingError> {
        data.validate()?;

        let mut tx = self.pool().begin().await?;

        let existing: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM categories) \
                  + (SELECT COUNT(*) FROM products) \
                  + (SELECT COUNT(*) FROM customers) \
                  + (SELECT COUNT(*) FROM orders) \
                  + (SELECT COUNT(*) FROM order_items)",
        )
        .fetch_one(&mut *tx)
        .await?;
        if existing > 0 {
            debug!(existing, "store already populated; skipping seed");
            return Ok(SeedOutcome::Skipped {
                existing_rows: existing as u64,
            });
        }

        let mut counts = SeedCounts::default();

        let mut category_ids = Vec::with_capacity(data.categories.len());
        for category in data.categories {
            let id = sqlx::query("INSERT INTO categories (name, description) VALUES (?, ?)")
                .bind(category.name)
                .bind(category.description)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();
            category_ids.push(id);
            counts.categories += 1;
        }

        let mut product_ids = Vec::with_capacity(data.products.len());
        for product in data.products {
            let id = sqlx::query(
                "INSERT INTO products (category_id, name, sku, price_cents, stock) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(category_ids[product.category])
            .bind(product.name)
            .bind(product.sku)
            .bind(product.price_cents)
            .bind(product.stock)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
            product_ids.push(id);
            counts.products += 1;
        }

        let mut customer_ids = Vec::with_capacity(data.customers.len());
        for customer in data.customers {
            let id = sqlx::query(
                "INSERT INTO customers (name, email, phone, is_vip) VALUES (?, ?, ?, ?)",
            )
            .bind(customer.name)
            .bind(customer.email)
            .bind(customer.phone)
            .bind(customer.is_vip)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
            customer_ids.push(id);
            counts.customers += 1;
        }

        for order in data.orders {
            let created_at = now - Duration::days(order.days_ago);
            let order_id = sqlx::query(
                "INSERT INTO orders (customer_id, status, created_at) VALUES (?, ?, ?)",
            )
            .bind(customer_ids[order.customer])
            .bind(order.status.as_str())
            .bind(to_rfc3339(created_at))
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
            counts.orders += 1;

            for item in order.items {
                sqlx::query(
                    "INSERT INTO order_items (order_id, product_id, quantity, unit_price_cents) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(order_id)
                .bind(product_ids[item.product])
                .bind(item.quantity)
                .bind(data.products[item.product].price_cents)
                .execute(&mut *tx)
                .await?;
                counts.order_items += 1;
            }
        }

        tx.commit().await?;
        info!(rows = counts.total(), "seeded sample data");
        Ok(SeedOutcome::Seeded(counts))
    }
}
