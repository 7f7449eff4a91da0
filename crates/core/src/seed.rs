//! Sample rows inserted on first startup.
//!
//! Rows reference each other by position inside [`SeedData`] so the set can
//! be declared statically; storage resolves positions to generated ids.

use thiserror::Error;

use crate::types::OrderStatus;

pub struct SeedCategory {
    pub name: &'static str,
    pub description: &'static str,
}

pub struct SeedProduct {
    /// Index into [`SeedData::categories`].
    pub category: usize,
    pub name: &'static str,
    pub sku: &'static str,
    pub price_cents: i64,
    pub stock: i64,
}

pub struct SeedCustomer {
    pub name: &'static str,
    pub email: &'static str,
    pub phone: Option<&'static str>,
    pub is_vip: bool,
}

pub struct SeedOrderItem {
    /// Index into [`SeedData::products`]; the unit price is copied from it.
    pub product: usize,
    pub quantity: i64,
}

pub struct SeedOrder {
    /// Index into [`SeedData::customers`].
    pub customer: usize,
    pub status: OrderStatus,
    pub days_ago: i64,
    pub items: &'static [SeedOrderItem],
}

pub struct SeedData {
    pub categories: &'static [SeedCategory],
    pub products: &'static [SeedProduct],
    pub customers: &'static [SeedCustomer],
    pub orders: &'static [SeedOrder],
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeedError {
    #[error("seed product '{product}' points at missing category #{index}")]
    MissingCategory { product: &'static str, index: usize },
    #[error("seed order #{order} points at missing customer #{index}")]
    MissingCustomer { order: usize, index: usize },
    #[error("seed order #{order} points at missing product #{index}")]
    MissingProduct { order: usize, index: usize },
}

impl SeedData {
    pub fn item_count(&self) -> usize {
        self.orders.iter().map(|order| order.items.len()).sum()
    }

    /// Checks that every positional reference resolves inside the set.
    pub fn validate(&self) -> Result<(), SeedError> {
        for product in self.products {
            if product.category >= self.categories.len() {
                return Err(SeedError::MissingCategory {
                    product: product.name,
                    index: product.category,
                });
            }
        }
        for (position, order) in self.orders.iter().enumerate() {
            if order.customer >= self.customers.len() {
                return Err(SeedError::MissingCustomer {
                    order: position,
                    index: order.customer,
                });
            }
            if let Some(item) = order
                .items
                .iter()
                .find(|item| item.product >= self.products.len())
            {
                return Err(SeedError::MissingProduct {
                    order: position,
                    index: item.product,
                });
            }
        }
        Ok(())
    }
}

pub static STANDARD: SeedData = SeedData {
    categories: &[
        SeedCategory {
            name: "Electronics",
            description: "Gadgets, audio and accessories",
        },
        SeedCategory {
            name: "Books",
            description: "Printed books and paperbacks",
        },
        SeedCategory {
            name: "Clothing",
            description: "Apparel for every season",
        },
        SeedCategory {
            name: "Home & Kitchen",
            description: "Cookware, decor and household goods",
        },
    ],
    products: &[
        SeedProduct {
            category: 0,
            name: "Wireless Headphones",
            sku: "ELEC-HP-001",
            price_cents: 8999,
            stock: 25,
        },
        SeedProduct {
            category: 0,
            name: "USB-C Charger",
            sku: "ELEC-CH-002",
            price_cents: 2499,
            stock: 120,
        },
        SeedProduct {
            category: 1,
            name: "The Rust Programming Language",
            sku: "BOOK-RUST-001",
            price_cents: 3995,
            stock: 40,
        },
        SeedProduct {
            category: 1,
            name: "Designing Data-Intensive Applications",
            sku: "BOOK-DDIA-002",
            price_cents: 4599,
            stock: 18,
        },
        SeedProduct {
            category: 2,
            name: "Merino Wool Sweater",
            sku: "CLTH-SW-001",
            price_cents: 7450,
            stock: 30,
        },
        SeedProduct {
            category: 3,
            name: "Cast Iron Skillet",
            sku: "HOME-SK-001",
            price_cents: 3450,
            stock: 15,
        },
        SeedProduct {
            category: 3,
            name: "Ceramic Mug Set",
            sku: "HOME-MG-002",
            price_cents: 1999,
            stock: 60,
        },
    ],
    customers: &[
        SeedCustomer {
            name: "Alice Johnson",
            email: "alice@example.com",
            phone: Some("+1 555 0101"),
            is_vip: true,
        },
        SeedCustomer {
            name: "Bob Smith",
            email: "bob@example.com",
            phone: Some("+1 555 0102"),
            is_vip: false,
        },
        SeedCustomer {
            name: "Carol Diaz",
            email: "carol@example.com",
            phone: None,
            is_vip: false,
        },
    ],
    orders: &[
        SeedOrder {
            customer: 0,
            status: OrderStatus::Delivered,
            days_ago: 5,
            items: &[
                SeedOrderItem {
                    product: 0,
                    quantity: 1,
                },
                SeedOrderItem {
                    product: 2,
                    quantity: 2,
                },
            ],
        },
        SeedOrder {
            customer: 1,
            status: OrderStatus::Shipped,
            days_ago: 2,
            items: &[
                SeedOrderItem {
                    product: 4,
                    quantity: 1,
                },
                SeedOrderItem {
                    product: 6,
                    quantity: 3,
                },
            ],
        },
        SeedOrder {
            customer: 2,
            status: OrderStatus::Pending,
            days_ago: 0,
            items: &[SeedOrderItem {
                product: 5,
                quantity: 1,
            }],
        },
    ],
};
