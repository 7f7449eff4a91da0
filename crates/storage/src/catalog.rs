use async_trait::async_trait;
use sqlx::SqlitePool;

use shop_admin_core::types::{Category, CategoryInput, Product, ProductInput};
use shop_admin_core::{EntityKind, Money};

use crate::repository::{write_error, Repository, RepositoryError, TableSpec};

static CATEGORY_SPEC: TableSpec = TableSpec {
    kind: EntityKind::Category,
    select: "SELECT c.id, c.name, c.description, \
             (SELECT COUNT(*) FROM products AS p WHERE p.category_id = c.id) AS product_count \
             FROM categories AS c",
    columns: &[
        ("id", "c.id"),
        ("name", "c.name"),
        ("description", "c.description"),
        ("product_count", "product_count"),
    ],
    references: &[],
    choices: Some("SELECT id, name AS label FROM categories ORDER BY name"),
};

static PRODUCT_SPEC: TableSpec = TableSpec {
    kind: EntityKind::Product,
    select: "SELECT p.id, p.category_id, c.name AS category_name, p.name, p.sku, \
             p.price_cents, p.stock \
             FROM products AS p \
             JOIN categories AS c ON c.id = p.category_id",
    columns: &[
        ("id", "p.id"),
        ("name", "p.name"),
        ("sku", "p.sku"),
        ("category_id", "c.name"),
        ("price", "p.price_cents"),
        ("stock", "p.stock"),
    ],
    references: &[("category_id", "p.category_id")],
    choices: Some("SELECT id, name || ' (' || sku || ')' AS label FROM products ORDER BY name"),
};

#[derive(Debug, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub product_count: i64,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            description: row.description,
            product_count: row.product_count,
        }
    }
}

/// Repository for product categories.
#[derive(Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for CategoryRepository {
    type Record = Category;
    type Row = CategoryRow;

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn spec(&self) -> &'static TableSpec {
        &CATEGORY_SPEC
    }

    async fn create(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        let id = sqlx::query("INSERT INTO categories (name, description) VALUES (?, ?)")
            .bind(&input.name)
            .bind(&input.description)
            .execute(&self.pool)
            .await
            .map_err(write_error)?
            .last_insert_rowid();
        self.get(id).await
    }

    async fn update(&self, id: i64, input: &CategoryInput) -> Result<Category, RepositoryError> {
        let result = sqlx::query("UPDATE categories SET name = ?, description = ? WHERE id = ?")
            .bind(&input.name)
            .bind(&input.description)
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
pub struct ProductRow {
    pub id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub name: String,
    pub sku: String,
    pub price_cents: i64,
    pub stock: i64,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            category_id: row.category_id,
            category_name: row.category_name,
            name: row.name,
            sku: row.sku,
            price: Money::from_cents(row.price_cents),
            stock: row.stock,
        }
    }
}

/// Repository for products; every product belongs to one category.
#[derive(Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for ProductRepository {
    type Record = Product;
    type Row = ProductRow;

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn spec(&self) -> &'static TableSpec {
        &PRODUCT_SPEC
    }

    async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let id = sqlx::query(
            "INSERT INTO products (category_id, name, sku, price_cents, stock) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(input.category_id)
        .bind(&input.name)
        .bind(&input.sku)
        .bind(input.price.cents())
        .bind(input.stock)
        .execute(&self.pool)
        .await
        .map_err(write_error)?
        .last_insert_rowid();
        self.get(id).await
    }

    async fn update(&self, id: i64, input: &ProductInput) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products \
             SET category_id = ?, name = ?, sku = ?, price_cents = ?, stock = ? \
             WHERE id = ?",
        )
        .bind(input.category_id)
        .bind(&input.name)
        .bind(&input.sku)
        .bind(input.price.cents())
        .bind(input.stock)
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
    use shop_admin_core::listing::{ListParams, ListQuery, SortSpec};

    fn category(name: &str) -> CategoryInput {
        CategoryInput {
            name: name.to_string(),
            description: None,
        }
    }

    fn product(category_id: i64, sku: &str, cents: i64, stock: i64) -> ProductInput {
        ProductInput {
            category_id,
            name: format!("Product {sku}"),
            sku: sku.to_string(),
            price: Money::from_cents(cents),
            stock,
        }
    }

    #[test]
    fn specs_map_every_searchable_and_sortable_field() {
        for spec in [&CATEGORY_SPEC, &PRODUCT_SPEC] {
            for field in spec.kind.sortable_fields().iter().chain(spec.kind.searchable_fields()) {
                assert!(
                    spec.columns.iter().any(|(name, _)| name == field),
                    "{:?} lacks column for {field}",
                    spec.kind
                );
            }
        }
    }

    #[tokio::test]
    async fn create_update_and_get_category() {
        let db = setup_db().await;
        let repo = db.categories();

        let created = repo.create(&category("Garden")).await.expect("create");
        assert_eq!(created.name, "Garden");
        assert_eq!(created.product_count, 0);

        let updated = repo
            .update(
                created.id,
                &CategoryInput {
                    name: "Garden & Outdoor".to_string(),
                    description: Some("Tools".to_string()),
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.name, "Garden & Outdoor");
        assert_eq!(updated.description.as_deref(), Some("Tools"));

        let missing = repo.update(9999, &category("Nope")).await;
        assert!(matches!(missing, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn duplicate_category_name_is_a_conflict() {
        let db = setup_db().await;
        let repo = db.categories();
        repo.create(&category("Books")).await.expect("create");

        let err = repo.create(&category("Books")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { ref field } if field == "name"));
    }

    #[tokio::test]
    async fn product_requires_existing_category() {
        let db = setup_db().await;
        let err = db
            .products()
            .create(&product(42, "SKU-1", 100, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidReference));
    }

    #[tokio::test]
    async fn negative_stock_is_rejected_by_the_store() {
        let db = setup_db().await;
        let books = db.categories().create(&category("Books")).await.unwrap();
        let err = db
            .products()
            .create(&product(books.id, "SKU-1", 100, -1))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Invalid(_)));
    }

    #[tokio::test]
    async fn deleting_category_with_products_is_restricted() {
        let db = setup_db().await;
        let books = db.categories().create(&category("Books")).await.unwrap();
        let empty = db.categories().create(&category("Empty")).await.unwrap();
        db.products()
            .create(&product(books.id, "SKU-1", 100, 1))
            .await
            .unwrap();

        let err = db.categories().delete(books.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InUse));
        assert_eq!(db.categories().count().await.unwrap(), 2);

        db.categories().delete(empty.id).await.expect("unreferenced delete");
        let err = db.categories().delete(empty.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn bulk_delete_is_all_or_nothing() {
        let db = setup_db().await;
        let repo = db.categories();
        let a = repo.create(&category("A")).await.unwrap();
        let b = repo.create(&category("B")).await.unwrap();

        let err = repo.delete_many(&[a.id, 9999]).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
        assert_eq!(repo.count().await.unwrap(), 2);

        assert_eq!(repo.delete_many(&[a.id, b.id]).await.unwrap(), 2);
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_searches_sorts_and_paginates_products() {
        let db = seeded_db().await;
        let repo = db.products();

        let params = ListParams {
            sort: Some("-price".to_string()),
            per_page: Some(3),
            page: Some(2),
            ..ListParams::default()
        };
        let query = ListQuery::from_params(EntityKind::Product, &params).unwrap();
        let page = repo.list(&query).await.expect("list");
        assert_eq!(page.total, 7);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.page_count(), 3);
        let prices: Vec<_> = page.items.iter().map(|p| p.price.cents()).collect();
        let mut sorted = prices.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(prices, sorted);

        let search = ListQuery {
            search: Some("books".to_string()),
            ..ListQuery::new(EntityKind::Product)
        };
        let page = repo.list(&search).await.expect("search by category name");
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|p| p.category_name == "Books"));
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let db = seeded_db().await;
        let query = ListQuery {
            search: Some("%".to_string()),
            ..ListQuery::new(EntityKind::Product)
        };
        let page = db.products().list(&query).await.expect("list");
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn filter_by_category_and_list_all() {
        let db = seeded_db().await;
        let electronics = db
            .categories()
            .list_all(&ListQuery::new(EntityKind::Category))
            .await
            .unwrap()
            .into_iter()
            .find(|c| c.name == "Electronics")
            .expect("seeded category");
        assert_eq!(electronics.product_count, 2);

        let query = ListQuery::new(EntityKind::Product)
            .with_filter("category_id", electronics.id)
            .expect("reference field");
        let products = db.products().list_all(&query).await.unwrap();
        assert_eq!(products.len(), 2);
        assert!(products.iter().all(|p| p.category_id == electronics.id));
    }

    #[tokio::test]
    async fn categories_sort_by_product_count() {
        let db = seeded_db().await;
        let query = ListQuery {
            sort: SortSpec::descending("product_count"),
            ..ListQuery::new(EntityKind::Category)
        };
        let page = db.categories().list(&query).await.unwrap();
        let counts: Vec<_> = page.items.iter().map(|c| c.product_count).collect();
        assert_eq!(counts, vec![2, 2, 2, 1]);
        assert_eq!(page.items[0].name, "Electronics");
    }

    #[tokio::test]
    async fn choices_are_ordered_by_name() {
        let db = seeded_db().await;
        let choices = db.categories().choices().await.unwrap();
        let labels: Vec<_> = choices.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Books", "Clothing", "Electronics", "Home & Kitchen"]);
    }
}
