use chrono::{DateTime, Utc};

use shop_admin_core::dashboard::{DashboardLine, DateRange};
use shop_admin_core::types::OrderStatus;
use shop_admin_core::Money;

use crate::repository::RepositoryError;
use crate::{to_rfc3339, Database};

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    order_id: i64,
    created_at: DateTime<Utc>,
    status: String,
    category: Option<String>,
    quantity: Option<i64>,
    unit_price_cents: Option<i64>,
}

impl From<LineRow> for DashboardLine {
    fn from(row: LineRow) -> Self {
        DashboardLine {
            order_id: row.order_id,
            created_at: row.created_at,
            status: OrderStatus::parse(&row.status).unwrap_or_default(),
            category: row.category,
            quantity: row.quantity.unwrap_or(0),
            unit_price: Money::from_cents(row.unit_price_cents.unwrap_or(0)),
        }
    }
}

impl Database {
    /// Order lines placed inside `range`, one per item plus one empty line
    /// for each order without items.
    pub async fn dashboard_lines(
        &self,
        range: &DateRange,
    ) -> Result<Vec<DashboardLine>, RepositoryError> {
        let rows: Vec<LineRow> = sqlx::query_as(
            "SELECT o.id AS order_id, o.created_at, o.status, c.name AS category, \
                    oi.quantity, oi.unit_price_cents \
             FROM orders AS o \
             LEFT JOIN order_items AS oi ON oi.order_id = o.id \
             LEFT JOIN products AS p ON p.id = oi.product_id \
             LEFT JOIN categories AS c ON c.id = p.category_id \
             WHERE o.created_at >= ? AND o.created_at < ? \
             ORDER BY o.created_at, o.id, oi.id",
        )
        .bind(to_rfc3339(range.start_at()))
        .bind(to_rfc3339(range.end_before()))
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::seeded_db;
    use shop_admin_core::dashboard::{build_report, DEFAULT_WINDOW_DAYS};

    #[tokio::test]
    async fn lines_cover_seeded_orders_in_window() {
        let db = seeded_db().await;
        let range = DateRange::ending_at(Utc::now().date_naive(), DEFAULT_WINDOW_DAYS);

        let lines = db.dashboard_lines(&range).await.expect("lines");
        assert_eq!(lines.len(), 5);
        assert!(lines.iter().all(|line| line.category.is_some()));

        let report = build_report(range, &lines);
        assert_eq!(report.summary.total_orders, 3);
        assert_eq!(report.summary.items_sold, 8);
        assert_eq!(report.daily_revenue.len(), 7);
    }

    #[tokio::test]
    async fn lines_outside_window_are_excluded() {
        let db = seeded_db().await;
        let today = Utc::now().date_naive();
        let range = DateRange::ending_at(today, 1);

        let lines = db.dashboard_lines(&range).await.expect("lines");
        assert!(lines.iter().all(|line| line.status == OrderStatus::Pending));
        assert_eq!(lines.len(), 1);
    }
}
