//! Sales dashboard aggregation.
//!
//! Storage hands over one [`DashboardLine`] per order item (or one empty line
//! for an order without items); everything here is pure so it can be tested
//! without a database.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::money::Money;
use crate::types::OrderStatus;

/// Default reporting window, ending today.
pub const DEFAULT_WINDOW_DAYS: u64 = 7;

/// Longest window a report may cover; one revenue entry is built per day.
pub const MAX_WINDOW_DAYS: i64 = 366;

const UNCATEGORIZED: &str = "Uncategorized";

/// Inclusive range of calendar days (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashboardError {
    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("date range covers {days} days, at most {max} are allowed")]
    RangeTooLong { days: i64, max: i64 },
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DashboardError> {
        if start > end {
            return Err(DashboardError::InvertedRange { start, end });
        }
        let days = (end - start).num_days() + 1;
        if days > MAX_WINDOW_DAYS {
            return Err(DashboardError::RangeTooLong {
                days,
                max: MAX_WINDOW_DAYS,
            });
        }
        Ok(Self { start, end })
    }

    /// The `days` most recent days, ending at `today`.
    pub fn ending_at(today: NaiveDate, days: u64) -> Self {
        let start = today
            .checked_sub_days(Days::new(days.saturating_sub(1)))
            .unwrap_or(today);
        Self { start, end: today }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// First instant of the range.
    pub fn start_at(&self) -> DateTime<Utc> {
        self.start.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// First instant after the range.
    pub fn end_before(&self) -> DateTime<Utc> {
        self.end
            .checked_add_days(Days::new(1))
            .unwrap_or(self.end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
    }

    fn iter_days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

/// One order item joined with its order and product category.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardLine {
    pub order_id: i64,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub category: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
}

impl DashboardLine {
    fn revenue(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub summary: Summary,
    pub daily_revenue: Vec<DailyRevenue>,
    pub category_performance: BTreeMap<String, CategoryPerformance>,
    pub status_breakdown: BTreeMap<OrderStatus, u64>,
    pub date_range: RangeInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_orders: u64,
    pub total_revenue: Money,
    pub items_sold: i64,
    pub avg_daily_revenue: f64,
    pub avg_daily_orders: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRevenue {
    pub date: String,
    pub day: String,
    pub revenue: Money,
    pub orders: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryPerformance {
    pub orders: u64,
    pub items: i64,
    pub revenue: Money,
    pub revenue_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeInfo {
    pub start: String,
    pub end: String,
    pub days: i64,
}

/// Aggregates order lines inside `range`.
///
/// Cancelled orders appear in the status breakdown only.
pub fn build_report(range: DateRange, lines: &[DashboardLine]) -> DashboardReport {
    let in_range: Vec<&DashboardLine> = lines
        .iter()
        .filter(|line| range.contains(line.created_at.date_naive()))
        .collect();

    let mut status_orders: HashMap<OrderStatus, BTreeSet<i64>> = HashMap::new();
    for line in &in_range {
        status_orders
            .entry(line.status)
            .or_default()
            .insert(line.order_id);
    }
    let status_breakdown = OrderStatus::ALL
        .into_iter()
        .map(|status| {
            let count = status_orders.get(&status).map_or(0, BTreeSet::len) as u64;
            (status, count)
        })
        .collect();

    let revenue_lines: Vec<&DashboardLine> = in_range
        .into_iter()
        .filter(|line| line.status.counts_as_revenue())
        .collect();

    let total_revenue: Money = revenue_lines.iter().map(|line| line.revenue()).sum();
    let items_sold: i64 = revenue_lines.iter().map(|line| line.quantity).sum();
    let orders: BTreeSet<i64> = revenue_lines.iter().map(|line| line.order_id).collect();

    let mut per_day: BTreeMap<NaiveDate, (Money, BTreeSet<i64>)> = BTreeMap::new();
    for line in &revenue_lines {
        let entry = per_day.entry(line.created_at.date_naive()).or_default();
        entry.0 += line.revenue();
        entry.1.insert(line.order_id);
    }
    let daily_revenue = range
        .iter_days()
        .map(|day| {
            let (revenue, orders) = per_day
                .get(&day)
                .map(|(revenue, orders)| (*revenue, orders.len() as u64))
                .unwrap_or((Money::ZERO, 0));
            DailyRevenue {
                date: day.format("%Y-%m-%d").to_string(),
                day: day.format("%a").to_string(),
                revenue,
                orders,
            }
        })
        .collect();

    let mut category_orders: HashMap<String, BTreeSet<i64>> = HashMap::new();
    let mut category_performance: BTreeMap<String, CategoryPerformance> = BTreeMap::new();
    for line in revenue_lines.iter().filter(|line| line.quantity > 0) {
        let name = line.category.as_deref().unwrap_or(UNCATEGORIZED).to_string();
        category_orders
            .entry(name.clone())
            .or_default()
            .insert(line.order_id);
        let entry = category_performance.entry(name).or_default();
        entry.items += line.quantity;
        entry.revenue += line.revenue();
    }
    for (name, entry) in category_performance.iter_mut() {
        entry.orders = category_orders.get(name).map_or(0, BTreeSet::len) as u64;
        entry.revenue_share = percentage(entry.revenue.cents(), total_revenue.cents());
    }

    let days = range.days();
    let summary = Summary {
        total_orders: orders.len() as u64,
        total_revenue,
        items_sold,
        avg_daily_revenue: round_to(total_revenue.as_units() / days as f64, 2),
        avg_daily_orders: round_to(orders.len() as f64 / days as f64, 1),
    };

    DashboardReport {
        summary,
        daily_revenue,
        category_performance,
        status_breakdown,
        date_range: RangeInfo {
            start: range.start.format("%Y-%m-%d").to_string(),
            end: range.end.format("%Y-%m-%d").to_string(),
            days,
        },
    }
}

fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    round_to(part as f64 / whole as f64 * 100.0, 1)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn line(
        order_id: i64,
        d: u32,
        status: OrderStatus,
        category: Option<&str>,
        quantity: i64,
        cents: i64,
    ) -> DashboardLine {
        DashboardLine {
            order_id,
            created_at: Utc.with_ymd_and_hms(2024, 3, d, 10, 0, 0).unwrap(),
            status,
            category: category.map(str::to_string),
            quantity,
            unit_price: Money::from_cents(cents),
        }
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(DateRange::new(day(5), day(4)).is_err());
        assert_eq!(DateRange::new(day(4), day(4)).unwrap().days(), 1);
    }

    #[test]
    fn caps_window_length() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let last_allowed = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(DateRange::new(start, last_allowed).unwrap().days(), 366);

        let too_far = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(matches!(
            DateRange::new(start, too_far),
            Err(DashboardError::RangeTooLong { days: 367, max: 366 })
        ));
    }

    #[test]
    fn default_window_covers_seven_days() {
        let range = DateRange::ending_at(day(10), DEFAULT_WINDOW_DAYS);
        assert_eq!(range.start(), day(4));
        assert_eq!(range.days(), 7);
        assert_eq!(
            range.end_before(),
            Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn cancelled_orders_are_excluded_from_revenue() {
        let range = DateRange::new(day(1), day(2)).unwrap();
        let lines = vec![
            line(1, 1, OrderStatus::Paid, Some("Books"), 2, 1000),
            line(1, 1, OrderStatus::Paid, Some("Garden"), 1, 500),
            line(2, 2, OrderStatus::Cancelled, Some("Books"), 5, 1000),
            line(3, 2, OrderStatus::Delivered, Some("Books"), 1, 1500),
        ];

        let report = build_report(range, &lines);

        assert_eq!(report.summary.total_orders, 2);
        assert_eq!(report.summary.total_revenue, Money::from_cents(4000));
        assert_eq!(report.summary.items_sold, 4);
        assert_eq!(report.summary.avg_daily_revenue, 20.0);
        assert_eq!(report.summary.avg_daily_orders, 1.0);
        assert_eq!(report.status_breakdown[&OrderStatus::Cancelled], 1);
        assert_eq!(report.status_breakdown[&OrderStatus::Shipped], 0);

        let books = &report.category_performance["Books"];
        assert_eq!(books.orders, 2);
        assert_eq!(books.items, 3);
        assert_eq!(books.revenue, Money::from_cents(3500));
        assert_eq!(books.revenue_share, 87.5);
    }

    #[test]
    fn daily_revenue_has_an_entry_per_day() {
        let range = DateRange::new(day(1), day(3)).unwrap();
        let lines = vec![
            line(1, 3, OrderStatus::Paid, Some("Books"), 1, 250),
            line(9, 20, OrderStatus::Paid, Some("Books"), 1, 999),
        ];

        let report = build_report(range, &lines);

        let dates: Vec<_> = report.daily_revenue.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-03-02", "2024-03-03"]);
        assert_eq!(report.daily_revenue[0].revenue, Money::ZERO);
        assert_eq!(report.daily_revenue[2].revenue, Money::from_cents(250));
        assert_eq!(report.daily_revenue[2].day, "Sun");
        assert_eq!(report.summary.total_orders, 1);
    }

    #[test]
    fn orders_without_items_still_count() {
        let range = DateRange::new(day(1), day(1)).unwrap();
        let lines = vec![line(4, 1, OrderStatus::Pending, None, 0, 0)];

        let report = build_report(range, &lines);

        assert_eq!(report.summary.total_orders, 1);
        assert_eq!(report.summary.total_revenue, Money::ZERO);
        assert!(report.category_performance.is_empty());
        assert_eq!(report.status_breakdown[&OrderStatus::Pending], 1);
    }
}
