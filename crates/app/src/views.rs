//! Askama templates and the view models they render.
//!
//! Builders here turn records into plain strings so templates stay free of
//! domain logic.

use askama::Template;

use shop_admin_core::dashboard::DashboardReport;
use shop_admin_core::form::{FormData, ValidationError};
use shop_admin_core::listing::{ListQuery, Page, Pagination, SortSpec, DEFAULT_PER_PAGE};
use shop_admin_core::types::Choice;
use shop_admin_core::{EntityKind, FieldKind, FieldSpec, FieldValue, Resource};

use crate::problem::AppError;

pub struct NavLink {
    pub label: &'static str,
    pub href: String,
    pub active: bool,
}

pub fn nav(active: Option<EntityKind>) -> Vec<NavLink> {
    EntityKind::ALL
        .into_iter()
        .map(|kind| NavLink {
            label: kind.plural_label(),
            href: list_href(kind),
            active: Some(kind) == active,
        })
        .collect()
}

pub fn list_href(kind: EntityKind) -> String {
    format!("/admin/{}", kind.slug())
}

pub fn detail_href(kind: EntityKind, id: i64) -> String {
    format!("/admin/{}/{id}", kind.slug())
}

/// List URL carrying the non-default parts of `query`.
pub fn query_href(query: &ListQuery) -> String {
    query_href_at(&list_href(query.kind), query)
}

fn query_href_at(base: &str, query: &ListQuery) -> String {
    match serde_urlencoded::to_string(query.to_params()) {
        Ok(params) if !params.is_empty() => format!("{base}?{params}"),
        _ => base.to_string(),
    }
}

pub fn render<T: Template>(template: &T) -> Result<String, AppError> {
    template
        .render()
        .map_err(|err| AppError::Internal(format!("template rendering failed: {err}")))
}

pub struct Cell {
    pub text: String,
    pub href: Option<String>,
}

impl Cell {
    fn new(spec: &FieldSpec, value: FieldValue) -> Self {
        let href = match (spec.kind, value.reference_id()) {
            (FieldKind::Reference(target), Some(id)) => Some(detail_href(target, id)),
            _ => None,
        };
        Self {
            text: value.display(),
            href,
        }
    }
}

pub struct ColumnHeader {
    pub label: &'static str,
    pub href: Option<String>,
    pub indicator: &'static str,
}

pub struct RowView {
    pub href: String,
    pub cells: Vec<Cell>,
}

pub struct TableView {
    pub columns: Vec<ColumnHeader>,
    pub rows: Vec<RowView>,
}

impl TableView {
    /// Table of the list columns; headers link to re-sorted lists when a
    /// `query` is given.
    pub fn build<R: Resource>(records: &[R], query: Option<&ListQuery>) -> Self {
        let kind = R::KIND;
        let columns = kind
            .list_fields()
            .map(|spec| {
                let Some(query) = query.filter(|_| kind.is_sortable(spec.name)) else {
                    return ColumnHeader {
                        label: spec.label,
                        href: None,
                        indicator: "",
                    };
                };
                let active = query.sort.field == spec.name;
                let sort = if active {
                    query.sort.toggled()
                } else {
                    SortSpec::ascending(spec.name)
                };
                let mut next = query.clone();
                next.sort = sort;
                next.pagination = Pagination::Page {
                    page: 1,
                    per_page: per_page(query),
                };
                ColumnHeader {
                    label: spec.label,
                    href: Some(query_href(&next)),
                    indicator: match (active, query.sort.descending) {
                        (false, _) => "",
                        (true, false) => " \u{25b2}",
                        (true, true) => " \u{25bc}",
                    },
                }
            })
            .collect();

        let rows = records
            .iter()
            .map(|record| RowView {
                href: detail_href(kind, record.id()),
                cells: kind
                    .list_fields()
                    .map(|spec| Cell::new(spec, record.value(spec.name)))
                    .collect(),
            })
            .collect();

        Self { columns, rows }
    }
}

fn per_page(query: &ListQuery) -> u32 {
    match query.pagination {
        Pagination::Page { per_page, .. } => per_page,
        Pagination::All => DEFAULT_PER_PAGE,
    }
}

pub struct EntitySummary {
    pub label: &'static str,
    pub href: String,
    pub create_href: String,
    pub count: u64,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub title: String,
    pub nav: Vec<NavLink>,
    pub entities: Vec<EntitySummary>,
}

#[derive(Template)]
#[template(path = "list.html")]
pub struct ListTemplate {
    pub title: String,
    pub nav: Vec<NavLink>,
    pub action: String,
    pub search: String,
    pub sort: String,
    pub filter: String,
    pub filter_note: Option<String>,
    pub clear_href: String,
    pub table: TableView,
    pub total: u64,
    pub page: u32,
    pub page_count: u32,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
    pub create_href: String,
    pub export_csv_href: String,
    pub export_json_href: String,
}

impl ListTemplate {
    pub fn new<R: Resource>(query: &ListQuery, page: &Page<R>, filter_label: Option<String>) -> Self {
        let kind = R::KIND;
        let params = query.to_params();
        let page_link = |number: u32| {
            let mut target = query.clone();
            target.pagination = Pagination::Page {
                page: number,
                per_page: page.per_page,
            };
            query_href(&target)
        };
        let export_base = format!("/admin/{}/export", kind.slug());
        let mut export_query = query.clone();
        export_query.pagination = Pagination::Page {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        };
        let export_href = query_href_at(&export_base, &export_query);
        let separator = if export_href.contains('?') { '&' } else { '?' };

        let mut cleared = query.clone();
        cleared.filter = None;
        cleared.search = None;
        cleared.pagination = Pagination::Page {
            page: 1,
            per_page: page.per_page,
        };

        Self {
            title: kind.plural_label().to_string(),
            nav: nav(Some(kind)),
            action: list_href(kind),
            search: params.search.unwrap_or_default(),
            sort: params.sort.unwrap_or_default(),
            filter: params.filter.unwrap_or_default(),
            filter_note: filter_label,
            clear_href: query_href(&cleared),
            table: TableView::build(&page.items, Some(query)),
            total: page.total,
            page: page.page,
            page_count: page.page_count(),
            prev_href: page.has_previous().then(|| page_link(page.page - 1)),
            next_href: page.has_next().then(|| page_link(page.page + 1)),
            create_href: format!("/admin/{}/create", kind.slug()),
            export_csv_href: format!("{export_href}{separator}format=csv"),
            export_json_href: format!("{export_href}{separator}format=json"),
        }
    }
}

pub struct DetailField {
    pub label: &'static str,
    pub cell: Cell,
}

pub struct ChildSection {
    pub title: &'static str,
    pub list_href: String,
    pub create_href: String,
    pub table: TableView,
}

#[derive(Template)]
#[template(path = "detail.html")]
pub struct DetailTemplate {
    pub title: String,
    pub nav: Vec<NavLink>,
    pub kind_label: &'static str,
    pub fields: Vec<DetailField>,
    pub children: Vec<ChildSection>,
    pub list_href: String,
    pub edit_href: String,
    pub delete_href: String,
}

impl DetailTemplate {
    pub fn new<R: Resource>(record: &R, children: Vec<ChildSection>) -> Self {
        let kind = R::KIND;
        let base = detail_href(kind, record.id());
        Self {
            title: record.title(),
            nav: nav(Some(kind)),
            kind_label: kind.label(),
            fields: kind
                .fields()
                .iter()
                .map(|spec| DetailField {
                    label: spec.label,
                    cell: Cell::new(spec, record.value(spec.name)),
                })
                .collect(),
            children,
            list_href: list_href(kind),
            edit_href: format!("{base}/edit"),
            delete_href: format!("{base}/delete"),
        }
    }
}

impl ChildSection {
    pub fn new<R: Resource>(field: &str, parent_id: i64, records: &[R]) -> Self {
        let kind = R::KIND;
        let filter = format!("{field}:{parent_id}");
        let prefill = serde_urlencoded::to_string(vec![(field, parent_id.to_string())])
            .unwrap_or_default();
        Self {
            title: kind.plural_label(),
            list_href: format!(
                "{}?{}",
                list_href(kind),
                serde_urlencoded::to_string(vec![("filter", filter)]).unwrap_or_default()
            ),
            create_href: format!("/admin/{}/create?{prefill}", kind.slug()),
            table: TableView::build(records, None),
        }
    }
}

pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub widget: &'static str,
    pub required: bool,
    pub value: String,
    pub checked: bool,
    pub options: Vec<SelectOption>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "form.html")]
pub struct FormTemplate {
    pub title: String,
    pub nav: Vec<NavLink>,
    pub action: String,
    pub cancel_href: String,
    pub submit_label: &'static str,
    pub fields: Vec<FormField>,
    pub errors: Vec<String>,
}

/// Options for every reference field of a form, in field order.
pub type ReferenceChoices = Vec<(&'static str, Vec<Choice>)>;

pub struct FormState<'a> {
    pub values: &'a FormData,
    pub errors: Option<&'a ValidationError>,
    pub general_errors: Vec<String>,
}

impl FormTemplate {
    pub fn new(
        kind: EntityKind,
        editing: Option<(i64, String)>,
        state: FormState<'_>,
        choices: &ReferenceChoices,
    ) -> Self {
        let (title, action, cancel_href, submit_label) = match editing {
            Some((id, title)) => {
                let base = detail_href(kind, id);
                (format!("Edit {title}"), format!("{base}/edit"), base, "Save")
            }
            None => (
                format!("New {}", kind.label()),
                format!("/admin/{}/create", kind.slug()),
                list_href(kind),
                "Create",
            ),
        };

        let fields = kind
            .form_fields()
            .map(|spec| {
                let value = state.values.get(spec.name).cloned().unwrap_or_default();
                let options = match spec.kind {
                    FieldKind::Choice(values) => values
                        .iter()
                        .map(|option| SelectOption {
                            value: option.to_string(),
                            label: option.to_string(),
                            selected: value.eq_ignore_ascii_case(option),
                        })
                        .collect(),
                    FieldKind::Reference(_) => choices
                        .iter()
                        .find(|(name, _)| *name == spec.name)
                        .map(|(_, options)| {
                            options
                                .iter()
                                .map(|choice| {
                                    let id = choice.id.to_string();
                                    SelectOption {
                                        selected: id == value,
                                        value: id,
                                        label: choice.label.clone(),
                                    }
                                })
                                .collect()
                        })
                        .unwrap_or_default(),
                    _ => Vec::new(),
                };
                FormField {
                    name: spec.name,
                    label: spec.label,
                    widget: widget(spec.kind),
                    required: spec.required,
                    checked: matches!(value.as_str(), "on" | "true" | "1"),
                    value,
                    options,
                    error: state
                        .errors
                        .and_then(|errors| errors.message_for(spec.name))
                        .map(str::to_string),
                }
            })
            .collect();

        Self {
            title,
            nav: nav(Some(kind)),
            action,
            cancel_href,
            submit_label,
            fields,
            errors: state.general_errors,
        }
    }
}

fn widget(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Id | FieldKind::Text => "text",
        FieldKind::LongText => "textarea",
        FieldKind::Email => "email",
        FieldKind::Integer => "number",
        FieldKind::Money => "money",
        FieldKind::Boolean => "checkbox",
        FieldKind::Timestamp => "datetime",
        FieldKind::Choice(_) | FieldKind::Reference(_) => "select",
    }
}

/// Current form values of a stored record.
pub fn record_values<R: Resource>(record: &R) -> FormData {
    R::KIND
        .form_fields()
        .map(|spec| (spec.name.to_string(), record.value(spec.name).form_value()))
        .collect()
}

pub struct DayBar {
    pub date: String,
    pub day: String,
    pub revenue: String,
    pub orders: u64,
    pub percent: u32,
}

pub struct CategoryRow {
    pub name: String,
    pub orders: u64,
    pub items: i64,
    pub revenue: String,
    pub share: f64,
}

pub struct StatusRow {
    pub status: &'static str,
    pub count: u64,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub title: String,
    pub nav: Vec<NavLink>,
    pub start: String,
    pub end: String,
    pub days: i64,
    pub total_orders: u64,
    pub total_revenue: String,
    pub items_sold: i64,
    pub avg_daily_revenue: String,
    pub avg_daily_orders: f64,
    pub daily: Vec<DayBar>,
    pub categories: Vec<CategoryRow>,
    pub statuses: Vec<StatusRow>,
}

impl DashboardTemplate {
    pub fn new(report: &DashboardReport) -> Self {
        let peak = report
            .daily_revenue
            .iter()
            .map(|day| day.revenue.cents())
            .max()
            .unwrap_or(0);
        let daily = report
            .daily_revenue
            .iter()
            .map(|day| DayBar {
                date: day.date.clone(),
                day: day.day.clone(),
                revenue: day.revenue.to_string(),
                orders: day.orders,
                percent: if peak > 0 {
                    (day.revenue.cents() * 100 / peak) as u32
                } else {
                    0
                },
            })
            .collect();

        Self {
            title: "Sales dashboard".to_string(),
            nav: nav(None),
            start: report.date_range.start.clone(),
            end: report.date_range.end.clone(),
            days: report.date_range.days,
            total_orders: report.summary.total_orders,
            total_revenue: report.summary.total_revenue.to_string(),
            items_sold: report.summary.items_sold,
            avg_daily_revenue: format!("{:.2}", report.summary.avg_daily_revenue),
            avg_daily_orders: report.summary.avg_daily_orders,
            daily,
            categories: report
                .category_performance
                .iter()
                .map(|(name, perf)| CategoryRow {
                    name: name.clone(),
                    orders: perf.orders,
                    items: perf.items,
                    revenue: perf.revenue.to_string(),
                    share: perf.revenue_share,
                })
                .collect(),
            statuses: report
                .status_breakdown
                .iter()
                .map(|(status, count)| StatusRow {
                    status: status.as_str(),
                    count: *count,
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub title: String,
    pub nav: Vec<NavLink>,
    pub status: u16,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_admin_core::listing::ListParams;
    use shop_admin_core::types::Category;
    use shop_admin_core::Money;

    fn category(id: i64, name: &str) -> Category {
        Category {
            id,
            name: name.to_string(),
            description: None,
            product_count: 0,
        }
    }

    #[test]
    fn query_href_omits_defaults() {
        let query = ListQuery::new(EntityKind::Product);
        assert_eq!(query_href(&query), "/admin/product");

        let params = ListParams {
            search: Some("mug set".to_string()),
            sort: Some("-price".to_string()),
            page: Some(2),
            ..ListParams::default()
        };
        let query = ListQuery::from_params(EntityKind::Product, &params).unwrap();
        assert_eq!(
            query_href(&query),
            "/admin/product?search=mug+set&sort=-price&page=2"
        );
    }

    #[test]
    fn headers_toggle_the_active_sort() {
        let query = ListQuery::new(EntityKind::Category);
        let table = TableView::build(&[category(1, "Books")], Some(&query));

        let name = table.columns.iter().find(|c| c.label == "Name").unwrap();
        assert_eq!(name.indicator, " \u{25b2}");
        assert_eq!(name.href.as_deref(), Some("/admin/category?sort=-name"));

        let id = table.columns.iter().find(|c| c.label == "ID").unwrap();
        assert_eq!(id.href.as_deref(), Some("/admin/category?sort=id"));
        assert_eq!(table.rows[0].href, "/admin/category/1");
    }

    #[test]
    fn reference_cells_link_to_their_target() {
        let spec = EntityKind::Product.field("category_id").unwrap();
        let cell = Cell::new(
            spec,
            FieldValue::Reference {
                id: 3,
                label: "Clothing".to_string(),
            },
        );
        assert_eq!(cell.text, "Clothing");
        assert_eq!(cell.href.as_deref(), Some("/admin/category/3"));

        let spec = EntityKind::Product.field("price").unwrap();
        let cell = Cell::new(spec, FieldValue::Money(Money::from_cents(1999)));
        assert_eq!(cell.text, "19.99");
        assert!(cell.href.is_none());
    }

    #[test]
    fn form_marks_selected_choice_and_errors() {
        let values: FormData = [("status".to_string(), "paid".to_string())].into();
        let errors = ValidationError::single("customer_id", "select a customer");
        let choices: ReferenceChoices = vec![(
            "customer_id",
            vec![Choice {
                id: 7,
                label: "Alice".to_string(),
            }],
        )];
        let template = FormTemplate::new(
            EntityKind::Order,
            None,
            FormState {
                values: &values,
                errors: Some(&errors),
                general_errors: Vec::new(),
            },
            &choices,
        );

        let status = template.fields.iter().find(|f| f.name == "status").unwrap();
        assert!(status.options.iter().any(|o| o.value == "paid" && o.selected));
        let customer = template.fields.iter().find(|f| f.name == "customer_id").unwrap();
        assert_eq!(customer.error.as_deref(), Some("select a customer"));
        assert_eq!(customer.options.len(), 1);
        assert_eq!(template.action, "/admin/order/create");
    }
}
