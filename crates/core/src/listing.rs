use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{EntityKind, FieldKind};

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Raw list parameters as they arrive on the query string.
///
/// `sort` names a field, prefixed with `-` for descending order. `filter` has
/// the form `field:id` and narrows the list to rows referencing one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: &'static str,
    pub descending: bool,
}

impl SortSpec {
    pub const fn ascending(field: &'static str) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub const fn descending(field: &'static str) -> Self {
        Self {
            field,
            descending: true,
        }
    }

    pub fn to_param(self) -> String {
        if self.descending {
            format!("-{}", self.field)
        } else {
            self.field.to_string()
        }
    }

    /// The same field in the opposite direction.
    pub fn toggled(self) -> Self {
        Self {
            descending: !self.descending,
            ..self
        }
    }
}

/// Restricts a list to rows whose reference `field` points at `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceFilter {
    pub field: &'static str,
    pub id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    Page { page: u32, per_page: u32 },
    All,
}

impl Pagination {
    /// `(limit, offset)` for SQL, or `None` when every row is requested.
    pub fn limit_offset(self) -> Option<(i64, i64)> {
        match self {
            Self::Page { page, per_page } => {
                let offset = i64::from(page.saturating_sub(1)) * i64::from(per_page);
                Some((i64::from(per_page), offset))
            }
            Self::All => None,
        }
    }
}

/// A validated list request for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub kind: EntityKind,
    pub search: Option<String>,
    pub sort: SortSpec,
    pub filter: Option<ReferenceFilter>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("cannot sort by '{0}'")]
    UnknownSortField(String),
    #[error("invalid filter '{0}', expected <reference field>:<id>")]
    InvalidFilter(String),
}

impl ListQuery {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            search: None,
            sort: kind.default_sort(),
            filter: None,
            pagination: Pagination::Page {
                page: 1,
                per_page: DEFAULT_PER_PAGE,
            },
        }
    }

    pub fn from_params(kind: EntityKind, params: &ListParams) -> Result<Self, ListError> {
        let mut query = Self::new(kind);

        query.search = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string);

        if let Some(raw) = params.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let (name, descending) = match raw.strip_prefix('-') {
                Some(name) => (name, true),
                None => (raw, false),
            };
            let field = kind
                .sortable_fields()
                .iter()
                .copied()
                .find(|candidate| *candidate == name)
                .ok_or_else(|| ListError::UnknownSortField(raw.to_string()))?;
            query.sort = SortSpec { field, descending };
        }

        if let Some(raw) = params.filter.as_deref().filter(|s| !s.is_empty()) {
            query.filter = Some(parse_filter(kind, raw)?);
        }

        let page = params.page.unwrap_or(1).max(1);
        let per_page = params
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        query.pagination = Pagination::Page { page, per_page };

        Ok(query)
    }

    /// Narrows the list to children of one parent record.
    ///
    /// Returns `None` when `field` is not a reference field of this entity.
    pub fn with_filter(mut self, field: &str, id: i64) -> Option<Self> {
        let spec = self.kind.field(field)?;
        if !matches!(spec.kind, FieldKind::Reference(_)) {
            return None;
        }
        self.filter = Some(ReferenceFilter {
            field: spec.name,
            id,
        });
        Some(self)
    }

    pub fn unpaginated(mut self) -> Self {
        self.pagination = Pagination::All;
        self
    }

    /// Query-string form of this request, used to build navigation links.
    pub fn to_params(&self) -> ListParams {
        let (page, per_page) = match self.pagination {
            Pagination::Page { page, per_page } => (
                Some(page).filter(|p| *p > 1),
                Some(per_page).filter(|p| *p != DEFAULT_PER_PAGE),
            ),
            Pagination::All => (None, None),
        };
        ListParams {
            search: self.search.clone(),
            sort: Some(self.sort)
                .filter(|sort| *sort != self.kind.default_sort())
                .map(SortSpec::to_param),
            filter: self
                .filter
                .map(|filter| format!("{}:{}", filter.field, filter.id)),
            page,
            per_page,
        }
    }
}

fn parse_filter(kind: EntityKind, raw: &str) -> Result<ReferenceFilter, ListError> {
    let invalid = || ListError::InvalidFilter(raw.to_string());
    let (field, id) = raw.split_once(':').ok_or_else(invalid)?;
    let id: i64 = id.trim().parse().map_err(|_| invalid())?;
    let spec = kind.field(field.trim()).ok_or_else(invalid)?;
    match spec.kind {
        FieldKind::Reference(_) => Ok(ReferenceFilter {
            field: spec.name,
            id,
        }),
        _ => Err(invalid()),
    }
}

/// One page of records plus the size of the full result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let (page, per_page) = match pagination {
            Pagination::Page { page, per_page } => (page, per_page),
            Pagination::All => (1, u32::try_from(items.len()).unwrap_or(u32::MAX).max(1)),
        };
        Self {
            items,
            total,
            page,
            per_page,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }

    pub fn page_count(&self) -> u32 {
        let per_page = u64::from(self.per_page.max(1));
        let pages = self.total.div_ceil(per_page).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.page_count()
    }
}
