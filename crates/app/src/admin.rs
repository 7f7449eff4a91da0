use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tracing::{info, warn};

use shop_admin_core::export::{self, ExportFormat};
use shop_admin_core::form::{FormData, ValidationError};
use shop_admin_core::listing::{ListParams, ListQuery, ReferenceFilter};
use shop_admin_core::schema::ChildRelation;
use shop_admin_core::{EntityKind, FieldKind, Resource};
use shop_admin_storage::{Database, Repository, RepositoryError};

use crate::problem::AppError;
use crate::router::AppState;
use crate::telemetry;
use crate::views::{
    self, detail_href, list_href, ChildSection, DetailTemplate, EntitySummary, ErrorTemplate,
    FormState, FormTemplate, IndexTemplate, ListTemplate, ReferenceChoices,
};

/// Binds the repository for `$kind` to `$repo` and evaluates `$body` with it.
///
/// Each arm is monomorphised separately, so `$body` may call generic helpers
/// as long as every arm produces the same type.
macro_rules! with_repository {
    ($storage:expr, $kind:expr, $repo:ident => $body:expr) => {
        match $kind {
            EntityKind::Category => {
                let $repo = $storage.categories();
                $body
            }
            EntityKind::Product => {
                let $repo = $storage.products();
                $body
            }
            EntityKind::Customer => {
                let $repo = $storage.customers();
                $body
            }
            EntityKind::Order => {
                let $repo = $storage.orders();
                $body
            }
            EntityKind::OrderItem => {
                let $repo = $storage.order_items();
                $body
            }
        }
    };
}
pub(crate) use with_repository;

pub(crate) fn resolve_kind(slug: &str) -> Result<EntityKind, AppError> {
    EntityKind::from_slug(slug).ok_or_else(|| AppError::UnknownEntity(slug.to_string()))
}

fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse().map_err(|_| AppError::NotFound)
}

/// Error rendered as an HTML page with the matching status code.
pub struct HtmlError(AppError);

impl<E: Into<AppError>> From<E> for HtmlError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        let err = self.0;
        err.log();
        let status = err.status();
        let template = ErrorTemplate {
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            nav: views::nav(None),
            status: status.as_u16(),
            message: err.public_message(),
        };
        match views::render(&template) {
            Ok(body) => (status, Html(body)).into_response(),
            Err(_) => (status, err.public_message()).into_response(),
        }
    }
}

type HtmlResult<T> = Result<T, HtmlError>;

pub async fn index(State(state): State<AppState>) -> HtmlResult<Html<String>> {
    let mut entities = Vec::with_capacity(EntityKind::ALL.len());
    for kind in EntityKind::ALL {
        entities.push(EntitySummary {
            label: kind.plural_label(),
            href: list_href(kind),
            create_href: format!("/admin/{}/create", kind.slug()),
            count: state.storage().count(kind).await?,
        });
    }
    let template = IndexTemplate {
        title: "Site administration".to_string(),
        nav: views::nav(None),
        entities,
    };
    Ok(Html(views::render(&template)?))
}

pub async fn list(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> HtmlResult<Html<String>> {
    let kind = resolve_kind(&entity)?;
    let Query(params) = params?;
    telemetry::record_request(kind, "list");
    let query = ListQuery::from_params(kind, &params)?;
    let storage = state.storage();
    with_repository!(storage, kind, repo => list_page(&repo, storage, &query).await)
}

async fn list_page<R: Repository>(
    repo: &R,
    storage: &Database,
    query: &ListQuery,
) -> HtmlResult<Html<String>> {
    let page = repo.list(query).await?;
    let filter_label = match query.filter {
        Some(filter) => Some(describe_filter(storage, query.kind, filter).await?),
        None => None,
    };
    let template = ListTemplate::new(query, &page, filter_label);
    Ok(Html(views::render(&template)?))
}

/// "Category: Books" style label for an active reference filter.
async fn describe_filter(
    storage: &Database,
    kind: EntityKind,
    filter: ReferenceFilter,
) -> Result<String, AppError> {
    let Some(FieldKind::Reference(target)) = kind.field(filter.field).map(|spec| spec.kind) else {
        return Ok(format!("{} #{}", filter.field, filter.id));
    };
    let title = with_repository!(storage, target, repo => repo.get(filter.id).await.map(|record| record.title()));
    match title {
        Ok(title) => Ok(format!("{}: {title}", target.label())),
        Err(RepositoryError::NotFound) => Ok(format!("{} #{}", target.label(), filter.id)),
        Err(err) => Err(err.into()),
    }
}

pub async fn detail(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> HtmlResult<Html<String>> {
    let kind = resolve_kind(&entity)?;
    let id = parse_id(&id)?;
    telemetry::record_request(kind, "detail");
    let storage = state.storage();
    with_repository!(storage, kind, repo => detail_page(&repo, storage, id).await)
}

async fn detail_page<R: Repository>(
    repo: &R,
    storage: &Database,
    id: i64,
) -> HtmlResult<Html<String>> {
    let record = repo.get(id).await?;
    let mut children = Vec::new();
    for relation in <R::Record as Resource>::KIND.children() {
        children.push(child_section(storage, *relation, id).await?);
    }
    let template = DetailTemplate::new(&record, children);
    Ok(Html(views::render(&template)?))
}

async fn child_section(
    storage: &Database,
    relation: ChildRelation,
    parent_id: i64,
) -> Result<ChildSection, AppError> {
    let query = ListQuery::new(relation.kind)
        .with_filter(relation.field, parent_id)
        .ok_or_else(|| {
            AppError::Internal(format!("'{}' is not a reference field", relation.field))
        })?;
    with_repository!(storage, relation.kind, repo => {
        let records = repo.list_all(&query).await?;
        Ok(ChildSection::new(relation.field, parent_id, &records))
    })
}

/// Select box options for every reference field of `kind`'s form.
async fn reference_choices(
    storage: &Database,
    kind: EntityKind,
) -> Result<ReferenceChoices, AppError> {
    let mut choices = Vec::new();
    for spec in kind.form_fields() {
        if let FieldKind::Reference(target) = spec.kind {
            let options = with_repository!(storage, target, repo => repo.choices().await)?;
            choices.push((spec.name, options));
        }
    }
    Ok(choices)
}

pub async fn create_form(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(prefill): Query<FormData>,
) -> HtmlResult<Html<String>> {
    let kind = resolve_kind(&entity)?;
    telemetry::record_request(kind, "create_form");
    let choices = reference_choices(state.storage(), kind).await?;
    let template = FormTemplate::new(
        kind,
        None,
        FormState {
            values: &prefill,
            errors: None,
            general_errors: Vec::new(),
        },
        &choices,
    );
    Ok(Html(views::render(&template)?))
}

pub async fn create_submit(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Form(form): Form<FormData>,
) -> HtmlResult<Response> {
    let kind = resolve_kind(&entity)?;
    let storage = state.storage();
    with_repository!(storage, kind, repo => save(&repo, storage, None, form).await)
}

pub async fn edit_form(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> HtmlResult<Html<String>> {
    let kind = resolve_kind(&entity)?;
    let id = parse_id(&id)?;
    telemetry::record_request(kind, "edit_form");
    let storage = state.storage();
    let (values, title) = with_repository!(storage, kind, repo => {
        let record = repo.get(id).await?;
        (views::record_values(&record), record.title())
    });
    let choices = reference_choices(storage, kind).await?;
    let template = FormTemplate::new(
        kind,
        Some((id, title)),
        FormState {
            values: &values,
            errors: None,
            general_errors: Vec::new(),
        },
        &choices,
    );
    Ok(Html(views::render(&template)?))
}

pub async fn edit_submit(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    Form(form): Form<FormData>,
) -> HtmlResult<Response> {
    let kind = resolve_kind(&entity)?;
    let id = parse_id(&id)?;
    let storage = state.storage();
    with_repository!(storage, kind, repo => save(&repo, storage, Some(id), form).await)
}

/// Validates and stores a submitted form, redirecting to the saved record.
///
/// Field and constraint failures re-render the form with the submitted
/// values; other failures become an error page.
async fn save<R: Repository>(
    repo: &R,
    storage: &Database,
    id: Option<i64>,
    form: FormData,
) -> HtmlResult<Response> {
    let kind = <R::Record as Resource>::KIND;
    let op = if id.is_some() { "update" } else { "create" };

    let outcome = match <R::Record as Resource>::parse_input(&form) {
        Ok(input) => match id {
            Some(id) => repo.update(id, &input).await,
            None => repo.create(&input).await,
        }
        .map_err(AppError::from),
        Err(errors) => Err(AppError::from(errors)),
    };
    telemetry::record_write(kind, op, outcome.is_ok());

    let err = match outcome {
        Ok(record) => {
            info!(stage = "admin", entity = kind.slug(), id = record.id(), op, "record saved");
            return Ok(Redirect::to(&detail_href(kind, record.id())).into_response());
        }
        Err(err) => err,
    };

    let status = err.status();
    let mut general_errors = Vec::new();
    let validation = match err {
        AppError::Validation(validation) => validation,
        AppError::Repository(RepositoryError::Conflict { field }) => {
            let message = format!("{} with this {field} already exists.", kind.label());
            if kind.field(&field).is_some() {
                ValidationError::single(field, message)
            } else {
                general_errors.push(message);
                ValidationError::default()
            }
        }
        AppError::Repository(
            repository_err @ (RepositoryError::InvalidReference | RepositoryError::Invalid(_)),
        ) => {
            general_errors.push(repository_err.to_string());
            ValidationError::default()
        }
        other => return Err(other.into()),
    };
    warn!(stage = "admin", entity = kind.slug(), op, %status, "submission rejected");

    let editing = id.map(|id| (id, format!("{} #{id}", kind.label())));
    let choices = reference_choices(storage, kind).await?;
    let template = FormTemplate::new(
        kind,
        editing,
        FormState {
            values: &form,
            errors: Some(&validation),
            general_errors,
        },
        &choices,
    );
    Ok((status, Html(views::render(&template)?)).into_response())
}

pub async fn delete(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> HtmlResult<Redirect> {
    let kind = resolve_kind(&entity)?;
    let id = parse_id(&id)?;
    let storage = state.storage();
    let result = with_repository!(storage, kind, repo => repo.delete(id).await);
    telemetry::record_write(kind, "delete", result.is_ok());
    result?;
    info!(stage = "admin", entity = kind.slug(), id, "record deleted");
    Ok(Redirect::to(&list_href(kind)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    #[serde(default)]
    format: Option<String>,
}

/// Downloads every row matching the list parameters, ignoring pagination.
pub async fn export(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
    Query(export): Query<ExportParams>,
) -> HtmlResult<Response> {
    let kind = resolve_kind(&entity)?;
    let Query(params) = params?;
    let format = ExportFormat::from_param(export.format.as_deref()).ok_or_else(|| {
        AppError::InvalidParameter(format!(
            "unsupported export format '{}', expected csv or json",
            export.format.as_deref().unwrap_or_default()
        ))
    })?;
    telemetry::record_request(kind, "export");
    let query = ListQuery::from_params(kind, &params)?.unpaginated();
    let storage = state.storage();
    let body = with_repository!(storage, kind, repo => {
        let records = repo.list_all(&query).await?;
        match format {
            ExportFormat::Csv => export::to_csv(&records),
            ExportFormat::Json => export::to_json(&records)
                .map_err(|err| AppError::Internal(format!("failed to encode export: {err}")))?,
        }
    });

    let disposition = format!(
        "attachment; filename=\"{}.{}\"",
        kind.table_name(),
        format.extension()
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
