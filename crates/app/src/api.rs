use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use shop_admin_core::listing::{ListParams, ListQuery};
use shop_admin_core::EntityKind;
use shop_admin_storage::Repository;

use crate::admin::{resolve_kind, with_repository};
use crate::problem::{AppError, ProblemResponse};
use crate::router::AppState;
use crate::telemetry;

/// JSON page of records using the same parameters as the HTML list.
pub async fn list(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, ProblemResponse> {
    let kind = resolve_kind(&entity)?;
    let Query(params) = params.map_err(AppError::from)?;
    telemetry::record_request(kind, "api_list");
    let query = ListQuery::from_params(kind, &params).map_err(AppError::from)?;
    let storage = state.storage();
    with_repository!(storage, kind, repo => {
        let page = repo.list(&query).await.map_err(AppError::from)?;
        Ok(Json(page).into_response())
    })
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteParams {
    #[serde(default)]
    pks: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    deleted: u64,
}

/// Deletes every id in `pks` or none of them.
pub async fn bulk_delete(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(params): Query<BulkDeleteParams>,
) -> Result<Json<BulkDeleteResponse>, ProblemResponse> {
    let kind = resolve_kind(&entity)?;
    let ids = parse_pks(params.pks.as_deref())?;
    let storage = state.storage();
    let result = with_repository!(storage, kind, repo => repo.delete_many(&ids).await);
    telemetry::record_write(kind, "delete", result.is_ok());
    let deleted = result.map_err(AppError::from)?;
    info!(stage = "api", entity = kind.slug(), deleted, "bulk delete completed");
    Ok(Json(BulkDeleteResponse { deleted }))
}

fn parse_pks(raw: Option<&str>) -> Result<Vec<i64>, AppError> {
    let mut ids = Vec::new();
    for part in raw.unwrap_or_default().split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id = part
            .parse::<i64>()
            .map_err(|_| AppError::InvalidParameter(format!("invalid primary key '{part}'")))?;
        ids.push(id);
    }
    if ids.is_empty() {
        return Err(AppError::InvalidParameter(
            "pks must list at least one id".to_string(),
        ));
    }
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}
