use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, Row, Sqlite, SqlitePool};
use thiserror::Error;

use shop_admin_core::listing::{ListQuery, Page, SortSpec};
use shop_admin_core::types::Choice;
use shop_admin_core::{EntityKind, Resource};

/// SQL shape of one entity's list/detail query.
pub struct TableSpec {
    pub kind: EntityKind,
    /// `SELECT ... FROM ...` without a `WHERE` clause.
    pub select: &'static str,
    /// Field name to SQL expression used for search and ordering.
    pub columns: &'static [(&'static str, &'static str)],
    /// Reference field name to the foreign key column used for filtering.
    pub references: &'static [(&'static str, &'static str)],
    /// Query returning `id` and `label` columns for select boxes.
    pub choices: Option<&'static str>,
}

impl TableSpec {
    fn column(&self, field: &'static str) -> Result<&'static str, RepositoryError> {
        lookup(self.columns, field)
    }

    fn reference(&self, field: &'static str) -> Result<&'static str, RepositoryError> {
        lookup(self.references, field)
    }
}

fn lookup(
    map: &'static [(&'static str, &'static str)],
    field: &'static str,
) -> Result<&'static str, RepositoryError> {
    map.iter()
        .find(|(name, _)| *name == field)
        .map(|(_, expr)| *expr)
        .ok_or(RepositoryError::UnknownField(field))
}

/// Errors returned by entity repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("a record with the same {field} already exists")]
    Conflict { field: String },
    #[error("a referenced record does not exist")]
    InvalidReference,
    #[error("record is still referenced by other records")]
    InUse,
    #[error("value violates a constraint: {0}")]
    Invalid(String),
    #[error("field '{0}' has no column mapping")]
    UnknownField(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Maps SQLite constraint failures raised by inserts and updates.
pub(crate) fn write_error(err: sqlx::Error) -> RepositoryError {
    classify(err, RepositoryError::InvalidReference)
}

/// Maps SQLite constraint failures raised by deletes.
pub(crate) fn delete_error(err: sqlx::Error) -> RepositoryError {
    classify(err, RepositoryError::InUse)
}

fn classify(err: sqlx::Error, on_foreign_key: RepositoryError) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            // SQLITE_CONSTRAINT_UNIQUE / SQLITE_CONSTRAINT_PRIMARYKEY
            Some("2067") | Some("1555") => {
                let field = db_err
                    .message()
                    .rsplit_once('.')
                    .map(|(_, column)| column.trim().to_string())
                    .unwrap_or_else(|| "key".to_string());
                return RepositoryError::Conflict { field };
            }
            // SQLITE_CONSTRAINT_FOREIGNKEY
            Some("787") => return on_foreign_key,
            // SQLITE_CONSTRAINT_CHECK / SQLITE_CONSTRAINT_NOTNULL
            Some("275") | Some("1299") => {
                return RepositoryError::Invalid(db_err.message().to_string());
            }
            _ => {}
        }
    }
    RepositoryError::Database(err)
}

/// CRUD access to one entity.
///
/// Listing, lookup, counting and deletion are shared and driven by
/// [`TableSpec`]; inserts and updates are entity specific.
#[async_trait]
pub trait Repository: Send + Sync {
    type Record: Resource;
    type Row: for<'r> FromRow<'r, SqliteRow> + Into<Self::Record> + Send + Unpin;

    fn pool(&self) -> &SqlitePool;

    fn spec(&self) -> &'static TableSpec;

    async fn list(&self, query: &ListQuery) -> Result<Page<Self::Record>, RepositoryError> {
        let page = fetch_page::<Self::Row>(self.pool(), self.spec(), query).await?;
        Ok(page.map(Into::into))
    }

    /// Every row matching the query's search, filter and ordering.
    async fn list_all(&self, query: &ListQuery) -> Result<Vec<Self::Record>, RepositoryError> {
        let query = query.clone().unpaginated();
        Ok(self.list(&query).await?.items)
    }

    async fn get(&self, id: i64) -> Result<Self::Record, RepositoryError> {
        fetch_by_id::<Self::Row>(self.pool(), self.spec(), id)
            .await?
            .map(Into::into)
            .ok_or(RepositoryError::NotFound)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        count_rows(self.pool(), self.spec().kind).await
    }

    async fn create(
        &self,
        input: &<Self::Record as Resource>::Input,
    ) -> Result<Self::Record, RepositoryError>;

    async fn update(
        &self,
        id: i64,
        input: &<Self::Record as Resource>::Input,
    ) -> Result<Self::Record, RepositoryError>;

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        self.delete_many(&[id]).await?;
        Ok(())
    }

    /// Deletes all `ids` in one transaction; nothing is deleted when any row
    /// is missing or still referenced.
    async fn delete_many(&self, ids: &[i64]) -> Result<u64, RepositoryError> {
        let table = self.spec().kind.table_name();
        let mut tx = self.pool().begin().await?;
        let mut deleted = 0;
        for id in ids {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(delete_error)?;
            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
            deleted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(deleted)
    }

    /// Options for select boxes referencing this entity.
    async fn choices(&self) -> Result<Vec<Choice>, RepositoryError> {
        let Some(sql) = self.spec().choices else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(sql).fetch_all(self.pool()).await?;
        rows.into_iter()
            .map(|row| -> Result<Choice, RepositoryError> {
                Ok(Choice {
                    id: row.try_get("id")?,
                    label: row.try_get("label")?,
                })
            })
            .collect()
    }
}

pub(crate) async fn count_rows(pool: &SqlitePool, kind: EntityKind) -> Result<u64, RepositoryError> {
    let row = sqlx::query(&format!("SELECT COUNT(*) AS total FROM {}", kind.table_name()))
        .fetch_one(pool)
        .await?;
    let total: i64 = row.try_get("total")?;
    Ok(total as u64)
}

async fn fetch_page<T>(
    pool: &SqlitePool,
    spec: &TableSpec,
    query: &ListQuery,
) -> Result<Page<T>, RepositoryError>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS total FROM (");
    count.push(spec.select);
    push_filters(&mut count, spec, query)?;
    count.push(")");
    let total: i64 = count.build().fetch_one(pool).await?.try_get("total")?;

    let mut select = QueryBuilder::<Sqlite>::new(spec.select);
    push_filters(&mut select, spec, query)?;
    push_order(&mut select, spec, query.sort)?;
    if let Some((limit, offset)) = query.pagination.limit_offset() {
        select.push(" LIMIT ");
        select.push_bind(limit);
        select.push(" OFFSET ");
        select.push_bind(offset);
    }
    let rows = select.build_query_as::<T>().fetch_all(pool).await?;

    Ok(Page::new(rows, total as u64, query.pagination))
}

async fn fetch_by_id<T>(
    pool: &SqlitePool,
    spec: &TableSpec,
    id: i64,
) -> Result<Option<T>, RepositoryError>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let mut select = QueryBuilder::<Sqlite>::new(spec.select);
    select.push(" WHERE ");
    select.push(spec.column("id")?);
    select.push(" = ");
    select.push_bind(id);
    let row = select.build_query_as::<T>().fetch_optional(pool).await?;
    Ok(row)
}

fn push_filters(
    builder: &mut QueryBuilder<'_, Sqlite>,
    spec: &TableSpec,
    query: &ListQuery,
) -> Result<(), RepositoryError> {
    let mut keyword = " WHERE ";

    if let Some(term) = query.search.as_deref() {
        let pattern = format!("%{}%", escape_like(term));
        builder.push(keyword);
        builder.push("(");
        for (position, field) in spec.kind.searchable_fields().iter().enumerate() {
            if position > 0 {
                builder.push(" OR ");
            }
            builder.push(spec.column(*field)?);
            builder.push(" LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\'");
        }
        builder.push(")");
        keyword = " AND ";
    }

    if let Some(filter) = query.filter {
        builder.push(keyword);
        builder.push(spec.reference(filter.field)?);
        builder.push(" = ");
        builder.push_bind(filter.id);
    }

    Ok(())
}

fn push_order(
    builder: &mut QueryBuilder<'_, Sqlite>,
    spec: &TableSpec,
    sort: SortSpec,
) -> Result<(), RepositoryError> {
    builder.push(" ORDER BY ");
    builder.push(spec.column(sort.field)?);
    builder.push(if sort.descending { " DESC" } else { " ASC" });
    if sort.field != "id" {
        builder.push(", ");
        builder.push(spec.column("id")?);
        builder.push(" ASC");
    }
    Ok(())
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn unknown_fields_are_reported() {
        static SPEC: TableSpec = TableSpec {
            kind: EntityKind::Category,
            select: "SELECT id FROM categories",
            columns: &[("id", "id")],
            references: &[],
            choices: None,
        };
        assert_eq!(SPEC.column("id").unwrap(), "id");
        assert!(matches!(
            SPEC.column("name"),
            Err(RepositoryError::UnknownField("name"))
        ));
    }
}
