//! Contacts repository on Postgres.

use async_trait::async_trait;
use sqlx::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{map_sqlx_error, PostgresRepositories};
use crate::application::repos::{ContactsRepo, RepoError};
use crate::domain::contacts::ContactRecord;

#[derive(sqlx::FromRow)]
struct ContactRow {
    id: Uuid,
    company_id: Uuid,
    full_name: String,
    title: String,
    location: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    linkedin_url: Option<String>,
    unlock_cost: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ContactRow> for ContactRecord {
    fn from(row: ContactRow) -> Self {
        Self {
            id: row.id,
            company_id: row.company_id,
            full_name: row.full_name,
            title: row.title,
            location: row.location,
            email: row.email,
            phone: row.phone,
            linkedin_url: row.linkedin_url,
            unlock_cost: row.unlock_cost,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl ContactsRepo for PostgresRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ContactRecord>, RepoError> {
        let row: Option<ContactRow> = query_as(
            "SELECT id, company_id, full_name, title, location, email, phone, \
             linkedin_url, unlock_cost, created_at, updated_at \
             FROM contacts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }
}
