//! The `field_mappings` table: CRM field ↔ document token pairs.

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FieldMapping {
    pub id: Uuid,
    pub tenant_id: String,
    /// CRM module the field belongs to, e.g. `Opportunities`.
    pub source_module: String,
    /// CRM field name written on sync.
    pub source_field: String,
    /// Document token name, possibly bracketed (`[[amount]]`).
    pub token: String,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct GetActiveFieldMappings {
    pub tenant_id: String,
}

impl Processor<GetActiveFieldMappings> for DatabaseProcessor {
    type Output = Vec<FieldMapping>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetActiveFieldMappings")]
    async fn process(&self, query: GetActiveFieldMappings) -> Result<Vec<FieldMapping>, sqlx::Error> {
        sqlx::query_as::<_, FieldMapping>(
            r#"
            SELECT id, tenant_id, source_module, source_field, token, active
            FROM field_mappings
            WHERE tenant_id = $1 AND active = TRUE
            ORDER BY source_module ASC, source_field ASC
            "#,
        )
        .bind(query.tenant_id)
        .fetch_all(&self.pool)
        .await
    }
}
