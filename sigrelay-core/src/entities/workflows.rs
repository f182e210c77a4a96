//! The `workflows` table.

use crate::framework::DatabaseProcessor;
use crate::rules::WorkflowDefinition;
use kanau::processor::Processor;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

/// A workflow row as stored, with the definition still raw JSON.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub event_type: String,
    pub active: bool,
    pub definition: Value,
}

/// A workflow with a parsed definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub event_type: String,
    pub active: bool,
    pub definition: WorkflowDefinition,
}

impl TryFrom<WorkflowRow> for Workflow {
    type Error = serde_json::Error;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        let definition = serde_json::from_value(row.definition)?;
        Ok(Workflow {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            event_type: row.event_type,
            active: row.active,
            definition,
        })
    }
}

/// Parse rows into workflows, dropping (and logging) rows whose definition
/// does not deserialize.
pub fn parse_workflows(rows: Vec<WorkflowRow>) -> Vec<Workflow> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            match Workflow::try_from(row) {
                Ok(workflow) => Some(workflow),
                Err(e) => {
                    warn!(workflow_id = %id, error = %e, "Skipping workflow with invalid definition");
                    None
                }
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
/// Active workflows of a tenant triggered by an event type, oldest first.
pub struct GetActiveWorkflows {
    pub tenant_id: String,
    pub event_type: String,
}

impl Processor<GetActiveWorkflows> for DatabaseProcessor {
    type Output = Vec<WorkflowRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetActiveWorkflows")]
    async fn process(&self, query: GetActiveWorkflows) -> Result<Vec<WorkflowRow>, sqlx::Error> {
        sqlx::query_as::<_, WorkflowRow>(
            r#"
            SELECT id, tenant_id, name, event_type, active, definition
            FROM workflows
            WHERE tenant_id = $1 AND event_type = $2 AND active = TRUE
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(query.tenant_id)
        .bind(query.event_type)
        .fetch_all(&self.pool)
        .await
    }
}
