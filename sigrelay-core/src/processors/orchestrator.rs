//! EventProcessor: turns one claimed event into action results.
//!
//! Resolves the tenant, loads its active workflows and field mappings, runs
//! the evaluator and the executor, and assembles the audit object written
//! to `response`:
//!
//! ```json
//! {"workflows": [...], "actionsDetails": [...], "completedActions": [...], "errors": [...]}
//! ```

use crate::actions::{ActionContext, ActionExecutor, ActionResult, ActionScope, ActionStatus};
use crate::config::TenantDirectory;
use crate::entities::events::EventRecord;
use crate::processors::scheduler::{AttemptHandler, AttemptOutcome};
use crate::rules::select;
use crate::store::RuleStore;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct EventProcessor {
    tenants: Arc<dyn TenantDirectory>,
    rules: Arc<dyn RuleStore>,
    executor: ActionExecutor,
}

/// Accumulates the audit object across the workflows of one attempt.
struct Audit {
    workflows: Vec<Value>,
    details: Vec<Value>,
    completed: Vec<String>,
    errors: Vec<String>,
    triggered: i32,
}

impl Audit {
    fn resume(event: &EventRecord) -> Self {
        Self {
            workflows: Vec::new(),
            details: event.action_history(),
            completed: event.completed_actions(),
            errors: Vec::new(),
            triggered: 0,
        }
    }

    fn fail(mut self, message: String) -> AttemptOutcome {
        self.errors.push(message);
        self.finish()
    }

    fn record(&mut self, workflow: &str, result: &ActionResult) {
        match result.status {
            ActionStatus::Success => {
                self.triggered += 1;
                if !self.completed.contains(&result.idempotency_key) {
                    self.completed.push(result.idempotency_key.clone());
                }
            }
            ActionStatus::Error => {
                self.errors.push(format!(
                    "{workflow}: {}: {}",
                    result.action_type, result.message
                ));
            }
            ActionStatus::Skipped => {}
        }
        self.details
            .push(serde_json::to_value(result).unwrap_or(Value::Null));
    }

    fn finish(self) -> AttemptOutcome {
        let success = self.errors.is_empty();
        let error_message = (!success).then(|| self.errors.join("; "));
        AttemptOutcome {
            success,
            error_message,
            actions_triggered: self.triggered,
            response: json!({
                "workflows": self.workflows,
                "actionsDetails": self.details,
                "completedActions": self.completed,
                "errors": self.errors,
            }),
        }
    }
}

impl EventProcessor {
    pub fn new(
        tenants: Arc<dyn TenantDirectory>,
        rules: Arc<dyn RuleStore>,
        executor: ActionExecutor,
    ) -> Self {
        Self {
            tenants,
            rules,
            executor,
        }
    }
}

#[async_trait]
impl AttemptHandler for EventProcessor {
    async fn handle(&self, event: &EventRecord) -> AttemptOutcome {
        let mut audit = Audit::resume(event);

        let Some(tenant) = self.tenants.tenant(&event.tenant_id).await else {
            return audit.fail(format!("tenant {} not found", event.tenant_id));
        };
        if !tenant.active {
            return audit.fail(format!("tenant {} is inactive", tenant.id));
        }

        let workflows = match self
            .rules
            .active_workflows(&tenant.id, &event.event_type)
            .await
        {
            Ok(workflows) => workflows,
            Err(e) => return audit.fail(format!("failed to load workflows: {e}")),
        };
        if workflows.is_empty() {
            debug!(event_id = %event.id, event_type = %event.event_type, "No active workflows");
            return audit.finish();
        }

        let mappings = match self.rules.active_field_mappings(&tenant.id).await {
            Ok(mappings) => mappings,
            Err(e) => return audit.fail(format!("failed to load field mappings: {e}")),
        };

        let already_done: HashSet<String> = audit.completed.iter().cloned().collect();
        let ctx = ActionContext {
            event,
            tenant: &tenant,
            mappings: &mappings,
        };

        for workflow in &workflows {
            let (branch, actions) = select(&workflow.definition, &event.payload);
            let errors_before = audit.errors.len();

            for (index, action) in actions.iter().enumerate() {
                let scope = ActionScope::new(event, workflow.id, index);
                let result = if already_done.contains(&scope.idempotency_key) {
                    audit.triggered += 1;
                    ActionResult::already_completed(action, &scope)
                } else {
                    self.executor.execute(action, ctx, &scope).await
                };
                audit.record(&workflow.name, &result);
            }

            let failed = audit.errors.len() - errors_before;
            if failed > 0 {
                warn!(event_id = %event.id, workflow = %workflow.name, failed, "Workflow had failing actions");
            }
            audit.workflows.push(json!({
                "id": workflow.id,
                "name": workflow.name,
                "branch": branch.as_str(),
                "actions": actions.len(),
                "errors": failed,
            }));
        }

        info!(
            event_id = %event.id,
            tenant_id = %tenant.id,
            workflows = workflows.len(),
            actions_triggered = audit.triggered,
            errors = audit.errors.len(),
            "Attempt evaluated"
        );
        audit.finish()
    }
}
