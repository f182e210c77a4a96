use super::{Action, Condition, Operator, WorkflowDefinition};
use crate::payload::{coerce_number, coerce_string, resolve_path};
use serde_json::Value;
use tracing::debug;

/// Which list of a workflow was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Flat,
    Then,
    Else,
}

impl Branch {
    pub fn as_str(self) -> &'static str {
        match self {
            Branch::Flat => "actions",
            Branch::Then => "then",
            Branch::Else => "else",
        }
    }
}

/// Actions a workflow selects for a payload.
///
/// Conditional workflows take `then` when every condition holds and `else`
/// otherwise. Flat workflows always return their list.
pub fn select_actions<'a>(definition: &'a WorkflowDefinition, payload: &Value) -> &'a [Action] {
    select(definition, payload).1
}

/// [`select_actions`] plus the branch taken.
pub fn select<'a>(definition: &'a WorkflowDefinition, payload: &Value) -> (Branch, &'a [Action]) {
    match definition {
        WorkflowDefinition::Flat { actions } => (Branch::Flat, actions.as_slice()),
        WorkflowDefinition::Conditional { rules } => {
            if rules
                .conditions
                .iter()
                .all(|c| evaluate_condition(c, payload))
            {
                (Branch::Then, rules.then.as_slice())
            } else {
                (Branch::Else, rules.otherwise.as_slice())
            }
        }
    }
}

/// Evaluate one condition. Problems degrade to "not met".
pub fn evaluate_condition(condition: &Condition, payload: &Value) -> bool {
    let actual = resolve_path(payload, &condition.field).filter(|v| !v.is_null());
    let expected = condition.value.as_ref().filter(|v| !v.is_null());

    let met = match &condition.operator {
        Operator::Equals => string_pair(actual, expected).is_some_and(|(a, e)| a == e),
        Operator::NotEquals => !string_pair(actual, expected).is_some_and(|(a, e)| a == e),
        Operator::Contains => {
            string_pair(actual, expected).is_some_and(|(a, e)| a.contains(e.as_str()))
        }
        Operator::NotContains => {
            !string_pair(actual, expected).is_some_and(|(a, e)| a.contains(e.as_str()))
        }
        Operator::GreaterThan => number_pair(actual, expected).is_some_and(|(a, e)| a > e),
        Operator::LessThan => number_pair(actual, expected).is_some_and(|(a, e)| a < e),
        Operator::Empty => is_empty(actual),
        Operator::NotEmpty => !is_empty(actual),
        Operator::Unknown(name) => {
            debug!(operator = %name, field = %condition.field, "Unknown operator, condition not met");
            false
        }
    };

    debug!(field = %condition.field, operator = ?condition.operator, met, "Evaluated condition");
    met
}

fn string_pair(actual: Option<&Value>, expected: Option<&Value>) -> Option<(String, String)> {
    Some((coerce_string(actual?)?, coerce_string(expected?)?))
}

fn number_pair(actual: Option<&Value>, expected: Option<&Value>) -> Option<(f64, f64)> {
    Some((coerce_number(actual?)?, coerce_number(expected?)?))
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}
