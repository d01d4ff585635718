use std::collections::HashSet;

use crate::error::KeyViolation;
use crate::models::RecurringDefinition;

/// Checks that every non-blank definition carries a recurring key and that no
/// key appears twice. Returns the first violation in table order.
///
/// A row with neither a task name nor a key is a blank row and is skipped.
pub fn validate_recurring_keys(definitions: &[RecurringDefinition]) -> Result<(), KeyViolation> {
    let mut seen = HashSet::with_capacity(definitions.len());
    for definition in definitions {
        if definition.task_name.is_empty() && definition.recurring_key.is_empty() {
            continue;
        }
        if definition.recurring_key.is_empty() {
            return Err(KeyViolation::Missing { row: definition.row });
        }
        if !seen.insert(definition.recurring_key.as_str()) {
            return Err(KeyViolation::Duplicate {
                key: definition.recurring_key.clone(),
            });
        }
    }
    Ok(())
}
