//! Ramification execution
//!
//! Due pending ramifications are applied to a dynamic rendition of the state
//! document, one at a time, in list order. Each ramification reaches a
//! terminal status exactly once: `executed` on success, `failed` with a
//! reason on any error. A failure never aborts the run and never touches the
//! document: the mutation is applied against a copy-validated snapshot and
//! reverted if the result no longer parses as a world state.
//!
//! The ramification list itself is lifted out of the document before the run,
//! so no target path can rewrite execution history.

use crate::core::error::Result;
use crate::core::types::Operation;
use crate::state::path::{PathSegment, TargetPath};
use crate::state::{validate_document, GlobalState, Ramification};
use chrono::NaiveDate;
use serde_json::{Number, Value};
use tracing::{debug, info, warn};

/// Counts for the step summary
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReport {
    pub executed: usize,
    pub failed: usize,
}

/// Run every ramification due at `now` against the state document.
pub fn execute_pending_ramifications(
    state: &mut GlobalState,
    now: NaiveDate,
) -> Result<ExecutionReport> {
    let mut ramifications = std::mem::take(&mut state.ramifications);
    let mut doc = serde_json::to_value(&*state)?;
    let mut report = ExecutionReport::default();

    for ramification in ramifications.iter_mut() {
        if !ramification.is_due(now) {
            continue;
        }
        match apply_ramification(&mut doc, ramification) {
            Ok(()) => {
                debug!(
                    ramification = %ramification.ramification_id.0,
                    path = %ramification.target_path,
                    op = ramification.operation.name(),
                    "Ramification executed"
                );
                ramification.mark_executed();
                report.executed += 1;
            }
            Err(reason) => {
                warn!(
                    ramification = %ramification.ramification_id.0,
                    path = %ramification.target_path,
                    op = ramification.operation.name(),
                    reason = %reason,
                    "Ramification failed"
                );
                ramification.mark_failed(reason);
                report.failed += 1;
            }
        }
    }

    *state = serde_json::from_value(doc)?;
    state.ramifications = ramifications;

    if report.executed + report.failed > 0 {
        info!(
            executed = report.executed,
            failed = report.failed,
            "Ramification run finished"
        );
    }
    Ok(report)
}

/// Apply one mutation, keeping the document structurally valid. Any error
/// leaves `doc` exactly as it was.
fn apply_ramification(doc: &mut Value, ramification: &Ramification) -> std::result::Result<(), String> {
    let path = TargetPath::parse(&ramification.target_path)
        .map_err(|e| format!("Invalid targetPath '{}': {}", ramification.target_path, e))?;

    let snapshot = doc.clone();
    let outcome = apply_operation(doc, &path, ramification);
    match outcome {
        Ok(()) => {
            if let Err(e) = validate_document(doc) {
                *doc = snapshot;
                return Err(format!("Mutation broke document structure: {}", e));
            }
            Ok(())
        }
        Err(reason) => {
            *doc = snapshot;
            Err(reason)
        }
    }
}

fn apply_operation(
    doc: &mut Value,
    path: &TargetPath,
    ramification: &Ramification,
) -> std::result::Result<(), String> {
    match ramification.operation {
        Operation::Set => path.set(doc, ramification.value.clone()),
        Operation::Add | Operation::Subtract | Operation::Multiply | Operation::Divide => {
            apply_arithmetic(doc, path, ramification)
        }
        Operation::RemoveItem => apply_remove_item(doc, path, ramification),
        Operation::UpdateItem => apply_update_item(doc, path, ramification),
        Operation::Unsupported => Err("Unsupported operation".to_string()),
    }
}

fn apply_arithmetic(
    doc: &mut Value,
    path: &TargetPath,
    ramification: &Ramification,
) -> std::result::Result<(), String> {
    let slot = path
        .resolve_mut(doc)
        .ok_or_else(|| format!("Target path '{}' does not exist", path))?;

    // `add` on a list appends; the other operators are strictly numeric.
    if ramification.operation == Operation::Add {
        if let Some(list) = slot.as_array_mut() {
            list.push(ramification.value.clone());
            return Ok(());
        }
    }

    let current = slot
        .as_f64()
        .ok_or_else(|| format!("Target at '{}' is not a number", path))?;
    let operand = ramification
        .value
        .as_f64()
        .ok_or_else(|| format!("Value for {} at '{}' is not a number", ramification.operation.name(), path))?;

    if ramification.operation == Operation::Divide && operand == 0.0 {
        return Err("Cannot divide by zero".to_string());
    }

    // Integer inputs keep integer results except for division.
    let both_integral = slot.is_i64() && ramification.value.is_i64();
    let result = if both_integral && ramification.operation != Operation::Divide {
        let a = slot.as_i64().unwrap_or_default();
        let b = ramification.value.as_i64().unwrap_or_default();
        let computed = match ramification.operation {
            Operation::Add => a.checked_add(b),
            Operation::Subtract => a.checked_sub(b),
            Operation::Multiply => a.checked_mul(b),
            _ => None,
        };
        match computed {
            Some(n) => Value::Number(Number::from(n)),
            // Overflow falls back to float math.
            None => float_result(current, operand, ramification.operation)?,
        }
    } else {
        float_result(current, operand, ramification.operation)?
    };

    *slot = result;
    Ok(())
}

fn float_result(a: f64, b: f64, op: Operation) -> std::result::Result<Value, String> {
    let computed = match op {
        Operation::Add => a + b,
        Operation::Subtract => a - b,
        Operation::Multiply => a * b,
        Operation::Divide => a / b,
        _ => return Err(format!("{} is not arithmetic", op.name())),
    };
    Number::from_f64(computed)
        .map(Value::Number)
        .ok_or_else(|| "Arithmetic produced a non-finite result".to_string())
}

/// Remove one element from a list, either by trailing index or by matching
/// the identifier (first match only).
fn apply_remove_item(
    doc: &mut Value,
    path: &TargetPath,
    ramification: &Ramification,
) -> std::result::Result<(), String> {
    if let PathSegment::Index(index) = path.last() {
        let index = *index;
        let parent = path
            .resolve_parent_mut(doc)
            .ok_or_else(|| format!("Target path '{}' does not exist", path))?;
        let list = parent
            .as_array_mut()
            .ok_or_else(|| format!("Parent of '{}' is not a list", path))?;
        if index >= list.len() {
            return Err(format!(
                "Index {} out of bounds (len {}) for remove_item",
                index,
                list.len()
            ));
        }
        list.remove(index);
        return Ok(());
    }

    let slot = path
        .resolve_mut(doc)
        .ok_or_else(|| format!("Target path '{}' does not exist", path))?;
    let list = slot
        .as_array_mut()
        .ok_or_else(|| format!("Target at '{}' is not a list", path))?;

    let needle = ramification
        .value_identifier
        .as_ref()
        .unwrap_or(&ramification.value);
    let position = match match_field(needle) {
        Some((key, expected)) => list
            .iter()
            .position(|item| item.get(key.as_str()) == Some(expected)),
        None => list.iter().position(|item| item == needle),
    };
    match position {
        Some(index) => {
            list.remove(index);
            Ok(())
        }
        None => Err(format!("Item not found in '{}' for remove_item", path)),
    }
}

/// Update one element of a list in place, located by a single-field
/// identifier. A dict value merges field-wise; anything else replaces the
/// element.
fn apply_update_item(
    doc: &mut Value,
    path: &TargetPath,
    ramification: &Ramification,
) -> std::result::Result<(), String> {
    let (key, expected) = ramification
        .value_identifier
        .as_ref()
        .and_then(match_field)
        .ok_or_else(|| "update_item requires a single-field valueIdentifier".to_string())?;

    let slot = path
        .resolve_mut(doc)
        .ok_or_else(|| format!("Target path '{}' does not exist", path))?;
    let list = slot
        .as_array_mut()
        .ok_or_else(|| format!("Target at '{}' is not a list", path))?;

    let item = list
        .iter_mut()
        .find(|item| item.get(key.as_str()) == Some(expected))
        .ok_or_else(|| format!("Item not found in '{}' for update_item", path))?;

    if let Value::Object(updates) = &ramification.value {
        if let Some(target) = item.as_object_mut() {
            for (field, value) in updates {
                target.insert(field.clone(), value.clone());
            }
            return Ok(());
        }
    }
    *item = ramification.value.clone();
    Ok(())
}

/// A single-field object identifier: `{"conflictName": "Border War"}`.
fn match_field(identifier: &Value) -> Option<(String, &Value)> {
    let object = identifier.as_object()?;
    if object.len() != 1 {
        return None;
    }
    object
        .iter()
        .next()
        .map(|(key, value)| (key.clone(), value))
}
