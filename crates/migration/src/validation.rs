//! Database-backed validation layered on the pure row checks.

use std::collections::{BTreeMap, HashSet};

use bizsuite_core::migration::registry::{entity_config, EntityConfig};
use bizsuite_core::migration::validator::{
    collect_reference_values, detect_duplicates, validate_batch_capped, value_text,
    ValidationIssue, ValidationResult,
};
use bizsuite_core::types::Row;
use serde_json::Value;

use crate::error::MigrationResult;
use crate::store::TargetStore;

/// Check every foreign-key value in `rows` against the referenced table.
///
/// Values are matched case-insensitively on the target's lookup fields, then
/// as a numeric id. For self-referencing keys, values naming a row of the
/// same file also count as found. Misses are errors for required keys and
/// warnings otherwise, reported once per referencing row.
pub async fn validate_relationships(
    rows: &[Row],
    config: &EntityConfig,
    targets: &dyn TargetStore,
) -> MigrationResult<ValidationResult> {
    let mut result = ValidationResult::default();

    for field in config.foreign_keys() {
        let Some((target, lookup_fields)) = field.foreign_key() else {
            continue;
        };
        let Some(target_config) = entity_config(target) else {
            continue;
        };
        let references = collect_reference_values(rows, field.name);
        if references.is_empty() {
            continue;
        }

        let values: Vec<String> = references.keys().cloned().collect();
        let mut found: HashSet<String> = HashSet::new();
        for lookup in lookup_fields {
            found.extend(targets.existing_values(target_config, lookup, &values).await?);
        }
        if target == config.entity_type {
            found.extend(in_file_values(rows, lookup_fields));
        }

        let mut missing: BTreeMap<&String, &Vec<usize>> = BTreeMap::new();
        for (value, referencing_rows) in &references {
            if found.contains(&value.to_lowercase()) {
                continue;
            }
            let by_id = match value.parse::<i64>() {
                Ok(_) => targets
                    .resolve_reference(target_config, &[], value)
                    .await?
                    .is_some(),
                Err(_) => false,
            };
            if !by_id {
                missing.insert(value, referencing_rows);
            }
        }

        for (value, referencing_rows) in missing {
            for &row in referencing_rows {
                let issue = ValidationIssue::new(
                    field.name,
                    format!("No {} matches '{value}'", target.label()),
                )
                .at_row(row)
                .with_value(Value::String(value.clone()));
                if field.required {
                    result.error(issue);
                } else {
                    result.warning(issue);
                }
            }
        }
    }

    Ok(result)
}

fn in_file_values(rows: &[Row], lookup_fields: &[&str]) -> HashSet<String> {
    rows.iter()
        .flat_map(|row| lookup_fields.iter().filter_map(|f| row.get(*f)))
        .filter_map(value_text)
        .map(|v| v.to_lowercase())
        .collect()
}

/// Warn about every declared dependency whose table is still empty.
pub async fn check_dependencies(
    config: &EntityConfig,
    targets: &dyn TargetStore,
) -> MigrationResult<ValidationResult> {
    let mut result = ValidationResult::default();

    for dependency in config.dependencies {
        let Some(dependency_config) = entity_config(*dependency) else {
            continue;
        };
        if targets.count_rows(dependency_config).await? == 0 {
            result.warning(ValidationIssue::new(
                dependency.as_str(),
                format!(
                    "No {} exist yet; migrate them before {}",
                    dependency.label(),
                    config.label
                ),
            ));
        }
    }

    Ok(result)
}

/// Full validation: schema checks, in-file duplicates, dependency counts and
/// foreign-key existence, capped at `max_errors` errors.
pub async fn validate_with_fk<S: AsRef<str>>(
    rows: &[Row],
    config: &EntityConfig,
    dedup_fields: &[S],
    targets: &dyn TargetStore,
    max_errors: usize,
) -> MigrationResult<ValidationResult> {
    let mut result = validate_batch_capped(rows, config, max_errors);

    let duplicates = detect_duplicates(rows, dedup_fields);
    result.warnings.extend(duplicates.to_warnings());

    result.merge(check_dependencies(config, targets).await?);
    result.merge(validate_relationships(rows, config, targets).await?);

    if result.errors.len() > max_errors {
        result.errors.truncate(max_errors);
        result
            .info
            .push(format!("Only the first {max_errors} errors are reported"));
    }
    Ok(result)
}
