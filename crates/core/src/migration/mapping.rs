//! Source-column → target-field mapping.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::Row;

use super::registry::EntityConfig;

/// Normalized source column → target field, tried after exact field-name
/// matching. Entries whose target is not a field of the entity are ignored.
pub const FIELD_ALIASES: &[(&str, &str)] = &[
    // names
    ("customer_name", "name"),
    ("client_name", "name"),
    ("company_name", "name"),
    ("supplier_name", "name"),
    ("vendor_name", "name"),
    ("full_name", "name"),
    ("contact_name", "name"),
    ("product_name", "name"),
    ("item_name", "name"),
    ("account_name", "name"),
    ("firstname", "first_name"),
    ("given_name", "first_name"),
    ("lastname", "last_name"),
    ("surname", "last_name"),
    ("family_name", "last_name"),
    // contact methods
    ("e_mail", "email"),
    ("email_address", "email"),
    ("mail", "email"),
    ("phone_number", "phone"),
    ("phone_no", "phone"),
    ("telephone", "phone"),
    ("tel", "phone"),
    ("mobile", "phone"),
    ("mobile_number", "phone"),
    ("cell", "phone"),
    ("gsm", "phone"),
    ("street", "address"),
    ("street_address", "address"),
    ("address_line_1", "address"),
    ("region", "state"),
    ("province", "state"),
    // identifiers
    ("inv_no", "invoice_number"),
    ("invoice_no", "invoice_number"),
    ("inv_number", "invoice_number"),
    ("bill_no", "bill_number"),
    ("po_number", "bill_number"),
    ("acct_code", "code"),
    ("account_code", "code"),
    ("account_no", "code"),
    ("cust_code", "customer_code"),
    ("customer_id", "customer_code"),
    ("customer_no", "customer_code"),
    ("vendor_code", "supplier_code"),
    ("emp_no", "employee_number"),
    ("employee_id", "employee_number"),
    ("staff_id", "employee_number"),
    ("staff_no", "employee_number"),
    ("product_code", "sku"),
    ("item_code", "sku"),
    ("sku_code", "sku"),
    ("tag", "asset_tag"),
    ("ref", "reference"),
    ("reference_no", "reference"),
    // relationships
    ("customer", "customer_id"),
    ("client", "customer_id"),
    ("supplier", "supplier_id"),
    ("vendor", "supplier_id"),
    ("invoice", "invoice_id"),
    ("product", "product_id"),
    ("item", "product_id"),
    ("department", "department_id"),
    ("dept", "department_id"),
    ("designation", "designation_id"),
    ("position", "designation_id"),
    ("manager", "manager_id"),
    ("line_manager", "manager_id"),
    ("employee", "employee_id"),
    ("category", "category_id"),
    ("warehouse", "warehouse_id"),
    ("project", "project_id"),
    ("assignee", "assignee_id"),
    ("assigned_to", "assignee_id"),
    ("technician", "technician_id"),
    ("company", "customer_id"),
    // amounts and dates
    ("qty", "quantity"),
    ("price", "unit_price"),
    ("unit_cost", "unit_price"),
    ("rate", "unit_price"),
    ("total", "total_amount"),
    ("amount_due", "total_amount"),
    ("grand_total", "total_amount"),
    ("tax", "tax_amount"),
    ("vat", "tax_amount"),
    ("sub_total", "subtotal"),
    ("dob", "date_of_birth"),
    ("birth_date", "date_of_birth"),
    ("date_joined", "hire_date"),
    ("employment_date", "hire_date"),
    ("due", "due_date"),
    ("date", "invoice_date"),
    ("title", "job_title"),
    // free text
    ("remarks", "notes"),
    ("comment", "notes"),
    ("comments", "notes"),
    ("desc", "description"),
    ("details", "description"),
];

/// Saved mapping from source column name to target field name.
///
/// Stored on the job as a flat JSON object. Columns mapped to an empty
/// string are deliberately ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping(BTreeMap<String, String>);

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.0.insert(source.into(), target.into());
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.0.get(source).map(String::as_str)
    }

    /// True when no column maps to a field.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|t| t.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|(_, t)| !t.is_empty())
            .map(|(s, t)| (s.as_str(), t.as_str()))
    }

    /// Target fields covered by this mapping.
    pub fn targets(&self) -> HashSet<&str> {
        self.iter().map(|(_, t)| t).collect()
    }

    /// Problems that make the mapping unusable for `config`: unknown target
    /// fields and targets claimed by more than one column.
    pub fn check_against(&self, config: &EntityConfig) -> Vec<String> {
        let mut problems = Vec::new();
        let mut seen = HashSet::new();
        for (source, target) in self.iter() {
            if config.field(target).is_none() {
                problems.push(format!(
                    "Column '{source}' maps to unknown field '{target}' for {}",
                    config.entity_type
                ));
            }
            if !seen.insert(target) {
                problems.push(format!("Field '{target}' is mapped more than once"));
            }
        }
        problems
    }

    /// Rename the columns of `row` to target fields, dropping unmapped ones.
    pub fn apply(&self, row: &Row) -> Row {
        self.iter()
            .filter_map(|(source, target)| {
                row.get(source).map(|v| (target.to_string(), v.clone()))
            })
            .collect()
    }
}

impl FromIterator<(String, String)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Heuristic mapping proposal, always confirmed by the caller before saving.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingSuggestion {
    pub mapping: FieldMapping,
    pub unmapped_columns: Vec<String>,
    /// Required fields no column was matched to.
    pub missing_required: Vec<&'static str>,
}

/// Lowercase, trim, and turn spaces, hyphens and dots into single
/// underscores (`"Customer Name"` → `customer_name`).
pub fn normalize_column(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        let c = if matches!(c, ' ' | '-' | '.' | '/') { '_' } else { c };
        if c == '_' && (out.is_empty() || out.ends_with('_')) {
            continue;
        }
        out.push(c);
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Suggest a target field for each source column.
///
/// Exact field names win, then the alias table, then `<column>_id` for
/// foreign keys. Each target field is claimed by the first matching column.
pub fn suggest_mapping(columns: &[String], config: &EntityConfig) -> MappingSuggestion {
    let mut mapping = FieldMapping::new();
    let mut claimed: HashSet<&'static str> = HashSet::new();
    let mut unmapped = Vec::new();

    for column in columns {
        let key = normalize_column(column);
        let target = config
            .field(&key)
            .map(|f| f.name)
            .or_else(|| {
                FIELD_ALIASES
                    .iter()
                    .filter(|(alias, _)| *alias == key)
                    .find_map(|(_, target)| config.field(target).map(|f| f.name))
            })
            .or_else(|| {
                config
                    .field(&format!("{key}_id"))
                    .filter(|f| f.foreign_key().is_some())
                    .map(|f| f.name)
            })
            .filter(|t| !claimed.contains(t));

        match target {
            Some(target) => {
                claimed.insert(target);
                mapping.insert(column.clone(), target);
            }
            None => unmapped.push(column.clone()),
        }
    }

    let missing_required = config
        .required_fields()
        .into_iter()
        .filter(|f| !claimed.contains(f))
        .collect();

    MappingSuggestion {
        mapping,
        unmapped_columns: unmapped,
        missing_required,
    }
}

/// Apply `mapping` to a row. See [`FieldMapping::apply`].
pub fn apply_mapping(row: &Row, mapping: &FieldMapping) -> Row {
    mapping.apply(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::registry::entity_config;
    use crate::migration::EntityType;
    use serde_json::json;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalizes_column_names() {
        assert_eq!(normalize_column("  Customer Name "), "customer_name");
        assert_eq!(normalize_column("E-Mail"), "e_mail");
        assert_eq!(normalize_column("Inv. No"), "inv_no");
        assert_eq!(normalize_column("Phone  -  Number"), "phone_number");
    }

    #[test]
    fn exact_then_alias() {
        let config = entity_config(EntityType::Contacts).unwrap();
        let suggestion = suggest_mapping(&cols(&["Name", "E-mail", "Mobile", "Shoe Size"]), config);
        assert_eq!(suggestion.mapping.get("Name"), Some("name"));
        assert_eq!(suggestion.mapping.get("E-mail"), Some("email"));
        assert_eq!(suggestion.mapping.get("Mobile"), Some("phone"));
        assert_eq!(suggestion.unmapped_columns, vec!["Shoe Size"]);
        assert!(suggestion.missing_required.is_empty());
    }

    #[test]
    fn invoice_aliases_and_fk_suffix() {
        let config = entity_config(EntityType::Invoices).unwrap();
        let suggestion = suggest_mapping(&cols(&["Inv No", "Customer", "Total"]), config);
        assert_eq!(suggestion.mapping.get("Inv No"), Some("invoice_number"));
        assert_eq!(suggestion.mapping.get("Customer"), Some("customer_id"));
        assert_eq!(suggestion.mapping.get("Total"), Some("total_amount"));
        assert_eq!(suggestion.missing_required, vec!["invoice_date"]);
    }

    #[test]
    fn each_target_claimed_once() {
        let config = entity_config(EntityType::Customers).unwrap();
        let suggestion = suggest_mapping(&cols(&["Customer Name", "Name"]), config);
        assert_eq!(suggestion.mapping.get("Customer Name"), Some("name"));
        assert_eq!(suggestion.mapping.get("Name"), None);
        assert_eq!(suggestion.unmapped_columns, vec!["Name"]);
    }

    #[test]
    fn aliases_respect_entity_fields() {
        let config = entity_config(EntityType::TaxRates).unwrap();
        let suggestion = suggest_mapping(&cols(&["Phone Number"]), config);
        assert!(suggestion.mapping.is_empty());
    }

    #[test]
    fn apply_renames_and_drops() {
        let mut mapping = FieldMapping::new();
        mapping.insert("Name", "name");
        mapping.insert("Email", "email");
        mapping.insert("Junk", "");

        let mut row = Row::new();
        row.insert("Name".into(), json!("Ada"));
        row.insert("Email".into(), json!("ada@example.com"));
        row.insert("Junk".into(), json!("x"));
        row.insert("Other".into(), json!("y"));

        let mapped = apply_mapping(&row, &mapping);
        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped["name"], json!("Ada"));
        assert!(!mapped.contains_key("Junk"));
    }

    #[test]
    fn check_flags_unknown_and_duplicate_targets() {
        let config = entity_config(EntityType::Contacts).unwrap();
        let mapping: FieldMapping = [
            ("A".to_string(), "name".to_string()),
            ("B".to_string(), "name".to_string()),
            ("C".to_string(), "favourite_colour".to_string()),
        ]
        .into_iter()
        .collect();
        let problems = mapping.check_against(config);
        assert_eq!(problems.len(), 2);
    }

    #[test]
    fn serializes_as_flat_object() {
        let mut mapping = FieldMapping::new();
        mapping.insert("Name", "name");
        assert_eq!(serde_json::to_value(&mapping).unwrap(), json!({"Name": "name"}));
        let back: FieldMapping = serde_json::from_value(json!({"Name": "name"})).unwrap();
        assert_eq!(back, mapping);
    }
}
