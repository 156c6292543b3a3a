//! Static catalog of importable entities.
//!
//! Pure data plus two algorithms: lookup by key and dependency ordering.
//! Lookups keyed by string fall back to empty results for unknown types so
//! callers holding an unvalidated key never panic.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use serde::Serialize;

use super::cleaning::Normalizer;
use super::entity::EntityType;

// ---------------------------------------------------------------------------
// Field configuration
// ---------------------------------------------------------------------------

/// Semantic kind of a target field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Email,
    Phone,
    Enum {
        values: &'static [&'static str],
    },
    ForeignKey {
        target: EntityType,
        lookup_fields: &'static [&'static str],
    },
}

/// Configuration for one field of an entity.
#[derive(Debug, Clone, Serialize)]
pub struct FieldConfig {
    pub name: &'static str,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub required: bool,
    pub unique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalizer: Option<Normalizer>,
}

impl FieldConfig {
    fn new(name: &'static str, kind: FieldKind) -> Self {
        let normalizer = match kind {
            FieldKind::Email => Some(Normalizer::Email),
            FieldKind::Phone => Some(Normalizer::Phone),
            FieldKind::Date | FieldKind::DateTime => Some(Normalizer::Date),
            _ => None,
        };
        Self {
            name,
            kind,
            required: false,
            unique: false,
            max_length: None,
            normalizer,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    fn normalize(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    /// Target entity and lookup fields when this is a foreign key.
    pub fn foreign_key(&self) -> Option<(EntityType, &'static [&'static str])> {
        match self.kind {
            FieldKind::ForeignKey {
                target,
                lookup_fields,
            } => Some((target, lookup_fields)),
            _ => None,
        }
    }
}

fn text(name: &'static str, max_length: usize) -> FieldConfig {
    let mut field = FieldConfig::new(name, FieldKind::String);
    field.max_length = Some(max_length);
    field
}

fn name_field(name: &'static str) -> FieldConfig {
    text(name, 255).normalize(Normalizer::Name)
}

fn field(name: &'static str, kind: FieldKind) -> FieldConfig {
    FieldConfig::new(name, kind)
}

fn money(name: &'static str) -> FieldConfig {
    FieldConfig::new(name, FieldKind::Decimal).normalize(Normalizer::Currency)
}

fn choice(name: &'static str, values: &'static [&'static str]) -> FieldConfig {
    FieldConfig::new(name, FieldKind::Enum { values })
}

fn fk(
    name: &'static str,
    target: EntityType,
    lookup_fields: &'static [&'static str],
) -> FieldConfig {
    FieldConfig::new(
        name,
        FieldKind::ForeignKey {
            target,
            lookup_fields,
        },
    )
}

// ---------------------------------------------------------------------------
// Entity configuration
// ---------------------------------------------------------------------------

/// Everything the pipeline needs to know about one importable entity.
#[derive(Debug, Clone, Serialize)]
pub struct EntityConfig {
    pub entity_type: EntityType,
    pub label: &'static str,
    pub module: &'static str,
    pub fields: Vec<FieldConfig>,
    pub lookup_fields: &'static [&'static str],
    pub dependencies: &'static [EntityType],
    pub supports_upsert: bool,
    pub supports_rollback: bool,
}

impl EntityConfig {
    fn new(
        entity_type: EntityType,
        fields: Vec<FieldConfig>,
        lookup_fields: &'static [&'static str],
        dependencies: &'static [EntityType],
    ) -> Self {
        Self {
            entity_type,
            label: entity_type.label(),
            module: entity_type.module(),
            fields,
            lookup_fields,
            dependencies,
            supports_upsert: true,
            supports_rollback: true,
        }
    }

    fn append_only(mut self) -> Self {
        self.supports_upsert = false;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect()
    }

    pub fn unique_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.unique)
            .map(|f| f.name)
            .collect()
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &FieldConfig> {
        self.fields.iter().filter(|f| f.foreign_key().is_some())
    }

    /// Field name → normalizer for every field that has one.
    pub fn normalizer_map(&self) -> HashMap<&'static str, Normalizer> {
        self.fields
            .iter()
            .filter_map(|f| f.normalizer.map(|n| (f.name, n)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Registry data
// ---------------------------------------------------------------------------

use EntityType as E;

const ACCOUNT_TYPES: &[&str] = &["asset", "liability", "equity", "income", "expense"];
const INVOICE_STATUSES: &[&str] = &["draft", "sent", "paid", "partially_paid", "overdue", "void"];
const BILL_STATUSES: &[&str] = &["draft", "open", "paid", "overdue", "void"];
const PAYMENT_METHODS: &[&str] = &["cash", "bank_transfer", "card", "cheque", "mobile_money"];
const EMPLOYMENT_TYPES: &[&str] = &["full_time", "part_time", "contract", "intern"];
const GENDERS: &[&str] = &["male", "female", "other"];
const LEAVE_STATUSES: &[&str] = &["pending", "approved", "rejected", "cancelled"];
const LEAD_STATUSES: &[&str] = &["new", "contacted", "qualified", "lost", "converted"];
const OPPORTUNITY_STAGES: &[&str] = &[
    "prospecting",
    "qualification",
    "proposal",
    "negotiation",
    "closed_won",
    "closed_lost",
];
const TICKET_PRIORITIES: &[&str] = &["low", "medium", "high", "urgent"];
const TICKET_STATUSES: &[&str] = &["open", "in_progress", "on_hold", "resolved", "closed"];
const ASSET_STATUSES: &[&str] = &["in_use", "in_storage", "under_repair", "disposed"];
const SERVICE_ORDER_STATUSES: &[&str] = &["scheduled", "dispatched", "in_progress", "completed", "cancelled"];
const PROJECT_STATUSES: &[&str] = &["planned", "active", "on_hold", "completed", "cancelled"];
const TASK_STATUSES: &[&str] = &["todo", "in_progress", "review", "done"];

const BY_NAME: &[&str] = &["name"];
const BY_CODE_NAME: &[&str] = &["code", "name"];
const BY_CUSTOMER: &[&str] = &["customer_code", "name", "email"];
const BY_SUPPLIER: &[&str] = &["supplier_code", "name", "email"];
const BY_EMPLOYEE: &[&str] = &["employee_number", "email"];
const BY_CONTACT: &[&str] = &["email", "name"];
const BY_PRODUCT: &[&str] = &["sku", "name"];
const BY_INVOICE: &[&str] = &["invoice_number"];
const BY_PROJECT: &[&str] = &["project_code", "name"];

static REGISTRY: LazyLock<Vec<EntityConfig>> = LazyLock::new(build_registry);

fn build_registry() -> Vec<EntityConfig> {
    vec![
        // -- accounting -------------------------------------------------------
        EntityConfig::new(
            E::Accounts,
            vec![
                text("code", 20).required().unique(),
                text("name", 255).required(),
                choice("account_type", ACCOUNT_TYPES).required(),
                text("description", 1000),
                field("is_active", FieldKind::Boolean),
            ],
            BY_CODE_NAME,
            &[],
        ),
        EntityConfig::new(
            E::TaxRates,
            vec![
                text("name", 100).required().unique(),
                field("rate", FieldKind::Decimal).required(),
                field("is_compound", FieldKind::Boolean),
            ],
            BY_NAME,
            &[],
        ),
        EntityConfig::new(
            E::Customers,
            vec![
                text("customer_code", 50).unique(),
                name_field("name").required(),
                field("email", FieldKind::Email).unique(),
                field("phone", FieldKind::Phone),
                text("address", 500).normalize(Normalizer::Address),
                text("city", 100).normalize(Normalizer::Name),
                text("state", 100).normalize(Normalizer::Address),
                money("credit_limit"),
                text("tax_id", 50),
            ],
            BY_CUSTOMER,
            &[],
        ),
        EntityConfig::new(
            E::Suppliers,
            vec![
                text("supplier_code", 50).unique(),
                name_field("name").required(),
                field("email", FieldKind::Email).unique(),
                field("phone", FieldKind::Phone),
                text("address", 500).normalize(Normalizer::Address),
                text("state", 100).normalize(Normalizer::Address),
                text("bank_name", 100),
                text("bank_account_number", 20),
            ],
            BY_SUPPLIER,
            &[],
        ),
        EntityConfig::new(
            E::Invoices,
            vec![
                text("invoice_number", 50).required().unique(),
                fk("customer_id", E::Customers, BY_CUSTOMER).required(),
                field("invoice_date", FieldKind::Date).required(),
                field("due_date", FieldKind::Date),
                money("subtotal"),
                money("tax_amount"),
                money("total_amount").required(),
                choice("status", INVOICE_STATUSES),
                text("notes", 2000),
            ],
            BY_INVOICE,
            &[E::Customers],
        ),
        EntityConfig::new(
            E::InvoiceItems,
            vec![
                fk("invoice_id", E::Invoices, BY_INVOICE).required(),
                fk("product_id", E::Products, BY_PRODUCT),
                text("description", 500).required(),
                field("quantity", FieldKind::Decimal).required(),
                money("unit_price").required(),
                fk("tax_rate_id", E::TaxRates, BY_NAME),
                money("line_total"),
            ],
            &[],
            &[E::Invoices, E::Products],
        )
        .append_only(),
        EntityConfig::new(
            E::Bills,
            vec![
                text("bill_number", 50).required().unique(),
                fk("supplier_id", E::Suppliers, BY_SUPPLIER).required(),
                field("bill_date", FieldKind::Date).required(),
                field("due_date", FieldKind::Date),
                money("total_amount").required(),
                choice("status", BILL_STATUSES),
            ],
            &["bill_number"],
            &[E::Suppliers],
        ),
        EntityConfig::new(
            E::Payments,
            vec![
                text("reference", 100).unique(),
                fk("customer_id", E::Customers, BY_CUSTOMER).required(),
                fk("invoice_id", E::Invoices, BY_INVOICE),
                field("payment_date", FieldKind::Date).required(),
                money("amount").required(),
                choice("payment_method", PAYMENT_METHODS),
            ],
            &["reference"],
            &[E::Customers, E::Invoices],
        ),
        EntityConfig::new(
            E::Expenses,
            vec![
                fk("account_id", E::Accounts, BY_CODE_NAME).required(),
                fk("supplier_id", E::Suppliers, BY_SUPPLIER),
                field("expense_date", FieldKind::Date).required(),
                money("amount").required(),
                text("description", 1000),
                text("receipt_number", 100),
            ],
            &["receipt_number"],
            &[E::Accounts],
        ),
        EntityConfig::new(
            E::JournalEntries,
            vec![
                text("entry_number", 50).required().unique(),
                field("entry_date", FieldKind::Date).required(),
                fk("account_id", E::Accounts, BY_CODE_NAME).required(),
                money("debit"),
                money("credit"),
                text("memo", 1000),
            ],
            &["entry_number"],
            &[E::Accounts],
        )
        .append_only(),
        // -- hr -----------------------------------------------------------------
        EntityConfig::new(
            E::Departments,
            vec![
                text("code", 20).unique(),
                name_field("name").required().unique(),
                text("description", 1000),
            ],
            BY_CODE_NAME,
            &[],
        ),
        EntityConfig::new(
            E::Designations,
            vec![
                name_field("title").required(),
                fk("department_id", E::Departments, BY_CODE_NAME),
                text("grade", 20),
            ],
            &["title"],
            &[E::Departments],
        ),
        EntityConfig::new(
            E::Employees,
            vec![
                text("employee_number", 50).required().unique(),
                name_field("first_name").required(),
                name_field("last_name").required(),
                field("email", FieldKind::Email).unique(),
                field("phone", FieldKind::Phone),
                choice("gender", GENDERS),
                field("date_of_birth", FieldKind::Date),
                field("hire_date", FieldKind::Date).required(),
                fk("department_id", E::Departments, BY_CODE_NAME),
                fk("designation_id", E::Designations, &["title"]),
                fk("manager_id", E::Employees, BY_EMPLOYEE),
                choice("employment_type", EMPLOYMENT_TYPES),
                money("basic_salary"),
                text("address", 500).normalize(Normalizer::Address),
                text("state", 100).normalize(Normalizer::Address),
                text("bank_account_number", 20),
            ],
            BY_EMPLOYEE,
            &[E::Departments, E::Designations],
        ),
        EntityConfig::new(
            E::LeaveTypes,
            vec![
                text("name", 100).required().unique(),
                field("days_per_year", FieldKind::Integer).required(),
                field("is_paid", FieldKind::Boolean),
            ],
            BY_NAME,
            &[],
        ),
        EntityConfig::new(
            E::LeaveRequests,
            vec![
                fk("employee_id", E::Employees, BY_EMPLOYEE).required(),
                fk("leave_type_id", E::LeaveTypes, BY_NAME).required(),
                field("start_date", FieldKind::Date).required(),
                field("end_date", FieldKind::Date).required(),
                choice("status", LEAVE_STATUSES),
                text("reason", 1000),
            ],
            &[],
            &[E::Employees, E::LeaveTypes],
        )
        .append_only(),
        EntityConfig::new(
            E::PayrollRecords,
            vec![
                fk("employee_id", E::Employees, BY_EMPLOYEE).required(),
                field("period_start", FieldKind::Date).required(),
                field("period_end", FieldKind::Date).required(),
                money("gross_pay").required(),
                money("deductions"),
                money("net_pay").required(),
                field("paid_at", FieldKind::DateTime),
            ],
            &[],
            &[E::Employees],
        )
        .append_only(),
        // -- crm ----------------------------------------------------------------
        EntityConfig::new(
            E::Contacts,
            vec![
                name_field("name").required(),
                field("email", FieldKind::Email).unique(),
                field("phone", FieldKind::Phone),
                text("job_title", 100).normalize(Normalizer::Name),
                fk("customer_id", E::Customers, BY_CUSTOMER),
                fk("parent_contact_id", E::Contacts, BY_CONTACT),
                text("address", 500).normalize(Normalizer::Address),
                text("state", 100).normalize(Normalizer::Address),
                text("notes", 2000),
            ],
            BY_CONTACT,
            &[E::Customers],
        ),
        EntityConfig::new(
            E::Leads,
            vec![
                name_field("name").required(),
                name_field("company_name"),
                field("email", FieldKind::Email),
                field("phone", FieldKind::Phone),
                text("source", 100),
                choice("status", LEAD_STATUSES),
                money("estimated_value"),
            ],
            BY_CONTACT,
            &[],
        ),
        EntityConfig::new(
            E::Opportunities,
            vec![
                text("title", 255).required(),
                fk("customer_id", E::Customers, BY_CUSTOMER).required(),
                fk("contact_id", E::Contacts, BY_CONTACT),
                choice("stage", OPPORTUNITY_STAGES).required(),
                money("amount"),
                field("probability", FieldKind::Integer),
                field("expected_close_date", FieldKind::Date),
            ],
            &["title"],
            &[E::Customers, E::Contacts],
        ),
        // -- support ------------------------------------------------------------
        EntityConfig::new(
            E::TicketCategories,
            vec![text("name", 100).required().unique(), text("description", 500)],
            BY_NAME,
            &[],
        ),
        EntityConfig::new(
            E::Tickets,
            vec![
                text("ticket_number", 50).required().unique(),
                text("subject", 255).required(),
                text("description", 5000),
                fk("contact_id", E::Contacts, BY_CONTACT),
                fk("category_id", E::TicketCategories, BY_NAME),
                fk("parent_ticket_id", E::Tickets, &["ticket_number"]),
                choice("priority", TICKET_PRIORITIES),
                choice("status", TICKET_STATUSES),
                field("opened_at", FieldKind::DateTime),
            ],
            &["ticket_number"],
            &[E::Contacts, E::TicketCategories],
        ),
        // -- inventory ----------------------------------------------------------
        EntityConfig::new(
            E::ProductCategories,
            vec![name_field("name").required().unique(), text("description", 500)],
            BY_NAME,
            &[],
        ),
        EntityConfig::new(
            E::Products,
            vec![
                text("sku", 64).required().unique(),
                text("name", 255).required(),
                fk("category_id", E::ProductCategories, BY_NAME),
                text("unit_of_measure", 20),
                money("cost_price"),
                money("selling_price").required(),
                field("reorder_level", FieldKind::Integer),
                field("is_active", FieldKind::Boolean),
            ],
            BY_PRODUCT,
            &[E::ProductCategories],
        ),
        EntityConfig::new(
            E::Warehouses,
            vec![
                text("code", 20).required().unique(),
                name_field("name").required(),
                text("address", 500).normalize(Normalizer::Address),
                text("state", 100).normalize(Normalizer::Address),
            ],
            BY_CODE_NAME,
            &[],
        ),
        EntityConfig::new(
            E::StockItems,
            vec![
                fk("product_id", E::Products, BY_PRODUCT).required(),
                fk("warehouse_id", E::Warehouses, BY_CODE_NAME).required(),
                field("quantity_on_hand", FieldKind::Decimal).required(),
                text("bin_location", 50),
                field("last_counted_at", FieldKind::DateTime),
            ],
            &[],
            &[E::Products, E::Warehouses],
        )
        .append_only(),
        // -- assets -------------------------------------------------------------
        EntityConfig::new(
            E::AssetCategories,
            vec![
                name_field("name").required().unique(),
                field("useful_life_months", FieldKind::Integer),
                field("depreciation_rate", FieldKind::Decimal),
            ],
            BY_NAME,
            &[],
        ),
        EntityConfig::new(
            E::Assets,
            vec![
                text("asset_tag", 50).required().unique(),
                text("name", 255).required(),
                fk("category_id", E::AssetCategories, BY_NAME).required(),
                fk("assigned_to_id", E::Employees, BY_EMPLOYEE),
                text("serial_number", 100),
                field("purchase_date", FieldKind::Date),
                money("purchase_cost"),
                choice("status", ASSET_STATUSES),
            ],
            &["asset_tag", "serial_number"],
            &[E::AssetCategories, E::Employees],
        ),
        // -- field service ------------------------------------------------------
        EntityConfig::new(
            E::ServiceOrders,
            vec![
                text("order_number", 50).required().unique(),
                fk("customer_id", E::Customers, BY_CUSTOMER).required(),
                fk("technician_id", E::Employees, BY_EMPLOYEE),
                field("scheduled_at", FieldKind::DateTime),
                text("site_address", 500).normalize(Normalizer::Address),
                choice("status", SERVICE_ORDER_STATUSES),
                text("description", 2000),
            ],
            &["order_number"],
            &[E::Customers, E::Employees],
        ),
        // -- projects -----------------------------------------------------------
        EntityConfig::new(
            E::Projects,
            vec![
                text("project_code", 50).unique(),
                text("name", 255).required(),
                fk("customer_id", E::Customers, BY_CUSTOMER),
                field("start_date", FieldKind::Date),
                field("end_date", FieldKind::Date),
                money("budget"),
                choice("status", PROJECT_STATUSES),
            ],
            BY_PROJECT,
            &[E::Customers],
        ),
        EntityConfig::new(
            E::Tasks,
            vec![
                text("title", 255).required(),
                fk("project_id", E::Projects, BY_PROJECT).required(),
                fk("assignee_id", E::Employees, BY_EMPLOYEE),
                fk("parent_task_id", E::Tasks, &["title"]),
                field("due_date", FieldKind::Date),
                field("estimated_hours", FieldKind::Decimal),
                choice("status", TASK_STATUSES),
            ],
            &["title"],
            &[E::Projects, E::Employees],
        ),
    ]
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// All registered configurations, in registration order.
pub fn all_entity_configs() -> &'static [EntityConfig] {
    &REGISTRY
}

/// Registered entity types, in registration order.
pub fn all_entity_types() -> Vec<EntityType> {
    REGISTRY.iter().map(|c| c.entity_type).collect()
}

/// Configuration for a typed entity.
pub fn entity_config(entity_type: EntityType) -> Option<&'static EntityConfig> {
    REGISTRY.iter().find(|c| c.entity_type == entity_type)
}

/// Configuration for a registry key; `None` for unknown keys.
pub fn get_entity_config(entity_type: &str) -> Option<&'static EntityConfig> {
    EntityType::from_str(entity_type).and_then(entity_config)
}

pub fn get_entity_fields(entity_type: &str) -> &'static [FieldConfig] {
    get_entity_config(entity_type)
        .map(|c| c.fields.as_slice())
        .unwrap_or(&[])
}

pub fn get_required_fields(entity_type: &str) -> Vec<&'static str> {
    get_entity_config(entity_type)
        .map(EntityConfig::required_fields)
        .unwrap_or_default()
}

pub fn get_unique_fields(entity_type: &str) -> Vec<&'static str> {
    get_entity_config(entity_type)
        .map(EntityConfig::unique_fields)
        .unwrap_or_default()
}

pub fn get_lookup_fields(entity_type: &str) -> &'static [&'static str] {
    get_entity_config(entity_type)
        .map(|c| c.lookup_fields)
        .unwrap_or(&[])
}

pub fn get_dependencies(entity_type: &str) -> &'static [EntityType] {
    get_entity_config(entity_type)
        .map(|c| c.dependencies)
        .unwrap_or(&[])
}

// ---------------------------------------------------------------------------
// Dependency ordering
// ---------------------------------------------------------------------------

/// Error returned by the strict ordering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("dependency cycle among: {}", join_types(.remaining))]
    Cycle { remaining: Vec<EntityType> },
}

fn join_types(types: &[EntityType]) -> String {
    types
        .iter()
        .map(|e| e.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Kahn's algorithm over `nodes`, always taking the ready node with the
/// alphabetically smallest key.
///
/// Dependencies outside `nodes` and self-dependencies are ignored. On a cycle
/// returns `Err((sorted_prefix, remaining_in_input_order))`.
pub fn topological_order<F>(
    nodes: &[EntityType],
    dependencies_of: F,
) -> Result<Vec<EntityType>, (Vec<EntityType>, Vec<EntityType>)>
where
    F: Fn(EntityType) -> Vec<EntityType>,
{
    let known: HashSet<EntityType> = nodes.iter().copied().collect();
    let mut in_degree: HashMap<EntityType, usize> = HashMap::new();
    let mut dependents: HashMap<EntityType, Vec<EntityType>> = HashMap::new();

    for &node in nodes {
        let deps: BTreeSet<EntityType> = dependencies_of(node)
            .into_iter()
            .filter(|d| *d != node && known.contains(d))
            .collect();
        in_degree.insert(node, deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(node);
        }
    }

    let mut ready: BTreeSet<(&'static str, EntityType)> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(node, _)| (node.as_str(), *node))
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(next) = ready.pop_first() {
        let node = next.1;
        order.push(node);
        for dependent in dependents.get(&node).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(deg) = in_degree.get_mut(dependent) {
                *deg -= 1;
                if *deg == 0 {
                    ready.insert((dependent.as_str(), *dependent));
                }
            }
        }
    }

    if order.len() == nodes.len() {
        Ok(order)
    } else {
        let placed: HashSet<EntityType> = order.iter().copied().collect();
        let remaining = nodes
            .iter()
            .copied()
            .filter(|n| !placed.contains(n))
            .collect();
        Err((order, remaining))
    }
}

fn registry_dependencies(entity_type: EntityType) -> Vec<EntityType> {
    entity_config(entity_type)
        .map(|c| c.dependencies.to_vec())
        .unwrap_or_default()
}

/// Order in which entity types should be migrated.
///
/// Best effort: if the dependency graph has a cycle, the entities caught in
/// it are appended in registration order instead of failing.
pub fn get_migration_order() -> Vec<EntityType> {
    let nodes = all_entity_types();
    match topological_order(&nodes, registry_dependencies) {
        Ok(order) => order,
        Err((mut order, remaining)) => {
            tracing::warn!(
                remaining = ?remaining,
                "Dependency cycle in entity registry, appending remaining types unsorted"
            );
            order.extend(remaining);
            order
        }
    }
}

/// Strict variant of [`get_migration_order`] that reports cycles.
pub fn try_migration_order() -> Result<Vec<EntityType>, RegistryError> {
    let nodes = all_entity_types();
    topological_order(&nodes, registry_dependencies)
        .map_err(|(_, remaining)| RegistryError::Cycle { remaining })
}

/// Whether every declared dependency of `entity_type` is in `migrated`.
///
/// Returns the missing dependencies in declaration order.
pub fn check_dependencies_migrated(
    entity_type: &str,
    migrated: &HashSet<EntityType>,
) -> (bool, Vec<EntityType>) {
    let missing: Vec<EntityType> = get_dependencies(entity_type)
        .iter()
        .copied()
        .filter(|dep| !migrated.contains(dep))
        .collect();
    (missing.is_empty(), missing)
}
