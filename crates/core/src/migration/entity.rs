//! Importable entity types.
//!
//! Each variant maps to exactly one table. The table name returned by
//! [`EntityType::table_name`] is the only source of identifiers interpolated
//! into raw SQL anywhere in the migration subsystem.

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

macro_rules! define_entity_types {
    (
        $( $variant:ident => $key:literal, $label:literal, $module:literal );+ $(;)?
    ) => {
        /// A business entity that can be the target of a migration job.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum EntityType {
            $( $variant ),+
        }

        impl EntityType {
            /// Every entity type in registration order.
            pub const ALL: &'static [EntityType] = &[ $( EntityType::$variant ),+ ];

            /// Registry key, also the serialized form.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $key ),+
                }
            }

            /// Parse a registry key. Returns `None` for unknown values.
            pub fn from_str(s: &str) -> Option<Self> {
                match s {
                    $( $key => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Human-readable label.
            pub fn label(self) -> &'static str {
                match self {
                    $( Self::$variant => $label ),+
                }
            }

            /// Business module the entity belongs to.
            pub fn module(self) -> &'static str {
                match self {
                    $( Self::$variant => $module ),+
                }
            }
        }
    };
}

define_entity_types! {
    Accounts => "accounts", "Chart of Accounts", "accounting";
    TaxRates => "tax_rates", "Tax Rates", "accounting";
    Customers => "customers", "Customers", "accounting";
    Suppliers => "suppliers", "Suppliers", "accounting";
    Invoices => "invoices", "Invoices", "accounting";
    InvoiceItems => "invoice_items", "Invoice Items", "accounting";
    Bills => "bills", "Bills", "accounting";
    Payments => "payments", "Payments", "accounting";
    Expenses => "expenses", "Expenses", "accounting";
    JournalEntries => "journal_entries", "Journal Entries", "accounting";
    Departments => "departments", "Departments", "hr";
    Designations => "designations", "Designations", "hr";
    Employees => "employees", "Employees", "hr";
    LeaveTypes => "leave_types", "Leave Types", "hr";
    LeaveRequests => "leave_requests", "Leave Requests", "hr";
    PayrollRecords => "payroll_records", "Payroll Records", "hr";
    Contacts => "contacts", "Contacts", "crm";
    Leads => "leads", "Leads", "crm";
    Opportunities => "opportunities", "Opportunities", "crm";
    TicketCategories => "ticket_categories", "Ticket Categories", "support";
    Tickets => "tickets", "Tickets", "support";
    ProductCategories => "product_categories", "Product Categories", "inventory";
    Products => "products", "Products", "inventory";
    Warehouses => "warehouses", "Warehouses", "inventory";
    StockItems => "stock_items", "Stock Items", "inventory";
    AssetCategories => "asset_categories", "Asset Categories", "assets";
    Assets => "assets", "Assets", "assets";
    ServiceOrders => "service_orders", "Service Orders", "field_service";
    Projects => "projects", "Projects", "projects";
    Tasks => "tasks", "Tasks", "projects";
}

impl EntityType {
    /// Table backing this entity type.
    ///
    /// Every registry key is also its table name; this indirection keeps raw
    /// queries bound to the closed enum rather than to arbitrary strings.
    pub fn table_name(self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for EntityType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value).ok_or(UnknownVariant {
            kind: "entity type",
            value,
        })
    }
}
