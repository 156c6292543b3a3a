//! Circular-reference guard for self-referencing parent/child hierarchies.
//!
//! Contacts, tasks, tickets, and employees each carry a nullable parent
//! pointer into their own table. Before a parent is assigned, the ancestor
//! chain of the proposed parent is walked; if it reaches the record being
//! updated the assignment would create a cycle.
//!
//! Table and column names come exclusively from [`HierarchyTable`], so the
//! generated SQL never contains caller-supplied identifiers. Ids are bound
//! as parameters by the `db` crate.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// Tables that form a parent/child hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyTable {
    Contacts,
    Tasks,
    Tickets,
    Employees,
}

impl HierarchyTable {
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Contacts => "contacts",
            Self::Tasks => "tasks",
            Self::Tickets => "tickets",
            Self::Employees => "employees",
        }
    }

    /// Column holding the parent pointer.
    pub fn parent_column(self) -> &'static str {
        match self {
            Self::Contacts => "parent_contact_id",
            Self::Tasks => "parent_task_id",
            Self::Tickets => "parent_ticket_id",
            Self::Employees => "manager_id",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "contacts" => Some(Self::Contacts),
            "tasks" => Some(Self::Tasks),
            "tickets" => Some(Self::Tickets),
            "employees" => Some(Self::Employees),
            _ => None,
        }
    }

    /// Recursive query walking the ancestor chain.
    ///
    /// `$1` is the proposed parent id, `$2` the record being updated. The
    /// recursive term uses `UNION` so already-visited ids are discarded and
    /// the walk terminates even if the stored data contains a cycle.
    pub fn ancestor_cycle_sql(self) -> String {
        let table = self.table_name();
        let parent = self.parent_column();
        format!(
            "WITH RECURSIVE ancestors(id, parent_id) AS (
                SELECT id, {parent} FROM {table} WHERE id = $1
                UNION
                SELECT t.id, t.{parent} FROM {table} t
                JOIN ancestors a ON t.id = a.parent_id
             )
             SELECT EXISTS (SELECT 1 FROM ancestors WHERE id = $2)"
        )
    }
}

/// Decide the cases that need no query.
///
/// Returns `Some(true)` when clearing the parent, `Some(false)` for a direct
/// self-reference, and `None` when the ancestor chain must be inspected.
pub fn precheck(record_id: DbId, parent_id: Option<DbId>) -> Option<bool> {
    match parent_id {
        None => Some(true),
        Some(parent) if parent == record_id => Some(false),
        Some(_) => None,
    }
}
