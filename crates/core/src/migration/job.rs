//! Job lifecycle: statuses, outcomes, and the transition table.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, UnknownVariant};

/// Generates a snake_case string enum with `as_str`, `from_str`, `ALL`
/// and `Display`.
macro_rules! define_str_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $key:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// All valid values as stored in the database.
            pub const ALL: &'static [&'static str] = &[ $( $key ),+ ];

            /// Return the value as stored in the database.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $key ),+
                }
            }

            /// Parse a stored value. Returns `None` for unknown values.
            pub fn from_str(s: &str) -> Option<Self> {
                match s {
                    $( $key => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::from_str(&value).ok_or(UnknownVariant {
                    kind: stringify!($name),
                    value,
                })
            }
        }
    };
}

define_str_enum! {
    /// Lifecycle state of a migration job.
    JobStatus {
        Pending => "pending",
        Uploaded => "uploaded",
        Mapped => "mapped",
        Validating => "validating",
        Validated => "validated",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        RolledBack => "rolled_back",
        Cancelled => "cancelled",
    }
}

define_str_enum! {
    /// Format of the uploaded source file.
    SourceType {
        Csv => "csv",
        Json => "json",
        Excel => "excel",
    }
}

define_str_enum! {
    /// What to do with a row whose dedup fields match an existing target row.
    #[derive(Default)]
    DedupStrategy {
        #[default]
        Skip => "skip",
        Update => "update",
        Merge => "merge",
    }
}

define_str_enum! {
    /// Outcome recorded for one source row.
    RecordAction {
        Created => "created",
        Updated => "updated",
        Skipped => "skipped",
        Failed => "failed",
    }
}

define_str_enum! {
    /// Reversal applied to one record during rollback.
    RollbackAction {
        Deleted => "deleted",
        Reverted => "reverted",
    }
}

impl SourceType {
    /// Infer the source type from a filename extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "txt" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "xlsx" | "xls" => Some(Self::Excel),
            _ => None,
        }
    }
}

impl RecordAction {
    /// Whether a record with this action carries a reversible target row.
    pub fn is_reversible(self) -> bool {
        matches!(self, Self::Created | Self::Updated)
    }

    /// Rollback action that reverses this outcome.
    pub fn rollback_action(self) -> Option<RollbackAction> {
        match self {
            Self::Created => Some(RollbackAction::Deleted),
            Self::Updated => Some(RollbackAction::Reverted),
            Self::Skipped | Self::Failed => None,
        }
    }
}

impl JobStatus {
    /// States from which the job never moves again on its own.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::RolledBack | Self::Cancelled
        )
    }

    /// Whether `op` may be invoked on a job in this state.
    pub fn allows(self, op: JobOperation) -> bool {
        op.allowed_from().map_or(true, |allowed| allowed.contains(&self))
    }

    /// Guard for service operations; the error names the operation and state.
    pub fn ensure_allows(self, op: JobOperation) -> Result<(), CoreError> {
        if self.allows(op) {
            Ok(())
        } else {
            Err(CoreError::InvalidState(format!(
                "cannot {} a job in status '{}'",
                op.verb(),
                self
            )))
        }
    }
}

use JobStatus as S;

const UPLOAD_FROM: &[JobStatus] = &[S::Pending, S::Uploaded];
const SAVE_MAPPING_FROM: &[JobStatus] = &[S::Uploaded, S::Mapped, S::Validated];
const EXECUTE_FROM: &[JobStatus] = &[S::Validated, S::Mapped];
const ROLLBACK_FROM: &[JobStatus] = &[S::Completed];
const PRE_RUNNING: &[JobStatus] = &[
    S::Pending,
    S::Uploaded,
    S::Mapped,
    S::Validating,
    S::Validated,
];
const DELETE_FROM: &[JobStatus] = &[
    S::Pending,
    S::Uploaded,
    S::Mapped,
    S::Validating,
    S::Validated,
    S::Completed,
    S::Failed,
    S::RolledBack,
    S::Cancelled,
];

/// A state-guarded job operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOperation {
    Upload,
    SaveMapping,
    Validate,
    Preview,
    Execute,
    Rollback,
    Cancel,
    Delete,
}

impl JobOperation {
    /// Allowed source states; `None` means any state.
    pub fn allowed_from(self) -> Option<&'static [JobStatus]> {
        match self {
            Self::Upload => Some(UPLOAD_FROM),
            Self::SaveMapping => Some(SAVE_MAPPING_FROM),
            Self::Validate | Self::Preview => None,
            Self::Execute => Some(EXECUTE_FROM),
            Self::Rollback => Some(ROLLBACK_FROM),
            Self::Cancel => Some(PRE_RUNNING),
            Self::Delete => Some(DELETE_FROM),
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Upload => "upload a file to",
            Self::SaveMapping => "save a mapping for",
            Self::Validate => "validate",
            Self::Preview => "preview",
            Self::Execute => "execute",
            Self::Rollback => "roll back",
            Self::Cancel => "cancel",
            Self::Delete => "delete",
        }
    }
}

/// Percentage of rows processed, 0–100 with one decimal.
pub fn progress_percent(processed_rows: i64, total_rows: i64) -> f64 {
    if total_rows <= 0 {
        return 0.0;
    }
    let pct = processed_rows.clamp(0, total_rows) as f64 * 100.0 / total_rows as f64;
    (pct * 10.0).round() / 10.0
}
