/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// One row of tabular data keyed by column or field name.
pub type Row = serde_json::Map<String, serde_json::Value>;
