//! Core types and data structures for the sample data update

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a lookup table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LookupTableId(pub Uuid);

impl LookupTableId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LookupTableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LookupTableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a single lookup value
///
/// Sampled loans reference lookup values through `Option<LookupValueId>`;
/// `None` means no value has been assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LookupValueId(pub Uuid);

impl LookupValueId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LookupValueId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LookupValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A named enumeration of normalized values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupTable {
    /// Unique identifier for the table
    pub id: LookupTableId,
    /// Stable symbolic code, e.g. `UnderwriterNameCode`
    pub code: String,
    /// Human-readable table name
    pub name: String,
}

impl LookupTable {
    /// Create a new lookup table with a fresh identifier
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: LookupTableId::new(),
            code: code.into(),
            name: name.into(),
        }
    }
}

/// One normalized value row within a lookup table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupValue {
    /// Unique identifier, assigned by storage when saved
    pub id: Option<LookupValueId>,
    /// Owning lookup table
    pub table_id: LookupTableId,
    /// Raw code the value was created from (trimmed)
    pub code: String,
    /// Display name
    pub name: String,
    /// Whether the value is active
    pub is_active: bool,
}

impl LookupValue {
    /// Create a new, unsaved, active lookup value
    pub fn new(table_id: LookupTableId, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            table_id,
            code: code.into(),
            name: name.into(),
            is_active: true,
        }
    }
}

/// The two parallel sampled-loan record sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanVariant {
    /// Regular sampled loans
    Primary,
    /// DAR sampled loans, stored in their own tables
    Dar,
}

impl LoanVariant {
    /// Both variants, in processing order
    pub const ALL: [LoanVariant; 2] = [LoanVariant::Primary, LoanVariant::Dar];

    /// Short label used in progress messages
    pub fn label(&self) -> &'static str {
        match self {
            LoanVariant::Primary => "sampled loans",
            LoanVariant::Dar => "sampled DAR loans",
        }
    }
}

impl fmt::Display for LoanVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanVariant::Primary => write!(f, "primary"),
            LoanVariant::Dar => write!(f, "DAR"),
        }
    }
}

/// The two loan attributes resolved against lookup tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupAttribute {
    /// Underwriter name
    UnderwriterName,
    /// Underwriting group
    UnderwritingGroup,
}

impl LookupAttribute {
    /// Both attributes, in processing order
    pub const ALL: [LookupAttribute; 2] = [
        LookupAttribute::UnderwriterName,
        LookupAttribute::UnderwritingGroup,
    ];

    /// Name given to lookup values created for this attribute
    pub fn display_name(&self) -> &'static str {
        match self {
            LookupAttribute::UnderwriterName => "Underwriter Name",
            LookupAttribute::UnderwritingGroup => "Underwriting Group",
        }
    }

    /// Column holding this attribute in the sample and import tables
    pub fn column(&self) -> &'static str {
        match self {
            LookupAttribute::UnderwriterName => "underwriterName",
            LookupAttribute::UnderwritingGroup => "underwritingGroup",
        }
    }
}

impl fmt::Display for LookupAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Composite key of a sampled loan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampledLoanKey {
    pub loan_id: String,
    pub sample_type_id: String,
}

impl SampledLoanKey {
    pub fn new(loan_id: impl Into<String>, sample_type_id: impl Into<String>) -> Self {
        Self {
            loan_id: loan_id.into(),
            sample_type_id: sample_type_id.into(),
        }
    }
}

impl fmt::Display for SampledLoanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.loan_id, self.sample_type_id)
    }
}

/// A sampled loan record whose lookups are being reconciled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampledLoan {
    /// Composite key (loan id, sample type id)
    pub key: SampledLoanKey,
    /// Loan number used to find the population record
    pub loan_number: String,
    /// Assigned underwriter name lookup, if any
    pub underwriter_name: Option<LookupValueId>,
    /// Assigned underwriting group lookup, if any
    pub underwriting_group: Option<LookupValueId>,
}

impl SampledLoan {
    /// Whether either lookup attribute is assigned
    pub fn has_lookup_values(&self) -> bool {
        self.underwriter_name.is_some() || self.underwriting_group.is_some()
    }

    /// The assigned lookup for one attribute
    pub fn lookup(&self, attribute: LookupAttribute) -> Option<LookupValueId> {
        match attribute {
            LookupAttribute::UnderwriterName => self.underwriter_name,
            LookupAttribute::UnderwritingGroup => self.underwriting_group,
        }
    }
}

/// A population (import staging) record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanImportRecord {
    pub loan_number: String,
    pub underwriter_name: Option<String>,
    pub underwriting_group: Option<String>,
}

impl LoanImportRecord {
    /// Trimmed raw text for one attribute; missing values become empty strings
    pub fn raw_value(&self, attribute: LookupAttribute) -> &str {
        let value = match attribute {
            LookupAttribute::UnderwriterName => self.underwriter_name.as_deref(),
            LookupAttribute::UnderwritingGroup => self.underwriting_group.as_deref(),
        };
        value.map(str::trim).unwrap_or_default()
    }
}

/// Identifiers resolved for one population record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLookups {
    pub underwriter_name: LookupValueId,
    pub underwriting_group: LookupValueId,
}

/// The lookup tables loaded for a run, one per attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupContext {
    pub underwriter_name: LookupTable,
    pub underwriting_group: LookupTable,
}

impl LookupContext {
    /// The lookup table backing an attribute
    pub fn table(&self, attribute: LookupAttribute) -> &LookupTable {
        match attribute {
            LookupAttribute::UnderwriterName => &self.underwriter_name,
            LookupAttribute::UnderwritingGroup => &self.underwriting_group,
        }
    }
}

/// Audit row recording that an update run took place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLog {
    pub id: Uuid,
    pub name: String,
    pub update_date: NaiveDateTime,
    pub update_type: String,
    pub notes: String,
}

impl UpdateLog {
    /// Create an audit row stamped with the current time
    pub fn new(
        name: impl Into<String>,
        update_type: impl Into<String>,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            update_date: chrono::Local::now().naive_local(),
            update_type: update_type.into(),
            notes: notes.into(),
        }
    }
}

/// Counts produced by one batch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    /// Sampled loans rewritten with resolved lookups
    pub updated: usize,
    /// Sampled loans whose population record was missing
    pub failed: usize,
    /// Sampled loans without a loan number
    pub skipped: usize,
    /// Sampled loans whose update statement failed
    pub errors: usize,
}

/// Errors that can occur during the update
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Lookup table not found: {0}")]
    LookupTableNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for ReconcileError {
    fn from(err: rusqlite::Error) -> Self {
        ReconcileError::Storage(err.to_string())
    }
}

impl From<toml::de::Error> for ReconcileError {
    fn from(err: toml::de::Error) -> Self {
        ReconcileError::Config(err.to_string())
    }
}

/// Result type for update operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_trims_and_defaults() {
        let record = LoanImportRecord {
            loan_number: "L100 ".to_string(),
            underwriter_name: Some("  BankA ".to_string()),
            underwriting_group: None,
        };

        assert_eq!(record.raw_value(LookupAttribute::UnderwriterName), "BankA");
        assert_eq!(record.raw_value(LookupAttribute::UnderwritingGroup), "");
    }

    #[test]
    fn test_has_lookup_values() {
        let mut loan = SampledLoan {
            key: SampledLoanKey::new("5", "1"),
            loan_number: "L100".to_string(),
            underwriter_name: None,
            underwriting_group: None,
        };
        assert!(!loan.has_lookup_values());

        loan.underwriting_group = Some(LookupValueId::new());
        assert!(loan.has_lookup_values());
        assert!(loan.lookup(LookupAttribute::UnderwriterName).is_none());
    }

    #[test]
    fn test_new_lookup_value_is_active_and_unsaved() {
        let table = LookupTable::new("UnderwriterNameCode", "Underwriter Names");
        let value = LookupValue::new(table.id, "BankA", "Underwriter Name");

        assert!(value.is_active);
        assert!(value.id.is_none());
        assert_eq!(value.table_id, table.id);
    }
}
