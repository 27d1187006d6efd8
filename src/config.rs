//! Run configuration
//!
//! Loaded from a TOML file; every field has a default so an empty document
//! describes the standard layout:
//!
//! ```toml
//! output_file_name = "CogentQC_NMI_SampleDataUpdate.txt"
//!
//! [lookup]
//! underwriter_name_code = "UnderwriterNameCode"
//! underwriting_group_code = "UnderwritingGrpCode"
//!
//! [tables.primary]
//! sample = "Loan"
//! import = "LoanImport"
//!
//! [tables.dar]
//! sample = "LoanDAR"
//! import = "DARLoanImport"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::types::*;
use crate::utils::validation::{validate_not_blank, validate_table_name};

/// Top-level settings for one update run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Progress log file written at the end of the run
    pub output_file_name: String,
    pub lookup: LookupCodes,
    pub tables: TableLayout,
    pub update_log: UpdateLogSettings,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            output_file_name: "CogentQC_NMI_SampleDataUpdate.txt".to_string(),
            lookup: LookupCodes::default(),
            tables: TableLayout::default(),
            update_log: UpdateLogSettings::default(),
        }
    }
}

impl UpdateConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> ReconcileResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReconcileError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> ReconcileResult<Self> {
        let config: UpdateConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ReconcileResult<()> {
        validate_not_blank("output_file_name", &self.output_file_name)?;
        validate_not_blank("lookup.underwriter_name_code", &self.lookup.underwriter_name_code)?;
        validate_not_blank("lookup.underwriting_group_code", &self.lookup.underwriting_group_code)?;
        validate_not_blank("update_log.name", &self.update_log.name)?;
        self.tables.validate()
    }
}

/// Symbolic codes of the two lookup tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupCodes {
    pub underwriter_name_code: String,
    pub underwriting_group_code: String,
}

impl Default for LookupCodes {
    fn default() -> Self {
        Self {
            underwriter_name_code: "UnderwriterNameCode".to_string(),
            underwriting_group_code: "UnderwritingGrpCode".to_string(),
        }
    }
}

/// Sample and import table names of one variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantTables {
    pub sample: String,
    pub import: String,
}

/// Physical tables for both variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableLayout {
    pub primary: VariantTables,
    pub dar: VariantTables,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            primary: VariantTables {
                sample: "Loan".to_string(),
                import: "LoanImport".to_string(),
            },
            dar: VariantTables {
                sample: "LoanDAR".to_string(),
                import: "DARLoanImport".to_string(),
            },
        }
    }
}

impl TableLayout {
    pub fn for_variant(&self, variant: LoanVariant) -> &VariantTables {
        match variant {
            LoanVariant::Primary => &self.primary,
            LoanVariant::Dar => &self.dar,
        }
    }

    /// Table names are spliced into SQL, so they must be plain identifiers
    pub fn validate(&self) -> ReconcileResult<()> {
        for tables in [&self.primary, &self.dar] {
            validate_table_name(&tables.sample)?;
            validate_table_name(&tables.import)?;
        }
        if self.primary.sample == self.dar.sample {
            return Err(ReconcileError::Config(format!(
                "primary and DAR sample tables must differ (both '{}')",
                self.primary.sample
            )));
        }
        Ok(())
    }
}

/// Contents of the audit row written after a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateLogSettings {
    pub name: String,
    pub update_type: String,
    pub notes: String,
}

impl Default for UpdateLogSettings {
    fn default() -> Self {
        Self {
            name: "CogentQC_NMI_SampleDataUpdate".to_string(),
            update_type: "Updater Program".to_string(),
            notes: "Update Underwriter Name and Underwriting Group sample data.".to_string(),
        }
    }
}
