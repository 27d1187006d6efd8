//! Reconciliation against in-memory storage

use sample_data_update::utils::{MemoryStorage, ProgressLog};
use sample_data_update::{
    LoanImportRecord, LoanVariant, LookupTable, LookupValue, LookupValueId, SampleDataUpdate,
    SampledLoan, SampledLoanKey,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔁 Sample Data Update - In-Memory Example\n");

    let storage = MemoryStorage::new();
    let names =
        storage.add_lookup_table(LookupTable::new("UnderwriterNameCode", "Underwriter Names"));
    storage.add_lookup_table(LookupTable::new("UnderwritingGrpCode", "Underwriting Groups"));
    let legacy = storage.add_lookup_value(LookupValue::new(names.id, "LEGACY", "Underwriter Name"));

    for (id, number, bank, group) in [
        ("1", "L100", "BankA", "Retail"),
        ("2", "L101", "BankA", "Wholesale"),
        ("3", "L102", "BankB", "Retail"),
    ] {
        storage.add_sampled_loan(
            LoanVariant::Primary,
            SampledLoan {
                key: SampledLoanKey::new(id, "1"),
                loan_number: number.to_string(),
                underwriter_name: Some(legacy),
                underwriting_group: Some(LookupValueId::new()),
            },
        );
        storage.add_import_record(
            LoanVariant::Primary,
            LoanImportRecord {
                loan_number: format!("{} ", number),
                underwriter_name: Some(bank.to_string()),
                underwriting_group: Some(group.to_string()),
            },
        );
    }

    let progress = ProgressLog::new();
    let report = SampleDataUpdate::new(storage.clone()).run(&progress).await;

    println!("📋 Progress messages:");
    for message in progress.messages() {
        println!("  • {}", message);
    }
    println!();

    println!("📊 Underwriter names after the run:");
    for value in storage.lookup_values(names.id) {
        println!("  ✓ {} ({})", value.code, value.name);
    }
    println!();

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
