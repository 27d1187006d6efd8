//! Full update run against a scratch SQLite database

use sample_data_update::utils::{ProgressLog, SqliteStorage};
use sample_data_update::{
    LoanImportRecord, LoanVariant, LookupTable, LookupValueId, SampledLoan, SampledLoanKey,
    UpdateConfig, UpdateRunner,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🗄️  Sample Data Update - SQLite Example\n");

    let dir = std::env::temp_dir().join("sample-data-update-demo");
    std::fs::create_dir_all(&dir)?;
    let db_path = dir.join("demo.sqlite");
    if db_path.exists() {
        std::fs::remove_file(&db_path)?;
    }

    let storage = SqliteStorage::open(&db_path)?;
    storage.install_schema()?;
    storage.insert_lookup_table(&LookupTable::new("UnderwriterNameCode", "Underwriter Names"))?;
    storage.insert_lookup_table(&LookupTable::new("UnderwritingGrpCode", "Underwriting Groups"))?;

    for variant in LoanVariant::ALL {
        let number = match variant {
            LoanVariant::Primary => "P-100",
            LoanVariant::Dar => "D-100",
        };
        storage.insert_sampled_loan(
            variant,
            &SampledLoan {
                key: SampledLoanKey::new("1", "1"),
                loan_number: number.to_string(),
                underwriter_name: Some(LookupValueId::new()),
                underwriting_group: None,
            },
        )?;
        storage.insert_import_record(
            variant,
            &LoanImportRecord {
                loan_number: number.to_string(),
                underwriter_name: Some(format!("{} Bank", variant)),
                underwriting_group: Some("Retail".to_string()),
            },
        )?;
    }
    // No import record for this one
    storage.insert_sampled_loan(
        LoanVariant::Primary,
        &SampledLoan {
            key: SampledLoanKey::new("2", "1"),
            loan_number: "P-404".to_string(),
            underwriter_name: Some(LookupValueId::new()),
            underwriting_group: None,
        },
    )?;

    let log_path = dir.join("CogentQC_NMI_SampleDataUpdate.txt");
    let runner =
        UpdateRunner::new(storage.clone(), UpdateConfig::default()).with_log_path(&log_path);
    let report = runner.run(&ProgressLog::new()).await?;

    println!("✓ Run succeeded: {}", report.succeeded());
    println!("✓ Audit rows: {}", storage.update_log_count()?);
    println!("✓ Log file: {}\n", log_path.display());
    println!("{}", std::fs::read_to_string(&log_path)?);

    Ok(())
}
