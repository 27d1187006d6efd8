//! SQLite storage implementation

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::config::TableLayout;
use crate::traits::*;
use crate::types::*;

/// Identifier columns may hold this value instead of NULL for "no value"
pub const EMPTY_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Identifier text as compared in SQL; existing rows may carry any case or padding
fn normalized(column: &str) -> String {
    format!("LOWER(TRIM({}))", column)
}

const LOOKUP_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS LookupTable (
    LookupTableID TEXT PRIMARY KEY,
    LookupTableCode TEXT NOT NULL UNIQUE,
    Name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS LookupValue (
    LookupValueID TEXT PRIMARY KEY,
    LookupTableID TEXT NOT NULL REFERENCES LookupTable(LookupTableID),
    Code TEXT NOT NULL,
    Name TEXT NOT NULL,
    IsActive INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS UpdateLog (
    UpdateID TEXT PRIMARY KEY,
    Name TEXT NOT NULL,
    UpdateDate TEXT NOT NULL,
    UpdateType TEXT NOT NULL,
    Notes TEXT
);
"#;

/// SQLite-backed storage
///
/// Every value is bound as a parameter; table names come from a validated
/// [`TableLayout`].
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    layout: TableLayout,
}

impl SqliteStorage {
    /// Open a database file with the default table layout
    pub fn open(path: &Path) -> ReconcileResult<Self> {
        Self::with_layout(Connection::open(path)?, TableLayout::default())
    }

    /// Open a private in-memory database with the default table layout
    pub fn open_in_memory() -> ReconcileResult<Self> {
        Self::with_layout(Connection::open_in_memory()?, TableLayout::default())
    }

    /// Wrap an open connection using the given table layout
    pub fn with_layout(conn: Connection, layout: TableLayout) -> ReconcileResult<Self> {
        layout.validate()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            layout,
        })
    }

    /// Create the lookup, audit and loan tables if they do not exist
    ///
    /// For scratch databases in tests and demos; production databases
    /// already carry these tables.
    pub fn install_schema(&self) -> ReconcileResult<()> {
        let conn = self.connection()?;
        conn.execute_batch(LOOKUP_SCHEMA)?;
        for variant in LoanVariant::ALL {
            let tables = self.layout.for_variant(variant);
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {sample} (
                    LoanID TEXT NOT NULL,
                    SampleTypeID TEXT NOT NULL,
                    LoanNumber TEXT,
                    underwriterName TEXT,
                    underwritingGroup TEXT,
                    PRIMARY KEY (LoanID, SampleTypeID)
                );
                CREATE TABLE IF NOT EXISTS {import} (
                    LoanNumber TEXT,
                    underwriterName TEXT,
                    underwritingGroup TEXT
                );",
                sample = tables.sample,
                import = tables.import,
            ))?;
        }
        Ok(())
    }

    /// Insert a lookup table row
    pub fn insert_lookup_table(&self, table: &LookupTable) -> ReconcileResult<()> {
        self.connection()?.execute(
            "INSERT INTO LookupTable (LookupTableID, LookupTableCode, Name) VALUES (?1, ?2, ?3)",
            params![table.id.0.to_string(), table.code, table.name],
        )?;
        Ok(())
    }

    /// Insert a sampled loan row into the variant's sample table
    pub fn insert_sampled_loan(
        &self,
        variant: LoanVariant,
        loan: &SampledLoan,
    ) -> ReconcileResult<()> {
        let sql = format!(
            "INSERT INTO {} (LoanID, SampleTypeID, LoanNumber, underwriterName, underwritingGroup)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            self.layout.for_variant(variant).sample
        );
        self.connection()?.execute(
            &sql,
            params![
                loan.key.loan_id,
                loan.key.sample_type_id,
                loan.loan_number,
                id_to_sql(loan.underwriter_name),
                id_to_sql(loan.underwriting_group),
            ],
        )?;
        Ok(())
    }

    /// Insert a population record into the variant's import table
    pub fn insert_import_record(
        &self,
        variant: LoanVariant,
        record: &LoanImportRecord,
    ) -> ReconcileResult<()> {
        let sql = format!(
            "INSERT INTO {} (LoanNumber, underwriterName, underwritingGroup) VALUES (?1, ?2, ?3)",
            self.layout.for_variant(variant).import
        );
        self.connection()?.execute(
            &sql,
            params![
                record.loan_number,
                record.underwriter_name,
                record.underwriting_group
            ],
        )?;
        Ok(())
    }

    /// Read one sampled loan by key, whether or not it has lookups assigned
    pub fn sampled_loan(
        &self,
        variant: LoanVariant,
        key: &SampledLoanKey,
    ) -> ReconcileResult<Option<SampledLoan>> {
        let sql = format!(
            "SELECT LoanID, SampleTypeID, LoanNumber, underwriterName, underwritingGroup
             FROM {} WHERE LoanID = ?1 AND SampleTypeID = ?2",
            self.layout.for_variant(variant).sample
        );
        let conn = self.connection()?;
        conn.query_row(&sql, params![key.loan_id, key.sample_type_id], read_loan_row)
            .optional()?
            .map(LoanRow::into_loan)
            .transpose()
    }

    /// Lookup values of one table, ordered by code
    pub fn lookup_values(&self, table_id: LookupTableId) -> ReconcileResult<Vec<LookupValue>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT LookupValueID, LookupTableID, Code, Name, IsActive
             FROM LookupValue WHERE LOWER(TRIM(LookupTableID)) = ?1 ORDER BY Code",
        )?;
        let rows = stmt.query_map(params![table_id.0.to_string()], read_value_row)?;

        let mut values = Vec::new();
        for row in rows {
            values.push(row?.into_value()?);
        }
        Ok(values)
    }

    /// Number of audit rows recorded
    pub fn update_log_count(&self) -> ReconcileResult<u64> {
        let count: i64 = self
            .connection()?
            .query_row("SELECT COUNT(*) FROM UpdateLog", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn connection(&self) -> ReconcileResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ReconcileError::Storage("SQLite connection lock poisoned".to_string()))
    }

    fn unreferenced_clause(&self, column: &str) -> String {
        LoanVariant::ALL
            .iter()
            .map(|variant| {
                format!(
                    "AND {id} NOT IN (SELECT {column} FROM {table} \
                     WHERE {column} IS NOT NULL AND {column} <> '{empty}')",
                    id = normalized("LookupValueID"),
                    column = normalized(column),
                    empty = EMPTY_ID,
                    table = self.layout.for_variant(*variant).sample,
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn id_to_sql(id: Option<LookupValueId>) -> Option<String> {
    id.map(|id| id.0.to_string())
}

fn id_from_sql(raw: Option<String>) -> ReconcileResult<Option<LookupValueId>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some(EMPTY_ID) => Ok(None),
        Some(text) => Uuid::parse_str(text)
            .map(|uuid| Some(LookupValueId(uuid)))
            .map_err(|e| ReconcileError::Storage(format!("invalid lookup id '{}': {}", text, e))),
    }
}

fn parse_uuid(text: &str) -> ReconcileResult<Uuid> {
    Uuid::parse_str(text.trim())
        .map_err(|e| ReconcileError::Storage(format!("invalid identifier '{}': {}", text, e)))
}

struct LoanRow {
    loan_id: String,
    sample_type_id: String,
    loan_number: Option<String>,
    underwriter_name: Option<String>,
    underwriting_group: Option<String>,
}

impl LoanRow {
    fn into_loan(self) -> ReconcileResult<SampledLoan> {
        Ok(SampledLoan {
            key: SampledLoanKey::new(self.loan_id, self.sample_type_id),
            loan_number: self.loan_number.unwrap_or_default(),
            underwriter_name: id_from_sql(self.underwriter_name)?,
            underwriting_group: id_from_sql(self.underwriting_group)?,
        })
    }
}

fn read_loan_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LoanRow> {
    Ok(LoanRow {
        loan_id: row.get(0)?,
        sample_type_id: row.get(1)?,
        loan_number: row.get(2)?,
        underwriter_name: row.get(3)?,
        underwriting_group: row.get(4)?,
    })
}

struct ValueRow {
    id: String,
    table_id: String,
    code: String,
    name: String,
    is_active: bool,
}

impl ValueRow {
    fn into_value(self) -> ReconcileResult<LookupValue> {
        Ok(LookupValue {
            id: Some(LookupValueId(parse_uuid(&self.id)?)),
            table_id: LookupTableId(parse_uuid(&self.table_id)?),
            code: self.code,
            name: self.name,
            is_active: self.is_active,
        })
    }
}

fn read_value_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ValueRow> {
    Ok(ValueRow {
        id: row.get(0)?,
        table_id: row.get(1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        is_active: row.get(4)?,
    })
}

#[async_trait]
impl LookupService for SqliteStorage {
    async fn get_lookup_table(&self, code: &str) -> ReconcileResult<Option<LookupTable>> {
        let conn = self.connection()?;
        let row = conn
            .query_row(
                "SELECT LookupTableID, LookupTableCode, Name
                 FROM LookupTable WHERE LookupTableCode = ?1",
                params![code],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, code, name)) => Ok(Some(LookupTable {
                id: LookupTableId(parse_uuid(&id)?),
                code,
                name,
            })),
            None => Ok(None),
        }
    }

    async fn get_lookup_value_by_code(
        &self,
        table_code: &str,
        code: &str,
    ) -> ReconcileResult<Option<LookupValue>> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT v.LookupValueID, v.LookupTableID, v.Code, v.Name, v.IsActive
             FROM LookupValue v
             JOIN LookupTable t ON LOWER(TRIM(t.LookupTableID)) = LOWER(TRIM(v.LookupTableID))
             WHERE t.LookupTableCode = ?1 AND v.Code = ?2
             LIMIT 1",
            params![table_code, code],
            read_value_row,
        )
        .optional()?
            .map(ValueRow::into_value)
            .transpose()
    }

    async fn save_lookup_value(&self, value: &LookupValue) -> ReconcileResult<LookupValueId> {
        let id = value.id.unwrap_or_default();
        self.connection()?.execute(
            "INSERT INTO LookupValue (LookupValueID, LookupTableID, Code, Name, IsActive)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.0.to_string(),
                value.table_id.0.to_string(),
                value.code,
                value.name,
                value.is_active
            ],
        )?;
        Ok(id)
    }
}

#[async_trait]
impl SampleStore for SqliteStorage {
    async fn sampled_loans_to_process(
        &self,
        variant: LoanVariant,
    ) -> ReconcileResult<Vec<SampledLoan>> {
        let sql = format!(
            "SELECT LoanID, SampleTypeID, LoanNumber, underwriterName, underwritingGroup
             FROM {table}
             WHERE (underwriterName IS NOT NULL AND {name} <> ?1)
                OR (underwritingGroup IS NOT NULL AND {group} <> ?1)
             ORDER BY rowid",
            table = self.layout.for_variant(variant).sample,
            name = normalized("underwriterName"),
            group = normalized("underwritingGroup"),
        );
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![EMPTY_ID], read_loan_row)?;

        let mut loans = Vec::new();
        for row in rows {
            let loan = row?.into_loan()?;
            // Blank strings are not caught by the SQL filter
            if loan.has_lookup_values() {
                loans.push(loan);
            }
        }
        Ok(loans)
    }

    async fn find_import_record(
        &self,
        variant: LoanVariant,
        loan_number: &str,
    ) -> ReconcileResult<Option<LoanImportRecord>> {
        let sql = format!(
            "SELECT LoanNumber, underwriterName, underwritingGroup
             FROM {} WHERE TRIM(LoanNumber) = ?1 LIMIT 1",
            self.layout.for_variant(variant).import
        );
        let conn = self.connection()?;
        let record = conn
            .query_row(&sql, params![loan_number], |row| {
                Ok(LoanImportRecord {
                    loan_number: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    underwriter_name: row.get(1)?,
                    underwriting_group: row.get(2)?,
                })
            })
            .optional()?;
        Ok(record)
    }

    async fn update_sampled_loan(
        &self,
        variant: LoanVariant,
        key: &SampledLoanKey,
        resolved: &ResolvedLookups,
    ) -> ReconcileResult<()> {
        let sql = format!(
            "UPDATE {} SET underwriterName = ?1, underwritingGroup = ?2
             WHERE LoanID = ?3 AND SampleTypeID = ?4",
            self.layout.for_variant(variant).sample
        );
        self.connection()?.execute(
            &sql,
            params![
                resolved.underwriter_name.0.to_string(),
                resolved.underwriting_group.0.to_string(),
                key.loan_id,
                key.sample_type_id
            ],
        )?;
        Ok(())
    }

    async fn delete_unused_lookup_values(
        &self,
        table: &LookupTable,
        attribute: LookupAttribute,
    ) -> ReconcileResult<u64> {
        let sql = format!(
            "DELETE FROM LookupValue WHERE {} = ?1 {}",
            normalized("LookupTableID"),
            self.unreferenced_clause(attribute.column())
        );
        let deleted = self
            .connection()?
            .execute(&sql, params![table.id.0.to_string()])?;
        Ok(deleted as u64)
    }

    async fn insert_update_log(&self, log: &UpdateLog) -> ReconcileResult<()> {
        self.connection()?.execute(
            "INSERT INTO UpdateLog (UpdateID, Name, UpdateDate, UpdateType, Notes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                log.id.to_string(),
                log.name,
                log.update_date.format("%Y-%m-%d %H:%M:%S").to_string(),
                log.update_type,
                log.notes
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> SqliteStorage {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.install_schema().unwrap();
        storage
    }

    fn loan(id: &str, number: &str, name: Option<LookupValueId>) -> SampledLoan {
        SampledLoan {
            key: SampledLoanKey::new(id, "1"),
            loan_number: number.to_string(),
            underwriter_name: name,
            underwriting_group: None,
        }
    }

    #[tokio::test]
    async fn test_lookup_round_trip() {
        let storage = storage();
        let table = LookupTable::new("UnderwriterNameCode", "Underwriter Names");
        storage.insert_lookup_table(&table).unwrap();

        assert_eq!(
            storage.get_lookup_table("UnderwriterNameCode").await.unwrap(),
            Some(table.clone())
        );
        assert!(storage.get_lookup_table("Missing").await.unwrap().is_none());

        let id = storage
            .save_lookup_value(&LookupValue::new(table.id, "BankA", "Underwriter Name"))
            .await
            .unwrap();
        let found = storage
            .get_lookup_value_by_code("UnderwriterNameCode", "BankA")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, Some(id));
        assert!(found.is_active);

        // Codes compare case-sensitively
        assert!(storage
            .get_lookup_value_by_code("UnderwriterNameCode", "banka")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_selection_skips_empty_identifiers() {
        let storage = storage();
        storage
            .insert_sampled_loan(LoanVariant::Primary, &loan("1", "L1", None))
            .unwrap();
        storage
            .insert_sampled_loan(
                LoanVariant::Primary,
                &loan("2", "L2", Some(LookupValueId::new())),
            )
            .unwrap();
        {
            let conn = storage.connection().unwrap();
            conn.execute(
                "INSERT INTO Loan (LoanID, SampleTypeID, LoanNumber, underwriterName, underwritingGroup)
                 VALUES ('3', '1', 'L3', ?1, ?1)",
                params![EMPTY_ID],
            )
            .unwrap();
        }

        let loans = storage
            .sampled_loans_to_process(LoanVariant::Primary)
            .await
            .unwrap();
        assert_eq!(loans.len(), 1);
        assert_eq!(loans[0].loan_number, "L2");
    }

    #[tokio::test]
    async fn test_variants_use_their_own_tables() {
        let storage = storage();
        let seed = Some(LookupValueId::new());
        storage
            .insert_sampled_loan(LoanVariant::Primary, &loan("1", "P1", seed))
            .unwrap();
        storage
            .insert_sampled_loan(LoanVariant::Dar, &loan("1", "D1", seed))
            .unwrap();
        storage
            .insert_import_record(
                LoanVariant::Dar,
                &LoanImportRecord {
                    loan_number: " D1 ".to_string(),
                    underwriter_name: Some("DarBank".to_string()),
                    underwriting_group: None,
                },
            )
            .unwrap();

        let dar = storage.sampled_loans_to_process(LoanVariant::Dar).await.unwrap();
        assert_eq!(dar.len(), 1);
        assert_eq!(dar[0].loan_number, "D1");

        assert!(storage
            .find_import_record(LoanVariant::Dar, "D1")
            .await
            .unwrap()
            .is_some());
        assert!(storage
            .find_import_record(LoanVariant::Primary, "D1")
            .await
            .unwrap()
            .is_none());

        let resolved = ResolvedLookups {
            underwriter_name: LookupValueId::new(),
            underwriting_group: LookupValueId::new(),
        };
        storage
            .update_sampled_loan(LoanVariant::Dar, &SampledLoanKey::new("1", "1"), &resolved)
            .await
            .unwrap();

        let key = SampledLoanKey::new("1", "1");
        let dar_loan = storage.sampled_loan(LoanVariant::Dar, &key).unwrap().unwrap();
        let primary_loan = storage.sampled_loan(LoanVariant::Primary, &key).unwrap().unwrap();
        assert_eq!(dar_loan.underwriter_name, Some(resolved.underwriter_name));
        assert_eq!(primary_loan.underwriter_name, seed);
    }

    #[tokio::test]
    async fn test_delete_unused_values_across_variants() {
        let storage = storage();
        let table = LookupTable::new("UnderwriterNameCode", "Underwriter Names");
        storage.insert_lookup_table(&table).unwrap();

        let mut ids = Vec::new();
        for code in ["A", "B", "C"] {
            ids.push(
                storage
                    .save_lookup_value(&LookupValue::new(table.id, code, "Underwriter Name"))
                    .await
                    .unwrap(),
            );
        }
        storage
            .insert_sampled_loan(LoanVariant::Primary, &loan("1", "L1", Some(ids[0])))
            .unwrap();
        storage
            .insert_sampled_loan(LoanVariant::Dar, &loan("2", "L2", Some(ids[1])))
            .unwrap();
        // A NULL reference must not hide every value from NOT IN
        storage
            .insert_sampled_loan(LoanVariant::Dar, &loan("3", "L3", None))
            .unwrap();

        let deleted = storage
            .delete_unused_lookup_values(&table, LookupAttribute::UnderwriterName)
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let codes: Vec<String> = storage
            .lookup_values(table.id)
            .unwrap()
            .into_iter()
            .map(|v| v.code)
            .collect();
        assert_eq!(codes, vec!["A".to_string(), "B".to_string()]);
    }

    #[tokio::test]
    async fn test_custom_layout() {
        let mut layout = TableLayout::default();
        layout.dar.sample = "LoanDarSample".to_string();
        let storage =
            SqliteStorage::with_layout(Connection::open_in_memory().unwrap(), layout).unwrap();
        storage.install_schema().unwrap();

        storage
            .insert_sampled_loan(LoanVariant::Dar, &loan("1", "D1", Some(LookupValueId::new())))
            .unwrap();
        let count: i64 = storage
            .connection()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM LoanDarSample", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_uppercase_identifiers_survive_pruning() {
        use crate::reconcile::SampleDataUpdate;
        use crate::utils::progress::ProgressLog;

        let storage = storage();
        let names = Uuid::new_v4();
        let groups = Uuid::new_v4();
        let bank_a = Uuid::new_v4();
        let stale = Uuid::new_v4();
        let upper = |id: Uuid| id.to_string().to_uppercase();
        {
            let conn = storage.connection().unwrap();
            for (id, code) in [(names, "UnderwriterNameCode"), (groups, "UnderwritingGrpCode")] {
                conn.execute(
                    "INSERT INTO LookupTable (LookupTableID, LookupTableCode, Name)
                     VALUES (?1, ?2, ?2)",
                    params![upper(id), code],
                )
                .unwrap();
            }
            for (id, code) in [(bank_a, "BankA"), (stale, "Stale")] {
                conn.execute(
                    "INSERT INTO LookupValue (LookupValueID, LookupTableID, Code, Name, IsActive)
                     VALUES (?1, ?2, ?3, ?3, 1)",
                    params![upper(id), upper(names), code],
                )
                .unwrap();
            }
            conn.execute(
                "INSERT INTO Loan (LoanID, SampleTypeID, LoanNumber, underwriterName)
                 VALUES ('5', '1', 'L100', ?1)",
                params![format!(" {} ", upper(bank_a))],
            )
            .unwrap();
        }
        storage
            .insert_import_record(
                LoanVariant::Primary,
                &LoanImportRecord {
                    loan_number: "L100".to_string(),
                    underwriter_name: Some("BankA".to_string()),
                    underwriting_group: Some("Retail".to_string()),
                },
            )
            .unwrap();

        let report = SampleDataUpdate::new(storage.clone())
            .run(&ProgressLog::new())
            .await;

        assert!(report.succeeded());
        assert_eq!(report.primary.unwrap().updated, 1);
        // Only the unreferenced value goes
        assert_eq!(report.pruned(LookupAttribute::UnderwriterName), Some(1));

        let loan = storage
            .sampled_loan(LoanVariant::Primary, &SampledLoanKey::new("5", "1"))
            .unwrap()
            .unwrap();
        assert_eq!(loan.underwriter_name, Some(LookupValueId(bank_a)));

        let remaining = storage.lookup_values(LookupTableId(names)).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, Some(LookupValueId(bank_a)));
        assert_eq!(remaining[0].code, "BankA");
    }

    #[test]
    fn test_rejects_invalid_layout() {
        let mut layout = TableLayout::default();
        layout.primary.import = "Loan Import".to_string();
        let result = SqliteStorage::with_layout(Connection::open_in_memory().unwrap(), layout);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_identifier_reads_as_none() {
        assert_eq!(id_from_sql(None).unwrap(), None);
        assert_eq!(id_from_sql(Some(EMPTY_ID.to_string())).unwrap(), None);
        assert_eq!(id_from_sql(Some(String::new())).unwrap(), None);
        assert!(id_from_sql(Some("not-a-uuid".to_string())).is_err());
    }
}
