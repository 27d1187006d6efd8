//! Create-or-reuse resolution of raw text into lookup values

use crate::traits::*;
use crate::types::*;

/// Resolves raw text codes to lookup value identifiers
///
/// The existence check and the insert are separate store calls; two runs
/// resolving the same new code at the same time can both create it.
pub struct LookupResolver<S: LookupService> {
    pub(crate) storage: S,
}

impl<S: LookupService> LookupResolver<S> {
    /// Create a new resolver over the given lookup service
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Return the identifier of the value `raw_code` in `table`, creating an
    /// active value named `display_name` when none exists yet
    pub async fn resolve(
        &self,
        table: &LookupTable,
        raw_code: &str,
        display_name: &str,
    ) -> ReconcileResult<LookupValueId> {
        let code = raw_code.trim();

        if let Some(existing) = self
            .storage
            .get_lookup_value_by_code(&table.code, code)
            .await?
        {
            if let Some(id) = existing.id {
                return Ok(id);
            }
            return Err(ReconcileError::Storage(format!(
                "Lookup value '{}' in table '{}' has no identifier",
                code, table.code
            )));
        }

        let value = LookupValue::new(table.id, code, display_name);
        let id = self.storage.save_lookup_value(&value).await?;
        tracing::debug!(table = %table.code, code, %id, "created lookup value");

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;

    fn underwriter_table(storage: &MemoryStorage) -> LookupTable {
        storage.add_lookup_table(LookupTable::new("UnderwriterNameCode", "Underwriter Names"))
    }

    #[tokio::test]
    async fn test_resolve_creates_missing_value() {
        let storage = MemoryStorage::new();
        let table = underwriter_table(&storage);
        let resolver = LookupResolver::new(storage.clone());

        let id = resolver
            .resolve(&table, "BankA", "Underwriter Name")
            .await
            .unwrap();

        let values = storage.lookup_values(table.id);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].id, Some(id));
        assert_eq!(values[0].code, "BankA");
        assert_eq!(values[0].name, "Underwriter Name");
        assert!(values[0].is_active);
    }

    #[tokio::test]
    async fn test_resolve_reuses_existing_value() {
        let storage = MemoryStorage::new();
        let table = underwriter_table(&storage);
        let existing = storage.add_lookup_value(LookupValue::new(table.id, "BankA", "Bank A"));
        let resolver = LookupResolver::new(storage.clone());

        let first = resolver
            .resolve(&table, " BankA ", "Underwriter Name")
            .await
            .unwrap();
        let second = resolver
            .resolve(&table, "BankA", "Underwriter Name")
            .await
            .unwrap();

        assert_eq!(first, existing);
        assert_eq!(second, existing);
        assert_eq!(storage.lookup_values(table.id).len(), 1);
        assert_eq!(storage.saved_lookup_value_count(), 0);
    }

    #[tokio::test]
    async fn test_values_are_scoped_to_their_table() {
        let storage = MemoryStorage::new();
        let names = underwriter_table(&storage);
        let groups = storage.add_lookup_table(LookupTable::new(
            "UnderwritingGrpCode",
            "Underwriting Groups",
        ));
        let resolver = LookupResolver::new(storage.clone());

        let name_id = resolver
            .resolve(&names, "Retail", "Underwriter Name")
            .await
            .unwrap();
        let group_id = resolver
            .resolve(&groups, "Retail", "Underwriting Group")
            .await
            .unwrap();

        assert_ne!(name_id, group_id);
        assert_eq!(storage.lookup_values(groups.id)[0].name, "Underwriting Group");
    }
}
