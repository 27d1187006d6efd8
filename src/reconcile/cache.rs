//! Per-run memo of resolved lookup values

use std::collections::HashMap;
use std::future::Future;

use crate::types::*;

/// Raw text to lookup identifier memo for a single attribute
///
/// Keys are compared exactly (case-sensitive), matching how lookup codes are
/// compared in storage. A cache lives for one batch pass only.
#[derive(Debug, Default, Clone)]
pub struct LookupCache {
    entries: HashMap<String, LookupValueId>,
    hits: usize,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized identifier for `raw`, or run `resolve` once and
    /// remember its result. Failed resolutions are not remembered.
    pub async fn get_or_resolve<F, Fut>(
        &mut self,
        raw: &str,
        resolve: F,
    ) -> ReconcileResult<LookupValueId>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ReconcileResult<LookupValueId>>,
    {
        if let Some(id) = self.entries.get(raw) {
            self.hits += 1;
            tracing::debug!(raw, %id, "lookup cache hit");
            return Ok(*id);
        }

        let id = resolve().await?;
        self.entries.insert(raw.to_string(), id);
        Ok(id)
    }

    /// Cached identifier for `raw`, if resolved in this pass
    pub fn get(&self, raw: &str) -> Option<LookupValueId> {
        self.entries.get(raw).copied()
    }

    /// Number of distinct raw values resolved
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of lookups answered without resolving
    pub fn hits(&self) -> usize {
        self.hits
    }
}

/// One cache per lookup attribute, scoped to one variant's batch pass
#[derive(Debug, Default, Clone)]
pub struct AttributeCaches {
    underwriter_name: LookupCache,
    underwriting_group: LookupCache,
}

impl AttributeCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_attribute(&mut self, attribute: LookupAttribute) -> &mut LookupCache {
        match attribute {
            LookupAttribute::UnderwriterName => &mut self.underwriter_name,
            LookupAttribute::UnderwritingGroup => &mut self.underwriting_group,
        }
    }

    pub fn get(&self, attribute: LookupAttribute) -> &LookupCache {
        match attribute {
            LookupAttribute::UnderwriterName => &self.underwriter_name,
            LookupAttribute::UnderwritingGroup => &self.underwriting_group,
        }
    }
}
