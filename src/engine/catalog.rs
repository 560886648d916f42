use std::collections::HashMap;

use crate::model::*;

// ── Category Classifier ───────────────────────────────────────────

/// Identifier → category lookup, built once per run from a reference table.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    case: Case,
    entries: HashMap<String, String>,
}

impl Catalog {
    /// The first definition of an identifier wins; blank identifiers are ignored.
    pub fn build(entries: impl IntoIterator<Item = CatalogEntry>, case: Case) -> Self {
        let mut map = HashMap::new();
        for entry in entries {
            let identifier = entry.identifier.trim();
            if identifier.is_empty() {
                continue;
            }
            map.entry(case.normalize(identifier))
                .or_insert_with(|| entry.category.trim().to_string());
        }
        Self { case, entries: map }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn category_of(&self, identifier: &str) -> Option<&str> {
        self.entries
            .get(&self.case.normalize(identifier))
            .map(String::as_str)
    }

    /// Split `resources` into the requested categories, keeping set order.
    ///
    /// Identifiers missing from the catalog, or filed under a category that was
    /// not requested, are dropped without error.
    pub fn classify(&self, resources: &ResourceSet, categories: &[String]) -> Vec<CategoryResult> {
        let mut results: Vec<CategoryResult> = categories
            .iter()
            .map(|c| CategoryResult::new(c.clone(), Vec::new()))
            .collect();
        for id in resources.iter() {
            let Some(category) = self.category_of(id) else {
                continue;
            };
            if let Some(result) = results.iter_mut().find(|r| r.category == category) {
                result.members.push(id.to_string());
            }
        }
        results
    }
}
