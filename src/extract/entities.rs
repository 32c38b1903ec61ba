//! Sailor and category deduplication within one extraction run.

use std::collections::HashMap;
use tracing::debug;

use super::clean_text;
use crate::types::{CategoryId, Diagnostic, RaceCategory, Sailor, SailorId};

/// Identity key: trimmed, whitespace-collapsed, case-folded
pub fn normalize_name(name: &str) -> String {
    clean_text(name).to_lowercase()
}

/// Identity maps owned by a single extraction session
#[derive(Debug, Default)]
pub struct EntityRegistry {
    sailors: Vec<Sailor>,
    sailor_index: HashMap<String, SailorId>,
    categories: Vec<RaceCategory>,
    category_index: HashMap<String, CategoryId>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a sailor by name, creating it on first sight.
    ///
    /// Attributes fill forward: a later non-empty value fills an empty one
    /// but never replaces a non-empty one; disagreements are reported in
    /// `diagnostics`. Returns `None` for a blank name.
    pub fn upsert_sailor(
        &mut self,
        name: &str,
        club: Option<&str>,
        age_category: Option<&str>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<SailorId> {
        let key = normalize_name(name);
        if key.is_empty() {
            return None;
        }
        let club = non_empty(club);
        let age_category = non_empty(age_category);

        if let Some(&id) = self.sailor_index.get(&key) {
            let sailor = &mut self.sailors[id.0];
            merge_attribute(&sailor.name, "club", &mut sailor.club, club, diagnostics);
            merge_attribute(
                &sailor.name,
                "age_category",
                &mut sailor.age_category,
                age_category,
                diagnostics,
            );
            return Some(id);
        }

        let id = SailorId(self.sailors.len());
        debug!("new sailor {:?}", name);
        self.sailors.push(Sailor {
            id,
            name: clean_text(name),
            club,
            age_category,
        });
        self.sailor_index.insert(key, id);
        Some(id)
    }

    /// Resolve a category by name, creating it on first sight
    pub fn upsert_category(&mut self, name: &str) -> CategoryId {
        let key = normalize_name(name);
        if let Some(&id) = self.category_index.get(&key) {
            return id;
        }

        let id = CategoryId(self.categories.len());
        self.categories.push(RaceCategory {
            id,
            name: clean_text(name),
        });
        self.category_index.insert(key, id);
        id
    }

    pub fn sailor(&self, id: SailorId) -> &Sailor {
        &self.sailors[id.0]
    }

    pub fn category(&self, id: CategoryId) -> &RaceCategory {
        &self.categories[id.0]
    }

    #[cfg(test)]
    pub fn sailor_count(&self) -> usize {
        self.sailors.len()
    }

    pub fn into_parts(self) -> (Vec<Sailor>, Vec<RaceCategory>) {
        (self.sailors, self.categories)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(clean_text).filter(|v| !v.is_empty())
}

fn merge_attribute(
    sailor: &str,
    field: &str,
    current: &mut Option<String>,
    incoming: Option<String>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(incoming) = incoming else {
        return;
    };
    match current.as_deref() {
        None => *current = Some(incoming),
        Some(existing) if normalize_name(existing) != normalize_name(&incoming) => {
            diagnostics.push(Diagnostic::MergeConflict {
                sailor: sailor.to_string(),
                field: field.to_string(),
                kept: existing.to_string(),
                ignored: incoming,
            });
        }
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_sailor_case_and_whitespace() {
        let mut registry = EntityRegistry::new();
        let mut diags = Vec::new();

        let a = registry.upsert_sailor("John Smith", None, None, &mut diags);
        let b = registry.upsert_sailor(" john  smith ", None, None, &mut diags);

        assert_eq!(a, b);
        assert_eq!(registry.sailor_count(), 1);
        assert_eq!(registry.sailor(a.unwrap()).name, "John Smith");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_fill_forward_merge() {
        let mut registry = EntityRegistry::new();
        let mut diags = Vec::new();

        let id = registry
            .upsert_sailor("Jane Doe", None, Some("U19"), &mut diags)
            .unwrap();
        registry.upsert_sailor("JANE DOE", Some("LGYC"), Some(""), &mut diags);

        let sailor = registry.sailor(id);
        assert_eq!(sailor.club.as_deref(), Some("LGYC"));
        assert_eq!(sailor.age_category.as_deref(), Some("U19"));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_conflict_keeps_first_value() {
        let mut registry = EntityRegistry::new();
        let mut diags = Vec::new();

        let id = registry
            .upsert_sailor("Jane Doe", Some("LGYC"), None, &mut diags)
            .unwrap();
        registry.upsert_sailor("Jane Doe", Some("lgyc"), None, &mut diags);
        assert!(diags.is_empty());

        registry.upsert_sailor("Jane Doe", Some("Pewaukee YC"), None, &mut diags);
        assert_eq!(registry.sailor(id).club.as_deref(), Some("LGYC"));
        assert_eq!(
            diags,
            vec![Diagnostic::MergeConflict {
                sailor: "Jane Doe".to_string(),
                field: "club".to_string(),
                kept: "LGYC".to_string(),
                ignored: "Pewaukee YC".to_string(),
            }]
        );
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let mut registry = EntityRegistry::new();
        let mut diags = Vec::new();
        assert!(registry.upsert_sailor("  ", None, None, &mut diags).is_none());
        assert_eq!(registry.sailor_count(), 0);
    }

    #[test]
    fn test_categories_deduplicate() {
        let mut registry = EntityRegistry::new();
        let a = registry.upsert_category("Sunfish");
        let b = registry.upsert_category(" SUNFISH ");
        let c = registry.upsert_category("Laser");

        assert_eq!(a, b);
        assert_ne!(a, c);
        let (_, categories) = registry.into_parts();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].name, "Sunfish");
    }
}
