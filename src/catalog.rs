use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::{Kingdom, OrganismRecord};
use crate::error::AtlasError;
use crate::literal::parse_embedded_literal;

pub const DEFAULT_MARKER: &str = "const sectionOrganisms";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub kingdom: Kingdom,
    pub scientific: String,
}

/// Organism catalog grouped by kingdom, as recovered from the source literal.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    groups: BTreeMap<String, Vec<OrganismRecord>>,
}

impl Catalog {
    pub fn load(path: &Path, marker: &str) -> Result<Self, AtlasError> {
        let content =
            fs::read_to_string(path).map_err(|_| AtlasError::CatalogRead(path.to_path_buf()))?;
        Self::from_source(&content, marker)
    }

    pub fn from_source(source: &str, marker: &str) -> Result<Self, AtlasError> {
        let value = parse_embedded_literal(source, marker)?;
        let mut object: Map<String, Value> = serde_json::from_value(value)
            .map_err(|err| AtlasError::CatalogParse(err.to_string()))?;
        let mut groups = BTreeMap::new();
        for kingdom in Kingdom::ALL {
            let Some(group) = object.remove(kingdom.as_str()) else {
                continue;
            };
            let records: Vec<OrganismRecord> = serde_json::from_value(group)
                .map_err(|err| AtlasError::CatalogParse(format!("{kingdom}: {err}")))?;
            groups.insert(kingdom.as_str().to_string(), records);
        }
        Ok(Self { groups })
    }

    pub fn records(&self, kingdom: Kingdom) -> &[OrganismRecord] {
        self.groups
            .get(kingdom.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Flattens the catalog in kingdom order, dropping records without a
    /// scientific name. Keys that are not a known kingdom are ignored.
    pub fn entries(&self) -> Vec<CatalogEntry> {
        let mut entries = Vec::new();
        for kingdom in Kingdom::ALL {
            for record in self.records(kingdom) {
                let Some(scientific) = record.scientific.as_deref() else {
                    continue;
                };
                if scientific.trim().is_empty() {
                    continue;
                }
                entries.push(CatalogEntry {
                    kingdom,
                    scientific: scientific.to_string(),
                });
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const SOURCE: &str = r#"
const sectionOrganisms = {
  fungi: [
    { scientific: 'Amanita muscaria', common: 'Fly agaric' },
  ],
  animals: [
    { scientific: 'Panthera leo', common: 'Lion', diet: 'carnivore' },
    { common: 'Unnamed specimen' },
    { scientific: 'Vulpes vulpes' },
  ],
  minerals: [
    { scientific: 'Quartz' },
  ],
};
"#;

    #[test]
    fn entries_follow_kingdom_order() {
        let catalog = Catalog::from_source(SOURCE, DEFAULT_MARKER).unwrap();
        let names = catalog
            .entries()
            .into_iter()
            .map(|entry| (entry.kingdom, entry.scientific))
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                (Kingdom::Animals, "Panthera leo".to_string()),
                (Kingdom::Animals, "Vulpes vulpes".to_string()),
                (Kingdom::Fungi, "Amanita muscaria".to_string()),
            ]
        );
    }

    #[test]
    fn descriptive_fields_are_kept() {
        let catalog = Catalog::from_source(SOURCE, DEFAULT_MARKER).unwrap();
        let lion = &catalog.records(Kingdom::Animals)[0];
        assert_eq!(lion.details["diet"], "carnivore");
        assert!(catalog.records(Kingdom::Plants).is_empty());
    }

    #[test]
    fn non_list_group_is_a_parse_error() {
        let err = Catalog::from_source("const sectionOrganisms = { animals: 'none' };", DEFAULT_MARKER)
            .unwrap_err();
        assert_matches!(err, AtlasError::CatalogParse(_));
    }

    #[test]
    fn unknown_keys_of_any_shape_are_ignored() {
        let catalog = Catalog::from_source(
            "const sectionOrganisms = { animals: [{ scientific: 'Panthera leo' }], meta: { updated: '2024-01-01' }, version: 3 };",
            DEFAULT_MARKER,
        )
        .unwrap();
        assert_eq!(
            catalog.entries(),
            vec![CatalogEntry {
                kingdom: Kingdom::Animals,
                scientific: "Panthera leo".to_string(),
            }]
        );
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Catalog::load(&dir.path().join("organisms_data.js"), DEFAULT_MARKER).unwrap_err();
        assert_matches!(err, AtlasError::CatalogRead(_));
    }
}
