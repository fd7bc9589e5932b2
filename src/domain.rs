use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AtlasError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kingdom {
    Animals,
    Plants,
    Fungi,
    Bacteria,
    Protoctists,
}

impl Kingdom {
    /// Processing order of a catalog run.
    pub const ALL: [Kingdom; 5] = [
        Kingdom::Animals,
        Kingdom::Plants,
        Kingdom::Fungi,
        Kingdom::Bacteria,
        Kingdom::Protoctists,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Kingdom::Animals => "animals",
            Kingdom::Plants => "plants",
            Kingdom::Fungi => "fungi",
            Kingdom::Bacteria => "bacteria",
            Kingdom::Protoctists => "protoctists",
        }
    }
}

impl fmt::Display for Kingdom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonRank {
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
    Subspecies,
}

impl TaxonRank {
    pub fn as_str(self) -> &'static str {
        match self {
            TaxonRank::Kingdom => "kingdom",
            TaxonRank::Phylum => "phylum",
            TaxonRank::Class => "class",
            TaxonRank::Order => "order",
            TaxonRank::Family => "family",
            TaxonRank::Genus => "genus",
            TaxonRank::Species => "species",
            TaxonRank::Subspecies => "subspecies",
        }
    }

    pub fn is_species_level(self) -> bool {
        matches!(self, TaxonRank::Species | TaxonRank::Subspecies)
    }
}

impl fmt::Display for TaxonRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaxonRank {
    type Err = AtlasError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "kingdom" => Ok(TaxonRank::Kingdom),
            "phylum" => Ok(TaxonRank::Phylum),
            "class" => Ok(TaxonRank::Class),
            "order" => Ok(TaxonRank::Order),
            "family" => Ok(TaxonRank::Family),
            "genus" => Ok(TaxonRank::Genus),
            "species" => Ok(TaxonRank::Species),
            "subspecies" => Ok(TaxonRank::Subspecies),
            _ => Err(AtlasError::InvalidRank(value.to_string())),
        }
    }
}

/// Ranks sent with every taxa search unless the config overrides them.
pub fn default_search_ranks() -> Vec<TaxonRank> {
    vec![
        TaxonRank::Subspecies,
        TaxonRank::Species,
        TaxonRank::Genus,
        TaxonRank::Order,
        TaxonRank::Class,
        TaxonRank::Phylum,
    ]
}

/// One organism as written in the catalog. Only `scientific` is interpreted;
/// every other field is carried through untouched.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrganismRecord {
    #[serde(default)]
    pub scientific: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_rank_case_insensitive() {
        let rank: TaxonRank = "Species".parse().unwrap();
        assert_eq!(rank, TaxonRank::Species);
        assert!(rank.is_species_level());
        assert!(!TaxonRank::Genus.is_species_level());
    }

    #[test]
    fn parse_rank_invalid() {
        let err = "clade".parse::<TaxonRank>().unwrap_err();
        assert_matches!(err, AtlasError::InvalidRank(_));
    }

    #[test]
    fn default_ranks_exclude_family_and_kingdom() {
        let joined = default_search_ranks()
            .iter()
            .map(|rank| rank.as_str())
            .collect::<Vec<_>>()
            .join(",");
        assert_eq!(joined, "subspecies,species,genus,order,class,phylum");
    }
}
