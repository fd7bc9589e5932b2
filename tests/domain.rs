use organism_atlas::domain::{Kingdom, TaxonRank};

#[test]
fn kingdom_order_is_fixed() {
    let names = Kingdom::ALL
        .iter()
        .map(|kingdom| kingdom.to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec!["animals", "plants", "fungi", "bacteria", "protoctists"]
    );
}

#[test]
fn species_level_ranks() {
    let species_level = ["subspecies", "species", "genus", "family", "order"]
        .iter()
        .map(|rank| rank.parse::<TaxonRank>().unwrap())
        .filter(|rank| rank.is_species_level())
        .collect::<Vec<_>>();
    assert_eq!(
        species_level,
        vec![TaxonRank::Subspecies, TaxonRank::Species]
    );
}

#[test]
fn kingdom_serializes_lowercase() {
    let json = serde_json::to_string(&Kingdom::Protoctists).unwrap();
    assert_eq!(json, "\"protoctists\"");
}
