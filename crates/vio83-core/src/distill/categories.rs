//! Domain Categories
//!
//! The closed set of 42 domain tags every document is classified under,
//! with per-category sub-discipline lists and the keyword profiles the
//! domain classifier scores against.

use serde::{Deserialize, Serialize};

/// Closed set of domain tags.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Physics,
    Chemistry,
    Biology,
    Medicine,
    Neuroscience,
    Psychology,
    Sociology,
    Anthropology,
    Economics,
    Law,
    PoliticalScience,
    History,
    Geography,
    Archaeology,
    Philosophy,
    Theology,
    Linguistics,
    Literature,
    Art,
    Music,
    Architecture,
    Engineering,
    ComputerScience,
    Mathematics,
    Statistics,
    Astronomy,
    Geology,
    Ecology,
    Agriculture,
    MaterialsScience,
    Energy,
    Education,
    Business,
    Finance,
    Marketing,
    Communication,
    Journalism,
    SportsScience,
    Culinary,
    Travel,
    Reference,
    #[default]
    General,
}

/// Every category, in declaration order.
pub const ALL_CATEGORIES: &[Category] = &[
    Category::Physics,
    Category::Chemistry,
    Category::Biology,
    Category::Medicine,
    Category::Neuroscience,
    Category::Psychology,
    Category::Sociology,
    Category::Anthropology,
    Category::Economics,
    Category::Law,
    Category::PoliticalScience,
    Category::History,
    Category::Geography,
    Category::Archaeology,
    Category::Philosophy,
    Category::Theology,
    Category::Linguistics,
    Category::Literature,
    Category::Art,
    Category::Music,
    Category::Architecture,
    Category::Engineering,
    Category::ComputerScience,
    Category::Mathematics,
    Category::Statistics,
    Category::Astronomy,
    Category::Geology,
    Category::Ecology,
    Category::Agriculture,
    Category::MaterialsScience,
    Category::Energy,
    Category::Education,
    Category::Business,
    Category::Finance,
    Category::Marketing,
    Category::Communication,
    Category::Journalism,
    Category::SportsScience,
    Category::Culinary,
    Category::Travel,
    Category::Reference,
    Category::General,
];

impl Category {
    /// The snake_case tag stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Physics => "physics",
            Category::Chemistry => "chemistry",
            Category::Biology => "biology",
            Category::Medicine => "medicine",
            Category::Neuroscience => "neuroscience",
            Category::Psychology => "psychology",
            Category::Sociology => "sociology",
            Category::Anthropology => "anthropology",
            Category::Economics => "economics",
            Category::Law => "law",
            Category::PoliticalScience => "political_science",
            Category::History => "history",
            Category::Geography => "geography",
            Category::Archaeology => "archaeology",
            Category::Philosophy => "philosophy",
            Category::Theology => "theology",
            Category::Linguistics => "linguistics",
            Category::Literature => "literature",
            Category::Art => "art",
            Category::Music => "music",
            Category::Architecture => "architecture",
            Category::Engineering => "engineering",
            Category::ComputerScience => "computer_science",
            Category::Mathematics => "mathematics",
            Category::Statistics => "statistics",
            Category::Astronomy => "astronomy",
            Category::Geology => "geology",
            Category::Ecology => "ecology",
            Category::Agriculture => "agriculture",
            Category::MaterialsScience => "materials_science",
            Category::Energy => "energy",
            Category::Education => "education",
            Category::Business => "business",
            Category::Finance => "finance",
            Category::Marketing => "marketing",
            Category::Communication => "communication",
            Category::Journalism => "journalism",
            Category::SportsScience => "sports_science",
            Category::Culinary => "culinary",
            Category::Travel => "travel",
            Category::Reference => "reference",
            Category::General => "general",
        }
    }

    /// Parse a stored tag; unknown tags map to General.
    pub fn parse_name(s: &str) -> Category {
        ALL_CATEGORIES
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .unwrap_or(Category::General)
    }

    /// The closed sub-discipline set for this category.
    pub fn sub_disciplines(&self) -> &'static [&'static str] {
        match self {
            Category::Physics => &[
                "quantum", "particle", "condensed_matter", "optics", "thermodynamics",
                "astrophysics", "nuclear",
            ],
            Category::Chemistry => &["organic", "inorganic", "physical", "analytical", "biochemistry"],
            Category::Biology => &["molecular", "genetics", "zoology", "botany", "microbiology", "evolution"],
            Category::Medicine => &[
                "cardiology", "oncology", "immunology", "surgery", "pharmacology", "epidemiology",
                "pediatrics",
            ],
            Category::Neuroscience => &["cognitive", "computational", "clinical", "molecular"],
            Category::Psychology => &["clinical", "cognitive", "social", "developmental"],
            Category::Economics => &["micro", "macro", "econometrics", "behavioral", "development"],
            Category::Law => &["civil", "criminal", "constitutional", "international", "commercial"],
            Category::History => &["ancient", "medieval", "modern", "contemporary"],
            Category::Philosophy => &["ethics", "logic", "metaphysics", "epistemology", "aesthetics"],
            Category::Literature => &["poetry", "narrative", "drama", "criticism", "comparative"],
            Category::Engineering => &["mechanical", "electrical", "civil", "chemical", "aerospace", "software"],
            Category::ComputerScience => &[
                "algorithms", "systems", "machine_learning", "databases", "security", "networks",
                "hci",
            ],
            Category::Mathematics => &["algebra", "analysis", "geometry", "topology", "number_theory", "probability"],
            Category::Astronomy => &["planetary", "stellar", "galactic", "cosmology"],
            Category::Art => &["painting", "sculpture", "photography", "design"],
            Category::Music => &["classical", "theory", "ethnomusicology", "composition"],
            _ => &[],
        }
    }

    /// Keyword profile used by the domain classifier.
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Category::Physics => &[
                "physics", "quantum", "particle", "relativity", "photon", "electron", "entropy",
                "thermodynamics", "magnetic", "laser", "fisica",
            ],
            Category::Chemistry => &[
                "chemistry", "chemical", "molecule", "molecular", "reaction", "catalyst",
                "compound", "synthesis", "chimica",
            ],
            Category::Biology => &[
                "biology", "cell", "gene", "genome", "protein", "species", "evolution",
                "organism", "dna", "biologia",
            ],
            Category::Medicine => &[
                "medicine", "medical", "clinical", "patient", "disease", "therapy", "treatment",
                "diagnosis", "cancer", "vaccine", "medicina",
            ],
            Category::Neuroscience => &[
                "neuroscience", "neuron", "brain", "cortex", "synapse", "neural", "cognitive",
            ],
            Category::Psychology => &[
                "psychology", "behavior", "cognition", "emotion", "mental", "psicologia",
            ],
            Category::Sociology => &["sociology", "society", "social", "inequality", "sociologia"],
            Category::Anthropology => &["anthropology", "culture", "ethnography", "kinship"],
            Category::Economics => &[
                "economics", "economic", "market", "inflation", "gdp", "trade", "economia",
            ],
            Category::Law => &["law", "legal", "court", "statute", "contract", "diritto", "legge"],
            Category::PoliticalScience => &["political", "policy", "government", "election", "politica"],
            Category::History => &["history", "historical", "century", "empire", "war", "storia"],
            Category::Geography => &["geography", "spatial", "region", "urban", "geografia"],
            Category::Archaeology => &["archaeology", "excavation", "artifact", "archeologia"],
            Category::Philosophy => &[
                "philosophy", "ethics", "metaphysics", "epistemology", "filosofia",
            ],
            Category::Theology => &["theology", "religion", "scripture", "teologia"],
            Category::Linguistics => &["linguistics", "language", "syntax", "phonology", "semantics", "linguistica"],
            Category::Literature => &["literature", "novel", "poetry", "narrative", "letteratura"],
            Category::Art => &["art", "painting", "sculpture", "artist", "arte"],
            Category::Music => &["music", "musical", "harmony", "composer", "musica"],
            Category::Architecture => &["architecture", "building", "architectural", "architettura"],
            Category::Engineering => &[
                "engineering", "mechanical", "electrical", "structural", "ingegneria",
            ],
            Category::ComputerScience => &[
                "computer", "algorithm", "software", "computing", "database", "network",
                "machine", "learning", "informatica",
            ],
            Category::Mathematics => &[
                "mathematics", "theorem", "algebra", "topology", "proof", "matematica",
            ],
            Category::Statistics => &["statistics", "statistical", "regression", "probability", "statistica"],
            Category::Astronomy => &["astronomy", "galaxy", "star", "planet", "telescope", "astronomia"],
            Category::Geology => &["geology", "mineral", "tectonic", "sediment", "geologia"],
            Category::Ecology => &["ecology", "ecosystem", "biodiversity", "habitat", "ecologia"],
            Category::Agriculture => &["agriculture", "crop", "soil", "farming", "agricoltura"],
            Category::MaterialsScience => &["materials", "alloy", "polymer", "nanomaterial"],
            Category::Energy => &["energy", "renewable", "solar", "battery", "energia"],
            Category::Education => &["education", "learning", "teaching", "curriculum", "educazione"],
            Category::Business => &["business", "management", "strategy", "enterprise"],
            Category::Finance => &["finance", "investment", "portfolio", "banking", "finanza"],
            Category::Marketing => &["marketing", "brand", "consumer", "advertising"],
            Category::Communication => &["communication", "media", "discourse", "comunicazione"],
            Category::Journalism => &["journalism", "news", "press", "giornalismo"],
            Category::SportsScience => &["sport", "athletic", "exercise", "training"],
            Category::Culinary => &["cooking", "cuisine", "recipe", "food", "cucina"],
            Category::Travel => &["travel", "tourism", "destination", "viaggio"],
            Category::Reference => &["encyclopedia", "dictionary", "glossary", "reference"],
            Category::General => &[],
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify a text into its primary and secondary domains by keyword
/// profile overlap. Texts matching nothing classify as General.
pub fn classify_domain(text: &str) -> (Category, Option<Category>) {
    let lower = text.to_lowercase();
    let tokens: std::collections::HashSet<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .collect();

    let mut scored: Vec<(Category, usize)> = ALL_CATEGORIES
        .iter()
        .map(|&cat| {
            let hits = cat
                .keywords()
                .iter()
                .filter(|k| tokens.contains(**k))
                .count();
            (cat, hits)
        })
        .filter(|(_, hits)| *hits > 0)
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    match scored.as_slice() {
        [] => (Category::General, None),
        [(primary, _)] => (*primary, None),
        [(primary, _), (secondary, _), ..] => (*primary, Some(*secondary)),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_set_size() {
        assert_eq!(ALL_CATEGORIES.len(), 42);
    }

    #[test]
    fn test_roundtrip() {
        for &cat in ALL_CATEGORIES {
            assert_eq!(Category::parse_name(cat.as_str()), cat);
        }
    }

    #[test]
    fn test_unknown_maps_to_general() {
        assert_eq!(Category::parse_name("alchemy"), Category::General);
    }

    #[test]
    fn test_classify_physics() {
        let (primary, _) = classify_domain("quantum entanglement of photon pairs in the laser cavity");
        assert_eq!(primary, Category::Physics);
    }

    #[test]
    fn test_classify_secondary() {
        let (primary, secondary) =
            classify_domain("a statistical regression over clinical patient outcomes in medicine");
        assert!(primary == Category::Medicine || primary == Category::Statistics);
        assert!(secondary.is_some());
    }

    #[test]
    fn test_classify_general() {
        let (primary, secondary) = classify_domain("zzz qqq unrelated tokens");
        assert_eq!(primary, Category::General);
        assert!(secondary.is_none());
    }

    #[test]
    fn test_sub_disciplines_closed() {
        assert!(Category::Physics.sub_disciplines().contains(&"quantum"));
        assert!(Category::General.sub_disciplines().is_empty());
    }
}
