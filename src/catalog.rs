//! Fixed tables of physics run categories.
//!
//! A [`DatasetSpec`] names a run category, the class codes drawn from it
//! and a per-category event cap. The catalog, not the raw class code, is
//! authoritative for which codes are signal and which rows count as
//! "pure" reference rows for a masked scale fit.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Class code of double-pulse events, the positive class.
pub const DOUBLE_PULSE: &str = "DP";

/// One category to draw from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    pub category_id: String,
    /// Codes loaded from the category; everything else is skipped.
    pub included_class_codes: BTreeSet<String>,
    /// Pool size cap, applied after class-code filtering.
    pub max_events: usize,
    /// Included codes labelled signal. All other included codes are background.
    pub signal_codes: BTreeSet<String>,
    /// Included codes eligible for a masked scale fit.
    pub reference_codes: BTreeSet<String>,
}

fn code_set(codes: &[&str]) -> BTreeSet<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

impl DatasetSpec {
    /// A spec where `DP` is signal and every included code is a reference code.
    pub fn new(category_id: &str, codes: &[&str], max_events: usize) -> Self {
        let included = code_set(codes);
        DatasetSpec {
            category_id: category_id.to_string(),
            signal_codes: included
                .iter()
                .filter(|c| c.as_str() == DOUBLE_PULSE)
                .cloned()
                .collect(),
            reference_codes: included.clone(),
            included_class_codes: included,
            max_events,
        }
    }

    /// Restrict the reference codes to `codes` (intersected with the included set).
    pub fn with_reference_codes(mut self, codes: &[&str]) -> Self {
        self.reference_codes = code_set(codes)
            .intersection(&self.included_class_codes)
            .cloned()
            .collect();
        self
    }

    pub fn is_signal(&self, class_code: &str) -> bool {
        self.signal_codes.contains(class_code)
    }

    pub fn is_reference(&self, class_code: &str) -> bool {
        self.reference_codes.contains(class_code)
    }
}

// ---------------------------------------------------------------------------
// CatalogKind – the two fixed configurations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogKind {
    #[default]
    Training,
    Evaluation,
}

impl CatalogKind {
    pub fn specs(self) -> Vec<DatasetSpec> {
        match self {
            CatalogKind::Training => training_catalog(),
            CatalogKind::Evaluation => evaluation_catalog(),
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogKind::Training => write!(f, "training"),
            CatalogKind::Evaluation => write!(f, "evaluation"),
        }
    }
}

impl FromStr for CatalogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "training" | "train" => Ok(CatalogKind::Training),
            "evaluation" | "eval" => Ok(CatalogKind::Evaluation),
            other => Err(format!("unknown catalog '{other}' (expected training or evaluation)")),
        }
    }
}

/// Standard training categories.
///
/// Muon-neutrino CC events are left out: their track signature looks too
/// much like a double pulse.
pub fn training_catalog() -> Vec<DatasetSpec> {
    vec![
        DatasetSpec::new("11538", &["DP", "NC"], 3638), // tau
        DatasetSpec::new("12034", &["CC", "NC"], 8637), // electron
        DatasetSpec::new("11069", &["NC"], 7287),       // muon
    ]
}

/// Held-out evaluation categories with broader class-code coverage.
///
/// Codes absent from the training catalog are excluded from the
/// reference set so the masked fit sees the same populations as training.
pub fn evaluation_catalog() -> Vec<DatasetSpec> {
    vec![
        DatasetSpec::new("11538", &["DP", "NDP", "NC"], 3638).with_reference_codes(&["DP", "NC"]),
        DatasetSpec::new("12034", &["CC", "NC"], 8637),
        DatasetSpec::new("11069", &["NC", "CC"], 7287).with_reference_codes(&["NC"]),
        DatasetSpec::new("11057", &["AM"], 74890).with_reference_codes(&[]), // atmospheric muons
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_catalog_excludes_muon_tracks() {
        let specs = training_catalog();
        assert_eq!(specs.len(), 3);
        let muon = specs.iter().find(|s| s.category_id == "11069").unwrap();
        assert!(!muon.included_class_codes.contains("CC"));
    }

    #[test]
    fn evaluation_adds_background_only_category() {
        let specs = evaluation_catalog();
        assert_eq!(specs.len(), 4);
        let train_ids: BTreeSet<_> = training_catalog().into_iter().map(|s| s.category_id).collect();
        let extra: Vec<_> = specs
            .iter()
            .filter(|s| !train_ids.contains(&s.category_id))
            .collect();
        assert_eq!(extra.len(), 1);
        assert!(extra[0].signal_codes.is_empty());
        assert!(extra[0].reference_codes.is_empty());
    }

    #[test]
    fn only_double_pulse_is_signal() {
        for spec in evaluation_catalog() {
            for code in &spec.included_class_codes {
                assert_eq!(spec.is_signal(code), code == DOUBLE_PULSE);
            }
        }
    }

    #[test]
    fn reference_codes_stay_within_included() {
        let spec = DatasetSpec::new("x", &["NC"], 10).with_reference_codes(&["NC", "CC"]);
        assert_eq!(spec.reference_codes, code_set(&["NC"]));
    }

    #[test]
    fn catalog_kind_parses() {
        assert_eq!("Evaluation".parse::<CatalogKind>(), Ok(CatalogKind::Evaluation));
        assert_eq!(CatalogKind::Training.to_string(), "training");
        assert!("bogus".parse::<CatalogKind>().is_err());
    }
}
