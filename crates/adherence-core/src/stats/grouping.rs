//! Canonical-name grouping.
//!
//! Merges the statistics of medicine-name variants declared equivalent by a
//! [`MedicineGroup`], and suggests candidate groups from name similarity.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use strsim::normalized_levenshtein;

use crate::models::{normalize_name, MedicineGroup, MedicineStats, NameSuggestion};

/// Default similarity above which two names are suggested as one medicine.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Two variants of one group carry different dose units.
///
/// Amounts are summed anyway; the first non-empty unit is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitMismatch {
    pub canonical_name: String,
    pub kept_unit: String,
    pub other_unit: String,
}

impl fmt::Display for UnitMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unit mismatch in \"{}\": kept \"{}\", also found \"{}\"",
            self.canonical_name, self.kept_unit, self.other_unit
        )
    }
}

/// Merge variant entries into their canonical entry.
///
/// Groups are applied in order. An existing entry keyed by the canonical
/// name is folded in with the variants. The merged entry is kept only when
/// it expects at least one dose.
pub fn apply_grouping(
    mut medicines: BTreeMap<String, MedicineStats>,
    groups: &[MedicineGroup],
) -> (BTreeMap<String, MedicineStats>, Vec<UnitMismatch>) {
    let mut warnings = Vec::new();

    for group in groups {
        let canonical = normalize_name(&group.canonical_name);

        let mut keys: Vec<String> = group.medicine_names.iter().map(|n| normalize_name(n)).collect();
        if !keys.contains(&canonical) {
            keys.push(canonical.clone());
        }

        let variants: Vec<MedicineStats> = keys.iter().filter_map(|key| medicines.remove(key)).collect();
        if variants.is_empty() {
            continue;
        }

        let merged = variants
            .into_iter()
            .fold(MedicineStats::new(canonical.clone(), None), |acc, variant| {
                merge(acc, variant, &mut warnings)
            });

        if merged.total_doses > 0 {
            medicines.insert(canonical, merged.with_rate());
        } else {
            tracing::debug!(canonical_name = %canonical, "Dropping merged group with no expected doses");
        }
    }

    for warning in &warnings {
        tracing::warn!(
            canonical_name = %warning.canonical_name,
            kept_unit = %warning.kept_unit,
            other_unit = %warning.other_unit,
            "Merging medicine variants with different units"
        );
    }

    (medicines, warnings)
}

/// Fold one variant into the merged entry, which carries no `medicine_id`.
fn merge(mut acc: MedicineStats, variant: MedicineStats, warnings: &mut Vec<UnitMismatch>) -> MedicineStats {
    if acc.unit.is_empty() {
        acc.unit = variant.unit;
    } else if !variant.unit.is_empty() && variant.unit != acc.unit {
        warnings.push(UnitMismatch {
            canonical_name: acc.medicine_name.clone(),
            kept_unit: acc.unit.clone(),
            other_unit: variant.unit,
        });
    }

    acc.total_amount += variant.total_amount;
    acc.total_doses += variant.total_doses;
    acc.taken_count += variant.taken_count;
    acc.skipped_count += variant.skipped_count;
    acc.pending_count += variant.pending_count;
    acc
}

/// Suggest pairs of names that look like spellings of the same medicine.
///
/// Names are normalized first. Pairs whose names are both already grouped
/// are skipped. Pairs are taken
/// in descending similarity and each name appears in at most one suggestion.
pub fn suggest_similar_names(
    names: &[String],
    groups: &[MedicineGroup],
    threshold: f64,
    max_suggestions: Option<usize>,
) -> Vec<NameSuggestion> {
    let normalized: BTreeSet<String> = names.iter().map(|n| normalize_name(n)).collect();
    let unique: Vec<&str> = normalized.iter().map(String::as_str).collect();

    let grouped: HashSet<String> = groups
        .iter()
        .flat_map(|g| g.medicine_names.iter().map(|n| normalize_name(n)))
        .collect();

    let mut pairs = Vec::new();
    for (i, first) in unique.iter().enumerate() {
        for second in &unique[i + 1..] {
            if grouped.contains(*first) && grouped.contains(*second) {
                continue;
            }
            let similarity = normalized_levenshtein(first, second);
            if similarity >= threshold {
                pairs.push((*first, *second, similarity));
            }
        }
    }

    // Stable sort keeps alphabetical order among equal similarities
    pairs.sort_by(|a, b| b.2.total_cmp(&a.2));

    let mut used: HashSet<&str> = HashSet::new();
    let mut suggestions = Vec::new();
    for (first, second, similarity) in pairs {
        if used.contains(first) || used.contains(second) {
            continue;
        }
        used.insert(first);
        used.insert(second);
        suggestions.push(NameSuggestion {
            medicine_names: vec![first.to_string(), second.to_string()],
            similarity,
        });
    }

    if let Some(max) = max_suggestions {
        suggestions.truncate(max);
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn stats(name: &str, doses: u32, taken: u32, skipped: u32, unit: &str) -> MedicineStats {
        let mut stats = MedicineStats::new(name, Some(format!("id-{}", name)));
        stats.total_doses = doses;
        stats.total_amount = f64::from(doses);
        stats.taken_count = taken;
        stats.skipped_count = skipped;
        stats.unit = unit.to_string();
        stats.backfilled().with_rate()
    }

    fn group(canonical: &str, names: &[&str]) -> MedicineGroup {
        MedicineGroup::new(
            "g1".into(),
            canonical,
            names.iter().map(|n| n.to_string()).collect(),
        )
        .unwrap()
    }

    fn by_name(entries: Vec<MedicineStats>) -> BTreeMap<String, MedicineStats> {
        entries
            .into_iter()
            .map(|s| (s.medicine_name.clone(), s))
            .collect()
    }

    #[test]
    fn test_merge_two_variants() {
        let medicines = by_name(vec![
            stats("Med A", 10, 5, 0, "tablet"),
            stats("Med-A (generic)", 10, 5, 0, "tablet"),
            stats("Med B", 4, 4, 0, "mL"),
        ]);

        let (merged, warnings) =
            apply_grouping(medicines, &[group("Med A", &["Med A", "Med-A (generic)"])]);

        assert!(warnings.is_empty());
        assert_eq!(merged.len(), 2);
        assert!(!merged.contains_key("Med-A (generic)"));

        let med_a = &merged["Med A"];
        assert_eq!(med_a.total_doses, 20);
        assert_eq!(med_a.taken_count, 10);
        assert_eq!(med_a.pending_count, 10);
        assert_eq!(med_a.total_amount, 20.0);
        assert_eq!(med_a.adherence_rate, 50.0);
        assert!(med_a.medicine_id.is_none());
        assert_eq!(merged["Med B"].adherence_rate, 100.0);
    }

    #[test]
    fn test_canonical_entry_outside_variants_is_folded_in() {
        let medicines = by_name(vec![
            stats("Loxonin", 6, 3, 0, "tablet"),
            stats("Loxoprofen", 4, 1, 0, "tablet"),
        ]);

        let (merged, _) = apply_grouping(medicines, &[group("Loxonin", &["Loxoprofen"])]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged["Loxonin"].total_doses, 10);
        assert_eq!(merged["Loxonin"].taken_count, 4);
    }

    #[test]
    fn test_group_without_present_variants_is_noop() {
        let medicines = by_name(vec![stats("Med B", 4, 0, 0, "mL")]);
        let before = medicines.clone();

        let (merged, warnings) = apply_grouping(medicines, &[group("Med A", &["Med A"])]);

        assert_eq!(merged, before);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unit_mismatch_is_reported() {
        let medicines = by_name(vec![
            stats("Med A", 10, 0, 0, "tablet"),
            stats("Med A syrup", 10, 0, 0, "mL"),
        ]);

        let (merged, warnings) =
            apply_grouping(medicines, &[group("Med A", &["Med A", "Med A syrup"])]);

        assert_eq!(merged["Med A"].unit, "tablet");
        assert_eq!(merged["Med A"].total_amount, 20.0);
        assert_eq!(
            warnings,
            vec![UnitMismatch {
                canonical_name: "Med A".into(),
                kept_unit: "tablet".into(),
                other_unit: "mL".into(),
            }]
        );
        assert!(warnings[0].to_string().contains("Med A"));
    }

    #[test]
    fn test_empty_unit_is_not_a_mismatch() {
        let medicines = by_name(vec![
            stats("Med A", 10, 0, 0, ""),
            stats("Med A 5mg", 10, 0, 0, "mg"),
        ]);

        let (merged, warnings) =
            apply_grouping(medicines, &[group("Med A", &["Med A", "Med A 5mg"])]);

        assert_eq!(merged["Med A"].unit, "mg");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_merged_group_without_expected_doses_is_dropped() {
        let medicines = by_name(vec![stats("Painkiller", 0, 0, 0, "")]);

        let (merged, _) = apply_grouping(medicines, &[group("Pain relief", &["Painkiller"])]);

        assert!(merged.is_empty());
    }

    #[test]
    fn test_suggest_similar_names() {
        let names: Vec<String> = ["Loxonin", "Loxonin 60", "Loxonim", "Amlodipine", "Loxonin"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let suggestions = suggest_similar_names(&names, &[], DEFAULT_SIMILARITY_THRESHOLD, None);

        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].medicine_names, vec!["Loxonim", "Loxonin"]);
        assert!(suggestions[0].similarity >= DEFAULT_SIMILARITY_THRESHOLD);
    }

    #[test]
    fn test_suggestions_skip_already_grouped_pairs() {
        let names: Vec<String> = ["Loxonin", "Loxonim"].iter().map(|s| s.to_string()).collect();

        let grouped = group("Loxonin", &["Loxonin", "Loxonim"]);
        assert!(suggest_similar_names(&names, &[grouped], 0.7, None).is_empty());

        let half = group("Loxonin", &["Loxonin"]);
        assert_eq!(suggest_similar_names(&names, &[half], 0.7, None).len(), 1);
    }

    #[test]
    fn test_suggestions_normalize_names_before_group_lookup() {
        let names: Vec<String> = ["  Loxonin", "Loxonim ", "Loxonin"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let grouped = group("Loxonin", &["Loxonin", "Loxonim"]);
        assert!(suggest_similar_names(&names, &[grouped], 0.7, None).is_empty());

        let suggestions = suggest_similar_names(&names, &[], 0.7, None);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].medicine_names, vec!["Loxonim", "Loxonin"]);
    }

    #[test]
    fn test_suggestions_respect_cap() {
        let names: Vec<String> = ["Aspirin", "Aspirim", "Warfarin", "Warfarim"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(suggest_similar_names(&names, &[], 0.7, None).len(), 2);
        assert_eq!(suggest_similar_names(&names, &[], 0.7, Some(1)).len(), 1);
    }

    proptest! {
        #[test]
        fn prop_grouping_conserves_counts(
            entries in prop::collection::vec((1u32..50, 0u32..50, 0u32..50), 1..6),
            grouped_count in 1usize..6,
        ) {
            let medicines = by_name(
                entries
                    .iter()
                    .enumerate()
                    .map(|(i, (doses, taken, skipped))| {
                        stats(&format!("Med {}", i), *doses, *taken, *skipped, "tablet")
                    })
                    .collect(),
            );
            let names: Vec<String> = medicines.keys().take(grouped_count).cloned().collect();
            let config = MedicineGroup::new("g1".into(), "Canonical", names).unwrap();

            let sum = |m: &BTreeMap<String, MedicineStats>| {
                m.values().fold((0u32, 0u32, 0u32, 0u32, 0.0f64), |acc, s| {
                    (
                        acc.0 + s.total_doses,
                        acc.1 + s.taken_count,
                        acc.2 + s.skipped_count,
                        acc.3 + s.pending_count,
                        acc.4 + s.total_amount,
                    )
                })
            };
            let before = sum(&medicines);
            let (merged, warnings) = apply_grouping(medicines, &[config]);
            let after = sum(&merged);

            prop_assert!(warnings.is_empty());
            prop_assert_eq!(before.0, after.0);
            prop_assert_eq!(before.1, after.1);
            prop_assert_eq!(before.2, after.2);
            prop_assert_eq!(before.3, after.3);
            prop_assert!((before.4 - after.4).abs() < 1e-9);
            for stats in merged.values() {
                prop_assert!(stats.adherence_rate >= 0.0 && stats.adherence_rate <= 100.0);
            }
        }
    }
}
