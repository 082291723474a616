//! Comparative enhancement: index and error ratios between a geography's statistics and the same
//! statistics at its comparative levels.

use std::collections::HashSet;

use log::debug;

use crate::{
    profile::Profile,
    stat_data::{StatEntry, THIS},
    utils::ratio,
};

/// Number of comparative levels shown next to a geography's own values.
pub const DEFAULT_MAX_COMPARATIVES: usize = 2;

/// Add `index` and `error_ratio` values to `entry` for `this` and, in order, each of
/// `comparative_levels` that has a value, stopping once `max_comparatives` levels are included.
/// Every per-level map of the entry is then trimmed to the levels that were visited.
///
/// Returns the comparative levels that were included.
pub fn enhance(
    entry: &mut StatEntry,
    comparative_levels: &[String],
    max_comparatives: usize,
) -> Vec<String> {
    let Some(this_value) = entry.value() else {
        return Vec::new();
    };
    let mut kept = StatEntry::named(&entry.name);
    let mut included = Vec::new();
    let levels = std::iter::once(THIS).chain(comparative_levels.iter().map(String::as_str));
    for level in levels {
        let Some(value) = entry.values.get(level).copied() else {
            continue;
        };
        kept.values.insert(level.to_string(), value);
        kept.index.insert(level.to_string(), ratio(this_value, value, 2));
        if let Some(error) = entry.error.get(level).copied() {
            kept.error.insert(level.to_string(), error);
            kept.error_ratio.insert(level.to_string(), ratio(error, value, 3));
        }
        if let Some(numerator) = entry.numerators.get(level).copied() {
            kept.numerators.insert(level.to_string(), numerator);
            if let Some(numerator_error) = entry.numerator_errors.get(level).copied() {
                kept.numerator_errors.insert(level.to_string(), numerator_error);
            }
        }
        if level != THIS {
            included.push(level.to_string());
        }
        if included.len() >= max_comparatives {
            break;
        }
    }
    *entry = kept;
    included
}

/// Enhance every statistic of every section of `profile`, recording the comparative levels that
/// were used anywhere in the profile.
pub fn enhance_profile(
    profile: &mut Profile,
    comparative_levels: &[String],
    max_comparatives: usize,
) {
    let mut used: HashSet<String> = HashSet::new();
    for section in profile.sections.values_mut() {
        for entry in section.stats.values_mut() {
            used.extend(enhance(entry, comparative_levels, max_comparatives));
        }
    }
    profile.geography.comparatives = comparative_levels
        .iter()
        .filter(|level| used.contains(*level))
        .cloned()
        .collect();
    debug!(
        "Comparatives for {}-{}: {:?}",
        profile.geography.level, profile.geography.code, profile.geography.comparatives
    );
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    use super::*;

    fn levels(levels: &[&str]) -> Vec<String> {
        levels.iter().map(|l| l.to_string()).collect()
    }

    fn entry(values: &[(&str, f64)], errors: &[(&str, f64)]) -> StatEntry {
        let to_map = |pairs: &[(&str, f64)]| -> IndexMap<String, f64> {
            pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
        };
        StatEntry {
            name: "People".into(),
            values: to_map(values),
            error: to_map(errors),
            ..Default::default()
        }
    }

    #[test]
    fn ratios_against_comparative_levels() {
        let mut stat = entry(
            &[("this", 100.0), ("province", 500.0), ("country", 2000.0)],
            &[("this", 5.0), ("province", 20.0)],
        );
        let included = enhance(&mut stat, &levels(&["province", "country"]), 2);
        assert_eq!(included, levels(&["province", "country"]));
        assert_eq!(
            stat.index,
            IndexMap::from([
                ("this".to_string(), 1.0),
                ("province".to_string(), 0.2),
                ("country".to_string(), 0.05),
            ])
        );
        assert_eq!(stat.error_ratio.get("province"), Some(&0.04));
        assert_eq!(stat.error_ratio.get("this"), Some(&0.05));
        assert_eq!(stat.error_ratio.get("country"), None);
    }

    #[test]
    fn comparatives_are_capped_in_level_order() {
        let mut stat = entry(
            &[
                ("this", 10.0),
                ("municipality", 20.0),
                ("province", 40.0),
                ("country", 80.0),
            ],
            &[],
        );
        let five = levels(&["ward", "district", "municipality", "province", "country"]);
        let included = enhance(&mut stat, &five, 2);
        assert_eq!(included, levels(&["municipality", "province"]));
        assert!(!stat.index.contains_key("country"));
        assert!(stat.error_ratio.is_empty());

        let mut stat = entry(&[("this", 10.0), ("province", 40.0)], &[]);
        assert!(enhance(&mut stat, &five, 0).is_empty());
        assert_eq!(stat.index.keys().collect::<Vec<_>>(), vec!["this"]);
    }

    #[test]
    fn zero_comparative_values_give_zero_ratios() {
        let mut stat = entry(&[("this", 10.0), ("province", 0.0)], &[("province", 2.0)]);
        enhance(&mut stat, &levels(&["province"]), 2);
        assert_eq!(stat.index.get("province"), Some(&0.0));
        assert_eq!(stat.error_ratio.get("province"), Some(&0.0));
    }

    #[test]
    fn entries_without_a_value_are_left_alone() {
        let mut stat = entry(&[("province", 10.0)], &[]);
        assert!(enhance(&mut stat, &levels(&["province"]), 2).is_empty());
        assert!(stat.index.is_empty());
    }

    #[test]
    fn levels_past_the_cap_are_dropped_from_every_map() {
        let mut stat = entry(
            &[
                ("this", 10.0),
                ("a", 20.0),
                ("b", 40.0),
                ("c", 80.0),
                ("d", 160.0),
                ("e", 320.0),
            ],
            &[("this", 1.0), ("a", 2.0), ("d", 4.0)],
        );
        stat.numerators = IndexMap::from([
            ("this".to_string(), 5.0),
            ("b".to_string(), 15.0),
            ("e".to_string(), 25.0),
        ]);
        stat.numerator_errors = IndexMap::from([
            ("b".to_string(), 1.5),
            ("c".to_string(), 2.5),
        ]);
        let included = enhance(&mut stat, &levels(&["a", "b", "c", "d", "e"]), 2);
        assert_eq!(included, levels(&["a", "b"]));
        assert_eq!(stat.name, "People");
        assert_eq!(stat.values.keys().collect::<Vec<_>>(), vec!["this", "a", "b"]);
        assert_eq!(stat.index.keys().collect::<Vec<_>>(), vec!["this", "a", "b"]);
        assert_eq!(
            stat.error,
            IndexMap::from([("this".to_string(), 1.0), ("a".to_string(), 2.0)])
        );
        assert_eq!(
            stat.numerators,
            IndexMap::from([("this".to_string(), 5.0), ("b".to_string(), 15.0)])
        );
        assert_eq!(
            stat.numerator_errors,
            IndexMap::from([("b".to_string(), 1.5)])
        );
    }
}
