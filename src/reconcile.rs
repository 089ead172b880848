use crate::results::{Course, CourseList};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a freshly extracted list is combined with the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Discard the stored list and keep only the extracted courses
    Replace,
    /// Keep the stored list and append courses not yet present
    #[default]
    Merge,
}

/// Counts reported after reconciling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileSummary {
    /// Incoming courses whose URL was not stored before
    pub added: usize,
    /// Incoming courses dropped because their URL was already present
    pub skipped: usize,
    /// Existing courses no longer in the result
    pub removed: usize,
}

/// Combines `existing` and `incoming` according to `mode`.
///
/// Courses are identified by exact `url`. The first occurrence of a URL wins,
/// so duplicate entries on either side are dropped rather than rejected.
pub fn reconcile(existing: &[Course], incoming: &[Course], mode: Mode) -> CourseList {
    reconcile_with_summary(existing, incoming, mode).0
}

/// Same as [`reconcile`], also reporting what changed
pub fn reconcile_with_summary(
    existing: &[Course],
    incoming: &[Course],
    mode: Mode,
) -> (CourseList, ReconcileSummary) {
    let stored: HashSet<&str> = existing.iter().map(|course| course.url.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut result = Vec::with_capacity(existing.len() + incoming.len());
    let mut summary = ReconcileSummary::default();

    if mode == Mode::Merge {
        for course in existing {
            if seen.insert(course.url.as_str()) {
                result.push(course.clone());
            }
        }
    }

    for course in incoming {
        if seen.insert(course.url.as_str()) {
            result.push(course.clone());
            if !stored.contains(course.url.as_str()) {
                summary.added += 1;
            }
        } else {
            summary.skipped += 1;
        }
    }

    if mode == Mode::Replace {
        summary.removed = existing
            .iter()
            .filter(|course| !seen.contains(course.url.as_str()))
            .count();
    }

    ::log::debug!(
        "Reconciled {} existing with {} incoming ({:?}): {} added, {} skipped, {} removed",
        existing.len(),
        incoming.len(),
        mode,
        summary.added,
        summary.skipped,
        summary.removed
    );

    (result, summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(name: &str, id: u32) -> Course {
        Course::new(name, format!("https://moodle.example.org/course/view.php?id={id}"))
    }

    #[test]
    fn test_merge_appends_novel_entries() {
        let a = course("A", 1);
        let b = course("B", 2);
        let c = course("C", 3);

        let result = reconcile(&[a.clone(), b.clone()], &[b.clone(), c.clone()], Mode::Merge);
        assert_eq!(result, vec![a, b, c]);
    }

    #[test]
    fn test_replace_discards_existing() {
        let a = course("A", 1);
        let b = course("B", 2);
        let c = course("C", 3);

        let result = reconcile(&[a, b], &[c.clone()], Mode::Replace);
        assert_eq!(result, vec![c]);
    }

    #[test]
    fn test_merge_with_empty_incoming_is_identity() {
        let list = vec![course("A", 1), course("B", 2), course("C", 3)];

        let once = reconcile(&list, &[], Mode::Merge);
        assert_eq!(once, list);
        let twice = reconcile(&once, &[], Mode::Merge);
        assert_eq!(twice, list);
    }

    #[test]
    fn test_replace_with_empty_incoming_is_empty() {
        let list = vec![course("A", 1)];
        assert!(reconcile(&list, &[], Mode::Replace).is_empty());
    }

    #[test]
    fn test_merge_exact_duplicate_is_idempotent() {
        let a = course("A", 1);
        assert_eq!(reconcile(&[a.clone()], &[a.clone()], Mode::Merge), vec![a]);
    }

    #[test]
    fn test_identity_is_url_not_name() {
        let old = course("Old name", 1);
        let renamed = course("New name", 1);
        let same_name = Course::new("Old name", "https://moodle.example.org/course/view.php?id=2");

        let result = reconcile(&[old.clone()], &[renamed, same_name.clone()], Mode::Merge);
        assert_eq!(result, vec![old, same_name]);
    }

    #[test]
    fn test_url_match_is_case_sensitive() {
        let lower = Course::new("A", "https://moodle.example.org/course/view.php?id=abc");
        let upper = Course::new("A", "https://moodle.example.org/course/view.php?id=ABC");

        let result = reconcile(&[lower.clone()], &[upper.clone()], Mode::Merge);
        assert_eq!(result, vec![lower, upper]);
    }

    #[test]
    fn test_duplicates_within_incoming_first_wins() {
        let first = course("First", 1);
        let second = course("Second", 1);
        let other = course("Other", 2);

        let replaced = reconcile(&[], &[first.clone(), other.clone(), second.clone()], Mode::Replace);
        assert_eq!(replaced, vec![first.clone(), other.clone()]);

        let merged = reconcile(&[], &[first.clone(), second, other.clone()], Mode::Merge);
        assert_eq!(merged, vec![first, other]);
    }

    #[test]
    fn test_duplicates_within_existing_are_normalized() {
        let a = course("A", 1);
        let a_again = course("A again", 1);
        let b = course("B", 2);

        let result = reconcile(&[a.clone(), a_again, b.clone()], &[], Mode::Merge);
        assert_eq!(result, vec![a, b]);
    }

    #[test]
    fn test_summary_counts() {
        let a = course("A", 1);
        let b = course("B", 2);
        let c = course("C", 3);

        let (_, merge) =
            reconcile_with_summary(&[a.clone(), b.clone()], &[b.clone(), c.clone()], Mode::Merge);
        assert_eq!(
            merge,
            ReconcileSummary {
                added: 1,
                skipped: 1,
                removed: 0
            }
        );

        let (_, replace) = reconcile_with_summary(&[a, b.clone()], &[b, c], Mode::Replace);
        assert_eq!(
            replace,
            ReconcileSummary {
                added: 1,
                skipped: 0,
                removed: 1
            }
        );
    }

    #[test]
    fn test_repeated_replace_adds_nothing() {
        let list = vec![course("A", 1), course("B", 2)];

        let (result, summary) = reconcile_with_summary(&list, &list, Mode::Replace);
        assert_eq!(result, list);
        assert_eq!(summary, ReconcileSummary::default());
    }

    #[test]
    fn test_mode_deserializes_lowercase() {
        let mode: Mode = serde_json::from_str("\"replace\"").unwrap();
        assert_eq!(mode, Mode::Replace);
        assert_eq!(Mode::default(), Mode::Merge);
    }
}
