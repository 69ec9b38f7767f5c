//! Property tests for the line-diff approximation
//!
//! The prefix/suffix model is an accepted approximation, so these
//! properties pin its bounds and its exact cases (identity, append, total
//! replacement) rather than minimal edit distance.

use proptest::prelude::*;
use rewind::diff_lines;

/// Join lines into a text where every line carries its terminator, so the
/// text parses back into exactly the same lines.
fn text_of(lines: &[String]) -> String {
    lines.iter().map(|l| format!("{l}\n")).collect()
}

fn line() -> impl Strategy<Value = String> {
    "[a-m0-9 ]{0,12}"
}

/// Lines drawn from a disjoint alphabet, guaranteed unequal to `line()` output
fn other_line() -> impl Strategy<Value = String> {
    "[n-z]{1,12}"
}

proptest! {
    #[test]
    fn identical_texts_diff_to_zero(lines in prop::collection::vec(line(), 0..30)) {
        let text = text_of(&lines);
        let diff = diff_lines(&text, &text);
        prop_assert_eq!(diff.additions, 0);
        prop_assert_eq!(diff.deletions, 0);
    }

    #[test]
    fn counts_never_exceed_line_totals(
        old_lines in prop::collection::vec(line(), 0..30),
        new_lines in prop::collection::vec(line(), 0..30),
    ) {
        let diff = diff_lines(&text_of(&old_lines), &text_of(&new_lines));
        prop_assert!(diff.deletions <= old_lines.len());
        prop_assert!(diff.additions <= new_lines.len());
    }

    #[test]
    fn append_is_exact(
        base in prop::collection::vec(line(), 0..20),
        extra in prop::collection::vec(line(), 1..10),
    ) {
        let old_text = text_of(&base);
        let mut appended = base.clone();
        appended.extend(extra.iter().cloned());
        let diff = diff_lines(&old_text, &text_of(&appended));
        prop_assert_eq!(diff.additions, extra.len());
        prop_assert_eq!(diff.deletions, 0);
    }

    #[test]
    fn total_replacement_is_exact(
        old_lines in prop::collection::vec(line().prop_filter("non-empty", |l| !l.is_empty()), 1..20),
        new_lines in prop::collection::vec(other_line(), 1..20),
    ) {
        // Disjoint alphabets: no line of the old text can equal a line of
        // the new text, so there is no common prefix or suffix.
        let diff = diff_lines(&text_of(&old_lines), &text_of(&new_lines));
        prop_assert_eq!(diff.additions, new_lines.len());
        prop_assert_eq!(diff.deletions, old_lines.len());
    }
}
