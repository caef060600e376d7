use super::{context_preview, find_all, LocateError, Occurrence, QueryMode};
use crate::offsets::slice_chars;
use proptest::prelude::*;

#[test]
fn test_literal_finds_every_occurrence() {
    let text = "o réu e o réu";
    let found = find_all(text, "réu", QueryMode::Literal).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].offset, 2);
    assert_eq!(found[1].offset, 10);
    assert!(found.iter().all(|occ| occ.length == 3 && occ.matched_text == "réu"));
}

#[test]
fn test_literal_is_case_sensitive() {
    let found = find_all("Autor autor AUTOR", "autor", QueryMode::Literal).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].offset, 6);
}

#[test]
fn test_literal_matches_do_not_overlap() {
    let found = find_all("aaaa", "aa", QueryMode::Literal).unwrap();
    let offsets: Vec<usize> = found.iter().map(|occ| occ.offset).collect();
    assert_eq!(offsets, vec![0, 2]);
}

#[test]
fn test_empty_query_and_empty_text() {
    assert!(find_all("texto", "", QueryMode::Literal).unwrap().is_empty());
    assert!(find_all("", "texto", QueryMode::Literal).unwrap().is_empty());
}

#[test]
fn test_pattern_mode_reports_matched_text() {
    let text = "Art. 5º e art. 37";
    let found = find_all(text, r"(?i)art\. \d+", QueryMode::Pattern).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].matched_text, "Art. 5");
    assert_eq!(found[1].offset, 10);
    assert_eq!(found[1].matched_text, "art. 37");
}

#[test]
fn test_pattern_mode_skips_empty_matches() {
    let found = find_all("abc", "x*", QueryMode::Pattern).unwrap();
    assert!(found.is_empty());
}

#[test]
fn test_invalid_pattern_is_an_error() {
    let result = find_all("abc", "(", QueryMode::Pattern);
    assert!(matches!(result, Err(LocateError::InvalidPattern(_))));
}

#[test]
fn test_context_preview_highlights_match() {
    let text = "Requer a citação do réu para contestar.";
    let occ = Occurrence {
        offset: 20,
        length: 3,
        matched_text: "réu".to_string(),
    };
    assert_eq!(
        context_preview(text, &occ, 5),
        "…o do **réu** para…"
    );
}

#[test]
fn test_context_preview_at_edges_flattens_newlines() {
    let text = "réu\nsegunda linha";
    let occ = Occurrence {
        offset: 0,
        length: 3,
        matched_text: "réu".to_string(),
    };
    assert_eq!(context_preview(text, &occ, 20), "**réu** segunda linha");
}

proptest! {
    #[test]
    fn prop_literal_occurrences_slice_back_to_query(
        text in "[ab é\n]{0,40}",
        query in "[ab é]{1,3}",
    ) {
        let found = find_all(&text, &query, QueryMode::Literal).unwrap();
        let mut previous_end = 0;
        for occ in &found {
            prop_assert_eq!(slice_chars(&text, occ.offset, occ.length), Some(query.as_str()));
            prop_assert!(occ.offset >= previous_end);
            previous_end = occ.end();
        }
        prop_assert_eq!(found.is_empty(), !text.contains(&query));
    }
}
