use regex::RegexSet;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::db::models::{CommentLine, StagedComment};

/// Comment lines that are internal to the dispatch floor and never leave it.
pub const EXCLUSION_PATTERNS: [&str; 8] = [
    // All-caps header prefixes such as `NCIC RESPONSE:` or `PREMISE HAZARD INFO:`.
    r"^[A-Z,/]{3,}(\s[A-Z]{2,})?(\s[A-Z]{2,})?:",
    // Slash-delimited codes.
    r"[A-Z,^0-9]{3,}/",
    r"END OF (K)?DOR RESPONSE",
    r"-{3,}",
    // Ten-codes.
    r"10-[0-9]{2}",
    r"LICENSE:",
    r"\*{3,}",
    r"Field Event",
];

/// Joins the kept lines of one event.
pub const LINE_SEPARATOR: &str = " ";

static EXCLUSIONS: OnceLock<RegexSet> = OnceLock::new();

fn exclusions() -> &'static RegexSet {
    EXCLUSIONS.get_or_init(|| {
        RegexSet::new(EXCLUSION_PATTERNS).expect("comment exclusion patterns are valid")
    })
}

pub fn is_excluded(comment: &str) -> bool {
    exclusions().is_match(comment)
}

/// Groups ordered comment lines by event key, drops excluded and null lines,
/// and joins the rest into one string capped at `max_chars` characters.
///
/// Keys keep the order of their first line. Events whose lines were all
/// excluded produce nothing.
pub fn assemble(lines: Vec<CommentLine>, max_chars: usize) -> Vec<StagedComment> {
    let mut staged: Vec<(StagedComment, Vec<String>)> = Vec::new();
    let mut index: HashMap<(i64, String, String), usize> = HashMap::new();

    for line in lines {
        let Some(text) = line.comm else {
            continue;
        };
        if is_excluded(&text) {
            continue;
        }

        let key = (line.eid, line.num_1, line.ad_ts);
        let slot = match index.get(&key) {
            Some(slot) => *slot,
            None => {
                let (eid, num_1, ad_ts) = key.clone();
                staged.push((
                    StagedComment {
                        eid,
                        num_1,
                        ad_ts,
                        comments: None,
                    },
                    Vec::new(),
                ));
                index.insert(key, staged.len() - 1);
                staged.len() - 1
            }
        };
        staged[slot].1.push(text);
    }

    staged
        .into_iter()
        .map(|(mut row, parts)| {
            row.comments = Some(truncate_chars(&parts.join(LINE_SEPARATOR), max_chars));
            row
        })
        .collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(eid: i64, comm: Option<&str>) -> CommentLine {
        CommentLine {
            eid,
            num_1: format!("P{eid}"),
            ad_ts: "20240301120000".to_string(),
            comm: comm.map(str::to_string),
        }
    }

    #[test]
    fn each_exclusion_pattern_matches_its_example() {
        let excluded = [
            "NCIC RESPONSE: no record",
            "DL SUSP/REVOKED",
            "***END OF KDOR RESPONSE",
            "----------",
            "UNIT 10-97 ON SCENE",
            "LICENSE: ABC123",
            "*** priority ***",
            "Field Event created from mobile",
        ];
        for comment in excluded {
            assert!(is_excluded(comment), "expected {comment:?} to be excluded");
        }
    }

    #[test]
    fn narrative_comments_are_kept() {
        for comment in [
            "caller reports smoke from the garage",
            "RP is on the second floor",
            "Suspect left in a blue sedan - headed north",
        ] {
            assert!(!is_excluded(comment), "expected {comment:?} to be kept");
        }
    }

    #[test]
    fn assemble_filters_and_keeps_creation_order() {
        let staged = assemble(
            vec![
                line(1, Some("caller reports smoke")),
                line(1, Some("----------")),
                line(2, Some("second event")),
                line(1, None),
                line(1, Some("flames visible")),
            ],
            4000,
        );

        assert_eq!(staged.len(), 2);
        assert_eq!(staged[0].eid, 1);
        assert_eq!(
            staged[0].comments.as_deref(),
            Some("caller reports smoke flames visible")
        );
        assert_eq!(staged[1].eid, 2);
        assert_eq!(staged[1].comments.as_deref(), Some("second event"));
    }

    #[test]
    fn events_with_only_excluded_lines_are_dropped() {
        let staged = assemble(vec![line(7, Some("LICENSE: XYZ")), line(7, None)], 4000);
        assert!(staged.is_empty());
    }

    #[test]
    fn assembled_comments_are_capped_by_characters() {
        let long = "é".repeat(30);
        let staged = assemble(vec![line(3, Some(&long))], 10);
        let comments = staged[0].comments.as_deref().unwrap();
        assert_eq!(comments.chars().count(), 10);
    }
}
