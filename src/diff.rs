//! Line-oriented diff for comparing two sessions' logs side by side.
//!
//! Not a classic LCS diff: lines are paired greedily by a similarity score
//! (70% shared words, 30% character edit distance) with a small lookahead,
//! which keeps near-identical WebDriver command lines paired as `modified`
//! instead of degenerating into remove/add pairs.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CharDiffKind {
    Common,
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharDiff {
    #[serde(rename = "type")]
    pub kind: CharDiffKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffLineKind {
    Unchanged,
    Modified,
    Added,
    Removed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffLine {
    #[serde(rename = "type")]
    pub kind: DiffLineKind,
    pub left_line: Option<String>,
    pub right_line: Option<String>,
    pub left_number: Option<usize>,
    pub right_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_diffs: Option<Vec<CharDiff>>,
}

const CHAR_LOOKAHEAD: usize = 50;
const LINE_LOOKAHEAD: usize = 10;
const PAIR_THRESHOLD: f64 = 0.3;
const WEAK_PAIR_THRESHOLD: f64 = 0.2;

/// Character-level diff of one paired line, resynchronizing with a bounded
/// lookahead on both sides.
pub fn generate_char_diffs(old_text: &str, new_text: &str) -> Vec<CharDiff> {
    let old: Vec<char> = old_text.chars().collect();
    let new: Vec<char> = new_text.chars().collect();
    let mut diffs = Vec::new();
    let mut i = 0;
    let mut j = 0;

    while i < old.len() || j < new.len() {
        let mut common = 0;
        while i + common < old.len() && j + common < new.len() && old[i + common] == new[j + common]
        {
            common += 1;
        }
        if common > 0 {
            diffs.push(CharDiff {
                kind: CharDiffKind::Common,
                text: old[i..i + common].iter().collect(),
            });
            i += common;
            j += common;
            continue;
        }

        let mut old_next = i;
        let mut new_next = j;
        let mut found = false;
        let max_lookahead =
            CHAR_LOOKAHEAD.min((old.len() - i).max(new.len() - j));
        for lookahead in 1..=max_lookahead {
            if i + lookahead < old.len() && j < new.len() && old[i + lookahead] == new[j] {
                old_next = i + lookahead;
                new_next = j;
                found = true;
                break;
            }
            if j + lookahead < new.len() && i < old.len() && new[j + lookahead] == old[i] {
                old_next = i;
                new_next = j + lookahead;
                found = true;
                break;
            }
        }
        if !found {
            old_next = (i + 1).min(old.len());
            new_next = (j + 1).min(new.len());
        }

        if i < old_next {
            diffs.push(CharDiff {
                kind: CharDiffKind::Removed,
                text: old[i..old_next].iter().collect(),
            });
            i = old_next;
        }
        if j < new_next {
            diffs.push(CharDiff {
                kind: CharDiffKind::Added,
                text: new[j..new_next].iter().collect(),
            });
            j = new_next;
        }
    }

    diffs
}

fn levenshtein_distance(a: &[char], b: &[char]) -> usize {
    let mut previous: Vec<usize> = (0..=a.len()).collect();
    let mut current = vec![0usize; a.len() + 1];

    for (i, &bc) in b.iter().enumerate() {
        current[0] = i + 1;
        for (j, &ac) in a.iter().enumerate() {
            current[j + 1] = if bc == ac {
                previous[j]
            } else {
                previous[j].min(current[j]).min(previous[j + 1]) + 1
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[a.len()]
}

/// Similarity in `[0, 1]`: 70% shared-word ratio, 30% normalized edit
/// distance. Either side empty scores 0.
fn calculate_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let longer = a_chars.len().max(b_chars.len());

    let words_a: Vec<&str> = a.split_whitespace().collect();
    let words_b: Vec<&str> = b.split_whitespace().collect();
    let common = words_a.iter().filter(|w| words_b.contains(w)).count();
    let total = words_a.len().max(words_b.len());
    let word_similarity = if total == 0 {
        0.0
    } else {
        common as f64 / total as f64
    };

    let edit_distance = levenshtein_distance(&a_chars, &b_chars);
    let char_similarity = (longer - edit_distance.min(longer)) as f64 / longer as f64;

    word_similarity * 0.7 + char_similarity * 0.3
}

struct LookaheadMatch {
    old_idx: Option<usize>,
    new_idx: Option<usize>,
    similarity: f64,
}

fn lookahead_match(old_lines: &[&str], new_lines: &[&str], i: usize, j: usize) -> LookaheadMatch {
    let mut best = LookaheadMatch {
        old_idx: None,
        new_idx: None,
        similarity: PAIR_THRESHOLD,
    };
    for oi in i..(i + LINE_LOOKAHEAD).min(old_lines.len()) {
        for ni in j..(j + LINE_LOOKAHEAD).min(new_lines.len()) {
            if oi == i && ni == j {
                continue;
            }
            let sim = calculate_similarity(old_lines[oi], new_lines[ni]);
            if sim > best.similarity {
                best = LookaheadMatch {
                    old_idx: Some(oi),
                    new_idx: Some(ni),
                    similarity: sim,
                };
            }
        }
    }
    best
}

fn push_removed(result: &mut Vec<DiffLine>, line: &str, left_num: &mut usize) {
    result.push(DiffLine {
        kind: DiffLineKind::Removed,
        left_line: Some(line.to_string()),
        right_line: None,
        left_number: Some(*left_num),
        right_number: None,
        char_diffs: None,
    });
    *left_num += 1;
}

fn push_added(result: &mut Vec<DiffLine>, line: &str, right_num: &mut usize) {
    result.push(DiffLine {
        kind: DiffLineKind::Added,
        left_line: None,
        right_line: Some(line.to_string()),
        left_number: None,
        right_number: Some(*right_num),
        char_diffs: None,
    });
    *right_num += 1;
}

fn modified_line(old: &str, new: &str, left_num: usize, right_num: usize) -> DiffLine {
    DiffLine {
        kind: DiffLineKind::Modified,
        left_line: Some(old.to_string()),
        right_line: Some(new.to_string()),
        left_number: Some(left_num),
        right_number: Some(right_num),
        char_diffs: Some(generate_char_diffs(old, new)),
    }
}

/// Full two-text diff. Line numbers are 1-based per side and only advance
/// on the side a row actually consumes.
pub fn generate_diff(old_value: &str, new_value: &str) -> Vec<DiffLine> {
    let old_lines: Vec<&str> = old_value.split('\n').collect();
    let new_lines: Vec<&str> = new_value.split('\n').collect();
    let mut result = Vec::new();

    let mut left_num = 1usize;
    let mut right_num = 1usize;
    let mut i = 0usize;
    let mut j = 0usize;

    while i < old_lines.len() || j < new_lines.len() {
        if i < old_lines.len() && j >= new_lines.len() {
            push_removed(&mut result, old_lines[i], &mut left_num);
            i += 1;
            continue;
        }
        if j < new_lines.len() && i >= old_lines.len() {
            push_added(&mut result, new_lines[j], &mut right_num);
            j += 1;
            continue;
        }

        let current_old = old_lines[i];
        let current_new = new_lines[j];

        if current_old == current_new {
            result.push(DiffLine {
                kind: DiffLineKind::Unchanged,
                left_line: Some(current_old.to_string()),
                right_line: Some(current_new.to_string()),
                left_number: Some(left_num),
                right_number: Some(right_num),
                char_diffs: None,
            });
            left_num += 1;
            right_num += 1;
            i += 1;
            j += 1;
            continue;
        }

        let current_similarity = calculate_similarity(current_old, current_new);
        let lookahead = lookahead_match(&old_lines, &new_lines, i, j);

        let should_pair_current = current_similarity > PAIR_THRESHOLD
            && (lookahead.similarity - current_similarity < 0.2
                || (lookahead.old_idx == Some(i) && lookahead.new_idx == Some(j)));

        if should_pair_current {
            result.push(modified_line(current_old, current_new, left_num, right_num));
            left_num += 1;
            right_num += 1;
            i += 1;
            j += 1;
        } else if lookahead.old_idx.is_some_and(|oi| oi > i) && lookahead.new_idx == Some(j) {
            push_removed(&mut result, current_old, &mut left_num);
            i += 1;
        } else if lookahead.new_idx.is_some_and(|ni| ni > j) && lookahead.old_idx == Some(i) {
            push_added(&mut result, current_new, &mut right_num);
            j += 1;
        } else {
            // Neither side has an aligned lookahead match; peek a few lines
            // for a clearly better pairing before giving up.
            let old_has_better_match = new_lines[j + 1..(j + 5).min(new_lines.len())]
                .iter()
                .any(|line| calculate_similarity(current_old, line) > current_similarity + 0.2);
            let new_has_better_match = old_lines[i + 1..(i + 5).min(old_lines.len())]
                .iter()
                .any(|line| calculate_similarity(line, current_new) > current_similarity + 0.2);

            if new_has_better_match && !old_has_better_match {
                push_added(&mut result, current_new, &mut right_num);
                j += 1;
            } else if old_has_better_match && !new_has_better_match {
                push_removed(&mut result, current_old, &mut left_num);
                i += 1;
            } else if current_similarity > WEAK_PAIR_THRESHOLD {
                result.push(modified_line(current_old, current_new, left_num, right_num));
                left_num += 1;
                right_num += 1;
                i += 1;
                j += 1;
            } else {
                push_removed(&mut result, current_old, &mut left_num);
                i += 1;
            }
        }
    }

    result
}
