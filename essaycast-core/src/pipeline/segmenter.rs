//! Sentence-aware essay segmentation.
//!
//! An essay is cut into exactly `n` portions, one per requested image. Each
//! cut lands just after the first sentence terminator found once at least
//! `len / n` characters have been consumed, so images are anchored to the
//! end of a thought rather than to an arbitrary character offset.

use serde::Serialize;

const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// A contiguous slice of essay text and where it begins in the essay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EssayPortion {
    /// Portion text with surrounding whitespace trimmed.
    pub text: String,
    /// Start offset divided by the essay length, in `[0, 1]`.
    pub position: f64,
}

/// Split `essay` into exactly `n` portions (`n == 0` is treated as `1`).
///
/// Offsets and lengths are counted in characters. Whitespace-only portions
/// are discarded and the result is padded back to `n` by repeating the last
/// surviving portion. A blank essay yields `n` empty portions at position 0.
pub fn segment(essay: &str, n: usize) -> Vec<EssayPortion> {
    let n = n.max(1);
    let chars: Vec<char> = essay.chars().collect();
    let total = chars.len();
    let chunk_size = total / n;

    let mut portions: Vec<EssayPortion> = Vec::with_capacity(n);
    let mut cursor = 0usize;

    for i in 0..n {
        let start = cursor;
        let end = if i == n - 1 {
            total
        } else {
            let mut end = (cursor + chunk_size).min(total);
            while end < total && !SENTENCE_TERMINATORS.contains(&chars[end]) {
                end += 1;
            }
            (end + 1).min(total)
        };
        cursor = end;

        let text: String = chars[start..end].iter().collect();
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            portions.push(EssayPortion {
                text: trimmed.to_owned(),
                position: start as f64 / total as f64,
            });
        }
    }

    let filler = portions.last().cloned().unwrap_or(EssayPortion {
        text: String::new(),
        position: 0.0,
    });
    portions.resize(n, filler);
    portions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(essay: &str, portions: &[EssayPortion], n: usize) {
        assert_eq!(portions.len(), n);
        for pair in portions.windows(2) {
            assert!(pair[0].position <= pair[1].position);
        }
        for p in portions {
            assert!((0.0..=1.0).contains(&p.position));
        }
        // Left-to-right order: each distinct portion is found after the previous one.
        let mut search_from = 0;
        let mut last: Option<&str> = None;
        for p in portions {
            if last == Some(p.text.as_str()) {
                continue;
            }
            let idx = essay[search_from..]
                .find(&p.text)
                .expect("portion must appear in order");
            search_from += idx + p.text.len();
            last = Some(p.text.as_str());
        }
    }

    #[test]
    fn single_portion_covers_whole_essay() {
        let essay = "The tide rises. The tide falls! Does it ever rest?";
        let portions = segment(essay, 1);
        assert_eq!(portions.len(), 1);
        assert_eq!(portions[0].position, 0.0);
        assert_eq!(portions[0].text, essay);
    }

    #[test]
    fn three_portions_of_a_300_char_essay() {
        let sentence = "Cold water sinks near a pole. ";
        assert_eq!(sentence.len(), 30);
        let essay = sentence.repeat(10);
        assert_eq!(essay.len(), 300);

        let portions = segment(&essay, 3);
        assert_well_formed(&essay, &portions, 3);
        assert_eq!(portions[0].position, 0.0);
        // Each cut moves from the 100-char mark to just past the next period.
        assert!((portions[1].position - 119.0 / 300.0).abs() < 1e-9);
        assert!((portions[2].position - 239.0 / 300.0).abs() < 1e-9);
        assert!(portions[1].position >= 1.0 / 3.0);
        assert!(portions[2].position >= 2.0 / 3.0);
    }

    #[test]
    fn advances_a_full_chunk_before_cutting() {
        let essay = "Alpha beta. Gamma delta? Epsilon zeta!";
        let portions = segment(essay, 3);
        assert_eq!(portions[0].text, "Alpha beta. Gamma delta?");
        assert_eq!(portions[1].text, "Epsilon zeta!");
        assert_eq!(portions[1].position, 24.0 / 38.0);
        // Nothing is left for the third portion, so the second is repeated.
        assert_eq!(portions[2], portions[1]);
    }

    #[test]
    fn short_essay_duplicates_last_portion() {
        let essay = "Only one sentence here.";
        let portions = segment(essay, 4);
        assert_well_formed(essay, &portions, 4);
        assert_eq!(portions[0].text, essay);
        assert!(portions.iter().all(|p| p == &portions[0]));
    }

    #[test]
    fn essay_without_terminators_goes_to_first_portion() {
        let essay = "no punctuation at all in this run of words";
        let portions = segment(essay, 3);
        assert_well_formed(essay, &portions, 3);
        assert_eq!(portions[0].text, essay);
        assert_eq!(portions[2], portions[0]);
    }

    #[test]
    fn blank_essay_yields_empty_portions() {
        let portions = segment("   \n ", 2);
        assert_eq!(portions.len(), 2);
        assert!(portions.iter().all(|p| p.text.is_empty() && p.position == 0.0));
        assert_eq!(segment("", 3).len(), 3);
    }

    #[test]
    fn positions_count_characters_not_bytes() {
        let essay = "Él está aquí. Über alles façade. Ça va très bien.";
        let portions = segment(essay, 2);
        assert_well_formed(essay, &portions, 2);
        let total = essay.chars().count() as f64;
        let second_start = essay.chars().take_while(|c| *c != 'Ç').count() as f64 - 1.0;
        assert_eq!(second_start, 32.0);
        assert!((portions[1].position - second_start / total).abs() < 1e-9);
        assert_eq!(portions[1].text, "Ça va très bien.");
    }

    #[test]
    fn many_portions_stay_ordered() {
        let essay = "A. B. C. D. E. F. G. H. I. J. K. L. M. N. O. P.";
        for n in 1..=10 {
            let portions = segment(essay, n);
            assert_well_formed(essay, &portions, n);
        }
    }
}
