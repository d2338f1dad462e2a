//! Scoring against the answer key and self-consistency voting.

use serde::{Deserialize, Serialize};

use crate::choice::Choice;

/// Whether an extracted answer matches the key.
///
/// Case folding happens when letters are parsed into [`Choice`], so every
/// experiment shares one case-insensitive rule.
pub fn score(normalized: Option<Choice>, ground_truth: Choice) -> bool {
    normalized == Some(ground_truth)
}

/// Resolve repeated extractions into one answer.
///
/// Absent entries are ignored. Ties go to the letter encountered first.
pub fn majority_vote<I>(answers: I) -> Option<Choice>
where
    I: IntoIterator<Item = Option<Choice>>,
{
    // insertion-ordered counts; at most four entries
    let mut counts: Vec<(Choice, usize)> = Vec::with_capacity(Choice::ALL.len());
    for answer in answers.into_iter().flatten() {
        match counts.iter_mut().find(|(c, _)| *c == answer) {
            Some((_, n)) => *n += 1,
            None => counts.push((answer, 1)),
        }
    }

    let mut best: Option<(Choice, usize)> = None;
    for (choice, n) in counts {
        match best {
            Some((_, top)) if n <= top => {}
            _ => best = Some((choice, n)),
        }
    }
    best.map(|(choice, _)| choice)
}

/// Running correctness counts for one result partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub total: usize,
    pub correct: usize,
    /// Responses where no letter could be extracted (including failed calls).
    pub unanswered: usize,
}

impl Tally {
    pub fn record(&mut self, normalized: Option<Choice>, is_correct: bool) {
        self.total += 1;
        if is_correct {
            self.correct += 1;
        }
        if normalized.is_none() {
            self.unanswered += 1;
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_letter;

    #[test]
    fn score_requires_present_matching_answer() {
        assert!(!score(None, Choice::A));
        assert!(score(Choice::parse("a"), Choice::parse("A").unwrap()));
        assert!(!score(Some(Choice::B), Choice::A));
    }

    #[test]
    fn majority_picks_most_common() {
        let votes = [Some(Choice::A), Some(Choice::A), Some(Choice::B)];
        assert_eq!(majority_vote(votes), Some(Choice::A));

        let votes = [Some(Choice::C), None, Some(Choice::D), Some(Choice::D)];
        assert_eq!(majority_vote(votes), Some(Choice::D));
    }

    #[test]
    fn majority_tie_goes_to_first_seen() {
        assert_eq!(
            majority_vote([Some(Choice::A), Some(Choice::B)]),
            Some(Choice::A)
        );
        assert_eq!(
            majority_vote([Some(Choice::D), Some(Choice::B), Some(Choice::B), Some(Choice::D)]),
            Some(Choice::D)
        );
    }

    #[test]
    fn majority_of_nothing_is_absent() {
        assert_eq!(majority_vote(Vec::<Option<Choice>>::new()), None);
        assert_eq!(majority_vote([None, None]), None);
    }

    #[test]
    fn tally_counts_unanswered() {
        let mut tally = Tally::default();
        tally.record(Some(Choice::A), true);
        tally.record(Some(Choice::B), false);
        tally.record(None, false);
        tally.record(Some(Choice::C), true);

        assert_eq!(tally.total, 4);
        assert_eq!(tally.correct, 2);
        assert_eq!(tally.unanswered, 1);
        assert!((tally.accuracy() - 0.5).abs() < 1e-9);
        assert_eq!(Tally::default().accuracy(), 0.0);
    }

    #[test]
    fn end_to_end_extraction_and_scoring() {
        let answer = Choice::B;

        let normalized = extract_letter(Some("I believe the correct answer is b) EC2"));
        assert_eq!(normalized, Some(Choice::B));
        assert!(score(normalized, answer));

        let normalized = extract_letter(Some("This question is unclear."));
        assert_eq!(normalized, None);
        assert!(!score(normalized, answer));
    }
}
