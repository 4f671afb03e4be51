//! crates/word_study_core/src/progress.rs
//!
//! Pure computation over unit progress: mastery levels, section views and
//! quiz-answer validation. Nothing in here performs I/O.

use crate::domain::{MasteryLevel, QuizAttempt, QuizType, UnitProgress};
use chrono::{DateTime, Utc};

const MASTERED_ACCURACY: f64 = 0.8;
const MASTERED_MIN_ATTEMPTS: usize = 3;
const PRACTICED_ACCURACY: f64 = 0.5;

/// Derives the mastery level from a unit's full attempt history.
///
/// An empty history yields `Viewed`, never `Unseen`.
pub fn mastery_level(attempts: &[QuizAttempt]) -> MasteryLevel {
    let total = attempts.len();
    if total == 0 {
        return MasteryLevel::Viewed;
    }
    let correct = attempts.iter().filter(|a| a.is_correct).count();
    let accuracy = correct as f64 / total as f64;

    if accuracy >= MASTERED_ACCURACY && total >= MASTERED_MIN_ATTEMPTS {
        MasteryLevel::Mastered
    } else if accuracy >= PRACTICED_ACCURACY {
        MasteryLevel::Practiced
    } else {
        MasteryLevel::Viewed
    }
}

fn normalize_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// Checks a quiz answer against the expected one.
///
/// Choice questions need an exact match after trimming and case-folding.
/// Fill-in-the-blank accepts either string containing the other.
/// Unknown question types are never correct.
pub fn validate_answer(user_answer: &str, correct_answer: &str, question_type: &QuizType) -> bool {
    let given = normalize_answer(user_answer);
    let expected = normalize_answer(correct_answer);

    match question_type {
        QuizType::MultipleChoice | QuizType::TrueFalse => given == expected,
        QuizType::FillBlank => {
            // An empty answer is a substring of everything.
            if given.is_empty() || expected.is_empty() {
                return given == expected;
            }
            given.contains(&expected) || expected.contains(&given)
        }
        QuizType::Other(_) => false,
    }
}

/// Appends an attempt and recomputes the level from the whole log.
pub fn record_attempt(progress: &UnitProgress, attempt: QuizAttempt) -> UnitProgress {
    let mut updated = progress.clone();
    updated.attempts.push(attempt);
    updated.mastery_level = mastery_level(&updated.attempts);
    updated
}

/// Marks a section as viewed. Repeated views of one section collapse, and
/// the level is raised to at least `Viewed` but never lowered.
pub fn record_section_view(
    progress: &UnitProgress,
    section: &str,
    viewed_at: DateTime<Utc>,
) -> UnitProgress {
    let mut updated = progress.clone();
    updated.viewed_sections.insert(section.trim().to_string());
    updated.mastery_level = updated.mastery_level.max(MasteryLevel::Viewed);
    updated.last_viewed_at = Some(viewed_at);
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn attempts(correct: usize, wrong: usize) -> Vec<QuizAttempt> {
        let unit_id = Uuid::new_v4();
        (0..correct + wrong)
            .map(|i| QuizAttempt {
                id: Uuid::new_v4(),
                unit_id,
                question_id: Uuid::new_v4(),
                user_answer: format!("answer {i}"),
                is_correct: i < correct,
                attempted_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn empty_history_is_viewed_not_unseen() {
        assert_eq!(mastery_level(&[]), MasteryLevel::Viewed);
    }

    #[test]
    fn mastered_needs_accuracy_and_volume() {
        assert_eq!(mastery_level(&attempts(3, 0)), MasteryLevel::Mastered);
        assert_eq!(mastery_level(&attempts(4, 1)), MasteryLevel::Mastered);
        // Perfect but too few attempts.
        assert_eq!(mastery_level(&attempts(2, 0)), MasteryLevel::Practiced);
    }

    #[test]
    fn three_of_four_is_practiced() {
        assert_eq!(mastery_level(&attempts(3, 1)), MasteryLevel::Practiced);
    }

    #[test]
    fn half_right_is_practiced_below_is_viewed() {
        assert_eq!(mastery_level(&attempts(1, 1)), MasteryLevel::Practiced);
        assert_eq!(mastery_level(&attempts(1, 2)), MasteryLevel::Viewed);
        assert_eq!(mastery_level(&attempts(0, 5)), MasteryLevel::Viewed);
    }

    #[test]
    fn choice_answers_match_case_insensitively() {
        assert!(validate_answer("Paris", "paris", &QuizType::MultipleChoice));
        assert!(validate_answer("  TRUE ", "true", &QuizType::TrueFalse));
        assert!(!validate_answer("xyz", "Paris", &QuizType::MultipleChoice));
        assert!(!validate_answer("Par", "Paris", &QuizType::MultipleChoice));
    }

    #[test]
    fn fill_blank_is_lenient_both_ways() {
        assert!(validate_answer("par", "Paris", &QuizType::FillBlank));
        assert!(validate_answer("the city of Paris", "paris", &QuizType::FillBlank));
        assert!(!validate_answer("London", "Paris", &QuizType::FillBlank));
        assert!(!validate_answer("   ", "Paris", &QuizType::FillBlank));
    }

    #[test]
    fn unknown_question_type_is_rejected() {
        let essay = QuizType::Other("essay".to_string());
        assert!(!validate_answer("Paris", "Paris", &essay));
    }

    #[test]
    fn section_view_is_idempotent_and_never_lowers_level() {
        let progress = UnitProgress::new(Uuid::new_v4(), Uuid::new_v4());
        let once = record_section_view(&progress, "morphology", Utc::now());
        let twice = record_section_view(&once, "morphology", Utc::now());
        assert_eq!(twice.viewed_sections.len(), 1);
        assert_eq!(twice.mastery_level, MasteryLevel::Viewed);

        let mut mastered = twice.clone();
        mastered.mastery_level = MasteryLevel::Mastered;
        let viewed_again = record_section_view(&mastered, "significance", Utc::now());
        assert_eq!(viewed_again.mastery_level, MasteryLevel::Mastered);
        assert_eq!(viewed_again.viewed_sections.len(), 2);
    }

    #[test]
    fn record_attempt_recomputes_from_full_log() {
        let mut progress = UnitProgress::new(Uuid::new_v4(), Uuid::new_v4());
        for attempt in attempts(3, 1) {
            progress = record_attempt(&progress, attempt);
        }
        assert_eq!(progress.attempts.len(), 4);
        assert_eq!(progress.accuracy(), Some(0.75));
        assert_eq!(progress.mastery_level, MasteryLevel::Practiced);
    }
}
