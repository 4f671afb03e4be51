mod common;

use common::{harness, unit_for, FakeGateway};
use std::sync::atomic::Ordering;
use uuid::Uuid;
use word_study_core::{
    MasteryLevel, QuizAnswer, QuizQuestion, QuizType, StudyStore, UnitProgress, WordStudyError,
    WriteOutcome,
};

fn question() -> QuizQuestion {
    QuizQuestion {
        id: Uuid::new_v4(),
        question_type: QuizType::MultipleChoice,
        prompt: "¿Qué modo es Παρακαλῶ?".to_string(),
        options: vec!["Indicativo".to_string(), "Imperativo".to_string()],
        correct_answer: "Indicativo".to_string(),
        explanation: "Presente indicativo activo, primera persona.".to_string(),
    }
}

fn answer(progress: &UnitProgress, text: &str) -> QuizAnswer {
    QuizAnswer {
        session_id: progress.session_id,
        unit_id: progress.unit_id,
        question: question(),
        user_answer: text.to_string(),
    }
}

#[tokio::test]
async fn three_right_one_wrong_is_practiced() {
    let h = harness(FakeGateway::default());
    let mut progress = UnitProgress::new(Uuid::new_v4(), Uuid::new_v4());

    for text in [" indicativo ", "INDICATIVO", "Indicativo", "Imperativo"] {
        let submission = h
            .service
            .submit_quiz_answer(answer(&progress, text), &progress)
            .await
            .unwrap();
        assert_eq!(submission.persisted, WriteOutcome::Written);
        progress = submission.progress;
    }

    assert_eq!(progress.attempts.len(), 4);
    assert_eq!(progress.mastery_level, MasteryLevel::Practiced);

    let stored = h
        .service
        .get_unit_progress(progress.session_id, progress.unit_id)
        .await
        .unwrap();
    assert_eq!(stored.attempts.len(), 4);
    assert_eq!(stored.mastery_level, MasteryLevel::Practiced);
}

#[tokio::test]
async fn three_right_in_a_row_is_mastered() {
    let h = harness(FakeGateway::default());
    let mut progress = UnitProgress::new(Uuid::new_v4(), Uuid::new_v4());
    for _ in 0..3 {
        let submission = h
            .service
            .submit_quiz_answer(answer(&progress, "indicativo"), &progress)
            .await
            .unwrap();
        assert!(submission.is_correct);
        progress = submission.progress;
    }
    assert_eq!(progress.mastery_level, MasteryLevel::Mastered);
}

#[tokio::test]
async fn storage_failure_still_grades_the_answer() {
    let h = harness(FakeGateway::default());
    h.store.fail_progress.store(true, Ordering::SeqCst);
    let progress = UnitProgress::new(Uuid::new_v4(), Uuid::new_v4());

    let submission = h
        .service
        .submit_quiz_answer(answer(&progress, "Imperativo"), &progress)
        .await
        .unwrap();
    assert!(!submission.is_correct);
    assert_eq!(submission.persisted, WriteOutcome::Failed);
    assert_eq!(submission.progress.attempts.len(), 1);
    assert_eq!(submission.progress.mastery_level, MasteryLevel::Viewed);
    assert_eq!(
        submission.explanation,
        "Presente indicativo activo, primera persona."
    );

    let stored = h
        .store
        .inner
        .get_progress(progress.session_id, progress.unit_id)
        .await
        .unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn mismatched_progress_is_rejected() {
    let h = harness(FakeGateway::default());
    let progress = UnitProgress::new(Uuid::new_v4(), Uuid::new_v4());
    let mut other = answer(&progress, "indicativo");
    other.unit_id = Uuid::new_v4();

    let err = h
        .service
        .submit_quiz_answer(other, &progress)
        .await
        .unwrap_err();
    assert!(matches!(err, WordStudyError::Validation(_)));
}

#[tokio::test]
async fn section_views_are_idempotent() {
    let h = harness(FakeGateway::default());
    let progress = UnitProgress::new(Uuid::new_v4(), Uuid::new_v4());

    let first = h
        .service
        .track_section_view(progress.session_id, progress.unit_id, "function", &progress)
        .await
        .unwrap();
    let second = h
        .service
        .track_section_view(
            progress.session_id,
            progress.unit_id,
            "function",
            &first.progress,
        )
        .await
        .unwrap();

    assert_eq!(second.progress.viewed_sections.len(), 1);
    assert_eq!(second.progress.mastery_level, MasteryLevel::Viewed);
    assert_eq!(second.persisted, WriteOutcome::Written);
}

#[tokio::test]
async fn section_view_failures_are_swallowed() {
    let h = harness(FakeGateway::default());
    h.store.fail_progress.store(true, Ordering::SeqCst);
    let progress = UnitProgress::new(Uuid::new_v4(), Uuid::new_v4());

    let view = h
        .service
        .track_section_view(progress.session_id, progress.unit_id, "significance", &progress)
        .await
        .unwrap();
    assert_eq!(view.persisted, WriteOutcome::Failed);
    assert!(view.progress.viewed_sections.contains("significance"));
}

#[tokio::test]
async fn fresh_units_start_unseen() {
    let h = harness(FakeGateway::default());
    let progress = h
        .service
        .get_unit_progress(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(progress.mastery_level, MasteryLevel::Unseen);
    assert!(progress.attempts.is_empty());

    assert!(matches!(
        h.service.get_unit_progress(Uuid::nil(), Uuid::new_v4()).await,
        Err(WordStudyError::Validation(_))
    ));
}

#[tokio::test]
async fn quizzes_default_to_three_and_never_exceed_the_request() {
    let h = harness(FakeGateway::default());
    let unit = unit_for("Παρακαλῶ");

    let default = h.service.generate_quiz(&unit, None, None, None).await.unwrap();
    assert_eq!(default.len(), 3);

    let five = h.service.generate_quiz(&unit, Some(5), None, None).await.unwrap();
    assert_eq!(five.len(), 5);

    for bad in [0, 21] {
        assert!(matches!(
            h.service.generate_quiz(&unit, Some(bad), None, None).await,
            Err(WordStudyError::Validation(_))
        ));
    }
}
