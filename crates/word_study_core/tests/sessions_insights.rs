mod common;

use common::{harness, unit_for, FakeGateway, Harness};
use uuid::Uuid;
use word_study_core::{
    CoachingContext, CoachingStrategy, InsightFilters, InsightUpdate, MasteryLevel, NewInsight,
    ResponseStorage, SessionFilters, SessionStatus, StrategyPreference, StudyStore,
    UnitGenerationRequest, WordStudyError,
};

async fn session_for(h: &Harness, user: &str, passage: &str) -> Uuid {
    let units = h
        .service
        .generate_training_units(UnitGenerationRequest {
            passage: passage.to_string(),
            user_id: user.to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    units[0].session_id.unwrap()
}

/// An insight on the first unit of a fresh session owned by `user`.
async fn new_insight(h: &Harness, user: &str, title: &str, tags: &[&str]) -> NewInsight {
    let session_id = session_for(h, user, "Romanos 12:1").await;
    let session = h.service.get_session(session_id, user).await.unwrap();
    NewInsight {
        session_id,
        unit_id: session.units[0].id,
        user_id: user.to_string(),
        passage: "Romanos 12:1".to_string(),
        greek_word: "λογικὴν".to_string(),
        title: title.to_string(),
        question: Some("  ".to_string()),
        content: "Culto racional, no ritual.".to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

//=========================================================================================
// Sessions
//=========================================================================================

#[tokio::test]
async fn only_the_owner_can_delete_a_session() {
    let h = harness(FakeGateway::with_forms(&["Παρακαλῶ"]));
    let session_id = session_for(&h, "pastor-1", "Romanos 12:1").await;

    let err = h
        .service
        .delete_session(session_id, "pastor-2")
        .await
        .unwrap_err();
    assert!(matches!(err, WordStudyError::NotOwner { .. }));
    assert_eq!(h.store.inner.session_count().await, 1);

    h.service.delete_session(session_id, "pastor-1").await.unwrap();
    assert_eq!(h.store.inner.session_count().await, 0);

    let again = h
        .service
        .delete_session(session_id, "pastor-1")
        .await
        .unwrap_err();
    assert!(matches!(again, WordStudyError::NotFound(_)));
}

#[tokio::test]
async fn sessions_move_from_active_only() {
    let h = harness(FakeGateway::with_forms(&["Παρακαλῶ"]));
    let session_id = session_for(&h, "pastor-1", "Romanos 12:1").await;

    let completed = h
        .service
        .update_session_status(session_id, "pastor-1", SessionStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, SessionStatus::Completed);

    let err = h
        .service
        .update_session_status(session_id, "pastor-1", SessionStatus::Abandoned)
        .await
        .unwrap_err();
    assert!(matches!(err, WordStudyError::Validation(_)));

    let stored = h.service.get_session(session_id, "pastor-1").await.unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
}

#[tokio::test]
async fn user_sessions_are_filtered() {
    let h = harness(FakeGateway::with_forms(&["Παρακαλῶ"]));
    let romans = session_for(&h, "pastor-1", "Romanos 12:1").await;
    session_for(&h, "pastor-1", "Juan 1:1").await;
    session_for(&h, "pastor-2", "Romanos 8:28").await;
    h.service
        .update_session_status(romans, "pastor-1", SessionStatus::Abandoned)
        .await
        .unwrap();

    let mine = h
        .service
        .get_user_sessions("pastor-1", &SessionFilters::default())
        .await
        .unwrap();
    assert_eq!(mine.len(), 2);

    let abandoned_romans = h
        .service
        .get_user_sessions(
            "pastor-1",
            &SessionFilters {
                status: Some(SessionStatus::Abandoned),
                passage: Some("romanos".to_string()),
                last_days: Some(7),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(abandoned_romans.len(), 1);
    assert_eq!(abandoned_romans[0].id, romans);

    let bad_days = h
        .service
        .get_user_sessions(
            "pastor-1",
            &SessionFilters {
                last_days: Some(0),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(bad_days, Err(WordStudyError::Validation(_))));
}

//=========================================================================================
// Free-form responses
//=========================================================================================

#[tokio::test]
async fn graded_responses_are_filed_under_their_session() {
    let h = harness(FakeGateway::with_forms(&["Παρακαλῶ"]));
    let session_id = session_for(&h, "pastor-1", "Romanos 12:1").await;
    let unit = h.store.inner.get_session(session_id).await.unwrap().units[0].clone();

    let evaluated = h
        .service
        .evaluate_user_response(&unit, "os ruego, hermanos", None, None)
        .await
        .unwrap();
    assert!(evaluated.response.is_correct);
    assert_eq!(evaluated.storage, ResponseStorage::Saved);

    let session = h.store.inner.get_session(session_id).await.unwrap();
    let stored = session
        .responses
        .get(&evaluated.response.id)
        .expect("response stored");
    assert_eq!(stored.unit_id, unit.id);
}

#[tokio::test]
async fn responses_without_a_live_session_are_still_returned() {
    let h = harness(FakeGateway::default());

    let detached = h
        .service
        .evaluate_user_response(&unit_for("Παρακαλῶ"), "os exhorto", None, None)
        .await
        .unwrap();
    assert_eq!(detached.storage, ResponseStorage::Detached);
    assert!(!detached.response.is_correct);

    let orphan = unit_for("Παρακαλῶ").attached_to(Uuid::new_v4());
    let missing = h
        .service
        .evaluate_user_response(&orphan, "os ruego", None, None)
        .await
        .unwrap();
    assert_eq!(missing.storage, ResponseStorage::SessionMissing);
    assert_eq!(missing.response.feedback, "feedback on os ruego");
}

//=========================================================================================
// Coaching
//=========================================================================================

#[tokio::test]
async fn questions_carry_the_selected_strategy_to_the_gateway() {
    let h = harness(FakeGateway::default());
    let context = CoachingContext {
        passage: Some("Romanos 12:1".to_string()),
        greek_word: Some("λογικὴν".to_string()),
        mastery_level: Some(MasteryLevel::Unseen),
    };

    let coached = h
        .service
        .ask_question(
            "¿Qué significa λογικὴν?",
            &context,
            StrategyPreference::Fixed(CoachingStrategy::Direct),
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(coached.selection.strategy, CoachingStrategy::Direct);
    assert!(coached.selection.overridden);
    assert_eq!(coached.answer, "answer to ¿Qué significa λογικὴν?");

    let guidance = h.gateway.last_guidance.lock().unwrap().clone();
    assert_eq!(guidance, Some(coached.selection.prompt_additions.clone()));
    assert!(!coached.selection.prompt_additions.is_empty());
}

//=========================================================================================
// Insights
//=========================================================================================

#[tokio::test]
async fn insights_are_created_with_clean_tags() {
    let h = harness(FakeGateway::with_forms(&["λογικὴν"]));
    let insight = h
        .service
        .create_insight(new_insight(&h, "pastor-1", "Culto racional", &[" Culto", "culto", "ROMANOS"]).await)
        .await
        .unwrap();
    assert_eq!(insight.tags, vec!["culto".to_string(), "romanos".to_string()]);
    assert_eq!(insight.question, None);

    let empty = NewInsight {
        content: "   ".to_string(),
        ..new_insight(&h, "pastor-1", "t", &[]).await
    };
    assert!(matches!(
        h.service.create_insight(empty).await,
        Err(WordStudyError::Validation(_))
    ));
}

#[tokio::test]
async fn only_the_author_can_change_an_insight() {
    let h = harness(FakeGateway::with_forms(&["λογικὴν"]));
    let insight = h
        .service
        .create_insight(new_insight(&h, "pastor-1", "Culto racional", &["culto"]).await)
        .await
        .unwrap();

    let err = h
        .service
        .update_insight(
            "pastor-2",
            insight.id,
            InsightUpdate {
                title: Some("mine now".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WordStudyError::NotOwner { .. }));
    assert!(matches!(
        h.service.delete_insight("pastor-2", insight.id).await,
        Err(WordStudyError::NotOwner { .. })
    ));

    let updated = h
        .service
        .update_insight(
            "pastor-1",
            insight.id,
            InsightUpdate {
                content: Some("Servicio conforme a la razón.".to_string()),
                tags: Some(vec!["Adoración".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Culto racional");
    assert_eq!(updated.tags, vec!["adoración".to_string()]);
    assert!(updated.updated_at >= insight.updated_at);

    h.service.delete_insight("pastor-1", insight.id).await.unwrap();
    assert!(matches!(
        h.service.delete_insight("pastor-1", insight.id).await,
        Err(WordStudyError::NotFound(_))
    ));
}

#[tokio::test]
async fn user_insights_are_filtered() {
    let h = harness(FakeGateway::with_forms(&["λογικὴν"]));
    h.service
        .create_insight(new_insight(&h, "pastor-1", "Culto racional", &["culto"]).await)
        .await
        .unwrap();
    h.service
        .create_insight(new_insight(&h, "pastor-1", "Sacrificio vivo", &["sacrificio"]).await)
        .await
        .unwrap();
    h.service
        .create_insight(new_insight(&h, "pastor-2", "Culto ajeno", &["culto"]).await)
        .await
        .unwrap();

    let all = h
        .service
        .get_user_insights("pastor-1", &InsightFilters::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let tagged = h
        .service
        .get_user_insights(
            "pastor-1",
            &InsightFilters {
                tags: vec!["CULTO".to_string()],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].title, "Culto racional");

    let searched = h
        .service
        .get_user_insights(
            "pastor-1",
            &InsightFilters {
                search: Some("vivo".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(searched.len(), 1);
}

#[tokio::test]
async fn insights_attach_only_to_the_callers_own_units() {
    let h = harness(FakeGateway::with_forms(&["λογικὴν"]));
    let foreign = new_insight(&h, "pastor-2", "Culto ajeno", &[]).await;

    let err = h
        .service
        .create_insight(NewInsight {
            user_id: "pastor-1".to_string(),
            ..foreign.clone()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WordStudyError::NotOwner { .. }));

    let stray_unit = NewInsight {
        unit_id: Uuid::new_v4(),
        ..foreign
    };
    assert!(matches!(
        h.service.create_insight(stray_unit).await,
        Err(WordStudyError::NotFound(_))
    ));
    assert!(h
        .service
        .get_user_insights("pastor-2", &InsightFilters::default())
        .await
        .unwrap()
        .is_empty());
}
