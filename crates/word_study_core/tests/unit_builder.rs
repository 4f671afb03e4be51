mod common;

use common::{harness, FakeGateway};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use word_study_core::{
    AddWordRequest, StudyStore, UnitGenerationRequest, WordStudyError,
};

fn request(user: &str) -> UnitGenerationRequest {
    UnitGenerationRequest {
        passage: "Παρακαλῶ οὖν ὑμᾶς, ἀδελφοί, διὰ τῶν οἰκτιρμῶν τοῦ θεοῦ".to_string(),
        user_id: user.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn three_forms_become_three_units_in_one_session() {
    let h = harness(FakeGateway::with_forms(&["Παρακαλῶ", "οἰκτιρμῶν", "θεοῦ"]));

    let units = h
        .service
        .generate_training_units(request("pastor-1"))
        .await
        .unwrap();
    assert_eq!(units.len(), 3);

    let session_ids: HashSet<_> = units.iter().map(|u| u.session_id).collect();
    assert_eq!(session_ids.len(), 1);
    let session_id = units[0].session_id.expect("units are stamped");

    let session = h.store.inner.get_session(session_id).await.unwrap();
    assert_eq!(session.user_id, "pastor-1");
    assert_eq!(session.units, units);

    // Glosses learned while building land in the shared lexicon.
    let entry = h
        .service
        .lookup_word("θεοῦ-lemma", None)
        .await
        .unwrap()
        .expect("lexicon seeded");
    assert_eq!(entry.gloss, "gloss of θεοῦ");
}

#[tokio::test]
async fn one_failed_unit_fails_the_batch_and_persists_nothing() {
    let h = harness(FakeGateway {
        failing_form: Some("οἰκτιρμῶν".to_string()),
        ..FakeGateway::with_forms(&["Παρακαλῶ", "οἰκτιρμῶν", "θεοῦ"])
    });

    let err = h
        .service
        .generate_training_units(request("pastor-1"))
        .await
        .unwrap_err();
    match err {
        WordStudyError::Generation { context, .. } => assert!(context.contains("οἰκτιρμῶν")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.store.inner.session_count().await, 0);
}

#[tokio::test]
async fn persistence_failure_surfaces_to_the_caller() {
    let h = harness(FakeGateway::with_forms(&["Παρακαλῶ"]));
    h.store.fail_create_session.store(true, Ordering::SeqCst);

    let err = h
        .service
        .generate_training_units(request("pastor-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, WordStudyError::Store(_)));
    assert_eq!(h.gateway.unit_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn duplicate_and_blank_forms_are_skipped() {
    let h = harness(FakeGateway::with_forms(&["θεοῦ", " θεοῦ ", "", "ἀδελφοί"]));
    let units = h
        .service
        .generate_training_units(request("pastor-1"))
        .await
        .unwrap();
    assert_eq!(units.len(), 2);
}

#[tokio::test]
async fn missing_inputs_are_rejected_before_generation() {
    let h = harness(FakeGateway::with_forms(&["θεοῦ"]));
    let err = h
        .service
        .generate_training_units(request("  "))
        .await
        .unwrap_err();
    assert!(matches!(err, WordStudyError::Validation(_)));
    assert_eq!(h.gateway.unit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn previewed_word_is_committed_to_an_existing_session() {
    let h = harness(FakeGateway::with_forms(&["Παρακαλῶ"]));
    let units = h
        .service
        .generate_training_units(request("pastor-1"))
        .await
        .unwrap();
    let session_id = units[0].session_id.unwrap();

    let preview = h
        .service
        .identify_passage_word("ἀδελφοί", "Παρακαλῶ οὖν ὑμᾶς, ἀδελφοί", None, None)
        .await
        .unwrap();
    assert_eq!(h.store.inner.get_session(session_id).await.unwrap().units.len(), 1);

    let unit = h
        .service
        .add_passage_word_to_units(AddWordRequest {
            session_id,
            preview,
            word: "ἀδελφοί".to_string(),
            full_passage: "Παρακαλῶ οὖν ὑμᾶς, ἀδελφοί".to_string(),
            store_id: None,
            language: None,
        })
        .await
        .unwrap();
    assert_eq!(unit.session_id, Some(session_id));
    assert_eq!(unit.greek_form.surface, "ἀδελφοί");

    let session = h.store.inner.get_session(session_id).await.unwrap();
    assert_eq!(session.units.len(), 2);
}

#[tokio::test]
async fn committing_to_an_unknown_session_is_not_found() {
    let h = harness(FakeGateway::default());
    let preview = h
        .service
        .identify_passage_word("ἀδελφοί", "", None, None)
        .await
        .unwrap();
    let err = h
        .service
        .add_passage_word_to_units(AddWordRequest {
            session_id: uuid::Uuid::new_v4(),
            preview,
            word: "ἀδελφοί".to_string(),
            full_passage: String::new(),
            store_id: None,
            language: Some("English".to_string()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WordStudyError::NotFound(_)));
}
