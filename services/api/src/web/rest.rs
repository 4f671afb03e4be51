//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Handlers translate HTTP payloads into use-case calls on
//! `WordStudyService`; all rules live in the core crate.

use crate::error::Rejection;
use crate::web::middleware::UserId;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;
use word_study_core::{
    AddWordRequest, CoachingContext, GenerationConfig, InsightFilters, InsightUpdate,
    MasteryLevel, NewInsight, QuizAnswer, QuizQuestion, SessionFilters, SessionStatus,
    StrategyPreference, TrainingUnit, UnitGenerationRequest, UnitPreview, WordStudyError,
};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_units_handler,
        list_sessions_handler,
        get_session_handler,
        update_session_status_handler,
        delete_session_handler,
        add_word_handler,
        unit_progress_handler,
        submit_answer_handler,
        section_view_handler,
        passage_handler,
        identify_word_handler,
        morphology_handler,
        lookup_word_handler,
        quiz_handler,
        evaluate_handler,
        ask_handler,
        create_insight_handler,
        list_insights_handler,
        update_insight_handler,
        delete_insight_handler,
    ),
    components(
        schemas(
            GenerateUnitsRequest, AddWordPayload, StatusPayload, QuizAnswerPayload,
            SectionViewPayload, IdentifyWordPayload, MorphologyPayload, QuizPayload,
            EvaluatePayload, AskPayload, CreateInsightPayload, UpdateInsightPayload
        )
    ),
    tags(
        (name = "Word Study API", description = "Adaptive Greek word study: passages, training units, quizzes, coaching and insights.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct GenerateUnitsRequest {
    pub passage: String,
    pub store_id: Option<String>,
    pub language: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub config: Option<GenerationConfig>,
}

#[derive(Deserialize, ToSchema)]
pub struct AddWordPayload {
    #[schema(value_type = Object)]
    pub preview: UnitPreview,
    pub word: String,
    pub full_passage: String,
    pub store_id: Option<String>,
    pub language: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct StatusPayload {
    /// `COMPLETED` or `ABANDONED`.
    pub status: String,
}

#[derive(Deserialize, ToSchema)]
pub struct QuizAnswerPayload {
    #[schema(value_type = Object)]
    pub question: QuizQuestion,
    pub user_answer: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SectionViewPayload {
    pub section: String,
}

#[derive(Deserialize, ToSchema)]
pub struct IdentifyWordPayload {
    pub word: String,
    #[serde(default)]
    pub context: String,
    pub store_id: Option<String>,
    pub language: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct MorphologyPayload {
    pub word: String,
    #[serde(default)]
    pub passage: String,
    pub store_id: Option<String>,
    pub language: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct QuizPayload {
    #[schema(value_type = Object)]
    pub unit: TrainingUnit,
    pub count: Option<usize>,
    pub store_id: Option<String>,
    pub language: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct EvaluatePayload {
    #[schema(value_type = Object)]
    pub unit: TrainingUnit,
    pub answer: String,
    pub store_id: Option<String>,
    pub language: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AskPayload {
    pub question: String,
    pub passage: Option<String>,
    pub greek_word: Option<String>,
    /// 0 (unseen) to 3 (mastered).
    pub mastery_level: Option<u8>,
    /// `auto` (default), `socratic`, `direct`, `exploratory` or `didactic`.
    pub strategy: Option<String>,
    pub store_id: Option<String>,
    pub language: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateInsightPayload {
    pub session_id: Uuid,
    pub unit_id: Uuid,
    #[serde(default)]
    pub passage: String,
    #[serde(default)]
    pub greek_word: String,
    #[serde(default)]
    pub title: String,
    pub question: Option<String>,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateInsightPayload {
    pub title: Option<String>,
    pub question: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionQuery {
    /// `ACTIVE`, `COMPLETED` or `ABANDONED`.
    pub status: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub last_days: Option<i64>,
    pub passage: Option<String>,
}

impl SessionQuery {
    fn into_filters(self) -> Result<SessionFilters, Rejection> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                SessionStatus::parse(raw)
                    .ok_or_else(|| Rejection::bad_request(format!("Unknown session status '{}'", raw)))?,
            ),
        };
        Ok(SessionFilters {
            status,
            from: self.from,
            to: self.to,
            last_days: self.last_days,
            passage: self.passage,
        })
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InsightQuery {
    pub passage: Option<String>,
    pub greek_word: Option<String>,
    pub search: Option<String>,
    /// Comma-separated; matches insights sharing at least one tag.
    pub tags: Option<String>,
}

impl From<InsightQuery> for InsightFilters {
    fn from(query: InsightQuery) -> Self {
        InsightFilters {
            passage: query.passage,
            greek_word: query.greek_word,
            search: query.search,
            tags: query
                .tags
                .map(|raw| raw.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PassageQuery {
    pub reference: String,
    pub store_id: Option<String>,
    pub language: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LanguageQuery {
    pub language: Option<String>,
}

//=========================================================================================
// Sessions and Units
//=========================================================================================

/// Build training units for a passage in a new session.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = GenerateUnitsRequest,
    responses(
        (status = 201, description = "Session created with its training units"),
        (status = 400, description = "Missing passage or user"),
        (status = 502, description = "Content generation failed; nothing was stored")
    ),
    params(("x-user-id" = String, Header, description = "The caller's user id."))
)]
pub async fn generate_units_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<GenerateUnitsRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let language = state.language(req.language.as_deref());
    let units = state
        .service
        .generate_training_units(UnitGenerationRequest {
            passage: req.passage,
            store_id: req.store_id,
            user_id,
            config: req.config,
            language: Some(language),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(units)))
}

/// List the caller's sessions, most recently updated first.
#[utoipa::path(
    get,
    path = "/sessions",
    params(SessionQuery, ("x-user-id" = String, Header, description = "The caller's user id.")),
    responses(
        (status = 200, description = "Matching sessions"),
        (status = 400, description = "Invalid filter")
    )
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Query(query): Query<SessionQuery>,
) -> Result<impl IntoResponse, Rejection> {
    let filters = query.into_filters()?;
    let sessions = state.service.get_user_sessions(&user_id, &filters).await?;
    Ok(Json(sessions))
}

#[utoipa::path(
    get,
    path = "/sessions/{session_id}",
    params(
        ("session_id" = Uuid, Path, description = "Session id"),
        ("x-user-id" = String, Header, description = "The caller's user id.")
    ),
    responses(
        (status = 200, description = "The session with its units and responses"),
        (status = 403, description = "Session belongs to another user"),
        (status = 404, description = "No such session")
    )
)]
pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, Rejection> {
    let session = state.service.get_session(session_id, &user_id).await?;
    Ok(Json(session))
}

/// Complete or abandon an active session.
#[utoipa::path(
    put,
    path = "/sessions/{session_id}/status",
    request_body = StatusPayload,
    params(
        ("session_id" = Uuid, Path, description = "Session id"),
        ("x-user-id" = String, Header, description = "The caller's user id.")
    ),
    responses(
        (status = 200, description = "Updated session"),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Session belongs to another user"),
        (status = 404, description = "No such session")
    )
)]
pub async fn update_session_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<StatusPayload>,
) -> Result<impl IntoResponse, Rejection> {
    let status = SessionStatus::parse(&req.status)
        .ok_or_else(|| Rejection::bad_request(format!("Unknown session status '{}'", req.status)))?;
    let session = state
        .service
        .update_session_status(session_id, &user_id, status)
        .await?;
    Ok(Json(session))
}

#[utoipa::path(
    delete,
    path = "/sessions/{session_id}",
    params(
        ("session_id" = Uuid, Path, description = "Session id"),
        ("x-user-id" = String, Header, description = "The caller's user id.")
    ),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 403, description = "Session belongs to another user"),
        (status = 404, description = "No such session")
    )
)]
pub async fn delete_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, Rejection> {
    state.service.delete_session(session_id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Turn a previewed word into a full unit in an existing session.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/units",
    request_body = AddWordPayload,
    params(
        ("session_id" = Uuid, Path, description = "Session id"),
        ("x-user-id" = String, Header, description = "The caller's user id.")
    ),
    responses(
        (status = 201, description = "The new unit"),
        (status = 403, description = "Session belongs to another user"),
        (status = 404, description = "No such session"),
        (status = 502, description = "Content generation failed")
    )
)]
pub async fn add_word_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<AddWordPayload>,
) -> Result<impl IntoResponse, Rejection> {
    state.service.get_session(session_id, &user_id).await?;
    let unit = state
        .service
        .add_passage_word_to_units(AddWordRequest {
            session_id,
            preview: req.preview,
            word: req.word,
            full_passage: req.full_passage,
            store_id: req.store_id,
            language: Some(state.language(req.language.as_deref())),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(unit)))
}

//=========================================================================================
// Progress
//=========================================================================================

#[utoipa::path(
    get,
    path = "/sessions/{session_id}/units/{unit_id}/progress",
    params(
        ("session_id" = Uuid, Path, description = "Session id"),
        ("unit_id" = Uuid, Path, description = "Unit id"),
        ("x-user-id" = String, Header, description = "The caller's user id.")
    ),
    responses((status = 200, description = "Stored progress, or a fresh record"))
)]
pub async fn unit_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path((session_id, unit_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, Rejection> {
    state.service.get_session(session_id, &user_id).await?;
    let progress = state.service.get_unit_progress(session_id, unit_id).await?;
    Ok(Json(progress))
}

/// Grade a quiz answer and update mastery.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/units/{unit_id}/answers",
    request_body = QuizAnswerPayload,
    params(
        ("session_id" = Uuid, Path, description = "Session id"),
        ("unit_id" = Uuid, Path, description = "Unit id"),
        ("x-user-id" = String, Header, description = "The caller's user id.")
    ),
    responses((status = 200, description = "Grading result, updated progress and whether it was stored"))
)]
pub async fn submit_answer_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path((session_id, unit_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<QuizAnswerPayload>,
) -> Result<impl IntoResponse, Rejection> {
    state.service.get_session(session_id, &user_id).await?;
    let current = state.service.get_unit_progress(session_id, unit_id).await?;
    let submission = state
        .service
        .submit_quiz_answer(
            QuizAnswer {
                session_id,
                unit_id,
                question: req.question,
                user_answer: req.user_answer,
            },
            &current,
        )
        .await?;
    Ok(Json(submission))
}

#[utoipa::path(
    post,
    path = "/sessions/{session_id}/units/{unit_id}/views",
    request_body = SectionViewPayload,
    params(
        ("session_id" = Uuid, Path, description = "Session id"),
        ("unit_id" = Uuid, Path, description = "Unit id"),
        ("x-user-id" = String, Header, description = "The caller's user id.")
    ),
    responses((status = 200, description = "Updated progress and whether it was stored"))
)]
pub async fn section_view_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path((session_id, unit_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<SectionViewPayload>,
) -> Result<impl IntoResponse, Rejection> {
    state.service.get_session(session_id, &user_id).await?;
    let current = state.service.get_unit_progress(session_id, unit_id).await?;
    let view = state
        .service
        .track_section_view(session_id, unit_id, &req.section, &current)
        .await?;
    Ok(Json(view))
}

//=========================================================================================
// Content
//=========================================================================================

/// Passage text in Greek and the requested language, cache first.
#[utoipa::path(
    get,
    path = "/passages",
    params(PassageQuery, ("x-user-id" = String, Header, description = "The caller's user id.")),
    responses(
        (status = 200, description = "The passage and how the cache served it"),
        (status = 502, description = "Passage could not be generated")
    )
)]
pub async fn passage_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PassageQuery>,
) -> Result<impl IntoResponse, Rejection> {
    let language = state.language(query.language.as_deref());
    let lookup = state
        .service
        .get_passage_text(&query.reference, query.store_id.as_deref(), Some(&language))
        .await?;
    Ok(Json(lookup))
}

/// Preview a selected word without creating a unit.
#[utoipa::path(
    post,
    path = "/words/identify",
    request_body = IdentifyWordPayload,
    params(("x-user-id" = String, Header, description = "The caller's user id.")),
    responses((status = 200, description = "Word preview"))
)]
pub async fn identify_word_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdentifyWordPayload>,
) -> Result<impl IntoResponse, Rejection> {
    let language = state.language(req.language.as_deref());
    let preview = state
        .service
        .identify_passage_word(&req.word, &req.context, req.store_id.as_deref(), Some(&language))
        .await?;
    Ok(Json(preview))
}

#[utoipa::path(
    post,
    path = "/words/morphology",
    request_body = MorphologyPayload,
    params(("x-user-id" = String, Header, description = "The caller's user id.")),
    responses((status = 200, description = "Morphological breakdown"))
)]
pub async fn morphology_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MorphologyPayload>,
) -> Result<impl IntoResponse, Rejection> {
    let language = state.language(req.language.as_deref());
    let breakdown = state
        .service
        .explain_morphology(&req.word, &req.passage, req.store_id.as_deref(), Some(&language))
        .await?;
    Ok(Json(breakdown))
}

/// Read a gloss from the shared lexical cache.
#[utoipa::path(
    get,
    path = "/words/{lemma}",
    params(
        ("lemma" = String, Path, description = "Dictionary form"),
        LanguageQuery,
        ("x-user-id" = String, Header, description = "The caller's user id.")
    ),
    responses(
        (status = 200, description = "Cached entry"),
        (status = 404, description = "Not cached")
    )
)]
pub async fn lookup_word_handler(
    State(state): State<Arc<AppState>>,
    Path(lemma): Path<String>,
    Query(query): Query<LanguageQuery>,
) -> Result<impl IntoResponse, Rejection> {
    let language = state.language(query.language.as_deref());
    let entry = state
        .service
        .lookup_word(&lemma, Some(&language))
        .await?
        .ok_or_else(|| WordStudyError::NotFound(format!("No cached entry for {}", lemma)))?;
    Ok(Json(entry))
}

//=========================================================================================
// Practice and Coaching
//=========================================================================================

#[utoipa::path(
    post,
    path = "/quizzes",
    request_body = QuizPayload,
    params(("x-user-id" = String, Header, description = "The caller's user id.")),
    responses(
        (status = 200, description = "Quiz questions"),
        (status = 400, description = "Count outside 1..=20")
    )
)]
pub async fn quiz_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QuizPayload>,
) -> Result<impl IntoResponse, Rejection> {
    let language = state.language(req.language.as_deref());
    let questions = state
        .service
        .generate_quiz(&req.unit, req.count, req.store_id.as_deref(), Some(&language))
        .await?;
    Ok(Json(questions))
}

/// Grade a free-form answer about a unit.
#[utoipa::path(
    post,
    path = "/responses",
    request_body = EvaluatePayload,
    params(("x-user-id" = String, Header, description = "The caller's user id.")),
    responses(
        (status = 200, description = "Graded response and where it was stored"),
        (status = 403, description = "Unit's session belongs to another user")
    )
)]
pub async fn evaluate_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<EvaluatePayload>,
) -> Result<impl IntoResponse, Rejection> {
    if let Some(session_id) = req.unit.session_id {
        // A vanished session is reported in the result, not rejected.
        if let Err(e @ WordStudyError::NotOwner { .. }) =
            state.service.get_session(session_id, &user_id).await
        {
            return Err(e.into());
        }
    }
    let language = state.language(req.language.as_deref());
    let evaluated = state
        .service
        .evaluate_user_response(&req.unit, &req.answer, req.store_id.as_deref(), Some(&language))
        .await?;
    Ok(Json(evaluated))
}

/// Ask an open question; the answer is styled by the chosen coaching strategy.
#[utoipa::path(
    post,
    path = "/questions",
    request_body = AskPayload,
    params(("x-user-id" = String, Header, description = "The caller's user id.")),
    responses((status = 200, description = "Answer with the strategy that shaped it"))
)]
pub async fn ask_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskPayload>,
) -> Result<impl IntoResponse, Rejection> {
    let preference = match req.strategy.as_deref() {
        None => StrategyPreference::Auto,
        Some(raw) => StrategyPreference::parse(raw)
            .ok_or_else(|| Rejection::bad_request(format!("Unknown coaching strategy '{}'", raw)))?,
    };
    let mastery_level = match req.mastery_level {
        None => None,
        Some(level) => Some(
            MasteryLevel::from_u8(level)
                .ok_or_else(|| Rejection::bad_request(format!("Mastery level {} is out of range", level)))?,
        ),
    };
    let context = CoachingContext {
        passage: req.passage,
        greek_word: req.greek_word,
        mastery_level,
    };
    let language = state.language(req.language.as_deref());
    let answer = state
        .service
        .ask_question(
            &req.question,
            &context,
            preference,
            req.store_id.as_deref(),
            Some(&language),
        )
        .await?;
    Ok(Json(answer))
}

//=========================================================================================
// Insights
//=========================================================================================

#[utoipa::path(
    post,
    path = "/insights",
    request_body = CreateInsightPayload,
    params(("x-user-id" = String, Header, description = "The caller's user id.")),
    responses(
        (status = 201, description = "Insight created"),
        (status = 400, description = "Missing content")
    )
)]
pub async fn create_insight_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<CreateInsightPayload>,
) -> Result<impl IntoResponse, Rejection> {
    let insight = state
        .service
        .create_insight(NewInsight {
            session_id: req.session_id,
            unit_id: req.unit_id,
            user_id,
            passage: req.passage,
            greek_word: req.greek_word,
            title: req.title,
            question: req.question,
            content: req.content,
            tags: req.tags,
        })
        .await?;
    info!(insight_id = %insight.id, "insight created");
    Ok((StatusCode::CREATED, Json(insight)))
}

#[utoipa::path(
    get,
    path = "/insights",
    params(InsightQuery, ("x-user-id" = String, Header, description = "The caller's user id.")),
    responses((status = 200, description = "Matching insights, newest first"))
)]
pub async fn list_insights_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Query(query): Query<InsightQuery>,
) -> Result<impl IntoResponse, Rejection> {
    let insights = state
        .service
        .get_user_insights(&user_id, &query.into())
        .await?;
    Ok(Json(insights))
}

#[utoipa::path(
    put,
    path = "/insights/{insight_id}",
    request_body = UpdateInsightPayload,
    params(
        ("insight_id" = Uuid, Path, description = "Insight id"),
        ("x-user-id" = String, Header, description = "The caller's user id.")
    ),
    responses(
        (status = 200, description = "Updated insight"),
        (status = 403, description = "Insight belongs to another user"),
        (status = 404, description = "No such insight")
    )
)]
pub async fn update_insight_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(insight_id): Path<Uuid>,
    Json(req): Json<UpdateInsightPayload>,
) -> Result<impl IntoResponse, Rejection> {
    let insight = state
        .service
        .update_insight(
            &user_id,
            insight_id,
            InsightUpdate {
                title: req.title,
                question: req.question,
                content: req.content,
                tags: req.tags,
            },
        )
        .await?;
    Ok(Json(insight))
}

#[utoipa::path(
    delete,
    path = "/insights/{insight_id}",
    params(
        ("insight_id" = Uuid, Path, description = "Insight id"),
        ("x-user-id" = String, Header, description = "The caller's user id.")
    ),
    responses(
        (status = 204, description = "Insight deleted"),
        (status = 403, description = "Insight belongs to another user"),
        (status = 404, description = "No such insight")
    )
)]
pub async fn delete_insight_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Path(insight_id): Path<Uuid>,
) -> Result<impl IntoResponse, Rejection> {
    state.service.delete_insight(&user_id, insight_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
