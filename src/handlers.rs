// handlers.rs
use axum::{
    extract::{rejection::FormRejection, FromRequestParts, Path, Query, State},
    response::{IntoResponse, Response},
    Form, Json,
};
use chrono::{DateTime, Utc};
use http::{request::Parts, StatusCode};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::auth::{CurrentUser, RequireStaff, RequireUser};
use crate::error::{redirect_with, results_path, AppError, Level, INDEX_PATH};
use crate::models::{AdminQuery, ChoiceTally, NewChoice, NewQuestion, Question, VoteForm};
use crate::poll;
use crate::state::AppState;

/// The `{question_id}` path segment of the public poll routes. Anything that
/// is not an `i64` is reported as a missing question.
pub struct QuestionId(pub i64);

impl<S: Send + Sync> FromRequestParts<S> for QuestionId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound(parts.uri.path().to_string()))?;
        raw.parse().map(QuestionId).map_err(|_| AppError::NotFound(raw))
    }
}

/// A question plus its eligibility flags at the time of the request.
#[derive(Debug, Serialize)]
pub struct QuestionView {
    #[serde(flatten)]
    pub question: Question,
    pub is_published: bool,
    pub can_vote: bool,
    pub was_published_recently: bool,
}

impl QuestionView {
    fn new(question: Question, now: DateTime<Utc>) -> Self {
        Self {
            is_published: question.is_published(now),
            can_vote: question.can_vote(now),
            was_published_recently: question.was_published_recently(now),
            question,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChoiceView {
    id: i64,
    choice_text: String,
}

impl From<ChoiceTally> for ChoiceView {
    fn from(tally: ChoiceTally) -> Self {
        Self {
            id: tally.id,
            choice_text: tally.choice_text,
        }
    }
}

pub async fn root() -> Response {
    redirect_with(INDEX_PATH, Level::Info, "Redirecting to polls")
}

/// Published questions, newest first
pub async fn index(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let now = Utc::now();
    let questions = state
        .store
        .published_questions(now, state.config.index_limit)
        .await?;

    let latest_question_list: Vec<QuestionView> = questions
        .into_iter()
        .map(|q| QuestionView::new(q, now))
        .collect();

    Ok(Json(json!({ "latest_question_list": latest_question_list })))
}

/// A published question with its choices and, for a signed-in caller, their
/// current vote.
pub async fn detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QuestionId(question_id): QuestionId,
) -> Result<Json<serde_json::Value>, AppError> {
    let now = Utc::now();
    let question = poll::published_question(state.store.as_ref(), question_id, now).await?;
    let choices: Vec<ChoiceView> = state
        .store
        .choices(question_id)
        .await?
        .into_iter()
        .map(ChoiceView::from)
        .collect();

    let (user_vote, message) = match &user {
        Some(user) => {
            let vote = state.store.user_vote(user.id, question_id).await?;
            let message = vote
                .as_ref()
                .map(|v| format!("Previously {} voted for {}", user.username, v.choice_text));
            (vote, message)
        }
        None => (None, None),
    };

    Ok(Json(json!({
        "question": QuestionView::new(question, now),
        "choices": choices,
        "user_vote": user_vote,
        "message": message,
    })))
}

pub async fn results(
    State(state): State<AppState>,
    QuestionId(question_id): QuestionId,
) -> Result<Json<serde_json::Value>, AppError> {
    let now = Utc::now();
    let question = poll::published_question(state.store.as_ref(), question_id, now).await?;
    let choices = state.store.choices(question_id).await?;
    let total_votes: i64 = choices.iter().map(|c| c.votes).sum();

    Ok(Json(json!({
        "question": QuestionView::new(question, now),
        "choices": choices,
        "total_votes": total_votes,
    })))
}

/// Cast or change the caller's vote, then go to the results page
pub async fn vote(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    QuestionId(question_id): QuestionId,
    form: Result<Form<VoteForm>, FormRejection>,
) -> Result<Response, AppError> {
    let choice = match &form {
        Ok(Form(VoteForm { choice })) => choice.as_deref(),
        Err(_) => None,
    };

    let receipt = poll::submit_vote(state.store.as_ref(), &user, question_id, choice, Utc::now()).await?;
    Ok(redirect_with(&results_path(question_id), Level::Success, receipt.message()))
}

pub async fn reset(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    QuestionId(question_id): QuestionId,
) -> Result<Response, AppError> {
    let message = if poll::reset_vote(state.store.as_ref(), &user, question_id).await? {
        "You have reset your vote"
    } else {
        "No vote reset required"
    };
    Ok(redirect_with(&results_path(question_id), Level::Success, message))
}

/// All questions for operators, with an optional text search
pub async fn admin_questions(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Query(query): Query<AdminQuery>,
) -> Result<Json<Vec<QuestionView>>, AppError> {
    let now = Utc::now();
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let questions = state.store.all_questions(search).await?;
    Ok(Json(
        questions.into_iter().map(|q| QuestionView::new(q, now)).collect(),
    ))
}

pub async fn create_question(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Json(new): Json<NewQuestion>,
) -> Result<Response, AppError> {
    let pub_date = poll::validate_new_question(&new, Utc::now())?;
    let (question, choices) = state.store.create_question(&new, pub_date).await?;
    info!(
        "{} created question {} with {} choices",
        staff.username,
        question.id,
        choices.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "question": question, "choices": choices })),
    )
        .into_response())
}

pub async fn add_choice(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(question_id): Path<i64>,
    Json(new): Json<NewChoice>,
) -> Result<Response, AppError> {
    poll::validate_choice_text(&new.choice_text)?;
    if state.store.question(question_id).await?.is_none() {
        return Err(AppError::NoSuchQuestion(question_id));
    }

    let choice = state.store.add_choice(question_id, &new.choice_text).await?;
    info!("{} added choice {} to question {}", staff.username, choice.id, question_id);
    Ok((StatusCode::CREATED, Json(choice)).into_response())
}

pub async fn delete_question(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(question_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_question(question_id).await? {
        return Err(AppError::NoSuchQuestion(question_id));
    }
    info!("{} deleted question {}", staff.username, question_id);
    Ok(StatusCode::NO_CONTENT)
}
