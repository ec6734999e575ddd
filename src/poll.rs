// src/poll.rs
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::AppError;
use crate::models::{Choice, NewQuestion, Question, User, VoteOutcome, MAX_TEXT_LEN};
use crate::store::Store;

#[derive(Debug)]
pub struct VoteReceipt {
    pub outcome: VoteOutcome,
    pub choice: Choice,
}

impl VoteReceipt {
    pub fn message(&self) -> String {
        match self.outcome {
            VoteOutcome::Created => format!("You have voted for {}", self.choice.choice_text),
            VoteOutcome::Updated => format!("Your vote has updated to {}", self.choice.choice_text),
        }
    }
}

/// Looks a question up among those already published. Unpublished questions
/// are reported as missing.
pub async fn published_question(
    store: &dyn Store,
    question_id: i64,
    now: DateTime<Utc>,
) -> Result<Question, AppError> {
    store
        .question(question_id)
        .await?
        .filter(|q| q.is_published(now))
        .ok_or_else(|| AppError::NotFound(question_id.to_string()))
}

/// Records `user`'s vote for the choice named by the raw `choice` form value,
/// replacing any earlier vote on the same question.
pub async fn submit_vote(
    store: &dyn Store,
    user: &User,
    question_id: i64,
    choice: Option<&str>,
    now: DateTime<Utc>,
) -> Result<VoteReceipt, AppError> {
    let question = store
        .question(question_id)
        .await?
        .ok_or_else(|| AppError::NotFound(question_id.to_string()))?;

    if !question.is_published(now) {
        return Err(AppError::NotPublished);
    }
    if !question.can_vote(now) {
        return Err(AppError::VotingClosed);
    }

    let choice_id = choice
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .ok_or(AppError::InvalidChoice { question_id })?;
    let choice = store
        .choice_for_question(question_id, choice_id)
        .await?
        .ok_or(AppError::InvalidChoice { question_id })?;

    let outcome = store.upsert_vote(user.id, question_id, choice.id).await?;
    info!(
        "{} votes for {} at question {}",
        user.username, choice.choice_text, question_id
    );

    Ok(VoteReceipt { outcome, choice })
}

/// Removes `user`'s vote on the question. Returns whether there was one.
pub async fn reset_vote(store: &dyn Store, user: &User, question_id: i64) -> Result<bool, AppError> {
    if store.question(question_id).await?.is_none() {
        return Err(AppError::NotFound(question_id.to_string()));
    }

    let removed = store.delete_vote(user.id, question_id).await?;
    info!("{} reset votes for question {}", user.username, question_id);
    Ok(removed)
}

fn validate_text(field: &str, text: &str) -> Result<(), AppError> {
    if text.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::Validation(format!(
            "{field} must be at most {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(())
}

/// Checks an operator-submitted question and returns the publish date to
/// store, defaulting to `now`.
pub fn validate_new_question(new: &NewQuestion, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
    validate_text("question_text", &new.question_text)?;
    for choice_text in &new.choices {
        validate_text("choice_text", choice_text)?;
    }

    let pub_date = new.pub_date.unwrap_or(now);
    if let Some(end_date) = new.end_date {
        if end_date < pub_date {
            return Err(AppError::Validation(
                "end_date must not be earlier than pub_date".to_string(),
            ));
        }
    }
    Ok(pub_date)
}

pub fn validate_choice_text(choice_text: &str) -> Result<(), AppError> {
    validate_text("choice_text", choice_text)
}
