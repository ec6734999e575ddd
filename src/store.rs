// src/store.rs
//! Storage seam for questions, choices and votes.
//!
//! Handlers only talk to [`Store`]. [`PgStore`] is the production backend;
//! [`MemoryStore`] keeps everything in process and is used when no database
//! is configured and by the test suite.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Choice, ChoiceTally, NewQuestion, Question, User, UserVote, VoteOutcome};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Questions with `pub_date <= now`, newest first, at most `limit` of them.
    async fn published_questions(
        &self,
        now: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<Question>, sqlx::Error>;

    async fn question(&self, id: i64) -> Result<Option<Question>, sqlx::Error>;

    /// Choices of a question in creation order, each with its vote count.
    async fn choices(&self, question_id: i64) -> Result<Vec<ChoiceTally>, sqlx::Error>;

    async fn choice_for_question(
        &self,
        question_id: i64,
        choice_id: i64,
    ) -> Result<Option<Choice>, sqlx::Error>;

    /// The user's vote on a question, found through the vote's choice.
    async fn user_vote(&self, user_id: Uuid, question_id: i64) -> Result<Option<UserVote>, sqlx::Error>;

    /// Points the user's vote for `question_id` at `choice_id`, creating it if
    /// needed. Never leaves two votes for one (user, question).
    async fn upsert_vote(
        &self,
        user_id: Uuid,
        question_id: i64,
        choice_id: i64,
    ) -> Result<VoteOutcome, sqlx::Error>;

    /// Returns whether a vote was removed.
    async fn delete_vote(&self, user_id: Uuid, question_id: i64) -> Result<bool, sqlx::Error>;

    async fn user_by_token(&self, token: Uuid) -> Result<Option<User>, sqlx::Error>;

    /// Every question regardless of dates, newest first, optionally filtered
    /// by a case-insensitive substring of its text.
    async fn all_questions(&self, search: Option<&str>) -> Result<Vec<Question>, sqlx::Error>;

    /// Inserts the question and its choices together.
    async fn create_question(
        &self,
        new: &NewQuestion,
        pub_date: DateTime<Utc>,
    ) -> Result<(Question, Vec<Choice>), sqlx::Error>;

    async fn add_choice(&self, question_id: i64, choice_text: &str) -> Result<Choice, sqlx::Error>;

    /// Removes the question with its votes and choices. Returns whether the
    /// question existed.
    async fn delete_question(&self, id: i64) -> Result<bool, sqlx::Error>;
}
