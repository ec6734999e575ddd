// models.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_TEXT_LEN: usize = 200;

/// A poll prompt with a visibility window.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Question {
    /// True once `now` has reached the publish date.
    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        now >= self.pub_date
    }

    /// Voting is open from `pub_date` through `end_date` inclusive, or
    /// indefinitely when no end date is set.
    pub fn can_vote(&self, now: DateTime<Utc>) -> bool {
        match self.end_date {
            None => self.pub_date <= now,
            Some(end_date) => self.pub_date <= now && now <= end_date,
        }
    }

    /// Published within the last day. A publish date in the future counts
    /// as not recent.
    pub fn was_published_recently(&self, now: DateTime<Utc>) -> bool {
        now - Duration::days(1) <= self.pub_date && self.pub_date <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
}

/// A choice together with the number of votes pointing at it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, PartialEq)]
pub struct ChoiceTally {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
    pub votes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Vote {
    pub id: i64,
    pub user_id: Uuid,
    pub question_id: i64,
    pub choice_id: i64,
}

/// A vote joined with the text of the choice it points at.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, PartialEq)]
pub struct UserVote {
    pub id: i64,
    pub choice_id: i64,
    pub choice_text: String,
}

/// Identity handed to us by the auth collaborator.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub is_staff: bool,
}

/// Whether an upsert created a vote or moved an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Created,
    Updated,
}

#[derive(Debug, Deserialize)]
pub struct VoteForm {
    pub choice: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub question_text: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub choices: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewChoice {
    pub choice_text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminQuery {
    pub search: Option<String>,
}
