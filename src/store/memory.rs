// src/store/memory.rs
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::Store;
use crate::models::{Choice, ChoiceTally, NewQuestion, Question, User, UserVote, Vote, VoteOutcome};

#[derive(Default)]
struct Tables {
    questions: BTreeMap<i64, Question>,
    choices: BTreeMap<i64, Choice>,
    votes: Vec<Vote>,
    tokens: HashMap<Uuid, User>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store. Every operation runs under one lock, so the vote
/// upsert cannot interleave with another write.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user and returns the bearer token that identifies them.
    pub async fn add_user(&self, username: &str, is_staff: bool) -> (User, Uuid) {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            is_staff,
        };
        let token = Uuid::new_v4();
        self.tables.lock().await.tokens.insert(token, user.clone());
        (user, token)
    }

    pub async fn votes(&self) -> Vec<Vote> {
        self.tables.lock().await.votes.clone()
    }
}

fn newest_first(a: &Question, b: &Question) -> std::cmp::Ordering {
    b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id))
}

#[async_trait]
impl Store for MemoryStore {
    async fn published_questions(
        &self,
        now: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<Question>, sqlx::Error> {
        let tables = self.tables.lock().await;
        let mut questions: Vec<Question> = tables
            .questions
            .values()
            .filter(|q| q.pub_date <= now)
            .cloned()
            .collect();
        questions.sort_by(newest_first);
        if let Some(limit) = limit {
            questions.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(questions)
    }

    async fn question(&self, id: i64) -> Result<Option<Question>, sqlx::Error> {
        Ok(self.tables.lock().await.questions.get(&id).cloned())
    }

    async fn choices(&self, question_id: i64) -> Result<Vec<ChoiceTally>, sqlx::Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .choices
            .values()
            .filter(|c| c.question_id == question_id)
            .map(|c| ChoiceTally {
                id: c.id,
                question_id: c.question_id,
                choice_text: c.choice_text.clone(),
                votes: tables.votes.iter().filter(|v| v.choice_id == c.id).count() as i64,
            })
            .collect())
    }

    async fn choice_for_question(
        &self,
        question_id: i64,
        choice_id: i64,
    ) -> Result<Option<Choice>, sqlx::Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .choices
            .get(&choice_id)
            .filter(|c| c.question_id == question_id)
            .cloned())
    }

    async fn user_vote(&self, user_id: Uuid, question_id: i64) -> Result<Option<UserVote>, sqlx::Error> {
        let tables = self.tables.lock().await;
        Ok(tables.votes.iter().find_map(|v| {
            let choice = tables.choices.get(&v.choice_id)?;
            (v.user_id == user_id && choice.question_id == question_id).then(|| UserVote {
                id: v.id,
                choice_id: choice.id,
                choice_text: choice.choice_text.clone(),
            })
        }))
    }

    async fn upsert_vote(
        &self,
        user_id: Uuid,
        question_id: i64,
        choice_id: i64,
    ) -> Result<VoteOutcome, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        // same guarantee as the composite foreign key on the votes table
        let belongs = tables
            .choices
            .get(&choice_id)
            .is_some_and(|c| c.question_id == question_id);
        if !belongs {
            return Err(sqlx::Error::RowNotFound);
        }

        if let Some(vote) = tables
            .votes
            .iter_mut()
            .find(|v| v.user_id == user_id && v.question_id == question_id)
        {
            vote.choice_id = choice_id;
            return Ok(VoteOutcome::Updated);
        }

        let id = tables.next_id();
        tables.votes.push(Vote {
            id,
            user_id,
            question_id,
            choice_id,
        });
        Ok(VoteOutcome::Created)
    }

    async fn delete_vote(&self, user_id: Uuid, question_id: i64) -> Result<bool, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        let before = tables.votes.len();
        tables
            .votes
            .retain(|v| !(v.user_id == user_id && v.question_id == question_id));
        Ok(tables.votes.len() < before)
    }

    async fn user_by_token(&self, token: Uuid) -> Result<Option<User>, sqlx::Error> {
        Ok(self.tables.lock().await.tokens.get(&token).cloned())
    }

    async fn all_questions(&self, search: Option<&str>) -> Result<Vec<Question>, sqlx::Error> {
        let needle = search.map(str::to_lowercase);
        let tables = self.tables.lock().await;
        let mut questions: Vec<Question> = tables
            .questions
            .values()
            .filter(|q| match &needle {
                Some(needle) => q.question_text.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        questions.sort_by(newest_first);
        Ok(questions)
    }

    async fn create_question(
        &self,
        new: &NewQuestion,
        pub_date: DateTime<Utc>,
    ) -> Result<(Question, Vec<Choice>), sqlx::Error> {
        let mut tables = self.tables.lock().await;
        let question = Question {
            id: tables.next_id(),
            question_text: new.question_text.clone(),
            pub_date,
            end_date: new.end_date,
        };
        tables.questions.insert(question.id, question.clone());

        let mut choices = Vec::with_capacity(new.choices.len());
        for choice_text in &new.choices {
            let choice = Choice {
                id: tables.next_id(),
                question_id: question.id,
                choice_text: choice_text.clone(),
            };
            tables.choices.insert(choice.id, choice.clone());
            choices.push(choice);
        }
        Ok((question, choices))
    }

    async fn add_choice(&self, question_id: i64, choice_text: &str) -> Result<Choice, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        if !tables.questions.contains_key(&question_id) {
            return Err(sqlx::Error::RowNotFound);
        }
        let choice = Choice {
            id: tables.next_id(),
            question_id,
            choice_text: choice_text.to_string(),
        };
        tables.choices.insert(choice.id, choice.clone());
        Ok(choice)
    }

    async fn delete_question(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        tables.votes.retain(|v| v.question_id != id);
        tables.choices.retain(|_, c| c.question_id != id);
        Ok(tables.questions.remove(&id).is_some())
    }
}
