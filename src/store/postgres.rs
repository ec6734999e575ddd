// src/store/postgres.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::Store;
use crate::models::{Choice, ChoiceTally, NewQuestion, Question, User, UserVote, VoteOutcome};

/// Makes `%`, `_` and `\` match literally inside an `ILIKE ... ESCAPE '\'`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn published_questions(
        &self,
        now: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<Question>, sqlx::Error> {
        // LIMIT NULL is no limit in Postgres
        sqlx::query_as::<_, Question>(
            r#"
            SELECT id, question_text, pub_date, end_date
            FROM questions
            WHERE pub_date <= $1
            ORDER BY pub_date DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn question(&self, id: i64) -> Result<Option<Question>, sqlx::Error> {
        sqlx::query_as::<_, Question>(
            "SELECT id, question_text, pub_date, end_date FROM questions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn choices(&self, question_id: i64) -> Result<Vec<ChoiceTally>, sqlx::Error> {
        sqlx::query_as::<_, ChoiceTally>(
            r#"
            SELECT c.id, c.question_id, c.choice_text, COUNT(v.id) AS votes
            FROM choices c
            LEFT JOIN votes v ON v.choice_id = c.id
            WHERE c.question_id = $1
            GROUP BY c.id
            ORDER BY c.id
            "#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn choice_for_question(
        &self,
        question_id: i64,
        choice_id: i64,
    ) -> Result<Option<Choice>, sqlx::Error> {
        sqlx::query_as::<_, Choice>(
            "SELECT id, question_id, choice_text FROM choices WHERE id = $1 AND question_id = $2",
        )
        .bind(choice_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn user_vote(&self, user_id: Uuid, question_id: i64) -> Result<Option<UserVote>, sqlx::Error> {
        sqlx::query_as::<_, UserVote>(
            r#"
            SELECT v.id, v.choice_id, c.choice_text
            FROM votes v
            JOIN choices c ON c.id = v.choice_id
            WHERE v.user_id = $1 AND c.question_id = $2
            "#,
        )
        .bind(user_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn upsert_vote(
        &self,
        user_id: Uuid,
        question_id: i64,
        choice_id: i64,
    ) -> Result<VoteOutcome, sqlx::Error> {
        // xmax is 0 only for a freshly inserted row
        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO votes (user_id, question_id, choice_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, question_id) DO UPDATE
            SET choice_id = EXCLUDED.choice_id
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(user_id)
        .bind(question_id)
        .bind(choice_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(if inserted {
            VoteOutcome::Created
        } else {
            VoteOutcome::Updated
        })
    }

    async fn delete_vote(&self, user_id: Uuid, question_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM votes WHERE user_id = $1 AND question_id = $2")
            .bind(user_id)
            .bind(question_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn user_by_token(&self, token: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT id, username, is_staff FROM users WHERE api_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
    }

    async fn all_questions(&self, search: Option<&str>) -> Result<Vec<Question>, sqlx::Error> {
        sqlx::query_as::<_, Question>(
            r#"
            SELECT id, question_text, pub_date, end_date
            FROM questions
            WHERE $1::TEXT IS NULL OR question_text ILIKE '%' || $1 || '%' ESCAPE '\'
            ORDER BY pub_date DESC, id DESC
            "#,
        )
        .bind(search.map(escape_like))
        .fetch_all(&self.pool)
        .await
    }

    async fn create_question(
        &self,
        new: &NewQuestion,
        pub_date: DateTime<Utc>,
    ) -> Result<(Question, Vec<Choice>), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (question_text, pub_date, end_date)
            VALUES ($1, $2, $3)
            RETURNING id, question_text, pub_date, end_date
            "#,
        )
        .bind(&new.question_text)
        .bind(pub_date)
        .bind(new.end_date)
        .fetch_one(&mut *tx)
        .await?;

        let mut choices = Vec::with_capacity(new.choices.len());
        for choice_text in &new.choices {
            let choice = sqlx::query_as::<_, Choice>(
                "INSERT INTO choices (question_id, choice_text) VALUES ($1, $2) RETURNING id, question_id, choice_text",
            )
            .bind(question.id)
            .bind(choice_text)
            .fetch_one(&mut *tx)
            .await?;
            choices.push(choice);
        }

        tx.commit().await?;
        Ok((question, choices))
    }

    async fn add_choice(&self, question_id: i64, choice_text: &str) -> Result<Choice, sqlx::Error> {
        sqlx::query_as::<_, Choice>(
            "INSERT INTO choices (question_id, choice_text) VALUES ($1, $2) RETURNING id, question_id, choice_text",
        )
        .bind(question_id)
        .bind(choice_text)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_question(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM votes WHERE question_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM choices WHERE question_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("colour"), "colour");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("snake_case"), "snake\\_case");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
    }
}
