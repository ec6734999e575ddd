//! `PgStore` against a live Postgres.
//!
//! Set `TEST_DATABASE_URL` to run these; without it every test returns early.
//! Each test works in a schema of its own, dropped at the end.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rstest::*;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use polls_backend::{
    db,
    models::{Choice, NewQuestion, Question, VoteOutcome},
    store::{PgStore, Store},
};

struct PgFixture {
    store: PgStore,
    pool: PgPool,
    admin: PgPool,
    schema: String,
}

impl PgFixture {
    async fn user(&self, username: &str) -> (Uuid, Uuid) {
        let (id, token) = (Uuid::new_v4(), Uuid::new_v4());
        sqlx::query("INSERT INTO users (id, username, is_staff, api_token) VALUES ($1, $2, FALSE, $3)")
            .bind(id)
            .bind(username)
            .bind(token)
            .execute(&self.pool)
            .await
            .expect("Failed to insert user");
        (id, token)
    }

    async fn question(&self, text: &str, days: i64, choices: &[&str]) -> (Question, Vec<Choice>) {
        let new = NewQuestion {
            question_text: text.to_string(),
            pub_date: None,
            end_date: None,
            choices: choices.iter().map(|c| c.to_string()).collect(),
        };
        self.store
            .create_question(&new, Utc::now() + Duration::days(days))
            .await
            .expect("Failed to create question")
    }

    async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count rows")
    }

    async fn drop_schema(self) {
        self.pool.close().await;
        sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .execute(&self.admin)
            .await
            .expect("Failed to drop test schema");
    }
}

/// Fixture: a fresh schema with the poll tables, or `None` when no database is configured
#[fixture]
async fn pg() -> Option<PgFixture> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping Postgres store test");
        return None;
    };

    let admin = PgPool::connect(&url).await.expect("Failed to connect to Postgres");
    let schema = format!("polls_test_{}", Uuid::new_v4().simple());
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&admin)
        .await
        .expect("Failed to create test schema");

    let search_path = schema.clone();
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .after_connect(move |conn, _meta| {
            let statement = format!("SET search_path TO {search_path}");
            Box::pin(async move {
                sqlx::query(&statement).execute(conn).await?;
                Ok(())
            })
        })
        .connect(&url)
        .await
        .expect("Failed to connect to Postgres");
    db::ensure_schema(&pool).await.expect("Failed to create tables");

    Some(PgFixture {
        store: PgStore::new(pool.clone()),
        pool,
        admin,
        schema,
    })
}

#[rstest]
#[tokio::test]
async fn test_revote_updates_single_row(#[future] pg: Option<PgFixture>) {
    let Some(pg) = pg.await else { return };
    let (user_id, _) = pg.user("voter").await;
    let (question, choices) = pg.question("Pick one", -1, &["A", "B", "C"]).await;

    let first = pg.store.upsert_vote(user_id, question.id, choices[0].id).await.unwrap();
    let second = pg.store.upsert_vote(user_id, question.id, choices[1].id).await.unwrap();
    assert_eq!(first, VoteOutcome::Created);
    assert_eq!(second, VoteOutcome::Updated);
    assert_eq!(pg.count("votes").await, 1);

    let vote = pg.store.user_vote(user_id, question.id).await.unwrap().unwrap();
    assert_eq!(vote.choice_id, choices[1].id);
    assert_eq!(vote.choice_text, "B");

    let tallies: Vec<i64> = pg
        .store
        .choices(question.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.votes)
        .collect();
    assert_eq!(tallies, [0, 1, 0]);

    pg.drop_schema().await;
}

#[rstest]
#[tokio::test]
async fn test_concurrent_upserts_leave_one_row(#[future] pg: Option<PgFixture>) {
    let Some(pg) = pg.await else { return };
    let (user_id, _) = pg.user("voter").await;
    let (question, choices) = pg.question("Pick one", -1, &["A", "B"]).await;

    let store = Arc::new(pg.store.clone());
    let question_id = question.id;
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = store.clone();
            let choice_id = choices[i % 2].id;
            tokio::spawn(async move { store.upsert_vote(user_id, question_id, choice_id).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() == VoteOutcome::Created {
            created += 1;
        }
    }
    assert_eq!(created, 1);
    assert_eq!(pg.count("votes").await, 1);

    pg.drop_schema().await;
}

#[rstest]
#[tokio::test]
async fn test_reset_missing_vote(#[future] pg: Option<PgFixture>) {
    let Some(pg) = pg.await else { return };
    let (user_id, _) = pg.user("voter").await;
    let (question, choices) = pg.question("Pick one", -1, &["A"]).await;

    assert!(!pg.store.delete_vote(user_id, question.id).await.unwrap());
    assert_eq!(pg.count("votes").await, 0);

    pg.store.upsert_vote(user_id, question.id, choices[0].id).await.unwrap();
    assert!(pg.store.delete_vote(user_id, question.id).await.unwrap());
    assert!(!pg.store.delete_vote(user_id, question.id).await.unwrap());
    assert_eq!(pg.count("votes").await, 0);

    pg.drop_schema().await;
}

#[rstest]
#[tokio::test]
async fn test_foreign_choice_is_rejected(#[future] pg: Option<PgFixture>) {
    let Some(pg) = pg.await else { return };
    let (user_id, _) = pg.user("voter").await;
    let (question, _) = pg.question("Pick one", -1, &["A"]).await;
    let (_, other_choices) = pg.question("Elsewhere", -1, &["B"]).await;

    let result = pg.store.upsert_vote(user_id, question.id, other_choices[0].id).await;
    assert!(result.is_err());
    assert_eq!(pg.count("votes").await, 0);

    pg.drop_schema().await;
}

#[rstest]
#[tokio::test]
async fn test_delete_question_removes_dependents(#[future] pg: Option<PgFixture>) {
    let Some(pg) = pg.await else { return };
    let (user_id, _) = pg.user("voter").await;
    let (doomed, doomed_choices) = pg.question("Doomed", -1, &["A", "B"]).await;
    let (kept, kept_choices) = pg.question("Survivor", -1, &["C"]).await;
    pg.store.upsert_vote(user_id, doomed.id, doomed_choices[0].id).await.unwrap();
    pg.store.upsert_vote(user_id, kept.id, kept_choices[0].id).await.unwrap();

    assert!(pg.store.delete_question(doomed.id).await.unwrap());
    assert!(!pg.store.delete_question(doomed.id).await.unwrap());

    assert!(pg.store.question(doomed.id).await.unwrap().is_none());
    assert_eq!(pg.count("choices").await, 1);
    assert_eq!(pg.count("votes").await, 1);
    assert!(pg.store.user_vote(user_id, kept.id).await.unwrap().is_some());

    pg.drop_schema().await;
}

#[rstest]
#[tokio::test]
async fn test_published_questions_limit(#[future] pg: Option<PgFixture>) {
    let Some(pg) = pg.await else { return };
    for days in 1..=7 {
        pg.question(&format!("Question {days}"), -days, &[]).await;
    }
    pg.question("Future", 3, &[]).await;
    let now = Utc::now();

    let all = pg.store.published_questions(now, None).await.unwrap();
    assert_eq!(all.len(), 7);
    assert_eq!(all[0].question_text, "Question 1");
    assert!(all.windows(2).all(|w| w[0].pub_date >= w[1].pub_date));

    let capped = pg.store.published_questions(now, Some(5)).await.unwrap();
    assert_eq!(capped.len(), 5);

    pg.drop_schema().await;
}

#[rstest]
#[tokio::test]
async fn test_search_matches_wildcards_literally(#[future] pg: Option<PgFixture>) {
    let Some(pg) = pg.await else { return };
    pg.question("snake_case or camelCase?", -1, &[]).await;
    pg.question("Favourite Colour?", -1, &[]).await;
    pg.question("100% sure?", -1, &[]).await;

    let found = pg.store.all_questions(Some("_")).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].question_text, "snake_case or camelCase?");

    let found = pg.store.all_questions(Some("%")).await.unwrap();
    assert_eq!(found.len(), 1);

    let found = pg.store.all_questions(Some("COLOUR")).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(pg.store.all_questions(None).await.unwrap().len(), 3);

    pg.drop_schema().await;
}

#[rstest]
#[tokio::test]
async fn test_user_by_token(#[future] pg: Option<PgFixture>) {
    let Some(pg) = pg.await else { return };
    let (user_id, token) = pg.user("voter").await;

    let user = pg.store.user_by_token(token).await.unwrap().unwrap();
    assert_eq!(user.id, user_id);
    assert!(!user.is_staff);
    assert!(pg.store.user_by_token(Uuid::new_v4()).await.unwrap().is_none());

    pg.drop_schema().await;
}
