// src/db.rs
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tracing::info;

// No ON DELETE CASCADE; PgStore::delete_question removes votes and choices itself.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        is_staff BOOLEAN NOT NULL DEFAULT FALSE,
        api_token UUID NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS questions (
        id BIGSERIAL PRIMARY KEY,
        question_text VARCHAR(200) NOT NULL,
        pub_date TIMESTAMPTZ NOT NULL DEFAULT now(),
        end_date TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS choices (
        id BIGSERIAL PRIMARY KEY,
        question_id BIGINT NOT NULL REFERENCES questions (id),
        choice_text VARCHAR(200) NOT NULL,
        UNIQUE (id, question_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS votes (
        id BIGSERIAL PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users (id),
        question_id BIGINT NOT NULL,
        choice_id BIGINT NOT NULL,
        UNIQUE (user_id, question_id),
        FOREIGN KEY (choice_id, question_id) REFERENCES choices (id, question_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS questions_pub_date_idx ON questions (pub_date DESC)",
    "CREATE INDEX IF NOT EXISTS votes_choice_idx ON votes (choice_id)",
];

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<Pool<Postgres>, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Creates the poll tables if they are missing.
pub async fn ensure_schema(pool: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema ready");
    Ok(())
}
