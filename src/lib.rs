//! Polling backend: published questions, one vote per user per question, and
//! results.
//!
//! The HTTP surface lives in [`routes`] and [`handlers`]; the voting rules in
//! [`poll`] and on [`models::Question`]; persistence behind [`store::Store`].

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod poll;
pub mod routes;
pub mod state;
pub mod store;
