//! Weather bot database migration tool.
//!
//! Moves the bot's `users` and `notification_settings` tables from the
//! original SQLite file into PostgreSQL, either directly or via an
//! intermediate JSON snapshot.

pub mod cli;
pub mod repository;
pub mod schema;
pub mod snapshot;
