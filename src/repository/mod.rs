//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking.
//! SQLite is the migration source; PostgreSQL is the destination. The
//! SQLite migrator also implements the import side so the whole pipeline
//! can be exercised against throwaway databases in tests.

pub mod migration;
pub mod migration_postgres;
pub mod migration_sqlite;
pub mod models;
pub mod pool;
pub mod util;

pub use migration::{
    ActiveUser, ConflictPolicy, DatabaseExporter, DatabaseImporter, MigrationReport,
};
pub use migration_postgres::PostgresMigrator;
pub use migration_sqlite::SqliteMigrator;
pub use pool::{DbError, PgPool, SqlitePool};
