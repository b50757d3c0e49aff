// Compensa Infrastructure - SQLite Adapter
// Implements: TransactionRepository

mod connection;
mod migration;
mod transaction_repository;

pub use connection::create_pool;
pub use migration::run_migrations;
pub use transaction_repository::SqliteTransactionRepository;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
