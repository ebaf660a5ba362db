//! データベースアクセス層
//!
//! 監視コアが利用する永続化のtraitと、その実装

/// インメモリ実装
pub mod memory;

/// データベースマイグレーション
pub mod migrations;

/// SQLite実装
pub mod sqlite;

/// Repository traitパターン
pub mod traits;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::MonitorStore;
