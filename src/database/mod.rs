/*!
 * SQLite persistence backing the local job queue.
 *
 * - `connection`: thread-safe connection with async access helpers
 * - `schema`: queue and dead-letter tables with versioned migrations
 */

pub mod connection;
pub mod schema;

pub use connection::DatabaseConnection;
