//! The keyspace engine: typed objects with TTL, per-database keyspaces,
//! and the command registry/dispatch pipeline. See spec §4.5–4.6.

pub mod db;
pub mod inst;
pub mod object;

pub use db::Database;
pub use inst::{Ctx, Instance, Reply, DEFAULT_DB_COUNT};
pub use object::{now_ms, Encoding, ObjType, Object};
