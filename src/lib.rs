//! A minimal, single-threaded, event-driven key-value store that speaks
//! the RESP wire protocol over TCP.
//!
//! # Layout
//!
//! - [`net`]: the reactor (`EventLoop`), the listening socket (`Acceptor`),
//!   and the connection abstraction (`Connection`) — edge-triggered,
//!   callback-driven, built directly on `mio`.
//! - [`resp`]: the RESP codec — an incremental request parser and the
//!   reply-side `Piece` serializer.
//! - [`db`]: the keyspace engine — the typed `Object` model with TTL, the
//!   per-database `Database`, and the `Instance` command registry/dispatch.
//! - [`cmd`]: the command implementations themselves, grouped by family.
//! - [`server`]: per-connection `Session` glue and the top-level `Server`
//!   that binds configured endpoints and runs the event loop.
//! - [`config`]: the JSON startup configuration.

pub mod cmd;
pub mod config;
pub mod db;
pub mod net;
pub mod resp;
pub mod server;

pub use config::Config;
pub use db::Instance;
pub use server::Server;

/// The port a bare `server` config entry binds when `port` is omitted.
pub const DEFAULT_PORT: u16 = 6379;

/// The error type most fallible functions in this crate return. A boxed
/// trait object is enough here: the places that need a precise, matchable
/// error carry their own type instead (`resp::ParseError`,
/// `config::ConfigError`).
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A `Result` alias for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
