//! The reactor and connection I/O core: an edge-triggered readiness loop,
//! a nonblocking acceptor, and queued, ordered stream connections.

pub mod acceptor;
pub mod addr;
pub mod conn;
pub mod end_point;
pub mod event_loop;

pub use acceptor::Acceptor;
pub use conn::{Connection, RecvOutcome};
pub use end_point::{Endpoint, Family};
pub use event_loop::EventLoop;
