//! Command implementations, grouped the way the wire protocol groups
//! them: connection-management, generic key-management, and string
//! commands. Each module exposes a `register` function that installs its
//! handlers into an `Instance`'s command registry.

pub mod connection;
pub mod generic;
pub mod string;

use bytes::Bytes;

use crate::db::{Instance, Reply};
use crate::resp::Piece;

pub fn register_all(inst: &mut Instance) {
    connection::register(inst);
    generic::register(inst);
    string::register(inst);
}

fn wrong_args(cmd: &str) -> Reply {
    Reply::new(Piece::error(format!(
        "wrong number of arguments for '{cmd}' command"
    )))
}

fn wrongtype() -> Reply {
    Reply::new(Piece::error(
        "WRONGTYPE Operation against a key holding the wrong kind of value",
    ))
}

fn not_integer() -> Reply {
    Reply::new(Piece::error("value is not an integer or out of range"))
}

fn unknown_subcommand(parent: &str, sub: &Bytes) -> Reply {
    Reply::new(Piece::error(format!(
        "unknown subcommand '{}'. Try {} HELP.",
        String::from_utf8_lossy(sub),
        parent.to_ascii_uppercase()
    )))
}

fn lower(bytes: &Bytes) -> String {
    String::from_utf8_lossy(bytes).to_ascii_lowercase()
}

/// Parse a command argument as a signed 64-bit decimal. Used for things
/// like `SELECT`'s index or `INCRBY`'s delta, where Redis accepts the
/// ordinary `strtoll` grammar rather than the narrower canonical-decimal
/// grammar `Object::new_string` requires before choosing `Int` encoding.
fn parse_i64(bytes: &Bytes) -> Option<i64> {
    atoi::atoi::<i64>(bytes)
}
