//! The process-wide instance: the array of keyspaces, the current-database
//! pointer, the command registry, and the dispatch pipeline from a parsed
//! `Request` to a `Reply`.

use std::collections::HashMap;

use bytes::Bytes;

use crate::resp::{Piece, Request};

use super::db::Database;

pub const DEFAULT_DB_COUNT: usize = 16;

/// Per-request context a command handler needs beyond the keyspace itself:
/// which session issued the request, and a handle onto that session's
/// mutable identity (currently just its optional name, set by `CLIENT
/// SETNAME`). Spec's process-wide `id -> Session` map exists for exactly
/// this kind of back-reference; for the command surface implemented here,
/// borrowing the fields directly is simpler than routing through the map.
pub struct Ctx<'a> {
    pub session_id: u64,
    pub client_name: &'a mut Option<Bytes>,
}

/// The result of running a command: the reply to send, and whether the
/// connection should be closed once it has been sent (set only by `QUIT`).
pub struct Reply {
    pub piece: Piece,
    pub close_after_send: bool,
}

impl Reply {
    pub fn new(piece: Piece) -> Reply {
        Reply {
            piece,
            close_after_send: false,
        }
    }

    pub fn close(piece: Piece) -> Reply {
        Reply {
            piece,
            close_after_send: true,
        }
    }
}

pub type CommandHandler = fn(&mut Instance, &mut Ctx, &[Bytes]) -> Reply;

/// Process-wide singleton: the array of keyspaces, the current-database
/// pointer, and the command registry. `current_db` lives here rather than
/// on the Session because the server is single-threaded and processes one
/// request at a time — there is never more than one session's command in
/// flight, so a single field suffices (see spec's multi-database note).
pub struct Instance {
    databases: Vec<Database>,
    current_db: usize,
    commands: HashMap<String, CommandHandler>,
}

impl Instance {
    pub fn new(db_count: usize) -> Instance {
        let db_count = db_count.max(1);
        Instance {
            databases: (0..db_count).map(|_| Database::new()).collect(),
            current_db: 0,
            commands: HashMap::new(),
        }
    }

    /// Register a handler for a lowercase command name. A second
    /// registration of the same name is a programming error: it's logged
    /// and discarded rather than overwriting the first.
    pub fn register(&mut self, name: &str, handler: CommandHandler) {
        let name = name.to_ascii_lowercase();
        if self.commands.contains_key(&name) {
            tracing::warn!(command = %name, "duplicate command registration ignored");
            return;
        }
        self.commands.insert(name, handler);
    }

    pub fn db_count(&self) -> usize {
        self.databases.len()
    }

    pub fn current_db_index(&self) -> usize {
        self.current_db
    }

    /// `SELECT`'s effect: change which keyspace subsequent commands see.
    /// Returns `false` if `index` is out of range, leaving the current
    /// selection untouched.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.databases.len() {
            return false;
        }
        self.current_db = index;
        true
    }

    pub fn current_db(&mut self) -> &mut Database {
        &mut self.databases[self.current_db]
    }

    pub fn db(&mut self, index: usize) -> Option<&mut Database> {
        self.databases.get_mut(index)
    }

    /// Parse, look up, and run one request. An empty request or an unknown
    /// command name produces a RESP error reply rather than a connection
    /// failure — the parser already rejected anything structurally
    /// malformed before dispatch is reached.
    pub fn dispatch(&mut self, req: &Request, ctx: &mut Ctx) -> Reply {
        if req.is_empty() {
            return Reply::new(Piece::error("empty command"));
        }
        let name = String::from_utf8_lossy(req.command_name().unwrap()).to_ascii_lowercase();
        match self.commands.get(&name) {
            Some(handler) => {
                let handler = *handler;
                handler(self, ctx, req.args())
            }
            None => Reply::new(Piece::error(unknown_command_message(&name, req.args()))),
        }
    }
}

fn unknown_command_message(name: &str, args: &[Bytes]) -> String {
    let mut preview = String::new();
    for a in args.iter().take(20) {
        preview.push_str(&format!(" '{}'", String::from_utf8_lossy(a)));
    }
    format!("unknown command '{name}', with args beginning with:{preview}")
}
