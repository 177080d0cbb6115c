//! Process-wide `id -> Session` registry (spec §4.7 "Lifetime").
//!
//! Command handlers never reach into this map directly — they see only
//! the session id and a borrow of their own session's mutable fields via
//! `Ctx` — but it's what lets the acceptor and the event loop account for
//! how many clients are connected, and is the natural place a future
//! `CLIENT LIST`/`CLIENT KILL` would be grounded.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::session::Session;

#[derive(Default)]
pub struct ClientRegistry {
    sessions: HashMap<u64, Rc<RefCell<Session>>>,
    next_id: u64,
}

impl ClientRegistry {
    pub fn new() -> ClientRegistry {
        ClientRegistry {
            sessions: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn reserve_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, session: Rc<RefCell<Session>>) {
        let id = session.borrow().id();
        self.sessions.insert(id, session);
    }

    pub fn remove(&mut self, id: u64) -> Option<Rc<RefCell<Session>>> {
        self.sessions.remove(&id)
    }

    pub fn get(&self, id: u64) -> Option<Rc<RefCell<Session>>> {
        self.sessions.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::end_point::{Endpoint, Family};
    use crate::net::Connection;
    use mio::net::TcpStream as MioStream;
    use std::net::TcpListener as StdListener;

    fn fake_conn() -> Connection {
        let listener = StdListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        client.set_nonblocking(true).unwrap();
        let ep = Endpoint::new(Family::Ipv4, "127.0.0.1", addr.port());
        Connection::from_stream(MioStream::from_std(client), ep)
    }

    #[test]
    fn insert_then_remove_round_trips() {
        let mut registry = ClientRegistry::new();
        let id = registry.reserve_id();
        let session = Rc::new(RefCell::new(Session::new_for_test(id, fake_conn())));
        registry.insert(session);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(id).is_some());
        registry.remove(id);
        assert!(registry.is_empty());
    }
}
