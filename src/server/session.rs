//! One Session binds a Connection to a parser instance and a client
//! identity: read, parse, dispatch, reply, loop. See spec §4.7.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};

use crate::db::{Ctx, Instance};
use crate::net::{Connection, EventLoop, RecvOutcome};
use crate::resp::{Piece, RequestParser};

use super::client::ClientRegistry;

/// Matches spec §4.7's fixed-size receive slice.
const RECV_BUF_CAP: usize = 2048;

pub struct Session {
    id: u64,
    conn: Connection,
    parser: RequestParser,
    client_name: Option<Bytes>,
}

impl Session {
    fn new(id: u64, conn: Connection) -> Session {
        Session {
            id,
            conn,
            parser: RequestParser::new(),
            client_name: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn client_name(&self) -> Option<&Bytes> {
        self.client_name.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(id: u64, conn: Connection) -> Session {
        Session::new(id, conn)
    }

    /// Register a freshly accepted connection and start its recv/dispatch
    /// loop. The session stays alive in `registry` for the lifetime of the
    /// connection; command handlers reach it back through the registry via
    /// `ctx.session_id`.
    pub fn spawn(
        conn: Connection,
        instance: Rc<RefCell<Instance>>,
        registry: Rc<RefCell<ClientRegistry>>,
        lp: &mut EventLoop,
    ) {
        let id = registry.borrow_mut().reserve_id();
        let session = Rc::new(RefCell::new(Session::new(id, conn)));
        registry.borrow_mut().insert(session.clone());
        Session::arm_recv(session, instance, registry, lp);
    }

    fn arm_recv(
        session: Rc<RefCell<Session>>,
        instance: Rc<RefCell<Instance>>,
        registry: Rc<RefCell<ClientRegistry>>,
        lp: &mut EventLoop,
    ) {
        let conn = session.borrow().conn.clone();
        let buf = BytesMut::with_capacity(RECV_BUF_CAP);
        conn.async_recv(
            lp,
            buf,
            Box::new(move |lp, result| {
                Session::on_recv(session, instance, registry, lp, result);
            }),
        );
    }

    fn on_recv(
        session: Rc<RefCell<Session>>,
        instance: Rc<RefCell<Instance>>,
        registry: Rc<RefCell<ClientRegistry>>,
        lp: &mut EventLoop,
        result: io::Result<RecvOutcome>,
    ) {
        let data = match result {
            Ok(RecvOutcome::Data(buf)) => buf,
            Ok(RecvOutcome::Eof) => {
                Session::finish(session, registry, lp);
                return;
            }
            Err(err) => {
                tracing::debug!(error = %err, "session recv failed, closing");
                Session::finish(session, registry, lp);
                return;
            }
        };

        let requests = session.borrow_mut().parser.feed(&data);
        let requests = match requests {
            Ok(reqs) => reqs,
            Err(parse_err) => {
                let piece = Piece::error(format!("ERR {parse_err}"));
                Session::send_and_close(session, registry, lp, piece.serialize());
                return;
            }
        };

        Session::process(session, instance, registry, lp, requests, 0);
    }

    /// Dispatch and reply to `requests[index..]` in order, then re-arm the
    /// recv loop once the whole batch has been sent. Replies are sent one
    /// at a time (rather than concatenated) so that a `close_after_send`
    /// reply mid-batch still closes the connection after that reply alone
    /// is flushed, not after the rest of the pipeline.
    fn process(
        session: Rc<RefCell<Session>>,
        instance: Rc<RefCell<Instance>>,
        registry: Rc<RefCell<ClientRegistry>>,
        lp: &mut EventLoop,
        requests: Vec<crate::resp::Request>,
        index: usize,
    ) {
        if index >= requests.len() {
            Session::arm_recv(session, instance, registry, lp);
            return;
        }

        let reply = {
            let mut session_ref = session.borrow_mut();
            let id = session_ref.id;
            let mut ctx = Ctx {
                session_id: id,
                client_name: &mut session_ref.client_name,
            };
            instance.borrow_mut().dispatch(&requests[index], &mut ctx)
        };

        let bytes = reply.piece.serialize();
        if reply.close_after_send {
            Session::send_and_close(session, registry, lp, bytes);
            return;
        }

        let conn = session.borrow().conn.clone();
        conn.async_send(
            lp,
            bytes,
            Box::new(move |lp, result| {
                if let Err(err) = result {
                    tracing::debug!(error = %err, "session send failed, closing");
                    Session::finish(session, registry, lp);
                    return;
                }
                Session::process(session, instance, registry, lp, requests, index + 1);
            }),
        );
    }

    fn send_and_close(
        session: Rc<RefCell<Session>>,
        registry: Rc<RefCell<ClientRegistry>>,
        lp: &mut EventLoop,
        bytes: Bytes,
    ) {
        let conn = session.borrow().conn.clone();
        conn.async_send(
            lp,
            bytes,
            Box::new(move |lp, _result| {
                Session::finish(session, registry, lp);
            }),
        );
    }

    fn finish(session: Rc<RefCell<Session>>, registry: Rc<RefCell<ClientRegistry>>, lp: &mut EventLoop) {
        let id = session.borrow().id;
        session.borrow().conn.close(lp);
        registry.borrow_mut().remove(id);
    }
}
