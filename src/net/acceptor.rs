//! Nonblocking listening socket with a FIFO queue of pending accept
//! requests, satisfied in order as connections arrive.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;

use mio::net::TcpListener;

use super::conn::Connection;
use super::end_point::Endpoint;
use super::event_loop::EventLoop;

type AcceptHandler = Box<dyn FnOnce(&mut EventLoop, io::Result<Connection>)>;

struct Inner {
    listener: TcpListener,
    fd: RawFd,
    local: Endpoint,
    pending: VecDeque<AcceptHandler>,
}

/// Owns the listening socket for one `Endpoint`.
#[derive(Clone)]
pub struct Acceptor {
    inner: Rc<RefCell<Inner>>,
}

impl Acceptor {
    /// Create the listening socket: nonblocking, `SO_REUSEADDR`, bound to
    /// `endpoint`, listening with the given `backlog`. `mio::net::TcpListener`
    /// sets nonblocking mode and reuse semantics itself.
    pub fn start(endpoint: Endpoint, backlog: u32) -> io::Result<Acceptor> {
        let addr = endpoint.to_socket_addr()?;
        let listener = TcpListener::bind(addr)?;
        let _ = backlog; // mio binds with a platform-default backlog; kept for contract parity
        let fd = listener.as_raw_fd();
        let local = Endpoint::from_socket_addr(listener.local_addr()?);
        Ok(Acceptor {
            inner: Rc::new(RefCell::new(Inner {
                listener,
                fd,
                local,
                pending: VecDeque::new(),
            })),
        })
    }

    pub fn local(&self) -> Endpoint {
        self.inner.borrow().local.clone()
    }

    fn fd(&self) -> RawFd {
        self.inner.borrow().fd
    }

    /// Enqueue an accept request. If the queue was empty, try a nonblocking
    /// accept immediately; on success the handler runs inline, on
    /// `WouldBlock` the request is queued and the listening fd is armed for
    /// readability.
    pub fn async_accept(&self, lp: &mut EventLoop, handler: AcceptHandler) {
        let had_pending = !self.inner.borrow().pending.is_empty();
        self.inner.borrow_mut().pending.push_back(handler);
        if had_pending {
            return;
        }

        self.drain(lp);
    }

    fn drain(&self, lp: &mut EventLoop) {
        loop {
            let next = self.inner.borrow_mut().pending.pop_front();
            let handler = match next {
                Some(h) => h,
                None => {
                    lp.set_in_event(self.fd(), None);
                    return;
                }
            };

            let accepted = self.inner.borrow_mut().listener.accept();
            match accepted {
                Ok((stream, addr)) => {
                    let remote = Endpoint::from_socket_addr(addr);
                    handler(lp, Ok(Connection::from_stream(stream, remote)));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.inner.borrow_mut().pending.push_front(handler);
                    self.arm(lp);
                    return;
                }
                Err(e) => {
                    // a per-connection accept failure; report it and keep
                    // draining the rest of the queue
                    handler(lp, Err(e));
                }
            }
        }
    }

    fn arm(&self, lp: &mut EventLoop) {
        let acceptor = self.clone();
        lp.set_in_event(self.fd(), Some(Box::new(move |lp| acceptor.drain(lp))));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::end_point::Family;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn accepts_a_connection() {
        let mut lp = EventLoop::new().unwrap();
        let acceptor = Acceptor::start(Endpoint::new(Family::Ipv4, "127.0.0.1", 0), 16).unwrap();
        let port = acceptor.local().port();

        let got = Rc::new(Cell::new(false));
        let got2 = got.clone();
        acceptor.async_accept(
            &mut lp,
            Box::new(move |_, res| {
                got2.set(res.is_ok());
            }),
        );

        let _client = std::net::TcpStream::connect(("127.0.0.1", port)).unwrap();
        lp.poll_once(Some(std::time::Duration::from_millis(500))).unwrap();
        assert!(got.get());
    }
}
