//! Nonblocking, ordered, byte-stream I/O over a connected TCP socket.
//!
//! Each direction (`recv`/`send`) keeps its own FIFO queue of pending
//! requests; a request is tried inline first, and only falls back to the
//! queue plus an armed readiness callback when the kernel reports
//! `WouldBlock`. The two directions never interfere with each other.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use mio::net::TcpStream;

use super::end_point::Endpoint;
use super::event_loop::EventLoop;

/// Outcome of a completed `async_recv`.
pub enum RecvOutcome {
    /// The destination buffer, truncated to the bytes actually received
    /// (`len() >= 1`).
    Data(BytesMut),
    /// The peer performed an orderly shutdown; no more data will arrive.
    Eof,
}

type RecvHandler = Box<dyn FnOnce(&mut EventLoop, io::Result<RecvOutcome>)>;
type SendHandler = Box<dyn FnOnce(&mut EventLoop, io::Result<()>)>;

struct RecvReq {
    dest: BytesMut,
    handler: RecvHandler,
}

struct SendReq {
    remaining: Bytes,
    handler: SendHandler,
}

struct Inner {
    stream: Option<TcpStream>,
    fd: RawFd,
    remote: Endpoint,
    recv_queue: VecDeque<RecvReq>,
    send_queue: VecDeque<SendReq>,
}

/// A single TCP stream endpoint. Cloning a `Connection` handle shares the
/// same underlying socket and queues (single-threaded, so `Rc<RefCell<_>>`
/// is sufficient — there is never a second thread to race with).
#[derive(Clone)]
pub struct Connection {
    inner: Rc<RefCell<Inner>>,
}

impl Connection {
    pub fn from_stream(stream: TcpStream, remote: Endpoint) -> Connection {
        let fd = stream.as_raw_fd();
        Connection {
            inner: Rc::new(RefCell::new(Inner {
                stream: Some(stream),
                fd,
                remote,
                recv_queue: VecDeque::new(),
                send_queue: VecDeque::new(),
            })),
        }
    }

    pub fn remote(&self) -> Endpoint {
        self.inner.borrow().remote.clone()
    }

    pub fn is_open(&self) -> bool {
        self.inner.borrow().stream.is_some()
    }

    fn fd(&self) -> RawFd {
        self.inner.borrow().fd
    }

    /// Deliver between 1 and `dest.capacity()` bytes into `dest`, then call
    /// `handler`. A clean peer close surfaces as `Ok(RecvOutcome::Eof)`.
    pub fn async_recv(&self, lp: &mut EventLoop, mut dest: BytesMut, handler: RecvHandler) {
        if !self.is_open() {
            handler(lp, Err(closed_error()));
            return;
        }

        match self.try_recv(&mut dest) {
            Some(result) => handler(lp, result),
            None => {
                self.inner.borrow_mut().recv_queue.push_back(RecvReq { dest, handler });
                self.arm_readable(lp);
            }
        }
    }

    /// Transmit the entirety of `data`, then call `handler`. Partial writes
    /// are hidden from the caller: the remainder stays queued until the
    /// socket is writable again.
    pub fn async_send(&self, lp: &mut EventLoop, data: Bytes, handler: SendHandler) {
        if !self.is_open() {
            handler(lp, Err(closed_error()));
            return;
        }

        match self.try_send(&data) {
            TrySend::Done(result) => handler(lp, result),
            TrySend::Partial(remaining) => {
                self.inner.borrow_mut().send_queue.push_back(SendReq { remaining, handler });
                self.arm_writable(lp);
            }
        }
    }

    /// Disarm from the loop, close the socket, and drop all pending
    /// requests without invoking their handlers. Idempotent only in the
    /// sense that a second call is a no-op; calling recv/send afterwards
    /// reports a closed-connection error rather than panicking.
    pub fn close(&self, lp: &mut EventLoop) {
        let mut inner = self.inner.borrow_mut();
        if inner.stream.take().is_some() {
            lp.remove(inner.fd);
        }
        inner.recv_queue.clear();
        inner.send_queue.clear();
    }

    fn arm_readable(&self, lp: &mut EventLoop) {
        let conn = self.clone();
        lp.set_in_event(
            self.fd(),
            Some(Box::new(move |lp| conn.drain_recv(lp))),
        );
    }

    fn arm_writable(&self, lp: &mut EventLoop) {
        let conn = self.clone();
        lp.set_out_event(
            self.fd(),
            Some(Box::new(move |lp| conn.drain_send(lp))),
        );
    }

    fn drain_recv(&self, lp: &mut EventLoop) {
        loop {
            let front = self.inner.borrow_mut().recv_queue.pop_front();
            let mut req = match front {
                Some(r) => r,
                None => {
                    lp.set_in_event(self.fd(), None);
                    return;
                }
            };

            match self.try_recv(&mut req.dest) {
                Some(result) => (req.handler)(lp, result),
                None => {
                    self.inner.borrow_mut().recv_queue.push_front(req);
                    return;
                }
            }
        }
    }

    fn drain_send(&self, lp: &mut EventLoop) {
        loop {
            let front = self.inner.borrow_mut().send_queue.pop_front();
            let mut req = match front {
                Some(r) => r,
                None => {
                    lp.set_out_event(self.fd(), None);
                    return;
                }
            };

            match self.try_send(&req.remaining) {
                TrySend::Done(result) => (req.handler)(lp, result),
                TrySend::Partial(remaining) => {
                    req.remaining = remaining;
                    self.inner.borrow_mut().send_queue.push_front(req);
                    return;
                }
            }
        }
    }

    fn try_recv(&self, dest: &mut BytesMut) -> Option<io::Result<RecvOutcome>> {
        let mut inner = self.inner.borrow_mut();
        let stream = inner.stream.as_mut()?;
        let cap = dest.capacity();
        dest.clear();
        dest.resize(cap, 0);
        match stream.read(&mut dest[..]) {
            Ok(0) => Some(Ok(RecvOutcome::Eof)),
            Ok(n) => {
                dest.truncate(n);
                Some(Ok(RecvOutcome::Data(dest.split())))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => Some(Err(e)),
        }
    }

    fn try_send(&self, data: &Bytes) -> TrySend {
        let mut inner = self.inner.borrow_mut();
        let stream = match inner.stream.as_mut() {
            Some(s) => s,
            None => return TrySend::Done(Err(closed_error())),
        };
        match stream.write(data) {
            Ok(n) if n == data.len() => TrySend::Done(Ok(())),
            Ok(n) => TrySend::Partial(data.slice(n..)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => TrySend::Partial(data.clone()),
            Err(e) => TrySend::Done(Err(e)),
        }
    }
}

enum TrySend {
    Done(io::Result<()>),
    Partial(Bytes),
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection is closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::end_point::{Endpoint, Family};
    use std::net::TcpListener as StdListener;

    fn pair() -> (Connection, Connection, EventLoop) {
        let listener = StdListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client_std = std::net::TcpStream::connect(addr).unwrap();
        let (server_std, _) = listener.accept().unwrap();
        client_std.set_nonblocking(true).unwrap();
        server_std.set_nonblocking(true).unwrap();

        let ep = Endpoint::new(Family::Ipv4, "127.0.0.1", addr.port());
        let a = Connection::from_stream(TcpStream::from_std(client_std), ep.clone());
        let b = Connection::from_stream(TcpStream::from_std(server_std), ep);
        (a, b, EventLoop::new().unwrap())
    }

    #[test]
    fn inline_send_then_recv_completes_without_queueing() {
        let (client, server, mut lp) = pair();

        client.async_send(
            &mut lp,
            Bytes::from_static(b"ping"),
            Box::new(|_, res| assert!(res.is_ok())),
        );

        // give the kernel a moment to deliver
        lp.poll_once(Some(std::time::Duration::from_millis(200))).ok();

        let got = Rc::new(RefCell::new(None));
        let got2 = got.clone();
        server.async_recv(
            &mut lp,
            BytesMut::with_capacity(16),
            Box::new(move |_, res| {
                *got2.borrow_mut() = Some(res);
            }),
        );

        match got.borrow().as_ref() {
            Some(Ok(RecvOutcome::Data(buf))) => assert_eq!(&buf[..], b"ping"),
            _ => panic!("expected recv to complete with data"),
        }
    }

    #[test]
    fn close_drops_pending_without_invoking_handlers() {
        let (client, _server, mut lp) = pair();
        client.close(&mut lp);
        assert!(!client.is_open());
    }
}
