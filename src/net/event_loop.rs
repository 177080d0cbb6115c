//! Edge-triggered readiness multiplexer.
//!
//! One `mio::Poll` drives the whole process. File descriptors are tracked by
//! raw fd rather than by the typed `mio` source that created them, via
//! `mio::unix::SourceFd` — this is what lets `Connection` and `Acceptor`
//! hand the loop a bare fd and a callback instead of threading the socket
//! type through the reactor itself.

use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use tracing::error;

pub type Handler = Box<dyn FnMut(&mut EventLoop)>;

/// A callback slot. `Running` is a transient state held only while the
/// callback in that slot is executing, so a handler may re-arm, replace, or
/// clear itself (or the loop may drop the fd entirely) from inside its own
/// invocation without the loop clobbering that decision afterwards.
enum Slot {
    Empty,
    Set(Handler),
    Running,
}

impl Slot {
    fn is_armed(&self) -> bool {
        !matches!(self, Slot::Empty)
    }

    fn take(&mut self) -> Option<Handler> {
        match std::mem::replace(self, Slot::Running) {
            Slot::Set(h) => Some(h),
            other => {
                *self = other;
                None
            }
        }
    }
}

#[derive(Default)]
struct Handlers {
    readable: Slot,
    writable: Slot,
}

impl Default for Slot {
    fn default() -> Self {
        Slot::Empty
    }
}

fn interest_of(h: &Handlers) -> Option<Interest> {
    match (h.readable.is_armed(), h.writable.is_armed()) {
        (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
        (true, false) => Some(Interest::READABLE),
        (false, true) => Some(Interest::WRITABLE),
        (false, false) => None,
    }
}

/// Single-threaded, cooperative reactor. Every callback it invokes runs to
/// completion before the next one is dispatched; there is no suspension
/// point other than the wait inside `poll_once`/`run`.
pub struct EventLoop {
    poll: Poll,
    events: Events,
    handlers: HashMap<RawFd, Handlers>,
    registered: std::collections::HashSet<RawFd>,
}

impl EventLoop {
    pub fn new() -> io::Result<EventLoop> {
        Ok(EventLoop {
            poll: Poll::new()?,
            events: Events::with_capacity(1024),
            handlers: HashMap::new(),
            registered: std::collections::HashSet::new(),
        })
    }

    /// Install or clear the readable-event handler for `fd`.
    pub fn set_in_event(&mut self, fd: RawFd, handler: Option<Handler>) {
        let entry = self.handlers.entry(fd).or_default();
        entry.readable = match handler {
            Some(h) => Slot::Set(h),
            None => Slot::Empty,
        };
        self.sync_registration(fd);
    }

    /// Install or clear the writable-event handler for `fd`.
    pub fn set_out_event(&mut self, fd: RawFd, handler: Option<Handler>) {
        let entry = self.handlers.entry(fd).or_default();
        entry.writable = match handler {
            Some(h) => Slot::Set(h),
            None => Slot::Empty,
        };
        self.sync_registration(fd);
    }

    /// Unconditionally detach `fd`, dropping both handlers.
    pub fn remove(&mut self, fd: RawFd) {
        if self.handlers.remove(&fd).is_some() {
            self.deregister(fd);
        }
    }

    pub fn contains(&self, fd: RawFd) -> bool {
        self.handlers.contains_key(&fd)
    }

    /// Run the reactor. Never returns under normal operation.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.poll_once(None)?;
        }
    }

    /// Block (up to `timeout`, or forever if `None`) for readiness, then
    /// dispatch every ready callback once. Exposed separately from `run` so
    /// tests can drive the loop a fixed number of iterations.
    pub fn poll_once(&mut self, timeout: Option<std::time::Duration>) -> io::Result<usize> {
        loop {
            match self.poll.poll(&mut self.events, timeout) {
                Ok(()) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "fatal error waiting on multiplexer");
                    return Err(e);
                }
            }
        }

        let ready: Vec<(RawFd, bool, bool)> = self
            .events
            .iter()
            .map(|ev| {
                let fd = ev.token().0 as RawFd;
                (fd, ev.is_readable(), ev.is_writable())
            })
            .collect();

        for &(fd, readable, writable) in &ready {
            if readable {
                self.dispatch(fd, true);
            }
            if writable {
                self.dispatch(fd, false);
            }
        }

        Ok(ready.len())
    }

    fn dispatch(&mut self, fd: RawFd, readable: bool) {
        let handler = match self.handlers.get_mut(&fd) {
            Some(h) => {
                let slot = if readable { &mut h.readable } else { &mut h.writable };
                match slot.take() {
                    Some(cb) => cb,
                    None => return,
                }
            }
            None => return,
        };

        let mut handler = handler;
        handler(self);

        if let Some(h) = self.handlers.get_mut(&fd) {
            let slot = if readable { &mut h.readable } else { &mut h.writable };
            if matches!(slot, Slot::Running) {
                *slot = Slot::Set(handler);
            }
        }
    }

    fn sync_registration(&mut self, fd: RawFd) {
        let interest = self.handlers.get(&fd).and_then(interest_of);
        match interest {
            Some(interest) if self.registered.contains(&fd) => {
                self.poll
                    .registry()
                    .reregister(&mut SourceFd(&fd), Token(fd as usize), interest)
                    .expect("event loop reregister failed");
            }
            Some(interest) => {
                self.poll
                    .registry()
                    .register(&mut SourceFd(&fd), Token(fd as usize), interest)
                    .expect("event loop register failed");
                self.registered.insert(fd);
            }
            None => {
                self.handlers.remove(&fd);
                self.deregister(fd);
            }
        }
    }

    fn deregister(&mut self, fd: RawFd) {
        if self.registered.remove(&fd) {
            let _ = self.poll.registry().deregister(&mut SourceFd(&fd));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::rc::Rc;
    use std::cell::RefCell;

    #[test]
    fn fires_readable_handler_and_allows_rearm() {
        let (a, mut b) = UnixStream::pair().unwrap();
        a.set_nonblocking(true).unwrap();
        let fd = a.as_raw_fd();

        let mut ev = EventLoop::new().unwrap();
        let hits = Rc::new(RefCell::new(0));
        let hits2 = hits.clone();

        ev.set_in_event(
            fd,
            Some(Box::new(move |lp: &mut EventLoop| {
                *hits2.borrow_mut() += 1;
                let mut buf = [0u8; 16];
                let _ = std::io::Read::read(&mut &a, &mut buf);
                // re-arm for another round
                let hits3 = hits2.clone();
                lp.set_in_event(
                    fd,
                    Some(Box::new(move |_| {
                        *hits3.borrow_mut() += 1;
                    })),
                );
            })),
        );

        assert!(ev.contains(fd));
        std::io::Write::write_all(&mut b, b"hi").unwrap();
        ev.poll_once(Some(std::time::Duration::from_millis(500))).unwrap();
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn removing_clears_interest() {
        let (a, _b) = UnixStream::pair().unwrap();
        a.set_nonblocking(true).unwrap();
        let fd = a.as_raw_fd();

        let mut ev = EventLoop::new().unwrap();
        ev.set_in_event(fd, Some(Box::new(|_| {})));
        assert!(ev.contains(fd));
        ev.remove(fd);
        assert!(!ev.contains(fd));
    }
}
