//! Binds every endpoint named in the configuration and drives the event
//! loop that accepts connections and spawns sessions for them.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use crate::cmd;
use crate::config::Config;
use crate::db::Instance;
use crate::net::{Acceptor, Connection, EventLoop, Endpoint};

use super::client::ClientRegistry;
use super::session::Session;

pub struct Server {
    lp: EventLoop,
    instance: Rc<RefCell<Instance>>,
    registry: Rc<RefCell<ClientRegistry>>,
    acceptors: Vec<Acceptor>,
}

impl Server {
    pub fn new(config: &Config) -> io::Result<Server> {
        let lp = EventLoop::new()?;

        let mut instance = Instance::new(config.db.db_num as usize);
        cmd::register_all(&mut instance);

        let mut acceptors = Vec::with_capacity(config.server.len());
        for sc in &config.server {
            let endpoint = Endpoint::new(sc.family, sc.ip.clone(), sc.port);
            let acceptor = Acceptor::start(endpoint, sc.backlog)?;
            tracing::info!(local = %acceptor.local(), "listening");
            acceptors.push(acceptor);
        }

        Ok(Server {
            lp,
            instance: Rc::new(RefCell::new(instance)),
            registry: Rc::new(RefCell::new(ClientRegistry::new())),
            acceptors,
        })
    }

    pub fn connected_clients(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Arm every acceptor and run the event loop until it returns (which,
    /// absent a fatal multiplexer error, is never — spec's event loop has
    /// no shutdown signal of its own).
    pub fn run(mut self) -> io::Result<()> {
        for acceptor in self.acceptors.clone() {
            Server::arm_accept(acceptor, self.instance.clone(), self.registry.clone(), &mut self.lp);
        }
        self.lp.run()
    }

    fn arm_accept(
        acceptor: Acceptor,
        instance: Rc<RefCell<Instance>>,
        registry: Rc<RefCell<ClientRegistry>>,
        lp: &mut EventLoop,
    ) {
        let next_acceptor = acceptor.clone();
        let next_instance = instance.clone();
        let next_registry = registry.clone();
        acceptor.async_accept(
            lp,
            Box::new(move |lp, result| {
                Server::on_accept(result, instance, registry.clone(), lp);
                Server::arm_accept(next_acceptor, next_instance, next_registry, lp);
            }),
        );
    }

    fn on_accept(
        result: io::Result<Connection>,
        instance: Rc<RefCell<Instance>>,
        registry: Rc<RefCell<ClientRegistry>>,
        lp: &mut EventLoop,
    ) {
        match result {
            Ok(conn) => {
                tracing::debug!(remote = %conn.remote(), "accepted connection");
                Session::spawn(conn, instance, registry, lp);
            }
            Err(err) => {
                tracing::warn!(error = %err, "accept failed");
            }
        }
    }
}
