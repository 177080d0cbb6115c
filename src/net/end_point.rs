use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Socket family a listener or connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Ipv4,
    Ipv6,
}

/// An immutable bind/remote address: family, textual ip, and port.
///
/// Constructed once and never mutated; `Connection` and `Acceptor` both
/// carry one to describe their local or peer side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    family: Family,
    ip: String,
    port: u16,
}

impl Endpoint {
    pub fn new(family: Family, ip: impl Into<String>, port: u16) -> Endpoint {
        Endpoint {
            family,
            ip: ip.into(),
            port,
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn to_socket_addr(&self) -> std::io::Result<SocketAddr> {
        let ip: IpAddr = self
            .ip
            .parse()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad ip address"))?;
        match (self.family, ip) {
            (Family::Ipv4, IpAddr::V4(_)) | (Family::Ipv6, IpAddr::V6(_)) => {
                Ok(SocketAddr::new(ip, self.port))
            }
            _ => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "ip address does not match declared family",
            )),
        }
    }

    pub fn from_socket_addr(addr: SocketAddr) -> Endpoint {
        let family = if addr.is_ipv4() { Family::Ipv4 } else { Family::Ipv6 };
        Endpoint::new(family, addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family {
            Family::Ipv4 => write!(f, "{}:{}", self.ip, self.port),
            Family::Ipv6 => write!(f, "[{}]:{}", self.ip, self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_socket_addr() {
        let ep = Endpoint::new(Family::Ipv4, "127.0.0.1", 6379);
        let addr = ep.to_socket_addr().unwrap();
        assert_eq!(Endpoint::from_socket_addr(addr), ep);
    }

    #[test]
    fn rejects_family_mismatch() {
        let ep = Endpoint::new(Family::Ipv6, "127.0.0.1", 6379);
        assert!(ep.to_socket_addr().is_err());
    }
}
