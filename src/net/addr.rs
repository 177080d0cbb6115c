use super::end_point::{Endpoint, Family};

/// Default bind address used when a config entry omits `ip`/`port`.
pub fn default_endpoint() -> Endpoint {
    Endpoint::new(Family::Ipv4, "127.0.0.1", 6379)
}
