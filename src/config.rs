//! JSON startup configuration (spec §6.3). Structure is decoded with
//! `serde`; value ranges (port, backlog, database count) are then checked
//! by hand so an out-of-range value produces the same field-scoped
//! diagnostic the original's hand-rolled loader does, rather than a
//! generic deserialization error.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::net::Family;

fn default_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_backlog() -> u32 {
    512
}

fn default_db_num() -> u32 {
    16
}

fn default_family() -> Family {
    Family::Ipv4
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(rename = "type", default = "default_family")]
    pub family: Family,
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_backlog")]
    pub backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> ServerConfig {
        ServerConfig {
            family: default_family(),
            ip: default_ip(),
            port: default_port(),
            backlog: default_backlog(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    #[serde(default = "default_db_num")]
    pub db_num: u32,
}

impl Default for DbConfig {
    fn default() -> DbConfig {
        DbConfig {
            db_num: default_db_num(),
        }
    }
}

fn default_server() -> Vec<ServerConfig> {
    vec![ServerConfig::default()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_server")]
    pub server: Vec<ServerConfig>,
    #[serde(default)]
    pub db: DbConfig,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            server: default_server(),
            db: DbConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Read and parse `path`, then validate every field's range. Returns a
    /// `ConfigError` naming the offending field, matching the style of
    /// per-field diagnostics the source produces.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, Box<dyn std::error::Error>> {
        let raw = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, server) in self.server.iter().enumerate() {
            if server.port == 0 {
                return Err(ConfigError(format!(
                    "the 'server[{i}].port' field must be in the range of 1-65535"
                )));
            }
        }
        if self.db.db_num == 0 || self.db.db_num > 255 {
            return Err(ConfigError(
                "the 'db.db_num' field must be in the range of 1-255".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let config = Config::default();
        assert_eq!(config.server.len(), 1);
        assert_eq!(config.server[0].ip, "127.0.0.1");
        assert_eq!(config.server[0].port, 6379);
        assert_eq!(config.server[0].backlog, 512);
        assert_eq!(config.db.db_num, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_a_minimal_json_document() {
        let config: Config = serde_json::from_str(r#"{"server":[{"port":7000}],"db":{"db_num":4}}"#).unwrap();
        assert_eq!(config.server[0].port, 7000);
        assert_eq!(config.server[0].ip, "127.0.0.1");
        assert_eq!(config.db.db_num, 4);
    }

    #[test]
    fn rejects_db_num_out_of_range() {
        let config = Config {
            db: DbConfig { db_num: 0 },
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError(
                "the 'db.db_num' field must be in the range of 1-255".to_string()
            ))
        );
    }

    #[test]
    fn rejects_port_zero() {
        let mut config = Config::default();
        config.server[0].port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_and_validates_a_file_on_disk() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server":[{{"port":7000}}],"db":{{"db_num":2}}}}"#).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server[0].port, 7000);
        assert_eq!(config.db.db_num, 2);
    }

    #[test]
    fn load_surfaces_validation_errors_from_disk() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"db":{{"db_num":0}}}}"#).unwrap();

        assert!(Config::load(file.path()).is_err());
    }
}
