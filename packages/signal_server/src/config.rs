use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use rendezvous::SessionConfig;

// =============================================================================
// File config (figment-deserialized from defaults / TOML file / env vars)
// =============================================================================
//
// Equivalent ways to set the port:
//
//   signal-server.toml:   [server]
//                         port = 4000
//
//   env var:              SIGNAL_SERVER__PORT=4000   (double underscore = nesting)
//   env var:              PORT=4000                  (bare, for PaaS hosts)
//   CLI:                  --port 4000

/// Config file read from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "signal-server.toml";

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub signaling: SignalingFileConfig,
}

/// Listener settings (lives under `[server]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Session behavior (lives under `[signaling]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignalingFileConfig {
    /// Close the socket after a client sends `disconnect`
    #[serde(default)]
    pub close_on_disconnect: bool,
    /// Largest inbound WebSocket message accepted
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl Default for SignalingFileConfig {
    fn default() -> Self {
        Self {
            close_on_disconnect: false,
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3001
}
fn default_max_message_bytes() -> usize {
    64 * 1024
}

/// Build a figment that layers: defaults → TOML file → SIGNAL_* env vars → PORT.
///
/// Env vars use double-underscore for nesting into sections:
///   `SIGNAL_SERVER__HOST=127.0.0.1`  →  `server.host = "127.0.0.1"`
///   `SIGNAL_SIGNALING__CLOSE_ON_DISCONNECT=true`  →  `signaling.close_on_disconnect = true`
pub fn load_config(config_path: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let path: PathBuf = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SIGNAL_").split("__"))
        .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
}

/// Values given on the command line; they win over every other layer.
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl CliOverrides {
    pub fn apply(&self, fc: &mut FileConfig) {
        if let Some(host) = &self.host {
            fc.server.host = host.clone();
        }
        if let Some(port) = self.port {
            fc.server.port = port;
        }
    }
}

// =============================================================================
// Runtime config (derived from FileConfig, used throughout the server)
// =============================================================================

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub max_message_bytes: usize,
    pub session: SessionConfig,
}

impl ServerConfig {
    pub fn from_file(fc: &FileConfig) -> Result<Self> {
        let bind_addr = format!("{}:{}", fc.server.host, fc.server.port)
            .parse::<SocketAddr>()
            .with_context(|| {
                format!(
                    "Invalid listen address {}:{}",
                    fc.server.host, fc.server.port
                )
            })?;

        Ok(Self {
            bind_addr,
            max_message_bytes: fc.signaling.max_message_bytes,
            session: SessionConfig {
                close_on_disconnect: fc.signaling.close_on_disconnect,
            },
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], default_port()).into(),
            max_message_bytes: default_max_message_bytes(),
            session: SessionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── defaults ────────────────────────────────────────────────────────

    #[test]
    fn test_file_config_defaults() {
        let fc = FileConfig::default();
        assert_eq!(fc.server.host, "0.0.0.0");
        assert_eq!(fc.server.port, 3001);
        assert!(!fc.signaling.close_on_disconnect);
        assert_eq!(fc.signaling.max_message_bytes, 65536);
    }

    // ── ServerConfig::from_file ─────────────────────────────────────────

    #[test]
    fn test_server_config_from_file() {
        let fc = FileConfig {
            server: ServerFileConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            signaling: SignalingFileConfig {
                close_on_disconnect: true,
                max_message_bytes: 1024,
            },
        };
        let sc = ServerConfig::from_file(&fc).unwrap();
        assert_eq!(sc.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(sc.max_message_bytes, 1024);
        assert!(sc.session.close_on_disconnect);
    }

    #[test]
    fn test_server_config_accepts_ipv6() {
        let fc = FileConfig {
            server: ServerFileConfig {
                host: "[::1]".to_string(),
                port: 9000,
            },
            ..Default::default()
        };
        let sc = ServerConfig::from_file(&fc).unwrap();
        assert!(sc.bind_addr.is_ipv6());
    }

    #[test]
    fn test_server_config_rejects_bad_host() {
        let fc = FileConfig {
            server: ServerFileConfig {
                host: "not a host".to_string(),
                port: 3001,
            },
            ..Default::default()
        };
        let err = ServerConfig::from_file(&fc).unwrap_err();
        assert!(err.to_string().contains("not a host"));
    }

    // ── CliOverrides ────────────────────────────────────────────────────

    #[test]
    fn test_cli_overrides_win() {
        let mut fc = FileConfig::default();
        CliOverrides {
            host: Some("127.0.0.1".to_string()),
            port: Some(4000),
        }
        .apply(&mut fc);
        assert_eq!(fc.server.host, "127.0.0.1");
        assert_eq!(fc.server.port, 4000);
    }

    #[test]
    fn test_empty_cli_overrides_keep_values() {
        let mut fc = FileConfig::default();
        CliOverrides::default().apply(&mut fc);
        assert_eq!(fc.server.port, 3001);
    }

    // ── load_config ─────────────────────────────────────────────────────

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let fc: FileConfig = load_config(Some(&tmp.path().join("absent.toml")))
            .extract()
            .unwrap();
        assert_eq!(fc.signaling.max_message_bytes, 65536);
        assert!(!fc.signaling.close_on_disconnect);
    }

    #[test]
    fn test_load_config_toml_sets_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("signal.toml");
        std::fs::write(
            &path,
            "[server]\nhost = \"127.0.0.1\"\n\n[signaling]\nclose_on_disconnect = true\nmax_message_bytes = 2048\n",
        )
        .unwrap();
        let fc: FileConfig = load_config(Some(&path)).extract().unwrap();
        assert_eq!(fc.server.host, "127.0.0.1");
        assert!(fc.signaling.close_on_disconnect);
        assert_eq!(fc.signaling.max_message_bytes, 2048);
    }

    #[test]
    fn test_load_config_rejects_wrong_types() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("signal.toml");
        std::fs::write(&path, "[signaling]\nclose_on_disconnect = \"sometimes\"\n").unwrap();
        let result: Result<FileConfig, _> = load_config(Some(&path)).extract();
        assert!(result.is_err());
    }
}
