use serde::Deserialize;

/// Configuration for the remote command server.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// Whether the command server is started at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Address and port for the command server to listen on.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Maximum number of sessions served at once. Further connections wait
    /// for a free slot.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Size of the buffer a single request must fit into.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            listen_address: default_listen_address(),
            max_connections: default_max_connections(),
            read_buffer_size: default_read_buffer_size(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_listen_address() -> String {
    "127.0.0.1:12345".to_string()
}

fn default_max_connections() -> usize {
    16
}

fn default_read_buffer_size() -> usize {
    4096
}
