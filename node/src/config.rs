use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

use crate::federation::LocalNode;
use crate::stream::HubConfig;

pub struct NodeConfig {
    pub bind_addr: SocketAddr,
    /// `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,
    pub hub: HubConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub body_limit: usize,
    pub allowed_origins: Vec<String>,
    pub node: LocalNode,
    pub federation: FederationConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per window for reads. Zero disables the limit.
    pub read_max: u32,
    pub write_max: u32,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct FederationConfig {
    /// Base URLs of peer nodes, e.g. `https://munich.loop`.
    pub peers: Vec<String>,
    pub forward_queue: usize,
    pub peer_timeout: Duration,
    /// Key sent to peers on outbound calls.
    pub peer_api_key: Option<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            read_max: 120,
            write_max: 60,
            window: Duration::from_secs(900),
        }
    }
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            forward_queue: 256,
            peer_timeout: Duration::from_secs(5),
            peer_api_key: None,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8088)),
            database_path: None,
            hub: HubConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            body_limit: 1024 * 1024,
            allowed_origins: Vec::new(),
            node: LocalNode {
                node_id: "local.loop".to_string(),
                name: "Local Loop Node".to_string(),
                endpoint: "http://127.0.0.1:8088".to_string(),
                capabilities: ["material-registry", "lab-relay"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            },
            federation: FederationConfig::default(),
        }
    }
}

/// Loop Protocol node: event ledger with live distribution and lab federation.
#[derive(Parser, Debug)]
#[command(name = "loop-node", version, long_about = None)]
pub struct NodeArgs {
    /// Address to listen on.
    #[arg(long, env = "LOOP_BIND_ADDR", default_value = "127.0.0.1:8088")]
    pub bind_addr: SocketAddr,

    /// SQLite database file, or `:memory:`.
    #[arg(long, env = "DATABASE_PATH", default_value = "loop.db")]
    pub database_path: String,

    /// Maximum concurrent stream subscribers.
    #[arg(long, env = "SSE_MAX_CLIENTS", default_value_t = 100)]
    pub sse_max_clients: usize,

    /// Keepalive interval in milliseconds, 0 to disable.
    #[arg(long, env = "SSE_KEEPALIVE_MS", default_value_t = 15_000)]
    pub sse_keepalive_ms: u64,

    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Require the API key on write endpoints.
    #[arg(
        long,
        env = "API_KEY_ENABLED",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        default_value = "false"
    )]
    pub api_key_enabled: bool,

    /// Read requests per client per window, 0 for unlimited.
    #[arg(long, env = "RATE_LIMIT_MAX", default_value_t = 120)]
    pub rate_limit_max: u32,

    #[arg(long, env = "RATE_LIMIT_WRITE_MAX", default_value_t = 60)]
    pub rate_limit_write_max: u32,

    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 900)]
    pub rate_limit_window_secs: u64,

    /// Maximum request body in bytes.
    #[arg(long, env = "BODY_LIMIT", default_value_t = 1_048_576)]
    pub body_limit: usize,

    /// Comma-separated CORS origins. Empty allows none.
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    #[arg(long, env = "NODE_ID", default_value = "local.loop")]
    pub node_id: String,

    #[arg(long, env = "NODE_NAME", default_value = "Local Loop Node")]
    pub node_name: String,

    /// Endpoint advertised to peers.
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://127.0.0.1:8088")]
    pub public_base_url: String,

    #[arg(long, env = "NODE_CAPABILITIES", value_delimiter = ',', default_values = ["material-registry", "lab-relay"])]
    pub node_capabilities: Vec<String>,

    /// Comma-separated peer base URLs to handshake with and forward to.
    #[arg(long, env = "FEDERATION_PEERS", value_delimiter = ',')]
    pub federation_peers: Vec<String>,

    #[arg(long, env = "FEDERATION_FORWARD_QUEUE", default_value_t = 256)]
    pub forward_queue: usize,

    #[arg(long, env = "FEDERATION_PEER_API_KEY", hide_env_values = true)]
    pub peer_api_key: Option<String>,
}

impl From<NodeArgs> for NodeConfig {
    fn from(args: NodeArgs) -> Self {
        let defaults = NodeConfig::default();
        let database_path = match args.database_path.trim() {
            "" | ":memory:" => None,
            path => Some(PathBuf::from(path)),
        };

        Self {
            bind_addr: args.bind_addr,
            database_path,
            hub: HubConfig {
                max_subscribers: args.sse_max_clients,
                keepalive: Duration::from_millis(args.sse_keepalive_ms),
                ..defaults.hub
            },
            auth: AuthConfig {
                enabled: args.api_key_enabled,
                api_key: args.api_key.filter(|k| !k.trim().is_empty()),
            },
            rate_limit: RateLimitConfig {
                read_max: args.rate_limit_max,
                write_max: args.rate_limit_write_max,
                window: Duration::from_secs(args.rate_limit_window_secs.max(1)),
            },
            body_limit: args.body_limit,
            allowed_origins: clean_list(args.allowed_origins),
            node: LocalNode {
                node_id: args.node_id,
                name: args.node_name,
                endpoint: args.public_base_url,
                capabilities: clean_list(args.node_capabilities).into_iter().collect::<BTreeSet<_>>(),
            },
            federation: FederationConfig {
                peers: clean_list(args.federation_peers),
                forward_queue: args.forward_queue,
                peer_api_key: args.peer_api_key.filter(|k| !k.trim().is_empty()),
                ..defaults.federation
            },
        }
    }
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}
