use clap::Parser;

#[derive(Parser, Debug, Default)] // requires `derive` feature
#[command(version, about = "JSON-RPC bridge in front of a single MCP webhook", long_about = None)]
pub struct Cli {
    /// Path to the yaml configuration file
    #[arg(short = 'c')]
    pub config: Option<String>,
    /// Listen port, overrides `PORT` and the config file
    #[arg(short = 'p')]
    pub port: Option<u16>,
    /// Remote MCP endpoint, overrides `BRIDGE_UPSTREAM_URL` and the config file
    #[arg(short = 'u')]
    pub upstream: Option<String>,
    /// Relay the remote SSE stream live instead of buffering it
    #[arg(short = 's', default_value_t = false)]
    pub stream: bool,
}
