//! Worker process configuration (§6 "Process config. Worker").

use std::time::Duration;

#[derive(Debug, clap::Parser)]
pub struct Args {
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Apply database migrations on startup if needed.
    #[arg(long)]
    pub migrate: bool,

    /// Host string this worker advertises to the manager and registers
    /// itself under in the `workers` table; must be independently
    /// reachable, since a container's own IP is often not (§4.1).
    #[arg(long, env = "TSAD_HOST")]
    pub host: String,

    /// Port this worker's HTTP surface listens on.
    #[arg(long, env = "TSAD_WORKER_PORT", default_value_t = 8081)]
    pub worker_port: u16,

    /// Base URL of the external TSDB-style fetch endpoint.
    #[arg(long, env = "TSAD_TSDB_ENDPOINT")]
    pub tsdb_endpoint: String,

    /// Regex patterns; a source matching one of these is always admitted
    /// regardless of the black list (§4, §7).
    #[arg(long = "white-source", env = "TSAD_WHITE_SOURCE_LIST", value_delimiter = ',')]
    pub white_source_list: Vec<String>,

    /// Regex patterns; a source matching one of these and no white pattern
    /// is rejected.
    #[arg(long = "black-source", env = "TSAD_BLACK_SOURCE_LIST", value_delimiter = ',')]
    pub black_source_list: Vec<String>,
}

impl Args {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(30)
    }
}
