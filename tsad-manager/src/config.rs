//! Manager process configuration (§6 "Process config. Manager").

#[derive(Debug, clap::Parser)]
pub struct Args {
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Apply database migrations on startup if needed.
    #[arg(long)]
    pub migrate: bool,

    /// Identity this process uses when competing for the leader lease and,
    /// if elected, when claiming tasks' dispatch record (§4.1, §4.3).
    #[arg(long, env = "TSAD_HOST")]
    pub host: String,

    /// Port this manager's HTTP surface listens on.
    #[arg(long, env = "TSAD_MANAGER_PORT", default_value_t = 8080)]
    pub manager_port: u16,

    /// Port every worker's `/detector` surface listens on, used to build
    /// submit/RPC URLs from each worker's advertised host (§6).
    #[arg(long, env = "TSAD_WORKER_PORT", default_value_t = 8081)]
    pub worker_port: u16,
}
