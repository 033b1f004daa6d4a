use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the staging load once
    Run {
        #[arg(long, help = "Pipeline config file path (JSON)")]
        config: String,

        #[arg(long, help = "Optional .env file used to resolve ${VAR} placeholders")]
        env_file: Option<String>,

        #[arg(
            long,
            help = "Logical run timestamp (RFC 3339); defaults to the current time"
        )]
        run_ts: Option<String>,

        #[arg(
            long,
            help = "If specified, writes the JSON run report to this file instead of stdout"
        )]
        output: Option<String>,
    },
    /// Delete stale staging files
    Cleanup {
        #[arg(long, help = "Staging directory to clean")]
        dir: String,

        #[arg(long, help = "Maximum file age in minutes (default 120)")]
        max_age_mins: Option<u64>,
    },
    /// Load and validate a config file without running it
    CheckConfig {
        #[arg(long, help = "Pipeline config file path (JSON)")]
        config: String,

        #[arg(long)]
        env_file: Option<String>,
    },
    /// Ping the target and every configured source
    TestConn {
        #[arg(long, help = "Pipeline config file path (JSON)")]
        config: String,

        #[arg(long)]
        env_file: Option<String>,
    },
}
