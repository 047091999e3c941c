use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "seqsync")]
#[command(about = "Update-sequence reconciliation tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay server pushes against an in-memory replica and print a JSON report
    Replay {
        /// JSON array of every batch the server can serve on catch-up
        #[arg(long)]
        server_log: String,

        /// JSON array of pushes delivered to the client, in arrival order
        #[arg(long)]
        pushes: String,

        /// Last sequence the client applied before the first push (unknown if omitted)
        #[arg(long)]
        client_last: Option<u64>,

        /// Run catch-up synchronously instead of recording pushes for later
        #[arg(long, default_value_t = false)]
        sync: bool,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Replay {
            server_log,
            pushes,
            client_last,
            sync,
            config_paths,
        } => {
            let args = commands::replay::ReplayArgs {
                server_log,
                pushes,
                client_last,
                sync,
                config_paths,
            };
            commands::replay::run(args).await
        }
        Commands::ConfigHash { paths } => commands::config_hash(&paths),
    }
}
