//! Orrery Command-Line Interface
//!
//! Discover, filter and run on cloud quantum backends across several
//! accounts.
//!
//! ```text
//!            .        *          .
//!       *        .-------.   .        *
//!    .      .---(  orrery  )---.    .
//!         /      '-------'      \
//!   *    o  acct-A    |   acct-B  o    .
//!         \   sim1  dev1   dev1  /
//!    .     '---.______|______.--'   *
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::common::{FilterArgs, SessionArgs};
use commands::{account, backends, jobs, submit};

/// Orrery - multi-account backend discovery for cloud quantum services
#[derive(Parser)]
#[command(name = "orrery")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use the built-in simulated service and demo accounts
    #[arg(long, global = true)]
    sim: bool,

    /// Configuration file (YAML)
    #[arg(long, global = true, env = "ORRERY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage saved accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },

    /// List backends visible to the enabled accounts
    Backends {
        #[command(flatten)]
        filter: FilterArgs,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the operational backend with the shortest queue
    LeastBusy {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Show calibration data for a backend
    Properties {
        /// Backend name
        name: String,

        /// Account owning the backend
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Submit a circuit to a backend
    Submit {
        /// OpenQASM 3 input file
        #[arg(short, long)]
        input: PathBuf,

        /// Backend name (least busy hardware backend if omitted)
        #[arg(short, long)]
        backend: Option<String>,

        /// Account to submit under
        #[arg(short, long)]
        account: Option<String>,

        /// Number of shots
        #[arg(short, long, default_value = "1024")]
        shots: u32,

        /// Wait for the job to finish and print its result
        #[arg(short, long)]
        wait: bool,

        /// Wait timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Query job status
    Status {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Request cancellation of a job
    Cancel {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Wait for a job to finish and print its result
    Wait {
        #[command(flatten)]
        job: JobArgs,

        /// Timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
}

/// Identifies a previously submitted job.
#[derive(clap::Args)]
struct JobArgs {
    /// Job ID
    job_id: String,

    /// Account the job was submitted under
    #[arg(short, long)]
    account: String,

    /// Backend the job runs on
    #[arg(short, long)]
    backend: String,
}

#[derive(Subcommand)]
enum AccountAction {
    /// List saved accounts
    List,

    /// Save an account
    Save {
        /// Account identifier
        #[arg(long)]
        id: String,

        /// API token
        #[arg(long, env = "ORRERY_TOKEN", hide_env_values = true)]
        token: String,

        /// Service endpoint
        #[arg(long, env = "ORRERY_ENDPOINT")]
        endpoint: String,

        /// Display name
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        hub: Option<String>,

        #[arg(long)]
        group: Option<String>,

        #[arg(long)]
        project: Option<String>,

        /// Replace an existing account with the same id
        #[arg(long)]
        overwrite: bool,
    },

    /// Delete saved accounts matching every given criterion
    Delete {
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        hub: Option<String>,

        #[arg(long)]
        group: Option<String>,

        #[arg(long)]
        project: Option<String>,

        /// Delete every saved account
        #[arg(long, conflicts_with_all = ["id", "hub", "group", "project"])]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let session = SessionArgs {
        sim: cli.sim,
        config: cli.config,
    };

    let result = match cli.command {
        Commands::Account { action } => match action {
            AccountAction::List => account::list(&session).await,
            AccountAction::Save {
                id,
                token,
                endpoint,
                name,
                hub,
                group,
                project,
                overwrite,
            } => {
                let new = account::NewAccount {
                    id,
                    token,
                    endpoint,
                    name,
                    hub,
                    group,
                    project,
                };
                account::save(&session, new, overwrite).await
            }
            AccountAction::Delete {
                id,
                hub,
                group,
                project,
                all,
            } => account::delete(&session, id, hub, group, project, all).await,
        },

        Commands::Backends { filter, json } => backends::list(&session, &filter, json).await,

        Commands::LeastBusy { filter } => backends::least_busy(&session, &filter).await,

        Commands::Properties { name, account } => {
            backends::properties(&session, &name, account.as_deref()).await
        }

        Commands::Submit {
            input,
            backend,
            account,
            shots,
            wait,
            timeout,
        } => {
            let request = submit::SubmitRequest {
                input,
                backend,
                account,
                shots,
                wait,
                timeout,
            };
            submit::execute(&session, request).await
        }

        Commands::Status { job } => {
            jobs::status(&session, &job.job_id, &job.account, &job.backend).await
        }

        Commands::Cancel { job } => {
            jobs::cancel(&session, &job.job_id, &job.account, &job.backend).await
        }

        Commands::Wait { job, timeout } => {
            jobs::wait(&session, &job.job_id, &job.account, &job.backend, timeout).await
        }
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_backends_filters() {
        let cli = Cli::try_parse_from([
            "orrery",
            "backends",
            "--operational",
            "--hardware",
            "--min-qubits",
            "5",
            "--hub",
            "open",
        ])
        .unwrap();
        match cli.command {
            Commands::Backends { filter, json } => {
                assert!(!json);
                let criteria = filter.to_filter();
                assert_eq!(criteria.operational, Some(true));
                assert_eq!(criteria.simulator, Some(false));
                assert_eq!(criteria.min_qubits, Some(5));
            }
            _ => panic!("expected backends"),
        }
    }

    #[test]
    fn test_simulator_and_hardware_conflict() {
        let result = Cli::try_parse_from(["orrery", "backends", "--simulator", "--hardware"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["orrery", "least-busy", "--sim", "-vv"]).unwrap();
        assert!(cli.sim);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::LeastBusy { .. }));
    }

    #[test]
    fn test_parse_submit_defaults() {
        let cli = Cli::try_parse_from(["orrery", "submit", "-i", "bell.qasm"]).unwrap();
        match cli.command {
            Commands::Submit {
                input,
                backend,
                shots,
                wait,
                timeout,
                ..
            } => {
                assert_eq!(input, PathBuf::from("bell.qasm"));
                assert!(backend.is_none());
                assert_eq!(shots, 1024);
                assert!(!wait);
                assert!(timeout.is_none());
            }
            _ => panic!("expected submit"),
        }
    }

    #[test]
    fn test_job_commands_need_account_and_backend() {
        assert!(Cli::try_parse_from(["orrery", "status", "job-1"]).is_err());
        let cli = Cli::try_parse_from([
            "orrery", "wait", "job-1", "-a", "acct-A", "-b", "dev1", "-t", "60",
        ])
        .unwrap();
        match cli.command {
            Commands::Wait { job, timeout } => {
                assert_eq!(job.job_id, "job-1");
                assert_eq!(job.account, "acct-A");
                assert_eq!(job.backend, "dev1");
                assert_eq!(timeout, Some(60));
            }
            _ => panic!("expected wait"),
        }
    }

    #[test]
    fn test_delete_all_excludes_criteria() {
        let result =
            Cli::try_parse_from(["orrery", "account", "delete", "--all", "--hub", "open"]);
        assert!(result.is_err());
    }
}
