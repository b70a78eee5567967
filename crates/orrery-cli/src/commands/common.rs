//! Shared helpers for CLI commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;

use orrery_adapter_cloud::CloudTransport;
use orrery_adapter_sim::{demo_credentials, demo_service};
use orrery_hal::{BackendDescriptor, CredentialScope, JobResult};
use orrery_provider::{
    BackendFilter, BackendListing, JsonCredentialStore, Provider, ProviderConfig,
    default_credentials_path,
};

/// Options shared by every command.
pub struct SessionArgs {
    /// Use the simulated service.
    pub sim: bool,
    /// Explicit configuration file.
    pub config: Option<PathBuf>,
}

/// A provider with its accounts loaded.
pub struct Session {
    pub provider: Provider,
    pub config: ProviderConfig,
    /// Credential file; absent in simulated mode.
    pub store: Option<JsonCredentialStore>,
}

impl Session {
    /// The credential store, or an error in simulated mode.
    pub fn store(&self) -> Result<&JsonCredentialStore> {
        self.store
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Saved accounts are not available with --sim"))
    }
}

/// Build the provider and enable the accounts the session can see.
pub async fn open(args: &SessionArgs) -> Result<Session> {
    let config = ProviderConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;

    if args.sim {
        let mut provider = Provider::from_config(Arc::new(demo_service()), &config);
        for credential in demo_credentials() {
            provider.enable_account(credential)?;
        }
        return Ok(Session {
            provider,
            config,
            store: None,
        });
    }

    let transport = CloudTransport::new().with_request_timeout(config.request_timeout());
    let mut provider = Provider::from_config(Arc::new(transport), &config);

    let path = match &config.credentials_path {
        Some(path) => path.clone(),
        None => default_credentials_path()?,
    };
    let store = JsonCredentialStore::new(path);
    let loaded = provider
        .load_accounts(&store)
        .await
        .with_context(|| format!("Failed to read accounts from {}", store.path().display()))?;
    tracing::debug!(loaded, path = %store.path().display(), "Loaded accounts");

    Ok(Session {
        provider,
        config,
        store: Some(store),
    })
}

/// Backend selection flags.
#[derive(clap::Args, Debug, Default)]
pub struct FilterArgs {
    /// Only operational backends
    #[arg(long)]
    pub operational: bool,

    /// Only simulators
    #[arg(long, conflicts_with = "hardware")]
    pub simulator: bool,

    /// Only hardware devices
    #[arg(long)]
    pub hardware: bool,

    /// Minimum number of qubits
    #[arg(long)]
    pub min_qubits: Option<u32>,

    /// Backend name
    #[arg(long)]
    pub name: Option<String>,

    /// Only backends reached through this hub
    #[arg(long)]
    pub hub: Option<String>,

    /// Only backends reached through this group
    #[arg(long)]
    pub group: Option<String>,

    /// Only backends reached through this project
    #[arg(long)]
    pub project: Option<String>,
}

impl FilterArgs {
    /// Translate the flags into filter criteria.
    pub fn to_filter(&self) -> BackendFilter {
        let mut criteria = BackendFilter::new();
        if self.operational {
            criteria = criteria.operational(true);
        }
        if self.simulator {
            criteria = criteria.simulator(true);
        } else if self.hardware {
            criteria = criteria.simulator(false);
        }
        if let Some(n) = self.min_qubits {
            criteria = criteria.min_qubits(n);
        }
        if let Some(name) = &self.name {
            criteria = criteria.name(name.clone());
        }

        let scope = CredentialScope {
            hub: self.hub.clone(),
            group: self.group.clone(),
            project: self.project.clone(),
        };
        if !scope.is_unscoped() {
            criteria = criteria.credential_scope(scope);
        }
        criteria
    }
}

/// Report per-account listing failures on stderr.
pub fn warn_failures(listing: &BackendListing) {
    for failure in &listing.failures {
        eprintln!(
            "{} {}",
            style("Warning:").yellow().bold(),
            failure
        );
    }
}

/// One-line status marker for a backend.
fn marker(backend: &BackendDescriptor) -> console::StyledObject<&'static str> {
    if backend.is_operational() {
        style("●").green()
    } else {
        style("○").red()
    }
}

/// Print a backend summary block.
pub fn print_backend(backend: &BackendDescriptor) {
    let kind = if backend.is_simulator() {
        "simulator"
    } else {
        "device"
    };
    println!(
        "  {} {} {} ({})",
        marker(backend),
        style(&backend.name).bold(),
        style(format!("@{}", backend.credential_id())).dim(),
        kind
    );
    println!("    Qubits: {}", backend.num_qubits());
    println!("    Pending jobs: {}", backend.pending_jobs());
    if let Some(msg) = &backend.status.status_msg {
        println!("    Status: {msg}");
    }
    let scope = &backend.owner.scope;
    if !scope.is_unscoped() {
        println!("    Instance: {scope}");
    }
    if !backend.configuration.basis_gates.is_empty() {
        println!(
            "    Gates: {}",
            backend
                .configuration
                .basis_gates
                .join(", ")
                .chars()
                .take(50)
                .collect::<String>()
        );
    }
}

/// Print job results in a table format.
pub fn print_results(result: &JobResult) {
    for (index, experiment) in result.experiments.iter().enumerate() {
        let label = experiment
            .name
            .clone()
            .unwrap_or_else(|| format!("experiment {index}"));
        println!(
            "\n{} {} on {} ({} shots):",
            style("✓").green().bold(),
            label,
            style(&result.backend_name).cyan(),
            experiment.shots
        );

        let total = experiment.counts.total_shots().max(1) as f64;
        for (bitstring, count) in experiment.counts.sorted().iter().take(16) {
            let prob = **count as f64 / total * 100.0;
            let bar: String = "█".repeat((prob / 2.0).round() as usize);
            println!(
                "  {}: {:>6} ({:>5.2}%) {}",
                style(bitstring).cyan(),
                count,
                prob,
                style(bar).green()
            );
        }
        if experiment.counts.len() > 16 {
            println!("  ... and {} more outcomes", experiment.counts.len() - 16);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_flags_give_empty_filter() {
        assert!(FilterArgs::default().to_filter().is_empty());
    }

    #[test]
    fn test_hardware_flag_excludes_simulators() {
        let args = FilterArgs {
            hardware: true,
            ..Default::default()
        };
        assert_eq!(args.to_filter().simulator, Some(false));
    }

    #[test]
    fn test_scope_flags_build_scope() {
        let args = FilterArgs {
            hub: Some("open".into()),
            project: Some("main".into()),
            ..Default::default()
        };
        let scope = args.to_filter().credential_scope.unwrap();
        assert_eq!(scope.hub.as_deref(), Some("open"));
        assert_eq!(scope.group, None);
        assert_eq!(scope.project.as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn test_sim_session_enables_demo_accounts() {
        let session = open(&SessionArgs {
            sim: true,
            config: None,
        })
        .await
        .unwrap();
        assert_eq!(session.provider.accounts().len(), 2);
        assert!(session.store().is_err());
    }

    #[tokio::test]
    async fn test_cloud_session_reads_configured_store() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("orrery.yaml");
        let creds = dir.path().join("creds.json");
        std::fs::write(
            &config_path,
            format!("credentials_path: {}\n", creds.display()),
        )
        .unwrap();

        let session = open(&SessionArgs {
            sim: false,
            config: Some(config_path),
        })
        .await
        .unwrap();
        assert!(session.provider.accounts().is_empty());
        assert_eq!(session.store().unwrap().path(), creds.as_path());
    }
}
