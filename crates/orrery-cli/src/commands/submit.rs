//! Submit command implementation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;

use orrery_hal::{CredentialId, JobPayload};
use orrery_provider::BackendFilter;

use super::common::{self, SessionArgs};
use super::jobs::wait_for;

/// Parsed `submit` arguments.
pub struct SubmitRequest {
    pub input: PathBuf,
    pub backend: Option<String>,
    pub account: Option<String>,
    pub shots: u32,
    pub wait: bool,
    pub timeout: Option<u64>,
}

/// Execute the submit command.
pub async fn execute(args: &SessionArgs, request: SubmitRequest) -> Result<()> {
    let program = std::fs::read_to_string(&request.input)
        .with_context(|| format!("Failed to read file: {}", request.input.display()))?;
    let payload = JobPayload::new(program, request.shots);
    payload.validate().map_err(|reason| anyhow::anyhow!(reason))?;

    let session = common::open(args).await?;
    let account = request.account.map(CredentialId::from);

    let target = match &request.backend {
        Some(name) => session.provider.backend(name, account.as_ref()).await?,
        None => {
            let mut criteria = BackendFilter::new().simulator(false);
            if let Some(id) = account.clone() {
                criteria = criteria.predicate(move |b| b.credential_id() == &id);
            }
            session.provider.least_busy(&criteria).await?
        }
    };

    let mut job = session.provider.submit(&target, &payload).await?;
    println!(
        "{} Submitted job {} to {} under {}",
        style("✓").green().bold(),
        style(job.job_id()).bold(),
        style(&target.name).cyan(),
        target.credential_id()
    );

    if !request.wait {
        println!(
            "  Check on it with 'orrery status {} -a {} -b {}'",
            job.job_id(),
            target.credential_id(),
            target.name
        );
        return Ok(());
    }

    let timeout = request
        .timeout
        .map_or_else(|| session.config.default_timeout(), Duration::from_secs);
    wait_for(&mut job, timeout).await
}
