//! Job commands: status, cancel and wait.

use std::time::Duration;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use orrery_hal::{CredentialId, JobId, JobStatus, ProviderError};
use orrery_provider::JobHandle;

use super::common::{self, SessionArgs, print_results};

/// Print the current status of a job.
pub async fn status(args: &SessionArgs, job_id: &str, account: &str, backend: &str) -> Result<()> {
    let session = common::open(args).await?;
    let mut job = session
        .provider
        .job(&CredentialId::from(account), JobId::from(job_id), backend)?;

    let status = job.status().await?;
    println!(
        "{} Job {} on {}: {}",
        style("→").cyan().bold(),
        style(job_id).dim(),
        backend,
        styled_status(&status)
    );
    if let Some(position) = job.queue_position() {
        println!("  Queue position: {position}");
    }
    if let JobStatus::Error(message) = &status {
        println!("  Reason: {message}");
    }
    Ok(())
}

/// Request cancellation of a job.
pub async fn cancel(args: &SessionArgs, job_id: &str, account: &str, backend: &str) -> Result<()> {
    let session = common::open(args).await?;
    let mut job = session
        .provider
        .job(&CredentialId::from(account), JobId::from(job_id), backend)?;

    // Terminal jobs are never sent a cancel request.
    job.status().await?;
    if job.cancel().await? {
        println!(
            "{} Cancellation requested for job {}",
            style("✓").green().bold(),
            style(job_id).dim()
        );
    } else {
        println!(
            "{} Job {} was not cancelled (status: {})",
            style("!").yellow().bold(),
            style(job_id).dim(),
            job.current_status().name()
        );
    }
    Ok(())
}

/// Wait for a job and print its result.
pub async fn wait(
    args: &SessionArgs,
    job_id: &str,
    account: &str,
    backend: &str,
    timeout: Option<u64>,
) -> Result<()> {
    let session = common::open(args).await?;
    let mut job = session
        .provider
        .job(&CredentialId::from(account), JobId::from(job_id), backend)?;
    let timeout = timeout.map_or_else(|| session.config.default_timeout(), Duration::from_secs);
    wait_for(&mut job, timeout).await
}

/// Wait on a handle with a spinner; Ctrl-C stops waiting but leaves the job alone.
pub async fn wait_for(job: &mut JobHandle, timeout: Duration) -> Result<()> {
    println!(
        "{} Waiting for job {} (timeout: {}s)",
        style("→").cyan().bold(),
        style(job.job_id()).dim(),
        timeout.as_secs()
    );

    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(format!("Waiting on {} ...", job.backend_name()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let outcome = job.result_with_cancel(timeout, interrupted).await;
    spinner.finish_and_clear();

    match outcome {
        Ok(result) => {
            print_results(&result);
            Ok(())
        }
        Err(ProviderError::Timeout { .. }) => anyhow::bail!(
            "Timeout after {}s. Job {} is still {}. Use 'orrery status {} -a {} -b {}' to check later.",
            timeout.as_secs(),
            job.job_id(),
            job.current_status().name(),
            job.job_id(),
            job.credential_id(),
            job.backend_name()
        ),
        Err(ProviderError::WaitCancelled(_)) => {
            println!(
                "{} Stopped waiting. Job {} is still {}.",
                style("!").yellow().bold(),
                job.job_id(),
                job.current_status().name()
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn styled_status(status: &JobStatus) -> console::StyledObject<&'static str> {
    match status {
        JobStatus::Done => style(status.name()).green(),
        JobStatus::Error(_) | JobStatus::Cancelled => style(status.name()).red(),
        _ => style(status.name()).yellow(),
    }
}
