//! End-to-end provider scenarios against the simulated service.

use std::sync::Arc;
use std::time::Duration;

use orrery_adapter_sim::SimTransport;
use orrery_hal::{
    BackendConfiguration, BackendDescriptor, BackendStatus, Credential, CredentialMatcher,
    CredentialScope, JobPayload, JobPoll, JobStatus, ProviderError, TransportError,
};
use orrery_provider::{BackendFilter, JsonCredentialStore, PollPolicy, Provider};

fn acct(id: &str, hub: &str) -> Credential {
    Credential::new(id, format!("token-{id}"), "https://sim.invalid")
        .with_hub(hub)
        .with_group("main")
        .with_project("main")
}

fn simulator(name: &str) -> BackendDescriptor {
    BackendDescriptor::new(name, BackendConfiguration::simulator(32), BackendStatus::active(0))
}

fn device(name: &str, qubits: u32, pending: u32) -> BackendDescriptor {
    BackendDescriptor::new(
        name,
        BackendConfiguration::device(qubits, ["cx", "rz", "sx", "x"]),
        BackendStatus::active(pending),
    )
}

/// acct-A sees sim1 and a 5-qubit dev1 with 6 pending jobs; acct-B sees a
/// 20-qubit dev1 with 2 pending jobs.
fn two_account_service() -> Arc<SimTransport> {
    Arc::new(
        SimTransport::new()
            .with_account("acct-A", [simulator("sim1"), device("dev1", 5, 6)])
            .with_account("acct-B", [device("dev1", 20, 2)]),
    )
}

fn fast_polling() -> PollPolicy {
    PollPolicy::new(Duration::from_millis(50), Duration::from_millis(400))
}

async fn two_account_provider(sim: &Arc<SimTransport>) -> Provider {
    let mut provider = Provider::new(sim.clone()).with_poll_policy(fast_polling());
    provider.enable_account(acct("acct-A", "h1")).unwrap();
    provider.enable_account(acct("acct-B", "h2")).unwrap();
    provider
}

#[tokio::test]
async fn test_same_name_under_two_accounts() {
    let sim = two_account_service();
    let provider = two_account_provider(&sim).await;

    let report = provider.refresh_backends().await;
    assert!(report.is_complete());
    assert_eq!(report.refreshed.len(), 2);

    let all = provider.cached_backends(&BackendFilter::new()).await;
    assert_eq!(all.len(), 3);

    let devices = provider
        .backends(&BackendFilter::new().simulator(false))
        .await;
    assert!(devices.is_complete());
    let owners: Vec<_> = devices
        .backends
        .iter()
        .map(|d| (d.name.as_str(), d.credential_id().as_str(), d.num_qubits()))
        .collect();
    assert_eq!(owners, [("dev1", "acct-A", 5), ("dev1", "acct-B", 20)]);

    let best = provider
        .least_busy(&BackendFilter::new().simulator(false))
        .await
        .unwrap();
    assert_eq!(best.credential_id().as_str(), "acct-B");
    assert_eq!(best.pending_jobs(), 2);
}

#[tokio::test]
async fn test_scope_filter_selects_one_account() {
    let sim = two_account_service();
    let provider = two_account_provider(&sim).await;
    let listing = provider
        .backends(&BackendFilter::new().credential_scope(CredentialScope::new().with_hub("h1")))
        .await;
    assert_eq!(listing.backends.len(), 2);
    assert!(listing
        .backends
        .iter()
        .all(|d| d.credential_id().as_str() == "acct-A"));
}

#[tokio::test]
async fn test_partial_listing_when_one_account_fails() {
    let sim = two_account_service();
    let provider = two_account_provider(&sim).await;
    provider.refresh_backends().await;

    sim.fail_fetches("acct-B", TransportError::Unavailable("maintenance".into()));
    sim.set_backends("acct-A", [simulator("sim1")]);

    let listing = provider.backends(&BackendFilter::new()).await;
    assert_eq!(listing.failures.len(), 1);
    assert_eq!(listing.failures[0].credential_id.as_str(), "acct-B");
    // acct-A is fresh, acct-B keeps its previous listing.
    let names: Vec<_> = listing.backends.iter().map(|d| d.qualified_name()).collect();
    assert_eq!(names, ["sim1@acct-A", "dev1@acct-B"]);

    let err: ProviderError = listing.failures[0].clone().into();
    assert!(matches!(err, ProviderError::CatalogFetch { .. }));
}

#[tokio::test]
async fn test_disable_drops_cached_listing() {
    let sim = two_account_service();
    let mut provider = two_account_provider(&sim).await;
    provider.refresh_backends().await;

    let removed = provider
        .disable_accounts(&CredentialMatcher::any().hub("h2"))
        .await;
    assert_eq!(removed.len(), 1);
    assert!(provider.catalog().fetched_at(&"acct-B".into()).await.is_none());

    let all = provider.cached_backends(&BackendFilter::new()).await;
    assert!(all.iter().all(|d| d.credential_id().as_str() == "acct-A"));

    // Re-enabling starts from an empty cache.
    provider.enable_account(acct("acct-B", "h2")).unwrap();
    assert_eq!(provider.cached_backends(&BackendFilter::new()).await.len(), 2);
}

#[tokio::test]
async fn test_least_busy_with_nothing_operational() {
    let mut offline = device("dev1", 5, 0);
    offline.status = BackendStatus::offline("down");
    let sim = Arc::new(SimTransport::new().with_account("acct-A", [offline]));
    let mut provider = Provider::new(sim);
    provider.enable_account(acct("acct-A", "h1")).unwrap();

    let err = provider.least_busy(&BackendFilter::new()).await.unwrap_err();
    assert!(matches!(err, ProviderError::NoOperationalBackend));
}

#[tokio::test(start_paused = true)]
async fn test_submit_and_wait_for_result() {
    let sim = two_account_service();
    let provider = two_account_provider(&sim).await;
    let target = provider
        .least_busy(&BackendFilter::new().simulator(false))
        .await
        .unwrap();

    let mut job = provider
        .submit(&target, &JobPayload::new("OPENQASM 3; qubit[2] q;", 1000))
        .await
        .unwrap();
    assert_eq!(*job.current_status(), JobStatus::Initializing);

    let result = job.result(Duration::from_secs(30)).await.unwrap();
    assert_eq!(result.backend_name, "dev1");
    assert_eq!(result.counts().unwrap().total_shots(), 1000);
    assert_eq!(*job.current_status(), JobStatus::Done);

    let (backend, _) = sim.submitted(job.job_id()).unwrap();
    assert_eq!(backend, "dev1");

    job.result(Duration::from_secs(30)).await.unwrap();
    assert_eq!(sim.calls().fetch_result, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_job_is_never_resurrected() {
    let sim = two_account_service();
    sim.script_next_job(vec![
        JobPoll::queued_at(1),
        JobPoll::new(JobStatus::Cancelled),
        JobPoll::new(JobStatus::Running),
        JobPoll::new(JobStatus::Done),
    ]);
    let provider = two_account_provider(&sim).await;
    let target = provider.backend("dev1", Some(&"acct-A".into())).await.unwrap();
    let mut job = provider
        .submit(&target, &JobPayload::new("OPENQASM 3;", 10))
        .await
        .unwrap();

    assert_eq!(job.status().await.unwrap(), JobStatus::Queued);
    assert_eq!(job.status().await.unwrap(), JobStatus::Cancelled);
    assert_eq!(job.status().await.unwrap(), JobStatus::Cancelled);
    assert_eq!(job.status().await.unwrap(), JobStatus::Cancelled);

    assert!(!job.cancel().await.unwrap());
    assert_eq!(sim.calls().cancel_job, 0);
    assert!(matches!(
        job.result(Duration::from_secs(1)).await,
        Err(ProviderError::JobCancelled(_))
    ));
    assert_eq!(sim.calls().fetch_result, 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_leaves_job_running() {
    let sim = two_account_service();
    sim.script_next_job(vec![JobPoll::queued_at(3), JobPoll::new(JobStatus::Running)]);
    let provider = two_account_provider(&sim).await;
    let target = provider.backend("sim1", None).await.unwrap();
    let mut job = provider
        .submit(&target, &JobPayload::new("OPENQASM 3;", 10))
        .await
        .unwrap();

    let err = job.result(Duration::from_secs(2)).await.unwrap_err();
    assert!(matches!(err, ProviderError::Timeout { .. }));
    assert_eq!(*job.current_status(), JobStatus::Running);
    assert_eq!(sim.calls().cancel_job, 0);
    assert_eq!(sim.calls().fetch_result, 0);
}

#[tokio::test(start_paused = true)]
async fn test_reattach_to_submitted_job() {
    let sim = two_account_service();
    let provider = two_account_provider(&sim).await;
    let target = provider.backend("dev1", Some(&"acct-B".into())).await.unwrap();
    let job_id = provider
        .submit(&target, &JobPayload::new("OPENQASM 3;", 10))
        .await
        .unwrap()
        .job_id()
        .clone();

    let mut again = provider.job(&"acct-B".into(), job_id, "dev1").unwrap();
    let result = again.result(Duration::from_secs(30)).await.unwrap();
    assert_eq!(result.backend_name, "dev1");
}

#[tokio::test]
async fn test_submission_to_offline_backend_fails_locally() {
    let sim = two_account_service();
    let provider = two_account_provider(&sim).await;
    let mut target = provider.backend("dev1", Some(&"acct-A".into())).await.unwrap();
    target.status = BackendStatus::offline("calibrating");

    let err = provider
        .submit(&target, &JobPayload::new("OPENQASM 3;", 10))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Submission { .. }));
    assert_eq!(sim.calls().submit_job, 0);
}

#[tokio::test]
async fn test_accounts_survive_a_session_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonCredentialStore::new(dir.path().join("credentials.json"));
    let sim = two_account_service();

    let first = Provider::new(sim.clone());
    first.save_account(&store, &acct("acct-A", "h1")).await.unwrap();
    first.save_account(&store, &acct("acct-B", "h2")).await.unwrap();

    let mut second = Provider::new(sim);
    assert_eq!(second.load_accounts(&store).await.unwrap(), 2);
    let listing = second.backends(&BackendFilter::new()).await;
    assert_eq!(listing.backends.len(), 3);

    let deleted = second
        .delete_accounts(&store, &CredentialMatcher::id("acct-A"))
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(store.path().file_name().unwrap(), "credentials.json");
}
