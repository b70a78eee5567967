//! Cloud REST API client.
//!
//! One [`CloudClient`] talks to the service on behalf of one credential:
//! - Listing backends with their configuration and status
//! - Fetching calibration properties
//! - Submitting sampler jobs, polling, cancelling and reading results
//!
//! Wire types live at the bottom of this module and are converted into
//! `orrery-hal` records before they leave the crate.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode, header};
use serde::{Deserialize, Serialize};

use orrery_hal::{
    BackendConfiguration, BackendDescriptor, BackendProperties, BackendStatus, Counts, Credential,
    CredentialScope, ExperimentResult, GateProperties, JobId, JobPayload, JobPoll, JobResult,
    JobStatus, QubitProperties,
};

use crate::decode::{counts_from_map, counts_from_samples};
use crate::error::{CloudError, CloudResult};

/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// User-Agent sent with requests.
const USER_AGENT: &str = concat!("orrery/", env!("CARGO_PKG_VERSION"));

/// Cloud API client bound to one credential.
pub struct CloudClient {
    client: Client,
    endpoint: String,
    token: String,
    scope: CredentialScope,
}

impl fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudClient")
            .field("endpoint", &self.endpoint)
            .field("token", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

impl CloudClient {
    /// Build a client for `credential`.
    pub fn new(credential: &Credential, request_timeout: Duration) -> CloudResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", credential.token))
                .map_err(|_| CloudError::InvalidToken)?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(request_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint: credential.endpoint_url.trim_end_matches('/').to_string(),
            token: credential.token.clone(),
            scope: credential.scope.clone(),
        })
    }

    /// Whether this client was built from the same token, endpoint and scope.
    pub fn serves(&self, credential: &Credential) -> bool {
        self.token == credential.token
            && self.endpoint == credential.endpoint_url.trim_end_matches('/')
            && self.scope == credential.scope
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.endpoint)
    }

    /// List backends with configuration and status.
    ///
    /// Devices whose configuration cannot be fetched are skipped.
    pub async fn list_backends(&self) -> CloudResult<Vec<BackendDescriptor>> {
        let response = self.client.get(self.url("backends")).send().await?;
        let devices: DevicesResponse = check(response, "backends").await?.json().await?;

        let mut backends = Vec::with_capacity(devices.devices.len());
        for device in &devices.devices {
            match self.get_backend(&device.name).await {
                Ok(descriptor) => backends.push(descriptor),
                Err(e) => tracing::warn!("skipping backend {}: {e}", device.name),
            }
        }
        Ok(backends)
    }

    /// Fetch one backend's configuration and status.
    pub async fn get_backend(&self, name: &str) -> CloudResult<BackendDescriptor> {
        let response = self
            .client
            .get(self.url(&format!("backends/{name}/configuration")))
            .send()
            .await?;
        let config: BackendConfigResponse = check(response, name).await?.json().await?;

        let response = self
            .client
            .get(self.url(&format!("backends/{name}/status")))
            .send()
            .await?;
        let status = if response.status().is_success() {
            response.json::<BackendStatusResponse>().await?.into()
        } else {
            tracing::debug!(backend = name, status = %response.status(), "No status reported");
            BackendStatus {
                operational: false,
                pending_jobs: 0,
                status_msg: Some("status unavailable".to_string()),
            }
        };

        let name = config.backend_name.clone();
        Ok(BackendDescriptor::new(name, config.into(), status))
    }

    /// Fetch calibration data. A backend without calibration reports `None`.
    pub async fn get_properties(&self, name: &str) -> CloudResult<Option<BackendProperties>> {
        let response = self
            .client
            .get(self.url(&format!("backends/{name}/properties")))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let props: PropertiesResponse = check(response, name).await?.json().await?;
        Ok(Some(props.into()))
    }

    /// Submit a sampler job.
    pub async fn submit_job(&self, backend: &str, payload: &JobPayload) -> CloudResult<JobId> {
        let request = SamplerJobRequest {
            program_id: "sampler",
            backend,
            hub: self.scope.hub.as_deref(),
            group: self.scope.group.as_deref(),
            project: self.scope.project.as_deref(),
            params: SamplerParams {
                circuits: &payload.circuits,
                shots: payload.shots,
            },
            tags: &payload.tags,
        };

        let response = self.client.post(self.url("jobs")).json(&request).send().await?;
        let submitted: SubmitResponse = check(response, backend).await?.json().await?;
        tracing::debug!(job_id = %submitted.id, backend, "Job accepted");
        Ok(JobId::new(submitted.id))
    }

    /// Fetch the raw status record of a job.
    pub async fn get_job_status(&self, job_id: &JobId) -> CloudResult<JobStatusResponse> {
        let response = self
            .client
            .get(self.url(&format!("jobs/{job_id}")))
            .send()
            .await?;
        Ok(check(response, &job_id.0).await?.json().await?)
    }

    /// Request cancellation. A conflict means the job can no longer be cancelled.
    pub async fn cancel_job(&self, job_id: &JobId) -> CloudResult<bool> {
        let response = self
            .client
            .post(self.url(&format!("jobs/{job_id}/cancel")))
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(false);
        }
        check(response, &job_id.0).await?;
        Ok(true)
    }

    /// Fetch and decode the results of a finished job.
    pub async fn get_job_results(&self, job_id: &JobId, backend: &str) -> CloudResult<JobResult> {
        let response = self
            .client
            .get(self.url(&format!("jobs/{job_id}/results")))
            .send()
            .await?;
        let results: JobResultResponse = check(response, &job_id.0).await?.json().await?;
        Ok(results.into_job_result(job_id.clone(), backend))
    }
}

/// Turn a non-success response into the matching error.
async fn check(response: Response, what: &str) -> CloudResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "no body".to_string());
    let message = serde_json::from_str::<ApiErrorResponse>(&body)
        .map(|e| e.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or(body);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CloudError::Unauthorized(message),
        StatusCode::NOT_FOUND => CloudError::NotFound(what.to_string()),
        StatusCode::SERVICE_UNAVAILABLE => CloudError::Unavailable(message),
        _ => CloudError::ApiError {
            status: status.as_u16(),
            message,
        },
    })
}

// ============================================================================
// Request types
// ============================================================================

/// Sampler job request.
#[derive(Debug, Serialize)]
struct SamplerJobRequest<'a> {
    program_id: &'static str,
    backend: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    hub: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<&'a str>,
    params: SamplerParams<'a>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    tags: &'a [String],
}

#[derive(Debug, Serialize)]
struct SamplerParams<'a> {
    /// OpenQASM 3 programs.
    circuits: &'a [String],
    shots: u32,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    message: String,
}

/// Device listing (`{"devices": [...]}`).
#[derive(Debug, Deserialize)]
struct DevicesResponse {
    devices: Vec<DeviceEntry>,
}

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    name: String,
}

/// `/backends/{name}/configuration`.
#[derive(Debug, Deserialize)]
struct BackendConfigResponse {
    backend_name: String,
    n_qubits: u32,
    #[serde(default)]
    basis_gates: Vec<String>,
    #[serde(default)]
    coupling_map: Option<Vec<[u32; 2]>>,
    #[serde(default)]
    processor_type: Option<ProcessorType>,
    #[serde(default)]
    simulator: Option<bool>,
    #[serde(default)]
    max_shots: Option<u32>,
    #[serde(default)]
    max_experiments: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProcessorType {
    family: String,
}

impl From<BackendConfigResponse> for BackendConfiguration {
    fn from(config: BackendConfigResponse) -> Self {
        Self {
            n_qubits: config.n_qubits,
            simulator: config.simulator.unwrap_or(false),
            basis_gates: config.basis_gates,
            coupling_map: config.coupling_map.unwrap_or_default(),
            max_shots: config.max_shots,
            max_experiments: config.max_experiments,
            processor_family: config.processor_type.map(|p| p.family),
        }
    }
}

/// `/backends/{name}/status`.
#[derive(Debug, Deserialize)]
struct BackendStatusResponse {
    /// Whether the backend accepts jobs.
    state: bool,
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    length_queue: u64,
}

impl From<BackendStatusResponse> for BackendStatus {
    fn from(s: BackendStatusResponse) -> Self {
        let status_msg = if s.message.is_empty() { s.status } else { s.message };
        Self {
            operational: s.state,
            pending_jobs: u32::try_from(s.length_queue).unwrap_or(u32::MAX),
            status_msg: (!status_msg.is_empty()).then_some(status_msg),
        }
    }
}

/// `/backends/{name}/properties`.
#[derive(Debug, Deserialize)]
struct PropertiesResponse {
    #[serde(default)]
    last_update_date: Option<DateTime<Utc>>,
    /// One list of named parameters per qubit.
    #[serde(default)]
    qubits: Vec<Vec<Parameter>>,
    #[serde(default)]
    gates: Vec<GateEntry>,
}

#[derive(Debug, Deserialize)]
struct Parameter {
    name: String,
    value: f64,
    #[serde(default)]
    unit: String,
}

impl Parameter {
    /// Value converted to microseconds.
    fn micros(&self) -> f64 {
        match self.unit.as_str() {
            "ns" => self.value / 1e3,
            "ms" => self.value * 1e3,
            "s" => self.value * 1e6,
            _ => self.value,
        }
    }

    /// Value converted to nanoseconds.
    fn nanos(&self) -> f64 {
        match self.unit.as_str() {
            "us" | "µs" => self.value * 1e3,
            "ms" => self.value * 1e6,
            "s" => self.value * 1e9,
            _ => self.value,
        }
    }

    /// Value converted to GHz.
    fn gigahertz(&self) -> f64 {
        match self.unit.as_str() {
            "MHz" => self.value / 1e3,
            "kHz" => self.value / 1e6,
            "Hz" => self.value / 1e9,
            _ => self.value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GateEntry {
    gate: String,
    qubits: Vec<u32>,
    #[serde(default)]
    parameters: Vec<Parameter>,
}

impl From<PropertiesResponse> for BackendProperties {
    fn from(props: PropertiesResponse) -> Self {
        let qubits = props
            .qubits
            .iter()
            .map(|params| {
                let mut q = QubitProperties::default();
                for p in params {
                    match p.name.as_str() {
                        "T1" => q.t1_us = Some(p.micros()),
                        "T2" => q.t2_us = Some(p.micros()),
                        "frequency" => q.frequency_ghz = Some(p.gigahertz()),
                        "readout_error" => q.readout_error = Some(p.value),
                        _ => {}
                    }
                }
                q
            })
            .collect();

        let gates = props
            .gates
            .into_iter()
            .map(|g| {
                let find = |name: &str| g.parameters.iter().find(|p| p.name == name);
                GateProperties {
                    error: find("gate_error").map(|p| p.value),
                    length_ns: find("gate_length").map(Parameter::nanos),
                    gate: g.gate,
                    qubits: g.qubits,
                }
            })
            .collect();

        Self {
            last_update: props.last_update_date,
            qubits,
            gates,
        }
    }
}

/// Job submission response.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

/// Job status record.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    /// Job ID.
    pub id: String,
    /// Service status string, in any case.
    pub status: String,
    /// Backend name.
    #[serde(default)]
    pub backend: Option<String>,
    /// Position in the backend queue.
    #[serde(default)]
    pub queue_position: Option<u32>,
    /// Failure details.
    #[serde(default)]
    pub error: Option<JobErrorInfo>,
    /// State object with a failure reason.
    #[serde(default)]
    pub state: Option<JobState>,
}

/// Failure details on a job record.
#[derive(Debug, Clone, Deserialize)]
pub struct JobErrorInfo {
    /// Error message.
    pub message: String,
}

/// State object with a failure reason.
#[derive(Debug, Clone, Deserialize)]
pub struct JobState {
    /// Reason for failure.
    #[serde(default)]
    pub reason: Option<String>,
}

impl JobStatusResponse {
    /// The failure reason, preferring `state.reason` over `error.message`.
    pub fn error_message(&self) -> Option<String> {
        self.state
            .as_ref()
            .and_then(|s| s.reason.clone())
            .or_else(|| self.error.as_ref().map(|e| e.message.clone()))
    }

    /// Map the service status onto the job state machine.
    pub fn job_status(&self) -> CloudResult<JobStatus> {
        Ok(match self.status.to_uppercase().as_str() {
            "INITIALIZING" | "VALIDATING" => JobStatus::Initializing,
            "QUEUED" => JobStatus::Queued,
            "RUNNING" => JobStatus::Running,
            "COMPLETED" | "DONE" => JobStatus::Done,
            "CANCELLED" => JobStatus::Cancelled,
            "FAILED" | "ERROR" => JobStatus::Error(
                self.error_message()
                    .unwrap_or_else(|| "job failed".to_string()),
            ),
            _ => return Err(CloudError::UnknownStatus(self.status.clone())),
        })
    }

    /// Convert into a poll report.
    pub fn to_poll(&self) -> CloudResult<JobPoll> {
        let status = self.job_status()?;
        let queue_position = if status == JobStatus::Queued {
            self.queue_position
        } else {
            None
        };
        Ok(JobPoll {
            status,
            queue_position,
        })
    }
}

/// Job results.
#[derive(Debug, Deserialize)]
struct JobResultResponse {
    results: Vec<SamplerResult>,
}

/// Sampler output for one circuit.
#[derive(Debug, Deserialize)]
struct SamplerResult {
    /// Per-register raw samples.
    #[serde(default)]
    data: Option<HashMap<String, RegisterSamples>>,
    /// Pre-aggregated counts.
    #[serde(default)]
    counts: Option<HashMap<String, u64>>,
    #[serde(default)]
    metadata: Option<ResultMetadata>,
}

#[derive(Debug, Deserialize)]
struct RegisterSamples {
    samples: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ResultMetadata {
    #[serde(default)]
    name: Option<String>,
}

impl JobResultResponse {
    fn into_job_result(self, job_id: JobId, backend: &str) -> JobResult {
        let experiments = self
            .results
            .into_iter()
            .map(|r| {
                let counts = match (&r.counts, &r.data) {
                    (Some(counts), _) => counts_from_map(counts),
                    (None, Some(data)) => {
                        let mut merged = Counts::new();
                        for register in data.values() {
                            for (bits, &n) in counts_from_samples(&register.samples).iter() {
                                merged.insert(bits.clone(), n);
                            }
                        }
                        merged
                    }
                    (None, None) => Counts::new(),
                };
                let mut experiment = ExperimentResult::from_counts(counts);
                experiment.name = r.metadata.and_then(|m| m.name);
                experiment
            })
            .collect();

        JobResult {
            job_id,
            backend_name: backend.to_string(),
            experiments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(json: &str) -> JobStatusResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_job_status_mapping() {
        let cases = [
            ("Initializing", JobStatus::Initializing),
            ("VALIDATING", JobStatus::Initializing),
            ("Queued", JobStatus::Queued),
            ("RUNNING", JobStatus::Running),
            ("Completed", JobStatus::Done),
            ("DONE", JobStatus::Done),
            ("Cancelled", JobStatus::Cancelled),
        ];
        for (raw, expected) in cases {
            let resp = status(&format!(r#"{{"id": "j", "status": "{raw}"}}"#));
            assert_eq!(resp.job_status().unwrap(), expected, "{raw}");
        }
    }

    #[test]
    fn test_failed_status_carries_reason() {
        let resp = status(
            r#"{"id": "j", "status": "Failed",
                "state": {"reason": "circuit too deep"},
                "error": {"message": "legacy"}}"#,
        );
        assert_eq!(
            resp.job_status().unwrap(),
            JobStatus::Error("circuit too deep".into())
        );

        let legacy = status(r#"{"id": "j", "status": "ERROR", "error": {"message": "boom"}}"#);
        assert_eq!(legacy.job_status().unwrap(), JobStatus::Error("boom".into()));
    }

    #[test]
    fn test_unknown_status_is_error() {
        let resp = status(r#"{"id": "j", "status": "HIBERNATING"}"#);
        assert!(matches!(
            resp.job_status(),
            Err(CloudError::UnknownStatus(s)) if s == "HIBERNATING"
        ));
    }

    #[test]
    fn test_queue_position_only_while_queued() {
        let queued = status(r#"{"id": "j", "status": "QUEUED", "queue_position": 4}"#);
        assert_eq!(queued.to_poll().unwrap(), JobPoll::queued_at(4));

        let running = status(r#"{"id": "j", "status": "RUNNING", "queue_position": 4}"#);
        assert_eq!(running.to_poll().unwrap().queue_position, None);
    }

    #[test]
    fn test_sampler_request_serialization() {
        let circuits = vec!["OPENQASM 3.0; qubit q;".to_string()];
        let request = SamplerJobRequest {
            program_id: "sampler",
            backend: "falcon_5q",
            hub: Some("open"),
            group: None,
            project: None,
            params: SamplerParams {
                circuits: &circuits,
                shots: 1000,
            },
            tags: &[],
        };
        let json: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert_eq!(json["backend"], "falcon_5q");
        assert_eq!(json["hub"], "open");
        assert_eq!(json["params"]["shots"], 1000);
        assert!(json.get("group").is_none());
        assert!(json.get("tags").is_none());
    }

    #[test]
    fn test_devices_response_deserialization() {
        let json = r#"{"devices": [
            {"name": "falcon_5q", "status": {"name": "online"}},
            {"name": "eagle_127q", "status": {"name": "online"}}
        ]}"#;
        let resp: DevicesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.devices.len(), 2);
        assert_eq!(resp.devices[1].name, "eagle_127q");
    }

    #[test]
    fn test_configuration_conversion() {
        let json = r#"{
            "backend_name": "falcon_5q",
            "n_qubits": 5,
            "basis_gates": ["cx", "id", "rz", "sx", "x"],
            "coupling_map": [[0, 1], [1, 2]],
            "processor_type": {"family": "Falcon", "revision": "5.11"},
            "max_shots": 100000
        }"#;
        let config: BackendConfiguration =
            serde_json::from_str::<BackendConfigResponse>(json).unwrap().into();
        assert_eq!(config.n_qubits, 5);
        assert!(!config.simulator);
        assert_eq!(config.coupling_map, vec![[0, 1], [1, 2]]);
        assert_eq!(config.processor_family.as_deref(), Some("Falcon"));
        assert_eq!(config.max_shots, Some(100_000));
    }

    #[test]
    fn test_status_conversion() {
        let json = r#"{"state": false, "status": "maintenance", "message": "", "length_queue": 12}"#;
        let status: BackendStatus = serde_json::from_str::<BackendStatusResponse>(json)
            .unwrap()
            .into();
        assert!(!status.operational);
        assert_eq!(status.pending_jobs, 12);
        assert_eq!(status.status_msg.as_deref(), Some("maintenance"));
    }

    #[test]
    fn test_properties_conversion() {
        let json = r#"{
            "last_update_date": "2026-03-01T08:00:00Z",
            "qubits": [[
                {"name": "T1", "value": 0.12, "unit": "ms"},
                {"name": "T2", "value": 95.0, "unit": "us"},
                {"name": "frequency", "value": 5100.0, "unit": "MHz"},
                {"name": "readout_error", "value": 0.02, "unit": ""}
            ]],
            "gates": [{
                "gate": "cx", "qubits": [0, 1],
                "parameters": [
                    {"name": "gate_error", "value": 0.008, "unit": ""},
                    {"name": "gate_length", "value": 0.3, "unit": "us"}
                ]
            }]
        }"#;
        let props: BackendProperties =
            serde_json::from_str::<PropertiesResponse>(json).unwrap().into();
        assert!(props.last_update.is_some());
        let q = &props.qubits[0];
        assert!((q.t1_us.unwrap() - 120.0).abs() < 1e-9);
        assert!((q.t2_us.unwrap() - 95.0).abs() < 1e-9);
        assert!((q.frequency_ghz.unwrap() - 5.1).abs() < 1e-9);
        assert_eq!(q.readout_error, Some(0.02));
        let g = &props.gates[0];
        assert_eq!(g.qubits, vec![0, 1]);
        assert_eq!(g.error, Some(0.008));
        assert!((g.length_ns.unwrap() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_results_from_samples_and_counts() {
        let json = r#"{"results": [
            {"data": {"c": {"samples": ["0x0", "0x3", "0x3"]}}, "metadata": {"name": "bell"}},
            {"counts": {"0x1": 7, "0x2": 3}}
        ]}"#;
        let resp: JobResultResponse = serde_json::from_str(json).unwrap();
        let result = resp.into_job_result(JobId::new("j-1"), "falcon_5q");
        assert_eq!(result.backend_name, "falcon_5q");
        assert_eq!(result.experiments.len(), 2);

        let bell = &result.experiments[0];
        assert_eq!(bell.name.as_deref(), Some("bell"));
        assert_eq!(bell.shots, 3);
        assert_eq!(bell.counts.get("11"), 2);

        let second = &result.experiments[1];
        assert_eq!(second.counts.get("01"), 7);
        assert_eq!(second.counts.get("10"), 3);
    }

    #[test]
    fn test_client_debug_redacts_token() {
        let cred = Credential::new("c", "super-secret", "https://api.example.com/");
        let client = CloudClient::new(&cred, DEFAULT_REQUEST_TIMEOUT).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
        assert!(client.serves(&cred));
        assert!(!client.serves(&Credential::new("c", "other", "https://api.example.com")));
    }

    #[test]
    fn test_invalid_token_rejected() {
        let cred = Credential::new("c", "bad\ntoken", "https://api.example.com");
        assert!(matches!(
            CloudClient::new(&cred, DEFAULT_REQUEST_TIMEOUT),
            Err(CloudError::InvalidToken)
        ));
    }
}
