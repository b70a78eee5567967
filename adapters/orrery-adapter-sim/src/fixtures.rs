//! Ready-made service used by the CLI's offline mode.

use chrono::Utc;

use orrery_hal::{
    BackendConfiguration, BackendDescriptor, BackendProperties, BackendStatus, Credential,
    GateProperties, QubitProperties,
};

use crate::SimTransport;

const DEMO_ENDPOINT: &str = "sim://orrery";

/// Credentials matching the accounts of [`demo_service`].
pub fn demo_credentials() -> Vec<Credential> {
    vec![
        Credential::new("demo-open", "demo-token-open", DEMO_ENDPOINT)
            .with_name("Open plan")
            .with_hub("open")
            .with_group("main")
            .with_project("main"),
        Credential::new("demo-premium", "demo-token-premium", DEMO_ENDPOINT)
            .with_name("Premium plan")
            .with_hub("research")
            .with_group("physics")
            .with_project("qec"),
    ]
}

fn heavy_hex_5() -> Vec<[u32; 2]> {
    vec![[0, 1], [1, 0], [1, 2], [2, 1], [1, 3], [3, 1], [3, 4], [4, 3]]
}

fn demo_properties(n_qubits: u32) -> BackendProperties {
    BackendProperties {
        last_update: Some(Utc::now()),
        qubits: (0..n_qubits)
            .map(|i| QubitProperties {
                t1_us: Some(110.0 + f64::from(i)),
                t2_us: Some(85.0 + f64::from(i)),
                frequency_ghz: Some(4.9 + f64::from(i) * 0.01),
                readout_error: Some(0.012 + f64::from(i) * 0.001),
            })
            .collect(),
        gates: vec![GateProperties {
            gate: "cx".into(),
            qubits: vec![0, 1],
            error: Some(0.008),
            length_ns: Some(300.0),
        }],
    }
}

/// Two accounts that both expose a device called `falcon`.
pub fn demo_service() -> SimTransport {
    let gates = ["cx", "id", "rz", "sx", "x"];
    SimTransport::new()
        .with_account(
            "demo-open",
            [
                BackendDescriptor::new(
                    "aer_simulator",
                    BackendConfiguration::simulator(32),
                    BackendStatus::active(0),
                ),
                BackendDescriptor::new(
                    "falcon",
                    BackendConfiguration::device(5, gates)
                        .with_coupling_map(heavy_hex_5())
                        .with_max_shots(100_000)
                        .with_processor_family("Falcon"),
                    BackendStatus::active(6),
                ),
            ],
        )
        .with_account(
            "demo-premium",
            [
                BackendDescriptor::new(
                    "falcon",
                    BackendConfiguration::device(20, gates)
                        .with_max_shots(100_000)
                        .with_processor_family("Falcon"),
                    BackendStatus::active(2),
                ),
                BackendDescriptor::new(
                    "eagle",
                    BackendConfiguration::device(127, gates).with_processor_family("Eagle"),
                    BackendStatus::offline("calibrating"),
                ),
            ],
        )
        .with_properties("demo-open", "falcon", demo_properties(5))
        .with_properties("demo-premium", "falcon", demo_properties(20))
}
