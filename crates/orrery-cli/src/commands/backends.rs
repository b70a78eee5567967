//! Backend discovery commands.

use anyhow::Result;
use console::style;

use orrery_hal::CredentialId;

use super::common::{self, FilterArgs, SessionArgs, print_backend, warn_failures};

/// List backends matching the filter flags.
pub async fn list(args: &SessionArgs, filter: &FilterArgs, json: bool) -> Result<()> {
    let session = common::open(args).await?;
    if session.provider.registry().is_empty() {
        anyhow::bail!("No accounts enabled. Add one with 'orrery account save' or use --sim.");
    }

    let listing = session.provider.backends(&filter.to_filter()).await;
    warn_failures(&listing);

    if json {
        println!("{}", serde_json::to_string_pretty(&listing.backends)?);
        return Ok(());
    }

    if listing.backends.is_empty() {
        println!("No backends match.");
        return Ok(());
    }

    println!(
        "{} {} backend{}:\n",
        style("Orrery").cyan().bold(),
        listing.backends.len(),
        if listing.backends.len() == 1 { "" } else { "s" }
    );
    for backend in &listing.backends {
        print_backend(backend);
        println!();
    }
    Ok(())
}

/// Show the least busy operational backend matching the filter flags.
pub async fn least_busy(args: &SessionArgs, filter: &FilterArgs) -> Result<()> {
    let session = common::open(args).await?;
    let backend = session.provider.least_busy(&filter.to_filter()).await?;

    println!("{} Least busy backend:\n", style("Orrery").cyan().bold());
    print_backend(&backend);
    Ok(())
}

/// Show calibration data for one backend.
pub async fn properties(args: &SessionArgs, name: &str, account: Option<&str>) -> Result<()> {
    let session = common::open(args).await?;
    let account = account.map(CredentialId::from);
    let backend = session.provider.backend(name, account.as_ref()).await?;
    let backend = session.provider.backend_properties(&backend).await?;

    print_backend(&backend);
    let Some(props) = &backend.properties else {
        println!("    No calibration data reported.");
        return Ok(());
    };

    if let Some(updated) = props.last_update {
        println!("    Calibrated: {}", updated.format("%Y-%m-%d %H:%M UTC"));
    }
    println!(
        "\n    {:>5} {:>9} {:>9} {:>9} {:>9}",
        "qubit", "T1 (us)", "T2 (us)", "f (GHz)", "readout"
    );
    for (index, qubit) in props.qubits.iter().enumerate() {
        println!(
            "    {:>5} {:>9} {:>9} {:>9} {:>9}",
            index,
            fmt_value(qubit.t1_us, 1),
            fmt_value(qubit.t2_us, 1),
            fmt_value(qubit.frequency_ghz, 3),
            fmt_value(qubit.readout_error, 4),
        );
    }

    if !props.gates.is_empty() {
        println!("\n    {:>8} {:>10} {:>10} {:>10}", "gate", "qubits", "error", "length ns");
        for gate in &props.gates {
            let qubits = gate
                .qubits
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            println!(
                "    {:>8} {:>10} {:>10} {:>10}",
                gate.gate,
                qubits,
                fmt_value(gate.error, 5),
                fmt_value(gate.length_ns, 0),
            );
        }
    }
    Ok(())
}

fn fmt_value(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.precision$}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_value() {
        assert_eq!(fmt_value(None, 2), "-");
        assert_eq!(fmt_value(Some(1.23456), 2), "1.23");
        assert_eq!(fmt_value(Some(35.6), 0), "36");
    }

    #[tokio::test]
    async fn test_sim_commands_succeed() {
        let args = SessionArgs {
            sim: true,
            config: None,
        };
        list(&args, &FilterArgs::default(), false).await.unwrap();
        list(&args, &FilterArgs::default(), true).await.unwrap();
        least_busy(&args, &FilterArgs::default()).await.unwrap();
    }
}
