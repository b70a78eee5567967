//! Measurement decoding.
//!
//! The service reports outcomes either as pre-aggregated counts keyed by
//! hex (`"0x3"`) or binary (`"011"`) strings, or as raw per-shot samples
//! grouped by classical register.

use std::collections::HashMap;

use orrery_hal::Counts;

/// Infer the classical register width from hex outcomes.
///
/// The widest value decides; all-zero outcomes need one bit.
pub(crate) fn infer_bit_width<'a>(outcomes: impl IntoIterator<Item = &'a str>) -> usize {
    let max_val = outcomes
        .into_iter()
        .filter_map(|s| s.strip_prefix("0x"))
        .filter_map(|hex| u64::from_str_radix(hex, 16).ok())
        .max()
        .unwrap_or(0);

    if max_val == 0 {
        1
    } else {
        64 - max_val.leading_zeros() as usize
    }
}

/// Render an outcome as a bitstring of at least `width` bits.
///
/// Outcomes without a `0x` prefix are taken to be bitstrings already.
pub(crate) fn to_bitstring(outcome: &str, width: usize) -> String {
    match outcome.strip_prefix("0x") {
        Some(hex) => match u64::from_str_radix(hex, 16) {
            Ok(value) => format!("{value:0>width$b}"),
            Err(_) => outcome.to_string(),
        },
        None => outcome.to_string(),
    }
}

/// Normalise a counts map to bitstring keys.
pub(crate) fn counts_from_map(raw: &HashMap<String, u64>) -> Counts {
    let width = infer_bit_width(raw.keys().map(String::as_str));
    raw.iter()
        .map(|(outcome, &n)| (to_bitstring(outcome, width), n))
        .collect()
}

/// Aggregate per-shot samples into a histogram.
pub(crate) fn counts_from_samples(samples: &[String]) -> Counts {
    let width = infer_bit_width(samples.iter().map(String::as_str));
    samples
        .iter()
        .map(|s| (to_bitstring(s, width), 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_bitstring() {
        assert_eq!(to_bitstring("0x0", 1), "0");
        assert_eq!(to_bitstring("0x3", 2), "11");
        assert_eq!(to_bitstring("0x1", 4), "0001");
        assert_eq!(to_bitstring("0xff", 4), "11111111");
        assert_eq!(to_bitstring("0101", 8), "0101");
    }

    #[test]
    fn test_infer_bit_width() {
        assert_eq!(infer_bit_width(["0x0", "0x0"]), 1);
        assert_eq!(infer_bit_width(["0x0", "0x3"]), 2);
        assert_eq!(infer_bit_width(["0x4"]), 3);
        assert_eq!(infer_bit_width(["101"]), 1);
    }

    #[test]
    fn test_counts_from_hex_map() {
        let raw: HashMap<String, u64> = [("0x0".to_string(), 500), ("0x3".to_string(), 524)]
            .into_iter()
            .collect();
        let counts = counts_from_map(&raw);
        assert_eq!(counts.get("00"), 500);
        assert_eq!(counts.get("11"), 524);
        assert_eq!(counts.total_shots(), 1024);
    }

    #[test]
    fn test_counts_from_binary_map_unchanged() {
        let raw: HashMap<String, u64> = [("010".to_string(), 7)].into_iter().collect();
        assert_eq!(counts_from_map(&raw).get("010"), 7);
    }

    #[test]
    fn test_counts_from_samples() {
        let samples: Vec<String> = ["0x0", "0x3", "0x0", "0x3", "0x0", "0x0"]
            .into_iter()
            .map(String::from)
            .collect();
        let counts = counts_from_samples(&samples);
        assert_eq!(counts.get("00"), 4);
        assert_eq!(counts.get("11"), 2);
        assert_eq!(counts.get("01"), 0);
    }
}
