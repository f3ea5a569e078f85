//! Simulated sensor readings

use meteo_protocol::Variable;
use rand::Rng;
use std::ops::Range;

/// Plausible range for a variable, keyed by a substring of its name.
pub fn range_for(name: &str) -> Range<f64> {
    let name = name.to_ascii_lowercase();
    if name.contains("temperature") {
        10.0..30.0
    } else if name.contains("humidity") {
        30.0..90.0
    } else if name.contains("pressure") {
        980.0..1030.0
    } else {
        0.0..100.0
    }
}

/// Two decimals, so both wire encodings carry the exact same value.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Fresh values for every variable, order and units preserved.
pub fn sample<R: Rng>(rng: &mut R, variables: &[Variable]) -> Vec<Variable> {
    variables
        .iter()
        .map(|v| v.with_value(round2(rng.gen_range(range_for(&v.name)))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_ranges_by_name() {
        assert_eq!(range_for("temperature"), 10.0..30.0);
        assert_eq!(range_for("Outdoor_Temperature"), 10.0..30.0);
        assert_eq!(range_for("humidity"), 30.0..90.0);
        assert_eq!(range_for("pressure"), 980.0..1030.0);
        assert_eq!(range_for("wind"), 0.0..100.0);
    }

    #[test]
    fn test_samples_stay_in_range_with_two_decimals() {
        let mut rng = StdRng::seed_from_u64(7);
        let vars = vec![
            Variable::new("temperature", 0.0, "C"),
            Variable::new("humidity", 0.0, "%"),
            Variable::new("pressure", 0.0, "hPa"),
            Variable::new("wind", 0.0, "km/h"),
        ];
        for _ in 0..200 {
            let sampled = sample(&mut rng, &vars);
            assert_eq!(sampled.len(), vars.len());
            for (fresh, template) in sampled.iter().zip(&vars) {
                let range = range_for(&template.name);
                assert!(fresh.value >= range.start && fresh.value <= range.end, "{fresh}");
                assert_eq!(fresh.unit, template.unit);
                assert_eq!(round2(fresh.value), fresh.value);
            }
        }
    }
}
