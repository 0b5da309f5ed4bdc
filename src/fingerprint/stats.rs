//! Sample statistics over timing measurements.

pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Sample standard deviation (n - 1 denominator). Zero for fewer than two
/// samples.
pub fn stdev(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let m = mean(samples);
    let var = samples.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
    var.sqrt()
}

/// Coefficient of variation; zero when the mean is not positive.
pub fn coefficient_of_variation(samples: &[f64]) -> f64 {
    let m = mean(samples);
    if m <= 0.0 {
        return 0.0;
    }
    stdev(samples) / m
}

/// Successive differences `x[i] - x[i-1]`.
pub fn deltas(samples: &[f64]) -> Vec<f64> {
    samples.windows(2).map(|w| w[1] - w[0]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_statistics() {
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&samples), 5.0);
        assert!((stdev(&samples) - 2.138089935299395).abs() < 1e-12);
        assert!((coefficient_of_variation(&samples) - 0.427617987059879).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(stdev(&[3.0]), 0.0);
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), 0.0);
        assert_eq!(stdev(&[5.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn test_deltas() {
        assert_eq!(deltas(&[1.0, 4.0, 2.0]), vec![3.0, -2.0]);
        assert!(deltas(&[1.0]).is_empty());
    }
}
