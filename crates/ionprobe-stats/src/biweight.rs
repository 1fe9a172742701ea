//! Tukey's biweight robust location and scale

/// Median of a sample (mean of the middle pair for even counts)
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Tukey's biweight estimate of location and scale
///
/// Starts from the median and the median absolute deviation, then iterates
/// the weighted updates. Points beyond `tuning` MAD-scaled units get zero
/// weight. Returns `(location, scale)`; a sample with zero MAD answers the
/// median with zero scale.
pub fn tukeys_biweight(values: &[f64], tuning: f64, iterations: usize) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }

    let mut m = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - m).abs()).collect();
    let mut s = median(&deviations);
    if s == 0.0 {
        return (m, 0.0);
    }

    for _ in 0..iterations {
        let mut weight_sum = 0.0;
        let mut weighted_sum = 0.0;
        for &v in values {
            let u = (v - m) / (tuning * s);
            if u.abs() < 1.0 {
                let w = (1.0 - u * u) * (1.0 - u * u);
                weight_sum += w;
                weighted_sum += w * v;
            }
        }
        if weight_sum == 0.0 {
            break;
        }
        m = weighted_sum / weight_sum;

        let mut numer = 0.0;
        let mut denom = 0.0;
        for &v in values {
            let u = (v - m) / (tuning * s);
            if u.abs() < 1.0 {
                let t = 1.0 - u * u;
                numer += (v - m) * (v - m) * t.powi(4);
                denom += t * (1.0 - 5.0 * u * u);
            }
        }
        if denom == 0.0 {
            break;
        }
        s = (n as f64 * numer).sqrt() / denom.abs();
    }

    (m, s)
}
