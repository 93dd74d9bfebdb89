// Scalar distance kernels for the low-dimensional listing vectors.
// Two accumulators keep the adds pipelined for the 5-wide similarity rows.

/// Squared Euclidean distance. Mismatched lengths yield `f64::INFINITY`.
#[inline]
pub fn squared_l2(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }

    let mut sum0 = 0.0;
    let mut sum1 = 0.0;
    let mut chunks_a = a.chunks_exact(2);
    let mut chunks_b = b.chunks_exact(2);

    for (x, y) in (&mut chunks_a).zip(&mut chunks_b) {
        let d0 = x[0] - y[0];
        let d1 = x[1] - y[1];
        sum0 += d0 * d0;
        sum1 += d1 * d1;
    }

    for (x, y) in chunks_a.remainder().iter().zip(chunks_b.remainder()) {
        let d = x - y;
        sum0 += d * d;
    }

    sum0 + sum1
}

/// Euclidean distance
#[inline]
pub fn l2_distance(a: &[f64], b: &[f64]) -> f64 {
    squared_l2(a, b).sqrt()
}
