//! Connection-rule terms of the implicit random geometric graph.
//!
//! Each batch, candidate edges are restricted to neighbors within a radius
//! `r(n)` (or to the `k(n)` nearest), where `n` counts every known state.
//! Shrinking the terms as `n` grows keeps the expected work per batch bounded
//! while preserving almost-sure asymptotic optimality.

use num_traits::Float;

/// How candidate edges are limited during vertex expansion, recomputed
/// whenever the state count changes.
#[derive(Clone, Copy, Debug)]
pub enum ConnectionRule<F> {
    Radius(F),
    KNearest(usize),
}

/// The Lebesgue measure of the unit ball in `dimension` dimensions:
/// pi^(d/2) / gamma(d/2 + 1).
pub fn unit_n_ball_measure(dimension: usize) -> f64 {
    let dim = dimension as f64;
    std::f64::consts::PI.powf(dim / 2.0) / special::Gamma::gamma(dim / 2.0 + 1.0)
}

/// The smallest connection radius constant that keeps the graph
/// asymptotically optimal for a problem of the given measure:
/// 2 ((1 + 1/d) lambda / zeta_d)^(1/d).
pub fn minimum_rgg_radius(dimension: usize, informed_measure: f64) -> f64 {
    let dim = dimension as f64;
    2.0 * ((1.0 + 1.0 / dim) * informed_measure / unit_n_ball_measure(dimension)).powf(1.0 / dim)
}

/// The smallest k-nearest constant: e + e/d.
pub fn minimum_rgg_k(dimension: usize) -> f64 {
    let dim = dimension as f64;
    std::f64::consts::E + std::f64::consts::E / dim
}

/// The connection radius for `n` states: eta * r_min * (ln n / n)^(1/d).
pub fn connection_radius<F: Float>(
    n: usize,
    dimension: usize,
    informed_measure: F,
    rewire_factor: F,
) -> F {
    if n < 2 {
        return F::zero();
    }
    let dim = dimension as f64;
    let card = n as f64;
    let measure = informed_measure.to_f64().unwrap();
    let eta = rewire_factor.to_f64().unwrap();
    let radius =
        eta * minimum_rgg_radius(dimension, measure) * (card.ln() / card).powf(1.0 / dim);
    F::from(radius).unwrap()
}

/// The neighbor count for `n` states: ceil(eta * k_min * ln n).
pub fn connection_k<F: Float>(n: usize, dimension: usize, rewire_factor: F) -> usize {
    if n < 2 {
        return 0;
    }
    let eta = rewire_factor.to_f64().unwrap();
    (eta * minimum_rgg_k(dimension) * (n as f64).ln()).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_ball_measures_match_the_closed_forms() {
        assert!((unit_n_ball_measure(1) - 2.0).abs() < 1e-12);
        assert!((unit_n_ball_measure(2) - std::f64::consts::PI).abs() < 1e-12);
        assert!((unit_n_ball_measure(3) - 4.0 * std::f64::consts::PI / 3.0).abs() < 1e-12);
    }

    #[test]
    fn radius_shrinks_as_the_graph_grows() {
        let r_100 = connection_radius::<f64>(100, 2, 1.0, 1.1);
        let r_1000 = connection_radius::<f64>(1000, 2, 1.0, 1.1);
        assert!(r_100 > r_1000);
        assert!(r_1000 > 0.0);

        // r(n) = eta * 2 ((1 + 1/d) lambda / zeta_d)^(1/d) * (ln n / n)^(1/d)
        let expected = 1.1 * 2.0 * (1.5 / std::f64::consts::PI).sqrt()
            * (100.0f64.ln() / 100.0).sqrt();
        assert!((r_100 - expected).abs() < 1e-12);
    }

    #[test]
    fn k_grows_logarithmically() {
        let k_100 = connection_k::<f64>(100, 2, 1.1);
        let k_1000 = connection_k::<f64>(1000, 2, 1.1);
        let e = std::f64::consts::E;
        let expected = (1.1 * (e + e / 2.0) * 100.0f64.ln()).ceil() as usize;
        assert_eq!(k_100, expected);
        assert!(k_1000 > k_100);
    }

    #[test]
    fn degenerate_counts_produce_no_neighbors() {
        assert_eq!(connection_radius::<f64>(0, 2, 1.0, 1.1), 0.0);
        assert_eq!(connection_radius::<f64>(1, 2, 1.0, 1.1), 0.0);
        assert_eq!(connection_k::<f64>(1, 2, 1.1), 0);
    }
}
