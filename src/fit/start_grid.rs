//! Multi-start seed generation.
//!
//! Sigmoid fits are sensitive to the starting potency: a start several decades
//! away from the true inflection sits on a flat plateau of the objective. We
//! therefore try the heuristic start plus a deterministic log-spaced grid of
//! potency seeds over the observed concentration range.

use crate::math::log_space;
use crate::models::{DataSummary, ModelSetup};

/// Potency seeds spanning `[lo, hi]`.
///
/// A degenerate range (single concentration) yields that one value.
pub fn potency_seeds(lo: f64, hi: f64, steps: usize) -> Vec<f64> {
    if steps == 0 {
        return Vec::new();
    }
    if steps == 1 || hi <= lo {
        return vec![(lo * hi).sqrt()];
    }
    log_space(lo, hi, steps).unwrap_or_default()
}

/// Ordered seed pairs `[a, b]` with `a < b`, for two-inflection models.
pub fn seed_pairs(values: &[f64]) -> Vec<[f64; 2]> {
    let mut out = Vec::new();
    for i in 0..values.len() {
        for j in (i + 1)..values.len() {
            if values[i] < values[j] {
                out.push([values[i], values[j]]);
            }
        }
    }
    out
}

/// Starting points (external units) for one model, heuristic start first.
///
/// Seeds replace only the potency parameters; everything else keeps its
/// heuristic guess.
pub fn start_points(setup: &ModelSetup, data: &DataSummary, seeds_per_potency: usize) -> Vec<Vec<f64>> {
    let base = setup.guess();
    let mut out = vec![base.clone()];
    let seeds = potency_seeds(data.x_min, data.x_max, seeds_per_potency);

    match setup.potency_indices.as_slice() {
        [i] => {
            for &s in &seeds {
                let mut p = base.clone();
                p[*i] = s;
                out.push(p);
            }
        }
        [i, j] => {
            for [a, b] in seed_pairs(&seeds) {
                let mut p = base.clone();
                p[*i] = a;
                p[*j] = b;
                out.push(p);
            }
        }
        _ => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;
    use crate::models::{setup, Direction};

    fn data() -> DataSummary {
        DataSummary {
            x_min: 0.1,
            x_max: 10_000.0,
            y_min: 0.1,
            y_max: 1.0,
            direction: Direction::Decreasing,
        }
    }

    #[test]
    fn seeds_cover_concentration_range() {
        let s = potency_seeds(0.1, 1000.0, 5);
        assert_eq!(s.len(), 5);
        assert!((s[0] - 0.1).abs() < 1e-15);
        assert!((s[4] - 1000.0).abs() < 1e-9);
        assert_eq!(potency_seeds(5.0, 5.0, 5), vec![5.0]);
        assert!(potency_seeds(1.0, 10.0, 0).is_empty());
    }

    #[test]
    fn seed_pairs_are_ordered() {
        let pairs = seed_pairs(&[1.0, 2.0, 3.0]);
        assert_eq!(pairs, vec![[1.0, 2.0], [1.0, 3.0], [2.0, 3.0]]);
    }

    #[test]
    fn heuristic_start_comes_first() {
        let d = data();
        let s = setup(ModelKind::FourParam, &d);
        let starts = start_points(&s, &d, 5);
        assert_eq!(starts.len(), 6);
        assert_eq!(starts[0], s.guess());
        // Only the potency coordinate changes.
        for p in &starts[1..] {
            assert_eq!(p[0], starts[0][0]);
            assert_eq!(p[3], starts[0][3]);
        }
    }

    #[test]
    fn biphasic_uses_seed_pairs() {
        let d = data();
        let s = setup(ModelKind::Biphasic, &d);
        let starts = start_points(&s, &d, 4);
        // heuristic + C(4, 2)
        assert_eq!(starts.len(), 1 + 6);
        for p in &starts[1..] {
            assert!(p[2] < p[3]);
        }
    }
}
