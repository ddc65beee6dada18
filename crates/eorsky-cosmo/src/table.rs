//! Precomputed comoving distance lookup with linear interpolation.

use crate::error::{CosmoError, Result};
use crate::DistanceModel;

/// Comoving distance sampled on a regular redshift grid.
///
/// Evaluating a [`Cosmology`](crate::Cosmology) integrates from zero for every
/// redshift; a table pays that cost once and answers each query with a
/// bracket lookup.
#[derive(Debug, Clone)]
pub struct DistanceTable {
    z_min: f64,
    z_max: f64,
    dz: f64,
    distances: Vec<f64>,
}

impl DistanceTable {
    /// Sample `model` at `n_points` evenly spaced redshifts in `[z_min, z_max]`.
    pub fn new<M: DistanceModel + ?Sized>(
        model: &M,
        z_min: f64,
        z_max: f64,
        n_points: usize,
    ) -> Result<Self> {
        if !(z_min < z_max) {
            return Err(CosmoError::InvalidTable(format!(
                "z_min {} must be less than z_max {}",
                z_min, z_max
            )));
        }
        if n_points < 2 {
            return Err(CosmoError::InvalidTable(format!(
                "need at least 2 points, got {}",
                n_points
            )));
        }

        let dz = (z_max - z_min) / (n_points - 1) as f64;
        let distances = (0..n_points)
            .map(|i| model.comoving_distance(z_min + i as f64 * dz))
            .collect::<Result<Vec<_>>>()?;

        if distances.windows(2).any(|w| w[1] < w[0]) {
            return Err(CosmoError::InvalidTable(
                "distance is not monotonic over the grid".into(),
            ));
        }

        Ok(Self {
            z_min,
            z_max,
            dz,
            distances,
        })
    }

    /// Redshift range covered by the table.
    pub fn domain(&self) -> (f64, f64) {
        (self.z_min, self.z_max)
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    fn eval(&self, z: f64) -> Result<f64> {
        if !(z >= self.z_min && z <= self.z_max) {
            return Err(CosmoError::OutOfBounds {
                z,
                min: self.z_min,
                max: self.z_max,
            });
        }
        let t = (z - self.z_min) / self.dz;
        let i = (t.floor() as usize).min(self.distances.len() - 2);
        let frac = t - i as f64;
        Ok(self.distances[i] + frac * (self.distances[i + 1] - self.distances[i]))
    }
}

impl DistanceModel for DistanceTable {
    fn comoving_distance(&self, z: f64) -> Result<f64> {
        self.eval(z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cosmology;

    #[test]
    fn matches_direct_integration() {
        let cosmo = Cosmology::planck15();
        let table = DistanceTable::new(&cosmo, 5.0, 12.0, 2001).unwrap();
        for z in [5.0, 6.1234, 8.0, 9.99, 12.0] {
            let direct = cosmo.comoving_distance(z).unwrap();
            let approx = table.comoving_distance(z).unwrap();
            assert!((direct - approx).abs() < 0.05, "z = {}: {} vs {}", z, direct, approx);
        }
    }

    #[test]
    fn exact_at_grid_points_of_linear_model() {
        let model = |z: f64| 100.0 * z;
        let table = DistanceTable::new(&model, 0.0, 10.0, 11).unwrap();
        assert_eq!(table.comoving_distance(3.0).unwrap(), 300.0);
        assert!((table.comoving_distance(3.25).unwrap() - 325.0).abs() < 1e-9);
        assert_eq!(table.comoving_distance(10.0).unwrap(), 1000.0);
    }

    #[test]
    fn rejects_out_of_bounds() {
        let table = DistanceTable::new(&Cosmology::planck15(), 6.0, 7.0, 10).unwrap();
        assert!(matches!(
            table.comoving_distance(5.9),
            Err(CosmoError::OutOfBounds { .. })
        ));
        assert!(table.comoving_distance(f64::NAN).is_err());
    }

    #[test]
    fn rejects_bad_grids() {
        let cosmo = Cosmology::planck15();
        assert!(DistanceTable::new(&cosmo, 2.0, 1.0, 10).is_err());
        assert!(DistanceTable::new(&cosmo, 1.0, 2.0, 1).is_err());
        let decreasing = |z: f64| -z;
        assert!(DistanceTable::new(&decreasing, 0.0, 1.0, 5).is_err());
    }

    #[test]
    fn reports_domain() {
        let table = DistanceTable::new(&Cosmology::wmap9(), 6.0, 9.0, 31).unwrap();
        assert_eq!(table.domain(), (6.0, 9.0));
        assert_eq!(table.len(), 31);
        assert!(!table.is_empty());
    }
}
