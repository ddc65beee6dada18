//! Flat ΛCDM background cosmology.
//!
//! Radiation and massive neutrinos are neglected.

use crate::error::{CosmoError, Result};
use crate::{DistanceModel, F21_HZ, SPEED_OF_LIGHT_KM_S};

/// Background cosmology parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cosmology {
    /// Hubble constant [km/s/Mpc]
    pub h0: f64,
    /// Matter density parameter
    pub omega_m: f64,
    /// Dark energy density parameter
    pub omega_lambda: f64,
}

impl Default for Cosmology {
    fn default() -> Self {
        Self::planck15()
    }
}

impl Cosmology {
    /// Flat universe: Ω_Λ = 1 − Ω_m.
    pub const fn flat(h0: f64, omega_m: f64) -> Self {
        Self {
            h0,
            omega_m,
            omega_lambda: 1.0 - omega_m,
        }
    }

    /// Planck 2015 (TT,TE,EE+lowP+lensing+ext).
    pub const fn planck15() -> Self {
        Self::flat(67.74, 0.3075)
    }

    /// WMAP 9-year.
    pub const fn wmap9() -> Self {
        Self::flat(69.32, 0.2865)
    }

    /// Curvature density parameter.
    pub fn omega_k(&self) -> f64 {
        1.0 - self.omega_m - self.omega_lambda
    }

    /// Dimensionless Hubble parameter E(z) = H(z) / H0.
    pub fn e_of_z(&self, z: f64) -> f64 {
        let a = 1.0 + z;
        (self.omega_m * a * a * a + self.omega_k() * a * a + self.omega_lambda).sqrt()
    }

    /// Hubble distance c / H0 [Mpc].
    pub fn hubble_distance(&self) -> f64 {
        SPEED_OF_LIGHT_KM_S / self.h0
    }

    /// ∫₀ᶻ dz' / E(z') by composite Simpson's rule.
    fn inverse_e_integral(&self, z: f64) -> f64 {
        if z == 0.0 {
            return 0.0;
        }
        // Even number of panels, finer for deeper redshifts.
        let panels = ((z.abs() * 256.0).ceil() as usize).max(64);
        let panels = panels + panels % 2;
        let h = z / panels as f64;

        let mut sum = 1.0 / self.e_of_z(0.0) + 1.0 / self.e_of_z(z);
        for i in 1..panels {
            let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += weight / self.e_of_z(i as f64 * h);
        }
        sum * h / 3.0
    }

    /// Comoving volume of one (pixel, channel) sample [Mpc³].
    ///
    /// dV = r² · Ω · |dr/dν| · Δν, with dr/dν = (c/H0)(1+z)² / (E(z)·f21).
    pub fn comoving_voxel_volume(&self, z: f64, dnu_hz: f64, omega_sr: f64) -> Result<f64> {
        let r = self.comoving_distance(z)?;
        let a = 1.0 + z;
        let dr_dnu = self.hubble_distance() * a * a / (self.e_of_z(z) * F21_HZ);
        Ok(r * r * omega_sr * dr_dnu * dnu_hz.abs())
    }
}

impl DistanceModel for Cosmology {
    fn comoving_distance(&self, z: f64) -> Result<f64> {
        if !z.is_finite() || z <= -1.0 {
            return Err(CosmoError::InvalidRedshift(z));
        }
        Ok(self.hubble_distance() * self.inverse_e_integral(z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_flat() {
        for cosmo in [Cosmology::planck15(), Cosmology::wmap9()] {
            assert!(cosmo.omega_k().abs() < 1e-12);
            assert!((cosmo.e_of_z(0.0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn distance_at_origin_is_zero() {
        assert_eq!(Cosmology::planck15().comoving_distance(0.0).unwrap(), 0.0);
    }

    #[test]
    fn planck15_reference_distances() {
        // Reference values from a flat ΛCDM integration (no radiation).
        let cosmo = Cosmology::planck15();
        let d1 = cosmo.comoving_distance(1.0).unwrap();
        assert!((d1 - 3399.0).abs() < 1.0, "D_c(1) = {}", d1);
        let d8 = cosmo.comoving_distance(8.0).unwrap();
        assert!((d8 - 9161.6).abs() < 1.0, "D_c(8) = {}", d8);
    }

    #[test]
    fn low_redshift_is_hubble_law() {
        let cosmo = Cosmology::wmap9();
        let z = 1e-4;
        let d = cosmo.comoving_distance(z).unwrap();
        assert!((d - z * cosmo.hubble_distance()).abs() / d < 1e-3);
    }

    #[test]
    fn distance_is_monotonic() {
        let cosmo = Cosmology::planck15();
        let mut prev = f64::NEG_INFINITY;
        for i in 0..50 {
            let z = -0.5 + i as f64 * 0.5;
            let d = cosmo.comoving_distance(z).unwrap();
            assert!(d > prev);
            prev = d;
        }
    }

    #[test]
    fn rejects_unphysical_redshift() {
        let cosmo = Cosmology::planck15();
        assert_eq!(
            cosmo.comoving_distance(-1.0),
            Err(CosmoError::InvalidRedshift(-1.0))
        );
        assert!(cosmo.comoving_distance(f64::NAN).is_err());
    }

    #[test]
    fn voxel_volume_scales_with_bandwidth_and_solid_angle() {
        let cosmo = Cosmology::planck15();
        let v1 = cosmo.comoving_voxel_volume(8.0, 1e5, 1e-4).unwrap();
        let v2 = cosmo.comoving_voxel_volume(8.0, 2e5, 1e-4).unwrap();
        let v3 = cosmo.comoving_voxel_volume(8.0, 1e5, 3e-4).unwrap();
        assert!(v1 > 0.0);
        assert!((v2 / v1 - 2.0).abs() < 1e-12);
        assert!((v3 / v1 - 3.0).abs() < 1e-12);
    }
}
