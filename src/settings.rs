use crate::error::{SimError, SimResult};
use crate::pressure::SolverKind;
use crate::{Grid2, Vec2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Scene and solver configuration. Missing JSON keys fall back to
/// [`Settings::default`], the 128x128 box scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // resolution
    pub nx: usize,
    pub ny: usize,
    pub dx: f32,
    pub time_step: f32,

    // particles
    pub initial_fluid_center: Vec2,
    pub initial_fluid_radius: f32,
    pub initial_velocity: Vec2,
    pub particles_per_cell: usize,

    // distance fields
    pub solid_width: usize,
    pub kernel_radius: f32,
    pub particle_radius: f32,
    pub num_phi_sweep_iterations: usize,

    pub gravity: Vec2,

    // pcg
    pub use_pcg: bool,
    pub tolerance: f32,
    pub max_iterations: usize,

    // multigrid
    pub use_multigrid: bool,
    pub num_full_cycles: usize,
    pub num_v_cycles: usize,
    pub num_pre_sweeps: usize,
    pub num_post_sweeps: usize,
    pub nx_min: usize,

    pub use_gauss_seidel: bool,
    pub num_gauss_seidel_iterations: usize,

    pub use_jacobi: bool,
    pub num_jacobi_iterations: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let dx = 1.0 / 129.0;
        Self {
            nx: 128,
            ny: 128,
            dx,
            time_step: 1.0 / 24.0,
            initial_fluid_center: Vec2::new(0.5, 0.25),
            initial_fluid_radius: 0.33,
            initial_velocity: Vec2::zero(),
            particles_per_cell: 4,
            solid_width: 3,
            kernel_radius: dx,
            particle_radius: 0.6 * dx,
            num_phi_sweep_iterations: 2,
            gravity: Vec2::new(0.0, -0.82),
            use_pcg: true,
            tolerance: 1e-5,
            max_iterations: 100,
            use_multigrid: false,
            num_full_cycles: 1,
            num_v_cycles: 4,
            num_pre_sweeps: 2,
            num_post_sweeps: 2,
            nx_min: 16,
            use_gauss_seidel: false,
            num_gauss_seidel_iterations: 100,
            use_jacobi: false,
            num_jacobi_iterations: 200,
        }
    }
}

impl Settings {
    pub fn grid(&self) -> Grid2 {
        Grid2::new(self.nx, self.ny, self.dx)
    }

    /// Exactly one solver flag must be set.
    pub fn solver_kind(&self) -> Result<SolverKind, SimError> {
        let selected: Vec<SolverKind> = [
            (self.use_jacobi, SolverKind::Jacobi),
            (self.use_gauss_seidel, SolverKind::GaussSeidel),
            (self.use_pcg, SolverKind::PreconditionedConjugateGradient),
            (self.use_multigrid, SolverKind::Multigrid),
        ]
        .into_iter()
        .filter_map(|(enabled, kind)| enabled.then_some(kind))
        .collect();
        match selected.as_slice() {
            [] => Err(SimError::NoSolverSelected),
            [kind] => Ok(*kind),
            many => Err(SimError::AmbiguousSolver(format!("{many:?}"))),
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        let invalid = |msg: String| Err(SimError::InvalidSettings(msg));
        if self.nx == 0 || self.ny == 0 {
            return invalid(format!("grid must be non-empty, got {}x{}", self.nx, self.ny));
        }
        if !(self.dx > 0.0 && self.dx.is_finite()) {
            return invalid(format!("dx must be positive, got {}", self.dx));
        }
        if !(self.tolerance >= 0.0 && self.tolerance.is_finite()) {
            return invalid(format!("tolerance must be >= 0, got {}", self.tolerance));
        }
        if !(self.kernel_radius > 0.0 && self.particle_radius > 0.0) {
            return invalid("kernel and particle radius must be positive".into());
        }
        let kind = self.solver_kind()?;
        if kind == SolverKind::PreconditionedConjugateGradient && self.max_iterations == 0 {
            return invalid("pcg needs max_iterations > 0".into());
        }
        if kind == SolverKind::Multigrid && (self.nx_min == 0 || self.nx_min > self.nx) {
            return invalid(format!(
                "nx_min must be in 1..={}, got {}",
                self.nx, self.nx_min
            ));
        }
        Ok(())
    }

    pub fn save_json(&self, path: &Path) -> SimResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> SimResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&json)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_pcg() {
        let settings = Settings::default();
        assert_eq!(
            settings.solver_kind().unwrap(),
            SolverKind::PreconditionedConjugateGradient
        );
        settings.validate().unwrap();
    }

    #[test]
    fn missing_solver_is_an_error() {
        let settings = Settings {
            use_pcg: false,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(SimError::NoSolverSelected)));
    }

    #[test]
    fn two_solvers_are_ambiguous() {
        let settings = Settings {
            use_jacobi: true,
            ..Settings::default()
        };
        assert!(matches!(
            settings.solver_kind(),
            Err(SimError::AmbiguousSolver(_))
        ));
    }

    #[test]
    fn invalid_resolution_is_rejected() {
        let settings = Settings {
            dx: 0.0,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SimError::InvalidSettings(_))
        ));
    }

    #[test]
    fn pcg_without_iterations_is_rejected() {
        let settings = Settings {
            max_iterations: 0,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SimError::InvalidSettings(_))
        ));
    }

    #[test]
    fn json_round_trip_and_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            nx: 64,
            ny: 32,
            use_pcg: false,
            use_multigrid: true,
            ..Settings::default()
        };
        settings.save_json(&path).unwrap();
        assert_eq!(Settings::load_json(&path).unwrap(), settings);

        std::fs::write(&path, r#"{ "nx": 40, "use_pcg": false, "use_jacobi": true }"#).unwrap();
        let partial = Settings::load_json(&path).unwrap();
        assert_eq!(partial.nx, 40);
        assert_eq!(partial.ny, 128);
        assert_eq!(partial.solver_kind().unwrap(), SolverKind::Jacobi);
    }

    #[test]
    fn malformed_json_reports_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ nx: ").unwrap();
        assert!(matches!(Settings::load_json(&path), Err(SimError::Json(_))));
    }
}
