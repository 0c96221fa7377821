use super::LinearSystem;
use crate::sparse::{SparseLaplacian2, Stencil};
use crate::{Field2, Grid2};

const MIC_TUNING: f32 = 0.99;
const MIC_SAFETY: f32 = 0.25;
const MIC_EPSILON: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preconditioner {
    /// MIC(0) restricted to fluid cells.
    ModifiedIncompleteCholesky,
    /// Plain conjugate gradient.
    Identity,
}

#[derive(Clone, Debug)]
pub struct PcgSolver {
    tolerance: f32,
    max_iterations: usize,
    preconditioner: Preconditioner,
    precon: Field2,
    r: Field2,
    z: Field2,
    q: Field2,
    s: Field2,
}

impl PcgSolver {
    pub fn new(
        grid: Grid2,
        tolerance: f32,
        max_iterations: usize,
        preconditioner: Preconditioner,
    ) -> Self {
        Self {
            tolerance,
            max_iterations,
            preconditioner,
            precon: Field2::new(grid, 0.0),
            r: Field2::new(grid, 0.0),
            z: Field2::new(grid, 0.0),
            q: Field2::new(grid, 0.0),
            s: Field2::new(grid, 0.0),
        }
    }

    pub fn preconditioner(&self) -> Preconditioner {
        self.preconditioner
    }

    pub fn build_preconditioner(&mut self, a: &SparseLaplacian2, phi: &Field2) {
        if self.preconditioner == Preconditioner::Identity {
            return;
        }
        let grid = phi.grid();
        let precon = &mut self.precon;
        precon.reset();
        for j in 0..grid.ny() {
            for i in 0..grid.nx() {
                if phi.get(i, j) >= 0.0 {
                    continue;
                }
                let diag = a.value(i, j, Stencil::Center);
                let mut e = diag;
                if i > 0 {
                    let left = a.value(i, j, Stencil::Left);
                    let p = precon.get(i - 1, j);
                    let up_of_left = a.value(i - 1, j, Stencil::Top);
                    e -= (left * p).powi(2) + MIC_TUNING * left * up_of_left * p * p;
                }
                if j > 0 {
                    let bottom = a.value(i, j, Stencil::Bottom);
                    let p = precon.get(i, j - 1);
                    let right_of_bottom = a.value(i, j - 1, Stencil::Right);
                    e -= (bottom * p).powi(2) + MIC_TUNING * bottom * right_of_bottom * p * p;
                }
                if e < MIC_SAFETY * diag {
                    e = diag;
                }
                precon.set(i, j, 1.0 / (e + MIC_EPSILON).sqrt());
            }
        }
    }

    /// `z = M^-1 r` on fluid cells.
    fn apply_preconditioner(&mut self, a: &SparseLaplacian2, phi: &Field2) {
        let grid = phi.grid();
        let (nx, ny) = (grid.nx(), grid.ny());
        self.z.reset();
        if self.preconditioner == Preconditioner::Identity {
            let r = &self.r;
            self.z
                .fill_with_index(|i, j| if phi.get(i, j) < 0.0 { r.get(i, j) } else { 0.0 });
            return;
        }
        let precon = &self.precon;
        let q = &mut self.q;
        q.reset();
        for j in 0..ny {
            for i in 0..nx {
                if phi.get(i, j) >= 0.0 {
                    continue;
                }
                let mut t = self.r.get(i, j);
                if i > 0 {
                    t -= a.value(i, j, Stencil::Left) * precon.get(i - 1, j) * q.get(i - 1, j);
                }
                if j > 0 {
                    t -= a.value(i, j, Stencil::Bottom) * precon.get(i, j - 1) * q.get(i, j - 1);
                }
                q.set(i, j, t * precon.get(i, j));
            }
        }
        let z = &mut self.z;
        for j in (0..ny).rev() {
            for i in (0..nx).rev() {
                if phi.get(i, j) >= 0.0 {
                    continue;
                }
                let p = precon.get(i, j);
                let mut t = q.get(i, j);
                if i + 1 < nx {
                    t -= a.value(i, j, Stencil::Right) * p * z.get(i + 1, j);
                }
                if j + 1 < ny {
                    t -= a.value(i, j, Stencil::Top) * p * z.get(i, j + 1);
                }
                z.set(i, j, t * p);
            }
        }
    }

    /// Returns the number of iterations taken. Pressure starts from zero and
    /// stays zero when `b` vanishes or the first search direction is null.
    pub fn solve(&mut self, system: &LinearSystem, phi: &Field2, pressure: &mut Field2) -> usize {
        let a = &system.a;
        pressure.reset();
        let b_norm = system.b.inf_norm();
        if b_norm == 0.0 {
            log::debug!("pcg: zero right-hand side");
            return 0;
        }
        let tol = self.tolerance * b_norm;
        self.r.copy_from(&system.b);
        self.apply_preconditioner(a, phi);
        self.s.copy_from(&self.z);
        let mut rho = self.z.dot(&self.r);
        if rho == 0.0 {
            log::debug!("pcg: degenerate preconditioned residual");
            return 0;
        }
        for iteration in 0..self.max_iterations {
            let s = &self.s;
            self.z.fill_with_index(|i, j| {
                if phi.get(i, j) < 0.0 {
                    a.mult(s, i, j)
                } else {
                    0.0
                }
            });
            let alpha = rho / self.s.dot(&self.z);
            pressure.add_scaled(&self.s, alpha);
            self.r.add_scaled(&self.z, -alpha);
            let r_norm = self.r.inf_norm();
            if r_norm <= tol {
                log::debug!(
                    "pcg converged in {} iterations, |r| = {r_norm:.3e}",
                    iteration + 1
                );
                return iteration + 1;
            }
            self.apply_preconditioner(a, phi);
            let rho_new = self.z.dot(&self.r);
            let beta = rho_new / rho;
            self.s.scale_and_add(beta, &self.z);
            rho = rho_new;
        }
        log::warn!(
            "pcg did not converge in {} iterations: tol = {tol:.3e}, |r| = {:.3e}",
            self.max_iterations,
            self.r.inf_norm()
        );
        self.max_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pressure::compute_residual;
    use crate::pressure::test_support::{pool_scene, pool_system};
    use crate::pressure::PressureSolver;

    fn solve_with(
        preconditioner: Preconditioner,
        n: usize,
        tolerance: f32,
    ) -> (usize, f32, f32) {
        let (system, fluid, _) = pool_system(n);
        let grid = system.b.grid();
        let mut pcg = PcgSolver::new(grid, tolerance, 500, preconditioner);
        pcg.build_preconditioner(&system.a, fluid.phi());
        let mut pressure = Field2::new(grid, 0.0);
        let iterations = pcg.solve(&system, fluid.phi(), &mut pressure);
        let mut scratch = Field2::new(grid, 0.0);
        let residual = compute_residual(&system.a, &system.b, fluid.phi(), &pressure, &mut scratch);
        (iterations, residual, system.b.inf_norm())
    }

    #[test]
    fn converges_to_tolerance() {
        let (iterations, residual, b_norm) =
            solve_with(Preconditioner::ModifiedIncompleteCholesky, 24, 1e-4);
        assert!(iterations < 500);
        assert!(residual <= 2e-4 * b_norm, "{residual} vs {b_norm}");
    }

    #[test]
    fn mic_needs_no_more_iterations_than_plain_cg() {
        let (mic, _, _) = solve_with(Preconditioner::ModifiedIncompleteCholesky, 32, 1e-4);
        let (cg, _, _) = solve_with(Preconditioner::Identity, 32, 1e-4);
        assert!(mic <= cg, "mic {mic} vs cg {cg}");
    }

    #[test]
    fn zero_rhs_returns_zero_pressure() {
        let (mut system, fluid, _) = pool_system(8);
        system.b.reset();
        let grid = system.b.grid();
        let mut pcg = PcgSolver::new(grid, 1e-5, 10, Preconditioner::ModifiedIncompleteCholesky);
        pcg.build_preconditioner(&system.a, fluid.phi());
        let mut pressure = Field2::new(grid, 3.0);
        assert_eq!(pcg.solve(&system, fluid.phi(), &mut pressure), 0);
        assert_eq!(pressure.inf_norm(), 0.0);
    }

    #[test]
    fn rhs_only_in_air_returns_zero_pressure() {
        let (mut system, fluid, _) = pool_system(8);
        assert!(!fluid.is_fluid(4, 6));
        system.b.reset();
        system.b.set(4, 6, 1.0);
        let grid = system.b.grid();
        let mut pcg = PcgSolver::new(grid, 1e-5, 10, Preconditioner::ModifiedIncompleteCholesky);
        pcg.build_preconditioner(&system.a, fluid.phi());
        let mut pressure = Field2::new(grid, 2.0);
        assert_eq!(pcg.solve(&system, fluid.phi(), &mut pressure), 0);
        assert_eq!(pressure.inf_norm(), 0.0);
    }

    #[test]
    fn iteration_cap_returns_best_effort() {
        let (system, fluid, _) = pool_system(24);
        let grid = system.b.grid();
        let mut pcg = PcgSolver::new(grid, 1e-6, 2, Preconditioner::ModifiedIncompleteCholesky);
        pcg.build_preconditioner(&system.a, fluid.phi());
        let mut pressure = Field2::new(grid, 0.0);
        assert_eq!(pcg.solve(&system, fluid.phi(), &mut pressure), 2);
        assert!(pressure.inf_norm() > 0.0);
        for j in 0..24 {
            for i in 0..24 {
                if !fluid.is_fluid(i, j) {
                    assert_eq!(pressure.get(i, j), 0.0);
                }
            }
        }
    }

    #[test]
    fn capped_solve_reports_not_converged() {
        let scene = pool_scene(24);
        let grid = scene.fluid.grid();
        let mut solver =
            PressureSolver::pcg(grid, 1e-6, 2, Preconditioner::ModifiedIncompleteCholesky);
        solver.build_linear_system(
            &scene.velocity,
            &scene.weights,
            &scene.solid,
            &scene.fluid,
            0.01,
        );
        let report = solver.solve_linear_system(&scene.fluid);
        assert_eq!(report.iterations, 2);
        assert!(!report.converged);
        assert!(report.residual > 1e-6 * report.rhs_norm);
        assert!(solver.pressure().inf_norm() > 0.0);
    }

    #[test]
    fn preconditioner_is_positive_on_fluid() {
        let (system, fluid, _) = pool_system(12);
        let grid = system.b.grid();
        let mut pcg = PcgSolver::new(grid, 1e-5, 10, Preconditioner::ModifiedIncompleteCholesky);
        pcg.build_preconditioner(&system.a, fluid.phi());
        for j in 0..12 {
            for i in 0..12 {
                let p = pcg.precon.get(i, j);
                if fluid.is_fluid(i, j) {
                    assert!(p > 0.0 && p.is_finite());
                } else {
                    assert_eq!(p, 0.0);
                }
            }
        }
    }
}
