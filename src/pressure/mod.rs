mod gauss_seidel;
mod jacobi;
mod multigrid;
mod pcg;

pub use gauss_seidel::GaussSeidelSolver;
pub use jacobi::JacobiSolver;
pub use multigrid::MultigridSolver;
pub use pcg::{PcgSolver, Preconditioner};

use crate::error::SimError;
use crate::mac::{Face, FaceField2};
use crate::sdf::fraction_inside;
use crate::settings::Settings;
use crate::sparse::{SparseLaplacian2, Stencil};
use crate::{Field2, FluidSdf, Grid2, MacVelocity2, SolidSdf};
use serde::Serialize;

/// Smallest fraction-inside used for free-surface rows; thinner fluid
/// slivers would make the diagonal blow up.
const MIN_SURFACE_FRACTION: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SolverKind {
    Jacobi,
    GaussSeidel,
    PreconditionedConjugateGradient,
    Multigrid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverStage {
    Unbuilt,
    Built,
    Solved,
}

/// Outcome of one pressure solve. `residual` and `rhs_norm` are infinity
/// norms over fluid cells.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SolveReport {
    pub solver: SolverKind,
    pub iterations: usize,
    pub residual: f32,
    pub rhs_norm: f32,
    pub converged: bool,
}

/// `A p = b` over the fluid cells of one grid.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearSystem {
    pub a: SparseLaplacian2,
    pub b: Field2,
}

impl LinearSystem {
    pub fn new(grid: Grid2) -> Self {
        Self {
            a: SparseLaplacian2::new(grid),
            b: Field2::new(grid, 0.0),
        }
    }
}

#[derive(Clone, Debug)]
enum Method {
    Jacobi(JacobiSolver),
    GaussSeidel(GaussSeidelSolver),
    Pcg(PcgSolver),
    Multigrid(MultigridSolver),
}

#[derive(Clone, Debug)]
pub struct PressureSolver {
    system: LinearSystem,
    pressure: Field2,
    residual: Field2,
    tolerance: f32,
    stage: SolverStage,
    method: Method,
}

impl PressureSolver {
    pub fn from_settings(settings: &Settings) -> Result<Self, SimError> {
        settings.validate()?;
        let grid = settings.grid();
        let method = match settings.solver_kind()? {
            SolverKind::Jacobi => Method::Jacobi(JacobiSolver::new(
                grid,
                settings.num_jacobi_iterations,
            )),
            SolverKind::GaussSeidel => Method::GaussSeidel(GaussSeidelSolver::new(
                grid,
                settings.num_gauss_seidel_iterations,
            )),
            SolverKind::PreconditionedConjugateGradient => Method::Pcg(PcgSolver::new(
                grid,
                settings.tolerance,
                settings.max_iterations,
                Preconditioner::ModifiedIncompleteCholesky,
            )),
            SolverKind::Multigrid => Method::Multigrid(MultigridSolver::new(grid, settings)),
        };
        log::debug!("pressure solver: {:?}", kind_of(&method));
        Ok(Self::with_method(grid, settings.tolerance, method))
    }

    pub fn pcg(
        grid: Grid2,
        tolerance: f32,
        max_iterations: usize,
        preconditioner: Preconditioner,
    ) -> Self {
        let pcg = PcgSolver::new(grid, tolerance, max_iterations, preconditioner);
        Self::with_method(grid, tolerance, Method::Pcg(pcg))
    }

    fn with_method(grid: Grid2, tolerance: f32, method: Method) -> Self {
        Self {
            system: LinearSystem::new(grid),
            pressure: Field2::new(grid, 0.0),
            residual: Field2::new(grid, 0.0),
            tolerance,
            stage: SolverStage::Unbuilt,
            method,
        }
    }

    pub fn kind(&self) -> SolverKind {
        kind_of(&self.method)
    }

    pub fn stage(&self) -> SolverStage {
        self.stage
    }

    pub fn grid(&self) -> Grid2 {
        self.pressure.grid()
    }

    pub fn system(&self) -> &LinearSystem {
        &self.system
    }

    /// Valid once the stage is [`SolverStage::Solved`].
    pub fn pressure(&self) -> &Field2 {
        &self.pressure
    }

    pub fn build_linear_system(
        &mut self,
        velocity: &MacVelocity2,
        weights: &MacVelocity2,
        solid: &SolidSdf,
        fluid: &FluidSdf,
        dt: f32,
    ) {
        let grid = self.grid();
        assert_eq!(velocity.grid(), grid, "velocity grid mismatch");
        assert_eq!(weights.grid(), grid, "weight grid mismatch");
        assert_eq!(fluid.grid(), grid, "fluid grid mismatch");
        assert_eq!(solid.grid(), grid, "solid grid mismatch");
        build_laplacian(weights.u(), weights.v(), fluid.phi(), dt, &mut self.system.a);
        build_rhs(velocity, weights, fluid.phi(), &mut self.system.b);
        match &mut self.method {
            Method::Pcg(pcg) => pcg.build_preconditioner(&self.system.a, fluid.phi()),
            Method::Multigrid(mg) => mg.build(&self.system, solid, fluid, dt),
            Method::Jacobi(_) | Method::GaussSeidel(_) => {}
        }
        self.stage = SolverStage::Built;
    }

    pub fn solve_linear_system(&mut self, fluid: &FluidSdf) -> SolveReport {
        assert!(
            self.stage != SolverStage::Unbuilt,
            "solve called before the linear system was built"
        );
        let phi = fluid.phi();
        let iterations = match &mut self.method {
            Method::Jacobi(jacobi) => jacobi.solve(&self.system, phi, &mut self.pressure),
            Method::GaussSeidel(gs) => gs.solve(&self.system, phi, &mut self.pressure),
            Method::Pcg(pcg) => pcg.solve(&self.system, phi, &mut self.pressure),
            Method::Multigrid(mg) => mg.solve(phi, &mut self.pressure),
        };
        let residual = compute_residual(
            &self.system.a,
            &self.system.b,
            phi,
            &self.pressure,
            &mut self.residual,
        );
        let rhs_norm = self.system.b.inf_norm();
        let report = SolveReport {
            solver: self.kind(),
            iterations,
            residual,
            rhs_norm,
            converged: residual <= self.tolerance * rhs_norm,
        };
        log::info!(
            "{:?}: {} iterations, |r| = {:.3e}, |b| = {:.3e}",
            report.solver,
            report.iterations,
            report.residual,
            report.rhs_norm
        );
        self.stage = SolverStage::Solved;
        report
    }
}

fn kind_of(method: &Method) -> SolverKind {
    match method {
        Method::Jacobi(_) => SolverKind::Jacobi,
        Method::GaussSeidel(_) => SolverKind::GaussSeidel,
        Method::Pcg(_) => SolverKind::PreconditionedConjugateGradient,
        Method::Multigrid(_) => SolverKind::Multigrid,
    }
}

fn laplace_center(weight: f32, phi_fluid: f32, phi_neighbor: f32) -> f32 {
    if phi_neighbor >= 0.0 {
        weight / fraction_inside(phi_fluid, phi_neighbor).max(MIN_SURFACE_FRACTION)
    } else {
        weight
    }
}

/// Variational pressure operator: open-face weights from the solid, ghost
/// fluid coefficients at the free surface, scaled by `dt / dx^2`.
pub fn build_laplacian(
    uw: &FaceField2,
    vw: &FaceField2,
    phi: &Field2,
    dt: f32,
    a: &mut SparseLaplacian2,
) {
    let grid = phi.grid();
    assert_eq!(a.grid(), grid, "laplacian grid mismatch");
    let (nx, ny) = (grid.nx(), grid.ny());
    let fluid = |i: usize, j: usize| if phi.get(i, j) < 0.0 { 1.0 } else { 0.0 };
    a.reset();
    for j in 0..ny {
        for i in 0..nx {
            let p = phi.get(i, j);
            if p >= 0.0 {
                continue;
            }
            let mut center = 0.0;
            if i > 0 {
                center += laplace_center(uw.face(i, j, Face::Left), p, phi.get(i - 1, j));
            }
            if j > 0 {
                center += laplace_center(vw.face(i, j, Face::Bottom), p, phi.get(i, j - 1));
            }
            if i + 1 < nx {
                let w = uw.face(i, j, Face::Right);
                *a.value_mut(i, j, Stencil::Right) = -w * fluid(i + 1, j);
                center += laplace_center(w, p, phi.get(i + 1, j));
            }
            if j + 1 < ny {
                let w = vw.face(i, j, Face::Top);
                *a.value_mut(i, j, Stencil::Top) = -w * fluid(i, j + 1);
                center += laplace_center(w, p, phi.get(i, j + 1));
            }
            *a.value_mut(i, j, Stencil::Center) = center;
        }
    }
    a.scale(dt / (grid.dx() * grid.dx()));
}

/// Negative divergence of the weighted face velocities at fluid cells.
pub fn build_rhs(velocity: &MacVelocity2, weights: &MacVelocity2, phi: &Field2, b: &mut Field2) {
    let inv_dx = phi.grid().inv_dx();
    let (u, v) = (velocity.u(), velocity.v());
    let (uw, vw) = (weights.u(), weights.v());
    b.fill_with_index(|i, j| {
        if phi.get(i, j) >= 0.0 {
            return 0.0;
        }
        inv_dx
            * (u.face(i, j, Face::Left) * uw.face(i, j, Face::Left)
                - u.face(i, j, Face::Right) * uw.face(i, j, Face::Right)
                + v.face(i, j, Face::Bottom) * vw.face(i, j, Face::Bottom)
                - v.face(i, j, Face::Top) * vw.face(i, j, Face::Top))
    });
}

/// `out = b - A p` on fluid cells, zero elsewhere. Returns `|out|_inf`.
pub(crate) fn compute_residual(
    a: &SparseLaplacian2,
    b: &Field2,
    phi: &Field2,
    p: &Field2,
    out: &mut Field2,
) -> f32 {
    out.fill_with_index(|i, j| {
        if phi.get(i, j) < 0.0 {
            b.get(i, j) - a.mult(p, i, j)
        } else {
            0.0
        }
    });
    out.inf_norm()
}

/// Fixed-point update of one cell, `None` where the row is not solved.
#[inline]
pub(crate) fn relaxed_value(
    a: &SparseLaplacian2,
    b: &Field2,
    phi: &Field2,
    p: &Field2,
    i: usize,
    j: usize,
) -> Option<f32> {
    let diag = a.value(i, j, Stencil::Center);
    if phi.get(i, j) < 0.0 && diag != 0.0 {
        Some((b.get(i, j) - a.mult_neighbors(p, i, j)) / diag)
    } else {
        None
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::pool_system;
    use super::*;
    use crate::mac::Axis;
    use crate::Vec2;

    fn assert_close(a: f32, b: f32, tol: f32) {
        assert!(
            (a - b).abs() <= tol,
            "expected {a} to be within {tol} of {b}"
        );
    }

    #[test]
    fn laplace_center_uses_ghost_fluid_fraction() {
        assert_close(laplace_center(1.0, -1.0, -2.0), 1.0, 0.0);
        assert_close(laplace_center(1.0, -1.0, 1.0), 2.0, 1e-6);
        assert_close(laplace_center(0.5, -1e-6, 10.0), 50.0, 1e-3);
    }

    #[test]
    fn laplacian_rows_cover_fluid_cells_only() {
        let (system, fluid, _) = pool_system(16);
        let a = &system.a;
        for j in 0..16 {
            for i in 0..16 {
                if !fluid.is_fluid(i, j) {
                    assert_eq!(a.value(i, j, Stencil::Center), 0.0);
                    assert_eq!(a.value(i, j, Stencil::Right), 0.0);
                    assert_eq!(system.b.get(i, j), 0.0);
                    continue;
                }
                assert!(a.value(i, j, Stencil::Center) >= 0.0);
                assert!(a.value(i, j, Stencil::Right) <= 0.0);
                assert!(a.value(i, j, Stencil::Top) <= 0.0);
            }
        }
        assert!(a.value(8, 4, Stencil::Center) > 0.0);
        assert_close(a.value(8, 4, Stencil::Right), a.value(9, 4, Stencil::Left), 0.0);
    }

    #[test]
    fn free_surface_row_gets_ghost_coefficient() {
        let (system, fluid, _) = pool_system(16);
        let a = &system.a;
        assert!(fluid.is_fluid(8, 9));
        assert!(!fluid.is_fluid(8, 10));
        assert_eq!(a.value(8, 9, Stencil::Top), 0.0);
        let off = a.value(8, 9, Stencil::Left).abs()
            + a.value(8, 9, Stencil::Right).abs()
            + a.value(8, 9, Stencil::Bottom).abs();
        assert!(a.value(8, 9, Stencil::Center) > off);
    }

    #[test]
    fn interior_row_is_five_point_stencil() {
        let grid = Grid2::new(4, 4, 0.5);
        let phi = Field2::new(grid, -1.0);
        let uw = FaceField2::new(grid, Axis::X, 1.0);
        let vw = FaceField2::new(grid, Axis::Y, 1.0);
        let mut a = SparseLaplacian2::new(grid);
        build_laplacian(&uw, &vw, &phi, 0.25, &mut a);
        assert_close(a.value(1, 1, Stencil::Center), 4.0, 1e-6);
        assert_close(a.value(1, 1, Stencil::Left), -1.0, 1e-6);
        assert_close(a.value(0, 0, Stencil::Center), 2.0, 1e-6);
        let ones = Field2::new(grid, 1.0);
        assert_close(a.mult(&ones, 1, 1), 0.0, 1e-6);
    }

    #[test]
    fn rhs_is_negative_weighted_divergence() {
        let grid = Grid2::new(2, 1, 0.5);
        let phi = Field2::new(grid, -1.0);
        let mut velocity = MacVelocity2::new(grid, Vec2::zero());
        velocity.u_mut().set_face(0, 0, Face::Left, 1.0);
        velocity.u_mut().set_face(0, 0, Face::Right, 3.0);
        let weights = MacVelocity2::new(grid, Vec2::new(1.0, 1.0));
        let mut b = Field2::new(grid, 0.0);
        build_rhs(&velocity, &weights, &phi, &mut b);
        assert_close(b.get(0, 0), (1.0 - 3.0) / 0.5, 1e-6);
        assert_close(b.get(1, 0), 3.0 / 0.5, 1e-6);
    }

    #[test]
    #[should_panic(expected = "solid grid mismatch")]
    fn build_rejects_solid_on_another_grid() {
        let scene = test_support::pool_scene(8);
        let grid = scene.fluid.grid();
        let mut solver = PressureSolver::pcg(grid, 1e-5, 10, Preconditioner::Identity);
        let solid = SolidSdf::new(Grid2::new(4, 4, grid.dx()));
        solver.build_linear_system(&scene.velocity, &scene.weights, &solid, &scene.fluid, 0.01);
    }

    #[test]
    fn residual_ignores_air() {
        let (system, fluid, _) = pool_system(12);
        let mut out = Field2::new(system.b.grid(), 0.0);
        let p = Field2::new(system.b.grid(), 3.0);
        compute_residual(&system.a, &system.b, fluid.phi(), &p, &mut out);
        assert_eq!(out.get(6, 11), 0.0);
    }
}
