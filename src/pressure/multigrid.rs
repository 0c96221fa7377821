use super::gauss_seidel::smooth;
use super::{build_laplacian, compute_residual, LinearSystem};
use crate::mac::{Axis, CornerField2, FaceField2};
use crate::settings::Settings;
use crate::sparse::SparseLaplacian2;
use crate::{Field2, FluidSdf, Grid2, SolidSdf};

#[derive(Clone, Debug)]
struct MgLevel {
    grid: Grid2,
    solid_phi: CornerField2,
    phi: Field2,
    uw: FaceField2,
    vw: FaceField2,
    a: SparseLaplacian2,
    rhs: Field2,
    pressure: Field2,
    residual: Field2,
    scratch: Field2,
}

impl MgLevel {
    fn new(grid: Grid2) -> Self {
        Self {
            grid,
            solid_phi: CornerField2::new(grid, 0.0),
            phi: Field2::new(grid, 0.0),
            uw: FaceField2::new(grid, Axis::X, 0.0),
            vw: FaceField2::new(grid, Axis::Y, 0.0),
            a: SparseLaplacian2::new(grid),
            rhs: Field2::new(grid, 0.0),
            pressure: Field2::new(grid, 0.0),
            residual: Field2::new(grid, 0.0),
            scratch: Field2::new(grid, 0.0),
        }
    }

    fn smooth(&mut self, sweeps: usize) {
        smooth(
            &self.a,
            &self.rhs,
            &self.phi,
            &mut self.pressure,
            &mut self.scratch,
            sweeps,
        );
    }

    fn compute_residual(&mut self) -> f32 {
        compute_residual(
            &self.a,
            &self.rhs,
            &self.phi,
            &self.pressure,
            &mut self.residual,
        )
    }
}

#[derive(Clone, Copy, Debug)]
struct CycleParams {
    full_cycles: usize,
    v_cycles: usize,
    pre_sweeps: usize,
    post_sweeps: usize,
}

/// Geometric multigrid over a hierarchy that halves the resolution per level.
/// `levels[0]` is the coarsest grid, the last level is the simulation grid.
#[derive(Clone, Debug)]
pub struct MultigridSolver {
    levels: Vec<MgLevel>,
    params: CycleParams,
    saved_pressure: Field2,
    saved_rhs: Field2,
}

impl MultigridSolver {
    pub fn new(grid: Grid2, settings: &Settings) -> Self {
        let count = level_count(grid.nx(), settings.nx_min);
        let mut grids = Vec::with_capacity(count);
        let mut current = grid;
        grids.push(current);
        for _ in 1..count {
            current = current.coarsen();
            grids.push(current);
        }
        grids.reverse();
        log::debug!(
            "multigrid hierarchy: {}",
            grids
                .iter()
                .map(|g| format!("{}x{}", g.nx(), g.ny()))
                .collect::<Vec<_>>()
                .join(" < ")
        );
        Self {
            levels: grids.into_iter().map(MgLevel::new).collect(),
            params: CycleParams {
                full_cycles: settings.num_full_cycles,
                v_cycles: settings.num_v_cycles,
                pre_sweeps: settings.num_pre_sweeps,
                post_sweeps: settings.num_post_sweeps,
            },
            saved_pressure: Field2::new(grid, 0.0),
            saved_rhs: Field2::new(grid, 0.0),
        }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level_grid(&self, level: usize) -> Grid2 {
        self.levels[level].grid
    }

    /// Copies the fine system and rebuilds every coarser level from
    /// resampled solid and fluid distance fields.
    pub fn build(&mut self, system: &LinearSystem, solid: &SolidSdf, fluid: &FluidSdf, dt: f32) {
        let finest = self.levels.len() - 1;
        {
            let level = &mut self.levels[finest];
            level.a.clone_from(&system.a);
            level.rhs.copy_from(&system.b);
            level.phi.copy_from(fluid.phi());
            level.solid_phi.clone_from(solid.phi());
        }
        for m in (0..finest).rev() {
            let (coarser, finer) = self.levels.split_at_mut(m + 1);
            let fine = &finer[0];
            let level = &mut coarser[m];
            let grid = level.grid;
            let fine_solid = fine.solid_phi.storage();
            let corners = level.solid_phi.storage().grid();
            level
                .solid_phi
                .storage_mut()
                .fill_with_index(|i, j| fine_solid.bilerp(corners.index_position(i, j)));
            resample_into(&fine.phi, &mut level.phi);
            SolidSdf::create_weights_from(&level.solid_phi, &mut level.uw, &mut level.vw);
            build_laplacian(&level.uw, &level.vw, &level.phi, dt, &mut level.a);
            level.rhs.reset();
            log::debug!(
                "multigrid level {m}: {}x{}, dx = {:.4e}",
                grid.nx(),
                grid.ny(),
                grid.dx()
            );
        }
    }

    pub fn solve(&mut self, phi: &Field2, pressure: &mut Field2) -> usize {
        let finest = self.levels.len() - 1;
        self.levels[finest].pressure.reset();
        for _ in 0..self.params.full_cycles {
            self.full_cycle();
        }
        for _ in 0..self.params.v_cycles {
            v_cycle(&mut self.levels, finest, self.params);
        }
        let result = &self.levels[finest].pressure;
        pressure.fill_with_index(|i, j| {
            if phi.get(i, j) < 0.0 {
                result.get(i, j)
            } else {
                0.0
            }
        });
        self.params.full_cycles + self.params.v_cycles
    }

    /// Solves for a correction to the current pressure coarse-to-fine.
    fn full_cycle(&mut self) {
        let finest = self.levels.len() - 1;
        {
            let level = &mut self.levels[finest];
            self.saved_pressure.copy_from(&level.pressure);
            self.saved_rhs.copy_from(&level.rhs);
            level.compute_residual();
            level.rhs.copy_from(&level.residual);
        }
        for m in (1..=finest).rev() {
            let (coarser, finer) = self.levels.split_at_mut(m);
            resample_into(&finer[0].rhs, &mut coarser[m - 1].rhs);
        }
        self.levels[0].pressure.reset();
        v_cycle(&mut self.levels, 0, self.params);
        for m in 1..=finest {
            let (coarser, finer) = self.levels.split_at_mut(m);
            let level = &mut finer[0];
            prolong_into(&coarser[m - 1].pressure, &level.phi, &mut level.pressure);
            v_cycle(&mut self.levels, m, self.params);
        }
        let level = &mut self.levels[finest];
        level.pressure.add_scaled(&self.saved_pressure, 1.0);
        level.rhs.copy_from(&self.saved_rhs);
    }
}

/// `log2(nx) - log2(nx_min)` levels, at least one.
fn level_count(nx: usize, nx_min: usize) -> usize {
    let fine = nx.max(1).ilog2();
    let coarse = nx_min.max(1).ilog2();
    fine.saturating_sub(coarse).max(1) as usize
}

fn v_cycle(levels: &mut [MgLevel], m: usize, params: CycleParams) {
    levels[m].smooth(params.pre_sweeps);
    if m > 0 {
        {
            let (coarser, finer) = levels.split_at_mut(m);
            let level = &mut finer[0];
            level.compute_residual();
            let coarse = &mut coarser[m - 1];
            resample_into(&level.residual, &mut coarse.rhs);
            coarse.pressure.reset();
        }
        v_cycle(levels, m - 1, params);
        {
            let (coarser, finer) = levels.split_at_mut(m);
            let level = &mut finer[0];
            prolong_and_add(&coarser[m - 1].pressure, &level.phi, &mut level.pressure);
        }
    }
    levels[m].smooth(params.post_sweeps);
}

/// Bilinear resampling of `src` at the cell centers of `dst`.
fn resample_into(src: &Field2, dst: &mut Field2) {
    let grid = dst.grid();
    dst.fill_with_index(|i, j| src.bilerp(grid.cell_center(i, j)));
}

fn prolong_into(coarse: &Field2, phi: &Field2, fine: &mut Field2) {
    let grid = fine.grid();
    fine.fill_with_index(|i, j| {
        if phi.get(i, j) < 0.0 {
            coarse.bilerp(grid.cell_center(i, j))
        } else {
            0.0
        }
    });
}

fn prolong_and_add(coarse: &Field2, phi: &Field2, fine: &mut Field2) {
    let grid = fine.grid();
    fine.update_with_index(|i, j, value| {
        if phi.get(i, j) < 0.0 {
            value + coarse.bilerp(grid.cell_center(i, j))
        } else {
            value
        }
    });
}
