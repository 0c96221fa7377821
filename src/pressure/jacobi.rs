use super::{relaxed_value, LinearSystem};
use crate::{Field2, Grid2};

#[derive(Clone, Debug)]
pub struct JacobiSolver {
    iterations: usize,
    from: Field2,
}

impl JacobiSolver {
    pub fn new(grid: Grid2, iterations: usize) -> Self {
        Self {
            iterations,
            from: Field2::new(grid, 0.0),
        }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Runs the configured sweeps from a zero guess. Each sweep reads the
    /// previous iterate only; `pressure` holds the newest one on return.
    pub fn solve(&mut self, system: &LinearSystem, phi: &Field2, pressure: &mut Field2) -> usize {
        pressure.reset();
        for _ in 0..self.iterations {
            self.from.swap(pressure);
            jacobi_sweep(system, phi, &self.from, pressure);
        }
        self.iterations
    }
}

fn jacobi_sweep(system: &LinearSystem, phi: &Field2, from: &Field2, to: &mut Field2) {
    to.fill_with_index(|i, j| {
        relaxed_value(&system.a, &system.b, phi, from, i, j).unwrap_or_else(|| from.get(i, j))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pressure::compute_residual;
    use crate::pressure::test_support::pool_system;

    #[test]
    fn residual_decreases_with_more_sweeps() {
        let (system, fluid, _) = pool_system(16);
        let grid = system.b.grid();
        let mut scratch = Field2::new(grid, 0.0);
        let mut previous = system.b.inf_norm();
        assert!(previous > 0.0);
        for iterations in [20, 80, 320] {
            let mut jacobi = JacobiSolver::new(grid, iterations);
            let mut pressure = Field2::new(grid, 0.0);
            jacobi.solve(&system, fluid.phi(), &mut pressure);
            let residual =
                compute_residual(&system.a, &system.b, fluid.phi(), &pressure, &mut scratch);
            assert!(residual < previous, "{residual} !< {previous}");
            previous = residual;
        }
    }

    #[test]
    fn zero_iterations_leave_zero_pressure() {
        let (system, fluid, _) = pool_system(8);
        let grid = system.b.grid();
        let mut pressure = Field2::new(grid, 5.0);
        JacobiSolver::new(grid, 0).solve(&system, fluid.phi(), &mut pressure);
        assert_eq!(pressure.inf_norm(), 0.0);
    }

    #[test]
    fn air_cells_stay_zero() {
        let (system, fluid, _) = pool_system(12);
        let grid = system.b.grid();
        let mut pressure = Field2::new(grid, 0.0);
        JacobiSolver::new(grid, 25).solve(&system, fluid.phi(), &mut pressure);
        for j in 0..12 {
            for i in 0..12 {
                if !fluid.is_fluid(i, j) {
                    assert_eq!(pressure.get(i, j), 0.0);
                }
            }
        }
    }
}
