use super::{relaxed_value, LinearSystem};
use crate::sparse::SparseLaplacian2;
use crate::{Field2, Grid2};

#[derive(Clone, Debug)]
pub struct GaussSeidelSolver {
    iterations: usize,
    scratch: Field2,
}

impl GaussSeidelSolver {
    pub fn new(grid: Grid2, iterations: usize) -> Self {
        Self {
            iterations,
            scratch: Field2::new(grid, 0.0),
        }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn solve(&mut self, system: &LinearSystem, phi: &Field2, pressure: &mut Field2) -> usize {
        pressure.reset();
        smooth(
            &system.a,
            &system.b,
            phi,
            pressure,
            &mut self.scratch,
            self.iterations,
        );
        self.iterations
    }
}

/// Red-black Gauss-Seidel, red (`i + j` even) first. Each colour is
/// written to `scratch` while reading `pressure`, then swapped in, which
/// matches the in-place order because a colour only reads the other one.
pub(crate) fn smooth(
    a: &SparseLaplacian2,
    b: &Field2,
    phi: &Field2,
    pressure: &mut Field2,
    scratch: &mut Field2,
    iterations: usize,
) {
    for _ in 0..iterations {
        for parity in [0, 1] {
            let current = &*pressure;
            scratch.fill_with_index(|i, j| {
                let old = current.get(i, j);
                if (i + j) % 2 != parity {
                    return old;
                }
                relaxed_value(a, b, phi, current, i, j).unwrap_or(old)
            });
            pressure.swap(scratch);
        }
    }
}
