use crate::{Field2, Grid2};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stencil {
    Center,
    Left,
    Right,
    Bottom,
    Top,
}

/// Symmetric 5-point operator stored as a diagonal plus the `+i` and `+j`
/// couplings of each cell. `Left`/`Bottom` read the neighbour's `+i`/`+j`.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseLaplacian2 {
    diag: Field2,
    plus_i: Field2,
    plus_j: Field2,
}

impl SparseLaplacian2 {
    pub fn new(grid: Grid2) -> Self {
        Self {
            diag: Field2::new(grid, 0.0),
            plus_i: Field2::new(grid, 0.0),
            plus_j: Field2::new(grid, 0.0),
        }
    }

    pub fn grid(&self) -> Grid2 {
        self.diag.grid()
    }

    pub fn reset(&mut self) {
        self.diag.reset();
        self.plus_i.reset();
        self.plus_j.reset();
    }

    pub fn diag(&self) -> &Field2 {
        &self.diag
    }

    pub fn value(&self, i: usize, j: usize, stencil: Stencil) -> f32 {
        match stencil {
            Stencil::Center => self.diag.get(i, j),
            Stencil::Right => self.plus_i.get(i, j),
            Stencil::Top => self.plus_j.get(i, j),
            Stencil::Left => self.plus_i.get(i - 1, j),
            Stencil::Bottom => self.plus_j.get(i, j - 1),
        }
    }

    pub fn value_mut(&mut self, i: usize, j: usize, stencil: Stencil) -> &mut f32 {
        match stencil {
            Stencil::Center => self.diag.get_mut(i, j),
            Stencil::Right => self.plus_i.get_mut(i, j),
            Stencil::Top => self.plus_j.get_mut(i, j),
            Stencil::Left => self.plus_i.get_mut(i - 1, j),
            Stencil::Bottom => self.plus_j.get_mut(i, j - 1),
        }
    }

    /// Row `(i, j)` of `A x`.
    pub fn mult(&self, x: &Field2, i: usize, j: usize) -> f32 {
        self.diag.get(i, j) * x.get(i, j) + self.mult_neighbors(x, i, j)
    }

    /// Off-diagonal part of row `(i, j)` of `A x`.
    pub fn mult_neighbors(&self, x: &Field2, i: usize, j: usize) -> f32 {
        let nx = self.diag.nx();
        let ny = self.diag.ny();
        let mut sum = 0.0;
        if i > 0 {
            sum += self.plus_i.get(i - 1, j) * x.get(i - 1, j);
        }
        if i + 1 < nx {
            sum += self.plus_i.get(i, j) * x.get(i + 1, j);
        }
        if j > 0 {
            sum += self.plus_j.get(i, j - 1) * x.get(i, j - 1);
        }
        if j + 1 < ny {
            sum += self.plus_j.get(i, j) * x.get(i, j + 1);
        }
        sum
    }

    pub fn scale(&mut self, s: f32) {
        self.diag.scale(s);
        self.plus_i.scale(s);
        self.plus_j.scale(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_operator() -> SparseLaplacian2 {
        let mut a = SparseLaplacian2::new(Grid2::new(3, 3, 1.0));
        *a.value_mut(1, 1, Stencil::Center) = 1.0;
        *a.value_mut(1, 1, Stencil::Left) = 1.0;
        *a.value_mut(1, 1, Stencil::Right) = 2.0;
        *a.value_mut(1, 1, Stencil::Bottom) = 3.0;
        *a.value_mut(1, 1, Stencil::Top) = 4.0;
        *a.value_mut(0, 0, Stencil::Center) = 1.0;
        *a.value_mut(0, 0, Stencil::Top) = 2.0;
        *a.value_mut(0, 0, Stencil::Right) = 3.0;
        a
    }

    #[test]
    fn mult_sums_in_range_terms() {
        let a = sample_operator();
        let ones = Field2::new(a.grid(), 1.0);
        assert_eq!(a.mult(&ones, 0, 0), 6.0);
        assert_eq!(a.mult(&ones, 1, 1), 11.0);
        assert_eq!(a.mult_neighbors(&ones, 1, 1), 10.0);
    }

    #[test]
    fn left_and_bottom_alias_neighbor_slots() {
        let a = sample_operator();
        assert_eq!(a.value(2, 1, Stencil::Left), a.value(1, 1, Stencil::Right));
        assert_eq!(a.value(1, 2, Stencil::Bottom), 4.0);
        assert_eq!(a.value(1, 0, Stencil::Left), 3.0);
    }

    #[test]
    fn scale_and_reset() {
        let mut a = sample_operator();
        a.scale(0.5);
        assert_eq!(a.value(1, 1, Stencil::Top), 2.0);
        a.reset();
        let ones = Field2::new(a.grid(), 1.0);
        assert_eq!(a.mult(&ones, 1, 1), 0.0);
    }
}
