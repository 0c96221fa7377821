use crate::{Field2, Grid2, Vec2};

/// Cell-centered 2-vector field, one [`Field2`] per component.
#[derive(Clone, Debug, PartialEq)]
pub struct VecField2 {
    x: Field2,
    y: Field2,
}

impl VecField2 {
    pub fn new(grid: Grid2, fill: Vec2) -> Self {
        Self {
            x: Field2::new(grid, fill.x),
            y: Field2::new(grid, fill.y),
        }
    }

    pub fn grid(&self) -> Grid2 {
        self.x.grid()
    }

    pub fn get(&self, i: usize, j: usize) -> Vec2 {
        Vec2::new(self.x.get(i, j), self.y.get(i, j))
    }

    pub fn accumulate(&mut self, i: usize, j: usize, value: Vec2) {
        *self.x.get_mut(i, j) += value.x;
        *self.y.get_mut(i, j) += value.y;
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }
}
