use crate::Vec2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid2 {
    nx: usize,
    ny: usize,
    dx: f32,
}

impl Grid2 {
    pub fn new(nx: usize, ny: usize, dx: f32) -> Self {
        assert!(nx > 0, "nx must be > 0");
        assert!(ny > 0, "ny must be > 0");
        assert!(dx > 0.0, "dx must be > 0");
        Self { nx, ny, dx }
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn dx(&self) -> f32 {
        self.dx
    }

    pub fn inv_dx(&self) -> f32 {
        1.0 / self.dx
    }

    pub fn size(&self) -> usize {
        self.nx * self.ny
    }

    pub fn idx(&self, i: usize, j: usize) -> usize {
        assert!(
            i < self.nx && j < self.ny,
            "index ({i}, {j}) out of bounds for {}x{} grid",
            self.nx,
            self.ny
        );
        j * self.nx + i
    }

    pub fn cell_center(&self, i: usize, j: usize) -> Vec2 {
        Vec2::new((i as f32 + 0.5) * self.dx, (j as f32 + 0.5) * self.dx)
    }

    /// Same physical domain at half the resolution.
    pub fn coarsen(&self) -> Self {
        Self::new((self.nx / 2).max(1), (self.ny / 2).max(1), self.dx * 2.0)
    }
}

/// Splits a grid coordinate into a base index and a blend weight, clamped so
/// that `base + 1` stays inside `0..n`.
pub fn barycentric(g: f32, n: usize) -> (usize, f32) {
    if n < 2 || g <= 0.0 {
        return (0, 0.0);
    }
    let last = (n - 2) as f32;
    if g >= last + 1.0 {
        return (n - 2, 1.0);
    }
    let base = g.floor();
    (base as usize, g - base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barycentric_clamps_to_edges() {
        assert_eq!(barycentric(-0.3, 4), (0, 0.0));
        assert_eq!(barycentric(3.0, 4), (2, 1.0));
        assert_eq!(barycentric(7.5, 4), (2, 1.0));
        assert_eq!(barycentric(1.25, 4), (1, 0.25));
        assert_eq!(barycentric(0.5, 1), (0, 0.0));
    }

    #[test]
    fn coarsen_halves_resolution() {
        let grid = Grid2::new(32, 16, 0.5);
        let coarse = grid.coarsen();
        assert_eq!(coarse, Grid2::new(16, 8, 1.0));
        assert_eq!(Grid2::new(1, 3, 1.0).coarsen(), Grid2::new(1, 1, 2.0));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn idx_panics_out_of_range() {
        let grid = Grid2::new(3, 3, 1.0);
        let _ = grid.idx(3, 0);
    }
}
