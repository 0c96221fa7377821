use crate::grid::barycentric;
use crate::{Grid2, Vec2};
use rayon::prelude::*;
use std::sync::OnceLock;

const PAR_THRESHOLD_DEFAULT: usize = 262_144;
const PAR_MIN_WORK_PER_THREAD: usize = 4096;

fn parallel_threshold() -> usize {
    static THRESHOLD: OnceLock<usize> = OnceLock::new();
    *THRESHOLD.get_or_init(|| {
        std::env::var("SIM_PAR_THRESHOLD")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(PAR_THRESHOLD_DEFAULT)
    })
}

pub(crate) fn should_parallel(len: usize) -> bool {
    if len < parallel_threshold() {
        return false;
    }
    let threads = rayon::current_num_threads().max(1);
    len / threads >= PAR_MIN_WORK_PER_THREAD
}

/// Bilinear lookup in a row-major `nx` by `ny` buffer at grid coordinates
/// `(gx, gy)`, clamped at the borders.
pub(crate) fn bilinear(data: &[f32], nx: usize, ny: usize, gx: f32, gy: f32) -> f32 {
    let (i, tx) = barycentric(gx, nx);
    let (j, ty) = barycentric(gy, ny);
    blend(data, nx, ny, i, j, tx, ty)
}

pub(crate) fn blend(
    data: &[f32],
    nx: usize,
    ny: usize,
    i: usize,
    j: usize,
    tx: f32,
    ty: f32,
) -> f32 {
    let i1 = (i + 1).min(nx - 1);
    let j1 = (j + 1).min(ny - 1);
    let v00 = data[j * nx + i];
    let v10 = data[j * nx + i1];
    let v01 = data[j1 * nx + i];
    let v11 = data[j1 * nx + i1];
    let vx0 = v00 + (v10 - v00) * tx;
    let vx1 = v01 + (v11 - v01) * tx;
    vx0 + (vx1 - vx0) * ty
}

pub(crate) fn fill_indexed(data: &mut [f32], nx: usize, f: impl Fn(usize, usize) -> f32 + Sync) {
    if should_parallel(data.len()) {
        data.par_iter_mut().enumerate().for_each(|(k, value)| {
            *value = f(k % nx, k / nx);
        });
    } else {
        for (k, value) in data.iter_mut().enumerate() {
            *value = f(k % nx, k / nx);
        }
    }
}

pub(crate) fn update_indexed(
    data: &mut [f32],
    nx: usize,
    f: impl Fn(usize, usize, f32) -> f32 + Sync,
) {
    if should_parallel(data.len()) {
        data.par_iter_mut().enumerate().for_each(|(k, value)| {
            *value = f(k % nx, k / nx, *value);
        });
    } else {
        for (k, value) in data.iter_mut().enumerate() {
            *value = f(k % nx, k / nx, *value);
        }
    }
}

pub(crate) fn max_abs(data: &[f32]) -> f32 {
    if should_parallel(data.len()) {
        data.par_iter()
            .map(|value| value.abs())
            .reduce(|| 0.0_f32, f32::max)
    } else {
        data.iter().map(|value| value.abs()).fold(0.0_f32, f32::max)
    }
}

/// Cell-centered scalar field over a [`Grid2`].
#[derive(Clone, Debug, PartialEq)]
pub struct Field2 {
    grid: Grid2,
    data: Vec<f32>,
}

impl Field2 {
    pub fn new(grid: Grid2, fill: f32) -> Self {
        let data = vec![fill; grid.size()];
        Self { grid, data }
    }

    pub fn from_fn(grid: Grid2, f: impl Fn(usize, usize) -> f32 + Sync) -> Self {
        let mut field = Self::new(grid, 0.0);
        field.fill_with_index(f);
        field
    }

    pub fn grid(&self) -> Grid2 {
        self.grid
    }

    pub fn nx(&self) -> usize {
        self.grid.nx()
    }

    pub fn ny(&self) -> usize {
        self.grid.ny()
    }

    pub fn dx(&self) -> f32 {
        self.grid.dx()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[self.grid.idx(i, j)]
    }

    pub fn get_mut(&mut self, i: usize, j: usize) -> &mut f32 {
        let k = self.grid.idx(i, j);
        &mut self.data[k]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f32) {
        *self.get_mut(i, j) = value;
    }

    pub fn position(&self, i: usize, j: usize) -> Vec2 {
        self.grid.cell_center(i, j)
    }

    /// Bilinear sample at a world position; samples sit at cell centers.
    pub fn bilerp(&self, pos: Vec2) -> f32 {
        let inv_dx = self.grid.inv_dx();
        bilinear(
            &self.data,
            self.nx(),
            self.ny(),
            pos.x * inv_dx - 0.5,
            pos.y * inv_dx - 0.5,
        )
    }

    pub fn bilerp_at(&self, i: usize, j: usize, tx: f32, ty: f32) -> f32 {
        assert!(i < self.nx() && j < self.ny(), "bilerp base out of bounds");
        blend(&self.data, self.nx(), self.ny(), i, j, tx, ty)
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    pub fn reset(&mut self) {
        self.fill(0.0);
    }

    pub fn resize(&mut self, grid: Grid2) {
        self.grid = grid;
        self.data.clear();
        self.data.resize(grid.size(), 0.0);
    }

    pub fn copy_from(&mut self, other: &Self) {
        self.assert_same_grid(other);
        self.data.copy_from_slice(&other.data);
    }

    pub fn swap(&mut self, other: &mut Self) {
        self.assert_same_grid(other);
        std::mem::swap(&mut self.data, &mut other.data);
    }

    pub fn fill_with_index(&mut self, f: impl Fn(usize, usize) -> f32 + Sync) {
        let nx = self.nx();
        fill_indexed(&mut self.data, nx, f);
    }

    pub fn update_with_index(&mut self, f: impl Fn(usize, usize, f32) -> f32 + Sync) {
        let nx = self.nx();
        update_indexed(&mut self.data, nx, f);
    }

    pub fn inf_norm(&self) -> f32 {
        max_abs(&self.data)
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.assert_same_grid(other);
        if should_parallel(self.data.len()) {
            self.data
                .par_iter()
                .zip(other.data.par_iter())
                .map(|(a, b)| a * b)
                .sum()
        } else {
            self.data
                .iter()
                .zip(other.data.iter())
                .map(|(a, b)| a * b)
                .sum()
        }
    }

    /// `self += other * scale`
    pub fn add_scaled(&mut self, other: &Self, scale: f32) {
        self.zip_in_place(other, |a, b| a + b * scale);
    }

    /// `self = self * scale + other`
    pub fn scale_and_add(&mut self, scale: f32, other: &Self) {
        self.zip_in_place(other, |a, b| a * scale + b);
    }

    pub fn scale(&mut self, scale: f32) {
        if should_parallel(self.data.len()) {
            self.data.par_iter_mut().for_each(|value| *value *= scale);
        } else {
            for value in &mut self.data {
                *value *= scale;
            }
        }
    }

    pub fn multiply(&mut self, other: &Self) {
        self.zip_in_place(other, |a, b| a * b);
    }

    /// Elementwise division; cells whose divisor is zero keep their value.
    pub fn divide(&mut self, other: &Self) {
        self.zip_in_place(other, |a, b| if b == 0.0 { a } else { a / b });
    }

    pub fn min_max(&self) -> (f32, f32) {
        let mut iter = self.data.iter().filter(|value| value.is_finite());
        let Some(first) = iter.next() else {
            return (0.0, 0.0);
        };
        iter.fold((*first, *first), |(lo, hi), value| {
            (lo.min(*value), hi.max(*value))
        })
    }

    fn zip_in_place(&mut self, other: &Self, f: impl Fn(f32, f32) -> f32 + Sync) {
        self.assert_same_grid(other);
        if should_parallel(self.data.len()) {
            self.data
                .par_iter_mut()
                .zip(other.data.par_iter())
                .for_each(|(a, b)| *a = f(*a, *b));
        } else {
            for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
                *a = f(*a, *b);
            }
        }
    }

    fn assert_same_grid(&self, other: &Self) {
        assert_eq!(self.grid, other.grid, "field grid mismatch");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_close(a: f32, b: f32, tol: f32) {
        assert!(
            (a - b).abs() <= tol,
            "expected {a} to be within {tol} of {b}"
        );
    }

    fn two_by_two() -> Field2 {
        let grid = Grid2::new(2, 2, 1.0);
        Field2::from_fn(grid, |i, j| (1 + i + 2 * j) as f32)
    }

    #[test]
    fn bilerp_hits_corners_and_blends_between() {
        let field = two_by_two();
        assert_close(field.bilerp(Vec2::new(0.0, 0.0)), 1.0, 1e-6);
        assert_close(field.bilerp(Vec2::new(2.0, 0.0)), 2.0, 1e-6);
        assert_close(field.bilerp(Vec2::new(0.0, 2.0)), 3.0, 1e-6);
        assert_close(field.bilerp(Vec2::new(2.0, 2.0)), 4.0, 1e-6);
        assert_close(field.bilerp(Vec2::new(1.0, 1.0)), 2.5, 1e-6);
        assert_close(field.bilerp(Vec2::new(1.0, 0.5)), 1.5, 1e-6);
    }

    #[test]
    fn bilerp_reproduces_cell_centers() {
        let grid = Grid2::new(5, 4, 0.25);
        let field = Field2::from_fn(grid, |i, j| (i * i) as f32 - 0.5 * j as f32);
        for j in 0..4 {
            for i in 0..5 {
                assert_close(field.bilerp(field.position(i, j)), field.get(i, j), 1e-5);
            }
        }
    }

    #[test]
    fn bilerp_at_blends_from_a_base_cell() {
        let field = two_by_two();
        assert_close(field.bilerp_at(0, 0, 0.0, 0.0), 1.0, 0.0);
        assert_close(field.bilerp_at(0, 0, 0.5, 0.5), 2.5, 1e-6);
        assert_close(field.bilerp_at(0, 0, 1.0, 0.25), 2.5, 1e-6);
        assert_close(field.bilerp_at(1, 1, 0.7, 0.7), 4.0, 0.0);
    }

    #[test]
    fn norms_and_dot() {
        let field = two_by_two();
        assert_close(field.inf_norm(), 4.0, 0.0);
        assert_close(field.dot(&field), 30.0, 0.0);
        assert_close(Field2::new(field.grid(), 0.0).inf_norm(), 0.0, 0.0);
    }

    #[test]
    fn scale_and_add_matches_definition() {
        let mut a = two_by_two();
        let b = two_by_two();
        a.scale_and_add(2.0, &b);
        assert_close(a.get(1, 1), 12.0, 1e-6);
        a.add_scaled(&b, -3.0);
        assert_close(a.get(0, 1), 0.0, 1e-6);
    }

    #[test]
    fn divide_skips_zero_divisor() {
        let mut a = two_by_two();
        let mut d = Field2::new(a.grid(), 2.0);
        d.set(1, 0, 0.0);
        a.divide(&d);
        assert_close(a.get(0, 0), 0.5, 1e-6);
        assert_close(a.get(1, 0), 2.0, 1e-6);
        a.multiply(&d);
        assert_close(a.get(1, 1), 4.0, 1e-6);
    }

    #[test]
    fn swap_exchanges_contents() {
        let mut a = two_by_two();
        let mut b = Field2::new(a.grid(), 7.0);
        a.swap(&mut b);
        assert_close(a.get(1, 1), 7.0, 0.0);
        assert_close(b.get(1, 1), 4.0, 0.0);
    }

    #[test]
    #[should_panic(expected = "field grid mismatch")]
    fn mismatched_grids_panic() {
        let a = two_by_two();
        let b = Field2::new(Grid2::new(3, 2, 1.0), 0.0);
        let _ = a.dot(&b);
    }

    #[test]
    fn resize_zero_fills() {
        let mut a = two_by_two();
        a.resize(Grid2::new(3, 3, 0.5));
        assert_eq!(a.data().len(), 9);
        assert_close(a.inf_norm(), 0.0, 0.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn bilerp_stays_within_data_range(x in -1.0f32..5.0, y in -1.0f32..5.0) {
            let grid = Grid2::new(4, 4, 1.0);
            let field = Field2::from_fn(grid, |i, j| ((i * 7 + j * 3) % 5) as f32);
            let (lo, hi) = field.min_max();
            let value = field.bilerp(Vec2::new(x, y));
            prop_assert!(value >= lo - 1e-5 && value <= hi + 1e-5);
        }

        #[test]
        fn bilerp_is_continuous(x in 0.0f32..4.0, y in 0.0f32..4.0) {
            let grid = Grid2::new(4, 4, 1.0);
            let field = Field2::from_fn(grid, |i, j| (i as f32) * 1.5 - (j as f32) * 0.75);
            let a = field.bilerp(Vec2::new(x, y));
            let b = field.bilerp(Vec2::new(x + 1e-3, y + 1e-3));
            prop_assert!((a - b).abs() <= 1e-2);
        }
    }
}
