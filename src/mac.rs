use crate::field::{bilinear, fill_indexed, max_abs, update_indexed};
use crate::{Grid2, Vec2};

/// Sample lattice offset from the cell lattice, e.g. MAC faces or cell corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StaggeredGrid2 {
    nx: usize,
    ny: usize,
    dx: f32,
    origin: Vec2,
}

impl StaggeredGrid2 {
    pub fn new(nx: usize, ny: usize, dx: f32, origin: Vec2) -> Self {
        assert!(nx > 0, "nx must be > 0");
        assert!(ny > 0, "ny must be > 0");
        assert!(dx > 0.0, "dx must be > 0");
        Self { nx, ny, dx, origin }
    }

    pub fn u_faces(cells: Grid2) -> Self {
        let dx = cells.dx();
        Self::new(cells.nx() + 1, cells.ny(), dx, Vec2::new(0.0, 0.5 * dx))
    }

    pub fn v_faces(cells: Grid2) -> Self {
        let dx = cells.dx();
        Self::new(cells.nx(), cells.ny() + 1, dx, Vec2::new(0.5 * dx, 0.0))
    }

    pub fn corners(cells: Grid2) -> Self {
        Self::new(cells.nx() + 1, cells.ny() + 1, cells.dx(), Vec2::zero())
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

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn size(&self) -> usize {
        self.nx * self.ny
    }

    pub fn idx(&self, i: usize, j: usize) -> usize {
        assert!(
            i < self.nx && j < self.ny,
            "index ({i}, {j}) out of bounds for {}x{} staggered grid",
            self.nx,
            self.ny
        );
        j * self.nx + i
    }

    pub fn index_position(&self, i: usize, j: usize) -> Vec2 {
        Vec2::new(
            self.origin.x + i as f32 * self.dx,
            self.origin.y + j as f32 * self.dx,
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StaggeredField2 {
    grid: StaggeredGrid2,
    data: Vec<f32>,
}

impl StaggeredField2 {
    pub fn new(grid: StaggeredGrid2, fill: f32) -> Self {
        let data = vec![fill; grid.size()];
        Self { grid, data }
    }

    pub fn from_fn(grid: StaggeredGrid2, f: impl Fn(usize, usize) -> f32 + Sync) -> Self {
        let mut field = Self::new(grid, 0.0);
        field.fill_with_index(f);
        field
    }

    pub fn grid(&self) -> StaggeredGrid2 {
        self.grid
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

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    pub fn copy_from(&mut self, other: &Self) {
        assert_eq!(self.grid, other.grid, "staggered grid mismatch");
        self.data.copy_from_slice(&other.data);
    }

    /// Bilinear sample at a world position, clamped at the lattice border.
    pub fn bilerp(&self, pos: Vec2) -> f32 {
        let origin = self.grid.origin();
        let inv_dx = 1.0 / self.grid.dx();
        bilinear(
            &self.data,
            self.grid.nx(),
            self.grid.ny(),
            (pos.x - origin.x) * inv_dx,
            (pos.y - origin.y) * inv_dx,
        )
    }

    pub fn fill_with_index(&mut self, f: impl Fn(usize, usize) -> f32 + Sync) {
        let nx = self.grid.nx();
        fill_indexed(&mut self.data, nx, f);
    }

    pub fn update_with_index(&mut self, f: impl Fn(usize, usize, f32) -> f32 + Sync) {
        let nx = self.grid.nx();
        update_indexed(&mut self.data, nx, f);
    }

    pub fn max_abs(&self) -> f32 {
        max_abs(&self.data)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Face {
    Left,
    Right,
    Bottom,
    Top,
}

impl Face {
    pub fn axis(self) -> Axis {
        match self {
            Face::Left | Face::Right => Axis::X,
            Face::Bottom | Face::Top => Axis::Y,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Corner {
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
}

/// Values on the faces normal to one axis, addressed per cell.
///
/// `Right` of cell `(i, j)` and `Left` of `(i + 1, j)` share one slot, as do
/// `Top` of `(i, j)` and `Bottom` of `(i, j + 1)`.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceField2 {
    axis: Axis,
    cells: Grid2,
    values: StaggeredField2,
}

impl FaceField2 {
    pub fn new(cells: Grid2, axis: Axis, fill: f32) -> Self {
        let grid = match axis {
            Axis::X => StaggeredGrid2::u_faces(cells),
            Axis::Y => StaggeredGrid2::v_faces(cells),
        };
        Self {
            axis,
            cells,
            values: StaggeredField2::new(grid, fill),
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn cell_grid(&self) -> Grid2 {
        self.cells
    }

    pub fn storage(&self) -> &StaggeredField2 {
        &self.values
    }

    pub fn storage_mut(&mut self) -> &mut StaggeredField2 {
        &mut self.values
    }

    fn slot(&self, i: usize, j: usize, face: Face) -> (usize, usize) {
        assert_eq!(
            face.axis(),
            self.axis,
            "face {face:?} does not belong to a {:?} face field",
            self.axis
        );
        match face {
            Face::Left | Face::Bottom => (i, j),
            Face::Right => (i + 1, j),
            Face::Top => (i, j + 1),
        }
    }

    pub fn face(&self, i: usize, j: usize, face: Face) -> f32 {
        let (si, sj) = self.slot(i, j, face);
        self.values.get(si, sj)
    }

    pub fn face_mut(&mut self, i: usize, j: usize, face: Face) -> &mut f32 {
        let (si, sj) = self.slot(i, j, face);
        self.values.get_mut(si, sj)
    }

    pub fn set_face(&mut self, i: usize, j: usize, face: Face, value: f32) {
        *self.face_mut(i, j, face) = value;
    }

    /// Mean of the two opposing faces of cell `(i, j)`.
    pub fn center(&self, i: usize, j: usize) -> f32 {
        let (low, high) = self.faces_of_axis();
        0.5 * (self.face(i, j, low) + self.face(i, j, high))
    }

    pub fn face_position(&self, i: usize, j: usize, face: Face) -> Vec2 {
        let (si, sj) = self.slot(i, j, face);
        self.values.grid().index_position(si, sj)
    }

    pub fn bilerp(&self, pos: Vec2) -> f32 {
        self.values.bilerp(pos)
    }

    pub fn fill(&mut self, value: f32) {
        self.values.fill(value);
    }

    pub fn max_abs(&self) -> f32 {
        self.values.max_abs()
    }

    fn faces_of_axis(&self) -> (Face, Face) {
        match self.axis {
            Axis::X => (Face::Left, Face::Right),
            Axis::Y => (Face::Bottom, Face::Top),
        }
    }
}

/// Values on cell corners, `(nx + 1) x (ny + 1)` samples.
#[derive(Clone, Debug, PartialEq)]
pub struct CornerField2 {
    cells: Grid2,
    values: StaggeredField2,
}

impl CornerField2 {
    pub fn new(cells: Grid2, fill: f32) -> Self {
        Self {
            cells,
            values: StaggeredField2::new(StaggeredGrid2::corners(cells), fill),
        }
    }

    pub fn cell_grid(&self) -> Grid2 {
        self.cells
    }

    pub fn storage(&self) -> &StaggeredField2 {
        &self.values
    }

    pub fn storage_mut(&mut self) -> &mut StaggeredField2 {
        &mut self.values
    }

    fn slot(i: usize, j: usize, corner: Corner) -> (usize, usize) {
        match corner {
            Corner::BottomLeft => (i, j),
            Corner::BottomRight => (i + 1, j),
            Corner::TopLeft => (i, j + 1),
            Corner::TopRight => (i + 1, j + 1),
        }
    }

    pub fn corner(&self, i: usize, j: usize, corner: Corner) -> f32 {
        let (si, sj) = Self::slot(i, j, corner);
        self.values.get(si, sj)
    }

    pub fn corner_mut(&mut self, i: usize, j: usize, corner: Corner) -> &mut f32 {
        let (si, sj) = Self::slot(i, j, corner);
        self.values.get_mut(si, sj)
    }

    pub fn set_corner(&mut self, i: usize, j: usize, corner: Corner, value: f32) {
        *self.corner_mut(i, j, corner) = value;
    }

    pub fn center(&self, i: usize, j: usize) -> f32 {
        0.25 * (self.corner(i, j, Corner::BottomLeft)
            + self.corner(i, j, Corner::BottomRight)
            + self.corner(i, j, Corner::TopLeft)
            + self.corner(i, j, Corner::TopRight))
    }

    pub fn corner_position(&self, i: usize, j: usize, corner: Corner) -> Vec2 {
        let (si, sj) = Self::slot(i, j, corner);
        self.values.grid().index_position(si, sj)
    }

    pub fn bilerp(&self, pos: Vec2) -> f32 {
        self.values.bilerp(pos)
    }

    pub fn fill(&mut self, value: f32) {
        self.values.fill(value);
    }
}

/// MAC-staggered vector field: `u` on x-faces, `v` on y-faces.
#[derive(Clone, Debug, PartialEq)]
pub struct MacVelocity2 {
    grid: Grid2,
    u: FaceField2,
    v: FaceField2,
}

impl MacVelocity2 {
    pub fn new(grid: Grid2, fill: Vec2) -> Self {
        Self {
            grid,
            u: FaceField2::new(grid, Axis::X, fill.x),
            v: FaceField2::new(grid, Axis::Y, fill.y),
        }
    }

    pub fn from_components(u: FaceField2, v: FaceField2) -> Self {
        assert_eq!(u.axis(), Axis::X, "u must hold x-faces");
        assert_eq!(v.axis(), Axis::Y, "v must hold y-faces");
        assert_eq!(u.cell_grid(), v.cell_grid(), "u/v grid mismatch");
        Self {
            grid: u.cell_grid(),
            u,
            v,
        }
    }

    pub fn grid(&self) -> Grid2 {
        self.grid
    }

    pub fn u(&self) -> &FaceField2 {
        &self.u
    }

    pub fn v(&self) -> &FaceField2 {
        &self.v
    }

    pub fn u_mut(&mut self) -> &mut FaceField2 {
        &mut self.u
    }

    pub fn v_mut(&mut self) -> &mut FaceField2 {
        &mut self.v
    }

    pub fn components_mut(&mut self) -> (&mut FaceField2, &mut FaceField2) {
        (&mut self.u, &mut self.v)
    }

    pub fn bilerp(&self, pos: Vec2) -> Vec2 {
        Vec2::new(self.u.bilerp(pos), self.v.bilerp(pos))
    }

    pub fn max_abs(&self) -> f32 {
        self.u.max_abs().max(self.v.max_abs())
    }
}
