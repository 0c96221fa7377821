use crate::mac::{Axis, Corner, CornerField2, Face, FaceField2};
use crate::{Field2, Grid2, Particles, Vec2, VecField2};

/// Extra rings stamped beyond the wall width so the solid SDF is smooth
/// across the wall's inner face.
const BOX_RING_PADDING: usize = 3;

/// Fraction of the segment between two samples that lies inside (phi < 0).
pub fn fraction_inside(phi_a: f32, phi_b: f32) -> f32 {
    match (phi_a < 0.0, phi_b < 0.0) {
        (true, true) => 1.0,
        (true, false) => phi_a / (phi_a - phi_b),
        (false, true) => phi_b / (phi_b - phi_a),
        (false, false) => 0.0,
    }
}

fn open_weight(phi_a: f32, phi_b: f32) -> f32 {
    (1.0 - fraction_inside(phi_a, phi_b)).clamp(0.0, 1.0)
}

/// Solid signed distance sampled on cell corners.
#[derive(Clone, Debug, PartialEq)]
pub struct SolidSdf {
    phi: CornerField2,
}

impl SolidSdf {
    pub fn new(grid: Grid2) -> Self {
        Self {
            phi: CornerField2::new(grid, 0.0),
        }
    }

    pub fn from_phi(phi: CornerField2) -> Self {
        Self { phi }
    }

    pub fn grid(&self) -> Grid2 {
        self.phi.cell_grid()
    }

    pub fn phi(&self) -> &CornerField2 {
        &self.phi
    }

    pub fn phi_mut(&mut self) -> &mut CornerField2 {
        &mut self.phi
    }

    pub fn center(&self, i: usize, j: usize) -> f32 {
        self.phi.center(i, j)
    }

    pub fn phi_at(&self, pos: Vec2) -> f32 {
        self.phi.bilerp(pos)
    }

    /// Walls of `width` cells around the domain. Rings step by one cell
    /// starting half a cell outside the outermost corner.
    pub fn init_box_boundary(&mut self, width: usize) {
        log::info!("initializing solid SDF with box walls of width {width}");
        let grid = self.grid();
        let (nx, ny, dx) = (grid.nx(), grid.ny(), grid.dx());
        let rings = width + BOX_RING_PADDING;
        self.phi.fill((rings as f32 - 1.5) * dx);
        for m in 0..rings {
            let value = (m as f32 - 1.5) * dx;
            for i in m..nx.saturating_sub(m) {
                self.phi.set_corner(i, m, Corner::BottomLeft, value);
                self.phi.set_corner(i, ny - 1 - m, Corner::TopRight, value);
            }
            for j in m..ny.saturating_sub(m) {
                self.phi.set_corner(m, j, Corner::TopLeft, value);
                self.phi.set_corner(nx - 1 - m, j, Corner::BottomRight, value);
            }
        }
    }

    /// Open-area fraction of every face from the corners bounding it.
    pub fn create_weights(&self, uw: &mut FaceField2, vw: &mut FaceField2) {
        log::info!("creating solid/fluid face weights");
        Self::create_weights_from(&self.phi, uw, vw);
    }

    pub fn create_weights_from(phi: &CornerField2, uw: &mut FaceField2, vw: &mut FaceField2) {
        let grid = phi.cell_grid();
        assert_eq!(uw.axis(), Axis::X, "uw must hold x-faces");
        assert_eq!(vw.axis(), Axis::Y, "vw must hold y-faces");
        assert_eq!(uw.cell_grid(), grid, "uw grid mismatch");
        assert_eq!(vw.cell_grid(), grid, "vw grid mismatch");
        let (nx, ny) = (grid.nx(), grid.ny());
        for j in 0..ny {
            for i in 0..nx {
                let w = open_weight(
                    phi.corner(i, j, Corner::TopLeft),
                    phi.corner(i, j, Corner::BottomLeft),
                );
                uw.set_face(i, j, Face::Left, w);
            }
            let w = open_weight(
                phi.corner(nx - 1, j, Corner::TopRight),
                phi.corner(nx - 1, j, Corner::BottomRight),
            );
            uw.set_face(nx - 1, j, Face::Right, w);
        }
        for i in 0..nx {
            for j in 0..ny {
                let w = open_weight(
                    phi.corner(i, j, Corner::BottomRight),
                    phi.corner(i, j, Corner::BottomLeft),
                );
                vw.set_face(i, j, Face::Bottom, w);
            }
            let w = open_weight(
                phi.corner(i, ny - 1, Corner::TopRight),
                phi.corner(i, ny - 1, Corner::TopLeft),
            );
            vw.set_face(i, ny - 1, Face::Top, w);
        }
    }
}

/// Fluid signed distance sampled at cell centers.
#[derive(Clone, Debug, PartialEq)]
pub struct FluidSdf {
    phi: Field2,
    sum: Field2,
    p_avg: VecField2,
}

impl FluidSdf {
    pub fn new(grid: Grid2) -> Self {
        Self {
            phi: Field2::new(grid, far_distance(grid)),
            sum: Field2::new(grid, 0.0),
            p_avg: VecField2::new(grid, Vec2::zero()),
        }
    }

    pub fn from_phi(phi: Field2) -> Self {
        let grid = phi.grid();
        Self {
            phi,
            sum: Field2::new(grid, 0.0),
            p_avg: VecField2::new(grid, Vec2::zero()),
        }
    }

    pub fn grid(&self) -> Grid2 {
        self.phi.grid()
    }

    pub fn is_fluid(&self, i: usize, j: usize) -> bool {
        self.phi.get(i, j) < 0.0
    }

    pub fn phi(&self) -> &Field2 {
        &self.phi
    }

    pub fn phi_mut(&mut self) -> &mut Field2 {
        &mut self.phi
    }

    pub fn fluid_cell_count(&self) -> usize {
        self.phi.data().iter().filter(|value| **value < 0.0).count()
    }

    /// Averaged-position surface: each cell measures its distance to the
    /// kernel-weighted mean of nearby particles, minus the particle radius.
    pub fn reconstruct_surface(&mut self, particles: &Particles, kernel_radius: f32, radius: f32) {
        log::info!(
            "reconstructing fluid surface from {} particles",
            particles.len()
        );
        assert!(kernel_radius > 0.0, "kernel radius must be > 0");
        assert!(radius > 0.0, "particle radius must be > 0");
        let grid = self.grid();
        let (nx, ny) = (grid.nx(), grid.ny());
        let inv_dx = grid.inv_dx();
        self.sum.reset();
        self.p_avg.reset();
        for &pos in particles.positions() {
            let ci = cell_of(pos.x * inv_dx, nx);
            let cj = cell_of(pos.y * inv_dx, ny);
            for j in cj.saturating_sub(2)..=(cj + 2).min(ny - 1) {
                for i in ci.saturating_sub(2)..=(ci + 2).min(nx - 1) {
                    let s = pos.sub(grid.cell_center(i, j)).length() / kernel_radius;
                    let k = kernel(s);
                    if k > 0.0 {
                        *self.sum.get_mut(i, j) += k;
                        self.p_avg.accumulate(i, j, pos.scale(k));
                    }
                }
            }
        }
        let far = far_distance(grid);
        let sum = &self.sum;
        let p_avg = &self.p_avg;
        self.phi.fill_with_index(|i, j| {
            let weight = sum.get(i, j);
            if weight > 0.0 {
                let avg = p_avg.get(i, j).scale(1.0 / weight);
                grid.cell_center(i, j).sub(avg).length() - radius
            } else {
                far
            }
        });
    }

    /// Fast sweeping of the Eikonal equation outside the fluid. Values only
    /// ever decrease and fluid cells are left untouched.
    pub fn reinitialize(&mut self, sweeps: usize) {
        log::info!("reinitializing fluid SDF with {sweeps} sweep iterations");
        let grid = self.grid();
        let (nx, ny) = (grid.nx() as isize, grid.ny() as isize);
        for _ in 0..sweeps {
            self.sweep((1, nx), (1, ny));
            self.sweep((nx - 2, -1), (ny - 2, -1));
            self.sweep((1, nx), (ny - 2, -1));
            self.sweep((nx - 2, -1), (1, ny));
        }
    }

    fn sweep(&mut self, (i0, i1): (isize, isize), (j0, j1): (isize, isize)) {
        let di: isize = if i0 < i1 { 1 } else { -1 };
        let dj: isize = if j0 < j1 { 1 } else { -1 };
        if i0 == i1 || j0 == j1 {
            return;
        }
        let dx = self.phi.dx();
        let mut i = i0;
        while i != i1 {
            let mut j = j0;
            while j != j1 {
                let (iu, ju) = (i as usize, j as usize);
                let current = self.phi.get(iu, ju);
                if current >= 0.0 {
                    let a = self.phi.get((i - di) as usize, ju);
                    let b = self.phi.get(iu, (j - dj) as usize);
                    let candidate = solve_eikonal(a, b, dx);
                    if candidate < current {
                        self.phi.set(iu, ju, candidate);
                    }
                }
                j += dj;
            }
            i += di;
        }
    }

    /// Pulls the fluid surface half a cell into adjacent solid so the
    /// free surface does not detach from the walls.
    pub fn extrapolate_into_solid(&mut self, solid: &SolidSdf) {
        log::info!("extrapolating fluid surface into solid");
        assert_eq!(solid.grid(), self.grid(), "solid/fluid grid mismatch");
        let half = 0.5 * self.phi.dx();
        self.phi.update_with_index(|i, j, phi| {
            if phi < half && solid.center(i, j) < 0.0 {
                -half
            } else {
                phi
            }
        });
    }

    pub fn gradient(&self, pos: Vec2) -> Vec2 {
        let dx = self.phi.dx();
        let inv = 1.0 / (2.0 * dx);
        let gx = self.phi.bilerp(pos.add(Vec2::new(dx, 0.0)))
            - self.phi.bilerp(pos.sub(Vec2::new(dx, 0.0)));
        let gy = self.phi.bilerp(pos.add(Vec2::new(0.0, dx)))
            - self.phi.bilerp(pos.sub(Vec2::new(0.0, dx)));
        Vec2::new(gx * inv, gy * inv)
    }
}

/// Distance assigned to cells no particle reaches.
fn far_distance(grid: Grid2) -> f32 {
    (grid.nx() + grid.ny()) as f32 * grid.dx()
}

fn cell_of(g: f32, n: usize) -> usize {
    if g <= 0.0 {
        0
    } else {
        (g.floor() as usize).min(n - 1)
    }
}

fn kernel(s: f32) -> f32 {
    if s >= 1.0 {
        return 0.0;
    }
    let t = 1.0 - s * s;
    t * t * t
}

fn solve_eikonal(a: f32, b: f32, dx: f32) -> f32 {
    let s = (a - b) * (a - b);
    if s.sqrt() > dx {
        a.min(b) + dx
    } else {
        0.5 * (a + b + (2.0 * dx * dx - s).sqrt())
    }
}
