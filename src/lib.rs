mod error;
mod field;
mod grid;
mod mac;
mod particles;
mod pressure;
mod scene;
mod sdf;
mod settings;
mod sparse;
mod vec2;
mod vec_field;

pub use error::{SimError, SimResult};
pub use field::Field2;
pub use grid::{barycentric, Grid2};
pub use mac::{
    Axis, Corner, CornerField2, Face, FaceField2, MacVelocity2, StaggeredField2, StaggeredGrid2,
};
pub use particles::Particles;
pub use pressure::{
    build_laplacian, build_rhs, GaussSeidelSolver, JacobiSolver, LinearSystem, MultigridSolver,
    PcgSolver, Preconditioner, PressureSolver, SolveReport, SolverKind, SolverStage,
};
pub use scene::BoxScene;
pub use sdf::{fraction_inside, FluidSdf, SolidSdf};
pub use settings::Settings;
pub use sparse::{SparseLaplacian2, Stencil};
pub use vec2::Vec2;
pub use vec_field::VecField2;
