use crate::{FluidSdf, MacVelocity2, Particles, Settings, SolidSdf, Vec2};

const SEED_JITTER: f32 = 0.9;

/// Geometry of the box scene ready for a pressure solve: walls, a disk of
/// particles, the reconstructed fluid surface and one body-force step of
/// face velocities.
#[derive(Clone, Debug)]
pub struct BoxScene {
    pub solid: SolidSdf,
    pub fluid: FluidSdf,
    pub particles: Particles,
    pub weights: MacVelocity2,
    pub velocity: MacVelocity2,
}

impl BoxScene {
    pub fn new(settings: &Settings) -> Self {
        let grid = settings.grid();
        let mut solid = SolidSdf::new(grid);
        solid.init_box_boundary(settings.solid_width);

        let spacing = grid.dx() / (settings.particles_per_cell.max(1) as f32).sqrt();
        let mut particles = Particles::seed_disk(
            settings.initial_fluid_center,
            settings.initial_fluid_radius,
            spacing,
            SEED_JITTER,
        );
        particles.add_velocity(settings.initial_velocity);
        log::info!("seeded {} particles", particles.len());

        let mut fluid = FluidSdf::new(grid);
        fluid.reconstruct_surface(
            &particles,
            settings.kernel_radius,
            settings.particle_radius,
        );
        fluid.reinitialize(settings.num_phi_sweep_iterations);
        fluid.extrapolate_into_solid(&solid);

        let mut weights = MacVelocity2::new(grid, Vec2::zero());
        let (uw, vw) = weights.components_mut();
        solid.create_weights(uw, vw);

        let impulse = settings
            .initial_velocity
            .add(settings.gravity.scale(settings.time_step));
        let mut velocity = MacVelocity2::new(grid, impulse);
        let (u, v) = velocity.components_mut();
        let (uw, vw) = (weights.u().storage(), weights.v().storage());
        u.storage_mut()
            .update_with_index(|i, j, value| if uw.get(i, j) > 0.0 { value } else { 0.0 });
        v.storage_mut()
            .update_with_index(|i, j, value| if vw.get(i, j) > 0.0 { value } else { 0.0 });

        Self {
            solid,
            fluid,
            particles,
            weights,
            velocity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_box_scene_has_fluid_and_closed_walls() {
        let settings = Settings {
            nx: 32,
            ny: 32,
            dx: 1.0 / 33.0,
            kernel_radius: 1.0 / 33.0,
            particle_radius: 0.6 / 33.0,
            solid_width: 2,
            ..Settings::default()
        };
        let scene = BoxScene::new(&settings);
        assert!(!scene.particles.is_empty());
        assert!(scene.fluid.fluid_cell_count() > 0);
        assert!(scene.fluid.is_fluid(16, 8));
        assert!(!scene.fluid.is_fluid(16, 24));
        assert_eq!(scene.weights.u().storage().get(0, 10), 0.0);
        assert_eq!(scene.velocity.u().storage().get(0, 10), 0.0);
        assert!(scene.velocity.v().storage().get(16, 8) < 0.0);
    }
}
