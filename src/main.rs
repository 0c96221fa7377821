use anyhow::{Context, Result};
use flip2d_sim::{BoxScene, PressureSolver, Settings};
use std::path::PathBuf;

const CHECKPOINT_ENV: &str = "FLIP2D_CHECKPOINT";

fn load_settings() -> Result<Settings> {
    match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => Settings::load_json(&path)
            .with_context(|| format!("load settings from {}", path.display())),
        None => {
            log::info!("no settings file given, using the default box scene");
            Ok(Settings::default())
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = load_settings()?;
    let mut solver = PressureSolver::from_settings(&settings).context("configure pressure solver")?;
    log::info!(
        "{}x{} grid, dx = {:.4}, solver = {:?}",
        settings.nx,
        settings.ny,
        settings.dx,
        solver.kind()
    );

    let scene = BoxScene::new(&settings);
    log::info!("{} fluid cells", scene.fluid.fluid_cell_count());

    solver.build_linear_system(
        &scene.velocity,
        &scene.weights,
        &scene.solid,
        &scene.fluid,
        settings.time_step,
    );
    let report = solver.solve_linear_system(&scene.fluid);
    let (p_min, p_max) = solver.pressure().min_max();
    log::info!("pressure range [{p_min:.4e}, {p_max:.4e}]");
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serialize solve report")?
    );
    if !report.converged {
        log::warn!("pressure solve stopped above tolerance");
    }

    if let Some(path) = std::env::var_os(CHECKPOINT_ENV).map(PathBuf::from) {
        scene
            .particles
            .save(&path)
            .with_context(|| format!("write checkpoint {}", path.display()))?;
        log::info!("wrote {} particles to {}", scene.particles.len(), path.display());
    }
    Ok(())
}
