use crate::error::{SimError, SimResult};
use crate::Vec2;
use rayon::prelude::*;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::OnceLock;

const PAR_THRESHOLD_DEFAULT: usize = 32_768;
const PAR_MIN_WORK_PER_THREAD: usize = 2048;

fn particle_parallel_threshold() -> usize {
    static THRESHOLD: OnceLock<usize> = OnceLock::new();
    *THRESHOLD.get_or_init(|| {
        std::env::var("SIM_PAR_THRESHOLD")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(PAR_THRESHOLD_DEFAULT)
    })
}

fn particle_should_parallel(len: usize) -> bool {
    if len < particle_parallel_threshold() {
        return false;
    }
    let threads = rayon::current_num_threads().max(1);
    len / threads >= PAR_MIN_WORK_PER_THREAD
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Particles {
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
}

impl Particles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            velocities: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vec2] {
        &self.velocities
    }

    pub fn push(&mut self, position: Vec2, velocity: Vec2) {
        self.positions.push(position);
        self.velocities.push(velocity);
    }

    /// Replaces the whole set.
    pub fn add_particles(&mut self, positions: Vec<Vec2>, velocities: Vec<Vec2>) {
        assert_eq!(
            positions.len(),
            velocities.len(),
            "position/velocity count mismatch"
        );
        self.positions = positions;
        self.velocities = velocities;
    }

    pub fn add_velocity(&mut self, delta: Vec2) {
        for velocity in &mut self.velocities {
            *velocity = velocity.add(delta);
        }
    }

    pub fn advect(&mut self, dt: f32) {
        if particle_should_parallel(self.positions.len()) {
            self.positions
                .par_iter_mut()
                .zip(self.velocities.par_iter())
                .for_each(|(position, velocity)| *position = position.add(velocity.scale(dt)));
        } else {
            for (position, velocity) in self.positions.iter_mut().zip(self.velocities.iter()) {
                *position = position.add(velocity.scale(dt));
            }
        }
    }

    /// Jittered lattice of particles inside a disk. Jitter is a fraction of
    /// `spacing` and deterministic per lattice site.
    pub fn seed_disk(center: Vec2, radius: f32, spacing: f32, jitter: f32) -> Self {
        if spacing <= 0.0 || radius <= 0.0 {
            return Self::new();
        }
        let jitter = jitter.clamp(0.0, 1.0);
        let start_x = center.x - radius + spacing * 0.5;
        let start_y = center.y - radius + spacing * 0.5;
        let max_x = center.x + radius;
        let max_y = center.y + radius;
        if max_x <= start_x || max_y <= start_y {
            return Self::new();
        }
        let nx = ((max_x - start_x) / spacing).floor() as usize + 1;
        let ny = ((max_y - start_y) / spacing).floor() as usize + 1;
        let mut particles = Self::with_capacity(nx * ny);
        for iy in 0..ny {
            for ix in 0..nx {
                let jx = (rand_unit(ix as u32, iy as u32, 7) - 0.5) * jitter * spacing;
                let jy = (rand_unit(ix as u32, iy as u32, 13) - 0.5) * jitter * spacing;
                let position = Vec2::new(
                    start_x + ix as f32 * spacing + jx,
                    start_y + iy as f32 * spacing + jy,
                );
                if position.sub(center).length_squared() > radius * radius {
                    continue;
                }
                particles.push(position, Vec2::zero());
            }
        }
        particles
    }

    /// Little-endian record: `u32` count, then `count` positions, then
    /// `count` velocities, each as two `f32`.
    pub fn write_checkpoint(&self, mut out: impl Write) -> SimResult<()> {
        let count = u32::try_from(self.len())
            .map_err(|_| SimError::Checkpoint(format!("{} particles exceed u32", self.len())))?;
        out.write_all(&count.to_le_bytes())?;
        for values in [&self.positions, &self.velocities] {
            for value in values.iter() {
                out.write_all(&value.x.to_le_bytes())?;
                out.write_all(&value.y.to_le_bytes())?;
            }
        }
        Ok(())
    }

    pub fn read_checkpoint(mut input: impl Read) -> SimResult<Self> {
        let mut header = [0u8; 4];
        input.read_exact(&mut header)?;
        let count = u32::from_le_bytes(header);
        let expected = u64::from(count) * 2 * std::mem::size_of::<Vec2>() as u64;
        let mut payload = Vec::new();
        input
            .by_ref()
            .take(expected)
            .read_to_end(&mut payload)?;
        if payload.len() as u64 != expected {
            return Err(SimError::Checkpoint(format!(
                "truncated record for {count} particles: {} of {expected} bytes",
                payload.len()
            )));
        }
        let mut trailing = [0u8; 1];
        if input.read(&mut trailing)? != 0 {
            return Err(SimError::Checkpoint("trailing bytes after record".into()));
        }
        let (position_bytes, velocity_bytes) = payload.split_at(payload.len() / 2);
        Ok(Self {
            positions: decode_vec2s(position_bytes),
            velocities: decode_vec2s(velocity_bytes),
        })
    }

    pub fn save(&self, path: &Path) -> SimResult<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        self.write_checkpoint(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> SimResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::read_checkpoint(std::io::BufReader::new(file))
    }
}

fn decode_vec2s(bytes: &[u8]) -> Vec<Vec2> {
    let mut values: Vec<Vec2> = bytemuck::pod_collect_to_vec(bytes);
    if cfg!(target_endian = "big") {
        for value in values.iter_mut() {
            value.x = f32::from_bits(u32::from_le(value.x.to_bits()));
            value.y = f32::from_bits(u32::from_le(value.y.to_bits()));
        }
    }
    values
}

fn rand_unit(ix: u32, iy: u32, salt: u32) -> f32 {
    let seed = ix.wrapping_mul(1664525)
        ^ iy.wrapping_mul(1013904223)
        ^ salt.wrapping_mul(2654435761);
    let hashed = mix_u32(seed);
    (hashed as f32) / (u32::MAX as f32)
}

fn mix_u32(mut value: u32) -> u32 {
    value ^= value >> 16;
    value = value.wrapping_mul(0x7feb352d);
    value ^= value >> 15;
    value = value.wrapping_mul(0x846ca68b);
    value ^= value >> 16;
    value
}
