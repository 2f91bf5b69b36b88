use crate::camera_updater::UpdaterSettings;
use crate::sim::SimulationParams;
use anyhow::{ensure, Result};
use clap::Parser;
use std::time::Duration;

/// `hopf-viewer` - Interactive visualisation of the Hopf fibration.
///
/// Every option can also be set through the matching `HOPF_*` environment
/// variable. Simulation values are starting points; the parameter panel
/// changes them at runtime.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Initial window width in logical pixels.
    #[arg(long, env = "HOPF_WIDTH", default_value_t = 1600)]
    pub width: u32,

    /// Initial window height in logical pixels.
    #[arg(long, env = "HOPF_HEIGHT", default_value_t = 900)]
    pub height: u32,

    /// Number of base points, one fiber each.
    #[arg(long, env = "HOPF_FIBERS", default_value_t = 100)]
    pub fibers: u32,

    /// Samples along every fiber.
    #[arg(long, env = "HOPF_RESOLUTION", default_value_t = 200)]
    pub resolution: u32,

    /// Radial segments of the extruded tubes.
    #[arg(long, env = "HOPF_LINE_DETAIL", default_value_t = 8)]
    pub line_detail: u32,

    /// Tube radius in scene units.
    #[arg(long, env = "HOPF_LINE_RADIUS", default_value_t = 0.01)]
    pub line_radius: f32,

    /// Animation speed of the base points and fiber phase.
    #[arg(long, env = "HOPF_ANIM_SPEED", default_value_t = 0.2)]
    pub anim_speed: f32,

    /// Vertical field of view in degrees.
    #[arg(long, env = "HOPF_FOV", default_value_t = 60.0)]
    pub fov_deg: f32,

    #[arg(long, env = "HOPF_NEAR", default_value_t = 0.05)]
    pub near: f32,

    #[arg(long, env = "HOPF_FAR", default_value_t = 500.0)]
    pub far: f32,

    /// Seed of the simulation's random generator.
    #[arg(long, env = "HOPF_SEED", default_value_t = 1)]
    pub seed: u64,

    /// Camera movement speed in units per second.
    #[arg(long, env = "HOPF_CAMERA_SPEED", default_value_t = 1.5)]
    pub camera_speed: f32,

    /// Radians of rotation per pixel of mouse motion.
    #[arg(long, env = "HOPF_MOUSE_SENSITIVITY", default_value_t = 0.004)]
    pub mouse_sensitivity: f32,

    /// Camera updater cadence in milliseconds.
    #[arg(long, env = "HOPF_UPDATE_INTERVAL_MS", default_value_t = 4)]
    pub update_interval_ms: u64,

    /// Width of the parameter panel and control viewport, in logical pixels.
    #[arg(long, env = "HOPF_PANEL_WIDTH", default_value_t = 400)]
    pub panel_width: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_from(["hopf-viewer"])
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.width > 0 && self.height > 0, "window size must be non-zero");
        ensure!(self.fibers > 0, "fiber count must be at least 1");
        ensure!(self.resolution >= 3, "fiber resolution must be at least 3");
        ensure!(self.line_detail >= 3, "line detail must be at least 3");
        ensure!(self.line_radius > 0.0, "line radius must be positive");
        ensure!(
            self.fov_deg > 0.0 && self.fov_deg < 180.0,
            "field of view must be within (0, 180) degrees"
        );
        ensure!(
            self.near > 0.0 && self.near < self.far,
            "clip planes need 0 < near < far (got {} and {})",
            self.near,
            self.far
        );
        ensure!(self.update_interval_ms > 0, "update interval must be non-zero");
        Ok(())
    }

    pub fn simulation_params(&self) -> SimulationParams {
        SimulationParams {
            anim_speed: self.anim_speed,
            fiber_count: self.fibers,
            fiber_resolution: self.resolution,
            line_detail: self.line_detail,
            line_radius: self.line_radius,
            visible_fibers: self.fibers,
            ..SimulationParams::default()
        }
    }

    pub fn updater_settings(&self) -> UpdaterSettings {
        UpdaterSettings {
            speed: self.camera_speed,
            interval: Duration::from_millis(self.update_interval_ms),
        }
    }

    pub fn fov(&self) -> f32 {
        self.fov_deg.to_radians()
    }
}
