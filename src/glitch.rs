use std::f64::consts::PI;

use rand::Rng;
use tracing::trace;

use crate::config::DotsConfig;
use crate::error::{DotsError, DotsResult};

/// Transient rectangle of cells whose dots grow or shrink for a while.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Glitch {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// In [-1, 1): negative shrinks, positive grows.
    pub density_mod: f64,
    pub start_ms: f64,
    pub duration_ms: f64,
}

impl Glitch {
    pub fn age(&self, now_ms: f64) -> f64 {
        now_ms - self.start_ms
    }

    pub fn is_active(&self, now_ms: f64) -> bool {
        let age = self.age(now_ms);
        age >= 0.0 && age < self.duration_ms
    }

    pub fn covers(&self, col: u32, row: u32) -> bool {
        col >= self.x && col < self.x + self.width && row >= self.y && row < self.y + self.height
    }

    /// `sin(π·age/duration)`: 0 at birth, 1 at mid-life, 0 at expiry.
    pub fn fade(&self, now_ms: f64) -> f64 {
        (PI * self.age(now_ms) / self.duration_ms).sin()
    }
}

/// Spawn parameters, lifted out of [`DotsConfig`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlitchParams {
    pub chance: f64,
    pub min_cells: u32,
    pub max_cells: u32,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
}

impl Default for GlitchParams {
    fn default() -> Self {
        Self::from(&DotsConfig::default())
    }
}

impl From<&DotsConfig> for GlitchParams {
    fn from(config: &DotsConfig) -> Self {
        Self {
            chance: config.glitch_chance,
            min_cells: config.glitch_min_cells,
            max_cells: config.glitch_max_cells,
            min_duration_ms: config.glitch_min_duration_ms,
            max_duration_ms: config.glitch_max_duration_ms,
        }
    }
}

impl GlitchParams {
    /// The spawn draws need non-empty ranges and a probability in `[0, 1]`.
    pub fn validate(&self) -> DotsResult<()> {
        if !(0.0..=1.0).contains(&self.chance) {
            return Err(DotsError::invalid_config("glitch chance must lie in [0, 1]"));
        }
        if self.min_cells == 0 || self.min_cells >= self.max_cells {
            return Err(DotsError::invalid_config("glitch cell range is empty"));
        }
        if !(self.min_duration_ms > 0.0
            && self.min_duration_ms < self.max_duration_ms
            && self.max_duration_ms.is_finite())
        {
            return Err(DotsError::invalid_config("glitch duration range is empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct GlitchTimeline {
    params: GlitchParams,
    glitches: Vec<Glitch>,
}

impl GlitchTimeline {
    pub fn new(params: GlitchParams) -> DotsResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            glitches: Vec::new(),
        })
    }

    pub fn glitches(&self) -> &[Glitch] {
        &self.glitches
    }

    /// Adds a glitch directly, bypassing the dice.
    pub fn push(&mut self, glitch: Glitch) {
        self.glitches.push(glitch);
    }

    pub fn clear(&mut self) {
        self.glitches.clear();
    }

    /// One frame: maybe spawn a glitch inside the grid, then drop expired ones.
    pub fn tick(&mut self, now_ms: f64, cols: u32, rows: u32, rng: &mut impl Rng) {
        if rng.random::<f64>() < self.params.chance {
            if let Some(glitch) = self.spawn(now_ms, cols, rows, rng) {
                trace!(?glitch, "glitch spawned");
                self.glitches.push(glitch);
            }
        }
        self.glitches.retain(|g| g.age(now_ms) < g.duration_ms);
    }

    fn spawn(&self, now_ms: f64, cols: u32, rows: u32, rng: &mut impl Rng) -> Option<Glitch> {
        let p = &self.params;
        let width = rng.random_range(p.min_cells..p.max_cells);
        let height = rng.random_range(p.min_cells..p.max_cells);
        // A rectangle that cannot fit strictly inside the grid is skipped.
        if cols <= width || rows <= height {
            return None;
        }
        Some(Glitch {
            x: rng.random_range(0..cols - width),
            y: rng.random_range(0..rows - height),
            width,
            height,
            density_mod: rng.random_range(-1.0..1.0),
            start_ms: now_ms,
            duration_ms: rng.random_range(p.min_duration_ms..p.max_duration_ms),
        })
    }

    /// Summed size offset, in px, that active glitches apply at a cell.
    pub fn effect_at(&self, col: u32, row: u32, now_ms: f64, max_dot_size: f64) -> f64 {
        self.glitches
            .iter()
            .filter(|g| g.is_active(now_ms) && g.covers(col, row))
            .map(|g| g.density_mod * g.fade(now_ms) * max_dot_size)
            .sum()
    }
}
