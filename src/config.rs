//! Tunables for the dot background.
//!
//! The host page may pass a JSON object with any subset of these fields
//! (camelCase keys); missing fields fall back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{DotsError, DotsResult};

/// Straight-alpha fill colour, channels in 0..=255 and alpha in [0,1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// CSS colour string, e.g. `rgba(30, 30, 30, 0.85)`.
    pub fn to_css(&self) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DotsConfig {
    pub spacing: f64,
    pub base_size: f64,
    pub max_size: f64,
    pub speed: f64,
    pub pulse_amplitude: f64,
    pub min_size: f64,
    pub glitch_chance: f64,
    pub glitch_min_cells: u32,
    pub glitch_max_cells: u32,
    pub glitch_min_duration_ms: f64,
    pub glitch_max_duration_ms: f64,
    pub resize_threshold: f64,
    pub dot_color: Rgba,
    pub z_index: i32,
}

impl Default for DotsConfig {
    fn default() -> Self {
        Self {
            spacing: 10.0,
            base_size: 1.0,
            max_size: 7.0,
            speed: 0.002,
            pulse_amplitude: 0.5,
            min_size: 0.5,
            glitch_chance: 0.02,
            glitch_min_cells: 2,
            glitch_max_cells: 12,
            glitch_min_duration_ms: 500.0,
            glitch_max_duration_ms: 1500.0,
            resize_threshold: 1.0,
            dot_color: Rgba::new(30, 30, 30, 0.85),
            z_index: 5,
        }
    }
}

impl DotsConfig {
    pub fn from_json(json: &str) -> DotsResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DotsResult<()> {
        if !self.spacing.is_finite() || self.spacing <= 0.0 {
            return Err(DotsError::invalid_config("spacing must be positive"));
        }
        if !(self.base_size >= 0.0 && self.max_size.is_finite()) {
            return Err(DotsError::invalid_config("sizes must be finite and non-negative"));
        }
        if self.max_size < self.base_size {
            return Err(DotsError::invalid_config("maxSize must be >= baseSize"));
        }
        if !self.speed.is_finite() || !self.pulse_amplitude.is_finite() {
            return Err(DotsError::invalid_config("pulse parameters must be finite"));
        }
        if !(0.0..=1.0).contains(&self.glitch_chance) {
            return Err(DotsError::invalid_config("glitchChance must lie in [0, 1]"));
        }
        if self.glitch_min_cells == 0 || self.glitch_min_cells >= self.glitch_max_cells {
            return Err(DotsError::invalid_config(
                "glitch cell range must be non-empty and start at 1 or more",
            ));
        }
        if !(self.glitch_min_duration_ms > 0.0
            && self.glitch_min_duration_ms < self.glitch_max_duration_ms
            && self.glitch_max_duration_ms.is_finite())
        {
            return Err(DotsError::invalid_config("glitch duration range must be non-empty"));
        }
        if !(0.0..=1.0).contains(&self.dot_color.a) {
            return Err(DotsError::invalid_config("dotColor alpha must lie in [0, 1]"));
        }
        Ok(())
    }
}
