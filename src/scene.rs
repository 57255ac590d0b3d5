//! Per-frame state machine behind the dot background.
//!
//! A [`Scene`] owns the sampler, the grid and the glitch timeline. The host
//! feeds it the container's live geometry and the frame clock; the scene
//! decides when to rebuild and emits squares through a [`Painter`]. Nothing
//! here touches the DOM, so the whole frame pipeline runs under `cargo test`.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::{DotsConfig, Rgba};
use crate::error::DotsResult;
use crate::glitch::{GlitchParams, GlitchTimeline};
use crate::grid::DotGrid;
use crate::sampler::{BrightnessSampler, SourceImage};

/// Drawing surface the scene paints into, in logical px.
pub trait Painter {
    fn clear(&mut self, width: f64, height: f64);
    fn set_fill(&mut self, color: Rgba);
    fn fill_square(&mut self, x: f64, y: f64, size: f64);

    /// Called before painting whenever the backing store must change size.
    fn resize_surface(&mut self, _surface: SurfaceSize) {}
}

/// Logical size of the host container plus its device pixel ratio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub dpr: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

impl Viewport {
    pub fn new(width: f64, height: f64, dpr: f64) -> Self {
        let dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
            dpr,
        }
    }

    /// Backing-store size for a canvas that should look crisp at this ratio.
    pub fn surface(&self) -> SurfaceSize {
        SurfaceSize {
            pixel_width: (self.width * self.dpr) as u32,
            pixel_height: (self.height * self.dpr) as u32,
            scale: self.dpr,
        }
    }
}

/// Canvas backing-store dimensions and the transform scale to apply.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSize {
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub scale: f64,
}

#[derive(Debug)]
pub struct Scene<R = SmallRng> {
    config: DotsConfig,
    viewport: Viewport,
    sampler: BrightnessSampler,
    grid: DotGrid,
    glitches: GlitchTimeline,
    rng: R,
    rebuilds: u64,
}

impl Scene<SmallRng> {
    pub fn with_seed(config: DotsConfig, seed: u64) -> DotsResult<Self> {
        Self::new(config, SmallRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Scene<R> {
    /// Fails when `config` does not pass [`DotsConfig::validate`].
    pub fn new(config: DotsConfig, rng: R) -> DotsResult<Self> {
        config.validate()?;
        let glitches = GlitchTimeline::new(GlitchParams::from(&config))?;
        Ok(Self {
            config,
            viewport: Viewport::default(),
            sampler: BrightnessSampler::new(),
            grid: DotGrid::new(),
            glitches,
            rng,
            rebuilds: 0,
        })
    }

    pub fn config(&self) -> &DotsConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn grid(&self) -> &DotGrid {
        &self.grid
    }

    pub fn sampler(&self) -> &BrightnessSampler {
        &self.sampler
    }

    pub fn glitches(&self) -> &GlitchTimeline {
        &self.glitches
    }

    pub fn glitches_mut(&mut self) -> &mut GlitchTimeline {
        &mut self.glitches
    }

    pub fn image_loaded(&self) -> bool {
        self.sampler.is_loaded()
    }

    /// How many full rebuilds have happened so far.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Compares live container geometry against the last recorded size and
    /// rebuilds only when either axis moved by more than the threshold.
    /// A pixel-ratio change alone rescales the surface and keeps the grid.
    /// Returns the new surface size whenever the backing store must change.
    pub fn observe(&mut self, width: f64, height: f64, dpr: f64) -> Option<SurfaceSize> {
        let threshold = self.config.resize_threshold;
        let moved = (width - self.viewport.width).abs() > threshold
            || (height - self.viewport.height).abs() > threshold;
        if moved {
            return Some(self.resize(width, height, dpr));
        }
        let live = Viewport::new(width, height, dpr);
        if live.dpr == self.viewport.dpr {
            return None;
        }
        debug!(from = self.viewport.dpr, to = live.dpr, "device pixel ratio changed");
        self.viewport.dpr = live.dpr;
        Some(self.viewport.surface())
    }

    /// Unconditional rebuild at the given geometry.
    pub fn resize(&mut self, width: f64, height: f64, dpr: f64) -> SurfaceSize {
        self.viewport = Viewport::new(width, height, dpr);
        debug!(
            width = self.viewport.width,
            height = self.viewport.height,
            dpr = self.viewport.dpr,
            "viewport resized"
        );
        self.rebuild();
        self.viewport.surface()
    }

    /// Installs the decoded image and rebuilds at the current geometry.
    pub fn set_image(&mut self, image: SourceImage) {
        self.sampler.load(image);
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let Viewport { width, height, .. } = self.viewport;
        self.sampler.rebuild(width, height);
        self.grid.rebuild(
            width,
            height,
            self.config.spacing,
            &self.sampler,
            &mut self.rng,
        );
        self.rebuilds += 1;
    }

    /// Advances the glitch timeline by one tick.
    pub fn advance(&mut self, now_ms: f64) {
        let (cols, rows) = (self.grid.cols(), self.grid.rows());
        self.glitches.tick(now_ms, cols, rows, &mut self.rng);
    }

    /// Final square size for one dot, already clamped to `[min_size, spacing - 1]`.
    pub fn dot_size(&self, index: usize, timestamp: f64, now_ms: f64) -> Option<f64> {
        let dot = self.grid.dots().get(index)?;
        let cfg = &self.config;

        let target = if self.image_loaded() {
            cfg.base_size + (cfg.max_size - cfg.base_size) * dot.size_factor
        } else {
            cfg.base_size
        };
        let glitch = self.glitches.effect_at(dot.col, dot.row, now_ms, cfg.max_size);
        let pulse = (timestamp * cfg.speed + dot.phase).sin() * cfg.pulse_amplitude;

        Some((target + glitch + pulse).max(cfg.min_size).min(cfg.spacing - 1.0))
    }

    /// Paints one frame without advancing any state.
    pub fn paint(&self, painter: &mut impl Painter, timestamp: f64, now_ms: f64) {
        let cfg = &self.config;
        painter.clear(self.viewport.width, self.viewport.height);
        painter.set_fill(cfg.dot_color);

        for (i, dot) in self.grid.dots().iter().enumerate() {
            let Some(size) = self.dot_size(i, timestamp, now_ms) else {
                continue;
            };
            if size > cfg.min_size {
                let offset = (cfg.spacing - size) / 2.0;
                painter.fill_square(dot.x + offset, dot.y + offset, size);
            }
        }
    }

    /// One full animation step: geometry poll, glitch tick, paint.
    /// `timestamp` is the frame clock (drives the pulse), `now_ms` the wall
    /// clock (drives glitch lifetimes).
    pub fn frame(
        &mut self,
        painter: &mut impl Painter,
        live: Viewport,
        timestamp: f64,
        now_ms: f64,
    ) -> Option<SurfaceSize> {
        let resized = self.observe(live.width, live.height, live.dpr);
        if let Some(surface) = resized {
            painter.resize_surface(surface);
        }
        self.advance(now_ms);
        self.paint(painter, timestamp, now_ms);
        resized
    }
}
