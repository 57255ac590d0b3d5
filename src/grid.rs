use std::f64::consts::TAU;

use rand::Rng;
use tracing::debug;

use crate::sampler::BrightnessSampler;

/// One grid cell. Immutable once the grid is built.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dot {
    pub col: u32,
    pub row: u32,
    /// Top-left corner in logical px.
    pub x: f64,
    pub y: f64,
    pub center_x: f64,
    pub center_y: f64,
    /// `(brightness / 255)^2`, in [0, 1].
    pub size_factor: f64,
    /// Pulse phase in [0, 2π).
    pub phase: f64,
}

/// Quadratic response so mid tones stay small and dark regions read as blocks.
pub fn size_factor(brightness: f64) -> f64 {
    (brightness / 255.0).powi(2).clamp(0.0, 1.0)
}

/// Number of cells needed to cover `extent` at `spacing`. Zero when the
/// spacing is not a positive finite length.
pub fn cells_for(extent: f64, spacing: f64) -> u32 {
    if !(spacing.is_finite() && spacing > 0.0) {
        return 0;
    }
    (extent / spacing).ceil().max(0.0) as u32
}

#[derive(Debug, Default)]
pub struct DotGrid {
    cols: u32,
    rows: u32,
    spacing: f64,
    dots: Vec<Dot>,
}

impl DotGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every dot. Column-major order, matching cell `(col, row)`.
    pub fn rebuild(
        &mut self,
        viewport_w: f64,
        viewport_h: f64,
        spacing: f64,
        sampler: &BrightnessSampler,
        rng: &mut impl Rng,
    ) {
        let cols = cells_for(viewport_w, spacing);
        let rows = cells_for(viewport_h, spacing);
        let half = spacing / 2.0;

        let mut dots = Vec::with_capacity(cols as usize * rows as usize);
        for col in 0..cols {
            for row in 0..rows {
                let x = col as f64 * spacing;
                let y = row as f64 * spacing;
                let center_x = x + half;
                let center_y = y + half;
                dots.push(Dot {
                    col,
                    row,
                    x,
                    y,
                    center_x,
                    center_y,
                    size_factor: size_factor(sampler.brightness_at(center_x, center_y)),
                    phase: rng.random::<f64>() * TAU,
                });
            }
        }

        debug!(cols, rows, spacing, "dot grid rebuilt");
        self.cols = cols;
        self.rows = rows;
        self.spacing = spacing;
        self.dots = dots;
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn dots(&self) -> &[Dot] {
        &self.dots
    }

    pub fn len(&self) -> usize {
        self.dots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::SourceImage;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn counts_round_up() {
        let mut grid = DotGrid::new();
        let mut rng = SmallRng::seed_from_u64(7);
        grid.rebuild(95.0, 31.0, 10.0, &BrightnessSampler::new(), &mut rng);
        assert_eq!((grid.cols(), grid.rows()), (10, 4));
        assert_eq!(grid.len(), 40);
    }

    #[test]
    fn empty_viewport_has_no_dots() {
        let mut grid = DotGrid::new();
        let mut rng = SmallRng::seed_from_u64(7);
        grid.rebuild(0.0, 200.0, 10.0, &BrightnessSampler::new(), &mut rng);
        assert!(grid.is_empty());
    }

    #[test]
    fn cells_carry_geometry_and_phase() {
        let mut grid = DotGrid::new();
        let mut rng = SmallRng::seed_from_u64(1);
        grid.rebuild(30.0, 20.0, 10.0, &BrightnessSampler::new(), &mut rng);
        let dot = grid.dots().iter().find(|d| d.col == 2 && d.row == 1).unwrap();
        assert_eq!((dot.x, dot.y), (20.0, 10.0));
        assert_eq!((dot.center_x, dot.center_y), (25.0, 15.0));
        for dot in grid.dots() {
            assert!((0.0..TAU).contains(&dot.phase));
        }
    }

    #[test]
    fn size_factor_follows_image() {
        let mut sampler = BrightnessSampler::new();
        sampler.load(SourceImage::solid(4, 4, [255, 255, 255, 255]).unwrap());
        sampler.rebuild(40.0, 40.0);
        let mut grid = DotGrid::new();
        let mut rng = SmallRng::seed_from_u64(3);
        grid.rebuild(40.0, 40.0, 10.0, &sampler, &mut rng);
        assert!(grid.dots().iter().all(|d| d.size_factor < 1e-9));
    }

    #[test]
    fn degenerate_spacing_yields_no_cells() {
        assert_eq!(cells_for(300.0, 0.0), 0);
        assert_eq!(cells_for(300.0, -10.0), 0);
        assert_eq!(cells_for(300.0, f64::NAN), 0);
        let mut grid = DotGrid::new();
        let mut rng = SmallRng::seed_from_u64(1);
        grid.rebuild(300.0, 300.0, 0.0, &BrightnessSampler::new(), &mut rng);
        assert!(grid.is_empty());
    }

    #[test]
    fn size_factor_curve() {
        assert_eq!(size_factor(0.0), 0.0);
        assert_eq!(size_factor(255.0), 1.0);
        assert!((size_factor(127.5) - 0.25).abs() < 1e-12);
        assert!(size_factor(100.0) <= size_factor(101.0));
    }
}
