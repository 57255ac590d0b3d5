//! Offscreen brightness lookups over a cover-fitted source image.

use tracing::{debug, info};

use crate::error::{DotsError, DotsResult};

/// Decoded RGBA8 bitmap, row-major, straight alpha.
#[derive(Clone, Debug)]
pub struct SourceImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl SourceImage {
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> DotsResult<Self> {
        if width == 0 || height == 0 {
            return Err(DotsError::image("image has zero area"));
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(DotsError::image(format!(
                "expected {expected} bytes for {width}x{height}, got {}",
                rgba.len()
            )));
        }
        Ok(Self { width, height, rgba })
    }

    /// Single-colour image, handy for tests and placeholders.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> DotsResult<Self> {
        let len = width as usize * height as usize;
        Self::from_rgba(width, height, rgba.repeat(len))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }

    /// Coverage-weighted mean of the pixels under `[x0, x1) × [y0, y1)`,
    /// in image px. The rectangle is clipped to the image first.
    fn area_average(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> [u8; 4] {
        let (w, h) = (self.width as f64, self.height as f64);
        let (x0, x1) = (x0.clamp(0.0, w), x1.clamp(0.0, w));
        let (y0, y1) = (y0.clamp(0.0, h), y1.clamp(0.0, h));
        if x1 <= x0 || y1 <= y0 {
            return self.bilinear(x0, y0);
        }

        let mut acc = [0.0f64; 4];
        let mut total = 0.0;
        for py in y0.floor() as u32..(y1.ceil() as u32).min(self.height) {
            let wy = y1.min(py as f64 + 1.0) - y0.max(py as f64);
            if wy <= 0.0 {
                continue;
            }
            for px in x0.floor() as u32..(x1.ceil() as u32).min(self.width) {
                let wx = x1.min(px as f64 + 1.0) - x0.max(px as f64);
                if wx <= 0.0 {
                    continue;
                }
                let weight = wx * wy;
                for (sum, channel) in acc.iter_mut().zip(self.pixel(px, py)) {
                    *sum += channel as f64 * weight;
                }
                total += weight;
            }
        }
        acc.map(|sum| (sum / total).round().clamp(0.0, 255.0) as u8)
    }

    /// Bilinear sample at `(x, y)` in image px, pixel centres at `i + 0.5`,
    /// edges clamped.
    fn bilinear(&self, x: f64, y: f64) -> [u8; 4] {
        let fx = (x - 0.5).clamp(0.0, (self.width - 1) as f64);
        let fy = (y - 0.5).clamp(0.0, (self.height - 1) as f64);
        let (x0, y0) = (fx.floor() as u32, fy.floor() as u32);
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let (tx, ty) = (fx - x0 as f64, fy - y0 as f64);

        let (a, b) = (self.pixel(x0, y0), self.pixel(x1, y0));
        let (c, d) = (self.pixel(x0, y1), self.pixel(x1, y1));
        std::array::from_fn(|i| {
            let top = a[i] as f64 + (b[i] as f64 - a[i] as f64) * tx;
            let bottom = c[i] as f64 + (d[i] as f64 - c[i] as f64) * tx;
            (top + (bottom - top) * ty).round().clamp(0.0, 255.0) as u8
        })
    }
}

/// Placement that scales an image to cover a viewport with no letterboxing,
/// centred on both axes (CSS `background-size: cover`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverFit {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl CoverFit {
    pub fn compute(view_w: f64, view_h: f64, image_w: f64, image_h: f64) -> Self {
        let scale = (view_w / image_w).max(view_h / image_h);
        Self {
            scale,
            offset_x: view_w / 2.0 - image_w / 2.0 * scale,
            offset_y: view_h / 2.0 - image_h / 2.0 * scale,
        }
    }

    /// Maps a viewport coordinate back into image space.
    pub fn to_image(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.offset_x) / self.scale, (y - self.offset_y) / self.scale)
    }
}

/// Perceived luma of an RGB triple, inverted so darker pixels score higher.
pub fn inverted_luma(r: u8, g: u8, b: u8) -> f64 {
    let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    255.0 - luma
}

#[derive(Debug, Default)]
pub struct BrightnessSampler {
    image: Option<SourceImage>,
    width: u32,
    height: u32,
    buffer: Option<Vec<u8>>,
}

impl BrightnessSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the decoded source. The buffer stays empty until the next
    /// [`rebuild`](Self::rebuild).
    pub fn load(&mut self, image: SourceImage) {
        info!(width = image.width, height = image.height, "source image loaded");
        self.image = Some(image);
        self.buffer = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.image.is_some()
    }

    /// Redraws the source into a buffer of exactly the viewport's logical size,
    /// filtered the way a smoothed canvas `drawImage` would be.
    /// Without a loaded image the buffer is cleared and queries return 0.
    pub fn rebuild(&mut self, viewport_w: f64, viewport_h: f64) {
        self.width = viewport_w.max(0.0) as u32;
        self.height = viewport_h.max(0.0) as u32;

        let Some(image) = &self.image else {
            self.buffer = None;
            return;
        };

        let fit = CoverFit::compute(
            viewport_w,
            viewport_h,
            image.width as f64,
            image.height as f64,
        );
        let (w, h) = (self.width as usize, self.height as usize);
        let mut buffer = vec![0u8; w * h * 4];
        // Shrinking averages every source pixel under the destination pixel;
        // enlarging interpolates between neighbours.
        let downscale = fit.scale < 1.0;

        for y in 0..h {
            for x in 0..w {
                let (x0, y0) = fit.to_image(x as f64, y as f64);
                let rgba = if downscale {
                    let (x1, y1) = fit.to_image(x as f64 + 1.0, y as f64 + 1.0);
                    image.area_average(x0, y0, x1, y1)
                } else {
                    let (cx, cy) = fit.to_image(x as f64 + 0.5, y as f64 + 0.5);
                    image.bilinear(cx, cy)
                };
                let i = (y * w + x) * 4;
                buffer[i..i + 4].copy_from_slice(&rgba);
            }
        }

        debug!(width = self.width, height = self.height, scale = fit.scale, "brightness buffer rebuilt");
        self.buffer = Some(buffer);
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }

    /// Inverted perceived brightness at `(x, y)` in [0, 255]; 0 outside the
    /// buffer or before any buffer exists.
    pub fn brightness_at(&self, x: f64, y: f64) -> f64 {
        let Some(buffer) = &self.buffer else {
            return 0.0;
        };
        let ix = x.floor();
        let iy = y.floor();
        if !(ix >= 0.0 && iy >= 0.0 && ix < self.width as f64 && iy < self.height as f64) {
            return 0.0;
        }
        let i = (iy as usize * self.width as usize + ix as usize) * 4;
        inverted_luma(buffer[i], buffer[i + 1], buffer[i + 2])
    }
}
