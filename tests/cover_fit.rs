#![cfg(not(target_arch = "wasm32"))]

use proptest::prelude::*;
use resetario_dots::grid::{cells_for, size_factor};
use resetario_dots::sampler::inverted_luma;
use resetario_dots::{CoverFit, Glitch, GlitchTimeline};

proptest! {
    #[test]
    fn cover_fit_leaves_no_letterbox(
        vw in 1.0f64..4000.0,
        vh in 1.0f64..4000.0,
        iw in 1.0f64..4000.0,
        ih in 1.0f64..4000.0,
    ) {
        let fit = CoverFit::compute(vw, vh, iw, ih);
        let eps = 1e-6 * vw.max(vh).max(iw).max(ih);
        // Scaled image spans at least the viewport and is centred.
        prop_assert!(iw * fit.scale >= vw - eps);
        prop_assert!(ih * fit.scale >= vh - eps);
        prop_assert!(fit.offset_x <= eps && fit.offset_y <= eps);
        prop_assert!((fit.offset_x * 2.0 + iw * fit.scale - vw).abs() <= eps);
        prop_assert!((fit.offset_y * 2.0 + ih * fit.scale - vh).abs() <= eps);
        // Viewport corners land inside the image.
        let (x0, y0) = fit.to_image(0.0, 0.0);
        let (x1, y1) = fit.to_image(vw, vh);
        prop_assert!(x0 >= -eps && y0 >= -eps && x1 <= iw + eps && y1 <= ih + eps);
    }

    #[test]
    fn grid_counts_cover_viewport(w in 0.0f64..5000.0, h in 0.0f64..5000.0, s in 1.0f64..64.0) {
        let cols = cells_for(w, s);
        let rows = cells_for(h, s);
        prop_assert_eq!(cols as f64, (w / s).ceil());
        prop_assert_eq!(rows as f64, (h / s).ceil());
    }

    #[test]
    fn darker_pixels_never_shrink(a in any::<[u8; 3]>(), b in any::<[u8; 3]>()) {
        let fa = size_factor(inverted_luma(a[0], a[1], a[2]));
        let fb = size_factor(inverted_luma(b[0], b[1], b[2]));
        let la = inverted_luma(a[0], a[1], a[2]);
        let lb = inverted_luma(b[0], b[1], b[2]);
        prop_assert!((0.0..=1.0).contains(&fa));
        if la <= lb {
            prop_assert!(fa <= fb);
        }
    }

    #[test]
    fn glitch_lives_exactly_its_duration(start in 0.0f64..1e6, duration in 500.0f64..1500.0, elapsed in 0.0f64..3000.0) {
        let glitch = Glitch {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
            density_mod: 1.0,
            start_ms: start,
            duration_ms: duration,
        };
        let now = start + elapsed;
        prop_assert_eq!(glitch.is_active(now), now - start < duration);

        let mut timeline = GlitchTimeline::default();
        timeline.push(glitch);
        let effect = timeline.effect_at(1, 1, now, 7.0);
        if now - start >= duration {
            prop_assert_eq!(effect, 0.0);
        } else {
            prop_assert!((0.0..=7.0 + 1e-9).contains(&effect));
        }
    }
}
