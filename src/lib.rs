#![cfg_attr(target_arch = "wasm32", allow(dead_code))]

//! Halftone dot background for the Re(s)etario site.
//!
//! The frame pipeline ([`Scene`]) is plain Rust so it can be exercised on the
//! host; the browser glue lives in the wasm-only `wasm` module.

pub mod catalog;
pub mod config;
pub mod error;
pub mod glitch;
pub mod grid;
pub mod proxy;
pub mod sampler;
pub mod scene;

pub use config::{DotsConfig, Rgba};
pub use error::{DotsError, DotsResult};
pub use glitch::{Glitch, GlitchParams, GlitchTimeline};
pub use grid::{Dot, DotGrid};
pub use sampler::{BrightnessSampler, CoverFit, SourceImage};
pub use scene::{Painter, Scene, SurfaceSize, Viewport};

// Only compile wasm-specific code when targeting wasm32.

#[cfg(target_arch = "wasm32")]
mod wasm {
    use wasm_bindgen::prelude::*;

    mod console;
    mod image;
    mod render;

    pub use render::DotsBackground;

    /// Page integration: attach a background to `<main>` when the page has one.
    #[wasm_bindgen(start)]
    pub fn main() -> Result<(), JsValue> {
        console::init();

        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;
        let Some(main) = document.query_selector("main")? else {
            tracing::debug!("no <main> element, background not attached");
            return Ok(());
        };

        let background = DotsBackground::new(main.into(), None, None)?;
        // Lives for the whole page view.
        std::mem::forget(background);
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm::DotsBackground;
