use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlImageElement};

use crate::error::{DotsError, DotsResult};
use crate::sampler::SourceImage;

/// Keeps the image element and its callbacks alive until one of them fires.
pub struct ImageLoad {
    img: HtmlImageElement,
    _onload: Closure<dyn FnMut()>,
    _onerror: Closure<dyn FnMut()>,
}

impl ImageLoad {
    /// Starts decoding `url`. `done` runs once, with the decoded pixels or the
    /// reason the load failed.
    pub fn start(
        document: &Document,
        url: &str,
        done: impl FnOnce(DotsResult<SourceImage>) + 'static,
    ) -> DotsResult<Self> {
        let img = HtmlImageElement::new().map_err(js_err)?;
        let done = std::rc::Rc::new(std::cell::RefCell::new(Some(done)));

        let onload = {
            let img = img.clone();
            let document = document.clone();
            let done = done.clone();
            Closure::wrap(Box::new(move || {
                if let Some(done) = done.borrow_mut().take() {
                    done(extract_pixels(&document, &img));
                }
            }) as Box<dyn FnMut()>)
        };
        let onerror = {
            let url = url.to_owned();
            Closure::wrap(Box::new(move || {
                if let Some(done) = done.borrow_mut().take() {
                    done(Err(DotsError::image(format!("failed to load {url}"))));
                }
            }) as Box<dyn FnMut()>)
        };

        img.set_onload(Some(onload.as_ref().unchecked_ref()));
        img.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        img.set_src(url);

        Ok(Self {
            img,
            _onload: onload,
            _onerror: onerror,
        })
    }

    /// Detaches the callbacks so a late load cannot reach a torn-down host.
    pub fn cancel(&self) {
        self.img.set_onload(None);
        self.img.set_onerror(None);
    }
}

/// Draws the image at its natural size offscreen and reads back RGBA8.
fn extract_pixels(document: &Document, img: &HtmlImageElement) -> DotsResult<SourceImage> {
    let (w, h) = (img.natural_width(), img.natural_height());
    if w == 0 || h == 0 {
        return Err(DotsError::image("image decoded with zero size"));
    }

    let canvas: HtmlCanvasElement = document
        .create_element("canvas")
        .map_err(js_err)?
        .dyn_into()
        .map_err(|_| DotsError::dom("canvas element has unexpected type"))?;
    canvas.set_width(w);
    canvas.set_height(h);
    let ctx: CanvasRenderingContext2d = canvas
        .get_context("2d")
        .map_err(js_err)?
        .ok_or_else(|| DotsError::dom("2d context unavailable"))?
        .dyn_into()
        .map_err(|_| DotsError::dom("2d context has unexpected type"))?;

    ctx.draw_image_with_html_image_element(img, 0.0, 0.0)
        .map_err(js_err)?;
    // Fails on cross-origin images without CORS headers.
    let data = ctx
        .get_image_data(0.0, 0.0, w as f64, h as f64)
        .map_err(js_err)?;

    SourceImage::from_rgba(w, h, data.data().0)
}

pub fn js_err(value: JsValue) -> DotsError {
    DotsError::dom(format!("{value:?}"))
}
