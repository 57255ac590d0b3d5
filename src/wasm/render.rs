use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};
use wasm_bindgen::prelude::*;
use web_sys::{
    window, CanvasRenderingContext2d, Document, Element, EventTarget, HtmlCanvasElement, Window,
};

use super::image::{js_err, ImageLoad};
use crate::config::{DotsConfig, Rgba};
use crate::error::{DotsError, DotsResult};
use crate::scene::{Painter, Scene, SurfaceSize, Viewport};

const DEFAULT_IMAGE_URL: &str = "img/fondo_dots.jpg";

impl From<DotsError> for JsValue {
    fn from(err: DotsError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// 2D-context painter for the overlay canvas.
struct CanvasPainter {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    z_index: i32,
}

impl CanvasPainter {
    fn create(document: &Document, z_index: i32) -> DotsResult<Self> {
        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(js_err)?
            .dyn_into()
            .map_err(|_| DotsError::dom("canvas element has unexpected type"))?;
        let ctx = context_2d(&canvas)?;
        let painter = Self {
            canvas,
            ctx,
            z_index,
        };
        painter.apply_overlay_style()?;
        Ok(painter)
    }

    fn apply_overlay_style(&self) -> DotsResult<()> {
        let style = self.canvas.style();
        let z_index = self.z_index.to_string();
        for (name, value) in [
            ("position", "absolute"),
            ("top", "0"),
            ("left", "0"),
            ("width", "100%"),
            ("height", "100%"),
            ("pointer-events", "none"),
            ("z-index", z_index.as_str()),
        ] {
            style.set_property(name, value).map_err(js_err)?;
        }
        Ok(())
    }
}

fn context_2d(canvas: &HtmlCanvasElement) -> DotsResult<CanvasRenderingContext2d> {
    canvas
        .get_context("2d")
        .map_err(js_err)?
        .ok_or_else(|| DotsError::dom("2d context unavailable"))?
        .dyn_into()
        .map_err(|_| DotsError::dom("2d context has unexpected type"))
}

impl Painter for CanvasPainter {
    fn clear(&mut self, width: f64, height: f64) {
        self.ctx.clear_rect(0.0, 0.0, width, height);
    }

    fn set_fill(&mut self, color: Rgba) {
        self.ctx.set_fill_style_str(&color.to_css());
    }

    fn fill_square(&mut self, x: f64, y: f64, size: f64) {
        self.ctx.fill_rect(x, y, size, size);
    }

    fn resize_surface(&mut self, surface: SurfaceSize) {
        // Resizing the backing store resets the context transform.
        self.canvas.set_width(surface.pixel_width);
        self.canvas.set_height(surface.pixel_height);
        if let Err(err) = self.ctx.scale(surface.scale, surface.scale) {
            warn!(?err, "failed to scale canvas context");
        }
        if let Err(err) = self.apply_overlay_style() {
            warn!(%err, "failed to reapply overlay style");
        }
    }
}

struct Host {
    window: Window,
    container: Element,
    painter: CanvasPainter,
    scene: Scene,
    frame_id: Option<i32>,
    running: bool,
}

impl Host {
    fn live_viewport(&self) -> Viewport {
        let rect = self.container.get_bounding_client_rect();
        Viewport::new(rect.width(), rect.height(), self.window.device_pixel_ratio())
    }

    /// Same threshold and pixel-ratio check the frame loop performs.
    fn poll_geometry(&mut self) {
        let live = self.live_viewport();
        if let Some(surface) = self.scene.observe(live.width, live.height, live.dpr) {
            self.painter.resize_surface(surface);
        }
    }

    fn force_resize(&mut self) {
        let live = self.live_viewport();
        let surface = self.scene.resize(live.width, live.height, live.dpr);
        self.painter.resize_surface(surface);
    }

    fn step(&mut self, timestamp: f64) {
        let live = self.live_viewport();
        self.scene.frame(&mut self.painter, live, timestamp, js_sys::Date::now());
    }
}

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// Animated halftone overlay attached to a container element.
///
/// An instance built for a missing container is inert: no canvas, no loop,
/// and `destroy` does nothing.
#[wasm_bindgen]
pub struct DotsBackground {
    host: Option<Rc<RefCell<Host>>>,
    frame: FrameCallback,
    listeners: Vec<(EventTarget, Closure<dyn FnMut()>)>,
    image: Option<ImageLoad>,
}

#[wasm_bindgen]
impl DotsBackground {
    /// `container` is an element or an element id. `config_json` may override
    /// any [`DotsConfig`] field.
    #[wasm_bindgen(constructor)]
    pub fn new(
        container: JsValue,
        image_url: Option<String>,
        config_json: Option<String>,
    ) -> Result<DotsBackground, JsValue> {
        super::console::init();

        let config = match config_json {
            Some(json) => DotsConfig::from_json(&json)?,
            None => DotsConfig::default(),
        };

        let mut background = DotsBackground {
            host: None,
            frame: Rc::new(RefCell::new(None)),
            listeners: Vec::new(),
            image: None,
        };

        let window = window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;
        let Some(container) = resolve_container(&document, container) else {
            warn!("dots background container not found");
            return Ok(background);
        };

        let z_index = config.z_index;
        let seed = (js_sys::Math::random() * u64::MAX as f64) as u64;
        let scene = Scene::new(config, SmallRng::seed_from_u64(seed))?;

        let painter = CanvasPainter::create(&document, z_index)?;
        container.insert_before(&painter.canvas, container.first_child().as_ref())?;

        let host = Rc::new(RefCell::new(Host {
            window: window.clone(),
            container,
            painter,
            scene,
            frame_id: None,
            running: true,
        }));
        host.borrow_mut().force_resize();
        // Registered before the fallible steps so an early return still tears down.
        background.host = Some(host.clone());

        let url = image_url.unwrap_or_else(|| DEFAULT_IMAGE_URL.to_owned());
        background.image = Some(start_image_load(&document, &url, &host)?);
        background.listen_for_resize(&window, &host)?;
        start_loop(&window, &host, &background.frame)?;

        info!(url = %url, "dots background started");
        Ok(background)
    }

    /// Whether the frame loop is still scheduled.
    #[wasm_bindgen(js_name = isActive)]
    pub fn is_active(&self) -> bool {
        self.host
            .as_ref()
            .is_some_and(|host| host.borrow().running)
    }

    /// Stops the loop, drops listeners and detaches the canvas. Idempotent.
    pub fn destroy(&mut self) {
        let Some(host) = self.host.take() else {
            return;
        };
        {
            let mut host = host.borrow_mut();
            host.running = false;
            if let Some(id) = host.frame_id.take() {
                if let Err(err) = host.window.cancel_animation_frame(id) {
                    warn!(?err, "cancel_animation_frame failed");
                }
            }
            host.painter.canvas.remove();
        }
        for (target, callback) in self.listeners.drain(..) {
            if let Err(err) = target
                .remove_event_listener_with_callback("resize", callback.as_ref().unchecked_ref())
            {
                warn!(?err, "failed to remove resize listener");
            }
        }
        if let Some(load) = self.image.take() {
            load.cancel();
        }
        self.frame.borrow_mut().take();
        debug!("dots background destroyed");
    }
}

impl DotsBackground {
    fn listen_for_resize(&mut self, window: &Window, host: &Rc<RefCell<Host>>) -> DotsResult<()> {
        let mut targets: Vec<EventTarget> = vec![window.clone().into()];
        if let Some(visual) = window.visual_viewport() {
            targets.push(visual.into());
        }
        for target in targets {
            let weak = Rc::downgrade(host);
            let callback = Closure::wrap(Box::new(move || {
                if let Some(host) = weak.upgrade() {
                    host.borrow_mut().poll_geometry();
                }
            }) as Box<dyn FnMut()>);
            target
                .add_event_listener_with_callback("resize", callback.as_ref().unchecked_ref())
                .map_err(js_err)?;
            self.listeners.push((target, callback));
        }
        Ok(())
    }
}

impl Drop for DotsBackground {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn resolve_container(document: &Document, container: JsValue) -> Option<Element> {
    match container.as_string() {
        Some(id) => document.get_element_by_id(&id),
        None => container.dyn_into::<Element>().ok(),
    }
}

fn start_image_load(
    document: &Document,
    url: &str,
    host: &Rc<RefCell<Host>>,
) -> DotsResult<ImageLoad> {
    let weak = Rc::downgrade(host);
    ImageLoad::start(document, url, move |result| {
        let Some(host) = weak.upgrade() else {
            return;
        };
        match result {
            Ok(image) => {
                let mut host = host.borrow_mut();
                host.scene.set_image(image);
                host.poll_geometry();
            }
            Err(err) => warn!(%err, "background image unavailable, using flat dots"),
        }
    })
}

/// Schedules `step` on every animation frame until the host stops running.
fn start_loop(window: &Window, host: &Rc<RefCell<Host>>, frame: &FrameCallback) -> DotsResult<()> {
    // `frame` holds the closure so it can reschedule itself; `destroy` clears
    // it to break the cycle.
    let f = frame.clone();
    let weak = Rc::downgrade(host);
    *frame.borrow_mut() = Some(Closure::wrap(Box::new(move |timestamp: f64| {
        let Some(host) = weak.upgrade() else {
            return;
        };
        let mut host = host.borrow_mut();
        if !host.running {
            return;
        }
        host.step(timestamp);

        let next = f
            .borrow()
            .as_ref()
            .map(|cb| host.window.request_animation_frame(cb.as_ref().unchecked_ref()));
        match next {
            Some(Ok(id)) => host.frame_id = Some(id),
            Some(Err(err)) => {
                warn!(?err, "request_animation_frame failed, stopping");
                host.running = false;
                host.frame_id = None;
            }
            None => host.frame_id = None,
        }
    }) as Box<dyn FnMut(f64)>));

    let id = frame
        .borrow()
        .as_ref()
        .map(|cb| window.request_animation_frame(cb.as_ref().unchecked_ref()))
        .transpose()
        .map_err(js_err)?;
    host.borrow_mut().frame_id = id;
    Ok(())
}
