//! Browser capabilities for the viewer: canvas surface, `fetch` loader and
//! `requestAnimationFrame` scheduling

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use gloo_net::http::Request;
use log::{debug, warn};
use stlview_core::{
    FrameScheduler, Framebuffer, LoadError, LoadId, LoadResult, MeshLoader, Surface,
    SurfaceError, Viewer, ViewerError,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::{Clamped, JsCast};
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    AbortController, AbortSignal, CanvasRenderingContext2d, Document, Element, Event,
    HtmlCanvasElement, ImageData, MouseEvent, WheelEvent, Window,
};

use crate::input::{classify_status, error_kind, wheel_input, DragTracker};

pub type SharedViewer = Rc<RefCell<Viewer<WebHost>>>;

type Listener = (&'static str, Closure<dyn FnMut(Event)>);

pub struct WebHost {
    window: Window,
    document: Document,
    element: Element,
    canvas: Option<(HtmlCanvasElement, CanvasRenderingContext2d)>,
    viewer: Weak<RefCell<Viewer<WebHost>>>,
    frame_callback: Option<Closure<dyn FnMut(f64)>>,
    frame_handle: Option<i32>,
    load: Option<(LoadId, AbortController)>,
    listeners: Vec<Listener>,
    on_error: Option<js_sys::Function>,
}

fn js_error(context: &str, value: JsValue) -> String {
    format!("{}: {:?}", context, value)
}

impl WebHost {
    pub fn new(element_id: &str) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let element = document
            .get_element_by_id(element_id)
            .ok_or_else(|| JsValue::from_str(&format!("no element with id {}", element_id)))?;

        Ok(Self {
            window,
            document,
            element,
            canvas: None,
            viewer: Weak::new(),
            frame_callback: None,
            frame_handle: None,
            load: None,
            listeners: Vec::new(),
            on_error: None,
        })
    }

    /// Hook the host up to the viewer that owns it. Pointer listeners are
    /// only registered when `orbit` is enabled.
    pub fn attach(viewer: &SharedViewer, orbit: bool) -> Result<(), JsValue> {
        let weak = Rc::downgrade(viewer);

        let frame_weak = weak.clone();
        let frame_callback = Closure::<dyn FnMut(f64)>::new(move |_timestamp: f64| {
            if let Some(viewer) = frame_weak.upgrade() {
                let mut viewer = viewer.borrow_mut();
                viewer.host_mut().frame_handle = None;
                viewer.on_frame();
            }
        });

        let mut guard = viewer.borrow_mut();
        let host = guard.host_mut();
        host.viewer = weak.clone();
        host.frame_callback = Some(frame_callback);
        if orbit {
            host.listen_pointer(weak)?;
        }
        Ok(())
    }

    pub fn set_on_error(&mut self, callback: Option<js_sys::Function>) {
        self.on_error = callback;
    }

    fn listen_pointer(&mut self, viewer: Weak<RefCell<Viewer<WebHost>>>) -> Result<(), JsValue> {
        let drag = Rc::new(Cell::new(DragTracker::default()));

        let press = drag.clone();
        self.listen("mousedown", move |event: Event| {
            if let Some(event) = event.dyn_ref::<MouseEvent>() {
                let mut tracker = press.get();
                tracker.press(event.button(), event.client_x(), event.client_y());
                press.set(tracker);
            }
        })?;

        let movement = drag.clone();
        let move_viewer = viewer.clone();
        self.listen("mousemove", move |event: Event| {
            let Some(event) = event.dyn_ref::<MouseEvent>() else {
                return;
            };
            let mut tracker = movement.get();
            let input = tracker.moved(event.client_x(), event.client_y(), event.buttons() & 1 == 1);
            movement.set(tracker);
            if let (Some(input), Some(viewer)) = (input, move_viewer.upgrade()) {
                viewer.borrow_mut().orbit(input);
            }
        })?;

        for name in ["mouseup", "mouseleave"] {
            let release = drag.clone();
            self.listen(name, move |_: Event| {
                let mut tracker = release.get();
                tracker.release();
                release.set(tracker);
            })?;
        }

        self.listen("wheel", move |event: Event| {
            let Some(event) = event.dyn_ref::<WheelEvent>() else {
                return;
            };
            if let (Some(input), Some(viewer)) = (wheel_input(event.delta_y()), viewer.upgrade()) {
                event.prevent_default();
                viewer.borrow_mut().orbit(input);
            }
        })?;
        Ok(())
    }

    fn listen<F>(&mut self, name: &'static str, handler: F) -> Result<(), JsValue>
    where
        F: FnMut(Event) + 'static,
    {
        let closure = Closure::<dyn FnMut(Event)>::new(handler);
        self.element
            .add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())?;
        self.listeners.push((name, closure));
        Ok(())
    }

    pub fn detach_listeners(&mut self) {
        for (name, closure) in self.listeners.drain(..) {
            if let Err(e) = self
                .element
                .remove_event_listener_with_callback(name, closure.as_ref().unchecked_ref())
            {
                warn!("{}", js_error("failed to remove listener", e));
            }
        }
    }
}

impl Drop for WebHost {
    fn drop(&mut self) {
        self.detach_listeners();
    }
}

impl FrameScheduler for WebHost {
    fn request_frame(&mut self) {
        let Some(callback) = self.frame_callback.as_ref() else {
            warn!("frame requested before the host was attached");
            return;
        };
        match self
            .window
            .request_animation_frame(callback.as_ref().unchecked_ref())
        {
            Ok(handle) => self.frame_handle = Some(handle),
            Err(e) => warn!("{}", js_error("requestAnimationFrame failed", e)),
        }
    }

    fn cancel_frame(&mut self) {
        if let Some(handle) = self.frame_handle.take() {
            if let Err(e) = self.window.cancel_animation_frame(handle) {
                warn!("{}", js_error("cancelAnimationFrame failed", e));
            }
        }
    }
}

async fn fetch_mesh(url: &str, signal: Option<&AbortSignal>) -> LoadResult {
    let response = Request::get(url)
        .abort_signal(signal)
        .send()
        .await
        .map_err(|e| LoadError::Network(e.to_string()))?;
    if let Some(err) = classify_status(response.status(), url) {
        return Err(err);
    }
    response
        .binary()
        .await
        .map_err(|e| LoadError::Network(e.to_string()))
}

/// Hand a failure to the page callback, if one is registered
fn report_error(viewer: &SharedViewer, err: &ViewerError) {
    let callback = viewer.borrow().host().on_error.clone();
    let Some(callback) = callback else {
        return;
    };
    let kind = JsValue::from_str(error_kind(err));
    let message = JsValue::from_str(&err.to_string());
    if let Err(e) = callback.call2(&JsValue::NULL, &kind, &message) {
        warn!("{}", js_error("onError callback threw", e));
    }
}

impl MeshLoader for WebHost {
    fn begin(&mut self, id: LoadId, url: &str) {
        let controller = match AbortController::new() {
            Ok(controller) => Some(controller),
            Err(e) => {
                warn!("{}", js_error("AbortController unavailable", e));
                None
            }
        };
        let signal = controller.as_ref().map(|c| c.signal());
        if let Some(controller) = controller {
            self.load = Some((id, controller));
        }

        let viewer = self.viewer.clone();
        let url = url.to_string();
        spawn_local(async move {
            let result = fetch_mesh(&url, signal.as_ref()).await;
            let Some(viewer) = viewer.upgrade() else {
                return;
            };
            let outcome = {
                let mut guard = viewer.borrow_mut();
                let host = guard.host_mut();
                if matches!(host.load, Some((current, _)) if current == id) {
                    host.load = None;
                }
                guard.finish_load(id, result)
            };
            if let Err(err) = outcome {
                warn!("failed to show {}: {}", url, err);
                report_error(&viewer, &err);
            }
        });
    }

    fn abort(&mut self, id: LoadId) {
        match self.load.take() {
            Some((current, controller)) if current == id => controller.abort(),
            other => self.load = other,
        }
    }
}

impl Surface for WebHost {
    fn mount(&mut self, width: u32, height: u32) -> Result<(), SurfaceError> {
        let canvas = self
            .document
            .create_element("canvas")
            .map_err(|e| SurfaceError(js_error("failed to create canvas", e)))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| SurfaceError("created element is not a canvas".to_string()))?;
        canvas.set_width(width);
        canvas.set_height(height);

        let context = canvas
            .get_context("2d")
            .map_err(|e| SurfaceError(js_error("failed to get 2d context", e)))?
            .ok_or_else(|| SurfaceError("2d context unavailable".to_string()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| SurfaceError("unexpected 2d context type".to_string()))?;

        self.element.set_inner_html("");
        self.element
            .append_child(&canvas)
            .map_err(|e| SurfaceError(js_error("failed to attach canvas", e)))?;
        debug!("mounted {}x{} canvas", width, height);
        self.canvas = Some((canvas, context));
        Ok(())
    }

    fn present(&mut self, frame: &Framebuffer) {
        let Some((_, context)) = self.canvas.as_ref() else {
            return;
        };
        let rgba = frame.to_rgba();
        let drawn = ImageData::new_with_u8_clamped_array_and_sh(
            Clamped(rgba.as_slice()),
            frame.width(),
            frame.height(),
        )
        .and_then(|image| context.put_image_data(&image, 0.0, 0.0));
        if let Err(e) = drawn {
            warn!("{}", js_error("failed to present frame", e));
        }
    }

    fn release(&mut self) {
        if let Some((canvas, _)) = self.canvas.take() {
            canvas.remove();
        }
    }
}
