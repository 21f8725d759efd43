/// stlview web - STL viewer component for the browser
///
/// Mounts a canvas into a page element, fetches the STL over HTTP and spins
/// it with `requestAnimationFrame` until the user drags or scrolls.
pub mod input;

#[cfg(target_arch = "wasm32")]
mod host;

#[cfg(target_arch = "wasm32")]
pub use wasm::StlViewer;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use std::cell::RefCell;
    use std::rc::Rc;

    use stlview_core::{Viewer, ViewerProps};
    use wasm_bindgen::prelude::*;

    use crate::host::{SharedViewer, WebHost};

    fn to_js(err: impl std::fmt::Display) -> JsValue {
        JsValue::from_str(&err.to_string())
    }

    #[wasm_bindgen(start)]
    pub fn start() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Debug).ok();
        log::info!("stlview initialized");
    }

    /// A viewer bound to one page element
    #[wasm_bindgen]
    pub struct StlViewer {
        viewer: SharedViewer,
    }

    #[wasm_bindgen]
    impl StlViewer {
        /// `props_json` is the camelCase property bag, e.g.
        /// `{"url": "/models/part.stl", "modelColor": "#3366ff"}`
        #[wasm_bindgen(constructor)]
        pub fn new(element_id: &str, props_json: &str) -> Result<StlViewer, JsValue> {
            let config = ViewerProps::from_json(props_json)
                .and_then(|props| props.validate())
                .map_err(to_js)?;
            let orbit = config.orbit_controls;
            let host = WebHost::new(element_id)?;
            let viewer = Rc::new(RefCell::new(Viewer::new(config, host).map_err(to_js)?));

            WebHost::attach(&viewer, orbit)?;
            viewer.borrow_mut().initialize().map_err(to_js)?;
            Ok(StlViewer { viewer })
        }

        /// Register `callback(kind, message)` for load and mount failures.
        /// `kind` is one of `NotFound`, `ParseError`, `NetworkError` or
        /// `SurfaceError`.
        #[wasm_bindgen(js_name = setOnError)]
        pub fn set_on_error(&self, callback: Option<js_sys::Function>) {
            self.viewer.borrow_mut().host_mut().set_on_error(callback);
        }

        #[wasm_bindgen(js_name = isRotating)]
        pub fn is_rotating(&self) -> bool {
            self.viewer.borrow().is_rotating()
        }

        pub fn destroy(&self) {
            let mut viewer = self.viewer.borrow_mut();
            viewer.destroy();
            viewer.host_mut().detach_listeners();
        }
    }
}
