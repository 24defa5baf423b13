//! WASM bindings for the viewer.
//!
//! The page owns fetching and rendering. It forwards fetch results tagged
//! with the session id from `loadModel`, and applies the returned mesh paints
//! to its scene.

use wasm_bindgen::prelude::*;

use cadview_ir::{GroupKind, Rgb};

use crate::camera::ViewPreset;
use crate::error::ViewerError;
use crate::session::{SessionId, Viewer, ViewerConfig};

/// Initialize the WASM module (sets up panic hook for better error messages).
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsError> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsError::new(&e.to_string()))
}

/// Paints as a JS array; stale results become an empty array.
fn paints_to_js(result: crate::Result<Vec<crate::MeshPaint>>) -> Result<JsValue, JsError> {
    match result {
        Ok(paints) => to_js(&paints),
        Err(ViewerError::Stale(_)) => to_js(&Vec::<crate::MeshPaint>::new()),
        Err(err) => Err(JsError::new(&err.to_string())),
    }
}

fn ignore_stale(result: crate::Result<()>) -> Result<(), JsError> {
    match result {
        Ok(()) | Err(ViewerError::Stale(_)) => Ok(()),
        Err(err) => Err(JsError::new(&err.to_string())),
    }
}

fn group_kind(group: &str) -> Result<GroupKind, JsError> {
    GroupKind::ALL
        .into_iter()
        .find(|k| k.key() == group)
        .ok_or_else(|| JsError::new(&format!("unknown color group: {group}")))
}

fn node_path(path: Vec<u32>) -> Vec<usize> {
    path.into_iter().map(|i| i as usize).collect()
}

/// Viewer state for one page.
#[wasm_bindgen(js_name = Viewer)]
pub struct WasmViewer {
    inner: Viewer,
}

#[wasm_bindgen(js_class = Viewer)]
impl WasmViewer {
    /// Create a viewer for a page opened with `query` (`location.search`).
    #[wasm_bindgen(constructor)]
    pub fn new(query: &str, models_dir: &str, default_model: &str) -> WasmViewer {
        let config = ViewerConfig {
            models_dir: models_dir.to_string(),
            default_model: default_model.to_string(),
            ..ViewerConfig::default()
        };
        WasmViewer {
            inner: Viewer::new(config, query),
        }
    }

    /// Start with the model named in the opening location.
    pub fn start(&mut self) -> Result<JsValue, JsError> {
        to_js(&self.inner.start())
    }

    /// Replace the current model; returns `{session, model_url, sidecar_url}`.
    #[wasm_bindgen(js_name = loadModel)]
    pub fn load_model(&mut self, model: &str) -> Result<JsValue, JsError> {
        to_js(&self.inner.load_model(model))
    }

    /// Geometry bytes arrived for `session`.
    #[wasm_bindgen(js_name = glbLoaded)]
    pub fn glb_loaded(&mut self, session: u32, bytes: &[u8]) -> Result<JsValue, JsError> {
        paints_to_js(self.inner.glb_loaded(SessionId(session), bytes))
    }

    /// Geometry fetch failed for `session`.
    #[wasm_bindgen(js_name = sceneFailed)]
    pub fn scene_failed(&mut self, session: u32, message: &str) -> Result<(), JsError> {
        web_sys::console::error_1(&format!("[cadview] {message}").into());
        ignore_stale(self.inner.scene_failed(SessionId(session), message))
    }

    /// Sidecar text arrived for `session`.
    #[wasm_bindgen(js_name = sidecarLoaded)]
    pub fn sidecar_loaded(&mut self, session: u32, json: &str) -> Result<JsValue, JsError> {
        paints_to_js(self.inner.sidecar_loaded(SessionId(session), json))
    }

    /// Sidecar fetch failed or returned a non-success status.
    #[wasm_bindgen(js_name = sidecarFailed)]
    pub fn sidecar_failed(&mut self, session: u32) -> Result<(), JsError> {
        ignore_stale(self.inner.sidecar_failed(SessionId(session)))
    }

    /// Load status of the current session.
    pub fn status(&self) -> Result<JsValue, JsError> {
        to_js(&self.inner.status())
    }

    /// `{main, accent}` hex colors, or `undefined` when controls are hidden.
    pub fn controls(&self) -> Result<JsValue, JsError> {
        match self.inner.controls() {
            Some(controls) => to_js(&controls),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    /// Change the `"main"` or `"accent"` color; returns the mesh paints.
    #[wasm_bindgen(js_name = setGroupColor)]
    pub fn set_group_color(&mut self, group: &str, hex: &str) -> Result<JsValue, JsError> {
        let kind = group_kind(group)?;
        let color = Rgb::from_hex(hex).map_err(|e| JsError::new(&e.to_string()))?;
        paints_to_js(self.inner.set_group_color(kind, color))
    }

    /// Query string for `history.replaceState`.
    #[wasm_bindgen(js_name = locationQuery)]
    pub fn location_query(&self) -> String {
        self.inner.location().to_query()
    }

    /// Rows of the hierarchy panel.
    #[wasm_bindgen(js_name = treeRows)]
    pub fn tree_rows(&self) -> Result<JsValue, JsError> {
        to_js(&self.inner.tree_rows())
    }

    /// Collapse or expand a row.
    #[wasm_bindgen(js_name = toggleExpanded)]
    pub fn toggle_expanded(&mut self, path: Vec<u32>) -> Result<(), JsError> {
        self.inner
            .toggle_expanded(&node_path(path))
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Flip a subtree's visibility; returns the new state.
    #[wasm_bindgen(js_name = toggleVisible)]
    pub fn toggle_visible(&mut self, path: Vec<u32>) -> Result<bool, JsError> {
        self.inner
            .toggle_visible(&node_path(path))
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// `{eye, target, up}` for a preset name (`front`, `top`, `iso`, ...).
    pub fn camera(&self, preset: &str) -> Result<JsValue, JsError> {
        let preset: ViewPreset = preset.parse().map_err(|e: String| JsError::new(&e))?;
        let view = self
            .inner
            .camera(preset)
            .map_err(|e| JsError::new(&e.to_string()))?;
        to_js(&view)
    }
}
