//! Per-load sessions and the viewer that owns them.
//!
//! Every [`Viewer::load_model`] call starts a new [`Session`] and returns the
//! URLs to fetch. Fetch results are handed back tagged with the session id they
//! were requested for; results for any session but the current one are
//! rejected with [`ViewerError::Stale`]. The scene and the color-group sidecar
//! may arrive in either order.

use std::fmt;

use serde::Serialize;

use cadview_gltf::GltfDocument;
use cadview_ir::{ColorGroupSet, GroupKind, NodePath, Rgb, SceneNode};

use crate::camera::{camera_view, CameraView, ViewPreset};
use crate::error::{Result, ViewerError};
use crate::groups::{ColorOverride, GroupControls, GroupState, MeshPaint};
use crate::location::{sidecar_url, ViewerLocation};
use crate::tree::{self, SceneTree, TreeRow};

/// Identifier of one model load. Later loads get larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Geometry load state shown in place of the scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum LoadStatus {
    /// Waiting for the geometry.
    Loading,
    /// Scene displayed.
    Ready,
    /// Geometry could not be loaded.
    Failed(String),
}

/// What the page has to fetch for a new session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadRequest {
    /// Session the results belong to.
    pub session: SessionId,
    /// Geometry URL.
    pub model_url: String,
    /// Color-group sidecar URL.
    pub sidecar_url: String,
}

#[derive(Debug, Clone)]
enum Sidecar {
    Pending,
    /// Arrived before the scene.
    Held(ColorGroupSet),
    Absent,
    Active(GroupState),
}

/// State of one model load.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    model: String,
    status: LoadStatus,
    scene: Option<SceneNode>,
    tree: SceneTree,
    sidecar: Sidecar,
    color_override: ColorOverride,
}

impl Session {
    fn new(id: SessionId, model: String, color_override: ColorOverride) -> Self {
        Self {
            id,
            model,
            status: LoadStatus::Loading,
            scene: None,
            tree: SceneTree::new(),
            sidecar: Sidecar::Pending,
            color_override,
        }
    }

    /// Session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Model base name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Geometry load state.
    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    /// The loaded scene, once it has arrived.
    pub fn scene(&self) -> Option<&SceneNode> {
        self.scene.as_ref()
    }

    /// Group state, when the sidecar has been applied.
    pub fn groups(&self) -> Option<&GroupState> {
        match &self.sidecar {
            Sidecar::Active(state) => Some(state),
            _ => None,
        }
    }

    /// Apply a held sidecar once both halves are present.
    fn activate(&mut self) -> Vec<MeshPaint> {
        let (Some(scene), Sidecar::Held(set)) = (&self.scene, &self.sidecar) else {
            return Vec::new();
        };
        let state = GroupState::assign(scene, set, std::mem::take(&mut self.color_override));
        let paints = state.paints();
        self.sidecar = Sidecar::Active(state);
        paints
    }
}

/// Viewer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Directory (URL prefix) holding the exported models.
    pub models_dir: String,
    /// Geometry file extension.
    pub extension: String,
    /// Model shown when the location names none.
    pub default_model: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            models_dir: "models".into(),
            extension: "glb".into(),
            default_model: String::new(),
        }
    }
}

/// The browser viewer's state: the current session and the page location.
#[derive(Debug, Clone)]
pub struct Viewer {
    config: ViewerConfig,
    last_id: u32,
    session: Option<Session>,
    location: ViewerLocation,
    initial_override: ColorOverride,
}

impl Viewer {
    /// Create a viewer for a page opened at `query`.
    ///
    /// Colors in the query replace the first model's authored group colors.
    pub fn new(config: ViewerConfig, query: &str) -> Self {
        let location = ViewerLocation::parse(query);
        let initial_override = ColorOverride {
            main: location.main,
            accent: location.accent,
        };
        Self {
            config,
            last_id: 0,
            session: None,
            location,
            initial_override,
        }
    }

    /// Load the model named by the opening location, or the default model.
    pub fn start(&mut self) -> LoadRequest {
        let model = self
            .location
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());
        self.load_model(&model)
    }

    /// Replace the current model. Results of earlier loads become stale.
    pub fn load_model(&mut self, model: &str) -> LoadRequest {
        self.last_id += 1;
        let id = SessionId(self.last_id);
        let model_url = format!(
            "{}/{}.{}",
            self.config.models_dir.trim_end_matches('/'),
            model,
            self.config.extension
        );
        log::debug!("session {id}: loading {model_url}");

        let color_override = std::mem::take(&mut self.initial_override);
        self.session = Some(Session::new(id, model.to_string(), color_override));
        self.location = ViewerLocation {
            model: Some(model.to_string()),
            main: None,
            accent: None,
        };
        LoadRequest {
            session: id,
            sidecar_url: sidecar_url(&model_url),
            model_url,
        }
    }

    /// The current session.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Geometry load state of the current session.
    pub fn status(&self) -> Option<&LoadStatus> {
        self.session.as_ref().map(Session::status)
    }

    /// Current page location.
    pub fn location(&self) -> &ViewerLocation {
        &self.location
    }

    fn current(&mut self, id: SessionId) -> Result<&mut Session> {
        match self.session.as_mut() {
            Some(session) if session.id == id => Ok(session),
            _ => {
                log::debug!("dropping result for stale session {id}");
                Err(ViewerError::Stale(id))
            }
        }
    }

    /// The geometry of session `id` arrived.
    pub fn scene_loaded(&mut self, id: SessionId, scene: SceneNode) -> Result<Vec<MeshPaint>> {
        let session = self.current(id)?;
        log::debug!("session {id}: scene with {} nodes", scene.node_count());
        session.scene = Some(scene);
        session.status = LoadStatus::Ready;
        let paints = session.activate();
        self.sync_location();
        Ok(paints)
    }

    /// The geometry of session `id` arrived as GLB or glTF bytes.
    pub fn glb_loaded(&mut self, id: SessionId, bytes: &[u8]) -> Result<Vec<MeshPaint>> {
        self.current(id)?;
        match GltfDocument::from_slice(bytes) {
            Ok(doc) => self.scene_loaded(id, doc.scene()),
            Err(err) => {
                self.scene_failed(id, err.to_string())?;
                Ok(Vec::new())
            }
        }
    }

    /// The geometry of session `id` could not be loaded.
    pub fn scene_failed(&mut self, id: SessionId, message: impl Into<String>) -> Result<()> {
        let session = self.current(id)?;
        let message = message.into();
        log::warn!("failed to load {}: {message}", session.model);
        session.status = LoadStatus::Failed(message);
        Ok(())
    }

    /// The sidecar of session `id` arrived.
    ///
    /// A document that does not parse hides the group controls.
    pub fn sidecar_loaded(&mut self, id: SessionId, json: &str) -> Result<Vec<MeshPaint>> {
        let session = self.current(id)?;
        session.sidecar = match ColorGroupSet::from_json(json) {
            Ok(set) => Sidecar::Held(set),
            Err(err) => {
                log::debug!("session {id}: ignoring color groups: {err}");
                Sidecar::Absent
            }
        };
        let paints = session.activate();
        self.sync_location();
        Ok(paints)
    }

    /// The sidecar of session `id` is missing or could not be fetched.
    pub fn sidecar_failed(&mut self, id: SessionId) -> Result<()> {
        self.current(id)?.sidecar = Sidecar::Absent;
        Ok(())
    }

    /// Group color controls, or `None` when they are hidden.
    pub fn controls(&self) -> Option<GroupControls> {
        self.session
            .as_ref()
            .and_then(Session::groups)
            .map(GroupState::controls)
    }

    /// Change a group color; returns the meshes to repaint.
    pub fn set_group_color(&mut self, kind: GroupKind, color: Rgb) -> Result<Vec<MeshPaint>> {
        let session = self.session.as_mut().ok_or(ViewerError::NoSession)?;
        let Sidecar::Active(state) = &mut session.sidecar else {
            return Err(ViewerError::NoGroups);
        };
        let paints = state.set_color(kind, color);
        self.sync_location();
        Ok(paints)
    }

    fn sync_location(&mut self) {
        let controls = self.controls();
        self.location.main = controls.map(|c| c.main);
        self.location.accent = controls.map(|c| c.accent);
    }

    fn scene_mut(&mut self) -> Result<(&mut SceneNode, &mut SceneTree)> {
        let session = self.session.as_mut().ok_or(ViewerError::NoSession)?;
        let scene = session.scene.as_mut().ok_or(ViewerError::NoScene)?;
        Ok((scene, &mut session.tree))
    }

    /// Rows of the hierarchy panel.
    pub fn tree_rows(&self) -> Vec<TreeRow> {
        self.session
            .as_ref()
            .and_then(|s| s.scene.as_ref().map(|scene| s.tree.rows(scene)))
            .unwrap_or_default()
    }

    /// Collapse or expand a hierarchy row.
    pub fn toggle_expanded(&mut self, path: &[usize]) -> Result<()> {
        let (scene, tree) = self.scene_mut()?;
        if scene.node_at(path).is_none() {
            return Err(ViewerError::UnknownNode(path.to_vec()));
        }
        tree.toggle_expanded(path);
        Ok(())
    }

    /// Flip the visibility of a node and its subtree.
    pub fn toggle_visible(&mut self, path: &[usize]) -> Result<bool> {
        let (scene, _) = self.scene_mut()?;
        tree::toggle_visible(scene, path)
    }

    /// Set the visibility of a node and its subtree.
    pub fn set_visible(&mut self, path: &[usize], visible: bool) -> Result<()> {
        let (scene, _) = self.scene_mut()?;
        tree::set_visible(scene, path, visible)
    }

    /// Camera placement framing the visible meshes.
    pub fn camera(&self, preset: ViewPreset) -> Result<CameraView> {
        let session = self.session.as_ref().ok_or(ViewerError::NoSession)?;
        let scene = session.scene.as_ref().ok_or(ViewerError::NoScene)?;
        Ok(camera_view(scene.world_bounds(), preset))
    }

    /// Mesh paths of a group in the current session.
    pub fn group_members(&self, kind: GroupKind) -> Vec<NodePath> {
        self.session
            .as_ref()
            .and_then(Session::groups)
            .map(|g| g.members(kind).cloned().collect())
            .unwrap_or_default()
    }
}
