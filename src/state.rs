//! Application state owned by the UI thread.
//!
//! Compute tasks never touch this directly; they send a `Completion` back
//! and `AppState::apply` is the only place results land.

use crate::camera::{fit_camera_to_objects, OrbitControls, PerspectiveCamera};
use crate::compute::{ComputeError, RequestTracker};
use crate::document::GeometryDocument;
use crate::metrics::NamedMetrics;
use crate::pipeline::Solved;
use crate::scene::Scene;

/// What `apply` did with a completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// A newer request is in flight; dropped.
    Stale,
    Rendered,
    Empty,
    Failed,
}

#[derive(Debug)]
pub struct AppState {
    pub scene: Scene,
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    document: Option<GeometryDocument>,
    pub metrics: NamedMetrics,
    /// Loading indicator.
    pub busy: bool,
    /// Last error shown under the controls.
    pub status: Option<String>,
    tracker: RequestTracker,
    fit_offset: f32,
    clear_indicator_on_error: bool,
}

impl AppState {
    pub fn new(fit_offset: f32, clear_indicator_on_error: bool) -> Self {
        Self {
            scene: Scene::default(),
            camera: PerspectiveCamera::default(),
            controls: OrbitControls::default(),
            document: None,
            metrics: NamedMetrics::new(),
            busy: false,
            status: None,
            tracker: RequestTracker::default(),
            fit_offset,
            clear_indicator_on_error,
        }
    }

    /// Marks a request as issued and returns its sequence number.
    pub fn begin_request(&mut self) -> u64 {
        self.busy = true;
        self.tracker.issue()
    }

    pub fn document(&self) -> Option<&GeometryDocument> {
        self.document.as_ref()
    }

    pub fn download_enabled(&self) -> bool {
        self.document.is_some()
    }

    pub fn apply(&mut self, seq: u64, result: Result<Solved, ComputeError>) -> Applied {
        if !self.tracker.is_current(seq) {
            log::debug!("dropping result #{seq}, latest is #{}", self.tracker.latest());
            return Applied::Stale;
        }

        match result {
            Ok(Solved { document, root, metrics }) => {
                log::info!("loading {} objects", document.count());
                if let Some(old) = self.document.replace(document) {
                    old.release();
                }
                self.metrics = metrics;
                self.scene.replace_objects(root);
                self.fit_camera();
                self.busy = false;
                self.status = None;
                Applied::Rendered
            }
            Err(ComputeError::EmptyResult { metrics }) => {
                log::error!("No objects to load!");
                self.metrics = metrics;
                self.busy = false;
                Applied::Empty
            }
            Err(e) => {
                log::error!("{e}");
                self.status = Some(e.to_string());
                if self.clear_indicator_on_error {
                    self.busy = false;
                }
                Applied::Failed
            }
        }
    }

    pub fn fit_camera(&mut self) -> bool {
        fit_camera_to_objects(&mut self.camera, &mut self.controls, &self.scene, self.fit_offset)
    }

    /// Updates the aspect ratio; re-fits when it changed.
    pub fn set_viewport(&mut self, width: f32, height: f32) -> bool {
        if width <= 0.0 || height <= 0.0 {
            return false;
        }
        let aspect = width / height;
        if (aspect - self.camera.aspect).abs() <= f32::EPSILON {
            return false;
        }
        self.camera.aspect = aspect;
        self.fit_camera();
        true
    }
}
