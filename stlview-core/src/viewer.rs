//! The viewer: scene assembly, camera setup, orbit wiring and the render loop.
//!
//! A [`Viewer`] is driven entirely by its host. The host starts it with
//! [`Viewer::initialize`], completes the mesh load with
//! [`Viewer::finish_load`], fires scheduled frames through
//! [`Viewer::on_frame`], forwards pointer input to [`Viewer::orbit`] and
//! finally calls [`Viewer::destroy`] (or drops the viewer).

use log::{debug, info, trace, warn};
use nalgebra::{Point3, Vector3};

use crate::config::ViewerConfig;
use crate::controls::{OrbitControls, OrbitInput};
use crate::error::{LoadError, Result, ViewerError};
use crate::geometry::Mesh;
use crate::host::{LoadId, LoadResult, ViewerHost};
use crate::projection::{camera_distance, Camera};
use crate::raster::SceneRenderer;
use crate::scene::{MeshNode, Scene};
use crate::stl::{self, StlError};
use crate::transform::RotationState;

/// Lifecycle of a viewer instance
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Created,
    Loading(LoadId),
    Ready,
    Failed(ViewerError),
    Destroyed,
}

/// Who drives rendering: the continuous loop or user interaction.
///
/// The only transition is `Rotating -> Static`, and it never reverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Rotating,
    Static,
}

impl Motion {
    pub fn initial(rotate: bool) -> Self {
        if rotate {
            Motion::Rotating
        } else {
            Motion::Static
        }
    }

    /// Latch to `Static`. Returns whether this call made the transition.
    fn stop(&mut self) -> bool {
        let was_rotating = *self == Motion::Rotating;
        *self = Motion::Static;
        was_rotating
    }
}

pub struct Viewer<H: ViewerHost> {
    config: ViewerConfig,
    host: H,
    phase: Phase,
    motion: Motion,
    scene: Scene,
    extents: Option<Vector3<f32>>,
    camera: Option<Camera>,
    renderer: Option<SceneRenderer>,
    controls: Option<OrbitControls>,
    mounted: bool,
    next_load_id: LoadId,
    frames_rendered: u64,
}

impl<H: ViewerHost> Viewer<H> {
    pub fn new(config: ViewerConfig, host: H) -> Result<Self> {
        config.check()?;
        Ok(Self {
            scene: Scene::with_lights(&config),
            motion: Motion::initial(config.rotate),
            config,
            host,
            phase: Phase::Created,
            extents: None,
            camera: None,
            renderer: None,
            controls: None,
            mounted: false,
            next_load_id: 1,
            frames_rendered: 0,
        })
    }

    /// Build the lights-only scene and start loading the mesh
    pub fn initialize(&mut self) -> Result<()> {
        match self.phase {
            Phase::Created => {}
            Phase::Destroyed => return Err(ViewerError::Destroyed),
            _ => return Err(ViewerError::AlreadyInitialized),
        }

        self.scene = Scene::with_lights(&self.config);

        let id = self.next_load_id;
        self.next_load_id += 1;
        self.phase = Phase::Loading(id);
        debug!("loading mesh {} (load {})", self.config.url, id);
        self.host.begin(id, &self.config.url);
        Ok(())
    }

    /// Complete load `id` with the fetched bytes or the fetch failure.
    ///
    /// Completions for an aborted or superseded load, or after `destroy`,
    /// are ignored. A failure leaves the viewer in [`Phase::Failed`] with a
    /// lights-only scene and is returned to the host.
    pub fn finish_load(&mut self, id: LoadId, result: LoadResult) -> Result<()> {
        match self.phase {
            Phase::Loading(current) if current == id => {}
            _ => {
                debug!("ignoring completion of load {} in phase {:?}", id, self.phase);
                return Ok(());
            }
        }

        let loaded = result.and_then(|bytes| stl::parse_stl(&bytes).map_err(LoadError::from));
        let outcome = match loaded {
            Ok(mesh) => self.on_mesh_loaded(mesh),
            Err(err) => Err(err.into()),
        };

        if let Err(err) = &outcome {
            warn!("failed to show {}: {}", self.config.url, err);
            self.fail(err.clone());
        }
        outcome
    }

    fn fail(&mut self, err: ViewerError) {
        self.camera = None;
        self.renderer = None;
        self.controls = None;
        self.extents = None;
        self.scene.mesh = None;
        self.phase = Phase::Failed(err);
    }

    fn on_mesh_loaded(&mut self, mut mesh: Mesh) -> Result<()> {
        mesh.compute_normals();
        mesh.center();

        let bounds = mesh
            .bounding_box()
            .ok_or(LoadError::Parse(StlError::Empty))?;
        let extents = bounds.extents();

        let rotation = match self.motion {
            Motion::Rotating => RotationState::from_speeds(self.config.rotation_speeds),
            Motion::Static => RotationState::zero(),
        };

        info!(
            "loaded {} ({} triangles, extents {:.3} x {:.3} x {:.3})",
            self.config.url,
            mesh.triangles.len(),
            extents.x,
            extents.y,
            extents.z
        );

        self.scene.add_mesh(MeshNode {
            mesh,
            color: self.config.model_color,
            rotation,
        });
        self.extents = Some(extents);

        self.setup_camera(&extents);
        self.setup_controls();

        self.host.mount(self.config.width, self.config.height)?;
        self.mounted = true;

        self.phase = Phase::Ready;
        self.start_loop();
        Ok(())
    }

    fn setup_camera(&mut self, extents: &Vector3<f32>) {
        let placement = &self.config.camera;
        let mut camera = Camera::perspective(self.config.width, self.config.height);
        camera.position = Point3::new(
            placement.x,
            placement.y,
            camera_distance(placement, extents),
        );
        camera.look_at(Point3::origin());
        debug!("camera at {:?}", camera.position);
        self.camera = Some(camera);

        let mut renderer = SceneRenderer::new(self.config.width, self.config.height, true);
        renderer.set_clear_color(self.config.background_color);
        debug!(
            "renderer {}x{} (antialias: {})",
            self.config.width,
            self.config.height,
            renderer.antialias()
        );
        self.renderer = Some(renderer);
    }

    fn setup_controls(&mut self) {
        if !self.config.orbit_controls {
            return;
        }
        let mut controls = OrbitControls::new(self.config.height);
        controls.enable_keys = false;
        self.controls = Some(controls);
    }

    /// First render of the initial pose; the loop proper starts with the
    /// first scheduled frame.
    fn start_loop(&mut self) {
        if self.motion == Motion::Rotating {
            self.host.request_frame();
        }
        self.render();
    }

    /// One scheduled frame of the auto-rotation loop
    pub fn on_frame(&mut self) {
        if self.phase != Phase::Ready || self.motion != Motion::Rotating {
            trace!("frame ignored in phase {:?} / {:?}", self.phase, self.motion);
            return;
        }

        self.host.request_frame();

        if self.apply_pending_orbit() {
            return;
        }

        if let Some(node) = self.scene.mesh.as_mut() {
            node.rotation.advance(self.config.rotation_speeds);
        }
        self.render();
    }

    /// Forward user input to the orbit controller.
    ///
    /// Returns whether the input moved the camera (and so caused a render).
    pub fn orbit(&mut self, input: OrbitInput) -> bool {
        if self.phase != Phase::Ready {
            return false;
        }
        let Some(controls) = self.controls.as_mut() else {
            return false;
        };
        if !controls.handle_input(input) {
            return false;
        }
        self.apply_pending_orbit()
    }

    fn apply_pending_orbit(&mut self) -> bool {
        let (Some(controls), Some(camera)) = (self.controls.as_mut(), self.camera.as_mut()) else {
            return false;
        };
        if !controls.update(camera) {
            return false;
        }
        self.orbit_render();
        true
    }

    /// Camera changed by the user: stop auto-rotation for good, then redraw once
    fn orbit_render(&mut self) {
        if self.motion.stop() {
            self.host.cancel_frame();
            info!("user interaction stopped auto-rotation");
        }
        self.render();
    }

    fn render(&mut self) {
        let (Some(renderer), Some(camera)) = (self.renderer.as_mut(), self.camera.as_ref()) else {
            return;
        };
        let frame = renderer.render(&self.scene, camera);
        self.host.present(frame);
        self.frames_rendered += 1;
    }

    /// Tear down: abort a pending load, stop the loop, release the surface.
    /// Safe to call more than once.
    pub fn destroy(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Destroyed) {
            Phase::Destroyed => return,
            Phase::Loading(id) => {
                debug!("aborting load {}", id);
                self.host.abort(id);
            }
            Phase::Ready if self.motion == Motion::Rotating => self.host.cancel_frame(),
            _ => {}
        }

        self.motion.stop();
        self.controls = None;
        self.renderer = None;
        if self.mounted {
            self.host.release();
            self.mounted = false;
        }
        info!("viewer for {} destroyed", self.config.url);
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn motion(&self) -> Motion {
        self.motion
    }

    pub fn is_rotating(&self) -> bool {
        self.motion == Motion::Rotating
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn has_controls(&self) -> bool {
        self.controls.is_some()
    }

    /// Bounding-box extents of the loaded mesh
    pub fn extents(&self) -> Option<Vector3<f32>> {
        self.extents
    }

    pub fn mesh_rotation(&self) -> Option<RotationState> {
        self.scene.mesh.as_ref().map(|node| node.rotation)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// The load failure, when the viewer ended in [`Phase::Failed`] because of one
    pub fn load_error(&self) -> Option<&LoadError> {
        match &self.phase {
            Phase::Failed(ViewerError::Load(err)) => Some(err),
            _ => None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

impl<H: ViewerHost> Drop for Viewer<H> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerProps;
    use crate::error::{LoadErrorKind, SurfaceError};
    use crate::host::{FrameScheduler, MeshLoader, Surface};
    use crate::raster::Framebuffer;
    use approx::assert_relative_eq;
    use std::f32::consts::TAU;

    #[derive(Default)]
    struct MockHost {
        frame_pending: bool,
        frame_requests: usize,
        frame_cancels: usize,
        loads: Vec<(LoadId, String)>,
        aborted: Vec<LoadId>,
        mounted: Option<(u32, u32)>,
        presented: usize,
        released: usize,
        fail_mount: bool,
    }

    impl FrameScheduler for MockHost {
        fn request_frame(&mut self) {
            self.frame_pending = true;
            self.frame_requests += 1;
        }

        fn cancel_frame(&mut self) {
            self.frame_pending = false;
            self.frame_cancels += 1;
        }
    }

    impl MeshLoader for MockHost {
        fn begin(&mut self, id: LoadId, url: &str) {
            self.loads.push((id, url.to_string()));
        }

        fn abort(&mut self, id: LoadId) {
            self.aborted.push(id);
        }
    }

    impl Surface for MockHost {
        fn mount(&mut self, width: u32, height: u32) -> std::result::Result<(), SurfaceError> {
            if self.fail_mount {
                return Err(SurfaceError("element detached".into()));
            }
            self.mounted = Some((width, height));
            Ok(())
        }

        fn present(&mut self, frame: &Framebuffer) {
            assert_eq!(Some((frame.width(), frame.height())), self.mounted);
            self.presented += 1;
        }

        fn release(&mut self) {
            self.released += 1;
        }
    }

    /// ASCII STL of one triangle whose bounding box is 2 x 4 x 6
    const WEDGE: &str = "solid wedge
facet normal 0 0 1
 outer loop
  vertex 0 0 0
  vertex 2 0 0
  vertex 0 4 6
 endloop
endfacet
endsolid wedge
";

    fn props() -> ViewerProps {
        ViewerProps {
            width: 32.0,
            height: 24.0,
            rotation_speeds: vec![0.01, 0.02, 0.03],
            ..ViewerProps::new("https://example.com/wedge.stl")
        }
    }

    fn viewer(props: ViewerProps) -> Viewer<MockHost> {
        let mut viewer = Viewer::new(props.validate().unwrap(), MockHost::default()).unwrap();
        viewer.initialize().unwrap();
        viewer
    }

    fn loaded(props: ViewerProps) -> Viewer<MockHost> {
        let mut viewer = viewer(props);
        let id = viewer.host().loads[0].0;
        viewer.finish_load(id, Ok(WEDGE.as_bytes().to_vec())).unwrap();
        viewer
    }

    /// Fire the pending frame, as a display refresh would
    fn pump(viewer: &mut Viewer<MockHost>) -> bool {
        if !viewer.host().frame_pending {
            return false;
        }
        viewer.host_mut().frame_pending = false;
        viewer.on_frame();
        true
    }

    #[test]
    fn test_initialize_starts_single_load() {
        let viewer = viewer(props());
        assert_eq!(viewer.host().loads, vec![(1, "https://example.com/wedge.stl".to_string())]);
        assert_eq!(viewer.phase(), &Phase::Loading(1));
        assert!(viewer.scene().mesh.is_none());
        assert!(viewer.camera().is_none());
    }

    #[test]
    fn test_initialize_twice_is_rejected() {
        let mut viewer = viewer(props());
        assert_eq!(viewer.initialize(), Err(ViewerError::AlreadyInitialized));
    }

    #[test]
    fn test_load_sets_up_scene_and_mounts() {
        let viewer = loaded(props());
        assert_eq!(viewer.phase(), &Phase::Ready);
        assert_eq!(viewer.host().mounted, Some((32, 24)));
        assert!(viewer.has_renderer());
        assert!(viewer.has_controls());
        assert_eq!(viewer.host().presented, 1);
        assert!(viewer.host().frame_pending);

        let bounds = viewer.scene().mesh.as_ref().unwrap().mesh.bounding_box().unwrap();
        assert_relative_eq!(bounds.center(), Point3::origin());
    }

    #[test]
    fn test_derived_camera_distance_frames_model() {
        let viewer = loaded(props());
        assert_relative_eq!(viewer.extents().unwrap(), Vector3::new(2.0, 4.0, 6.0));
        let camera = viewer.camera().unwrap();
        assert_relative_eq!(camera.position.z, 18.0);
        assert_eq!(camera.target, Point3::origin());
        assert_relative_eq!(camera.aspect, 32.0 / 24.0);
    }

    #[test]
    fn test_explicit_camera_z_is_kept() {
        let viewer = loaded(ViewerProps {
            camera_x: 1.0,
            camera_z: Some(50.0),
            ..props()
        });
        let camera = viewer.camera().unwrap();
        assert_eq!(camera.position, Point3::new(1.0, 0.0, 50.0));
    }

    #[test]
    fn test_rotation_advances_once_per_frame() {
        let speeds = [0.01, 0.02, 0.03];
        let mut viewer = loaded(props());
        let initial = viewer.mesh_rotation().unwrap();
        assert_eq!(initial, RotationState::from_speeds(speeds));

        let frames = 500;
        for _ in 0..frames {
            assert!(pump(&mut viewer));
        }

        let rotation = viewer.mesh_rotation().unwrap();
        let expected = |start: f32, speed: f32| (start + frames as f32 * speed).rem_euclid(TAU);
        assert_relative_eq!(rotation.x, expected(initial.x, speeds[0]), epsilon = 1e-3);
        assert_relative_eq!(rotation.y, expected(initial.y, speeds[1]), epsilon = 1e-3);
        assert_relative_eq!(rotation.z, expected(initial.z, speeds[2]), epsilon = 1e-3);
        assert_eq!(viewer.frames_rendered(), frames + 1);
        assert!(viewer.is_rotating());
    }

    #[test]
    fn test_first_orbit_latches_static_and_renders_once() {
        let mut viewer = loaded(props());
        pump(&mut viewer);
        let rendered = viewer.frames_rendered();
        let rotation = viewer.mesh_rotation();

        assert!(viewer.orbit(OrbitInput::Rotate { dx: 5.0, dy: 0.0 }));
        assert_eq!(viewer.motion(), Motion::Static);
        assert_eq!(viewer.frames_rendered(), rendered + 1);
        assert_eq!(viewer.mesh_rotation(), rotation);
        assert_eq!(viewer.host().frame_cancels, 1);
        assert!(!viewer.host().frame_pending);

        // Latched: later input renders again but does not toggle anything
        assert!(viewer.orbit(OrbitInput::Dolly(1.0)));
        assert_eq!(viewer.motion(), Motion::Static);
        assert_eq!(viewer.frames_rendered(), rendered + 2);
        assert_eq!(viewer.host().frame_cancels, 1);
        assert_eq!(viewer.mesh_rotation(), rotation);

        // A frame delivered late does nothing
        viewer.on_frame();
        assert_eq!(viewer.frames_rendered(), rendered + 2);
    }

    #[test]
    fn test_orbit_ignored_when_disabled() {
        let mut viewer = loaded(ViewerProps {
            orbit_controls: false,
            ..props()
        });
        assert!(!viewer.has_controls());
        assert!(!viewer.orbit(OrbitInput::Rotate { dx: 5.0, dy: 5.0 }));
        assert!(viewer.is_rotating());
    }

    #[test]
    fn test_keys_are_disabled_on_attached_controls() {
        use crate::controls::OrbitKey;
        let mut viewer = loaded(props());
        assert!(!viewer.orbit(OrbitInput::Key(OrbitKey::Left)));
        assert!(viewer.is_rotating());
    }

    #[test]
    fn test_static_viewer_renders_on_demand_only() {
        let mut viewer = loaded(ViewerProps {
            rotate: false,
            ..props()
        });
        assert_eq!(viewer.mesh_rotation(), Some(RotationState::zero()));
        assert_eq!(viewer.host().frame_requests, 0);
        assert_eq!(viewer.frames_rendered(), 1);

        viewer.on_frame();
        assert_eq!(viewer.frames_rendered(), 1);

        assert!(viewer.orbit(OrbitInput::Rotate { dx: 0.0, dy: 3.0 }));
        assert_eq!(viewer.frames_rendered(), 2);
        assert_eq!(viewer.host().frame_cancels, 0);
    }

    #[test]
    fn test_unreachable_mesh_reports_not_found() {
        let mut viewer = viewer(props());
        let err = viewer
            .finish_load(1, Err(LoadError::NotFound("wedge.stl".into())))
            .unwrap_err();
        assert!(matches!(err, ViewerError::Load(ref e) if e.kind() == LoadErrorKind::NotFound));
        assert_eq!(viewer.load_error().map(LoadError::kind), Some(LoadErrorKind::NotFound));
        assert!(viewer.camera().is_none());
        assert!(!viewer.has_renderer());
        assert!(viewer.scene().mesh.is_none());
        assert_eq!(viewer.host().mounted, None);
        assert_eq!(viewer.host().frame_requests, 0);
    }

    #[test]
    fn test_network_failure_reports_network_error() {
        let mut viewer = viewer(props());
        let _ = viewer.finish_load(1, Err(LoadError::Network("connection reset".into())));
        assert_eq!(viewer.load_error().map(LoadError::kind), Some(LoadErrorKind::NetworkError));
    }

    #[test]
    fn test_corrupt_mesh_reports_parse_error() {
        let mut viewer = viewer(props());
        let err = viewer.finish_load(1, Ok(b"not an stl".to_vec())).unwrap_err();
        assert!(matches!(err, ViewerError::Load(LoadError::Parse(_))));
        assert_eq!(viewer.load_error().map(LoadError::kind), Some(LoadErrorKind::ParseError));
        assert_eq!(viewer.host().presented, 0);
    }

    #[test]
    fn test_mount_failure_leaves_failed_state() {
        let mut viewer = Viewer::new(props().validate().unwrap(), MockHost {
            fail_mount: true,
            ..MockHost::default()
        })
        .unwrap();
        viewer.initialize().unwrap();
        let err = viewer.finish_load(1, Ok(WEDGE.as_bytes().to_vec())).unwrap_err();
        assert!(matches!(err, ViewerError::Surface(_)));
        assert!(matches!(viewer.phase(), Phase::Failed(_)));
        assert!(!viewer.has_renderer());
        assert_eq!(viewer.host().frame_requests, 0);
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let mut viewer = viewer(props());
        assert_eq!(viewer.finish_load(7, Ok(WEDGE.as_bytes().to_vec())), Ok(()));
        assert_eq!(viewer.phase(), &Phase::Loading(1));
    }

    #[test]
    fn test_destroy_during_load_aborts_it() {
        let mut viewer = viewer(props());
        viewer.destroy();
        assert_eq!(viewer.host().aborted, vec![1]);
        assert_eq!(viewer.phase(), &Phase::Destroyed);

        // The fetch finishing anyway must not build anything
        assert_eq!(viewer.finish_load(1, Ok(WEDGE.as_bytes().to_vec())), Ok(()));
        assert!(viewer.camera().is_none());
        assert_eq!(viewer.host().frame_requests, 0);
        assert_eq!(viewer.host().released, 0);
        assert_eq!(viewer.initialize(), Err(ViewerError::Destroyed));
    }

    #[test]
    fn test_destroy_while_rotating_stops_frames() {
        let mut viewer = loaded(props());
        pump(&mut viewer);
        let rendered = viewer.frames_rendered();

        viewer.destroy();
        assert_eq!(viewer.host().frame_cancels, 1);
        assert!(!viewer.host().frame_pending);
        assert_eq!(viewer.host().released, 1);
        assert!(!viewer.has_renderer());

        viewer.on_frame();
        assert!(!viewer.orbit(OrbitInput::Rotate { dx: 1.0, dy: 1.0 }));
        assert_eq!(viewer.frames_rendered(), rendered);

        viewer.destroy();
        assert_eq!(viewer.host().released, 1);
    }

    #[test]
    fn test_rejects_hand_built_invalid_config() {
        let mut config = props().validate().unwrap();
        config.height = 0;
        assert!(matches!(
            Viewer::new(config, MockHost::default()),
            Err(ViewerError::Configuration(_))
        ));
    }
}
