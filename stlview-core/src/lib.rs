/// stlview core - STL model viewer logic shared by every host
///
/// This library provides configuration intake, STL decoding, the scene and
/// camera rig, a CPU rasterizer, orbit controls, and the `Viewer` render-loop
/// state machine. Hosts plug in through the traits in `host`.

pub mod config;
pub mod controls;
pub mod error;
pub mod geometry;
pub mod host;
pub mod projection;
pub mod raster;
pub mod scene;
pub mod stl;
pub mod transform;
pub mod viewer;

// Re-export commonly used types
pub use config::{Color, ColorValue, ViewerConfig, ViewerProps};
pub use controls::{OrbitControls, OrbitInput, OrbitKey};
pub use error::{ConfigurationError, LoadError, LoadErrorKind, SurfaceError, ViewerError};
pub use geometry::{BoundingBox, Mesh, Triangle, Vertex};
pub use host::{FrameScheduler, LoadId, LoadResult, MeshLoader, Surface, ViewerHost};
pub use projection::Camera;
pub use raster::{Framebuffer, SceneRenderer};
pub use scene::Scene;
pub use transform::RotationState;
pub use viewer::{Motion, Phase, Viewer};
