//! Capabilities a host environment provides to the [`Viewer`](crate::Viewer).
//!
//! Every callback runs on the host's single event thread; the traits take
//! `&mut self` and the host calls back into the viewer later, never from
//! inside one of these methods.

use crate::error::{LoadError, SurfaceError};
use crate::raster::Framebuffer;

/// Identifies one mesh load. A completion carrying any other id is stale.
pub type LoadId = u64;

/// One-shot "call me before the next repaint" scheduling.
///
/// After `request_frame` the host calls [`Viewer::on_frame`](crate::Viewer::on_frame)
/// once, unless `cancel_frame` ran first.
pub trait FrameScheduler {
    fn request_frame(&mut self);
    fn cancel_frame(&mut self);
}

/// Asynchronous mesh fetching.
///
/// `begin` starts fetching `url`; when done the host hands the raw bytes (or
/// the failure) to [`Viewer::finish_load`](crate::Viewer::finish_load) with
/// the same id. `abort` drops an in-flight load.
pub trait MeshLoader {
    fn begin(&mut self, id: LoadId, url: &str);
    fn abort(&mut self, id: LoadId);
}

/// The host element the rendered output is shown in.
pub trait Surface {
    /// Replace the host element's content with a `width` x `height` output surface
    fn mount(&mut self, width: u32, height: u32) -> Result<(), SurfaceError>;
    fn present(&mut self, frame: &Framebuffer);
    fn release(&mut self);
}

/// Everything a viewer needs from its host
pub trait ViewerHost: FrameScheduler + MeshLoader + Surface {}

impl<T: FrameScheduler + MeshLoader + Surface> ViewerHost for T {}

/// Outcome of a finished load, as delivered by a host
pub type LoadResult = Result<Vec<u8>, LoadError>;
