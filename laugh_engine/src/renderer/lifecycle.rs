/// Renderer lifecycle: initialize -> precompute -> frames -> teardown

use crate::error::Result;
use crate::engine_error;

/// Stages an orchestrator goes through, called in order by its driver
///
/// `resize` may be called any number of times between `precompute` and
/// `teardown`.
pub trait RenderLifecycle {
    /// Create every load-time resource (registry, passes, layouts, scene)
    fn initialize(&mut self) -> Result<()>;

    /// Compute the missing precomputed maps, then build the steady state
    fn precompute(&mut self) -> Result<()>;

    /// Draw and present one frame, recreating the surface when it reports out of date
    fn render_frame(&mut self) -> Result<()>;

    /// Rebuild every resolution-dependent resource for a new surface size
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Wait for the device, persist computed maps, destroy everything
    fn teardown(&mut self) -> Result<()>;
}

/// Headless driver: `frames` frames, then teardown
///
/// Teardown also runs after a failed stage; the first error wins.
pub fn run_frames<R: RenderLifecycle + ?Sized>(renderer: &mut R, frames: u32) -> Result<()> {
    let run = (|| -> Result<()> {
        renderer.initialize()?;
        renderer.precompute()?;
        for _ in 0..frames {
            renderer.render_frame()?;
        }
        Ok(())
    })();

    let teardown = renderer.teardown();
    if let Err(e) = &run {
        engine_error!("laugh::Renderer", "Run aborted: {}", e);
    }
    run.and(teardown)
}
