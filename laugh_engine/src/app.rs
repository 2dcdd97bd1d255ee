/// Windowed driver: a winit event loop feeding the renderer lifecycle
///
/// Controls: `Space` cycles the display mode, arrow keys orbit the camera,
/// the mouse wheel zooms, `Escape` quits.

use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use crate::assets::AssetLoader;
use crate::config::RendererConfig;
use crate::device::GraphicsDevice;
use crate::error::{Error, Result};
use crate::renderer::{DeferredRenderer, RenderLifecycle};
use crate::scene::SceneDesc;
use crate::{engine_error, engine_info};

const ORBIT_STEP: f32 = 0.05;
const ZOOM_STEP: f32 = 0.25;

/// Creates the device once the window exists
pub type DeviceFactory<D> = Box<dyn FnOnce(&Arc<Window>, &RendererConfig) -> Result<D>>;

struct WindowedApp<D: GraphicsDevice> {
    // Dropped before the window its surface belongs to
    renderer: Option<DeferredRenderer<D>>,
    window: Option<Arc<Window>>,
    config: RendererConfig,
    pending: Option<(DeviceFactory<D>, Box<dyn AssetLoader>, SceneDesc)>,
    error: Option<Error>,
}

impl<D: GraphicsDevice> WindowedApp<D> {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let Some((factory, loader, scene)) = self.pending.take() else {
            return Ok(());
        };
        let attributes = Window::default_attributes()
            .with_title(self.config.app_name.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|e| Error::InitializationFailed(format!("window creation failed: {}", e)))?,
        );

        let device = factory(&window, &self.config)?;
        let mut renderer = DeferredRenderer::new(device, self.config.clone(), loader, scene);
        renderer.initialize()?;
        renderer.precompute()?;

        window.request_redraw();
        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: Error) {
        engine_error!("laugh::Renderer", "Fatal: {}", error);
        self.error = Some(error);
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut renderer) = self.renderer.take() {
            if let Err(e) = renderer.teardown() {
                engine_error!("laugh::Renderer", "Teardown failed: {}", e);
                self.error.get_or_insert(e);
            }
        }
        event_loop.exit();
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, key: &Key) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        match key {
            Key::Named(NamedKey::Escape) => self.shutdown(event_loop),
            Key::Named(NamedKey::Space) => {
                let mode = renderer.display_mode().next();
                renderer.set_display_mode(mode);
                engine_info!("laugh::Renderer", "Display mode: {:?}", mode);
            }
            Key::Named(NamedKey::ArrowLeft) => renderer.camera_mut().orbit(-ORBIT_STEP, 0.0),
            Key::Named(NamedKey::ArrowRight) => renderer.camera_mut().orbit(ORBIT_STEP, 0.0),
            Key::Named(NamedKey::ArrowUp) => renderer.camera_mut().orbit(0.0, ORBIT_STEP),
            Key::Named(NamedKey::ArrowDown) => renderer.camera_mut().orbit(0.0, -ORBIT_STEP),
            _ => {}
        }
    }
}

impl<D: GraphicsDevice> ApplicationHandler for WindowedApp<D> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    if let Err(e) = renderer.resize(size.width, size.height) {
                        self.fail(event_loop, e);
                        return;
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput {
                event: KeyEvent { logical_key, state: ElementState::Pressed, .. },
                ..
            } => self.handle_key(event_loop, &logical_key),
            WindowEvent::MouseWheel { delta, .. } => {
                let amount = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y * ZOOM_STEP,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 * ZOOM_STEP * 0.01,
                };
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.camera_mut().zoom(amount);
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(renderer) = self.renderer.as_mut() else {
                    return;
                };
                if let Err(e) = renderer.render_frame() {
                    self.fail(event_loop, e);
                    return;
                }
                // A minimized window redraws again once it is resized
                if renderer.is_suspended() {
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);
    }
}

/// Open a window and render `scene` until it closes
///
/// Returns the first fatal error, after teardown has run.
pub fn run_windowed<D: GraphicsDevice + 'static>(
    config: RendererConfig,
    loader: Box<dyn AssetLoader>,
    scene: SceneDesc,
    factory: DeviceFactory<D>,
) -> Result<()> {
    let event_loop = EventLoop::new()
        .map_err(|e| Error::InitializationFailed(format!("event loop creation failed: {}", e)))?;
    let mut app = WindowedApp {
        renderer: None,
        window: None,
        config,
        pending: Some((factory, loader, scene)),
        error: None,
    };
    event_loop
        .run_app(&mut app)
        .map_err(|e| Error::BackendError(format!("event loop failed: {}", e)))?;
    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
