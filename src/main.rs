use dear_imgui_rs::*;
use dear_imgui_wgpu::WgpuRenderer;
use dear_imgui_winit::WinitPlatform;
use pollster::block_on;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use hexgrid::file_backend::FileBackend;
use hexgrid::model::HexViewerModel;
use hexgrid::settings::{load_settings, save_settings};
use hexgrid::ui::HexViewerUI;

const WINDOW_TITLE: &str = "hexgrid - Hex Viewer";
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.2,
    b: 0.3,
    a: 1.0,
};

type AppResult<T> = Result<T, Box<dyn Error>>;

/// Surface plus the device that draws into it.
struct Gpu {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
}

impl Gpu {
    fn new(window: Arc<Window>) -> AppResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))?;
        let (device, queue) =
            block_on(adapter.request_device(&wgpu::DeviceDescriptor::default()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = srgb_format(&caps.formats).ok_or("surface reports no texture formats")?;
        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!("Surface configured: {:?} {}x{}", format, size.width, size.height);

        Ok(Self {
            surface,
            device,
            queue,
            config,
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Next frame to draw into. `None` when this frame should be skipped.
    fn acquire(&mut self) -> AppResult<Option<wgpu::SurfaceTexture>> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                Ok(None)
            }
            Err(wgpu::SurfaceError::Timeout) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }
}

/// Prefer an sRGB swapchain so imgui colors come out as authored.
fn srgb_format(available: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    [
        wgpu::TextureFormat::Bgra8UnormSrgb,
        wgpu::TextureFormat::Rgba8UnormSrgb,
    ]
    .into_iter()
    .find(|f| available.contains(f))
    .or_else(|| available.first().copied())
}

struct Imgui {
    context: Context,
    platform: WinitPlatform,
    renderer: WgpuRenderer,
    last_frame: Instant,
}

impl Imgui {
    fn new(window: &Window, gpu: &Gpu) -> AppResult<Self> {
        let mut context = Context::create();
        context
            .set_ini_filename(None::<String>)
            .map_err(|e| format!("Failed to disable imgui.ini: {e:?}"))?;

        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(window, dear_imgui_winit::HiDpiMode::Default, &mut context);

        let init_info = dear_imgui_wgpu::WgpuInitInfo::new(
            gpu.device.clone(),
            gpu.queue.clone(),
            gpu.config.format,
        );
        let mut renderer = WgpuRenderer::new(init_info, &mut context)
            .map_err(|e| format!("Failed to initialize WGPU renderer: {e:?}"))?;
        renderer.set_gamma_mode(dear_imgui_wgpu::GammaMode::Auto);

        Ok(Self {
            context,
            platform,
            renderer,
            last_frame: Instant::now(),
        })
    }

    fn advance_clock(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_frame;
        self.context.io_mut().set_delta_time(delta.as_secs_f32());
        self.last_frame = now;
    }
}

struct AppWindow {
    window: Arc<Window>,
    gpu: Gpu,
    imgui: Imgui,
    model: HexViewerModel,
    viewer_ui: HexViewerUI,
}

impl AppWindow {
    fn new(event_loop: &ActiveEventLoop, initial_file: Option<&Path>) -> AppResult<Self> {
        let window = Arc::new(
            event_loop.create_window(
                Window::default_attributes()
                    .with_title(WINDOW_TITLE)
                    .with_inner_size(LogicalSize::new(1280.0, 720.0)),
            )?,
        );
        let gpu = Gpu::new(window.clone())?;
        let imgui = Imgui::new(&window, &gpu)?;

        let mut model = HexViewerModel::new();
        model.set_settings(load_settings());
        model.set_backend(Box::new(FileBackend::new()?));
        if let Some(path) = initial_file {
            model.open_file(path);
        }

        Ok(Self {
            window,
            gpu,
            imgui,
            model,
            viewer_ui: HexViewerUI::new(),
        })
    }

    fn render(&mut self) -> AppResult<()> {
        self.imgui.advance_clock();
        self.model.process_events();

        let Some(frame) = self.gpu.acquire()? else {
            return Ok(());
        };

        self.imgui
            .platform
            .prepare_frame(&self.window, &mut self.imgui.context);
        let ui = self.imgui.context.frame();
        let [width, height] = ui.io().display_size();
        self.viewer_ui.render(ui, &mut self.model, width, height);
        let draw_data = self.imgui.context.render();

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("hexgrid frame"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("imgui pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let renderer = &mut self.imgui.renderer;
            renderer
                .new_frame()
                .map_err(|e| format!("Failed to prepare new frame: {e:?}"))?;
            renderer
                .render_draw_data(draw_data, &mut pass)
                .map_err(|e| format!("Failed to render draw data: {e:?}"))?;
        }

        self.gpu.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

struct App {
    window: Option<AppWindow>,
    initial_file: Option<PathBuf>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match AppWindow::new(event_loop, self.initial_file.as_deref()) {
            Ok(window) => self.window = Some(window),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(app) = self.window.as_mut() else {
            return;
        };

        app.imgui
            .platform
            .handle_window_event(&mut app.imgui.context, &app.window, &event);

        match event {
            WindowEvent::Resized(size) => {
                app.gpu.resize(size);
                app.window.request_redraw();
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                app.gpu.resize(app.window.inner_size());
                app.window.request_redraw();
            }
            WindowEvent::CloseRequested => {
                save_settings(&app.model.settings);
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = app.render() {
                    log::error!("Render error: {e}");
                }
                app.window.request_redraw();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(app) = &self.window {
            app.window.request_redraw();
        }
    }
}

fn main() -> AppResult<()> {
    env_logger::init();

    let initial_file = std::env::args_os().nth(1).map(PathBuf::from);
    if let Some(ref path) = initial_file {
        log::info!("Opening {}", path.display());
    }

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = App {
        window: None,
        initial_file,
    };
    event_loop.run_app(&mut app)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat;

    #[test]
    fn test_srgb_format_preference() {
        assert_eq!(
            srgb_format(&[TextureFormat::Rgba8Unorm, TextureFormat::Rgba8UnormSrgb]),
            Some(TextureFormat::Rgba8UnormSrgb)
        );
        assert_eq!(
            srgb_format(&[TextureFormat::Rgba8UnormSrgb, TextureFormat::Bgra8UnormSrgb]),
            Some(TextureFormat::Bgra8UnormSrgb)
        );
        assert_eq!(srgb_format(&[TextureFormat::Rgba8Unorm]), Some(TextureFormat::Rgba8Unorm));
        assert_eq!(srgb_format(&[]), None);
    }
}
