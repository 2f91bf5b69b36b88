//! Entry point for the Hopf fibration viewer.

use anyhow::Result;
use clap::Parser;
use hopf_viewer::app::{App, FrameError};
use hopf_viewer::config::Config;
use std::sync::Arc;
use winit::{
    event::{ElementState, Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

fn main() -> Result<()> {
    // Initialize logging; default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    config.validate()?;

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Hopf Fibration")
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height))
            .build(&event_loop)?,
    );

    // Initialise the application (async → sync).
    let mut app = pollster::block_on(App::new(window.clone(), config))?;

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => {
                if !app.handle_event(&event) {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.state == ElementState::Pressed
                                && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                            {
                                elwt.exit();
                            }
                        }
                        WindowEvent::RedrawRequested => match app.render() {
                            Ok(()) => {}
                            Err(FrameError::Surface(wgpu::SurfaceError::Lost)) => {
                                app.resize(app.renderer.gfx.size);
                            }
                            Err(FrameError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                                log::error!("WGPU out of memory – exiting.");
                                elwt.exit();
                            }
                            Err(FrameError::Surface(e)) => log::error!("Render error: {:?}", e),
                            Err(FrameError::Gpu(e)) => {
                                log::error!("Compute pipeline failed: {}", e);
                                elwt.exit();
                            }
                        },
                        _ => {}
                    }
                }
            }
            Event::DeviceEvent { event, .. } => app.handle_device_event(&event),
            Event::AboutToWait => {
                // Request a redraw each frame.
                window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
