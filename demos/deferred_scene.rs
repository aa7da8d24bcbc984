//! Deferred shading with shadows: a lit ground plane, some cubes, and an
//! orbiting point light.

use std::sync::Arc;
use std::time::Instant;

use pharos::*;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

enum App {
    Pending,
    Running {
        window: Arc<Window>,
        gpu: GpuContext,
        renderer: DeferredRenderer,
        tracker: ResourceTracker,
        list: RenderList,
        env: LightEnvironment,
        shadow: ShadowView,
        start: Instant,
    },
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let App::Pending = self {
            let attrs = WindowAttributes::default()
                .with_title("pharos — deferred scene")
                .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
            let window = Arc::new(event_loop.create_window(attrs).unwrap());
            let gpu = GpuContext::new(window.clone());

            let mut renderer = DeferredRenderer::new(&gpu).expect("renderer setup");
            let mut tracker = ResourceTracker::new();
            renderer.register_resources(&mut tracker);

            let mut list = RenderList::new();
            list.push(Box::new(SolidObject::plane(40.0, Color::rgb(0.45, 0.45, 0.5))));
            for (i, color) in [
                Color::rgb(0.9, 0.3, 0.25),
                Color::rgb(0.3, 0.8, 0.35),
                Color::rgb(0.3, 0.4, 0.9),
            ]
            .into_iter()
            .enumerate()
            {
                let mut cube = SolidObject::cube(2.0, color);
                cube.set_transform(Transform::translated(i as f32 * 4.0 - 4.0, 1.0, 0.0));
                list.push(Box::new(cube));
            }

            let mut env = LightEnvironment::new(Color::WHITE, 0.15);
            env.push(Light::new(
                Color::rgb(1.0, 0.95, 0.8),
                Color::WHITE,
                Vec3::new(0.0, 8.0, 6.0),
                60.0,
                0.02,
                1.2,
            ));

            let mut shadow = ShadowView::default();
            shadow.light_perspective = Camera::new(
                Vec3::new(10.0, 20.0, 10.0),
                Vec3::ZERO,
                Vec3::Y,
            );
            shadow.perspective_scale = 30.0;

            *self = App::Running {
                window,
                gpu,
                renderer,
                tracker,
                list,
                env,
                shadow,
                start: Instant::now(),
            };
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let App::Running {
            window,
            gpu,
            renderer,
            tracker,
            list,
            env,
            shadow,
            start,
        } = self
        else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                tracker.cleanup_all();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                gpu.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                let t = start.elapsed().as_secs_f32();
                env.lights[0].position =
                    Vec3::new(8.0 * t.cos(), 8.0, 8.0 * t.sin());

                let camera = Camera::default().at(0.0, 8.0, 16.0).looking_at(0.0, 0.0, 0.0);
                renderer
                    .render_with_lights_and_shadows(
                        gpu,
                        &camera,
                        list,
                        env,
                        Color::rgb(0.02, 0.02, 0.05),
                        shadow,
                    )
                    .expect("deferred frame");
                renderer.present(gpu).expect("present");

                window.request_redraw();
            }
            _ => {}
        }
    }
}

fn main() {
    env_logger::init();
    let event_loop = EventLoop::new().unwrap();
    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.run_app(&mut App::Pending).unwrap();
}
