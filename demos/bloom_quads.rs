//! Bloom over a deferred scene: bright emissive-looking quads built with
//! a growable vector object, plus an immediate-mode marker line.

use std::sync::Arc;

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
        bloom: Bloom,
        tracker: ResourceTracker,
        list: RenderList,
        marker: VectorObject,
        env: LightEnvironment,
    },
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let App::Pending = self {
            let attrs = WindowAttributes::default()
                .with_title("pharos — bloom")
                .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
            let window = Arc::new(event_loop.create_window(attrs).unwrap());
            let gpu = GpuContext::new(window.clone());

            let mut renderer = DeferredRenderer::new(&gpu).expect("renderer setup");
            let mut bloom = Bloom::new(&gpu).expect("bloom setup");
            bloom.set_options(
                BloomOptions::default()
                    .with_intensity(24)
                    .and_then(|o| o.with_count(2))
                    .expect("bloom options"),
            );

            let mut tracker = ResourceTracker::new();
            renderer.register_resources(&mut tracker);

            let mut panels = VectorObject::new(Primitive::Triangles, 64);
            for i in 0..4 {
                let x = i as f32 * 3.0 - 4.5;
                panels.add_quad(
                    Vec3::new(x, 3.0, 0.0),
                    Vec3::new(x, 0.0, 0.0),
                    Vec3::new(x + 2.0, 3.0, 0.0),
                    Vec3::new(x + 2.0, 0.0, 0.0),
                    [Vec3::Z; 4],
                    Color::rgb(2.0, 1.6, 0.9),
                );
            }

            let mut list = RenderList::new();
            list.push(Box::new(SolidObject::plane(30.0, Color::rgb(0.3, 0.3, 0.35))));
            list.push(Box::new(panels));

            let mut marker = VectorObject::new(Primitive::Lines, 8);
            marker.add_line(
                Vec3::new(-6.0, 0.1, 2.0),
                Vec3::new(6.0, 0.1, 2.0),
                Vec3::Y,
                Vec3::Y,
                Color::rgb(0.1, 0.9, 0.4),
            );

            let env = LightEnvironment::new(Color::WHITE, 0.6);

            *self = App::Running {
                window,
                gpu,
                renderer,
                bloom,
                tracker,
                list,
                marker,
                env,
            };
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let App::Running {
            window,
            gpu,
            renderer,
            bloom,
            tracker,
            list,
            marker,
            env,
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
                let camera = Camera::default().at(0.0, 4.0, 12.0).looking_at(0.0, 1.5, 0.0);

                renderer
                    .render_with_lights(gpu, &camera, list, env, Color::BLACK)
                    .expect("deferred frame");

                // Forward path draws after depth resolve, so the marker
                // depth-tests against the deferred scene.
                let mut forward = renderer.forward_frame(gpu);
                marker.render_immediate(&mut forward, &camera, Transform::default());
                forward.finish();

                renderer.run_bloom(gpu, bloom).expect("bloom");
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
