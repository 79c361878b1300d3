pub mod camera;
pub mod compute;
pub mod config;
pub mod decode;
pub mod document;
pub mod download;
pub mod inputs;
pub mod metrics;
pub mod pipeline;
mod renderer;
pub mod scene;
pub mod state;

use std::{future::Future, sync::Arc};

use anyhow::Context as _;
use eframe::egui;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};

use compute::{build_solve_url, DefaultTransport};
use config::AppConfig;
use inputs::{collect_inputs, InputControl};
use pipeline::{run_solve, Completion};
use state::AppState;

/// Canvas the web build attaches to.
pub const CANVAS_ID: &str = "solarcanopy_canvas";

const BACKGROUND: egui::Color32 = egui::Color32::from_rgb(0, 0, 255);

pub struct SolarCanopyApp {
    config: AppConfig,
    controls: Vec<InputControl>,
    state: AppState,
    completions_tx: UnboundedSender<Completion>,
    completions_rx: UnboundedReceiver<Completion>,
    gpu: Option<Arc<renderer::GpuScene>>,
    gpu_failed: bool,
}

impl SolarCanopyApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        let (completions_tx, completions_rx) = unbounded();
        let mut app = Self {
            controls: config.controls.clone(),
            state: AppState::new(config.fit_offset, config.clear_indicator_on_error),
            config,
            completions_tx,
            completions_rx,
            gpu: None,
            gpu_failed: false,
        };
        app.compute();
        app
    }

    /// Collects every input and fires a solve; the result comes back through
    /// the completion channel.
    fn compute(&mut self) {
        let inputs = collect_inputs(&self.controls);
        let url = match build_solve_url(&self.config.server_base(), &self.config.definition, &inputs) {
            Ok(url) => url,
            Err(e) => {
                log::error!("{e}");
                self.state.status = Some(e.to_string());
                return;
            }
        };

        let seq = self.state.begin_request();
        let tx = self.completions_tx.clone();
        execute(async move {
            let result = run_solve(&DefaultTransport::default(), &url).await;
            if tx.unbounded_send((seq, result)).is_err() {
                log::debug!("app closed before result #{seq} arrived");
            }
        });
    }

    fn drain_completions(&mut self) {
        while let Ok(Some((seq, result))) = self.completions_rx.try_next() {
            self.state.apply(seq, result);
        }
    }

    fn download(&self) -> anyhow::Result<()> {
        let document = self.state.document().context("nothing has been computed yet")?;
        let bytes = document.to_bytes()?;
        download::save_bytes(&download::download_filename(&self.config.definition), &bytes)
    }

    fn side_panel(&mut self, ctx: &egui::Context) {
        let mut committed = false;
        let mut download_clicked = false;

        egui::SidePanel::left("side_panel")
            .resizable(false)
            .min_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Solar canopy");
                ui.separator();

                for control in &mut self.controls {
                    committed |= control.ui(ui);
                }

                ui.separator();
                for (id, text) in self.state.metrics.display_lines() {
                    ui.label(text).on_hover_text(id);
                }

                ui.separator();
                if self.state.busy {
                    ui.horizontal(|ui| {
                        ui.add(egui::Spinner::new());
                        ui.label("Computing…");
                    });
                }
                if let Some(status) = &self.state.status {
                    ui.colored_label(egui::Color32::LIGHT_RED, status.as_str());
                }

                download_clicked = ui
                    .add_enabled(self.state.download_enabled(), egui::Button::new("Download"))
                    .clicked();
            });

        if committed {
            self.compute();
        }
        if download_clicked {
            if let Err(e) = self.download() {
                log::error!("download failed: {e:#}");
            }
        }
    }

    fn viewport(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        egui::CentralPanel::default().frame(egui::Frame::default()).show(ctx, |ui| {
            let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::drag());

            if self.state.set_viewport(rect.width(), rect.height()) {
                ctx.request_repaint();
            }

            // ───── Interaction ─────
            if response.dragged() {
                let delta = response.drag_delta();
                let (primary, secondary) =
                    ui.input(|i| (i.pointer.primary_down(), i.pointer.secondary_down()));
                if primary {
                    self.state.controls.rotate(delta.x, delta.y);
                } else if secondary {
                    self.state.controls.pan(&self.state.camera, delta.x, delta.y, rect.height());
                }
            }
            if response.hovered() {
                let scroll = ui.input(|i| i.raw_scroll_delta.y);
                if scroll.abs() > 0.0 {
                    self.state.controls.dolly(scroll);
                }
            }
            self.state.controls.update(&mut self.state.camera);

            ui.painter().rect_filled(rect, 0.0, BACKGROUND);

            let Some(gl) = frame.gl() else { return };

            if self.gpu.is_none() && !self.gpu_failed {
                match unsafe { renderer::GpuScene::new(gl) } {
                    Ok(gpu) => self.gpu = Some(Arc::new(gpu)),
                    Err(e) => {
                        log::error!("renderer setup failed: {e}");
                        self.gpu_failed = true;
                    }
                }
            }
            let Some(gpu_arc) = &mut self.gpu else { return };

            // Upload only while we hold the single strong ref; retried next frame otherwise.
            let revision = self.state.scene.revision();
            if let Some(gpu) = Arc::get_mut(gpu_arc) {
                if gpu.revision != Some(revision) {
                    let data = scene::tessellate(&self.state.scene);
                    unsafe { gpu.upload(gl, &data, revision) };
                }
            }

            let camera = &self.state.camera;
            let mvp = camera.projection() * camera.view(&self.state.controls.target);
            let gpu_for_cb = gpu_arc.clone();
            let callback = egui_glow::CallbackFn::new(move |_info, painter| unsafe {
                gpu_for_cb.paint(painter.gl(), mvp);
            });
            ui.painter().add(egui::PaintCallback { rect, callback: Arc::new(callback) });
        });
    }
}

impl eframe::App for SolarCanopyApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        self.drain_completions();
        self.side_panel(ctx);
        self.viewport(ctx, frame);
        // render loop runs continuously, like requestAnimationFrame
        ctx.request_repaint();
    }

    fn on_exit(&mut self, gl: Option<&glow::Context>) {
        if let (Some(gl), Some(gpu)) = (gl, &self.gpu) {
            unsafe { gpu.destroy(gl) };
        }
    }
}

// ── Web entry‑point ──
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    // Redirect `log` macros & panic messages to the browser console
    console_log::init_with_level(log::Level::Debug).ok();
    console_error_panic_hook::set_once();

    let config = AppConfig::for_page().map_err(|e| JsValue::from_str(&format!("{e:#}")))?;

    let canvas = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(CANVAS_ID))
        .ok_or_else(|| JsValue::from_str("canvas element not found"))?
        .dyn_into::<web_sys::HtmlCanvasElement>()?;

    let web_options = eframe::WebOptions { depth_buffer: 24, ..Default::default() };

    eframe::WebRunner::new()
        .start(
            canvas,
            web_options,
            Box::new(|cc| Ok(Box::new(SolarCanopyApp::new(cc, config)))),
        )
        .await?;

    Ok(())
}

// ── Native entry‑point ──
#[cfg(not(target_arch = "wasm32"))]
pub fn run_native() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    log::info!("solving against {}", config.server_base());

    let options = eframe::NativeOptions { depth_buffer: 24, ..Default::default() };
    eframe::run_native(
        "Solar canopy",
        options,
        Box::new(|cc| Ok(Box::new(SolarCanopyApp::new(cc, config)))),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
}

// Executes an async future without blocking the egui thread
#[cfg(not(target_arch = "wasm32"))]
fn execute<F: Future<Output = ()> + Send + 'static>(f: F) {
    std::thread::spawn(move || futures::executor::block_on(f));
}
#[cfg(target_arch = "wasm32")]
fn execute<F: Future<Output = ()> + 'static>(f: F) {
    wasm_bindgen_futures::spawn_local(f);
}
