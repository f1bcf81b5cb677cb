#![windows_subsystem = "windows"]
//! Diffusion Desk - Main entry point

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

mod app;
mod constants;
mod error;
mod generator;
mod settings;
mod theme;
mod types;
mod ui;
mod utils;

use app::App;
use constants::{APP_NAME, APP_VERSION};
use eframe::egui;
use std::path::PathBuf;
use tracing::info;
use ui::components;

/// Initialize file logging. Returns a guard that must be held for the app lifetime.
fn init_logging(data_dir: &std::path::Path) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let logs_dir = data_dir.join("logs");
    std::fs::create_dir_all(&logs_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&logs_dir, "diffusion-desk.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,diffusion_desk=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    guard
}

fn main() -> eframe::Result<()> {
    let data_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME);

    std::fs::create_dir_all(&data_dir).ok();

    // Initialize logging - guard must live for entire app lifetime
    let _log_guard = init_logging(&data_dir);

    info!(version = APP_VERSION, "Diffusion Desk starting");

    let settings = settings::Settings::load(&data_dir);

    let mut viewport = egui::ViewportBuilder::default()
        .with_inner_size([1200.0, 800.0])
        .with_min_inner_size([720.0, 540.0])
        .with_title(APP_NAME);

    // Window/taskbar icon rendered from the bundled SVG
    {
        let (rgba, w, h) = utils::rasterize_logo_square(64);
        let icon = egui::IconData {
            rgba,
            width: w,
            height: h,
        };
        viewport = viewport.with_icon(std::sync::Arc::new(icon));
    }

    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        APP_NAME,
        options,
        Box::new(move |cc| Ok(Box::new(App::new(cc, settings, data_dir)))),
    )
}

// ============================================================================
// MAIN UPDATE LOOP & UI RENDERING
// ============================================================================

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_generation(ctx);

        let busy = self.is_busy();
        if busy {
            // Keep the spinner and pulse bar animating between worker wakeups
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }

        self.render_header(ctx);
        self.render_prompt_bar(ctx, busy);
        self.render_status_bar(ctx, busy);
        self.render_central(ctx, busy);

        if self.show_settings {
            self.render_settings_modal(ctx);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        info!("Application shutting down");
        self.save_settings();
    }
}

// ============================================================================
// PANEL RENDERING
// ============================================================================

impl App {
    fn render_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header_panel")
            .frame(
                egui::Frame::new()
                    .fill(theme::BG_BASE)
                    .inner_margin(egui::Margin::symmetric(16, 10)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let texture = self.logo_texture.get_or_insert_with(|| {
                        let (pixels, w, h) = utils::rasterize_logo(96);
                        ctx.load_texture(
                            "logo",
                            egui::ColorImage::from_rgba_unmultiplied(
                                [w as usize, h as usize],
                                &pixels,
                            ),
                            egui::TextureOptions::LINEAR,
                        )
                    });

                    let aspect = texture.size()[0] as f32 / texture.size()[1] as f32;
                    let logo_h = 26.0;
                    ui.image(egui::load::SizedTexture::new(
                        texture.id(),
                        egui::vec2(logo_h * aspect, logo_h),
                    ));

                    ui.add_space(4.0);
                    ui.add(
                        egui::Label::new(
                            egui::RichText::new(APP_NAME)
                                .size(16.0)
                                .strong()
                                .color(theme::TEXT_PRIMARY),
                        )
                        .selectable(false),
                    );
                    ui.add(
                        egui::Label::new(
                            egui::RichText::new(format!("v{APP_VERSION}"))
                                .size(11.0)
                                .color(theme::TEXT_DIM),
                        )
                        .selectable(false),
                    );

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let gear = components::icon_button(ui, egui_phosphor::regular::GEAR, 26.0)
                            .on_hover_text("Settings");
                        if gear.clicked() {
                            self.show_settings = !self.show_settings;
                        }
                    });
                });
            });
    }

    fn render_prompt_bar(&mut self, ctx: &egui::Context, busy: bool) {
        egui::TopBottomPanel::top("prompt_panel")
            .frame(
                egui::Frame::new()
                    .fill(theme::BG_BASE)
                    .inner_margin(egui::Margin::symmetric(16, 8)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.spacing_mut().item_spacing.x = 8.0;
                    let button_width = 110.0;
                    let frame_padding = 16.0 + 2.0; // inner_margin (8*2) + stroke (1*2)
                    let text_width =
                        (ui.available_width() - button_width - 8.0 - frame_padding).max(80.0);

                    // Prompt input styled like a search box
                    let prompt_response = egui::Frame::new()
                        .fill(theme::BG_INPUT)
                        .stroke(egui::Stroke::new(1.0, theme::BORDER_SUBTLE))
                        .corner_radius(theme::RADIUS_DEFAULT)
                        .inner_margin(egui::Margin::symmetric(8, 8))
                        .show(ui, |ui| {
                            ui.spacing_mut().item_spacing.x = 4.0;
                            ui.horizontal(|ui| {
                                ui.add(
                                    egui::Label::new(
                                        egui::RichText::new(egui_phosphor::regular::SPARKLE)
                                            .size(14.0)
                                            .color(theme::TEXT_DIM),
                                    )
                                    .selectable(false),
                                );
                                ui.add(
                                    egui::TextEdit::singleline(&mut self.prompt)
                                        .hint_text("Enter your prompt here")
                                        .frame(false)
                                        .desired_width(text_width),
                                )
                            })
                            .inner
                        })
                        .inner;

                    let submitted = prompt_response.lost_focus()
                        && ui.input(|i| i.key_pressed(egui::Key::Enter));

                    if busy {
                        ui.add_enabled(
                            false,
                            theme::button_disabled(format!(
                                "{}  Generate",
                                egui_phosphor::regular::SPARKLE
                            )),
                        );
                    } else {
                        let generate = ui.add(theme::button_accent(format!(
                            "{}  Generate",
                            egui_phosphor::regular::SPARKLE
                        )));
                        if generate.clicked() || submitted {
                            self.start_generation(ctx);
                        }
                    }
                });
            });
    }

    fn render_status_bar(&mut self, ctx: &egui::Context, busy: bool) {
        egui::TopBottomPanel::bottom("status_panel")
            .frame(
                egui::Frame::new()
                    .fill(theme::BG_ELEVATED)
                    .inner_margin(egui::Margin::symmetric(16, 6)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if busy {
                        let (label, elapsed) = {
                            let state = self.generation_state.lock().unwrap();
                            (
                                state.phase.label(),
                                state.started.map(|s| s.elapsed().as_secs()).unwrap_or(0),
                            )
                        };
                        ui.add(egui::Spinner::new().size(13.0).color(theme::ACCENT));
                        ui.add(
                            egui::Label::new(
                                egui::RichText::new(label).size(12.0).color(theme::TEXT_MUTED),
                            )
                            .selectable(false),
                        );
                        ui.add(
                            egui::Label::new(
                                egui::RichText::new(format!("{elapsed}s"))
                                    .size(12.0)
                                    .color(theme::TEXT_DIM),
                            )
                            .selectable(false),
                        );
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            // Indeterminate: no progress signal from the backend
                            let t = ui.input(|i| i.time);
                            let pulse = ((t * 1.2).sin() * 0.5 + 0.5) as f32;
                            ui.add(
                                egui::ProgressBar::new(pulse)
                                    .desired_width(160.0)
                                    .desired_height(6.0)
                                    .corner_radius(3.0)
                                    .fill(theme::ACCENT),
                            );
                        });
                    } else if let Some(path) = &self.result_path {
                        ui.add(
                            egui::Label::new(
                                egui::RichText::new(egui_phosphor::regular::FLOPPY_DISK)
                                    .size(13.0)
                                    .color(theme::TEXT_MUTED),
                            )
                            .selectable(false),
                        );
                        let mut status = format!("Saved to {}", path.display());
                        if let Some(at) = &self.result_at {
                            status.push_str(&format!(" at {}", components::format_timestamp(at)));
                        }
                        ui.add(
                            egui::Label::new(
                                egui::RichText::new(status).size(12.0).color(theme::TEXT_MUTED),
                            )
                            .selectable(false)
                            .truncate(),
                        );
                    } else {
                        ui.add(
                            egui::Label::new(
                                egui::RichText::new("Ready").size(12.0).color(theme::TEXT_DIM),
                            )
                            .selectable(false),
                        );
                    }
                });
            });
    }

    fn render_central(&mut self, ctx: &egui::Context, busy: bool) {
        egui::CentralPanel::default()
            .frame(
                egui::Frame::new()
                    .fill(theme::BG_BASE)
                    .inner_margin(egui::Margin::same(16)),
            )
            .show(ctx, |ui| {
                if let Some(message) = self.error_message.clone() {
                    components::error_banner(ui, &message);
                    ui.add_space(theme::SPACING_MD);
                }

                if let Some(texture) = &self.result_texture {
                    // Most recent result, scaled to fit but never upscaled
                    let avail = ui.available_rect_before_wrap();
                    let tex_size = texture.size_vec2();
                    let scale = (avail.width() / tex_size.x)
                        .min(avail.height() / tex_size.y)
                        .min(1.0);
                    let image_rect =
                        egui::Rect::from_center_size(avail.center(), tex_size * scale);
                    ui.painter().image(
                        texture.id(),
                        image_rect,
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                } else if busy {
                    let avail = ui.available_size();
                    ui.add_space((avail.y * 0.4).max(0.0));
                    ui.vertical_centered(|ui| {
                        ui.add(egui::Spinner::new().size(32.0).color(theme::ACCENT));
                    });
                } else {
                    let avail = ui.available_size();
                    ui.add_space((avail.y * 0.32).max(0.0));
                    ui.vertical_centered(|ui| {
                        ui.add(
                            egui::Label::new(
                                egui::RichText::new(egui_phosphor::regular::IMAGE)
                                    .size(44.0)
                                    .color(theme::TEXT_DIM),
                            )
                            .selectable(false),
                        );
                        ui.add_space(theme::SPACING_MD);
                        ui.add(
                            egui::Label::new(
                                egui::RichText::new("No image yet")
                                    .size(15.0)
                                    .color(theme::TEXT_MUTED),
                            )
                            .selectable(false),
                        );
                        ui.add(
                            egui::Label::new(
                                egui::RichText::new("Type a prompt and press Generate")
                                    .size(12.0)
                                    .color(theme::TEXT_DIM),
                            )
                            .selectable(false),
                        );
                    });
                }
            });
    }

    // ========================================================================
    // SETTINGS MODAL
    // ========================================================================

    fn render_settings_modal(&mut self, ctx: &egui::Context) {
        let modal_response = egui::Modal::new(egui::Id::new("settings_modal"))
            .backdrop_color(egui::Color32::from_black_alpha(120))
            .frame(theme::modal_frame())
            .show(ctx, |ui| {
                ui.set_width(340.0);

                // Title bar with close button
                ui.horizontal(|ui| {
                    ui.add(
                        egui::Label::new(egui::RichText::new("Settings").size(16.0).strong())
                            .selectable(false),
                    );
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if components::icon_button(ui, egui_phosphor::regular::X, 24.0).clicked() {
                            self.show_settings = false;
                        }
                    });
                });
                ui.add_space(4.0);
                ui.separator();
                ui.add_space(theme::SPACING_SM);

                let mut changed = false;

                // — Model —
                ui.add(
                    egui::Label::new(egui::RichText::new("Model").size(13.0).color(theme::ACCENT))
                        .selectable(false),
                );
                ui.add_space(2.0);
                ui.add(
                    egui::Label::new(
                        egui::RichText::new("Pretrained weights (Hugging Face model id)")
                            .size(11.0)
                            .color(theme::TEXT_DIM),
                    )
                    .selectable(false),
                );
                let field_width = ui.available_width() - 14.0;
                if components::settings_text_field(ui, &mut self.settings.model_id, field_width)
                    .changed()
                {
                    changed = true;
                }
                ui.add_space(4.0);
                ui.add(
                    egui::Label::new(
                        egui::RichText::new("Credential: none, cache, literal:<token> or env:<var>")
                            .size(11.0)
                            .color(theme::TEXT_DIM),
                    )
                    .selectable(false),
                );
                if components::settings_text_field(ui, &mut self.settings.token_source, field_width)
                    .changed()
                {
                    changed = true;
                }

                ui.add_space(theme::SPACING_MD);
                ui.separator();
                ui.add_space(theme::SPACING_SM);

                // — Compute —
                ui.add(
                    egui::Label::new(
                        egui::RichText::new("Compute").size(13.0).color(theme::ACCENT),
                    )
                    .selectable(false),
                );
                ui.add_space(2.0);
                ui.add(
                    egui::Label::new(
                        egui::RichText::new("Precision")
                            .size(11.0)
                            .color(theme::TEXT_DIM),
                    )
                    .selectable(false),
                );
                const DTYPES: [&str; 4] = ["auto", "bf16", "f16", "f32"];
                let mut selected = DTYPES
                    .iter()
                    .position(|d| *d == self.settings.dtype)
                    .unwrap_or(2);
                if theme::option_strip(ui, &DTYPES, &mut selected) {
                    self.settings.dtype = DTYPES[selected].to_string();
                    changed = true;
                }
                ui.add_space(4.0);
                if theme::settings_checkbox(
                    ui,
                    self.settings.offload,
                    "Offload model to CPU memory",
                    true,
                ) {
                    self.settings.offload = !self.settings.offload;
                    changed = true;
                }

                ui.add_space(theme::SPACING_MD);
                ui.separator();
                ui.add_space(theme::SPACING_SM);

                // — Output Folder —
                ui.add(
                    egui::Label::new(
                        egui::RichText::new("Output Folder")
                            .size(13.0)
                            .color(theme::ACCENT),
                    )
                    .selectable(false),
                );
                ui.add_space(2.0);

                let output_dir = self.settings.output_dir_or_default();
                let path_committed = ui
                    .horizontal(|ui| {
                        ui.spacing_mut().item_spacing.x = 4.0;
                        let browse_width = 28.0 + 4.0; // button + spacing
                        let frame_padding = 12.0 + 2.0; // inner_margin (6*2) + stroke (1*2)
                        let text_width =
                            (ui.available_width() - browse_width - frame_padding).max(40.0);
                        let field = components::settings_text_field(
                            ui,
                            &mut self.output_dir_str,
                            text_width,
                        );
                        let browse = components::icon_button(
                            ui,
                            egui_phosphor::regular::FOLDER_OPEN,
                            28.0,
                        );
                        if browse.clicked() || field.double_clicked() {
                            std::fs::create_dir_all(&output_dir).ok();
                            if let Some(path) = rfd::FileDialog::new()
                                .set_directory(&output_dir)
                                .pick_folder()
                            {
                                self.output_dir_str = path.to_string_lossy().to_string();
                                return true;
                            }
                        }
                        field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter))
                    })
                    .inner;

                if path_committed {
                    self.settings.output_dir = Some(self.output_dir_str.clone());
                    changed = true;
                }

                ui.add_space(4.0);
                if ui
                    .add(theme::button(format!(
                        "{}  Open Folder",
                        egui_phosphor::regular::FOLDER_OPEN
                    )))
                    .clicked()
                {
                    let dir = self.settings.output_dir_or_default();
                    std::fs::create_dir_all(&dir).ok();
                    let _ = open::that(&dir);
                }

                if changed {
                    self.save_settings();
                }
            });

        if modal_response.should_close() {
            self.show_settings = false;
        }
    }
}
