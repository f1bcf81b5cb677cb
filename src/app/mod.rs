//! App module - contains the main application state and logic

mod generation;

use crate::settings::Settings;
use crate::theme;
use crate::types::GenerationState;
use eframe::egui;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ============================================================================
// APP STATE
// ============================================================================

pub struct App {
    pub(crate) prompt: String,
    pub(crate) settings: Settings,
    // Mirrors settings.output_dir for in-place text editing
    pub(crate) output_dir_str: String,
    pub(crate) generation_state: Arc<Mutex<GenerationState>>,
    pub(crate) result_texture: Option<egui::TextureHandle>,
    pub(crate) result_path: Option<PathBuf>,
    pub(crate) result_at: Option<chrono::DateTime<chrono::Local>>,
    pub(crate) error_message: Option<String>,
    pub(crate) logo_texture: Option<egui::TextureHandle>,
    pub(crate) show_settings: bool,
    pub(crate) data_dir: PathBuf,
}

// ============================================================================
// APP INITIALIZATION & HELPERS
// ============================================================================

impl App {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: Settings, data_dir: PathBuf) -> Self {
        // Force dark theme
        cc.egui_ctx.set_theme(egui::Theme::Dark);

        // Add Phosphor icons font
        let mut fonts = egui::FontDefinitions::default();
        egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
        cc.egui_ctx.set_fonts(fonts);

        // Apply theme from theme.rs
        theme::apply_visuals(&cc.egui_ctx);

        let output_dir_str = settings
            .output_dir_or_default()
            .to_string_lossy()
            .to_string();

        Self {
            prompt: String::new(),
            settings,
            output_dir_str,
            generation_state: Arc::new(Mutex::new(GenerationState::default())),
            result_texture: None,
            result_path: None,
            result_at: None,
            error_message: None,
            logo_texture: None,
            show_settings: false,
            data_dir,
        }
    }

    pub fn save_settings(&self) {
        self.settings.save(&self.data_dir);
    }

    /// True while a request is in flight; the Generate trigger is disabled
    /// exactly in this window.
    pub fn is_busy(&self) -> bool {
        self.generation_state.lock().unwrap().phase.is_busy()
    }
}
