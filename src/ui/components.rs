//! Reusable UI components
//!
//! This module contains standalone UI components that can be used
//! throughout the application.

use crate::theme;
use eframe::egui;

/// Square icon-only button with a hover fill.
pub fn icon_button(ui: &mut egui::Ui, icon: &str, size: f32) -> egui::Response {
    let (rect, response) = ui.allocate_exact_size(egui::vec2(size, size), egui::Sense::click());
    if response.hovered() {
        ui.painter().rect_filled(rect, 4.0, theme::BG_SURFACE);
        ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
    }
    ui.painter().text(
        rect.center(),
        egui::Align2::CENTER_CENTER,
        icon,
        egui::FontId::proportional(size * 0.6),
        theme::TEXT_SECONDARY,
    );
    response
}

/// Single-line text input in a bordered field, styled like the prompt box.
pub fn settings_text_field(ui: &mut egui::Ui, value: &mut String, width: f32) -> egui::Response {
    egui::Frame::new()
        .fill(theme::BG_INPUT)
        .stroke(egui::Stroke::new(1.0, theme::BORDER_SUBTLE))
        .corner_radius(theme::RADIUS_DEFAULT)
        .inner_margin(egui::Margin::symmetric(6, 4))
        .show(ui, |ui| {
            ui.add(
                egui::TextEdit::singleline(value)
                    .frame(false)
                    .desired_width(width)
                    .font(egui::FontId::proportional(13.0)),
            )
        })
        .inner
}

/// Inline error banner shown above the result surface.
pub fn error_banner(ui: &mut egui::Ui, message: &str) {
    egui::Frame::new()
        .fill(egui::Color32::from_rgb(0x2a, 0x12, 0x12))
        .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(0x7f, 0x1d, 0x1d)))
        .corner_radius(theme::RADIUS_DEFAULT)
        .inner_margin(egui::Margin::symmetric(12, 8))
        .show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.add(
                    egui::Label::new(
                        egui::RichText::new(egui_phosphor::regular::WARNING)
                            .size(15.0)
                            .color(theme::STATUS_ERROR),
                    )
                    .selectable(false),
                );
                ui.add(
                    egui::Label::new(
                        egui::RichText::new(message)
                            .size(13.0)
                            .color(theme::STATUS_ERROR),
                    )
                    .wrap(),
                );
            });
        });
}

/// Clock-style timestamp for the status bar.
pub fn format_timestamp(at: &chrono::DateTime<chrono::Local>) -> String {
    at.format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_clock_shaped() {
        let formatted = format_timestamp(&chrono::Local::now());
        assert_eq!(formatted.len(), 8);
        assert_eq!(formatted.matches(':').count(), 2);
    }
}
