//! Generation worker and UI-thread polling

use super::App;
use crate::constants::OUTPUT_FILENAME;
use crate::generator::{persist_image, DiffusionBackend, GenerationRequest, TextToImageBackend};
use crate::types::{GenerationOutcome, GenerationPhase, GenerationState};
use eframe::egui;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

impl App {
    /// Kick off one generation on a worker thread.
    ///
    /// The trigger is disabled while a request runs, so at most one request
    /// is in flight; the phase check re-asserts that under the lock.
    pub fn start_generation(&mut self, ctx: &egui::Context) {
        {
            let mut state = self.generation_state.lock().unwrap();
            if state.phase.is_busy() {
                return;
            }
            state.phase = GenerationPhase::LoadingModel;
            state.outcome = None;
            state.started = Some(std::time::Instant::now());
        }
        self.error_message = None;

        let request = GenerationRequest::new(self.prompt.clone(), &self.settings);
        let output_dir = self.settings.output_dir_or_default();
        let state = Arc::clone(&self.generation_state);
        let ctx = ctx.clone();

        info!(
            prompt = %request.prompt,
            model = %request.model_id,
            guidance = request.guidance_scale,
            "Generation requested"
        );
        std::thread::spawn(move || {
            run_generation(&DiffusionBackend, &request, &output_dir, &state, &mut || {
                ctx.request_repaint()
            });
        });
    }

    /// UI-thread side: pick up the worker's result, upload the texture and
    /// collapse the terminal phase back to `Idle`.
    pub fn poll_generation(&mut self, ctx: &egui::Context) {
        let mut state = self.generation_state.lock().unwrap();
        match &state.phase {
            GenerationPhase::Complete => {
                if let Some(outcome) = state.outcome.take() {
                    let size = [outcome.width as usize, outcome.height as usize];
                    self.result_texture = Some(ctx.load_texture(
                        "generated_image",
                        egui::ColorImage::from_rgba_unmultiplied(size, &outcome.rgba),
                        egui::TextureOptions::LINEAR,
                    ));
                    self.result_path = outcome.saved_to;
                    self.result_at = Some(outcome.completed_at);
                    // The image itself survived; only the save failed.
                    self.error_message = outcome.save_error;
                }
                state.phase = GenerationPhase::Idle;
            }
            GenerationPhase::Failed(message) => {
                self.error_message = Some(message.clone());
                state.phase = GenerationPhase::Idle;
            }
            _ => {}
        }
    }
}

/// Drive one request through the backend and publish its progress into the
/// shared state. Runs on the worker thread; `notify` wakes the UI after
/// every state change.
fn run_generation(
    backend: &dyn TextToImageBackend,
    request: &GenerationRequest,
    output_dir: &Path,
    state: &Mutex<GenerationState>,
    notify: &mut dyn FnMut(),
) {
    let started = std::time::Instant::now();
    let result = backend.generate(request, &mut |phase| {
        state.lock().unwrap().phase = phase;
        notify();
    });

    let mut state = state.lock().unwrap();
    match result {
        Ok(image) => {
            // Persisting and display are independent effects: a failed save
            // still hands the image to the UI.
            let (saved_to, save_error) = match persist_image(&image, output_dir, OUTPUT_FILENAME) {
                Ok(path) => {
                    info!(path = %path.display(), "Image saved");
                    (Some(path), None)
                }
                Err(e) => {
                    error!(error = %e, "Failed to persist image");
                    (None, Some(e.to_string()))
                }
            };
            let rgba = image.to_rgba8();
            let (width, height) = (rgba.width(), rgba.height());
            state.outcome = Some(GenerationOutcome {
                rgba: rgba.into_raw(),
                width,
                height,
                saved_to,
                save_error,
                completed_at: chrono::Local::now(),
            });
            state.phase = GenerationPhase::Complete;
            info!(
                elapsed_s = started.elapsed().as_secs_f32(),
                "Generation complete"
            );
        }
        Err(e) => {
            error!(error = %e, "Generation failed");
            state.phase = GenerationPhase::Failed(e.to_string());
        }
    }
    drop(state);
    notify();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerateError;
    use crate::generator::testing::RecordingBackend;
    use crate::settings::Settings;

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest::new(prompt, &Settings::default())
    }

    fn observed_phases(state: &Mutex<GenerationState>, phases: &mut Vec<GenerationPhase>) {
        let phase = state.lock().unwrap().phase.clone();
        if phases.last() != Some(&phase) {
            phases.push(phase);
        }
    }

    #[test]
    fn successful_run_walks_phases_and_publishes_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RecordingBackend::succeeding();
        let state = Mutex::new(GenerationState::default());
        let mut phases = Vec::new();

        run_generation(&backend, &request("a red bicycle"), dir.path(), &state, &mut || {
            observed_phases(&state, &mut phases)
        });

        assert_eq!(
            phases,
            vec![
                GenerationPhase::LoadingModel,
                GenerationPhase::Generating,
                GenerationPhase::Complete,
            ]
        );

        let state = state.lock().unwrap();
        let outcome = state.outcome.as_ref().unwrap();
        assert_eq!(outcome.rgba.len(), (outcome.width * outcome.height * 4) as usize);
        assert!(outcome.save_error.is_none());
        assert_eq!(
            outcome.saved_to.as_deref(),
            Some(dir.path().join(OUTPUT_FILENAME).as_path())
        );

        let recorded = backend.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].prompt, "a red bicycle");
        assert_eq!(recorded[0].guidance_scale, 8.5);
    }

    #[test]
    fn displayed_pixels_equal_persisted_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RecordingBackend::succeeding();
        let state = Mutex::new(GenerationState::default());

        run_generation(&backend, &request("teal square"), dir.path(), &state, &mut || {});

        let state = state.lock().unwrap();
        let outcome = state.outcome.as_ref().unwrap();
        let reloaded = image::open(outcome.saved_to.as_ref().unwrap())
            .unwrap()
            .to_rgba8();
        assert_eq!(reloaded.width(), outcome.width);
        assert_eq!(reloaded.height(), outcome.height);
        assert_eq!(reloaded.into_raw(), outcome.rgba);
    }

    #[test]
    fn backend_failure_sets_failed_phase_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RecordingBackend::failing(GenerateError::ModelLoad {
            model_id: "CompVis/stable-diffusion-v1-4".to_string(),
            reason: "401 Unauthorized".to_string(),
        });
        let state = Mutex::new(GenerationState::default());

        run_generation(&backend, &request("a red bicycle"), dir.path(), &state, &mut || {});

        let state = state.lock().unwrap();
        match &state.phase {
            GenerationPhase::Failed(message) => {
                assert!(message.contains("401 Unauthorized"));
            }
            other => panic!("expected Failed, got busy={}", other.is_busy()),
        }
        assert!(state.outcome.is_none());
        assert!(!dir.path().join(OUTPUT_FILENAME).exists());
    }

    #[test]
    fn save_failure_still_hands_the_image_to_the_ui() {
        // Using a file as the output directory makes create_dir_all fail.
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, b"occupied").unwrap();

        let backend = RecordingBackend::succeeding();
        let state = Mutex::new(GenerationState::default());

        run_generation(&backend, &request("a red bicycle"), &blocker, &state, &mut || {});

        let state = state.lock().unwrap();
        assert_eq!(state.phase, GenerationPhase::Complete);
        let outcome = state.outcome.as_ref().unwrap();
        assert!(outcome.saved_to.is_none());
        assert!(outcome.save_error.is_some());
        assert!(!outcome.rgba.is_empty());
    }

    #[test]
    fn empty_prompt_is_submitted_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RecordingBackend::succeeding();
        let state = Mutex::new(GenerationState::default());

        run_generation(&backend, &request(""), dir.path(), &state, &mut || {});

        let recorded = backend.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].prompt, "");
    }
}
