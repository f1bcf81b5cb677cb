//! Text-to-image backend binding
//!
//! The model backend is reached through the [`TextToImageBackend`] trait so
//! the worker loop can be driven by a fake in tests. The production
//! implementation wraps `diffusion_rs_core`: a pipeline is constructed per
//! request (nothing is cached across calls, which also releases accelerator
//! memory between generations), the prompt is submitted with the fixed
//! guidance scale, and the first image of the result set is returned.

use crate::constants::{GUIDANCE_SCALE, IMAGE_HEIGHT, IMAGE_WIDTH, NUM_STEPS};
use crate::error::{GenerateError, Result};
use crate::settings::Settings;
use crate::types::GenerationPhase;
use diffusion_rs_core::{
    DiffusionGenerationParams, ModelDType, ModelSource, Offloading, Pipeline, TokenSource,
};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tracing::{info, warn};

/// One generation request, constructed fresh per trigger and not retained.
///
/// Credential and precision ride along as the raw configuration strings;
/// they are parsed at the backend boundary so validation failures surface
/// per-request rather than at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model_id: String,
    pub token_source: String,
    pub dtype: String,
    pub offload: bool,
    pub guidance_scale: f64,
    pub num_steps: usize,
    pub width: usize,
    pub height: usize,
}

impl GenerationRequest {
    /// The prompt is passed through unchanged: no length, emptiness or
    /// character-set validation. Everything else comes from configuration
    /// or fixed application constants.
    pub fn new(prompt: impl Into<String>, settings: &Settings) -> Self {
        Self {
            prompt: prompt.into(),
            model_id: settings.model_id.clone(),
            token_source: settings.token_source.clone(),
            dtype: settings.dtype.clone(),
            offload: settings.offload,
            guidance_scale: GUIDANCE_SCALE,
            num_steps: NUM_STEPS,
            width: IMAGE_WIDTH,
            height: IMAGE_HEIGHT,
        }
    }
}

/// Seam between the worker loop and the generative model.
///
/// `on_phase` is invoked on the calling thread as the request moves through
/// its long-running stages, so the UI can label the busy indicator.
pub trait TextToImageBackend: Send + Sync {
    fn generate(
        &self,
        request: &GenerationRequest,
        on_phase: &mut dyn FnMut(GenerationPhase),
    ) -> Result<DynamicImage>;
}

/// Production backend backed by `diffusion_rs_core`.
pub struct DiffusionBackend;

impl TextToImageBackend for DiffusionBackend {
    fn generate(
        &self,
        request: &GenerationRequest,
        on_phase: &mut dyn FnMut(GenerationPhase),
    ) -> Result<DynamicImage> {
        on_phase(GenerationPhase::LoadingModel);

        let token = parse_token_source(&request.token_source);
        let dtype = parse_dtype(&request.dtype);
        let offloading = request.offload.then_some(Offloading::Full);

        info!(
            model = %request.model_id,
            dtype = %dtype,
            offload = request.offload,
            "Loading model"
        );
        let start = Instant::now();
        let pipeline = Pipeline::load(
            ModelSource::from_model_id(&request.model_id),
            true,
            token,
            None,
            offloading,
            &dtype,
        )
        .map_err(|e| GenerateError::ModelLoad {
            model_id: request.model_id.clone(),
            reason: format!("{e:#}"),
        })?;
        info!(elapsed_s = start.elapsed().as_secs_f32(), "Model loaded");

        on_phase(GenerationPhase::Generating);

        info!(
            prompt = %request.prompt,
            guidance = request.guidance_scale,
            steps = request.num_steps,
            "Submitting prompt"
        );
        let start = Instant::now();
        let images = pipeline
            .forward(
                vec![request.prompt.clone()],
                DiffusionGenerationParams {
                    height: request.height,
                    width: request.width,
                    num_steps: request.num_steps,
                    guidance_scale: request.guidance_scale,
                },
            )
            .map_err(|e| GenerateError::Synthesis {
                reason: format!("{e:#}"),
            })?;
        info!(
            elapsed_s = start.elapsed().as_secs_f32(),
            count = images.len(),
            "Synthesis complete"
        );

        images.into_iter().next().ok_or(GenerateError::EmptyResult)
    }
}

/// Write the image to `<output_dir>/<filename>`, overwriting any prior
/// result. Persisting is independent of display: the caller keeps the
/// in-memory image either way.
pub fn persist_image(image: &DynamicImage, output_dir: &Path, filename: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(filename);
    image
        .save(&path)
        .map_err(|source| GenerateError::Save {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

/// An empty string means the original unauthenticated behavior; anything
/// else uses the backend's own "literal:…"/"env:…"/"cache"/"none" forms.
/// Unparseable values degrade to no credential with a warning.
fn parse_token_source(raw: &str) -> TokenSource {
    let raw = raw.trim();
    if raw.is_empty() {
        return TokenSource::None;
    }
    TokenSource::from_str(raw).unwrap_or_else(|e| {
        warn!(value = raw, error = %e, "Invalid token source, proceeding without credential");
        TokenSource::None
    })
}

fn parse_dtype(raw: &str) -> ModelDType {
    match raw.trim() {
        "auto" => ModelDType::Auto,
        "bf16" => ModelDType::BF16,
        "f16" => ModelDType::F16,
        "f32" => ModelDType::F32,
        other => {
            warn!(value = other, "Unknown dtype, falling back to f16");
            ModelDType::F16
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every request it receives and replies with a solid-color
    /// image, or with a primed failure on the next call.
    pub(crate) struct RecordingBackend {
        pub requests: Mutex<Vec<GenerationRequest>>,
        pub failure: Mutex<Option<GenerateError>>,
        pub image_size: (u32, u32),
    }

    impl RecordingBackend {
        pub fn succeeding() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                failure: Mutex::new(None),
                image_size: (8, 8),
            }
        }

        pub fn failing(error: GenerateError) -> Self {
            Self {
                failure: Mutex::new(Some(error)),
                ..Self::succeeding()
            }
        }

        pub fn recorded(&self) -> Vec<GenerationRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl TextToImageBackend for RecordingBackend {
        fn generate(
            &self,
            request: &GenerationRequest,
            on_phase: &mut dyn FnMut(GenerationPhase),
        ) -> Result<DynamicImage> {
            self.requests.lock().unwrap().push(request.clone());
            on_phase(GenerationPhase::LoadingModel);
            if let Some(err) = self.failure.lock().unwrap().take() {
                return Err(err);
            }
            on_phase(GenerationPhase::Generating);
            let (w, h) = self.image_size;
            Ok(DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
                w,
                h,
                image::Rgba([0x2d, 0xd4, 0xbf, 0xff]),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingBackend;
    use super::*;
    use crate::constants::OUTPUT_FILENAME;

    #[test]
    fn request_carries_fixed_guidance_scale() {
        let req = GenerationRequest::new("a red bicycle", &Settings::default());
        assert_eq!(req.guidance_scale, 8.5);
        assert_eq!(req.model_id, "CompVis/stable-diffusion-v1-4");
        assert_eq!(req.prompt, "a red bicycle");
    }

    #[test]
    fn empty_prompt_passes_through_unchanged() {
        let req = GenerationRequest::new("", &Settings::default());
        assert_eq!(req.prompt, "");

        let backend = RecordingBackend::succeeding();
        let image = backend.generate(&req, &mut |_| {}).unwrap();
        assert!(image.width() > 0);

        let recorded = backend.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].prompt, "");
        assert_eq!(recorded[0].guidance_scale, 8.5);
    }

    #[test]
    fn one_trigger_issues_exactly_one_request() {
        let backend = RecordingBackend::succeeding();
        let req = GenerationRequest::new("a red bicycle", &Settings::default());
        backend.generate(&req, &mut |_| {}).unwrap();
        assert_eq!(backend.recorded(), vec![req]);
    }

    #[test]
    fn token_source_parsing() {
        assert!(matches!(parse_token_source(""), TokenSource::None));
        assert!(matches!(parse_token_source("  "), TokenSource::None));
        assert!(matches!(parse_token_source("none"), TokenSource::None));
        assert!(matches!(parse_token_source("cache"), TokenSource::CacheToken));
        match parse_token_source("literal:hf_abc123") {
            TokenSource::Literal(v) => assert_eq!(v, "hf_abc123"),
            other => panic!("unexpected token source: {other}"),
        }
        match parse_token_source("env:HF_TOKEN") {
            TokenSource::EnvVar(v) => assert_eq!(v, "HF_TOKEN"),
            other => panic!("unexpected token source: {other}"),
        }
        // Garbage degrades to no credential rather than failing the request.
        assert!(matches!(parse_token_source("keyring:foo"), TokenSource::None));
    }

    #[test]
    fn dtype_parsing_defaults_to_reduced_precision() {
        assert_eq!(parse_dtype("auto"), ModelDType::Auto);
        assert_eq!(parse_dtype("bf16"), ModelDType::BF16);
        assert_eq!(parse_dtype("f16"), ModelDType::F16);
        assert_eq!(parse_dtype("f32"), ModelDType::F32);
        assert_eq!(parse_dtype("float64"), ModelDType::F16);
    }

    #[test]
    fn persist_overwrites_previous_result() {
        let dir = tempfile::tempdir().unwrap();
        let first = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            4,
            4,
            image::Rgba([255, 0, 0, 255]),
        ));
        let second = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            4,
            4,
            image::Rgba([0, 255, 0, 255]),
        ));

        let path_a = persist_image(&first, dir.path(), OUTPUT_FILENAME).unwrap();
        let path_b = persist_image(&second, dir.path(), OUTPUT_FILENAME).unwrap();
        assert_eq!(path_a, path_b);

        let reloaded = image::open(&path_b).unwrap().to_rgba8();
        assert_eq!(reloaded.get_pixel(0, 0), &image::Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn persist_creates_missing_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("renders").join("out");
        let image = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            2,
            2,
            image::Rgba([1, 2, 3, 255]),
        ));

        let path = persist_image(&image, &nested, OUTPUT_FILENAME).unwrap();
        assert!(path.exists());
        assert_eq!(path, nested.join(OUTPUT_FILENAME));
    }

    #[test]
    fn primed_failure_surfaces_and_clears() {
        let backend = RecordingBackend::failing(GenerateError::ModelLoad {
            model_id: "CompVis/stable-diffusion-v1-4".to_string(),
            reason: "401 Unauthorized".to_string(),
        });
        let req = GenerationRequest::new("a red bicycle", &Settings::default());

        let err = backend.generate(&req, &mut |_| {}).unwrap_err();
        assert!(err.to_string().contains("401 Unauthorized"));

        // Next request is unaffected by the earlier failure.
        backend.generate(&req, &mut |_| {}).unwrap();
        assert_eq!(backend.recorded().len(), 2);
    }
}
