//! Application constants and configuration

pub const APP_NAME: &str = "Diffusion Desk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pretrained weights loaded when no model is configured.
pub const DEFAULT_MODEL_ID: &str = "CompVis/stable-diffusion-v1-4";

/// How strongly the backend adheres to the prompt. Not user-editable.
pub const GUIDANCE_SCALE: f64 = 8.5;

/// Denoising steps per generation.
pub const NUM_STEPS: usize = 50;

/// Output raster dimensions requested from the backend.
pub const IMAGE_WIDTH: usize = 512;
pub const IMAGE_HEIGHT: usize = 512;

/// Every generation overwrites this file in the output directory.
pub const OUTPUT_FILENAME: &str = "generatedimage.png";
