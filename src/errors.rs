//! Error Types
//!
//! This module defines the error types used by the effect system and its
//! collaborators.
//!
//! # Overview
//!
//! [`EffectError`] covers the failure modes of the narrow interfaces the
//! effect system talks to:
//! - Shader source lookup and compilation
//! - GPU object creation and handle resolution
//! - Image loading for texture properties
//!
//! None of these are fatal to a frame. The effect system logs them at the
//! call site and degrades the output instead of propagating them to the
//! caller of [`EffectSystem::process`](crate::effects::EffectSystem::process).
//!
//! ```rust,ignore
//! use myth_effects::errors::{EffectError, Result};
//!
//! fn compile() -> Result<()> {
//!     Err(EffectError::ShaderSourceMissing { key: "blur".into(), stage: "vertex" })
//! }
//! ```

use thiserror::Error;

/// The main error type for the effect system.
#[derive(Error, Debug)]
pub enum EffectError {
    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// The shader source provider has no source for the requested stage.
    #[error("Shader source not found: '{key}' ({stage} stage)")]
    ShaderSourceMissing {
        /// Shader source key
        key: String,
        /// Stage name
        stage: &'static str,
    },

    /// Shader parsing or validation failed.
    #[error("Shader compilation failed for '{label}': {message}")]
    ShaderCompile {
        /// Label of the pipeline being compiled
        label: String,
        /// Compiler diagnostic
        message: String,
    },

    /// The shader declares resources that cannot be mapped onto an effect pass.
    #[error("Shader reflection error: {0}")]
    ShaderReflection(String),

    // ========================================================================
    // GPU Resource Errors
    // ========================================================================
    /// No suitable adapter or device could be acquired.
    #[error("Device request failed: {0}")]
    DeviceRequest(String),

    /// A texture or render target could not be created.
    #[error("Texture creation failed: {0}")]
    TextureCreation(String),

    /// A handle does not refer to a live device object.
    #[error("Unknown {0} handle")]
    UnknownHandle(&'static str),

    // ========================================================================
    // Image Errors
    // ========================================================================
    /// Image decoding error.
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for EffectError {
    fn from(err: image::ImageError) -> Self {
        EffectError::ImageDecode(err.to_string())
    }
}

/// Alias for `Result<T, EffectError>`.
pub type Result<T> = std::result::Result<T, EffectError>;
