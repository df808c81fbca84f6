//! Error Types
//!
//! This module defines the error types used throughout the renderer.
//!
//! # Overview
//!
//! The main error type [`RenderError`] covers all failure modes including:
//! - GPU initialization failures
//! - Shader loading and pipeline creation errors
//! - World persistence errors
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, RenderError>`.
//!
//! Frame-path failures are deliberately *not* represented here: per the
//! orchestrator contract, a frame that cannot complete logs a structured
//! message and returns control so the next iteration can try again.

use thiserror::Error;

/// The main error type for the Verdant renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    // ========================================================================
    // GPU & Rendering Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// The GPU device reported a fatal state. No recovery; the host must
    /// terminate.
    #[error("GPU device lost: {0}")]
    DeviceLost(String),

    /// A shader module could not be loaded from disk.
    #[error("Failed to load shader '{path}': {reason}")]
    ShaderLoadFailed { path: String, reason: String },

    /// A render or compute pipeline could not be created.
    #[error("Failed to create pipeline '{0}'")]
    PipelineCreateFailed(String),

    /// Window system error.
    #[error("Window system error: {0}")]
    WindowError(#[from] raw_window_handle::HandleError),

    /// Event loop error (winit).
    #[cfg(feature = "winit")]
    #[error("Event loop error: {0}")]
    EventLoopError(#[from] winit::error::EventLoopError),

    // ========================================================================
    // World Persistence Errors
    // ========================================================================
    /// I/O failure while reading or writing the world file.
    #[error("World file I/O error: {0}")]
    WorldIo(#[from] std::io::Error),

    /// The world file did not match the expected binary layout.
    #[error("Corrupt world file: {0}")]
    WorldCorrupt(String),
}

/// Convenience alias used by all fallible public APIs.
pub type Result<T> = std::result::Result<T, RenderError>;
