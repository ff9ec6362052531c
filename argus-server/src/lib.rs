//! # Argus Server
//!
//! Multi-camera PPE violation monitoring service.
//!
//! ## Overview
//!
//! - **Camera fleet supervision**: one capture/detection pipeline per
//!   enabled camera, converged each minute against config and schedules
//! - **Violation pipeline**: YOLO detection with tracking, ROI policy,
//!   per-track cooldown, evidence upload, and database records
//! - **Notifications**: per-event emails and scheduled PDF recaps
//! - **Live preview**: annotated MJPEG stream per camera
//!
//! ## Architecture
//!
//! The server is built on Axum and uses:
//! - PostgreSQL for persistent storage
//! - FFmpeg for RTSP/RTSPS ingest
//! - ONNX Runtime for inference
//! - Supabase storage for evidence objects

/// Server config
pub mod config;

/// Error types and handling
pub mod errors;

/// Live MJPEG preview fan-out
pub mod preview;

/// Route organization
pub mod routes;

/// Shared application state
pub mod state;

pub use routes::create_app;
pub use state::AppState;
