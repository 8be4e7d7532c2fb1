//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store, session and pool calls into use-case level APIs.
//! - Keep presentation layers decoupled from storage details.

pub mod model_service;
