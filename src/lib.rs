#![warn(missing_docs)]
//! Vigil is a detection monitoring service: it counts detections reported by
//! an external recognition pipeline, fans newly counted ones out to display,
//! audio, archive and Telegram channels, and accepts live reconfiguration
//! over a small TCP command protocol.

pub mod cmd;
pub mod config;
pub mod display;
pub mod engine;
pub mod http_client;
pub mod models;
pub mod notification;
pub mod persistence;
pub mod providers;
pub mod remote;
pub mod supervisor;
