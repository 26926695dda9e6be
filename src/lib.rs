//! Holifest core library.
//!
//! Resolves holiday dates across a year range, searches an Immich server for
//! assets captured around each occurrence, and files matches into one album
//! per holiday. The sync runs on a dedicated worker thread and reports
//! progress over a channel; see [`sync::spawn`].

pub mod api;
pub mod calendar;
pub mod config;
pub mod error;
pub mod logging;
pub mod reconcile;
pub mod sync;
