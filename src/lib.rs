//! Windowed hex viewer for local binary files.
//!
//! Files are read in the background by a chunked loader and browsed as an
//! offset / hex / ASCII grid of which only a small window of rows is ever
//! materialized.

pub mod backend;
pub mod buffer;
pub mod error;
pub mod events;
pub mod file_backend;
pub mod hex_view;
pub mod loader;
pub mod model;
pub mod navigator;
pub mod row_math;
pub mod settings;
pub mod ui;
pub mod viewport;
