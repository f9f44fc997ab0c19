//! Image processing in pure Rust, no system libraries.
//!
//! | Concern | Where |
//! |---|---|
//! | **Operation table** | [`ops::OperationKind`]: name → typed argument parser |
//! | **Resize geometry** | [`calculations`]: cover / contain / fill / inside / outside |
//! | **Render** | [`RustEngine`]: `image` crate decode → steps → encode |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Ops**: The closed operation table and argument parsing
//! - **Backend**: [`ImageEngine`] trait + [`RustEngine`]
//! - **Operations**: High-level functions combining the table + engine

pub mod backend;
pub mod calculations;
pub mod operations;
pub mod ops;
mod params;
pub mod rust_backend;

pub use backend::{EngineError, ImageEngine};
pub use operations::{plan_steps, render_operations, resolve_encoding};
pub use ops::OperationKind;
pub use params::{Encoding, Fit, OutputFormat, Quality, RenderParams, Step};
pub use rust_backend::RustEngine;
