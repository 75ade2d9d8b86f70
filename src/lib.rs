//! Compiles material and world node graphs into GLSL stage sources plus the
//! shader metadata a runtime needs to bind them.

pub mod config;
pub mod dsl;
pub mod error;
pub mod graph;
pub mod material;

pub use config::CompileOptions;
pub use material::{CompiledPass, compile_material, compile_world};
