//! Material compilation: node graphs to per-pass GLSL and shader metadata.
//!
//! This module is organized into several submodules:
//! - `registry`: vertex elements, constants and texture units of one context
//! - `links`: conditional uniform-to-engine-value links
//! - `shader`: per-stage text buffers
//! - `context`: one render pass worth of stages, serialized to `ShaderContextData`
//! - `parser_state`: the state threaded through every translator call
//! - `node_compiler`: dispatch table, graph walker and node translators
//! - `passes`: the mesh, translucent, depth/shadowmap and world drivers
//!
//! The main entry points are:
//! - `compile_material`: every pass of an object material
//! - `compile_world`: the skydome pass of a world graph

pub mod context;
pub mod functions;
pub mod links;
pub mod node_compiler;
pub mod parser_state;
pub mod passes;
pub mod registry;
pub mod shader;
pub mod types;
pub mod utils;

use anyhow::Result;

use crate::config::CompileOptions;
use crate::dsl::MaterialGraph;

pub use context::{PassConfig, ShaderContextData, ShaderData};
pub use passes::CompiledPass;
pub use shader::ShaderStage;

/// Gather the passes that built. A failed pass is logged and left out; its
/// error is returned only when nothing built.
fn collect(name: &str, builds: Vec<(&str, Result<CompiledPass>)>) -> Result<(ShaderData, Vec<CompiledPass>)> {
    let mut passes = Vec::with_capacity(builds.len());
    let mut first_err = None;
    for (pass, build) in builds {
        match build {
            Ok(p) => passes.push(p),
            Err(e) => {
                log::error!("`{name}`: {pass} pass failed: {e:#}");
                first_err.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_err.filter(|_| passes.is_empty()) {
        return Err(e);
    }
    let mut data = ShaderData::new(name);
    data.contexts = passes.iter().map(|p| p.data.clone()).collect();
    Ok((data, passes))
}

/// Compile an object material into its surface, depth and shadowmap passes.
///
/// The surface pass is the translucent one when `options.translucent` is set,
/// the G-buffer mesh pass otherwise.
pub fn compile_material(graph: &MaterialGraph, options: &CompileOptions) -> Result<(ShaderData, Vec<CompiledPass>)> {
    log::debug!("compiling material `{}` ({} nodes)", graph.name, graph.nodes.len());
    let surface = if options.translucent {
        ("translucent", passes::translucent::build_translucent_pass(graph, options))
    } else {
        ("mesh", passes::mesh::build_mesh_pass(graph, options))
    };
    collect(
        &graph.name,
        vec![
            surface,
            ("depth", passes::depth::build_depth_pass(graph, options, false)),
            ("shadowmap", passes::depth::build_depth_pass(graph, options, true)),
        ],
    )
}

/// Compile a world graph into its skydome pass.
pub fn compile_world(graph: &MaterialGraph, options: &CompileOptions) -> Result<(ShaderData, Vec<CompiledPass>)> {
    log::debug!("compiling world `{}` ({} nodes)", graph.name, graph.nodes.len());
    collect(&graph.name, vec![("world", passes::world::build_world_pass(graph, options))])
}
