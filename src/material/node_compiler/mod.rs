//! Node dispatch table and graph walker.
//!
//! Every node kind maps to a translator and a derivative policy. The walker resolves
//! an input socket to a GLSL expression by following its connection to the producing
//! node and dispatching on that node's kind; translators recurse through the walker
//! for their own inputs.

pub mod color_nodes;
pub mod converter_nodes;
pub mod input_nodes;
pub mod output_nodes;
pub mod shader_nodes;
pub mod texture_nodes;
pub mod vector_nodes;

use anyhow::Result;

use crate::dsl::{Connection, Node, NodeKind, Socket, SocketType, find_node, incoming_connection};
use crate::error::CompileError;
use crate::graph::{resolve_reroutes, upstream_reachable};

use super::parser_state::{CacheKey, DerivativePass, DerivativePolicy, ParserState, ShadingTerms};
use super::types::{TypedExpr, ValueType};
use super::utils::{cast_value, socket_default_expr};

/// Produces the expression for one output socket of a node.
pub type ValueTranslator = fn(&mut ParserState<'_>, &Node, &str) -> Result<TypedExpr>;

/// Writes a surface node's contribution into the shading terms of the parser state.
pub type ShaderTranslator = fn(&mut ParserState<'_>, &Node) -> Result<()>;

#[derive(Clone, Copy)]
pub enum Translator {
    Value(ValueTranslator),
    Shader(ShaderTranslator),
    /// Walking continues from the node's first input.
    Passthrough,
    /// Output nodes and unknown kinds. Reading a value from them degrades to a neutral literal.
    Unsupported,
}

#[derive(Clone, Copy)]
pub struct DispatchEntry {
    pub translator: Translator,
    pub policy: DerivativePolicy,
}

/// The dispatch table.
pub fn dispatch_entry(kind: NodeKind) -> DispatchEntry {
    use DerivativePolicy::{Always, Dynamic, Never};
    use Translator::{Passthrough, Shader, Unsupported, Value};

    let (translator, policy) = match kind {
        NodeKind::OutputMaterial | NodeKind::OutputWorld => (Unsupported, Never),
        NodeKind::Reroute => (Passthrough, Dynamic),

        // Inputs
        NodeKind::Value => (Value(input_nodes::compile_value), Never),
        NodeKind::Rgb => (Value(input_nodes::compile_rgb), Never),
        NodeKind::TexCoord => (Value(input_nodes::compile_tex_coord), Always),
        NodeKind::UvMap => (Value(input_nodes::compile_uv_map), Always),
        NodeKind::Geometry => (Value(input_nodes::compile_geometry), Always),
        NodeKind::CameraData => (Value(input_nodes::compile_camera_data), Always),
        NodeKind::ObjectInfo => (Value(input_nodes::compile_object_info), Never),
        NodeKind::Fresnel => (Value(input_nodes::compile_fresnel), Always),
        NodeKind::LayerWeight => (Value(input_nodes::compile_layer_weight), Always),
        NodeKind::Attribute => (Value(input_nodes::compile_attribute), Always),
        NodeKind::LightPath => (Value(input_nodes::compile_light_path), Never),
        NodeKind::VertexColor => (Value(input_nodes::compile_vertex_color), Dynamic),

        // Converters
        NodeKind::Math => (Value(converter_nodes::compile_math), Dynamic),
        NodeKind::Clamp => (Value(converter_nodes::compile_clamp), Dynamic),
        NodeKind::MapRange => (Value(converter_nodes::compile_map_range), Dynamic),
        NodeKind::CombineXyz => (Value(converter_nodes::compile_combine_xyz), Dynamic),
        NodeKind::SeparateXyz => (Value(converter_nodes::compile_separate_xyz), Dynamic),
        NodeKind::CombineRgb => (Value(converter_nodes::compile_combine_rgb), Dynamic),
        NodeKind::SeparateRgb => (Value(converter_nodes::compile_separate_rgb), Dynamic),
        NodeKind::CombineHsv => (Value(converter_nodes::compile_combine_hsv), Dynamic),
        NodeKind::SeparateHsv => (Value(converter_nodes::compile_separate_hsv), Dynamic),
        NodeKind::RgbToBw => (Value(converter_nodes::compile_rgb_to_bw), Dynamic),
        NodeKind::ColorRamp => (Value(color_nodes::compile_color_ramp), Dynamic),

        // Vectors
        NodeKind::VectorMath => (Value(vector_nodes::compile_vector_math), Dynamic),
        NodeKind::Bump => (Value(vector_nodes::compile_bump), Dynamic),
        NodeKind::Mapping => (Value(vector_nodes::compile_mapping), Dynamic),
        NodeKind::Normal => (Value(vector_nodes::compile_normal), Dynamic),
        NodeKind::NormalMap => (Value(vector_nodes::compile_normal_map), Dynamic),
        NodeKind::VectorTransform => (Value(vector_nodes::compile_vector_transform), Dynamic),
        NodeKind::VectorRotate => (Value(vector_nodes::compile_vector_rotate), Dynamic),
        NodeKind::Displacement => (Value(vector_nodes::compile_displacement), Dynamic),

        // Colors
        NodeKind::MixRgb => (Value(color_nodes::compile_mix_rgb), Dynamic),
        NodeKind::Invert => (Value(color_nodes::compile_invert), Dynamic),
        NodeKind::Gamma => (Value(color_nodes::compile_gamma), Dynamic),
        NodeKind::BrightContrast => (Value(color_nodes::compile_bright_contrast), Dynamic),
        NodeKind::HueSaturation => (Value(color_nodes::compile_hue_saturation), Dynamic),

        // Textures
        NodeKind::ImageTexture => (Value(texture_nodes::compile_image_texture), Dynamic),
        NodeKind::EnvironmentTexture => (Value(texture_nodes::compile_environment_texture), Dynamic),
        NodeKind::CheckerTexture => (Value(texture_nodes::compile_checker_texture), Dynamic),
        NodeKind::NoiseTexture => (Value(texture_nodes::compile_noise_texture), Dynamic),
        NodeKind::GradientTexture => (Value(texture_nodes::compile_gradient_texture), Dynamic),

        // Shaders
        NodeKind::PrincipledBsdf => (Shader(shader_nodes::parse_principled), Dynamic),
        NodeKind::DiffuseBsdf => (Shader(shader_nodes::parse_diffuse), Dynamic),
        NodeKind::GlossyBsdf => (Shader(shader_nodes::parse_glossy), Dynamic),
        NodeKind::Emission => (Shader(shader_nodes::parse_emission), Dynamic),
        NodeKind::MixShader => (Shader(shader_nodes::parse_mix_shader), Dynamic),
        NodeKind::AddShader => (Shader(shader_nodes::parse_add_shader), Dynamic),
        NodeKind::TransparentBsdf => (Shader(shader_nodes::parse_transparent), Dynamic),
        NodeKind::Holdout => (Shader(shader_nodes::parse_holdout), Never),
        NodeKind::Background => (Shader(shader_nodes::parse_background), Dynamic),

        NodeKind::Unsupported => (Unsupported, Dynamic),
    };
    DispatchEntry { translator, policy }
}

/// Connection feeding `port` of `node`, with reroutes on the way skipped.
pub fn linked_connection<'a>(state: &ParserState<'a>, node: &Node, port: &str) -> Option<&'a Connection> {
    let graph = state.graph;
    let conn = incoming_connection(graph, &node.id, port)?;
    resolve_reroutes(graph, state.nodes_by_id, conn)
}

pub fn is_linked(state: &ParserState<'_>, node: &Node, index: usize) -> bool {
    node.input(index)
        .is_some_and(|s| linked_connection(state, node, &s.id).is_some())
}

pub fn input_index(node: &Node, id: &str) -> Option<usize> {
    node.inputs.iter().position(|s| s.id == id)
}

/// Resolve an input socket to an expression of the socket's own type.
///
/// Unconnected sockets yield their static default. A link coming from a shader
/// output carries no value and also falls back to the default.
pub fn compile_socket(state: &mut ParserState<'_>, node: &Node, socket: &Socket) -> Result<TypedExpr> {
    let Some(conn) = linked_connection(state, node, &socket.id) else {
        return Ok(socket_default_expr(socket));
    };
    let nodes = state.nodes_by_id;
    let from = find_node(nodes, &conn.from.node_id)?;
    let from_socket = from
        .output_by_id(&conn.from.port_id)
        .ok_or_else(|| CompileError::UnknownOutputSocket {
            node: from.id.clone(),
            socket: conn.from.port_id.clone(),
        })?;
    if from_socket.socket_type == SocketType::Shader {
        log::warn!(
            "node `{}` ({:?}): shader output `{}` linked into value input `{}`, using its default",
            node.id,
            node.kind,
            from_socket.id,
            socket.id
        );
        return Ok(socket_default_expr(socket));
    }
    let value = compile_output(state, from, &conn.from.port_id)?;
    Ok(cast_value(value, socket.socket_type))
}

/// Input by position.
pub fn compile_input(state: &mut ParserState<'_>, node: &Node, index: usize) -> Result<TypedExpr> {
    match node.input(index) {
        Some(socket) => compile_socket(state, node, socket),
        None => {
            log::warn!("node `{}` ({:?}) has no input {index}", node.id, node.kind);
            Ok(TypedExpr::float("0.0"))
        }
    }
}

/// Input by socket id, `None` when the node has no such socket.
pub fn compile_named_input(state: &mut ParserState<'_>, node: &Node, id: &str) -> Result<Option<TypedExpr>> {
    match node.inputs.iter().find(|s| s.id == id) {
        Some(socket) => compile_socket(state, node, socket).map(Some),
        None => Ok(None),
    }
}

/// Input by position, as a `float` expression.
pub fn input_float(state: &mut ParserState<'_>, node: &Node, index: usize) -> Result<String> {
    let v = compile_input(state, node, index)?;
    Ok(cast_value(v, SocketType::Value).expr)
}

/// Input by position, as a `vec3` expression.
pub fn input_vec3(state: &mut ParserState<'_>, node: &Node, index: usize) -> Result<String> {
    let v = compile_input(state, node, index)?;
    Ok(cast_value(v, SocketType::Vector).expr)
}

/// Expression for `port` of `node` in the active stage and derivative pass.
///
/// Results are memoized per node, socket, stage and pass. Outside the regular pass
/// the node's derivative policy decides whether it is translated again.
pub fn compile_output(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    let key = CacheKey {
        node: node.id.clone(),
        port: port.to_string(),
        stage: state.stage(),
        pass: state.pass(),
    };
    if let Some(v) = state.cache.get(&key) {
        return Ok(v.clone());
    }

    let entry = dispatch_entry(node.kind);
    let result = match (state.pass(), entry.policy) {
        (DerivativePass::Regular, _) => translate(state, node, port, entry.translator)?,
        (_, DerivativePolicy::Never) => regular_value(state, node, port)?,
        (pass, DerivativePolicy::Always) => {
            let r = regular_value(state, node, port)?;
            let derivative = if pass == DerivativePass::Dx { "dFdx" } else { "dFdy" };
            TypedExpr::new(format!("({r} + {derivative}({r}))"), r.ty)
        }
        (_, DerivativePolicy::Dynamic) => {
            if depends_on_varying(state, node) {
                translate(state, node, port, entry.translator)?
            } else {
                regular_value(state, node, port)?
            }
        }
    };
    log::trace!("{:?} `{}`.{port} [{:?}] -> {}", node.kind, node.id, state.pass(), result.expr);
    state.cache.insert(key, result.clone());
    Ok(result)
}

fn regular_value(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    state.with_derivative_pass(DerivativePass::Regular, |s| compile_output(s, node, port))
}

/// Whether any node upstream of `node` varies per fragment.
fn depends_on_varying(state: &mut ParserState<'_>, node: &Node) -> bool {
    if let Some(v) = state.varies.get(&node.id) {
        return *v;
    }
    let nodes = state.nodes_by_id;
    let varies = upstream_reachable(state.graph, &node.id)
        .iter()
        .filter(|id| **id != node.id)
        .filter_map(|id| nodes.get(id))
        .any(|n| dispatch_entry(n.kind).policy == DerivativePolicy::Always);
    state.varies.insert(node.id.clone(), varies);
    varies
}

fn translate(state: &mut ParserState<'_>, node: &Node, port: &str, translator: Translator) -> Result<TypedExpr> {
    let neutral = || {
        let ty = node
            .output_by_id(port)
            .map(|s| ValueType::of_socket(s.socket_type))
            .unwrap_or(ValueType::Float);
        TypedExpr::neutral(ty)
    };
    match translator {
        Translator::Value(f) => f(state, node, port),
        Translator::Passthrough => match node.input(0) {
            Some(socket) => compile_socket(state, node, socket),
            None => Ok(neutral()),
        },
        Translator::Shader(_) => {
            log::warn!("node `{}` ({:?}) is a shader and has no value output `{port}`", node.id, node.kind);
            Ok(neutral())
        }
        Translator::Unsupported => {
            log::warn!("node `{}` ({:?}) is not supported, output `{port}` uses a neutral value", node.id, node.kind);
            Ok(neutral())
        }
    }
}

/// Shading terms produced by the shader node linked into input `index`.
///
/// Unlinked inputs and links from non-shader nodes give the default terms.
pub fn parse_shader_input(state: &mut ParserState<'_>, node: &Node, index: usize) -> Result<ShadingTerms> {
    let Some(socket) = node.input(index) else {
        return Ok(ShadingTerms::default());
    };
    let Some(conn) = linked_connection(state, node, &socket.id) else {
        return Ok(ShadingTerms::default());
    };
    let nodes = state.nodes_by_id;
    let from = find_node(nodes, &conn.from.node_id)?;
    match dispatch_entry(from.kind).translator {
        Translator::Shader(f) => {
            let saved = std::mem::take(&mut state.terms);
            let parsed = f(state, from);
            let terms = std::mem::replace(&mut state.terms, saved);
            parsed?;
            Ok(terms)
        }
        _ => {
            log::warn!(
                "node `{}` ({:?}) linked into shader input `{}` of `{}` is not a shader",
                from.id,
                from.kind,
                socket.id,
                node.id
            );
            Ok(ShadingTerms::default())
        }
    }
}

/// Graph builders shared by the unit tests.
#[cfg(test)]
pub mod test_utils {
    use std::collections::HashMap;

    use crate::config::CompileOptions;
    use crate::dsl::{
        Connection, Endpoint, GraphContext, MaterialGraph, Node, NodeKind, Socket, SocketDefault,
        SocketType,
    };
    use crate::material::context::{PassConfig, ShaderContext};
    use crate::material::shader::ShaderStage;

    /// Create a MaterialGraph for testing.
    pub fn test_graph(nodes: Vec<Node>, connections: Vec<Connection>) -> MaterialGraph {
        MaterialGraph {
            name: "test".to_string(),
            context: GraphContext::Object,
            nodes,
            connections,
            uv_layers: vec!["UVMap".to_string()],
        }
    }

    /// Create a Connection for testing.
    pub fn test_connection(from_node: &str, from_port: &str, to_node: &str, to_port: &str) -> Connection {
        Connection {
            id: format!("{}_{}_{}", from_node, to_node, to_port),
            from: Endpoint {
                node_id: from_node.to_string(),
                port_id: from_port.to_string(),
            },
            to: Endpoint {
                node_id: to_node.to_string(),
                port_id: to_port.to_string(),
            },
        }
    }

    fn socket(id: &str, socket_type: SocketType, default: &[f32]) -> Socket {
        let default = match default {
            [] => None,
            [v] => Some(SocketDefault::Scalar(*v)),
            v => Some(SocketDefault::Vector(v.to_vec())),
        };
        Socket {
            id: id.to_string(),
            name: None,
            socket_type,
            default,
        }
    }

    /// A node carrying the sockets the authoring tool exports for its kind, in order.
    pub fn test_node(id: &str, kind: NodeKind) -> Node {
        use SocketType::{Rgba, Shader, Value, Vector};
        let s = socket;
        let (inputs, outputs): (Vec<Socket>, Vec<Socket>) = match kind {
            NodeKind::OutputMaterial => (
                vec![s("Surface", Shader, &[]), s("Volume", Shader, &[]), s("Displacement", Vector, &[0.0, 0.0, 0.0])],
                vec![],
            ),
            NodeKind::OutputWorld => (vec![s("Surface", Shader, &[]), s("Volume", Shader, &[])], vec![]),
            NodeKind::Reroute => (vec![s("Input", Rgba, &[])], vec![s("Output", Rgba, &[])]),
            NodeKind::Value => (vec![], vec![s("Value", Value, &[0.5])]),
            NodeKind::Rgb => (vec![], vec![s("Color", Rgba, &[0.5, 0.5, 0.5, 1.0])]),
            NodeKind::TexCoord => (
                vec![],
                ["Generated", "Normal", "UV", "Object", "Camera", "Window", "Reflection"]
                    .iter()
                    .map(|n| s(n, Vector, &[]))
                    .collect(),
            ),
            NodeKind::UvMap => (vec![], vec![s("UV", Vector, &[])]),
            NodeKind::Geometry => (
                vec![],
                vec![
                    s("Position", Vector, &[]),
                    s("Normal", Vector, &[]),
                    s("Tangent", Vector, &[]),
                    s("True Normal", Vector, &[]),
                    s("Incoming", Vector, &[]),
                    s("Parametric", Vector, &[]),
                    s("Backfacing", Value, &[]),
                    s("Pointiness", Value, &[]),
                    s("Random Per Island", Value, &[]),
                ],
            ),
            NodeKind::CameraData => (
                vec![],
                vec![s("View Vector", Vector, &[]), s("View Z Depth", Value, &[]), s("View Distance", Value, &[])],
            ),
            NodeKind::ObjectInfo => (
                vec![],
                vec![
                    s("Location", Vector, &[]),
                    s("Color", Rgba, &[]),
                    s("Alpha", Value, &[]),
                    s("Object Index", Value, &[]),
                    s("Material Index", Value, &[]),
                    s("Random", Value, &[]),
                ],
            ),
            NodeKind::Fresnel => (
                vec![s("IOR", Value, &[1.45]), s("Normal", Vector, &[0.0, 0.0, 0.0])],
                vec![s("Fac", Value, &[])],
            ),
            NodeKind::LayerWeight => (
                vec![s("Blend", Value, &[0.5]), s("Normal", Vector, &[0.0, 0.0, 0.0])],
                vec![s("Fresnel", Value, &[]), s("Facing", Value, &[])],
            ),
            NodeKind::Attribute => (
                vec![],
                vec![s("Color", Rgba, &[]), s("Vector", Vector, &[]), s("Fac", Value, &[]), s("Alpha", Value, &[])],
            ),
            NodeKind::LightPath => (
                vec![],
                ["Is Camera Ray", "Is Shadow Ray", "Is Diffuse Ray", "Is Glossy Ray", "Ray Length"]
                    .iter()
                    .map(|n| s(n, Value, &[]))
                    .collect(),
            ),
            NodeKind::VertexColor => (vec![], vec![s("Color", Rgba, &[]), s("Alpha", Value, &[])]),
            NodeKind::Math => (
                vec![s("Value", Value, &[0.5]), s("Value_001", Value, &[0.5]), s("Value_002", Value, &[0.5])],
                vec![s("Value", Value, &[])],
            ),
            NodeKind::Clamp => (
                vec![s("Value", Value, &[1.0]), s("Min", Value, &[0.0]), s("Max", Value, &[1.0])],
                vec![s("Result", Value, &[])],
            ),
            NodeKind::MapRange => (
                vec![
                    s("Value", Value, &[1.0]),
                    s("From Min", Value, &[0.0]),
                    s("From Max", Value, &[1.0]),
                    s("To Min", Value, &[0.0]),
                    s("To Max", Value, &[1.0]),
                    s("Steps", Value, &[4.0]),
                ],
                vec![s("Result", Value, &[])],
            ),
            NodeKind::CombineXyz => (
                vec![s("X", Value, &[0.0]), s("Y", Value, &[0.0]), s("Z", Value, &[0.0])],
                vec![s("Vector", Vector, &[])],
            ),
            NodeKind::SeparateXyz => (
                vec![s("Vector", Vector, &[0.0, 0.0, 0.0])],
                vec![s("X", Value, &[]), s("Y", Value, &[]), s("Z", Value, &[])],
            ),
            NodeKind::CombineRgb => (
                vec![s("R", Value, &[0.0]), s("G", Value, &[0.0]), s("B", Value, &[0.0])],
                vec![s("Image", Rgba, &[])],
            ),
            NodeKind::SeparateRgb => (
                vec![s("Image", Rgba, &[0.8, 0.8, 0.8, 1.0])],
                vec![s("R", Value, &[]), s("G", Value, &[]), s("B", Value, &[])],
            ),
            NodeKind::CombineHsv => (
                vec![s("H", Value, &[0.0]), s("S", Value, &[0.0]), s("V", Value, &[0.0])],
                vec![s("Color", Rgba, &[])],
            ),
            NodeKind::SeparateHsv => (
                vec![s("Color", Rgba, &[0.8, 0.8, 0.8, 1.0])],
                vec![s("H", Value, &[]), s("S", Value, &[]), s("V", Value, &[])],
            ),
            NodeKind::RgbToBw => (vec![s("Color", Rgba, &[0.5, 0.5, 0.5, 1.0])], vec![s("Val", Value, &[])]),
            NodeKind::ColorRamp => (
                vec![s("Fac", Value, &[0.5])],
                vec![s("Color", Rgba, &[]), s("Alpha", Value, &[])],
            ),
            NodeKind::VectorMath => (
                vec![
                    s("Vector", Vector, &[0.0, 0.0, 0.0]),
                    s("Vector_001", Vector, &[0.0, 0.0, 0.0]),
                    s("Vector_002", Vector, &[0.0, 0.0, 0.0]),
                    s("Scale", Value, &[1.0]),
                ],
                vec![s("Vector", Vector, &[]), s("Value", Value, &[])],
            ),
            NodeKind::Bump => (
                vec![
                    s("Strength", Value, &[1.0]),
                    s("Distance", Value, &[1.0]),
                    s("Height", Value, &[1.0]),
                    s("Normal", Vector, &[0.0, 0.0, 0.0]),
                ],
                vec![s("Normal", Vector, &[])],
            ),
            NodeKind::Mapping => (
                vec![
                    s("Vector", Vector, &[0.0, 0.0, 0.0]),
                    s("Location", Vector, &[0.0, 0.0, 0.0]),
                    s("Rotation", Vector, &[0.0, 0.0, 0.0]),
                    s("Scale", Vector, &[1.0, 1.0, 1.0]),
                ],
                vec![s("Vector", Vector, &[])],
            ),
            NodeKind::Normal => (
                vec![s("Normal", Vector, &[0.0, 0.0, 1.0])],
                vec![s("Normal", Vector, &[0.0, 0.0, 1.0]), s("Dot", Value, &[])],
            ),
            NodeKind::NormalMap => (
                vec![s("Strength", Value, &[1.0]), s("Color", Rgba, &[0.5, 0.5, 1.0, 1.0])],
                vec![s("Normal", Vector, &[])],
            ),
            NodeKind::VectorTransform => (vec![s("Vector", Vector, &[0.5, 0.5, 0.5])], vec![s("Vector", Vector, &[])]),
            NodeKind::VectorRotate => (
                vec![
                    s("Vector", Vector, &[0.0, 0.0, 0.0]),
                    s("Center", Vector, &[0.0, 0.0, 0.0]),
                    s("Axis", Vector, &[0.0, 0.0, 1.0]),
                    s("Angle", Value, &[0.0]),
                    s("Rotation", Vector, &[0.0, 0.0, 0.0]),
                ],
                vec![s("Vector", Vector, &[])],
            ),
            NodeKind::Displacement => (
                vec![
                    s("Height", Value, &[0.0]),
                    s("Midlevel", Value, &[0.5]),
                    s("Scale", Value, &[1.0]),
                    s("Normal", Vector, &[0.0, 0.0, 0.0]),
                ],
                vec![s("Displacement", Vector, &[])],
            ),
            NodeKind::MixRgb => (
                vec![
                    s("Fac", Value, &[0.5]),
                    s("Color1", Rgba, &[0.5, 0.5, 0.5, 1.0]),
                    s("Color2", Rgba, &[0.5, 0.5, 0.5, 1.0]),
                ],
                vec![s("Color", Rgba, &[])],
            ),
            NodeKind::Invert => (
                vec![s("Fac", Value, &[1.0]), s("Color", Rgba, &[0.0, 0.0, 0.0, 1.0])],
                vec![s("Color", Rgba, &[])],
            ),
            NodeKind::Gamma => (
                vec![s("Color", Rgba, &[1.0, 1.0, 1.0, 1.0]), s("Gamma", Value, &[1.0])],
                vec![s("Color", Rgba, &[])],
            ),
            NodeKind::BrightContrast => (
                vec![
                    s("Color", Rgba, &[1.0, 1.0, 1.0, 1.0]),
                    s("Bright", Value, &[0.0]),
                    s("Contrast", Value, &[0.0]),
                ],
                vec![s("Color", Rgba, &[])],
            ),
            NodeKind::HueSaturation => (
                vec![
                    s("Hue", Value, &[0.5]),
                    s("Saturation", Value, &[1.0]),
                    s("Value", Value, &[1.0]),
                    s("Fac", Value, &[1.0]),
                    s("Color", Rgba, &[0.8, 0.8, 0.8, 1.0]),
                ],
                vec![s("Color", Rgba, &[])],
            ),
            NodeKind::ImageTexture => (
                vec![s("Vector", Vector, &[])],
                vec![s("Color", Rgba, &[]), s("Alpha", Value, &[])],
            ),
            NodeKind::EnvironmentTexture => (vec![s("Vector", Vector, &[])], vec![s("Color", Rgba, &[])]),
            NodeKind::CheckerTexture => (
                vec![
                    s("Vector", Vector, &[]),
                    s("Color1", Rgba, &[0.8, 0.8, 0.8, 1.0]),
                    s("Color2", Rgba, &[0.2, 0.2, 0.2, 1.0]),
                    s("Scale", Value, &[5.0]),
                ],
                vec![s("Color", Rgba, &[]), s("Fac", Value, &[])],
            ),
            NodeKind::NoiseTexture => (
                vec![
                    s("Vector", Vector, &[]),
                    s("W", Value, &[0.0]),
                    s("Scale", Value, &[5.0]),
                    s("Detail", Value, &[2.0]),
                    s("Roughness", Value, &[0.5]),
                    s("Distortion", Value, &[0.0]),
                ],
                vec![s("Fac", Value, &[]), s("Color", Rgba, &[])],
            ),
            NodeKind::GradientTexture => (
                vec![s("Vector", Vector, &[])],
                vec![s("Color", Rgba, &[]), s("Fac", Value, &[])],
            ),
            NodeKind::PrincipledBsdf => (
                vec![
                    s("Base Color", Rgba, &[0.8, 0.8, 0.8, 1.0]),
                    s("Metallic", Value, &[0.0]),
                    s("Roughness", Value, &[0.5]),
                    s("IOR", Value, &[1.45]),
                    s("Alpha", Value, &[1.0]),
                    s("Normal", Vector, &[0.0, 0.0, 0.0]),
                    s("Specular IOR Level", Value, &[0.5]),
                    s("Emission Color", Rgba, &[1.0, 1.0, 1.0, 1.0]),
                    s("Emission Strength", Value, &[0.0]),
                ],
                vec![s("BSDF", Shader, &[])],
            ),
            NodeKind::DiffuseBsdf | NodeKind::GlossyBsdf => (
                vec![
                    s("Color", Rgba, &[0.8, 0.8, 0.8, 1.0]),
                    s("Roughness", Value, &[0.5]),
                    s("Normal", Vector, &[0.0, 0.0, 0.0]),
                ],
                vec![s("BSDF", Shader, &[])],
            ),
            NodeKind::Emission => (
                vec![s("Color", Rgba, &[1.0, 1.0, 1.0, 1.0]), s("Strength", Value, &[1.0])],
                vec![s("Emission", Shader, &[])],
            ),
            NodeKind::MixShader => (
                vec![s("Fac", Value, &[0.5]), s("Shader", Shader, &[]), s("Shader_001", Shader, &[])],
                vec![s("Shader", Shader, &[])],
            ),
            NodeKind::AddShader => (
                vec![s("Shader", Shader, &[]), s("Shader_001", Shader, &[])],
                vec![s("Shader", Shader, &[])],
            ),
            NodeKind::TransparentBsdf => (vec![s("Color", Rgba, &[1.0, 1.0, 1.0, 1.0])], vec![s("BSDF", Shader, &[])]),
            NodeKind::Holdout => (vec![], vec![s("Holdout", Shader, &[])]),
            NodeKind::Background => (
                vec![s("Color", Rgba, &[0.05, 0.05, 0.05, 1.0]), s("Strength", Value, &[1.0])],
                vec![s("Background", Shader, &[])],
            ),
            NodeKind::Unsupported => (vec![s("Input", Value, &[0.0])], vec![s("Value", Value, &[])]),
        };
        Node {
            id: id.to_string(),
            kind,
            params: HashMap::new(),
            inputs,
            outputs,
        }
    }

    /// `test_node` with parameters.
    pub fn test_node_with(id: &str, kind: NodeKind, params: &[(&str, serde_json::Value)]) -> Node {
        let mut node = test_node(id, kind);
        for (k, v) in params {
            node.params.insert(k.to_string(), v.clone());
        }
        node
    }

    /// Set the static default of input `socket_id`.
    pub fn with_default(mut node: Node, socket_id: &str, default: &[f32]) -> Node {
        if let Some(s) = node.inputs.iter_mut().find(|s| s.id == socket_id) {
            s.default = Some(SocketDefault::Vector(default.to_vec()));
        }
        node
    }

    /// A mesh context with vertex and fragment stages already created.
    pub fn test_context(options: &CompileOptions) -> ShaderContext {
        let mut con = ShaderContext::new("test", PassConfig::default(), options);
        con.make_stage(ShaderStage::Vert);
        con.make_stage(ShaderStage::Frag);
        con
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;
    use crate::config::CompileOptions;
    use crate::dsl::nodes_by_id;
    use crate::material::shader::ShaderStage;

    #[test]
    fn unconnected_inputs_use_defaults() {
        let graph = test_graph(vec![test_node("math", NodeKind::Math)], vec![]);
        let nodes = nodes_by_id(&graph);
        let options = CompileOptions::default();
        let mut con = test_context(&options);
        let mut state = ParserState::new(&graph, &nodes, &options, &mut con);
        let v = compile_input(&mut state, &nodes["math"], 1).unwrap();
        assert_eq!(v, TypedExpr::float("0.5"));
    }

    #[test]
    fn never_policy_reuses_regular_value_in_derivative_passes() {
        let graph = test_graph(
            vec![test_node("val", NodeKind::Value), test_node("math", NodeKind::Math)],
            vec![test_connection("val", "Value", "math", "Value")],
        );
        let nodes = nodes_by_id(&graph);
        let options = CompileOptions::default();
        let mut con = test_context(&options);
        let mut state = ParserState::new(&graph, &nodes, &options, &mut con);
        let math = &nodes["math"];
        let regular = compile_output(&mut state, math, "Value").unwrap();
        let dx = state
            .with_derivative_pass(DerivativePass::Dx, |s| compile_output(s, math, "Value"))
            .unwrap();
        assert_eq!(regular, dx);
    }

    #[test]
    fn always_policy_adds_screen_space_derivative() {
        let graph = test_graph(
            vec![test_node("uv", NodeKind::TexCoord), test_node("sep", NodeKind::SeparateXyz)],
            vec![test_connection("uv", "UV", "sep", "Vector")],
        );
        let nodes = nodes_by_id(&graph);
        let options = CompileOptions::default();
        let mut con = test_context(&options);
        let mut state = ParserState::new(&graph, &nodes, &options, &mut con);
        let sep = &nodes["sep"];
        let dy = state
            .with_derivative_pass(DerivativePass::Dy, |s| compile_output(s, sep, "X"))
            .unwrap();
        assert!(dy.expr.contains("dFdy(vec3(texCoord.x, texCoord.y, 0.0))"));
        assert_eq!(state.pass(), DerivativePass::Regular);
    }

    #[test]
    fn unsupported_nodes_degrade_to_neutral_values() {
        let graph = test_graph(
            vec![test_node("odd", NodeKind::Unsupported), test_node("math", NodeKind::Math)],
            vec![test_connection("odd", "Value", "math", "Value")],
        );
        let nodes = nodes_by_id(&graph);
        let options = CompileOptions::default();
        let mut con = test_context(&options);
        let mut state = ParserState::new(&graph, &nodes, &options, &mut con);
        let v = compile_input(&mut state, &nodes["math"], 0).unwrap();
        assert_eq!(v.expr, "0.0");
    }

    #[test]
    fn unknown_output_socket_is_an_error() {
        let graph = test_graph(
            vec![test_node("val", NodeKind::Value), test_node("math", NodeKind::Math)],
            vec![test_connection("val", "Nope", "math", "Value")],
        );
        let nodes = nodes_by_id(&graph);
        let options = CompileOptions::default();
        let mut con = test_context(&options);
        let mut state = ParserState::new(&graph, &nodes, &options, &mut con);
        let err = compile_input(&mut state, &nodes["math"], 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CompileError>(),
            Some(CompileError::UnknownOutputSocket { .. })
        ));
    }

    #[test]
    fn memoized_outputs_are_per_stage() {
        let graph = test_graph(
            vec![test_node("geo", NodeKind::Geometry), test_node("sep", NodeKind::SeparateXyz)],
            vec![test_connection("geo", "Normal", "sep", "Vector")],
        );
        let nodes = nodes_by_id(&graph);
        let options = CompileOptions::default();
        let mut con = test_context(&options);
        let mut state = ParserState::new(&graph, &nodes, &options, &mut con);
        let sep = &nodes["sep"];
        let frag = compile_output(&mut state, sep, "X").unwrap();
        state.set_stage(ShaderStage::Vert).unwrap();
        let vert = compile_output(&mut state, sep, "X").unwrap();
        assert_eq!(frag.expr, "n.x");
        assert_eq!(vert.expr, "wnormal.x");
    }
}
