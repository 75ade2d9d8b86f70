//! Compilers for input nodes (Value, RGB, Texture Coordinate, Geometry, ...).

use anyhow::Result;

use super::super::context::UniformOptions;
use super::super::parser_state::ParserState;
use super::super::registry::{ConstantDefault, VertexData};
use super::super::types::{TypedExpr, ValueType};
use super::super::utils::{cast_value, fmt_f32, sanitize_glsl_ident, socket_default_expr, vec3_literal};
use super::super::functions;
use super::{input_float, input_vec3, is_linked};
use crate::dsl::{GraphContext, Node, SocketDefault, SocketType, parse_bool, parse_str};

fn output_position(node: &Node, port: &str) -> usize {
    node.output_index(port).unwrap_or(0)
}

fn output_type(node: &Node, port: &str) -> SocketType {
    node.output_by_id(port)
        .map(|s| s.socket_type)
        .unwrap_or_default()
}

/// Compile a Value node.
///
/// The value lives in the output socket's default. Nodes flagged as material
/// parameters become a linked uniform instead of a literal.
pub fn compile_value(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    let value = match node.output_by_id(port).and_then(|s| s.default.as_ref()) {
        Some(SocketDefault::Scalar(v)) => *v,
        Some(SocketDefault::Vector(v)) => v.first().copied().unwrap_or(0.0),
        None => 0.0,
    };
    if parse_bool(&node.params, "material_param").unwrap_or(false) {
        let name = format!("param_{}", sanitize_glsl_ident(&node.id));
        state.add_uniform(
            &format!("float {name}"),
            UniformOptions {
                link: Some(node.id.clone()),
                default: Some(ConstantDefault::Float(value)),
                material_param: true,
                ..UniformOptions::default()
            },
        )?;
        return Ok(TypedExpr::float(name));
    }
    Ok(TypedExpr::float(fmt_f32(value)))
}

/// Compile an RGB node.
pub fn compile_rgb(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    let Some(socket) = node.output_by_id(port) else {
        return Ok(TypedExpr::neutral(ValueType::Vec3));
    };
    let literal = socket_default_expr(socket);
    if parse_bool(&node.params, "material_param").unwrap_or(false) {
        let name = format!("param_{}", sanitize_glsl_ident(&node.id));
        let values = match &socket.default {
            Some(SocketDefault::Vector(v)) => v.iter().copied().take(3).collect(),
            Some(SocketDefault::Scalar(v)) => vec![*v; 3],
            None => vec![0.0; 3],
        };
        state.add_uniform(
            &format!("vec3 {name}"),
            UniformOptions {
                link: Some(node.id.clone()),
                default: Some(ConstantDefault::Vector(values)),
                material_param: true,
                ..UniformOptions::default()
            },
        )?;
        return Ok(TypedExpr::vec3(name));
    }
    Ok(literal)
}

/// UV expression for a mesh UV layer, registering the matching vertex element.
fn uv_layer(state: &mut ParserState<'_>, layer: usize) -> TypedExpr {
    if layer == 1 {
        state.con.add_elem("tex1", VertexData::Short2Norm);
        TypedExpr::vec3("vec3(texCoord1.x, texCoord1.y, 0.0)")
    } else {
        state.con.add_elem("tex", VertexData::Short2Norm);
        TypedExpr::vec3("vec3(texCoord.x, texCoord.y, 0.0)")
    }
}

fn uv_layer_index(state: &ParserState<'_>, name: Option<&str>) -> Option<usize> {
    let name = name?;
    state.graph.uv_layers.iter().take(2).position(|l| l == name)
}

/// Compile a Texture Coordinate node.
///
/// # Outputs
/// Generated, Normal, UV, Object, Camera, Window, Reflection, in that order.
pub fn compile_tex_coord(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    let world = state.context == GraphContext::World;
    let out = match output_position(node, port) {
        0 => TypedExpr::vec3("bposition"),
        1 => TypedExpr::vec3("n"),
        2 if world => TypedExpr::vec3("vec3(0.0)"),
        2 => uv_layer(state, 0),
        3 => TypedExpr::vec3("mposition"),
        4 => TypedExpr::vec3("vec3(0.0)"),
        5 => {
            state.add_linked_uniform("vec2 screenSize", "_screenSize")?;
            TypedExpr::vec3("vec3(gl_FragCoord.xy / screenSize, 0.0)")
        }
        6 if world => TypedExpr::vec3("n"),
        _ => TypedExpr::vec3("vec3(0.0)"),
    };
    Ok(out)
}

/// Compile a UV Map node. The second mesh layer maps to `tex1`, anything else to `tex`.
pub fn compile_uv_map(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    if state.context == GraphContext::World {
        return Ok(TypedExpr::vec3("vec3(0.0)"));
    }
    let layer = uv_layer_index(state, parse_str(&node.params, "uv_map")).unwrap_or(0);
    Ok(uv_layer(state, layer))
}

/// Compile a Geometry node.
pub fn compile_geometry(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    let normal = if state.is_frag() { "n" } else { "wnormal" };
    let out = match output_position(node, port) {
        0 => TypedExpr::vec3("wposition"),
        1 | 3 => TypedExpr::vec3(normal),
        2 => TypedExpr::vec3("wtangent"),
        4 => TypedExpr::vec3("vVec"),
        5 => TypedExpr::vec3("mposition"),
        6 if state.context == GraphContext::Object => TypedExpr::float("(1.0 - float(gl_FrontFacing))"),
        _ => TypedExpr::float("0.0"),
    };
    Ok(out)
}

/// Compile a Camera Data node.
pub fn compile_camera_data(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    match output_position(node, port) {
        0 => Ok(TypedExpr::vec3("vVecCam")),
        1 => {
            state.add_include("std/math.glsl")?;
            state.add_linked_uniform("vec2 cameraProj", "_cameraPlaneProj")?;
            Ok(TypedExpr::float("linearize(gl_FragCoord.z, cameraProj)"))
        }
        _ => {
            state.add_linked_uniform("vec3 eye", "_cameraPosition")?;
            Ok(TypedExpr::float("distance(eye, wposition)"))
        }
    }
}

/// Compile an Object Info node.
pub fn compile_object_info(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    let world = state.context == GraphContext::World;
    let out = match output_position(node, port) {
        0 if world => TypedExpr::vec3(vec3_literal([0.0; 3])),
        0 => TypedExpr::vec3("wposition"),
        1 => TypedExpr::vec3(vec3_literal([1.0; 3])),
        2 => TypedExpr::float("0.0"),
        _ if world => TypedExpr::float("0.0"),
        3 => {
            state.add_linked_uniform("float objectInfoIndex", "_objectInfoIndex")?;
            TypedExpr::float("objectInfoIndex")
        }
        4 => {
            state.add_linked_uniform("float objectInfoMaterialIndex", "_objectInfoMaterialIndex")?;
            TypedExpr::float("objectInfoMaterialIndex")
        }
        _ => {
            state.add_linked_uniform("float objectInfoRandom", "_objectInfoRandom")?;
            TypedExpr::float("objectInfoRandom")
        }
    };
    Ok(out)
}

/// `dot(N, V)` for nodes with an optional normal input at `index`.
fn dot_nv(state: &mut ParserState<'_>, node: &Node, index: usize) -> Result<String> {
    if is_linked(state, node, index) {
        let normal = input_vec3(state, node, index)?;
        Ok(format!("dot({normal}, vVec)"))
    } else {
        Ok("dotNV".to_string())
    }
}

/// Compile a Fresnel node.
pub fn compile_fresnel(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    state.add_function(functions::FRESNEL)?;
    let ior = input_float(state, node, 0)?;
    let dotnv = dot_nv(state, node, 1)?;
    Ok(TypedExpr::float(format!("fresnel({ior}, {dotnv})")))
}

/// Compile a Layer Weight node.
///
/// # Outputs
/// - Fresnel: fresnel term with an IOR derived from the blend factor
/// - Facing: `1 - pow(dot(N, V), blend)` like the authoring tool's preview
pub fn compile_layer_weight(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    let blend = input_float(state, node, 0)?;
    let dotnv = dot_nv(state, node, 1)?;
    if output_position(node, port) == 0 {
        state.add_function(functions::FRESNEL)?;
        return Ok(TypedExpr::float(format!("fresnel(1.0 / (1.0 - {blend}), {dotnv})")));
    }
    Ok(TypedExpr::float(format!("(1.0 - pow({dotnv}, ({blend} < 0.5) ? 2.0 * {blend} : 0.5 / (1.0 - {blend})))")))
}

/// Compile an Attribute node.
///
/// `time` reads the engine clock; names of the first two mesh UV layers read
/// texture coordinates; anything else reads the vertex color.
pub fn compile_attribute(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    let out_type = output_type(node, port);
    let is_alpha = output_position(node, port) == 3;
    let name = parse_str(&node.params, "attribute_name").unwrap_or("");

    if name == "time" {
        state.add_linked_uniform("float time", "_time")?;
        if is_alpha {
            return Ok(TypedExpr::float("1.0"));
        }
        return Ok(cast_value(TypedExpr::float("time"), out_type));
    }
    if is_alpha {
        return Ok(TypedExpr::float("1.0"));
    }
    if state.context == GraphContext::World {
        return Ok(cast_value(TypedExpr::float("0.0"), out_type));
    }
    if let Some(layer) = uv_layer_index(state, Some(name)) {
        let uv = uv_layer(state, layer);
        return Ok(cast_value(uv, out_type));
    }
    state.con.add_elem("col", VertexData::Short4Norm);
    Ok(cast_value(TypedExpr::vec3("vcolor"), out_type))
}

/// Compile a Light Path node. Only camera rays are traced, so every other ray flag is zero.
pub fn compile_light_path(_state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    let name = node.output_by_id(port).map(|s| s.id.as_str()).unwrap_or("");
    let out = match name {
        "Is Camera Ray" | "Ray Length" => "1.0",
        _ => "0.0",
    };
    Ok(TypedExpr::float(out))
}

/// Compile a Vertex Color node.
pub fn compile_vertex_color(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    if output_position(node, port) == 1 {
        return Ok(TypedExpr::float("1.0"));
    }
    state.con.add_elem("col", VertexData::Short4Norm);
    Ok(TypedExpr::vec3("vcolor"))
}
