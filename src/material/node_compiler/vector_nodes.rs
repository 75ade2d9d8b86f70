//! Compilers for vector nodes (Vector Math, Bump, Mapping, Normal Map, ...).

use anyhow::Result;

use super::super::functions;
use super::super::parser_state::{DerivativePass, ParserState};
use super::super::registry::VertexData;
use super::super::shader::{Segment, ShaderStage};
use super::super::types::TypedExpr;
use super::super::utils::{node_var, to_vec3, vec3_literal};
use super::{input_float, input_vec3, is_linked};
use crate::dsl::{Node, SocketDefault, SocketType, parse_bool, parse_str};

fn output_type(node: &Node, port: &str) -> SocketType {
    node.output_by_id(port)
        .map(|s| s.socket_type)
        .unwrap_or_default()
}

fn input_default(node: &Node, index: usize) -> [f32; 3] {
    match node.input(index).and_then(|s| s.default.as_ref()) {
        Some(SocketDefault::Scalar(v)) => [*v; 3],
        Some(SocketDefault::Vector(v)) => to_vec3(v),
        None => [0.0; 3],
    }
}

/// True when input `index` is linked or its default differs from `neutral`.
fn input_is_active(state: &ParserState<'_>, node: &Node, index: usize, neutral: [f32; 3]) -> bool {
    is_linked(state, node, index) || input_default(node, index) != neutral
}

/// Compile a Vector Math node.
///
/// # Output
/// The `Vector` output carries the component-wise operations, the `Value`
/// output the scalar ones (dot product, distance, length).
pub fn compile_vector_math(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    let op = parse_str(&node.params, "operation").unwrap_or("ADD");
    let a = input_vec3(state, node, 0)?;
    let b = input_vec3(state, node, 1)?;

    if output_type(node, port) != SocketType::Vector {
        let out = match op {
            "DOT_PRODUCT" => format!("dot({a}, {b})"),
            "DISTANCE" => format!("distance({a}, {b})"),
            "LENGTH" => format!("length({a})"),
            other => {
                log::warn!("node `{}` (VectorMath): unsupported value operation {other}", node.id);
                "0.0".to_string()
            }
        };
        return Ok(TypedExpr::float(out));
    }

    let out = match op {
        "ADD" => format!("({a} + {b})"),
        "SUBTRACT" => format!("({a} - {b})"),
        "MULTIPLY" => format!("({a} * {b})"),
        "DIVIDE" => {
            state.add_function(functions::SAFE_DIVIDE)?;
            format!("safe_divide({a}, {b})")
        }
        "NORMALIZE" => format!("normalize({a})"),
        "SCALE" => {
            let scale = input_float(state, node, 3)?;
            format!("({a} * {scale})")
        }
        "REFLECT" => format!("reflect({a}, normalize({b}))"),
        "PROJECT" => {
            state.add_function(functions::PROJECT)?;
            format!("project({a}, {b})")
        }
        "CROSS_PRODUCT" => format!("cross({a}, {b})"),
        "SINE" => format!("sin({a})"),
        "COSINE" => format!("cos({a})"),
        "TANGENT" => format!("tan({a})"),
        "MODULO" => format!("mod({a}, {b})"),
        "FRACTION" => format!("fract({a})"),
        "SNAP" => {
            state.add_function(functions::SAFE_DIVIDE)?;
            state.add_function(functions::SNAP)?;
            format!("snap({a}, {b})")
        }
        "WRAP" => {
            let c = input_vec3(state, node, 2)?;
            state.add_function(functions::WRAP)?;
            state.add_function(functions::WRAP_VEC3)?;
            format!("wrap({a}, {b}, {c})")
        }
        "CEIL" => format!("ceil({a})"),
        "FLOOR" => format!("floor({a})"),
        "MAXIMUM" => format!("max({a}, {b})"),
        "MINIMUM" => format!("min({a}, {b})"),
        "ABSOLUTE" => format!("abs({a})"),
        other => {
            log::warn!("node `{}` (VectorMath): unsupported vector operation {other}", node.id);
            a
        }
    };
    Ok(TypedExpr::vec3(out))
}

/// Compile a Bump node.
///
/// The height input is evaluated in the regular pass and again under the dx and dy
/// passes; the differences tilt the normal. When neither derivative sample differs
/// from the regular one the height does not vary on screen and `n` is returned as is.
pub fn compile_bump(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    if !state.is_frag() {
        log::warn!(
            "node `{}` (Bump): not supported in the {} stage, using the unperturbed normal",
            node.id,
            state.stage()
        );
        return Ok(TypedExpr::vec3("n"));
    }

    let strength = input_float(state, node, 0)?;
    let height = input_float(state, node, 2)?;
    let height_dx = state.with_derivative_pass(DerivativePass::Dx, |s| input_float(s, node, 2))?;
    let height_dy = state.with_derivative_pass(DerivativePass::Dy, |s| input_float(s, node, 2))?;

    if height_dx == height && height_dy == height {
        return Ok(TypedExpr::vec3("n"));
    }

    let tangent = format!("dFdx(wposition) + n * ({height_dx} - {height})");
    let bitangent = format!("dFdy(wposition) + n * ({height_dy} - {height})");
    let mut bitangent_first = state.options.graphics_api.flips_y_derivative();
    if parse_bool(&node.params, "invert").unwrap_or(false) {
        bitangent_first = !bitangent_first;
    }
    let (first, second) = if bitangent_first {
        (bitangent, tangent)
    } else {
        (tangent, bitangent)
    };
    Ok(TypedExpr::vec3(format!(
        "normalize(mix(n, normalize(cross({first}, {second})), {strength}))"
    )))
}

/// Compile a Mapping node.
///
/// `POINT` and `VECTOR` apply scale, rotation, then location; `TEXTURE` applies
/// the inverse transform in reverse order. Inputs left at their identity value
/// are skipped.
pub fn compile_mapping(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    let vector_type = parse_str(&node.params, "vector_type").unwrap_or("POINT");
    let mut out = if is_linked(state, node, 0) {
        input_vec3(state, node, 0)?
    } else {
        vec3_literal(input_default(node, 0))
    };
    if vector_type == "NORMAL" {
        log::warn!("node `{}` (Mapping): unsupported vector type NORMAL", node.id);
        return Ok(TypedExpr::vec3(out));
    }
    let texture = vector_type == "TEXTURE";

    let location = input_is_active(state, node, 1, [0.0; 3])
        .then(|| input_vec3(state, node, 1))
        .transpose()?;
    let rotation = input_is_active(state, node, 2, [0.0; 3])
        .then(|| input_vec3(state, node, 2))
        .transpose()?;
    let scale = input_is_active(state, node, 3, [1.0; 3])
        .then(|| input_vec3(state, node, 3))
        .transpose()?;

    let apply_scale = |out: String| match &scale {
        Some(s) if texture => format!("({out} / {s})"),
        Some(s) => format!("({out} * {s})"),
        None => out,
    };
    let apply_location = |out: String| match &location {
        Some(l) if texture => format!("({out} - {l})"),
        Some(l) => format!("({out} + {l})"),
        None => out,
    };

    out = if texture { apply_location(out) } else { apply_scale(out) };

    if let Some(rot) = &rotation {
        let var = node_var(&node.id, &format!("rotation{}", state.pass().suffix()));
        if state.mark_parsed(&var) {
            let r = if texture { rot.clone() } else { format!("-{rot}") };
            state.write(&format!(
                "mat3 {var}X = mat3(1.0, 0.0, 0.0, 0.0, cos(({r}).x), sin(({r}).x), 0.0, -sin(({r}).x), cos(({r}).x));"
            ))?;
            state.write(&format!(
                "mat3 {var}Y = mat3(cos(({r}).y), 0.0, -sin(({r}).y), 0.0, 1.0, 0.0, sin(({r}).y), 0.0, cos(({r}).y));"
            ))?;
            state.write(&format!(
                "mat3 {var}Z = mat3(cos(({r}).z), sin(({r}).z), 0.0, -sin(({r}).z), cos(({r}).z), 0.0, 0.0, 0.0, 1.0);"
            ))?;
        }
        out = format!("({out} * {var}X * {var}Y * {var}Z)");
    }

    out = if texture { apply_scale(out) } else { apply_location(out) };
    Ok(TypedExpr::vec3(out))
}

/// Compile a Normal node.
///
/// # Outputs
/// - Normal: the direction stored on the node
/// - Dot: dot product of that direction with the input normal
pub fn compile_normal(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    let direction = match node.output(0).and_then(|s| s.default.as_ref()) {
        Some(SocketDefault::Vector(v)) => vec3_literal(to_vec3(v)),
        _ => vec3_literal([0.0, 0.0, 1.0]),
    };
    if node.output_index(port) == Some(1) {
        let other = input_vec3(state, node, 0)?;
        return Ok(TypedExpr::float(format!("dot({direction}, {other})")));
    }
    Ok(TypedExpr::vec3(direction))
}

/// Rewrite `n` from a tangent-space normal map color, once per fragment stage.
///
/// The code goes to the normal segment so every later use of `n` sees the mapped normal.
pub fn parse_normal_map_color(
    state: &mut ParserState<'_>,
    node: &Node,
    color: usize,
    strength: Option<usize>,
) -> Result<()> {
    if state.flags.basecol_only || state.normal_parsed || !is_linked(state, node, color) {
        return Ok(());
    }
    state.normal_parsed = true;
    state.with_segment(Segment::Normal, |s| {
        let col = input_vec3(s, node, color)?;
        s.write(&format!("vec3 texn = ({col}) * 2.0 - 1.0;"))?;
        s.write("texn.y = -texn.y;")?;
        if s.mark_parsed("TBN") {
            if s.options.export_tangents {
                s.con.add_elem("tang", VertexData::Short4Norm);
                s.write("mat3 TBN = mat3(normalize(wtangent), normalize(cross(n, wtangent)), n);")?;
            } else {
                s.add_include("std/normals.glsl")?;
                s.con.add_elem("tex", VertexData::Short2Norm);
                s.write("mat3 TBN = cotangentFrame(n, -vVec, texCoord);")?;
            }
        }
        s.write("n = TBN * normalize(texn);")?;
        if let Some(idx) = strength {
            let k = input_float(s, node, idx)?;
            if k != "1.0" {
                s.write(&format!("n.xy *= {k};"))?;
                s.write("n = normalize(n);")?;
            }
        }
        Ok(())
    })
}

/// Compile a Normal Map node. The mapped normal replaces `n`, which is what the node returns.
pub fn compile_normal_map(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    match state.stage() {
        ShaderStage::Frag => {
            parse_normal_map_color(state, node, 1, Some(0))?;
            Ok(TypedExpr::vec3("n"))
        }
        ShaderStage::Tese => Ok(TypedExpr::vec3(input_vec3(state, node, 1)?)),
        stage => {
            log::warn!("node `{}` (NormalMap): not supported in the {stage} stage", node.id);
            Ok(TypedExpr::vec3("wnormal"))
        }
    }
}

/// Compile a Vector Transform node.
///
/// World and object space coincide for the normals and directions the
/// compiler works with, so the vector passes through.
pub fn compile_vector_transform(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    Ok(TypedExpr::vec3(input_vec3(state, node, 0)?))
}

/// Compile a Vector Rotate node.
pub fn compile_vector_rotate(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    let vector = input_vec3(state, node, 0)?;
    let center = input_vec3(state, node, 1)?;
    let axis = input_vec3(state, node, 2)?;
    let angle = input_float(state, node, 3)?;
    let rotation = input_vec3(state, node, 4)?;
    let invert = parse_bool(&node.params, "invert").unwrap_or(false);
    let angle = if invert { format!("-{angle}") } else { angle };

    state.add_function(functions::ROTATE_AROUND_AXIS)?;
    let around = |axis: &str| {
        format!("(rotate_around_axis({vector} - {center}, {axis}, {angle}) + {center})")
    };
    let out = match parse_str(&node.params, "rotation_type").unwrap_or("AXIS_ANGLE") {
        "AXIS_ANGLE" => format!(
            "((length({axis}) != 0.0) ? rotate_around_axis({vector} - {center}, normalize({axis}), {angle}) + {center} : {vector})"
        ),
        "X_AXIS" => around("vec3(1.0, 0.0, 0.0)"),
        "Y_AXIS" => around("vec3(0.0, 1.0, 0.0)"),
        "Z_AXIS" => around("vec3(0.0, 0.0, 1.0)"),
        "EULER_XYZ" => {
            state.add_function(functions::EULER_TO_MAT3)?;
            let m = if invert {
                format!("transpose(euler_to_mat3({rotation}))")
            } else {
                format!("euler_to_mat3({rotation})")
            };
            format!("({m} * ({vector} - {center}) + {center})")
        }
        other => {
            log::warn!("node `{}` (VectorRotate): unsupported rotation type {other}", node.id);
            vector.clone()
        }
    };
    Ok(TypedExpr::vec3(out))
}

/// Compile a Displacement node into a scalar offset along the surface normal, splatted to a vector.
pub fn compile_displacement(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    let height = input_float(state, node, 0)?;
    let midlevel = input_float(state, node, 1)?;
    let scale = input_float(state, node, 2)?;
    Ok(TypedExpr::vec3(format!("(vec3({height} - {midlevel}) * {scale})")))
}
