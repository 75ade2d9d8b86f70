//! Compilers for converter nodes (Math, Clamp, Map Range, Combine/Separate, RGB to BW).

use anyhow::Result;

use super::super::functions;
use super::super::parser_state::ParserState;
use super::super::types::TypedExpr;
use super::super::utils::{node_var, rgb_to_bw, vec3_component};
use super::{input_float, input_vec3};
use crate::dsl::{Node, parse_bool, parse_str};

fn output_position(node: &Node, port: &str) -> usize {
    node.output_index(port).unwrap_or(0)
}

/// Compile a Math node.
///
/// # Inputs
/// Up to three values; which ones are read depends on `operation`.
///
/// # Output
/// A float, clamped to `[0, 1]` when `use_clamp` is set.
pub fn compile_math(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    let op = parse_str(&node.params, "operation").unwrap_or("ADD");
    let a = input_float(state, node, 0)?;
    let b = input_float(state, node, 1)?;
    let needs_c = matches!(op, "MULTIPLY_ADD" | "COMPARE" | "SMOOTH_MIN" | "SMOOTH_MAX" | "WRAP");
    let c = if needs_c { input_float(state, node, 2)? } else { String::new() };

    let out = match op {
        "ADD" => format!("({a} + {b})"),
        "SUBTRACT" => format!("({a} - {b})"),
        "MULTIPLY" => format!("({a} * {b})"),
        "DIVIDE" => format!("({a} / {b})"),
        "MULTIPLY_ADD" => format!("({a} * {b} + {c})"),
        "POWER" => format!("pow({a}, {b})"),
        "LOGARITHM" => format!("log({a})"),
        "SQRT" => format!("sqrt({a})"),
        "INVERSE_SQRT" => format!("inversesqrt({a})"),
        "ABSOLUTE" => format!("abs({a})"),
        "EXPONENT" => format!("exp({a})"),
        "MINIMUM" => format!("min({a}, {b})"),
        "MAXIMUM" => format!("max({a}, {b})"),
        "LESS_THAN" => format!("float({a} < {b})"),
        "GREATER_THAN" => format!("float({a} > {b})"),
        "SIGN" => format!("sign({a})"),
        "COMPARE" => format!("float((abs({a} - {b}) <= max({c}, 1e-5)) ? 1.0 : 0.0)"),
        "SMOOTH_MIN" => {
            let h = format!("(max({c} - abs({a} - {b}), 0.0) / {c})");
            format!("float(({c} != 0.0) ? min({a}, {b}) - {h} * {h} * {h} * {c} * (1.0 / 6.0) : min({a}, {b}))")
        }
        "SMOOTH_MAX" => {
            let h = format!("(max({c} - abs({a} - {b}), 0.0) / {c})");
            format!("float(({c} != 0.0) ? max({a}, {b}) + {h} * {h} * {h} * {c} * (1.0 / 6.0) : max({a}, {b}))")
        }
        "ROUND" => format!("floor({a} + 0.5)"),
        "FLOOR" => format!("floor({a})"),
        "CEIL" => format!("ceil({a})"),
        "TRUNC" => format!("trunc({a})"),
        "FRACT" => format!("fract({a})"),
        "MODULO" => format!("mod({a}, {b})"),
        "WRAP" => {
            state.add_function(functions::WRAP)?;
            format!("wrap({a}, {b}, {c})")
        }
        "SNAP" => format!("floor(({b} != 0.0) ? {a} / {b} : 0.0) * {b}"),
        "PINGPONG" => format!("float(({b} != 0.0) ? abs(fract(({a} - {b}) / ({b} * 2.0)) * {b} * 2.0 - {b}) : 0.0)"),
        "SINE" => format!("sin({a})"),
        "COSINE" => format!("cos({a})"),
        "TANGENT" => format!("tan({a})"),
        "ARCSINE" => format!("asin({a})"),
        "ARCCOSINE" => format!("acos({a})"),
        "ARCTANGENT" => format!("atan({a})"),
        "ARCTAN2" => format!("atan({a}, {b})"),
        "SINH" => format!("sinh({a})"),
        "COSH" => format!("cosh({a})"),
        "TANH" => format!("tanh({a})"),
        "RADIANS" => format!("radians({a})"),
        "DEGREES" => format!("degrees({a})"),
        other => {
            log::warn!("node `{}` (Math): unsupported operation {other}", node.id);
            return Ok(TypedExpr::float("0.0"));
        }
    };

    if parse_bool(&node.params, "use_clamp").unwrap_or(false) {
        return Ok(TypedExpr::float(format!("clamp({out}, 0.0, 1.0)")));
    }
    Ok(TypedExpr::float(out))
}

/// Compile a Clamp node (`MINMAX` or `RANGE`).
pub fn compile_clamp(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    let value = input_float(state, node, 0)?;
    let min = input_float(state, node, 1)?;
    let max = input_float(state, node, 2)?;
    let out = match parse_str(&node.params, "clamp_type").unwrap_or("MINMAX") {
        "MINMAX" => format!("clamp({value}, {min}, {max})"),
        "RANGE" => format!("(({min} < {max}) ? clamp({value}, {min}, {max}) : clamp({value}, {max}, {min}))"),
        other => {
            log::warn!("node `{}` (Clamp): unsupported clamp type {other}", node.id);
            value
        }
    };
    Ok(TypedExpr::float(out))
}

/// Compile a Map Range node.
pub fn compile_map_range(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    let value = input_float(state, node, 0)?;
    let from_min = input_float(state, node, 1)?;
    let from_max = input_float(state, node, 2)?;
    let to_min = input_float(state, node, 3)?;
    let to_max = input_float(state, node, 4)?;

    let out = match parse_str(&node.params, "interpolation_type").unwrap_or("LINEAR") {
        "LINEAR" => {
            state.add_function(functions::MAP_RANGE_LINEAR)?;
            format!("map_range_linear({value}, {from_min}, {from_max}, {to_min}, {to_max})")
        }
        "STEPPED" => {
            let steps = input_float(state, node, 5)?;
            state.add_function(functions::MAP_RANGE_STEPPED)?;
            format!("map_range_stepped({value}, {from_min}, {from_max}, {to_min}, {to_max}, {steps})")
        }
        "SMOOTHSTEP" => {
            state.add_function(functions::MAP_RANGE_SMOOTHSTEP)?;
            format!("map_range_smoothstep({value}, {from_min}, {from_max}, {to_min}, {to_max})")
        }
        "SMOOTHERSTEP" => {
            state.add_function(functions::SAFE_DIVIDE_FLOAT)?;
            state.add_function(functions::MAP_RANGE_SMOOTHERSTEP)?;
            format!("map_range_smootherstep({value}, {from_min}, {from_max}, {to_min}, {to_max})")
        }
        other => {
            log::warn!("node `{}` (MapRange): unsupported interpolation {other}", node.id);
            return Ok(TypedExpr::float("0.0"));
        }
    };

    if parse_bool(&node.params, "clamp").unwrap_or(false) {
        return Ok(TypedExpr::float(format!("clamp({out}, {to_min}, {to_max})")));
    }
    Ok(TypedExpr::float(out))
}

pub fn compile_combine_xyz(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    let x = input_float(state, node, 0)?;
    let y = input_float(state, node, 1)?;
    let z = input_float(state, node, 2)?;
    Ok(TypedExpr::vec3(format!("vec3({x}, {y}, {z})")))
}

pub fn compile_separate_xyz(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    let vec = input_vec3(state, node, 0)?;
    Ok(TypedExpr::float(vec3_component(&vec, output_position(node, port).min(2))))
}

pub fn compile_combine_rgb(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    compile_combine_xyz(state, node, port)
}

pub fn compile_separate_rgb(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    compile_separate_xyz(state, node, port)
}

pub fn compile_combine_hsv(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    state.add_function(functions::HSV_TO_RGB)?;
    let h = input_float(state, node, 0)?;
    let s = input_float(state, node, 1)?;
    let v = input_float(state, node, 2)?;
    Ok(TypedExpr::vec3(format!("hsv_to_rgb(vec3({h}, {s}, {v}))")))
}

/// Compile a Separate HSV node.
///
/// The conversion is stored in a local once per derivative pass and shared by all three outputs.
pub fn compile_separate_hsv(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    state.add_function(functions::RGB_TO_HSV)?;
    let hsv = node_var(&node.id, &format!("hsv{}", state.pass().suffix()));
    if state.mark_parsed(&hsv) {
        let col = input_vec3(state, node, 0)?;
        state.write(&format!("vec3 {hsv} = rgb_to_hsv({col});"))?;
    }
    let swizzle = ["x", "y", "z"][output_position(node, port).min(2)];
    Ok(TypedExpr::float(format!("{hsv}.{swizzle}")))
}

pub fn compile_rgb_to_bw(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    let col = input_vec3(state, node, 0)?;
    Ok(TypedExpr::float(rgb_to_bw(&col)))
}
