//! Compilers for color nodes (Mix RGB, Invert, Gamma, Bright/Contrast, Hue/Saturation, Color Ramp).

use anyhow::Result;
use serde::Deserialize;

use super::super::functions;
use super::super::parser_state::{DerivativePass, ParserState};
use super::super::types::TypedExpr;
use super::super::utils::{fmt_f32, node_var, sanitize_glsl_ident, to_vec3, vec3_literal};
use super::{input_float, input_vec3, is_linked};
use crate::dsl::{Node, parse_bool, parse_str};

/// Compile a Mix RGB node.
///
/// A linked factor is stored in a local first so the blend formula can repeat it freely.
pub fn compile_mix_rgb(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    let col1 = input_vec3(state, node, 1)?;
    let col2 = input_vec3(state, node, 2)?;
    let fac = if is_linked(state, node, 0) {
        let var = node_var(&node.id, &format!("fac{}", state.pass().suffix()));
        if !state.is_parsed(&var) {
            let value = input_float(state, node, 0)?;
            state.mark_parsed(&var);
            state.write(&format!("float {var} = {value};"))?;
        }
        var
    } else {
        input_float(state, node, 0)?
    };

    let blend = parse_str(&node.params, "blend_type").unwrap_or("MIX");
    let out = match blend {
        "MIX" => format!("mix({col1}, {col2}, {fac})"),
        "ADD" => format!("mix({col1}, {col1} + {col2}, {fac})"),
        "MULTIPLY" => format!("mix({col1}, {col1} * {col2}, {fac})"),
        "SUBTRACT" => format!("mix({col1}, {col1} - {col2}, {fac})"),
        "SCREEN" => format!(
            "(vec3(1.0) - (vec3(1.0 - {fac}) + {fac} * (vec3(1.0) - {col2})) * (vec3(1.0) - {col1}))"
        ),
        "DIVIDE" => format!("(vec3((1.0 - {fac}) * {col1} + {fac} * {col1} / {col2}))"),
        "DIFFERENCE" => format!("mix({col1}, abs({col1} - {col2}), {fac})"),
        "DARKEN" => format!("mix({col1}, min({col1}, {col2}), {fac})"),
        "LIGHTEN" => format!("mix({col1}, max({col1}, {col2}), {fac})"),
        "SOFT_LIGHT" => format!(
            "((1.0 - {fac}) * {col1} + {fac} * ((vec3(1.0) - {col1}) * {col2} * {col1} + {col1} * (vec3(1.0) - (vec3(1.0) - {col2}) * (vec3(1.0) - {col1}))))"
        ),
        "LINEAR_LIGHT" => format!("({col1} + {fac} * (2.0 * ({col2} - vec3(0.5))))"),
        "OVERLAY" | "DODGE" | "BURN" | "HUE" | "SATURATION" | "VALUE" | "COLOR" => {
            log::debug!("node `{}` (MixRgb): blend type {blend} approximated by MIX", node.id);
            format!("mix({col1}, {col2}, {fac})")
        }
        other => {
            log::warn!("node `{}` (MixRgb): unsupported blend type {other}", node.id);
            return Ok(TypedExpr::vec3(col1));
        }
    };

    if parse_bool(&node.params, "use_clamp").unwrap_or(false) {
        return Ok(TypedExpr::vec3(format!("clamp({out}, vec3(0.0), vec3(1.0))")));
    }
    Ok(TypedExpr::vec3(out))
}

pub fn compile_invert(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    let fac = input_float(state, node, 0)?;
    let col = input_vec3(state, node, 1)?;
    Ok(TypedExpr::vec3(format!("mix({col}, vec3(1.0) - ({col}), {fac})")))
}

pub fn compile_gamma(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    let col = input_vec3(state, node, 0)?;
    let gamma = input_float(state, node, 1)?;
    Ok(TypedExpr::vec3(format!("pow({col}, vec3({gamma}))")))
}

pub fn compile_bright_contrast(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    let col = input_vec3(state, node, 0)?;
    let bright = input_float(state, node, 1)?;
    let contrast = input_float(state, node, 2)?;
    state.add_function(functions::BRIGHT_CONTRAST)?;
    Ok(TypedExpr::vec3(format!("brightcontrast({col}, {bright}, {contrast})")))
}

/// Compile a Hue/Saturation node. A hue of 0.5 leaves the color unchanged.
pub fn compile_hue_saturation(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    state.add_function(functions::HSV_TO_RGB)?;
    state.add_function(functions::RGB_TO_HSV)?;
    state.add_function(functions::HUE_SAT)?;
    let hue = input_float(state, node, 0)?;
    let sat = input_float(state, node, 1)?;
    let val = input_float(state, node, 2)?;
    let fac = input_float(state, node, 3)?;
    let col = input_vec3(state, node, 4)?;
    Ok(TypedExpr::vec3(format!(
        "hue_sat({col}, vec4({hue} - 0.5, {sat}, {val}, 1.0 - {fac}))"
    )))
}

#[derive(Debug, Deserialize)]
struct RampStop {
    position: f32,
    color: Vec<f32>,
}

/// Compile a Color Ramp node.
///
/// # Params
/// - `interpolation`: `CONSTANT` picks the stop to the left of the factor, anything else blends linearly
/// - `elements`: stops as `{ "position": f32, "color": [r, g, b, a] }`, sorted by position
///
/// # Outputs
/// - Color: the ramp color
/// - Alpha: always opaque
pub fn compile_color_ramp(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    if node.output_index(port) == Some(1) {
        return Ok(TypedExpr::float("1.0"));
    }

    let parsed = node
        .params
        .get("elements")
        .map(|v| serde_json::from_value::<Vec<RampStop>>(v.clone()));
    let stops = match parsed {
        Some(Ok(stops)) => stops,
        Some(Err(e)) => {
            log::warn!("node `{}` (ColorRamp): malformed `elements`, using black: {e}", node.id);
            return Ok(TypedExpr::vec3("vec3(0.0)"));
        }
        None => Vec::new(),
    };
    let Some(last) = stops.last() else {
        log::warn!("node `{}` (ColorRamp): no color stops", node.id);
        return Ok(TypedExpr::vec3("vec3(0.0)"));
    };
    if stops.len() == 1 {
        return Ok(TypedExpr::vec3(vec3_literal(to_vec3(&last.color))));
    }

    let upper = sanitize_glsl_ident(&node.id).to_uppercase();
    let cols_var = format!("{upper}_COLS");
    let facs_var = format!("{upper}_FACS");
    let constant = parse_str(&node.params, "interpolation") == Some("CONSTANT");

    // The last stop is repeated so `[i + 1]` stays in bounds.
    if state.pass() == DerivativePass::Regular {
        let cols = stops
            .iter()
            .chain(std::iter::once(last))
            .map(|s| vec3_literal(to_vec3(&s.color)))
            .collect::<Vec<_>>()
            .join(", ");
        state.add_const("vec3", &cols_var, &cols, stops.len() + 1)?;
        if !constant {
            let facs = stops
                .iter()
                .map(|s| fmt_f32(s.position))
                .chain(std::iter::once("1.0".to_string()))
                .collect::<Vec<_>>()
                .join(", ");
            state.add_const("float", &facs_var, &facs, stops.len() + 1)?;
        }
    }

    let suffix = state.pass().suffix();
    let fac_var = node_var(&node.id, &format!("fac{suffix}"));
    let index_var = node_var(&node.id, &format!("i{suffix}"));
    if !state.is_parsed(&fac_var) {
        let fac = input_float(state, node, 0)?;
        state.mark_parsed(&fac_var);
        state.write(&format!("float {fac_var} = {fac};"))?;
        let index = stops[1..]
            .iter()
            .map(|s| format!("(({fac_var} > {}) ? 1 : 0)", fmt_f32(s.position)))
            .collect::<Vec<_>>()
            .join(" + ");
        state.write(&format!("int {index_var} = 0 + {index};"))?;
    }

    if constant {
        return Ok(TypedExpr::vec3(format!("{cols_var}[{index_var}]")));
    }
    Ok(TypedExpr::vec3(format!(
        "mix({cols_var}[{index_var}], {cols_var}[{index_var} + 1], ({fac_var} - {facs_var}[{index_var}]) * (1.0 / ({facs_var}[{index_var} + 1] - {facs_var}[{index_var}])))"
    )))
}
