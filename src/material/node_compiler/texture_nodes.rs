//! Compilers for texture nodes (Image, Environment, Checker, Noise, Gradient).

use anyhow::Result;

use super::super::context::UniformOptions;
use super::super::functions;
use super::super::parser_state::ParserState;
use super::super::registry::{MipmapFilter, SamplerParams, TextureAddressing, TextureFilter, VertexData};
use super::super::shader::Segment;
use super::super::types::TypedExpr;
use super::super::utils::{node_var, sanitize_glsl_ident};
use super::{input_float, input_vec3, is_linked};
use crate::dsl::{GraphContext, Node, parse_bool, parse_str};

/// Procedural coordinates used when a texture's vector input is unconnected.
fn default_coords(state: &ParserState<'_>) -> &'static str {
    match state.context {
        GraphContext::Object => "bposition",
        GraphContext::World => "n",
    }
}

fn texture_coords(state: &mut ParserState<'_>, node: &Node) -> Result<String> {
    if is_linked(state, node, 0) {
        input_vec3(state, node, 0)
    } else {
        Ok(default_coords(state).to_string())
    }
}

/// Sampler state from the node's `interpolation` and `extension` params.
fn sampler_params(node: &Node) -> SamplerParams {
    let addressing = match parse_str(&node.params, "extension").unwrap_or("REPEAT") {
        "EXTEND" | "CLIP" => TextureAddressing::Clamp,
        "MIRROR" => TextureAddressing::Mirror,
        _ => TextureAddressing::Repeat,
    };
    let params = SamplerParams::default().with_addressing(addressing);
    match parse_str(&node.params, "interpolation").unwrap_or("Linear") {
        "Closest" => params.with_filter(TextureFilter::Point, MipmapFilter::NoMipmap),
        "Cubic" | "Smart" => params.with_filter(TextureFilter::Anisotropic, MipmapFilter::Linear),
        _ => params,
    }
}

/// Compile an Image Texture node.
///
/// The texel is fetched once per derivative pass into a `vec4` local in the
/// textures segment, so every consumer of either output reads the same sample.
///
/// # Params
/// - `image`: file name of the bound image, used as the unit's default image
/// - `interpolation`, `extension`: sampler state
/// - `colorspace`: `sRGB` images are converted to linear after the fetch
/// - `projection`: `BOX` samples triplanar instead of by uv
/// - `material_param`: bind the sampler to a per-material parameter
///
/// # Outputs
/// - Color: `store.rgb`
/// - Alpha: `store.a`
pub fn compile_image_texture(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    let store = node_var(&node.id, &format!("store{}", state.pass().suffix()));
    let out = |store: &str| {
        if node.output_index(port) == Some(1) {
            TypedExpr::float(format!("{store}.a"))
        } else {
            TypedExpr::vec3(format!("{store}.rgb"))
        }
    };
    if state.is_parsed(&store) {
        return Ok(out(&store));
    }

    let tex_name = sanitize_glsl_ident(&node.id);
    let material_param = parse_bool(&node.params, "material_param").unwrap_or(false);
    state.con.add_elem("tex", VertexData::Short2Norm);
    state.add_uniform(
        &format!("sampler2D {tex_name}"),
        UniformOptions {
            link: material_param.then(|| node.id.clone()),
            sampler: Some(sampler_params(node)),
            default_image: parse_str(&node.params, "image").map(str::to_string),
            material_param,
            ..UniformOptions::default()
        },
    )?;

    let triplanar = parse_str(&node.params, "projection") == Some("BOX");
    state.mark_parsed(&store);
    let normal = if state.normal_parsed { "TBN[2]" } else { "n" };
    // Locals declared by the uv chain must land in the same segment as the fetch.
    state.with_segment(Segment::Textures, |s| {
        let uv = if is_linked(s, node, 0) {
            input_vec3(s, node, 0)?
        } else if triplanar {
            "vec3(texCoord.xy, 0.0)".to_string()
        } else {
            "texCoord".to_string()
        };
        if triplanar {
            s.add_include("std/mapping.glsl")?;
            s.write(&format!(
                "vec4 {store} = vec4(triplanarMapping({tex_name}, {normal}, {uv}), 0.0);"
            ))?;
        } else {
            s.write(&format!("vec4 {store} = texture({tex_name}, ({uv}).xy);"))?;
        }
        if parse_str(&node.params, "colorspace") == Some("sRGB") {
            s.write(&format!("{store}.rgb = pow({store}.rgb, vec3(2.2));"))?;
        }
        Ok(())
    })?;
    Ok(out(&store))
}

/// Compile an Environment Texture node as an equirectangular lookup along the input direction.
pub fn compile_environment_texture(state: &mut ParserState<'_>, node: &Node, _port: &str) -> Result<TypedExpr> {
    let dir = if is_linked(state, node, 0) {
        input_vec3(state, node, 0)?
    } else {
        "n".to_string()
    };
    state.add_function(functions::ENV_MAP_EQUIRECT)?;
    state.add_uniform(
        "sampler2D envmap",
        UniformOptions {
            sampler: Some(sampler_params(node)),
            default_image: parse_str(&node.params, "image").map(str::to_string),
            ..UniformOptions::default()
        },
    )?;
    Ok(TypedExpr::vec3(format!("texture(envmap, envMapEquirect({dir})).rgb")))
}

pub fn compile_checker_texture(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    let co = texture_coords(state, node)?;
    let scale = input_float(state, node, 3)?;
    if node.output_index(port) == Some(1) {
        state.add_function(functions::TEX_CHECKER_FAC)?;
        return Ok(TypedExpr::float(format!("tex_checker_f({co}, {scale})")));
    }
    let col1 = input_vec3(state, node, 1)?;
    let col2 = input_vec3(state, node, 2)?;
    state.add_function(functions::TEX_CHECKER)?;
    Ok(TypedExpr::vec3(format!("tex_checker({co}, {col1}, {col2}, {scale})")))
}

/// Compile a Noise Texture node.
///
/// Fac is one fractal value-noise sample; Color stacks three samples at offset positions.
pub fn compile_noise_texture(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    for f in [functions::HASH, functions::NOISE, functions::FRACTAL_NOISE, functions::TEX_NOISE] {
        state.add_function(f)?;
    }
    let co = texture_coords(state, node)?;
    let scale = input_float(state, node, 2)?;
    let detail = input_float(state, node, 3)?;
    let distortion = input_float(state, node, 5)?;
    let sample = |offset: &str| format!("tex_noise({co} * {scale}{offset}, {detail}, {distortion})");
    if node.output_index(port) == Some(1) {
        return Ok(TypedExpr::vec3(format!(
            "vec3({}, {}, {})",
            sample(""),
            sample(" + 120.0"),
            sample(" + 168.0")
        )));
    }
    Ok(TypedExpr::float(sample("")))
}

/// Compile a Gradient Texture node.
pub fn compile_gradient_texture(state: &mut ParserState<'_>, node: &Node, port: &str) -> Result<TypedExpr> {
    let co = texture_coords(state, node)?;
    let f = match parse_str(&node.params, "gradient_type").unwrap_or("LINEAR") {
        "LINEAR" => format!("{co}.x"),
        "QUADRATIC" => format!("pow(max({co}.x, 0.0), 2.0)"),
        "EASING" => format!("smoothstep(0.0, 1.0, {co}.x)"),
        "DIAGONAL" => format!("({co}.x + {co}.y) * 0.5"),
        "RADIAL" => format!("atan({co}.y, {co}.x) / 6.28318530718 + 0.5"),
        "QUADRATIC_SPHERE" => format!("pow(max(1.0 - length({co}), 0.0), 2.0)"),
        "SPHERICAL" => format!("max(1.0 - length({co}), 0.0)"),
        other => {
            log::warn!("node `{}` (GradientTexture): unsupported gradient type {other}", node.id);
            "0.0".to_string()
        }
    };
    let fac = format!("clamp({f}, 0.0, 1.0)");
    if node.output_index(port) == Some(1) {
        return Ok(TypedExpr::float(fac));
    }
    Ok(TypedExpr::vec3(format!("vec3({fac})")))
}
