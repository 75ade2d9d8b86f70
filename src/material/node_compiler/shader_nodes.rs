//! Compilers for shader nodes. These fill the shading terms of the parser state
//! instead of producing a value.

use anyhow::Result;

use super::super::parser_state::{EmissionType, ParserState, ShadingTerms};
use super::super::utils::{cast_value, node_var};
use super::{compile_named_input, input_float, input_index, input_vec3, is_linked, parse_shader_input};
use crate::dsl::{Node, SocketDefault, SocketType};

/// Route a linked normal input into `n` before the node's terms are read.
fn write_normal(state: &mut ParserState<'_>, node: &Node, id: &str) -> Result<()> {
    if !state.is_frag() {
        return Ok(());
    }
    let Some(idx) = input_index(node, id) else {
        return Ok(());
    };
    if !is_linked(state, node, idx) {
        return Ok(());
    }
    let normal = input_vec3(state, node, idx)?;
    if normal != "n" {
        state.write(&format!("n = {normal};"))?;
    }
    Ok(())
}

/// First socket among `ids` present on the node, converted to `ty`.
fn named_input(state: &mut ParserState<'_>, node: &Node, ids: &[&str], ty: SocketType) -> Result<Option<String>> {
    for id in ids {
        if let Some(v) = compile_named_input(state, node, id)? {
            return Ok(Some(cast_value(v, ty).expr));
        }
    }
    Ok(None)
}

fn named_is_active(state: &ParserState<'_>, node: &Node, id: &str) -> bool {
    let Some(idx) = input_index(node, id) else {
        return false;
    };
    if is_linked(state, node, idx) {
        return true;
    }
    match node.inputs[idx].default.as_ref() {
        Some(SocketDefault::Scalar(v)) => *v != 0.0,
        Some(SocketDefault::Vector(v)) => v.iter().take(3).any(|c| *c != 0.0),
        None => false,
    }
}

/// Combine two sets of terms field by field.
fn blend_terms(a: &ShadingTerms, b: &ShadingTerms, f: impl Fn(&str, &str) -> String) -> ShadingTerms {
    ShadingTerms {
        base_color: f(&a.base_color, &b.base_color),
        roughness: f(&a.roughness, &b.roughness),
        metallic: f(&a.metallic, &b.metallic),
        occlusion: f(&a.occlusion, &b.occlusion),
        specular: f(&a.specular, &b.specular),
        opacity: f(&a.opacity, &b.opacity),
        ior: f(&a.ior, &b.ior),
        emission: f(&a.emission, &b.emission),
        emission_color: f(&a.emission_color, &b.emission_color),
    }
}

/// Keep only the parts of `blended` the driver asked for.
fn assign_terms(state: &mut ParserState<'_>, blended: ShadingTerms) {
    let opacity = if state.flags.opacity {
        blended.opacity.clone()
    } else {
        state.terms.opacity.clone()
    };
    if state.flags.surface {
        state.terms = blended;
    }
    state.terms.opacity = opacity;
}

/// Compile a Principled BSDF node.
///
/// # Inputs
/// Read by socket id: `Base Color`, `Metallic`, `Roughness`, `IOR`, `Alpha`,
/// `Normal`, `Specular IOR Level` (or `Specular`), `Emission Color` (or
/// `Emission`) and `Emission Strength`.
pub fn parse_principled(state: &mut ParserState<'_>, node: &Node) -> Result<()> {
    if state.flags.surface {
        write_normal(state, node, "Normal")?;
        if let Some(col) = named_input(state, node, &["Base Color"], SocketType::Vector)? {
            state.terms.base_color = col;
        }
        if !state.flags.basecol_only {
            if let Some(m) = named_input(state, node, &["Metallic"], SocketType::Value)? {
                state.terms.metallic = m;
            }
            if let Some(r) = named_input(state, node, &["Roughness"], SocketType::Value)? {
                state.terms.roughness = r;
            }
            if let Some(s) = named_input(state, node, &["Specular IOR Level", "Specular"], SocketType::Value)? {
                state.terms.specular = s;
            }
            if let Some(ior) = named_input(state, node, &["IOR"], SocketType::Value)? {
                state.terms.ior = ior;
            }
            let color_id = if input_index(node, "Emission Color").is_some() { "Emission Color" } else { "Emission" };
            let strength_active = named_is_active(state, node, "Emission Strength");
            let has_strength = input_index(node, "Emission Strength").is_some();
            // Older layouts carry only a color socket, which is then the switch.
            let emissive = if has_strength { strength_active } else { named_is_active(state, node, color_id) };
            if emissive {
                let color = named_input(state, node, &[color_id], SocketType::Vector)?
                    .unwrap_or_else(|| "vec3(1.0)".to_string());
                let strength = named_input(state, node, &["Emission Strength"], SocketType::Value)?
                    .unwrap_or_else(|| "1.0".to_string());
                state.terms.emission = strength;
                state.terms.emission_color = color;
                state.raise_emission(EmissionType::Shaded);
            }
        }
    }
    if state.flags.opacity {
        if let Some(alpha) = named_input(state, node, &["Alpha"], SocketType::Value)? {
            state.terms.opacity = alpha;
        }
    }
    Ok(())
}

pub fn parse_diffuse(state: &mut ParserState<'_>, node: &Node) -> Result<()> {
    if state.flags.surface {
        write_normal(state, node, "Normal")?;
        state.terms.base_color = input_vec3(state, node, 0)?;
        state.terms.roughness = input_float(state, node, 1)?;
        state.terms.specular = "0.0".to_string();
    }
    Ok(())
}

pub fn parse_glossy(state: &mut ParserState<'_>, node: &Node) -> Result<()> {
    if state.flags.surface {
        write_normal(state, node, "Normal")?;
        state.terms.base_color = input_vec3(state, node, 0)?;
        state.terms.roughness = input_float(state, node, 1)?;
        state.terms.metallic = "1.0".to_string();
    }
    Ok(())
}

/// Compile an Emission node: the color scaled by strength becomes both the base and the emitted color.
pub fn parse_emission(state: &mut ParserState<'_>, node: &Node) -> Result<()> {
    if state.flags.surface {
        let col = input_vec3(state, node, 0)?;
        let strength = input_float(state, node, 1)?;
        let emitted = format!("({col} * {strength})");
        state.terms.base_color = emitted.clone();
        state.terms.emission_color = emitted;
        state.terms.emission = "1.0".to_string();
        state.raise_emission(EmissionType::Shadeless);
    }
    Ok(())
}

/// Compile a Mix Shader node.
///
/// The factor and its complement are stored in locals, `const` when the factor is
/// unconnected, and every term is blended with them.
pub fn parse_mix_shader(state: &mut ParserState<'_>, node: &Node) -> Result<()> {
    let fac_var = node_var(&node.id, "fac");
    let fac_inv_var = node_var(&node.id, "fac_inv");
    if state.mark_parsed(&fac_var) {
        let prefix = if is_linked(state, node, 0) { "" } else { "const " };
        let fac = input_float(state, node, 0)?;
        state.write(&format!("{prefix}float {fac_var} = {fac};"))?;
        state.write(&format!("{prefix}float {fac_inv_var} = 1.0 - {fac_var};"))?;
    }
    let a = parse_shader_input(state, node, 1)?;
    let b = parse_shader_input(state, node, 2)?;
    let blended = blend_terms(&a, &b, |x, y| format!("({x} * {fac_inv_var} + {y} * {fac_var})"));
    assign_terms(state, blended);
    Ok(())
}

/// Compile an Add Shader node. Colors add up, every other term is averaged.
pub fn parse_add_shader(state: &mut ParserState<'_>, node: &Node) -> Result<()> {
    let a = parse_shader_input(state, node, 0)?;
    let b = parse_shader_input(state, node, 1)?;
    let mut blended = blend_terms(&a, &b, |x, y| format!("({x} * 0.5 + {y} * 0.5)"));
    blended.base_color = format!("({} + {})", a.base_color, b.base_color);
    blended.emission_color = format!("({} + {})", a.emission_color, b.emission_color);
    assign_terms(state, blended);
    Ok(())
}

pub fn parse_transparent(state: &mut ParserState<'_>, node: &Node) -> Result<()> {
    if state.flags.opacity {
        let col = input_vec3(state, node, 0)?;
        state.terms.opacity = format!("(1.0 - {col}.r)");
    }
    Ok(())
}

pub fn parse_holdout(state: &mut ParserState<'_>, _node: &Node) -> Result<()> {
    if state.flags.surface {
        state.terms.occlusion = "0.0".to_string();
    }
    Ok(())
}

/// Compile a Background node, the world's color source.
pub fn parse_background(state: &mut ParserState<'_>, node: &Node) -> Result<()> {
    let col = input_vec3(state, node, 0)?;
    let strength = input_float(state, node, 1)?;
    state.terms.base_color = format!("({col} * {strength})");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;
    use crate::config::CompileOptions;
    use crate::dsl::{NodeKind, nodes_by_id};
    use crate::material::shader::ShaderStage;

    #[test]
    fn principled_reads_sockets_by_id() {
        let bsdf = with_default(test_node("bsdf", NodeKind::PrincipledBsdf), "Base Color", &[1.0, 0.0, 0.0, 1.0]);
        let graph = test_graph(vec![bsdf], vec![]);
        let nodes = nodes_by_id(&graph);
        let options = CompileOptions::default();
        let mut con = test_context(&options);
        let mut state = ParserState::new(&graph, &nodes, &options, &mut con);
        parse_principled(&mut state, &nodes["bsdf"]).unwrap();
        assert_eq!(state.terms.base_color, "vec3(1.0, 0.0, 0.0)");
        assert_eq!(state.terms.roughness, "0.5");
        assert_eq!(state.terms.specular, "0.5");
        assert_eq!(state.terms.emission, "0.0");
        assert_eq!(state.emission_type, EmissionType::NoEmission);
        // Opacity is only read when asked for.
        assert_eq!(state.terms.opacity, "1.0");
    }

    #[test]
    fn principled_emission_raises_emission_type() {
        let bsdf = with_default(test_node("bsdf", NodeKind::PrincipledBsdf), "Emission Strength", &[2.0]);
        let graph = test_graph(vec![bsdf], vec![]);
        let nodes = nodes_by_id(&graph);
        let options = CompileOptions::default();
        let mut con = test_context(&options);
        let mut state = ParserState::new(&graph, &nodes, &options, &mut con);
        parse_principled(&mut state, &nodes["bsdf"]).unwrap();
        assert_eq!(state.terms.emission, "2.0");
        assert_eq!(state.terms.emission_color, "vec3(1.0, 1.0, 1.0)");
        assert_eq!(state.emission_type, EmissionType::Shaded);
    }

    #[test]
    fn linked_normal_is_written_to_n() {
        let graph = test_graph(
            vec![test_node("nor", NodeKind::Normal), test_node("bsdf", NodeKind::DiffuseBsdf)],
            vec![test_connection("nor", "Normal", "bsdf", "Normal")],
        );
        let nodes = nodes_by_id(&graph);
        let options = CompileOptions::default();
        let mut con = test_context(&options);
        let mut state = ParserState::new(&graph, &nodes, &options, &mut con);
        parse_diffuse(&mut state, &nodes["bsdf"]).unwrap();
        assert_eq!(state.terms.specular, "0.0");
        let src = con.get_source(ShaderStage::Frag).unwrap();
        assert!(src.contains("n = vec3(0.0, 0.0, 1.0);"));
    }

    #[test]
    fn mix_shader_blends_both_branches() {
        let graph = test_graph(
            vec![
                test_node("diffuse", NodeKind::DiffuseBsdf),
                test_node("glossy", NodeKind::GlossyBsdf),
                test_node("mix", NodeKind::MixShader),
            ],
            vec![
                test_connection("diffuse", "BSDF", "mix", "Shader"),
                test_connection("glossy", "BSDF", "mix", "Shader_001"),
            ],
        );
        let nodes = nodes_by_id(&graph);
        let options = CompileOptions::default();
        let mut con = test_context(&options);
        let mut state = ParserState::new(&graph, &nodes, &options, &mut con);
        parse_mix_shader(&mut state, &nodes["mix"]).unwrap();
        assert_eq!(state.terms.metallic, "(0.0 * mix_fac_inv + 1.0 * mix_fac)");
        assert_eq!(state.terms.specular, "(0.0 * mix_fac_inv + 1.0 * mix_fac)");
        let src = con.get_source(ShaderStage::Frag).unwrap();
        assert!(src.contains("const float mix_fac = 0.5;"));
        assert!(src.contains("const float mix_fac_inv = 1.0 - mix_fac;"));
    }

    #[test]
    fn add_shader_sums_colors() {
        let graph = test_graph(
            vec![
                test_node("e1", NodeKind::Emission),
                test_node("e2", NodeKind::Emission),
                test_node("add", NodeKind::AddShader),
            ],
            vec![
                test_connection("e1", "Emission", "add", "Shader"),
                test_connection("e2", "Emission", "add", "Shader_001"),
            ],
        );
        let nodes = nodes_by_id(&graph);
        let options = CompileOptions::default();
        let mut con = test_context(&options);
        let mut state = ParserState::new(&graph, &nodes, &options, &mut con);
        parse_add_shader(&mut state, &nodes["add"]).unwrap();
        assert_eq!(
            state.terms.base_color,
            "((vec3(1.0, 1.0, 1.0) * 1.0) + (vec3(1.0, 1.0, 1.0) * 1.0))"
        );
        assert_eq!(state.terms.emission, "(1.0 * 0.5 + 1.0 * 0.5)");
        assert_eq!(state.emission_type, EmissionType::Shadeless);
    }

    #[test]
    fn transparent_only_touches_opacity() {
        let graph = test_graph(vec![test_node("t", NodeKind::TransparentBsdf)], vec![]);
        let nodes = nodes_by_id(&graph);
        let options = CompileOptions::default();
        let mut con = test_context(&options);
        let mut state = ParserState::new(&graph, &nodes, &options, &mut con);
        state.flags.opacity = true;
        parse_transparent(&mut state, &nodes["t"]).unwrap();
        assert_eq!(state.terms.opacity, "(1.0 - vec3(1.0, 1.0, 1.0).r)");
        assert_eq!(state.terms.base_color, ShadingTerms::default().base_color);
    }

    #[test]
    fn unlinked_mix_input_uses_default_terms() {
        let graph = test_graph(vec![test_node("mix", NodeKind::MixShader)], vec![]);
        let nodes = nodes_by_id(&graph);
        let options = CompileOptions::default();
        let mut con = test_context(&options);
        let mut state = ParserState::new(&graph, &nodes, &options, &mut con);
        parse_mix_shader(&mut state, &nodes["mix"]).unwrap();
        assert_eq!(state.terms.occlusion, "(1.0 * mix_fac_inv + 1.0 * mix_fac)");
    }
}
