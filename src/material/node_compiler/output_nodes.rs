//! Terminal node parsing. Turns the shading terms collected from the surface
//! input into stage locals the pass drivers wire into their outputs.

use anyhow::Result;

use super::super::parser_state::{ParserState, ShadingTerms};
use super::super::shader::ShaderStage;
use super::{input_vec3, is_linked, parse_shader_input};
use crate::config::DisplacementMode;
use crate::dsl::Node;

/// Parse a material output node.
///
/// In the fragment stage this declares `basecol`, `roughness`, `metallic`,
/// `occlusion`, `specular` and `emissionCol` when the surface is parsed, and
/// `opacity` plus `ior` when opacity is. With vertex displacement enabled and a
/// vertex stage present, `disp` is declared in the vertex stage.
///
/// Returns true when a displacement was written.
pub fn parse_material_output(state: &mut ParserState<'_>, output: &Node) -> Result<bool> {
    let flags = state.flags;
    if flags.surface || flags.opacity {
        state.set_stage(ShaderStage::Frag)?;
        let terms = parse_shader_input(state, output, 0)?;
        write_terms(state, &terms)?;
    }

    let displaced = flags.displacement
        && state.options.displacement == DisplacementMode::Vertex
        && state.con.has_stage(ShaderStage::Vert)
        && is_linked(state, output, 2);
    if displaced {
        let prev = state.stage();
        state.set_stage(ShaderStage::Vert)?;
        let disp = input_vec3(state, output, 2)?;
        state.write(&format!("vec3 disp = {disp};"))?;
        state.set_stage(prev)?;
    }
    Ok(displaced)
}

/// Declare the fragment locals for `terms`, limited to what the flags ask for.
fn write_terms(state: &mut ParserState<'_>, terms: &ShadingTerms) -> Result<()> {
    if state.flags.surface {
        state.write(&format!("vec3 basecol = {};", terms.base_color))?;
        state.write(&format!("float roughness = {};", terms.roughness))?;
        state.write(&format!("float metallic = {};", terms.metallic))?;
        state.write(&format!("float occlusion = {};", terms.occlusion))?;
        state.write(&format!("float specular = {};", terms.specular))?;
        state.write(&format!(
            "vec3 emissionCol = {} * {};",
            terms.emission_color, terms.emission
        ))?;
    }
    if state.flags.opacity {
        state.write(&format!("float opacity = {};", terms.opacity))?;
        state.write(&format!("float ior = {};", terms.ior))?;
    }
    Ok(())
}

/// Fragment locals of the default material, for graphs without an output node.
pub fn write_default_terms(state: &mut ParserState<'_>) -> Result<()> {
    state.set_stage(ShaderStage::Frag)?;
    write_terms(state, &ShadingTerms::default())
}

/// Parse a world output node into `fragColor.rgb`.
///
/// An unconnected surface falls back to the engine's background color uniform.
pub fn parse_world_output(state: &mut ParserState<'_>, output: &Node) -> Result<()> {
    state.set_stage(ShaderStage::Frag)?;
    if !is_linked(state, output, 0) {
        state.add_linked_uniform("vec3 backgroundCol", "_backgroundCol")?;
        state.write("fragColor.rgb = backgroundCol;")?;
        return Ok(());
    }
    let terms = parse_shader_input(state, output, 0)?;
    state.write(&format!("fragColor.rgb = {};", terms.base_color))?;
    Ok(())
}
