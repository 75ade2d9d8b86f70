use anyhow::Result;

use super::super::context::{BlendFactor, BlendOperation, BlendState, PassConfig, ShaderContext, UniformOptions};
use super::super::node_compiler::output_nodes::{parse_material_output, write_default_terms};
use super::super::parser_state::ParserState;
use super::super::shader::ShaderStage;
use super::super::utils::fmt_f32;
use super::{CompiledPass, wire_varyings, write_normal_varying, write_vertex_position, write_vertex_projection};
use crate::config::CompileOptions;
use crate::dsl::{MaterialGraph, NodeKind, nodes_by_id};
use crate::error::CompileError;
use crate::graph::output_node;

/// Additive color, alpha revealage kept in the destination alpha.
fn accumulate_blend() -> BlendState {
    BlendState {
        blend_source: BlendFactor::BlendOne,
        blend_destination: BlendFactor::BlendOne,
        blend_operation: BlendOperation::Add,
        alpha_blend_source: Some(BlendFactor::BlendZero),
        alpha_blend_destination: Some(BlendFactor::InverseSourceAlpha),
        alpha_blend_operation: Some(BlendOperation::Add),
    }
}

/// Build the forward translucent pass for weighted blended order-independent transparency.
///
/// The surface is parsed together with its opacity and lit by the single
/// directional light the engine binds, with the background color as ambient.
///
/// # Outputs
/// - `fragColor[0]`: premultiplied color scaled by the depth weight, plus alpha
/// - `fragColor[1]`: the weighted alpha in red
pub fn build_translucent_pass(graph: &MaterialGraph, options: &CompileOptions) -> Result<CompiledPass> {
    let config = PassConfig {
        depth_write: false,
        blend: Some(accumulate_blend()),
        ..PassConfig::named("translucent")
    };
    let mut con = ShaderContext::new(&graph.name, config, options);
    con.make_stage(ShaderStage::Vert);
    con.make_stage(ShaderStage::Frag);

    con.add_uniform(ShaderStage::Vert, "mat4 WVP", UniformOptions::link("_worldViewProjectionMatrix"))?;
    write_vertex_position(&mut con)?;
    write_normal_varying(&mut con, options.two_sided)?;

    let nodes = nodes_by_id(graph);
    let displaced = {
        let mut state = ParserState::new(graph, &nodes, options, &mut con);
        state.flags.opacity = true;
        match output_node(graph, NodeKind::OutputMaterial) {
            Some(output) => parse_material_output(&mut state, output)?,
            None => {
                log::warn!("{}, using the default material", CompileError::NoOutputNode(graph.name.clone()));
                write_default_terms(&mut state)?;
                false
            }
        }
    };

    wire_varyings(&mut con)?;
    write_vertex_projection(&mut con, "WVP", displaced)?;
    let vert = con.stage_mut(ShaderStage::Vert)?;
    vert.add_out("vec4 wvpposition");
    vert.write("wvpposition = gl_Position;");

    con.add_uniform(ShaderStage::Frag, "vec3 lightColor", UniformOptions::link("_lightColor"))?;
    con.add_uniform(ShaderStage::Frag, "vec3 lightDir", UniformOptions::link("_lightDirection"))?;
    con.add_uniform(ShaderStage::Frag, "vec3 backgroundCol", UniformOptions::link("_backgroundCol"))?;
    let frag = con.stage_mut(ShaderStage::Frag)?;
    frag.add_in("vec4 wvpposition");
    frag.add_out("vec4 fragColor[2]");
    if let Some(threshold) = options.discard_opacity {
        frag.write(&format!("if (opacity < {}) discard;", fmt_f32(threshold)));
    }
    frag.write("vec3 direct = basecol * max(dot(n, lightDir), 0.0);");
    frag.write("vec3 indirect = basecol * backgroundCol;");
    frag.write(
        "vec4 premultipliedReflect = vec4(vec3(direct * lightColor + indirect * occlusion + emissionCol) * opacity, opacity);",
    );
    frag.write("float fragZ = wvpposition.z / wvpposition.w;");
    frag.write(
        "float weight = clamp(pow(min(1.0, premultipliedReflect.a * 10.0) + 0.01, 3.0) * 1e8 * pow(1.0 - fragZ * 0.9, 3.0), 1e-2, 3e3);",
    );
    frag.write("fragColor[0] = vec4(premultipliedReflect.rgb * weight, premultipliedReflect.a);");
    frag.write("fragColor[1] = vec4(premultipliedReflect.a * weight, 0.0, 0.0, 1.0);");

    CompiledPass::finish(&con)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::node_compiler::test_utils::*;

    fn glass_graph() -> MaterialGraph {
        test_graph(
            vec![
                with_default(test_node("bsdf", NodeKind::PrincipledBsdf), "Alpha", &[0.25]),
                test_node("out", NodeKind::OutputMaterial),
            ],
            vec![test_connection("bsdf", "BSDF", "out", "Surface")],
        )
    }

    #[test]
    fn translucent_pass_blends_without_depth_writes() {
        let pass = build_translucent_pass(&glass_graph(), &CompileOptions::default()).unwrap();
        assert_eq!(pass.data.name, "translucent");
        assert!(!pass.data.depth_write);
        assert_eq!(pass.data.blend, Some(accumulate_blend()));
        assert_eq!(pass.data.fragment_shader, "test_translucent.frag");

        let json = serde_json::to_value(&pass.data).unwrap();
        assert_eq!(json["blend_source"], "blend_one");
        assert_eq!(json["alpha_blend_destination"], "inverse_source_alpha");
    }

    #[test]
    fn opacity_feeds_the_weighted_outputs() {
        let pass = build_translucent_pass(&glass_graph(), &CompileOptions::default()).unwrap();
        let vert = &pass.sources[&ShaderStage::Vert];
        assert!(vert.contains("out vec4 wvpposition;"));
        assert!(vert.find("gl_Position = WVP * spos;").unwrap() < vert.find("wvpposition = gl_Position;").unwrap());

        let frag = &pass.sources[&ShaderStage::Frag];
        assert!(frag.contains("in vec4 wvpposition;"));
        assert!(frag.contains("out vec4 fragColor[2];"));
        assert!(frag.contains("float opacity = 0.25;"));
        assert!(frag.contains("float ior = 1.45;"));
        assert!(frag.find("float opacity").unwrap() < frag.find("vec4 premultipliedReflect").unwrap());
        assert!(frag.contains("fragColor[1] = vec4(premultipliedReflect.a * weight, 0.0, 0.0, 1.0);"));

        let links: Vec<_> = pass.data.constants.iter().filter_map(|c| c.link.as_deref()).collect();
        assert!(links.contains(&"_lightColor"));
        assert!(links.contains(&"_lightDirection"));
    }

    #[test]
    fn missing_output_still_declares_opacity() {
        let pass = build_translucent_pass(&test_graph(vec![], vec![]), &CompileOptions::default()).unwrap();
        let frag = &pass.sources[&ShaderStage::Frag];
        assert!(frag.contains("vec3 basecol = vec3(0.8);"));
        assert!(frag.contains("float opacity = 1.0;"));
    }
}
