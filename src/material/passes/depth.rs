use anyhow::Result;

use super::super::context::{ColorWrites, PassConfig, ShaderContext, UniformOptions};
use super::super::node_compiler::output_nodes::parse_material_output;
use super::super::parser_state::ParserState;
use super::super::registry::{VertexData, VertexElement};
use super::super::shader::ShaderStage;
use super::super::utils::fmt_f32;
use super::{CompiledPass, uses_ident, wire_varyings, write_normal_varying, write_vertex_position, write_vertex_projection};
use crate::config::CompileOptions;
use crate::dsl::{MaterialGraph, NodeKind, nodes_by_id};
use crate::graph::output_node;

/// Build the depth-only pass, or the shadow map pass when `shadowmap` is set.
///
/// Only opacity and displacement are parsed. Color writes are disabled and the
/// layout starts from the position alone; the normal is added back when the
/// opacity expression or the displacement needs it.
pub fn build_depth_pass(graph: &MaterialGraph, options: &CompileOptions, shadowmap: bool) -> Result<CompiledPass> {
    let config = PassConfig {
        color_writes: Some(ColorWrites::all(false)),
        vertex_elements: Some(vec![VertexElement::new("pos", VertexData::Short4Norm)]),
        ..PassConfig::named(if shadowmap { "shadowmap" } else { "depth" })
    };
    let mut con = ShaderContext::new(&graph.name, config, options);
    con.make_stage(ShaderStage::Vert);
    con.make_stage(ShaderStage::Frag);

    let (mvp, link) = if shadowmap {
        ("LWVP", "_lightWorldViewProjectionMatrix")
    } else {
        ("WVP", "_worldViewProjectionMatrix")
    };
    con.add_uniform(ShaderStage::Vert, &format!("mat4 {mvp}"), UniformOptions::link(link))?;
    write_vertex_position(&mut con)?;

    let parse_opacity = options.discard_opacity.is_some() || options.parse_opacity;
    if parse_opacity {
        write_normal_varying(&mut con, options.two_sided)?;
    }

    let nodes = nodes_by_id(graph);
    let displaced = {
        let mut state = ParserState::new(graph, &nodes, options, &mut con);
        state.flags.surface = false;
        state.flags.opacity = parse_opacity;
        match output_node(graph, NodeKind::OutputMaterial) {
            Some(output) => parse_material_output(&mut state, output)?,
            None => {
                log::debug!("`{}` has no material output, depth pass stays empty", graph.name);
                false
            }
        }
    };

    if displaced && !parse_opacity {
        con.add_elem("nor", VertexData::Short2Norm);
        if uses_ident(&con.stage(ShaderStage::Vert)?.main_body(), "wnormal") {
            con.add_uniform(ShaderStage::Vert, "mat3 N", UniformOptions::link("_normalMatrix"))?;
            con.stage_mut(ShaderStage::Vert)?
                .write_attrib("vec3 wnormal = normalize(N * vec3(nor.xy, pos.w));");
        }
    }

    wire_varyings(&mut con)?;
    write_vertex_projection(&mut con, mvp, displaced)?;

    if let Some(threshold) = options.discard_opacity {
        con.stage_mut(ShaderStage::Frag)?
            .write(&format!("if (opacity < {}) discard;", fmt_f32(threshold)));
    }

    CompiledPass::finish(&con)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplacementMode;
    use crate::material::node_compiler::test_utils::*;

    fn element_names(pass: &CompiledPass) -> Vec<&str> {
        pass.data.vertex_elements.iter().map(|e| e.name.as_str()).collect()
    }

    fn diffuse_graph() -> MaterialGraph {
        test_graph(
            vec![test_node("bsdf", NodeKind::PrincipledBsdf), test_node("out", NodeKind::OutputMaterial)],
            vec![test_connection("bsdf", "BSDF", "out", "Surface")],
        )
    }

    #[test]
    fn depth_pass_is_position_only() {
        let pass = build_depth_pass(&diffuse_graph(), &CompileOptions::default(), false).unwrap();
        assert_eq!(pass.data.name, "depth");
        assert_eq!(element_names(&pass), ["pos"]);
        assert_eq!(pass.data.color_writes, Some(ColorWrites::all(false)));

        let vert = &pass.sources[&ShaderStage::Vert];
        assert!(vert.contains("gl_Position = WVP * spos;"));
        assert!(!vert.contains("wnormal"));
        let frag = &pass.sources[&ShaderStage::Frag];
        assert!(!frag.contains("basecol"));
    }

    #[test]
    fn shadowmap_uses_light_matrix() {
        let pass = build_depth_pass(&diffuse_graph(), &CompileOptions::default(), true).unwrap();
        assert_eq!(pass.data.name, "shadowmap");
        assert_eq!(pass.data.vertex_shader, "test_shadowmap.vert");
        let lwvp = pass.data.constants.iter().find(|c| c.name == "LWVP").unwrap();
        assert_eq!(lwvp.link.as_deref(), Some("_lightWorldViewProjectionMatrix"));
        assert!(pass.sources[&ShaderStage::Vert].contains("gl_Position = LWVP * spos;"));
    }

    #[test]
    fn discard_brings_back_the_normal() {
        let options = CompileOptions {
            discard_opacity: Some(0.25),
            ..CompileOptions::default()
        };
        let pass = build_depth_pass(&diffuse_graph(), &options, false).unwrap();
        assert_eq!(element_names(&pass), ["pos", "nor"]);
        let frag = &pass.sources[&ShaderStage::Frag];
        assert!(frag.contains("float opacity = 1.0;"));
        assert!(frag.contains("if (opacity < 0.25) discard;"));
        assert!(!frag.contains("basecol"));
    }

    #[test]
    fn displacement_without_opacity_declares_local_normal() {
        let graph = test_graph(
            vec![
                test_node("geo", NodeKind::Geometry),
                test_node("sep", NodeKind::SeparateXyz),
                test_node("disp", NodeKind::Displacement),
                test_node("out", NodeKind::OutputMaterial),
            ],
            vec![
                test_connection("geo", "Normal", "sep", "Vector"),
                test_connection("sep", "Z", "disp", "Height"),
                test_connection("disp", "Displacement", "out", "Displacement"),
            ],
        );
        let options = CompileOptions {
            displacement: DisplacementMode::Vertex,
            ..CompileOptions::default()
        };
        let pass = build_depth_pass(&graph, &options, false).unwrap();
        assert_eq!(element_names(&pass), ["pos", "nor"]);
        let vert = &pass.sources[&ShaderStage::Vert];
        assert!(vert.contains("vec3 wnormal = normalize(N * vec3(nor.xy, pos.w));"));
        assert!(vert.contains("spos.xyz += vec3(nor.xy, pos.w) * disp;"));
        assert!(!vert.contains("out vec3 wnormal;"));
    }
}
