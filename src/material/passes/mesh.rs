use anyhow::Result;

use super::super::context::{PassConfig, ShaderContext, UniformOptions};
use super::super::node_compiler::output_nodes::{parse_material_output, write_default_terms};
use super::super::parser_state::{EmissionType, ParserState};
use super::super::shader::ShaderStage;
use super::super::utils::fmt_f32;
use super::{CompiledPass, wire_varyings, write_normal_varying, write_vertex_position, write_vertex_projection};
use crate::config::CompileOptions;
use crate::dsl::{MaterialGraph, NodeKind, nodes_by_id};
use crate::error::CompileError;
use crate::graph::output_node;

/// Build the opaque mesh pass: the full surface parse written to the G-buffer.
///
/// # Outputs
/// - `fragColor[0]`: octahedral normal, roughness, packed metallic and material id
/// - `fragColor[1]`: base color, packed occlusion and specular
/// - `fragColor[2]`: emission color, only when something emits
pub fn build_mesh_pass(graph: &MaterialGraph, options: &CompileOptions) -> Result<CompiledPass> {
    let mut con = ShaderContext::new(&graph.name, PassConfig::named("mesh"), options);
    con.make_stage(ShaderStage::Vert);
    con.make_stage(ShaderStage::Frag);

    con.add_uniform(ShaderStage::Vert, "mat4 WVP", UniformOptions::link("_worldViewProjectionMatrix"))?;
    write_vertex_position(&mut con)?;
    write_normal_varying(&mut con, options.two_sided)?;

    let nodes = nodes_by_id(graph);
    let (displaced, emission) = {
        let mut state = ParserState::new(graph, &nodes, options, &mut con);
        state.flags.opacity = options.discard_opacity.is_some() || options.parse_opacity;
        let displaced = match output_node(graph, NodeKind::OutputMaterial) {
            Some(output) => parse_material_output(&mut state, output)?,
            None => {
                log::warn!("{}, using the default material", CompileError::NoOutputNode(graph.name.clone()));
                write_default_terms(&mut state)?;
                false
            }
        };
        (displaced, state.emission_type)
    };

    wire_varyings(&mut con)?;
    write_vertex_projection(&mut con, "WVP", displaced)?;

    let frag = con.stage_mut(ShaderStage::Frag)?;
    let emits = emission != EmissionType::NoEmission;
    frag.add_out(if emits { "vec4 fragColor[3]" } else { "vec4 fragColor[2]" });
    frag.add_include("std/gbuffer.glsl");
    if let Some(threshold) = options.discard_opacity {
        frag.write(&format!("if (opacity < {}) discard;", fmt_f32(threshold)));
    }
    let matid = if emission == EmissionType::Shadeless { 1 } else { 0 };
    frag.write("n /= (abs(n.x) + abs(n.y) + abs(n.z));");
    frag.write("n.xy = n.z >= 0.0 ? n.xy : octahedronWrap(n.xy);");
    frag.write(&format!(
        "fragColor[0] = vec4(n.xy, roughness, packFloatInt16(metallic, uint({matid})));"
    ));
    frag.write("fragColor[1] = vec4(basecol, packFloat2(occlusion, specular));");
    if emits {
        frag.write("fragColor[2] = vec4(emissionCol, 0.0);");
    }

    CompiledPass::finish(&con)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::node_compiler::test_utils::*;
    use crate::material::registry::VertexData;

    #[test]
    fn uv_material_wires_tex_coord() {
        let graph = test_graph(
            vec![
                test_node("uv", NodeKind::TexCoord),
                test_node("sep", NodeKind::SeparateXyz),
                test_node("bsdf", NodeKind::DiffuseBsdf),
                test_node("out", NodeKind::OutputMaterial),
            ],
            vec![
                test_connection("uv", "UV", "sep", "Vector"),
                test_connection("sep", "X", "bsdf", "Roughness"),
                test_connection("bsdf", "BSDF", "out", "Surface"),
            ],
        );
        let pass = build_mesh_pass(&graph, &CompileOptions::default()).unwrap();
        let names: Vec<&str> = pass.data.vertex_elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["pos", "nor", "tex"]);
        assert_eq!(pass.data.vertex_elements[2].data, VertexData::Short2Norm);

        let vert = &pass.sources[&ShaderStage::Vert];
        assert!(vert.contains("out vec2 texCoord;"));
        assert!(vert.contains("texCoord = tex * texUnpack;"));
        assert!(vert.contains("gl_Position = WVP * spos;"));
        let frag = &pass.sources[&ShaderStage::Frag];
        assert!(frag.contains("in vec2 texCoord;"));
        assert!(frag.contains("float roughness = texCoord.x;"));
        assert!(frag.contains("out vec4 fragColor[2];"));
        assert!(pass.data.texture_units.is_empty());
        assert_eq!(pass.data.fragment_shader, "test_mesh.frag");
    }

    #[test]
    fn mapped_texture_declares_rotation_before_fetch() {
        let graph = test_graph(
            vec![
                test_node("uv", NodeKind::TexCoord),
                with_default(test_node("map", NodeKind::Mapping), "Rotation", &[0.0, 0.0, 0.5]),
                test_node("img", NodeKind::ImageTexture),
                test_node("bsdf", NodeKind::PrincipledBsdf),
                test_node("out", NodeKind::OutputMaterial),
            ],
            vec![
                test_connection("uv", "UV", "map", "Vector"),
                test_connection("map", "Vector", "img", "Vector"),
                test_connection("img", "Color", "bsdf", "Base Color"),
                test_connection("bsdf", "BSDF", "out", "Surface"),
            ],
        );
        let pass = build_mesh_pass(&graph, &CompileOptions::default()).unwrap();
        let frag = &pass.sources[&ShaderStage::Frag];
        let rotation = frag.find("mat3 map_rotationX = ").unwrap();
        let fetch = frag.find("vec4 img_store = texture(img, ").unwrap();
        assert!(rotation < fetch);
        assert_eq!(frag.matches("mat3 map_rotationX = ").count(), 1);
        assert!(frag.contains("vec3 basecol = img_store.rgb;"));
    }

    #[test]
    fn missing_output_builds_default_material() {
        let graph = test_graph(vec![], vec![]);
        let pass = build_mesh_pass(&graph, &CompileOptions::default()).unwrap();
        let frag = &pass.sources[&ShaderStage::Frag];
        assert!(frag.contains("vec3 basecol = vec3(0.8);"));
        assert!(frag.contains("fragColor[1] = vec4(basecol, packFloat2(occlusion, specular));"));
    }

    #[test]
    fn emission_adds_third_target() {
        let graph = test_graph(
            vec![test_node("em", NodeKind::Emission), test_node("out", NodeKind::OutputMaterial)],
            vec![test_connection("em", "Emission", "out", "Surface")],
        );
        let pass = build_mesh_pass(&graph, &CompileOptions::default()).unwrap();
        let frag = &pass.sources[&ShaderStage::Frag];
        assert!(frag.contains("out vec4 fragColor[3];"));
        assert!(frag.contains("packFloatInt16(metallic, uint(1))"));
        assert!(frag.contains("fragColor[2] = vec4(emissionCol, 0.0);"));
    }

    #[test]
    fn discard_threshold_parses_opacity() {
        let graph = test_graph(
            vec![test_node("bsdf", NodeKind::PrincipledBsdf), test_node("out", NodeKind::OutputMaterial)],
            vec![test_connection("bsdf", "BSDF", "out", "Surface")],
        );
        let options = CompileOptions {
            discard_opacity: Some(0.5),
            ..CompileOptions::default()
        };
        let pass = build_mesh_pass(&graph, &options).unwrap();
        let frag = &pass.sources[&ShaderStage::Frag];
        assert!(frag.contains("float opacity = 1.0;"));
        assert!(frag.contains("if (opacity < 0.5) discard;"));
    }
}
