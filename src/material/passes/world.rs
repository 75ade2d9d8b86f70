use anyhow::Result;

use super::super::context::{PassConfig, ShaderContext, UniformOptions};
use super::super::node_compiler::output_nodes::parse_world_output;
use super::super::parser_state::ParserState;
use super::super::registry::{VertexData, VertexElement};
use super::super::shader::ShaderStage;
use super::CompiledPass;
use crate::config::CompileOptions;
use crate::dsl::{MaterialGraph, NodeKind, nodes_by_id};
use crate::error::CompileError;
use crate::graph::output_node;

/// Build the skydome pass for a world graph.
///
/// The dome is drawn behind everything without writing depth. The fragment
/// direction `n` is the normalized dome position, and alpha is cleared so the
/// compositor can tell the background apart.
pub fn build_world_pass(graph: &MaterialGraph, options: &CompileOptions) -> Result<CompiledPass> {
    let config = PassConfig {
        depth_write: false,
        vertex_elements: Some(vec![VertexElement::new("pos", VertexData::Float3)]),
        ..PassConfig::named("world")
    };
    let mut con = ShaderContext::new(&graph.name, config, options);
    con.make_stage(ShaderStage::Vert);
    con.make_stage(ShaderStage::Frag);

    con.add_uniform(ShaderStage::Vert, "mat4 SMVP", UniformOptions::link("_skydomeMatrix"))?;
    let vert = con.stage_mut(ShaderStage::Vert)?;
    vert.add_out("vec3 normal");
    vert.write("normal = normalize(pos.xyz);");
    vert.write("gl_Position = SMVP * vec4(pos, 1.0);");

    let frag = con.stage_mut(ShaderStage::Frag)?;
    frag.add_in("vec3 normal");
    frag.add_out("vec4 fragColor");
    frag.write_attrib("vec3 n = normalize(normal);");

    let output = output_node(graph, NodeKind::OutputWorld)
        .ok_or_else(|| CompileError::NoOutputNode(graph.name.clone()))?;
    let nodes = nodes_by_id(graph);
    {
        let mut state = ParserState::new(graph, &nodes, options, &mut con);
        state.flags.displacement = false;
        parse_world_output(&mut state, output)?;
    }
    con.stage_mut(ShaderStage::Frag)?.write("fragColor.a = 0.0;");

    CompiledPass::finish(&con)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::GraphContext;
    use crate::material::node_compiler::test_utils::*;

    fn world_graph(nodes: Vec<crate::dsl::Node>, connections: Vec<crate::dsl::Connection>) -> MaterialGraph {
        let mut graph = test_graph(nodes, connections);
        graph.context = GraphContext::World;
        graph
    }

    #[test]
    fn skydome_pass_layout() {
        let graph = world_graph(vec![test_node("out", NodeKind::OutputWorld)], vec![]);
        let pass = build_world_pass(&graph, &CompileOptions::default()).unwrap();
        assert_eq!(pass.data.name, "world");
        assert!(!pass.data.depth_write);
        assert_eq!(pass.data.vertex_elements, [VertexElement::new("pos", VertexData::Float3)]);

        let vert = &pass.sources[&ShaderStage::Vert];
        assert!(vert.contains("in vec3 pos;"));
        assert!(vert.contains("gl_Position = SMVP * vec4(pos, 1.0);"));
        let frag = &pass.sources[&ShaderStage::Frag];
        assert!(frag.contains("vec3 n = normalize(normal);"));
        assert!(frag.contains("fragColor.rgb = backgroundCol;"));
        assert!(frag.find("fragColor.rgb").unwrap() < frag.find("fragColor.a = 0.0;").unwrap());
    }

    #[test]
    fn environment_texture_samples_along_n() {
        let graph = world_graph(
            vec![
                test_node("env", NodeKind::EnvironmentTexture),
                test_node("bg", NodeKind::Background),
                test_node("out", NodeKind::OutputWorld),
            ],
            vec![
                test_connection("env", "Color", "bg", "Color"),
                test_connection("bg", "Background", "out", "Surface"),
            ],
        );
        let pass = build_world_pass(&graph, &CompileOptions::default()).unwrap();
        let frag = &pass.sources[&ShaderStage::Frag];
        assert!(frag.contains("texture(envmap, envMapEquirect(n)).rgb"));
        assert_eq!(pass.data.texture_units.len(), 1);
        assert_eq!(pass.data.texture_units[0].name, "envmap");
    }

    #[test]
    fn missing_world_output_is_an_error() {
        let graph = world_graph(vec![], vec![]);
        let err = build_world_pass(&graph, &CompileOptions::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<CompileError>(),
            Some(&CompileError::NoOutputNode("test".to_string()))
        );
    }
}
