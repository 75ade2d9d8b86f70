use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// A material or world node graph as exported by the authoring tool.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MaterialGraph {
    pub name: String,
    #[serde(default)]
    pub context: GraphContext,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Names of the mesh UV layers, in layer order. Used to map UV map nodes to `tex`/`tex1`.
    #[serde(default, rename = "uvLayers")]
    pub uv_layers: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GraphContext {
    #[default]
    Object,
    World,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub inputs: Vec<Socket>,
    #[serde(default)]
    pub outputs: Vec<Socket>,
}

/// The closed set of node kinds the compiler knows about.
///
/// Kind strings that are not listed here deserialize to [`NodeKind::Unsupported`]
/// so that a graph with exotic nodes still loads and degrades per node.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    #[serde(rename = "OUTPUT_MATERIAL")]
    OutputMaterial,
    #[serde(rename = "OUTPUT_WORLD")]
    OutputWorld,
    #[serde(rename = "REROUTE")]
    Reroute,

    // Inputs
    #[serde(rename = "VALUE")]
    Value,
    #[serde(rename = "RGB")]
    Rgb,
    #[serde(rename = "TEX_COORD")]
    TexCoord,
    #[serde(rename = "UVMAP")]
    UvMap,
    #[serde(rename = "NEW_GEOMETRY")]
    Geometry,
    #[serde(rename = "CAMERA")]
    CameraData,
    #[serde(rename = "OBJECT_INFO")]
    ObjectInfo,
    #[serde(rename = "FRESNEL")]
    Fresnel,
    #[serde(rename = "LAYER_WEIGHT")]
    LayerWeight,
    #[serde(rename = "ATTRIBUTE")]
    Attribute,
    #[serde(rename = "LIGHT_PATH")]
    LightPath,
    #[serde(rename = "VERTEX_COLOR")]
    VertexColor,

    // Converters
    #[serde(rename = "MATH")]
    Math,
    #[serde(rename = "CLAMP")]
    Clamp,
    #[serde(rename = "MAP_RANGE")]
    MapRange,
    #[serde(rename = "COMBXYZ")]
    CombineXyz,
    #[serde(rename = "SEPXYZ")]
    SeparateXyz,
    #[serde(rename = "COMBRGB")]
    CombineRgb,
    #[serde(rename = "SEPRGB")]
    SeparateRgb,
    #[serde(rename = "COMBHSV")]
    CombineHsv,
    #[serde(rename = "SEPHSV")]
    SeparateHsv,
    #[serde(rename = "RGBTOBW")]
    RgbToBw,
    #[serde(rename = "VALTORGB")]
    ColorRamp,

    // Vectors
    #[serde(rename = "VECT_MATH")]
    VectorMath,
    #[serde(rename = "BUMP")]
    Bump,
    #[serde(rename = "MAPPING")]
    Mapping,
    #[serde(rename = "NORMAL")]
    Normal,
    #[serde(rename = "NORMAL_MAP")]
    NormalMap,
    #[serde(rename = "VECT_TRANSFORM")]
    VectorTransform,
    #[serde(rename = "VECTOR_ROTATE")]
    VectorRotate,
    #[serde(rename = "DISPLACEMENT")]
    Displacement,

    // Colors
    #[serde(rename = "MIX_RGB")]
    MixRgb,
    #[serde(rename = "INVERT")]
    Invert,
    #[serde(rename = "GAMMA")]
    Gamma,
    #[serde(rename = "BRIGHTCONTRAST")]
    BrightContrast,
    #[serde(rename = "HUE_SAT")]
    HueSaturation,

    // Textures
    #[serde(rename = "TEX_IMAGE")]
    ImageTexture,
    #[serde(rename = "TEX_ENVIRONMENT")]
    EnvironmentTexture,
    #[serde(rename = "TEX_CHECKER")]
    CheckerTexture,
    #[serde(rename = "TEX_NOISE")]
    NoiseTexture,
    #[serde(rename = "TEX_GRADIENT")]
    GradientTexture,

    // Shaders
    #[serde(rename = "BSDF_PRINCIPLED")]
    PrincipledBsdf,
    #[serde(rename = "BSDF_DIFFUSE")]
    DiffuseBsdf,
    #[serde(rename = "BSDF_GLOSSY")]
    GlossyBsdf,
    #[serde(rename = "EMISSION")]
    Emission,
    #[serde(rename = "MIX_SHADER")]
    MixShader,
    #[serde(rename = "ADD_SHADER")]
    AddShader,
    #[serde(rename = "BSDF_TRANSPARENT")]
    TransparentBsdf,
    #[serde(rename = "HOLDOUT")]
    Holdout,
    #[serde(rename = "BACKGROUND")]
    Background,

    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Socket {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub socket_type: SocketType,
    #[serde(default)]
    pub default: Option<SocketDefault>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SocketType {
    Shader,
    Rgba,
    Rgb,
    Vector,
    #[default]
    Value,
    Int,
}

impl SocketType {
    /// Color and vector sockets carry a `vec3` in generated code, everything else a `float`.
    pub fn is_vector(self) -> bool {
        matches!(self, SocketType::Rgba | SocketType::Rgb | SocketType::Vector)
    }
}

/// Static default of an unconnected socket: a scalar or 1 to 4 components.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum SocketDefault {
    Scalar(f32),
    Vector(Vec<f32>),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Connection {
    pub id: String,
    pub from: Endpoint,
    pub to: Endpoint,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Endpoint {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    #[serde(rename = "portId")]
    pub port_id: String,
}

impl Node {
    pub fn input(&self, index: usize) -> Option<&Socket> {
        self.inputs.get(index)
    }

    pub fn output(&self, index: usize) -> Option<&Socket> {
        self.outputs.get(index)
    }

    pub fn output_by_id(&self, port_id: &str) -> Option<&Socket> {
        self.outputs.iter().find(|s| s.id == port_id)
    }

    /// Position of an output socket; translators branch on it the way the authoring tool orders outputs.
    pub fn output_index(&self, port_id: &str) -> Option<usize> {
        self.outputs.iter().position(|s| s.id == port_id)
    }
}

pub fn load_graph_from_path(path: impl AsRef<std::path::Path>) -> Result<MaterialGraph> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read material graph json at {}", path.display()))?;
    load_graph_from_str(&text)
}

pub fn load_graph_from_str(text: &str) -> Result<MaterialGraph> {
    serde_json::from_str(text).context("failed to parse material graph json")
}

pub fn nodes_by_id(graph: &MaterialGraph) -> HashMap<String, Node> {
    graph
        .nodes
        .iter()
        .map(|n| (n.id.clone(), n.clone()))
        .collect()
}

pub fn find_node<'a>(nodes_by_id: &'a HashMap<String, Node>, node_id: &str) -> Result<&'a Node> {
    nodes_by_id
        .get(node_id)
        .ok_or_else(|| CompileError::NodeNotFound(node_id.to_string()).into())
}

pub fn incoming_connection<'a>(
    graph: &'a MaterialGraph,
    to_node_id: &str,
    to_port_id: &str,
) -> Option<&'a Connection> {
    graph
        .connections
        .iter()
        .find(|c| c.to.node_id == to_node_id && c.to.port_id == to_port_id)
}

pub fn parse_f32(params: &HashMap<String, serde_json::Value>, key: &str) -> Option<f32> {
    match params.get(key) {
        Some(v) => v
            .as_f64()
            .map(|x| x as f32)
            .or_else(|| v.as_u64().map(|x| x as f32))
            .or_else(|| v.as_i64().map(|x| x as f32)),
        None => None,
    }
}

pub fn parse_str<'a>(params: &'a HashMap<String, serde_json::Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

pub fn parse_bool(params: &HashMap<String, serde_json::Value>, key: &str) -> Option<bool> {
    params.get(key).and_then(|v| v.as_bool())
}

pub fn parse_f32_array(params: &HashMap<String, serde_json::Value>, key: &str) -> Option<Vec<f32>> {
    let arr = params.get(key)?.as_array()?;
    arr.iter().map(|v| v.as_f64().map(|x| x as f32)).collect()
}
