//! Shader contexts: one render pass worth of stages plus their symbol tables.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::CompileOptions;
use crate::error::CompileError;

use super::links::LinkTable;
use super::registry::{
    Constant, ConstantDefault, SamplerParams, SymbolRegistry, TextureUnit, VertexData,
    VertexElement,
};
use super::shader::{ShaderBuffer, ShaderStage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    Always,
    Never,
    #[default]
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CullMode {
    None,
    #[default]
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendFactor {
    BlendOne,
    BlendZero,
    SourceAlpha,
    DestinationAlpha,
    InverseSourceAlpha,
    InverseDestinationAlpha,
    SourceColor,
    DestinationColor,
    InverseSourceColor,
    InverseDestinationColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendOperation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlendState {
    pub blend_source: BlendFactor,
    pub blend_destination: BlendFactor,
    pub blend_operation: BlendOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha_blend_source: Option<BlendFactor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha_blend_destination: Option<BlendFactor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha_blend_operation: Option<BlendOperation>,
}

/// Per-attachment color write masks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorWrites {
    #[serde(rename = "color_writes_red")]
    pub red: Vec<bool>,
    #[serde(rename = "color_writes_green")]
    pub green: Vec<bool>,
    #[serde(rename = "color_writes_blue")]
    pub blue: Vec<bool>,
    #[serde(rename = "color_writes_alpha")]
    pub alpha: Vec<bool>,
}

impl ColorWrites {
    pub fn all(enabled: bool) -> Self {
        Self {
            red: vec![enabled],
            green: vec![enabled],
            blue: vec![enabled],
            alpha: vec![enabled],
        }
    }
}

/// Fixed-function state and layout of one render pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassConfig {
    pub name: String,
    pub depth_write: bool,
    pub compare_mode: CompareMode,
    pub cull_mode: CullMode,
    pub blend: Option<BlendState>,
    pub color_writes: Option<ColorWrites>,
    /// Explicit layout. Without one, the context starts from position and normal.
    pub vertex_elements: Option<Vec<VertexElement>>,
    pub color_attachments: Option<Vec<String>>,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            name: "mesh".to_string(),
            depth_write: true,
            compare_mode: CompareMode::Less,
            cull_mode: CullMode::Clockwise,
            blend: None,
            color_writes: None,
            vertex_elements: None,
            color_attachments: None,
        }
    }
}

impl PassConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Optional parts of a uniform registration.
#[derive(Debug, Clone, Default)]
pub struct UniformOptions {
    pub link: Option<String>,
    /// Emit before the includes.
    pub top: bool,
    pub sampler: Option<SamplerParams>,
    pub default: Option<ConstantDefault>,
    pub default_image: Option<String>,
    pub material_param: bool,
}

impl UniformOptions {
    pub fn link(link: impl Into<String>) -> Self {
        Self {
            link: Some(link.into()),
            ..Self::default()
        }
    }

    pub fn top() -> Self {
        Self {
            top: true,
            ..Self::default()
        }
    }
}

/// Shader metadata for one context, as consumed by the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderContextData {
    pub name: String,
    pub depth_write: bool,
    pub compare_mode: CompareMode,
    pub cull_mode: CullMode,
    #[serde(flatten)]
    pub blend: Option<BlendState>,
    #[serde(flatten)]
    pub color_writes: Option<ColorWrites>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_attachments: Option<Vec<String>>,
    pub vertex_elements: Vec<VertexElement>,
    pub constants: Vec<Constant>,
    pub texture_units: Vec<TextureUnit>,
    pub vertex_shader: String,
    pub fragment_shader: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry_shader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tesscontrol_shader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tesseval_shader: Option<String>,
}

/// Metadata for every pass built from one material.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShaderData {
    pub name: String,
    pub contexts: Vec<ShaderContextData>,
}

impl ShaderData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contexts: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One render pass under construction.
#[derive(Debug, Clone)]
pub struct ShaderContext {
    material: String,
    config: PassConfig,
    registry: SymbolRegistry,
    stages: BTreeMap<ShaderStage, ShaderBuffer>,
    defines: BTreeSet<String>,
    links: LinkTable,
}

impl ShaderContext {
    pub fn new(material: impl Into<String>, config: PassConfig, options: &CompileOptions) -> Self {
        let mut registry = SymbolRegistry::default();
        match &config.vertex_elements {
            Some(elems) => {
                for e in elems {
                    registry.add_vertex_element(&e.name, e.data);
                }
            }
            None => {
                registry.add_vertex_element("pos", VertexData::Short4Norm);
                registry.add_vertex_element("nor", VertexData::Short2Norm);
            }
        }
        let material = material.into();
        log::debug!("created shader context `{}` for `{}`", config.name, material);
        Self {
            material,
            config,
            registry,
            stages: BTreeMap::new(),
            defines: options.defines.clone(),
            links: options.links.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &PassConfig {
        &self.config
    }

    pub fn registry(&self) -> &SymbolRegistry {
        &self.registry
    }

    /// Create the stage if needed and hand it out.
    pub fn make_stage(&mut self, stage: ShaderStage) -> &mut ShaderBuffer {
        self.stages
            .entry(stage)
            .or_insert_with(|| ShaderBuffer::new(stage))
    }

    pub fn has_stage(&self, stage: ShaderStage) -> bool {
        self.stages.contains_key(&stage)
    }

    pub fn stage(&self, stage: ShaderStage) -> Result<&ShaderBuffer> {
        self.stages
            .get(&stage)
            .ok_or_else(|| self.missing_stage(stage).into())
    }

    pub fn stage_mut(&mut self, stage: ShaderStage) -> Result<&mut ShaderBuffer> {
        let err = self.missing_stage(stage);
        self.stages.get_mut(&stage).ok_or_else(|| err.into())
    }

    fn missing_stage(&self, stage: ShaderStage) -> CompileError {
        CompileError::StageNotCreated {
            stage,
            context: self.config.name.clone(),
        }
    }

    pub fn add_elem(&mut self, name: &str, data: VertexData) -> bool {
        self.registry.add_vertex_element(name, data)
    }

    pub fn is_elem(&self, name: &str) -> bool {
        self.registry.is_elem(name)
    }

    /// Register a constant, resolving its link from the link table when none is given.
    pub fn add_constant(&mut self, mut constant: Constant) -> bool {
        if constant.link.is_none() {
            constant.link = self.resolve_link(&constant.name);
        }
        self.registry.add_constant(constant)
    }

    pub fn add_texture_unit(&mut self, mut unit: TextureUnit) -> usize {
        if unit.link.is_none() {
            unit.link = self.resolve_link(&unit.name);
        }
        self.registry.add_texture_unit(unit)
    }

    pub fn resolve_link(&self, name: &str) -> Option<String> {
        self.links.resolve(name, &self.defines).map(str::to_string)
    }

    pub fn has_define(&self, define: &str) -> bool {
        self.defines.contains(define)
    }

    /// Declare a uniform on `stage` and register the matching constant or texture unit.
    ///
    /// The declaration's trailing `type name` pair decides the routing: sampler and
    /// image types become texture units, everything else a constant. `float`, `vec4`
    /// and `mat4` arrays are recorded as flat `floats` constants.
    pub fn add_uniform(&mut self, stage: ShaderStage, decl: &str, opts: UniformOptions) -> Result<()> {
        let mut tokens = decl.split_whitespace().rev();
        let (Some(name), Some(ty)) = (tokens.next(), tokens.next()) else {
            log::warn!("ignoring malformed uniform declaration `{decl}`");
            return Ok(());
        };

        if ty.starts_with("sampler") || ty.starts_with("image") || ty.starts_with("uimage") {
            let mut unit = TextureUnit::new(name);
            unit.link = opts.link.clone();
            unit.is_image = ty.starts_with("image") || ty.starts_with("uimage");
            unit.is_material_param = opts.material_param;
            if let Some(sampler) = opts.sampler.clone() {
                unit.sampler = sampler;
            }
            unit.default_image_file = opts.default_image.clone();
            self.add_texture_unit(unit);
        } else {
            let (ty, name) = match name.split_once('[') {
                Some((base, _)) if matches!(ty, "float" | "vec4" | "mat4") => ("floats", base),
                _ => (ty, name),
            };
            let mut constant = Constant::new(ty, name);
            constant.link = opts.link.clone();
            constant.default = opts.default.clone();
            constant.is_material_param = opts.material_param;
            self.add_constant(constant);
        }

        self.stage_mut(stage)?.push_uniform_decl(decl, opts.top);
        Ok(())
    }

    fn shader_ref(&self, stage: ShaderStage) -> String {
        format!("{}_{}.{}", self.material, self.config.name, stage.ext())
    }

    /// Serialize one stage's source.
    pub fn get_source(&self, stage: ShaderStage) -> Result<String> {
        Ok(self.stage(stage)?.get(self.registry.vertex_elements()))
    }

    /// Sources of every stage in use.
    pub fn sources(&self) -> BTreeMap<ShaderStage, String> {
        self.stages
            .iter()
            .map(|(stage, buf)| (*stage, buf.get(self.registry.vertex_elements())))
            .collect()
    }

    /// Build the runtime metadata record. Vertex and fragment stages are mandatory.
    pub fn serialize(&self) -> Result<ShaderContextData> {
        self.stage(ShaderStage::Vert)?;
        self.stage(ShaderStage::Frag)?;
        let optional = |stage| self.has_stage(stage).then(|| self.shader_ref(stage));
        log::debug!(
            "serializing context `{}`: {} stages, {} vertex elements, {} constants, {} texture units",
            self.config.name,
            self.stages.len(),
            self.registry.vertex_elements().len(),
            self.registry.constants().len(),
            self.registry.texture_units().len()
        );
        Ok(ShaderContextData {
            name: self.config.name.clone(),
            depth_write: self.config.depth_write,
            compare_mode: self.config.compare_mode,
            cull_mode: self.config.cull_mode,
            blend: self.config.blend.clone(),
            color_writes: self.config.color_writes.clone(),
            color_attachments: self.config.color_attachments.clone(),
            vertex_elements: self.registry.vertex_elements().to_vec(),
            constants: self.registry.constants().to_vec(),
            texture_units: self.registry.texture_units().to_vec(),
            vertex_shader: self.shader_ref(ShaderStage::Vert),
            fragment_shader: self.shader_ref(ShaderStage::Frag),
            geometry_shader: optional(ShaderStage::Geom),
            tesscontrol_shader: optional(ShaderStage::Tesc),
            tesseval_shader: optional(ShaderStage::Tese),
        })
    }
}
