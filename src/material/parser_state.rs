//! Explicit compile state threaded through every translator call.

use std::collections::{HashMap, HashSet};

use anyhow::Result;

use crate::config::CompileOptions;
use crate::dsl::{GraphContext, MaterialGraph, Node};

use super::context::{ShaderContext, UniformOptions};
use super::shader::{Segment, ShaderBuffer, ShaderStage};
use super::types::TypedExpr;

/// Which screen-space sample of an expression is being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivativePass {
    Regular,
    Dx,
    Dy,
}

impl DerivativePass {
    /// Suffix for locals declared during this pass, so the three samples never collide.
    pub fn suffix(self) -> &'static str {
        match self {
            DerivativePass::Regular => "",
            DerivativePass::Dx => "_dx",
            DerivativePass::Dy => "_dy",
        }
    }
}

/// When a node computes its own dx/dy variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativePolicy {
    /// Per-fragment leaves (texture coordinates, view vector, geometric normal).
    Always,
    /// Values constant across the surface; dx/dy reuse the regular result.
    Never,
    /// Recomputed only when some upstream input varies.
    Dynamic,
}

/// Strongest emission seen while parsing the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum EmissionType {
    #[default]
    NoEmission,
    Shadeless,
    Shaded,
}

/// Shading-term expressions produced by surface nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadingTerms {
    pub base_color: String,
    pub roughness: String,
    pub metallic: String,
    pub occlusion: String,
    pub specular: String,
    pub opacity: String,
    pub ior: String,
    pub emission: String,
    pub emission_color: String,
}

impl Default for ShadingTerms {
    fn default() -> Self {
        Self {
            base_color: "vec3(0.8)".to_string(),
            roughness: "0.0".to_string(),
            metallic: "0.0".to_string(),
            occlusion: "1.0".to_string(),
            specular: "1.0".to_string(),
            opacity: "1.0".to_string(),
            ior: "1.45".to_string(),
            emission: "0.0".to_string(),
            emission_color: "vec3(0.0)".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub node: String,
    pub port: String,
    pub stage: ShaderStage,
    pub pass: DerivativePass,
}

/// Which parts of the output node a driver wants parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseFlags {
    pub surface: bool,
    pub opacity: bool,
    pub displacement: bool,
    pub basecol_only: bool,
}

impl Default for ParseFlags {
    fn default() -> Self {
        Self {
            surface: true,
            opacity: false,
            displacement: true,
            basecol_only: false,
        }
    }
}

pub struct ParserState<'a> {
    pub graph: &'a MaterialGraph,
    pub nodes_by_id: &'a HashMap<String, Node>,
    pub options: &'a CompileOptions,
    pub con: &'a mut ShaderContext,
    pub context: GraphContext,
    pub flags: ParseFlags,
    pub terms: ShadingTerms,
    pub emission_type: EmissionType,
    /// Set once a normal-map style node has rewritten `n`.
    pub normal_parsed: bool,
    stage: ShaderStage,
    pass: DerivativePass,
    pub(crate) cache: HashMap<CacheKey, TypedExpr>,
    pub(crate) varies: HashMap<String, bool>,
    parsed: HashSet<(ShaderStage, String)>,
}

impl<'a> ParserState<'a> {
    pub fn new(
        graph: &'a MaterialGraph,
        nodes_by_id: &'a HashMap<String, Node>,
        options: &'a CompileOptions,
        con: &'a mut ShaderContext,
    ) -> Self {
        Self {
            graph,
            nodes_by_id,
            options,
            con,
            context: graph.context,
            flags: ParseFlags::default(),
            terms: ShadingTerms::default(),
            emission_type: EmissionType::default(),
            normal_parsed: false,
            stage: ShaderStage::Frag,
            pass: DerivativePass::Regular,
            cache: HashMap::new(),
            varies: HashMap::new(),
            parsed: HashSet::new(),
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn pass(&self) -> DerivativePass {
        self.pass
    }

    /// Switch the stage subsequent writes go to. The stage must exist in the context.
    pub fn set_stage(&mut self, stage: ShaderStage) -> Result<()> {
        self.con.stage(stage)?;
        self.stage = stage;
        Ok(())
    }

    /// Run `f` with another derivative pass active, restoring the previous one afterwards.
    pub fn with_derivative_pass<T>(
        &mut self,
        pass: DerivativePass,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let prev = std::mem::replace(&mut self.pass, pass);
        let out = f(self);
        self.pass = prev;
        out
    }

    /// Run `f` with writes routed to `segment` of the current stage.
    pub fn with_segment<T>(&mut self, segment: Segment, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.cur()?.push_mode(segment);
        let out = f(self);
        self.cur()?.pop_mode(segment);
        out
    }

    /// The active stage buffer.
    pub fn cur(&mut self) -> Result<&mut ShaderBuffer> {
        self.con.stage_mut(self.stage)
    }

    pub fn write(&mut self, text: &str) -> Result<()> {
        self.cur()?.write(text);
        Ok(())
    }

    pub fn insert_at(&mut self, segment: Segment, text: &str) -> Result<()> {
        self.cur()?.insert_at(segment, text);
        Ok(())
    }

    pub fn add_function(&mut self, text: &str) -> Result<()> {
        self.cur()?.add_function(text);
        Ok(())
    }

    pub fn add_include(&mut self, include: &str) -> Result<()> {
        self.cur()?.add_include(include);
        Ok(())
    }

    pub fn add_const(&mut self, ty: &str, name: &str, value: &str, array_size: usize) -> Result<()> {
        self.cur()?.add_const(ty, name, value, array_size);
        Ok(())
    }

    pub fn add_uniform(&mut self, decl: &str, opts: UniformOptions) -> Result<()> {
        self.con.add_uniform(self.stage, decl, opts)
    }

    /// Uniform with an engine link, the most common registration.
    pub fn add_linked_uniform(&mut self, decl: &str, link: &str) -> Result<()> {
        self.add_uniform(decl, UniformOptions::link(link))
    }

    /// Record that a local named `name` was declared in the active stage. Returns `false` if it already was.
    pub fn mark_parsed(&mut self, name: &str) -> bool {
        self.parsed.insert((self.stage, name.to_string()))
    }

    pub fn is_parsed(&self, name: &str) -> bool {
        self.parsed.contains(&(self.stage, name.to_string()))
    }

    pub fn raise_emission(&mut self, ty: EmissionType) {
        self.emission_type = self.emission_type.max(ty);
    }

    pub fn is_frag(&self) -> bool {
        self.stage == ShaderStage::Frag
    }
}
