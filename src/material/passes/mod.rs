//! Render-pass drivers.
//!
//! Each driver configures one [`ShaderContext`], seeds the stage boilerplate,
//! walks the graph from its output node and wires the varyings the generated
//! fragment code ended up using.

pub mod depth;
pub mod mesh;
pub mod translucent;
pub mod world;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use super::context::{ShaderContext, ShaderContextData, UniformOptions};
use super::registry::VertexData;
use super::shader::{ShaderStage, COMPILED_INCLUDE};

/// Output of one driver: the runtime metadata and the text of every stage.
#[derive(Debug, Clone)]
pub struct CompiledPass {
    pub data: ShaderContextData,
    pub sources: BTreeMap<ShaderStage, String>,
}

impl CompiledPass {
    pub(crate) fn finish(con: &ShaderContext) -> Result<Self> {
        Ok(Self {
            data: con.serialize()?,
            sources: con.sources(),
        })
    }

    /// File name a stage is referenced by in the metadata, `<material>_<pass>.<ext>`.
    pub fn file_name(&self, stage: ShaderStage) -> String {
        let vert = &self.data.vertex_shader;
        let base = vert.strip_suffix(".vert").unwrap_or(vert);
        format!("{base}.{}", stage.ext())
    }

    /// Write every stage as `<file name>.glsl` into `dir`.
    pub fn write_sources(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        for (stage, text) in &self.sources {
            let path = dir.join(format!("{}.glsl", self.file_name(*stage)));
            std::fs::write(&path, text)
                .with_context(|| format!("failed to write shader source {}", path.display()))?;
        }
        Ok(())
    }
}

/// Whether `ident` occurs in `text` as a whole identifier.
pub(crate) fn uses_ident(text: &str, ident: &str) -> bool {
    let is_ident_char = |c: char| c.is_ascii_alphanumeric() || c == '_';
    text.match_indices(ident).any(|(i, _)| {
        let before = text[..i].chars().next_back();
        let after = text[i + ident.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}

/// Vertex-to-fragment plumbing for the world normal and the `n` local.
pub(crate) fn write_normal_varying(con: &mut ShaderContext, two_sided: bool) -> Result<()> {
    con.add_elem("nor", VertexData::Short2Norm);
    con.add_uniform(ShaderStage::Vert, "mat3 N", UniformOptions::link("_normalMatrix"))?;
    let vert = con.stage_mut(ShaderStage::Vert)?;
    vert.add_out("vec3 wnormal");
    vert.write_attrib("wnormal = normalize(N * vec3(nor.xy, pos.w));");
    let frag = con.stage_mut(ShaderStage::Frag)?;
    frag.add_in("vec3 wnormal");
    frag.write_attrib("vec3 n = normalize(wnormal);");
    if two_sided {
        frag.write_attrib("n *= gl_FrontFacing ? 1.0 : -1.0;");
    }
    Ok(())
}

/// Declare the varyings the fragment body refers to and compute them in the vertex stage.
///
/// Must run after the graph was walked: the fragment text decides what is needed.
/// Vertex attribs compute from the undisplaced `spos`.
pub(crate) fn wire_varyings(con: &mut ShaderContext) -> Result<()> {
    let frag_body = con.stage(ShaderStage::Frag)?.main_body();
    let vert_body = con.stage(ShaderStage::Vert)?.main_body();
    let frag_uses = |ident: &str| uses_ident(&frag_body, ident);

    let needs_vvec = frag_uses("vVec") || frag_uses("dotNV") || frag_uses("vVecCam");
    let needs_wposition = needs_vvec || frag_uses("wposition") || uses_ident(&vert_body, "wposition");

    let varying = |con: &mut ShaderContext, decl: &str, attrib: &str| -> Result<()> {
        con.stage_mut(ShaderStage::Vert)?.add_out(decl);
        con.stage_mut(ShaderStage::Vert)?.write_attrib(attrib);
        con.stage_mut(ShaderStage::Frag)?.add_in(decl);
        Ok(())
    };

    if frag_uses("texCoord") || frag_uses("texCoord1") {
        con.add_uniform(ShaderStage::Vert, "float texUnpack", UniformOptions::link("_texUnpack"))?;
    }
    if frag_uses("texCoord") {
        con.add_elem("tex", VertexData::Short2Norm);
        varying(con, "vec2 texCoord", "texCoord = tex * texUnpack;")?;
    }
    if frag_uses("texCoord1") {
        con.add_elem("tex1", VertexData::Short2Norm);
        varying(con, "vec2 texCoord1", "texCoord1 = tex1 * texUnpack;")?;
    }
    if frag_uses("vcolor") {
        con.add_elem("col", VertexData::Short4Norm);
        varying(con, "vec3 vcolor", "vcolor = col.rgb;")?;
    }
    if needs_wposition {
        con.add_uniform(ShaderStage::Vert, "mat4 W", UniformOptions::link("_worldMatrix"))?;
        varying(con, "vec3 wposition", "wposition = vec4(W * spos).xyz;")?;
    }
    if frag_uses("bposition") {
        con.add_uniform(ShaderStage::Vert, "vec3 dim", UniformOptions::link("_dim"))?;
        con.add_uniform(ShaderStage::Vert, "vec3 hdim", UniformOptions::link("_halfDim"))?;
        varying(con, "vec3 bposition", "bposition = (pos.xyz + hdim) / dim;")?;
    }
    if frag_uses("mposition") {
        varying(con, "vec3 mposition", "mposition = pos.xyz;")?;
    }
    if frag_uses("wtangent") {
        con.add_elem("tang", VertexData::Short4Norm);
        varying(con, "vec3 wtangent", "wtangent = normalize(N * tang.xyz);")?;
    }

    if needs_vvec {
        con.add_uniform(ShaderStage::Frag, "vec3 eye", UniformOptions::link("_cameraPosition"))?;
        let frag = con.stage_mut(ShaderStage::Frag)?;
        frag.write_attrib("vec3 vVec = normalize(eye - wposition);");
        if frag_uses("dotNV") {
            frag.write_attrib("float dotNV = max(dot(n, vVec), 0.0);");
        }
    }
    if frag_uses("vVecCam") {
        con.add_uniform(ShaderStage::Frag, "mat4 V", UniformOptions::link("_viewMatrix"))?;
        con.stage_mut(ShaderStage::Frag)?
            .write_attrib("vec3 vVecCam = normalize((V * vec4(vVec, 0.0)).xyz);");
    }
    Ok(())
}

/// Seed the vertex stage with the object-space position and the compiled include.
pub(crate) fn write_vertex_position(con: &mut ShaderContext) -> Result<()> {
    let vert = con.stage_mut(ShaderStage::Vert)?;
    vert.add_include(COMPILED_INCLUDE);
    vert.write_attrib("vec4 spos = vec4(pos.xyz, 1.0);");
    con.stage_mut(ShaderStage::Frag)?.add_include(COMPILED_INCLUDE);
    Ok(())
}

/// Finish the vertex stage: apply the displacement along the object normal, then project.
pub(crate) fn write_vertex_projection(con: &mut ShaderContext, mvp: &str, displaced: bool) -> Result<()> {
    let vert = con.stage_mut(ShaderStage::Vert)?;
    if displaced {
        vert.write("spos.xyz += vec3(nor.xy, pos.w) * disp;");
        if vert.outs().iter().any(|o| o == "vec3 wposition") {
            vert.write("wposition = vec4(W * spos).xyz;");
        }
    }
    vert.write(&format!("gl_Position = {mvp} * spos;"));
    Ok(())
}
