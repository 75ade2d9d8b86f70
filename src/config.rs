use std::collections::BTreeSet;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::material::links::LinkTable;

/// Target graphics backend. Only affects conventions that differ between APIs,
/// such as the handedness of screen-space y derivatives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphicsApi {
    #[default]
    Opengl,
    Direct3d11,
    Vulkan,
    Metal,
}

impl GraphicsApi {
    pub fn flips_y_derivative(self) -> bool {
        matches!(self, GraphicsApi::Direct3d11)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplacementMode {
    #[default]
    None,
    Vertex,
}

/// Options shared by every pass built for one material.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub graphics_api: GraphicsApi,
    /// Active preprocessor-style defines, consulted by link resolution and by translators.
    pub defines: BTreeSet<String>,
    pub links: LinkTable,
    /// Flip the shading normal on back faces.
    pub two_sided: bool,
    /// Discard fragments below this opacity.
    pub discard_opacity: Option<f32>,
    /// Parse the opacity term even without a discard threshold.
    pub parse_opacity: bool,
    /// Build the blended translucent pass instead of the G-buffer mesh pass.
    pub translucent: bool,
    pub export_tangents: bool,
    pub displacement: DisplacementMode,
}

impl CompileOptions {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("failed to parse compile options json")
    }

    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read compile options at {}", path.display()))?;
        Self::from_json_str(&text)
    }

    pub fn has_define(&self, define: &str) -> bool {
        self.defines.contains(define)
    }

    pub fn with_define(mut self, define: impl Into<String>) -> Self {
        self.defines.insert(define.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let opts = CompileOptions::from_json_str(r#"{ "graphics_api": "direct3d11" }"#).unwrap();
        assert_eq!(opts.graphics_api, GraphicsApi::Direct3d11);
        assert!(opts.defines.is_empty());
        assert!(opts.links.is_empty());
        assert_eq!(opts.displacement, DisplacementMode::None);
        assert!(!opts.translucent);
    }

    #[test]
    fn links_and_defines_load_from_json() {
        let opts = CompileOptions::from_json_str(
            r#"{
                "defines": ["_Irr", "_Rad"],
                "links": [
                    { "name": "W", "link": "_worldMatrix" },
                    { "name": "V", "link": "_viewMatrix", "ifdef": ["_Rad"] }
                ]
            }"#,
        )
        .unwrap();
        assert!(opts.has_define("_Rad"));
        assert_eq!(opts.links.resolve("V", &opts.defines), Some("_viewMatrix"));
    }
}
