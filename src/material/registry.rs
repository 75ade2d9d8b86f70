//! Per-context symbol tables: vertex elements, constants and texture units.
//!
//! Every table is an insertion-ordered map keyed by name. The first registration
//! of a name wins; later ones are ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Vertex elements in the order the runtime's vertex-buffer layout expects them.
pub const CANONICAL_VERTEX_ORDER: [&str; 12] = [
    "pos", "nor", "tex", "tex1", "morph", "col", "tang", "bone", "weight", "ipos", "irot", "iscl",
];

fn canonical_rank(name: &str) -> usize {
    CANONICAL_VERTEX_ORDER
        .iter()
        .position(|n| *n == name)
        .unwrap_or(CANONICAL_VERTEX_ORDER.len())
}

pub trait Named {
    fn name(&self) -> &str;
}

/// Insertion-ordered, deduplicating table.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    entries: Vec<T>,
    index_by_name: HashMap<String, usize>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index_by_name: HashMap::new(),
        }
    }
}

impl<T: Named> Registry<T> {
    /// Insert unless the name is taken. Returns whether the entry was added.
    pub fn insert(&mut self, entry: T) -> bool {
        if self.index_by_name.contains_key(entry.name()) {
            return false;
        }
        self.index_by_name
            .insert(entry.name().to_string(), self.entries.len());
        self.entries.push(entry);
        true
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.index_by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stable re-sort; the name index is rebuilt afterwards.
    fn sort_by_key<K: Ord>(&mut self, key: impl Fn(&T) -> K) {
        self.entries.sort_by_key(|e| key(e));
        self.index_by_name = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name().to_string(), i))
            .collect();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VertexData {
    Float1,
    Float2,
    Float3,
    Float4,
    Short2Norm,
    Short4Norm,
}

impl VertexData {
    pub fn components(self) -> u32 {
        match self {
            VertexData::Float1 => 1,
            VertexData::Float2 | VertexData::Short2Norm => 2,
            VertexData::Float3 => 3,
            VertexData::Float4 | VertexData::Short4Norm => 4,
        }
    }

    /// GLSL type of the matching vertex shader input.
    pub fn glsl_type(self) -> String {
        match self.components() {
            1 => "float".to_string(),
            n => format!("vec{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexElement {
    pub name: String,
    pub data: VertexData,
}

impl VertexElement {
    pub fn new(name: impl Into<String>, data: VertexData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

impl Named for VertexElement {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Default value of a constant, written to shader metadata for the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstantDefault {
    Bool(bool),
    Float(f32),
    Vector(Vec<f32>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ConstantDefault>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_size: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_material_param: bool,
}

impl Constant {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            link: None,
            default: None,
            array_size: None,
            is_material_param: false,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_default(mut self, default: ConstantDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_array_size(mut self, size: usize) -> Self {
        self.array_size = Some(size);
        self
    }

    pub fn material_param(mut self) -> Self {
        self.is_material_param = true;
        self
    }
}

impl Named for Constant {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureAddressing {
    Repeat,
    Mirror,
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureFilter {
    Point,
    Linear,
    Anisotropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MipmapFilter {
    #[serde(rename = "no")]
    NoMipmap,
    Point,
    Linear,
}

/// Sampler state attached to a texture unit. Unset fields use runtime defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addressing_u: Option<TextureAddressing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addressing_v: Option<TextureAddressing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_min: Option<TextureFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_mag: Option<TextureFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mipmap_filter: Option<MipmapFilter>,
}

impl SamplerParams {
    pub fn with_addressing(mut self, mode: TextureAddressing) -> Self {
        self.addressing_u = Some(mode);
        self.addressing_v = Some(mode);
        self
    }

    pub fn with_filter(mut self, filter: TextureFilter, mipmap: MipmapFilter) -> Self {
        self.filter_min = Some(filter);
        self.filter_mag = Some(filter);
        self.mipmap_filter = Some(mipmap);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureUnit {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_image: bool,
    #[serde(flatten)]
    pub sampler: SamplerParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_image_file: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_material_param: bool,
}

impl TextureUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: None,
            is_image: false,
            sampler: SamplerParams::default(),
            default_image_file: None,
            is_material_param: false,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn image(mut self) -> Self {
        self.is_image = true;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerParams) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_default_image(mut self, file: impl Into<String>) -> Self {
        self.default_image_file = Some(file.into());
        self
    }
}

impl Named for TextureUnit {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Split `foo[3]` into `("foo", 3)`. Plain names and malformed sizes return `None`.
pub fn split_array_name(name: &str) -> Option<(&str, usize)> {
    let open = name.find('[')?;
    let inner = name[open + 1..].strip_suffix(']')?;
    let size = inner.trim().parse().ok()?;
    Some((&name[..open], size))
}

/// The three symbol tables owned by one shader context.
#[derive(Debug, Clone, Default)]
pub struct SymbolRegistry {
    vertex_elements: Registry<VertexElement>,
    constants: Registry<Constant>,
    texture_units: Registry<TextureUnit>,
}

impl SymbolRegistry {
    /// Register a vertex element and restore canonical order. Returns whether it was new.
    pub fn add_vertex_element(&mut self, name: &str, data: VertexData) -> bool {
        if !self.vertex_elements.insert(VertexElement::new(name, data)) {
            return false;
        }
        self.vertex_elements.sort_by_key(|e| canonical_rank(&e.name));
        true
    }

    pub fn add_constant(&mut self, constant: Constant) -> bool {
        self.constants.insert(constant)
    }

    /// Register a texture unit. Array names (`foo[3]`) are unrolled into
    /// `foo0`, `foo1`, `foo2`, each a copy of `unit` under its own name.
    /// Returns the number of units actually added.
    pub fn add_texture_unit(&mut self, unit: TextureUnit) -> usize {
        match split_array_name(&unit.name) {
            Some((base, size)) => {
                let base = base.to_string();
                (0..size)
                    .filter(|i| {
                        let mut u = unit.clone();
                        u.name = format!("{base}{i}");
                        self.texture_units.insert(u)
                    })
                    .count()
            }
            None => usize::from(self.texture_units.insert(unit)),
        }
    }

    pub fn is_elem(&self, name: &str) -> bool {
        self.vertex_elements.contains(name)
    }

    pub fn vertex_elements(&self) -> &[VertexElement] {
        self.vertex_elements.as_slice()
    }

    pub fn constants(&self) -> &[Constant] {
        self.constants.as_slice()
    }

    pub fn texture_units(&self) -> &[TextureUnit] {
        self.texture_units.as_slice()
    }

    pub fn constant(&self, name: &str) -> Option<&Constant> {
        self.constants.get(name)
    }

    pub fn texture_unit(&self, name: &str) -> Option<&TextureUnit> {
        self.texture_units.get(name)
    }
}
