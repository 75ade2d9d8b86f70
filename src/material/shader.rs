//! Per-stage GLSL source accumulator.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::registry::VertexElement;

pub const GLSL_VERSION: &str = "#version 450";

/// Include that must stay first when others are pushed to the front.
pub const COMPILED_INCLUDE: &str = "compiled.inc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderStage {
    Vert,
    Frag,
    Geom,
    Tesc,
    Tese,
}

impl ShaderStage {
    pub fn ext(self) -> &'static str {
        match self {
            ShaderStage::Vert => "vert",
            ShaderStage::Frag => "frag",
            ShaderStage::Geom => "geom",
            ShaderStage::Tesc => "tesc",
            ShaderStage::Tese => "tese",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ext())
    }
}

/// Body segments of `main()`, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Attribs,
    Textures,
    Normal,
    Init,
    Main,
}

#[derive(Debug, Clone, Default)]
struct WriteMode {
    textures: u32,
    normal: u32,
    init: u32,
}

impl WriteMode {
    fn target(&self) -> Segment {
        if self.textures > 0 {
            Segment::Textures
        } else if self.normal > 0 {
            Segment::Normal
        } else if self.init > 0 {
            Segment::Init
        } else {
            Segment::Main
        }
    }

    fn counter(&mut self, segment: Segment) -> Option<&mut u32> {
        match segment {
            Segment::Textures => Some(&mut self.textures),
            Segment::Normal => Some(&mut self.normal),
            Segment::Init => Some(&mut self.init),
            Segment::Attribs | Segment::Main => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShaderBuffer {
    stage: ShaderStage,
    header: String,
    includes: Vec<String>,
    ins: Vec<String>,
    outs: Vec<String>,
    uniforms_top: Vec<String>,
    uniforms: Vec<String>,
    constants: Vec<String>,
    /// `(head, text)`; head is everything before the first `(`, so overloads by return type coexist.
    functions: Vec<(String, String)>,
    attribs: String,
    textures: String,
    normal: String,
    init: String,
    main: String,
    mode: WriteMode,
    tab: usize,
    geom_passthrough: bool,
}

impl ShaderBuffer {
    pub fn new(stage: ShaderStage) -> Self {
        Self {
            stage,
            header: String::new(),
            includes: Vec::new(),
            ins: Vec::new(),
            outs: Vec::new(),
            uniforms_top: Vec::new(),
            uniforms: Vec::new(),
            constants: Vec::new(),
            functions: Vec::new(),
            attribs: String::new(),
            textures: String::new(),
            normal: String::new(),
            init: String::new(),
            main: String::new(),
            mode: WriteMode::default(),
            tab: 1,
            geom_passthrough: false,
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn add_include(&mut self, include: &str) {
        if !self.has_include(include) {
            self.includes.push(include.to_string());
        }
    }

    /// Insert an include at the front, behind the compiled include if that one is present.
    pub fn add_include_front(&mut self, include: &str) {
        if self.has_include(include) {
            return;
        }
        let pos = usize::from(self.includes.first().is_some_and(|i| i == COMPILED_INCLUDE));
        self.includes.insert(pos, include.to_string());
    }

    pub fn has_include(&self, include: &str) -> bool {
        self.includes.iter().any(|i| i == include)
    }

    pub fn add_in(&mut self, decl: &str) {
        if !self.ins.iter().any(|s| s == decl) {
            self.ins.push(decl.to_string());
        }
    }

    pub fn add_out(&mut self, decl: &str) {
        if !self.outs.iter().any(|s| s == decl) {
            self.outs.push(decl.to_string());
        }
    }

    pub fn ins(&self) -> &[String] {
        &self.ins
    }

    pub fn outs(&self) -> &[String] {
        &self.outs
    }

    /// Replace the inputs wholesale, typically with the previous stage's outputs.
    pub fn set_ins(&mut self, ins: Vec<String>) {
        self.ins = ins;
    }

    /// Record a uniform declaration. The symbol registries are handled by the owning context.
    pub(crate) fn push_uniform_decl(&mut self, decl: &str, top: bool) {
        let list = if top {
            &mut self.uniforms_top
        } else {
            &mut self.uniforms
        };
        if !list.iter().any(|u| u == decl) {
            list.push(decl.to_string());
        }
    }

    pub fn has_uniform(&self, decl: &str) -> bool {
        self.uniforms.iter().chain(&self.uniforms_top).any(|u| u == decl)
    }

    /// Local `const` declaration. `array_size > 0` turns `value` into an array literal body.
    pub fn add_const(&mut self, ty: &str, name: &str, value: &str, array_size: usize) {
        let decl = if array_size == 0 {
            format!("{ty} {name} = {value}")
        } else {
            format!("{ty} {name}[{array_size}] = {ty}[]({value})")
        };
        if !self.constants.iter().any(|c| *c == decl) {
            self.constants.push(decl);
        }
    }

    /// Add a helper function unless one with the same name was added before.
    pub fn add_function(&mut self, text: &str) {
        let text = text.trim();
        let name = text.split('(').next().unwrap_or(text).trim().to_string();
        if self.functions.iter().any(|(n, _)| *n == name) {
            return;
        }
        self.functions.push((name, text.to_string()));
    }

    /// Lookup by bare identifier or by the full `type name` head.
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.iter().any(|(head, _)| head == name || function_name(head) == name)
    }

    pub fn write_header(&mut self, text: &str) {
        self.header.push_str(text);
        self.header.push('\n');
    }

    pub fn set_geom_passthrough(&mut self, passthrough: bool) {
        self.geom_passthrough = passthrough;
    }

    /// Append a line to an explicit segment.
    pub fn insert_at(&mut self, segment: Segment, text: &str) {
        let line = format!("{}{}\n", "\t".repeat(self.tab), text);
        self.segment_mut(segment).push_str(&line);
    }

    /// Append a line to the segment selected by the current write mode.
    pub fn write(&mut self, text: &str) {
        let target = self.mode.target();
        self.insert_at(target, text);
    }

    pub fn write_attrib(&mut self, text: &str) {
        self.insert_at(Segment::Attribs, text);
    }

    /// Prepend a line to the init segment. With `unique`, an identical line already present is kept as is.
    pub fn write_init(&mut self, text: &str, unique: bool) {
        let line = format!("{}{}\n", "\t".repeat(self.tab), text);
        if unique && self.init.contains(&line) {
            return;
        }
        self.init.insert_str(0, &line);
    }

    /// Route subsequent `write` calls to `segment` until the matching `pop_mode`.
    pub fn push_mode(&mut self, segment: Segment) {
        if let Some(c) = self.mode.counter(segment) {
            *c += 1;
        }
    }

    pub fn pop_mode(&mut self, segment: Segment) {
        if let Some(c) = self.mode.counter(segment) {
            *c = c.saturating_sub(1);
        }
    }

    pub fn indent(&mut self) {
        self.tab += 1;
    }

    pub fn unindent(&mut self) {
        self.tab = self.tab.saturating_sub(1).max(1);
    }

    /// Textual replacement over the main segment.
    pub fn replace(&mut self, old: &str, new: &str) {
        self.main = self.main.replace(old, new);
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.main.contains(needle)
            || self.init.contains(needle)
            || self.normal.contains(needle)
            || self.ins.iter().any(|i| i.contains(needle))
            || self.textures.contains(needle)
            || self.attribs.contains(needle)
    }

    fn segment_mut(&mut self, segment: Segment) -> &mut String {
        match segment {
            Segment::Attribs => &mut self.attribs,
            Segment::Textures => &mut self.textures,
            Segment::Normal => &mut self.normal,
            Segment::Init => &mut self.init,
            Segment::Main => &mut self.main,
        }
    }

    pub fn segment(&self, segment: Segment) -> &str {
        match segment {
            Segment::Attribs => &self.attribs,
            Segment::Textures => &self.textures,
            Segment::Normal => &self.normal,
            Segment::Init => &self.init,
            Segment::Main => &self.main,
        }
    }

    /// Body of `main()`: attribs, textures, normal, init, main.
    pub fn main_body(&self) -> String {
        [
            &self.attribs,
            &self.textures,
            &self.normal,
            &self.init,
            &self.main,
        ]
        .into_iter()
        .fold(String::new(), |mut acc, s| {
            acc.push_str(s);
            acc
        })
    }

    /// Serialize the stage. `vertex_elements` feeds the implicit vertex inputs.
    pub fn get(&self, vertex_elements: &[VertexElement]) -> String {
        let mut s = String::new();
        s.push_str(GLSL_VERSION);
        s.push('\n');
        s.push_str(&self.header);

        let mut ins = self.ins.clone();
        let mut outs = self.outs.clone();
        let mut tc_lines: Vec<String> = Vec::new();
        let (in_ext, out_ext) = match self.stage {
            ShaderStage::Vert => {
                if ins.is_empty() {
                    ins = vertex_elements
                        .iter()
                        .map(|e| format!("{} {}", e.data.glsl_type(), e.name))
                        .collect();
                }
                ("", "")
            }
            ShaderStage::Tesc => {
                s.push_str("layout(vertices = 3) out;\n");
                for decl in &self.ins {
                    let Some((ty, name)) = decl.rsplit_once(' ') else {
                        continue;
                    };
                    let tc = format!("tc_{name}");
                    outs.push(format!("{ty} {tc}"));
                    tc_lines.push(format!(
                        "\t{tc}[gl_InvocationID] = {name}[gl_InvocationID];\n"
                    ));
                }
                ("[]", "[]")
            }
            ShaderStage::Tese => {
                s.push_str("layout(triangles, equal_spacing, ccw) in;\n");
                ("[]", "")
            }
            ShaderStage::Geom => {
                s.push_str("layout(triangles) in;\n");
                if !self.geom_passthrough {
                    s.push_str("layout(triangle_strip) out;\n");
                    s.push_str("layout(max_vertices=3) out;\n");
                }
                ("[]", "")
            }
            ShaderStage::Frag => ("", ""),
        };

        for u in &self.uniforms_top {
            s.push_str(&format!("uniform {u};\n"));
        }
        for inc in &self.includes {
            s.push_str(&format!("#include \"{inc}\"\n"));
        }
        if self.stage == ShaderStage::Geom && self.geom_passthrough {
            s.push_str("layout(passthrough) in gl_PerVertex { vec4 gl_Position; } gl_in[];\n");
        }
        for i in &ins {
            s.push_str(&format!("in {i}{in_ext};\n"));
        }
        if !(self.stage == ShaderStage::Geom && self.geom_passthrough) {
            for o in &outs {
                s.push_str(&format!("out {o}{out_ext};\n"));
            }
        }
        for u in &self.uniforms {
            s.push_str(&format!("uniform {u};\n"));
        }
        for c in &self.constants {
            s.push_str(&format!("const {c};\n"));
        }
        for (_, f) in &self.functions {
            s.push_str(f);
            s.push('\n');
        }

        s.push_str("void main() {\n");
        for l in &tc_lines {
            s.push_str(l);
        }
        s.push_str(&self.main_body());
        s.push_str("}\n");
        s
    }
}

fn function_name(head: &str) -> &str {
    head.rsplit(char::is_whitespace).next().unwrap_or(head)
}
