//! Utility functions for GLSL text generation.

use crate::dsl::{Socket, SocketDefault, SocketType};

use super::types::{TypedExpr, ValueType};

/// Format a float as a GLSL literal in its shortest round-trip form, always with a decimal point.
pub fn fmt_f32(v: f32) -> String {
    if v.is_finite() {
        let s = format!("{v}");
        if s.contains('.') { s } else { format!("{s}.0") }
    } else {
        "0.0".to_string()
    }
}

pub fn vec3_literal(v: [f32; 3]) -> String {
    format!("vec3({}, {}, {})", fmt_f32(v[0]), fmt_f32(v[1]), fmt_f32(v[2]))
}

/// First three components of a default, padding short ones with zeros.
pub fn to_vec3(values: &[f32]) -> [f32; 3] {
    let at = |i: usize| values.get(i).copied().unwrap_or(0.0);
    [at(0), at(1), at(2)]
}

/// Literal for an unconnected socket, shaped by the socket type.
pub fn socket_default_expr(socket: &Socket) -> TypedExpr {
    let ty = ValueType::of_socket(socket.socket_type);
    let values: Vec<f32> = match &socket.default {
        Some(SocketDefault::Scalar(v)) => vec![*v],
        Some(SocketDefault::Vector(v)) => v.clone(),
        None => Vec::new(),
    };
    match ty {
        ValueType::Vec3 if values.len() == 1 => {
            TypedExpr::vec3(format!("vec3({})", fmt_f32(values[0])))
        }
        ValueType::Vec3 => TypedExpr::vec3(vec3_literal(to_vec3(&values))),
        _ => TypedExpr::float(fmt_f32(values.first().copied().unwrap_or(0.0))),
    }
}

/// Sanitize a string to be a valid GLSL identifier.
pub fn sanitize_glsl_ident(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 1);
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, 'n');
    }
    // GLSL reserves `gl_` prefixes and double underscores.
    while out.contains("__") {
        out = out.replace("__", "_");
    }
    if out.starts_with("gl_") {
        out.insert(0, 'n');
    }
    out
}

/// Local variable name derived from a node id, e.g. `node_var("Image Texture", "store")`.
pub fn node_var(node_id: &str, suffix: &str) -> String {
    format!("{}_{}", sanitize_glsl_ident(node_id), suffix)
}

pub fn rgb_to_bw(expr: &str) -> String {
    format!("dot({expr}, vec3(0.2126, 0.7152, 0.0722))")
}

/// Convert a value produced for one socket type into what another socket type expects.
pub fn cast_value(value: TypedExpr, to: SocketType) -> TypedExpr {
    let target = ValueType::of_socket(to);
    match (value.ty, target) {
        (a, b) if a == b => value,
        (ValueType::Float, ValueType::Vec3) => TypedExpr::vec3(format!("vec3({})", value.expr)),
        (ValueType::Vec3, ValueType::Float) => TypedExpr::float(rgb_to_bw(&value.expr)),
        (ValueType::Vec2, ValueType::Vec3) => {
            TypedExpr::vec3(format!("vec3({}, 0.0)", value.expr))
        }
        (ValueType::Vec4, ValueType::Vec3) => TypedExpr::vec3(format!("{}.rgb", value.expr)),
        (_, ValueType::Float) => TypedExpr::float(format!("{}.x", value.expr)),
        (_, _) => TypedExpr::neutral(target),
    }
}

/// Split the arguments of a top-level constructor call such as `vec3(a, f(b, c), 0.0)`.
pub fn constructor_args<'a>(expr: &'a str, ctor: &str) -> Option<Vec<&'a str>> {
    let inner = expr.strip_prefix(ctor)?.strip_prefix('(')?.strip_suffix(')')?;
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, ch) in inner.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            ',' if depth == 0 => {
                args.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    args.push(inner[start..].trim());
    Some(args)
}

/// Select one component of a vec3 expression, folding literal constructors.
pub fn vec3_component(expr: &str, index: usize) -> String {
    if let Some(args) = constructor_args(expr, "vec3") {
        if args.len() == 3 {
            return args[index].to_string();
        }
        if args.len() == 1 {
            return args[0].to_string();
        }
    }
    let swizzle = ["x", "y", "z"][index.min(2)];
    format!("{expr}.{swizzle}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_keep_a_decimal() {
        assert_eq!(fmt_f32(1.0), "1.0");
        assert_eq!(fmt_f32(0.5), "0.5");
        assert_eq!(fmt_f32(-2.25), "-2.25");
        assert_eq!(fmt_f32(f32::NAN), "0.0");
    }

    #[test]
    fn constructor_args_respects_nesting() {
        assert_eq!(
            constructor_args("vec3(a, f(b, c), 0.0)", "vec3"),
            Some(vec!["a", "f(b, c)", "0.0"])
        );
        assert_eq!(constructor_args("vec3(a) + vec3(b)", "vec3"), None);
        assert_eq!(constructor_args("n", "vec3"), None);
    }

    #[test]
    fn component_folds_literal_constructors() {
        assert_eq!(vec3_component("vec3(texCoord.x, texCoord.y, 0.0)", 0), "texCoord.x");
        assert_eq!(vec3_component("vec3(0.5)", 2), "0.5");
        assert_eq!(vec3_component("wposition", 1), "wposition.y");
        assert_eq!(vec3_component("(a + vec3(b))", 2), "(a + vec3(b)).z");
    }

    #[test]
    fn identifiers_are_sanitized() {
        assert_eq!(sanitize_glsl_ident("Image Texture.001"), "Image_Texture_001");
        assert_eq!(sanitize_glsl_ident("1st"), "n1st");
        assert_eq!(sanitize_glsl_ident("gl_x"), "ngl_x");
        assert_eq!(sanitize_glsl_ident("a  b"), "a_b");
    }

    #[test]
    fn casts_between_socket_types() {
        let v = cast_value(TypedExpr::float("x"), SocketType::Rgba);
        assert_eq!(v, TypedExpr::vec3("vec3(x)"));
        let f = cast_value(TypedExpr::vec3("c"), SocketType::Value);
        assert_eq!(f.expr, "dot(c, vec3(0.2126, 0.7152, 0.0722))");
    }

    #[test]
    fn socket_defaults_become_literals() {
        let color = Socket {
            id: "Base Color".into(),
            name: None,
            socket_type: SocketType::Rgba,
            default: Some(SocketDefault::Vector(vec![0.8, 0.5, 0.25, 1.0])),
        };
        assert_eq!(socket_default_expr(&color).expr, "vec3(0.8, 0.5, 0.25)");
        let fac = Socket {
            id: "Fac".into(),
            name: None,
            socket_type: SocketType::Value,
            default: Some(SocketDefault::Vector(vec![0.3])),
        };
        assert_eq!(socket_default_expr(&fac), TypedExpr::float("0.3"));
    }
}
