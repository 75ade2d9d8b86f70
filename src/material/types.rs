//! Core type definitions for generated expressions.

use crate::dsl::SocketType;

/// GLSL value type for shader expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Float,
    Vec2,
    Vec3,
    Vec4,
}

impl ValueType {
    /// Returns the GLSL type name for this value type.
    pub fn glsl(self) -> &'static str {
        match self {
            ValueType::Float => "float",
            ValueType::Vec2 => "vec2",
            ValueType::Vec3 => "vec3",
            ValueType::Vec4 => "vec4",
        }
    }

    /// Type a socket carries in generated code.
    pub fn of_socket(socket_type: SocketType) -> Self {
        if socket_type.is_vector() {
            ValueType::Vec3
        } else {
            ValueType::Float
        }
    }
}

/// A typed GLSL expression.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedExpr {
    pub ty: ValueType,
    pub expr: String,
}

impl TypedExpr {
    pub fn new(expr: impl Into<String>, ty: ValueType) -> Self {
        Self {
            ty,
            expr: expr.into(),
        }
    }

    pub fn float(expr: impl Into<String>) -> Self {
        Self::new(expr, ValueType::Float)
    }

    pub fn vec3(expr: impl Into<String>) -> Self {
        Self::new(expr, ValueType::Vec3)
    }

    /// Neutral value used when a node cannot be translated.
    pub fn neutral(ty: ValueType) -> Self {
        match ty {
            ValueType::Float => Self::float("0.0"),
            ValueType::Vec2 => Self::new("vec2(0.0, 0.0)", ty),
            ValueType::Vec3 => Self::vec3("vec3(0.0, 0.0, 0.0)"),
            ValueType::Vec4 => Self::new("vec4(0.0, 0.0, 0.0, 0.0)", ty),
        }
    }
}

impl std::fmt::Display for TypedExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expr)
    }
}
