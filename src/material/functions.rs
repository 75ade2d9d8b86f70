//! GLSL helper functions emitted on demand by translators.
//!
//! Each constant is registered through `ShaderBuffer::add_function`, which
//! dedups by the text before the first `(`; keep the function signature first.

pub const SAFE_DIVIDE: &str = "
vec3 safe_divide(const vec3 a, const vec3 b) {
\treturn vec3((b.x != 0.0) ? a.x / b.x : 0.0,
\t            (b.y != 0.0) ? a.y / b.y : 0.0,
\t            (b.z != 0.0) ? a.z / b.z : 0.0);
}
";

pub const SAFE_DIVIDE_FLOAT: &str = "
float safe_divide(const float a, const float b) {
\treturn (b != 0.0) ? a / b : 0.0;
}
";

pub const PROJECT: &str = "
vec3 project(const vec3 v, const vec3 v_proj) {
\tfloat len_sq = dot(v_proj, v_proj);
\treturn (len_sq != 0.0) ? (dot(v, v_proj) / len_sq) * v_proj : vec3(0.0);
}
";

pub const WRAP: &str = "
float wrap(const float value, const float max, const float min) {
\tfloat range = max - min;
\treturn (range != 0.0) ? value - (range * floor((value - min) / range)) : min;
}
";

pub const WRAP_VEC3: &str = "
vec3 wrap(const vec3 value, const vec3 max, const vec3 min) {
\treturn vec3(wrap(value.x, max.x, min.x),
\t            wrap(value.y, max.y, min.y),
\t            wrap(value.z, max.z, min.z));
}
";

pub const SNAP: &str = "
vec3 snap(const vec3 a, const vec3 b) {
\treturn floor(safe_divide(a, b)) * b;
}
";

pub const FRESNEL: &str = "
float fresnel(float eta, float c) {
\tfloat g = eta * eta - 1.0 + c * c;
\tif (g < 0.0) return 1.0;
\tg = sqrt(g);
\tfloat a = (g - c) / (g + c);
\tfloat b = ((g + c) * c - 1.0) / ((g - c) * c + 1.0);
\treturn 0.5 * a * a * (1.0 + b * b);
}
";

pub const HSV_TO_RGB: &str = "
vec3 hsv_to_rgb(const vec3 c) {
\tconst vec4 K = vec4(1.0, 2.0 / 3.0, 1.0 / 3.0, 3.0);
\tvec3 p = abs(fract(c.xxx + K.xyz) * 6.0 - K.www);
\treturn c.z * mix(K.xxx, clamp(p - K.xxx, 0.0, 1.0), c.y);
}
";

pub const RGB_TO_HSV: &str = "
vec3 rgb_to_hsv(const vec3 c) {
\tconst vec4 K = vec4(0.0, -1.0 / 3.0, 2.0 / 3.0, -1.0);
\tvec4 p = mix(vec4(c.bg, K.wz), vec4(c.gb, K.xy), step(c.b, c.g));
\tvec4 q = mix(vec4(p.xyw, c.r), vec4(c.r, p.yzx), step(p.x, c.r));
\tfloat d = q.x - min(q.w, q.y);
\tfloat e = 1.0e-10;
\treturn vec3(abs(q.z + (q.w - q.y) / (6.0 * d + e)), d / (q.x + e), q.x);
}
";

/// Needs [`HSV_TO_RGB`] and [`RGB_TO_HSV`] registered first.
pub const HUE_SAT: &str = "
vec3 hue_sat(const vec3 col, const vec4 shift) {
\tvec3 hsv = rgb_to_hsv(col);
\thsv.x += shift.x;
\thsv.y *= shift.y;
\thsv.z *= shift.z;
\treturn mix(hsv_to_rgb(hsv), col, shift.w);
}
";

pub const BRIGHT_CONTRAST: &str = "
vec3 brightcontrast(const vec3 col, const float bright, const float contr) {
\tfloat a = 1.0 + contr;
\tfloat b = bright - contr * 0.5;
\treturn max(a * col + b, 0.0);
}
";

pub const MAP_RANGE_LINEAR: &str = "
float map_range_linear(const float value, const float from_min, const float from_max, const float to_min, const float to_max) {
\tif (from_max == from_min) return 0.0;
\treturn to_min + ((value - from_min) / (from_max - from_min)) * (to_max - to_min);
}
";

pub const MAP_RANGE_STEPPED: &str = "
float map_range_stepped(const float value, const float from_min, const float from_max, const float to_min, const float to_max, const float steps) {
\tif (from_max == from_min) return 0.0;
\tfloat factor = (value - from_min) / (from_max - from_min);
\tfactor = (steps > 0.0) ? floor(factor * (steps + 1.0)) / steps : 0.0;
\treturn to_min + factor * (to_max - to_min);
}
";

pub const MAP_RANGE_SMOOTHSTEP: &str = "
float map_range_smoothstep(const float value, const float from_min, const float from_max, const float to_min, const float to_max) {
\tif (from_max == from_min) return 0.0;
\tfloat factor = (from_min > from_max) ? 1.0 - smoothstep(from_max, from_min, value) : smoothstep(from_min, from_max, value);
\treturn to_min + factor * (to_max - to_min);
}
";

/// Needs [`SAFE_DIVIDE_FLOAT`] registered first.
pub const MAP_RANGE_SMOOTHERSTEP: &str = "
float map_range_smootherstep(const float value, const float from_min, const float from_max, const float to_min, const float to_max) {
\tif (from_max == from_min) return 0.0;
\tfloat lo = min(from_min, from_max);
\tfloat hi = max(from_min, from_max);
\tfloat x = clamp(safe_divide(value - lo, hi - lo), 0.0, 1.0);
\tfloat factor = x * x * x * (x * (x * 6.0 - 15.0) + 10.0);
\tif (from_min > from_max) factor = 1.0 - factor;
\treturn to_min + factor * (to_max - to_min);
}
";

pub const TEX_CHECKER: &str = "
vec3 tex_checker(const vec3 co, const vec3 col1, const vec3 col2, const float scale) {
\tvec3 p = (co + 0.000001 * 0.999999) * scale;
\tfloat xi = abs(floor(p.x));
\tfloat yi = abs(floor(p.y));
\tfloat zi = abs(floor(p.z));
\tbool check = ((mod(xi, 2.0) == mod(yi, 2.0)) == bool(mod(zi, 2.0)));
\treturn check ? col1 : col2;
}
";

pub const TEX_CHECKER_FAC: &str = "
float tex_checker_f(const vec3 co, const float scale) {
\tvec3 p = (co + 0.000001 * 0.999999) * scale;
\tfloat xi = abs(floor(p.x));
\tfloat yi = abs(floor(p.y));
\tfloat zi = abs(floor(p.z));
\treturn float((mod(xi, 2.0) == mod(yi, 2.0)) == bool(mod(zi, 2.0)));
}
";

/// Value noise building blocks shared by the procedural textures.
pub const HASH: &str = "
float hash_f(const vec3 co) {
\treturn fract(sin(dot(co, vec3(12.9898, 78.233, 52.8265)) * 24.384) * 43758.5453);
}
";

/// Needs [`HASH`] registered first.
pub const NOISE: &str = "
float noise(const vec3 x) {
\tvec3 i = floor(x);
\tvec3 f = fract(x);
\tvec3 u = f * f * (3.0 - 2.0 * f);
\treturn mix(mix(mix(hash_f(i), hash_f(i + vec3(1, 0, 0)), u.x),
\t               mix(hash_f(i + vec3(0, 1, 0)), hash_f(i + vec3(1, 1, 0)), u.x), u.y),
\t           mix(mix(hash_f(i + vec3(0, 0, 1)), hash_f(i + vec3(1, 0, 1)), u.x),
\t               mix(hash_f(i + vec3(0, 1, 1)), hash_f(i + vec3(1, 1, 1)), u.x), u.y), u.z);
}
";

/// Needs [`NOISE`] registered first.
pub const FRACTAL_NOISE: &str = "
float fractal_noise(const vec3 p, const float o) {
\tfloat fscale = 1.0;
\tfloat amp = 1.0;
\tfloat sum = 0.0;
\tfloat octaves = clamp(o, 0.0, 16.0);
\tint n = int(octaves);
\tfor (int i = 0; i <= n; i++) {
\t\tsum += noise(fscale * p) * amp;
\t\tamp *= 0.5;
\t\tfscale *= 2.0;
\t}
\tfloat rmd = octaves - floor(octaves);
\tif (rmd != 0.0) {
\t\tfloat sum2 = sum + noise(fscale * p) * amp;
\t\tsum *= float(pow(2.0, float(n))) / float(pow(2.0, float(n + 1)) - 1.0);
\t\tsum2 *= float(pow(2.0, float(n + 1))) / float(pow(2.0, float(n + 2)) - 1.0);
\t\treturn (1.0 - rmd) * sum + rmd * sum2;
\t}
\treturn sum * float(pow(2.0, float(n))) / float(pow(2.0, float(n + 1)) - 1.0);
}
";

/// Needs [`FRACTAL_NOISE`] registered first.
pub const TEX_NOISE: &str = "
float tex_noise(const vec3 p, const float detail, const float distortion) {
\tvec3 pk = p;
\tif (distortion != 0.0) {
\t\tpk += vec3(noise(p) * distortion);
\t}
\treturn fractal_noise(pk, detail);
}
";

pub const ROTATE_AROUND_AXIS: &str = "
vec3 rotate_around_axis(const vec3 p, const vec3 axis, const float angle) {
\tfloat c = cos(angle);
\tfloat s = sin(angle);
\tfloat t = 1.0 - c;
\tmat3 r = mat3(
\t\tc + t * axis.x * axis.x, t * axis.x * axis.y + axis.z * s, t * axis.x * axis.z - axis.y * s,
\t\tt * axis.x * axis.y - axis.z * s, c + t * axis.y * axis.y, t * axis.y * axis.z + axis.x * s,
\t\tt * axis.x * axis.z + axis.y * s, t * axis.y * axis.z - axis.x * s, c + t * axis.z * axis.z);
\treturn r * p;
}
";

pub const EULER_TO_MAT3: &str = "
mat3 euler_to_mat3(vec3 euler) {
\tfloat cx = cos(euler.x);
\tfloat cy = cos(euler.y);
\tfloat cz = cos(euler.z);
\tfloat sx = sin(euler.x);
\tfloat sy = sin(euler.y);
\tfloat sz = sin(euler.z);
\treturn mat3(
\t\tcy * cz, cy * sz, -sy,
\t\tsy * sx * cz - cx * sz, sy * sx * sz + cx * cz, cy * sx,
\t\tsy * cx * cz + sx * sz, sy * cx * sz - sx * cz, cy * cx);
}
";

/// Direction to equirectangular texture coordinates.
pub const ENV_MAP_EQUIRECT: &str = "
vec2 envMapEquirect(const vec3 normal) {
\tconst float PI = 3.1415926535;
\tfloat phi = acos(normal.z);
\tfloat theta = atan(-normal.y, normal.x) + PI;
\treturn vec2(theta / (2.0 * PI), phi / PI);
}
";
