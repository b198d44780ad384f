//! Transform and unit codecs shared by the reader and the writer.
//!
//! 3MF stores affine transforms as 12 space-separated values laid out as the
//! four columns of a 3x4 matrix (the fourth row is implicitly `0 0 0 1`).
//! The model-config sidecar additionally stores full 4x4 matrices as 16
//! row-major values under the `matrix` metadata key.

use nalgebra::{Matrix4, Vector3};

/// Number of values in a 3MF `transform` attribute.
const TRANSFORM_VALUE_COUNT: usize = 12;

/// Number of values in a model-config `matrix` metadata entry.
const MATRIX_VALUE_COUNT: usize = 16;

/// Parse a 3MF `transform` attribute into a 4x4 affine matrix.
///
/// An empty string means the identity transform; any token count other than
/// 12 also falls back to the identity. Individual tokens that fail to parse
/// contribute 0, matching the C locale `atof` behavior the format grew up
/// with.
pub fn transform_from_attribute(text: &str) -> Matrix4<f64> {
    let mut matrix = Matrix4::identity();
    if text.is_empty() {
        return matrix;
    }

    let values: Vec<&str> = text.split_whitespace().collect();
    if values.len() != TRANSFORM_VALUE_COUNT {
        return matrix;
    }

    // stored as 4 columns of 3 rows each
    let mut tokens = values.iter();
    for c in 0..4 {
        for r in 0..3 {
            matrix[(r, c)] = tokens.next().unwrap().parse().unwrap_or(0.0);
        }
    }
    matrix
}

/// Serialize a 4x4 affine matrix as a 3MF `transform` attribute.
///
/// Emits the 12 values in the same column-major order the parser expects,
/// separated by single spaces. Values use the shortest representation that
/// parses back to the identical float.
pub fn transform_to_attribute(matrix: &Matrix4<f64>) -> String {
    let mut out = String::new();
    for c in 0..4 {
        for r in 0..3 {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&matrix[(r, c)].to_string());
        }
    }
    out
}

/// Parse a 16-value row-major matrix string (the `matrix` volume metadata).
///
/// Falls back to the identity on any token count other than 16.
pub fn matrix_from_string(text: &str) -> Matrix4<f64> {
    let mut matrix = Matrix4::identity();
    let values: Vec<&str> = text.split_whitespace().collect();
    if values.len() != MATRIX_VALUE_COUNT {
        return matrix;
    }

    let mut tokens = values.iter();
    for r in 0..4 {
        for c in 0..4 {
            matrix[(r, c)] = tokens.next().unwrap().parse().unwrap_or(0.0);
        }
    }
    matrix
}

/// Serialize a 4x4 matrix as the 16-value row-major `matrix` metadata string.
pub fn matrix_to_string(matrix: &Matrix4<f64>) -> String {
    let mut out = String::new();
    for r in 0..4 {
        for c in 0..4 {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&matrix[(r, c)].to_string());
        }
    }
    out
}

/// Per-axis scale factors of an affine matrix (norms of the linear columns).
pub fn scaling_factor(matrix: &Matrix4<f64>) -> Vector3<f64> {
    Vector3::new(
        matrix.fixed_view::<3, 1>(0, 0).norm(),
        matrix.fixed_view::<3, 1>(0, 1).norm(),
        matrix.fixed_view::<3, 1>(0, 2).norm(),
    )
}

/// Scale factor converting a 3MF length unit to millimeters.
///
/// Unknown units default to millimeters, as 3MF Core requires.
pub fn unit_factor(unit: &str) -> f32 {
    match unit {
        "micron" => 0.001,
        "centimeter" => 10.0,
        "inch" => 25.4,
        "foot" => 304.8,
        "meter" => 1000.0,
        _ => 1.0,
    }
}
