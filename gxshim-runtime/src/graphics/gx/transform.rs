/// GX matrix operations. Position, normal and texture matrices are 3x4
/// row-major; the projection is a row-major 4x4.

/// Identity 3x4 matrix (row-major).
pub const IDENTITY_3X4: [f32; 12] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0,
];

/// Projection kind as encoded in the transform unit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProjectionType {
    #[default]
    Perspective = 0,
    Orthographic = 1,
}

impl ProjectionType {
    pub fn from_bits(bits: u32) -> Self {
        if bits & 1 == 0 {
            Self::Perspective
        } else {
            Self::Orthographic
        }
    }
}

/// Current projection. The matrix is kept whole so the power-on identity
/// survives; `params` recovers the six hardware parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub kind: ProjectionType,
    /// Row-major 4x4.
    pub matrix: [f32; 16],
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            kind: ProjectionType::Perspective,
            matrix: identity_4x4(),
        }
    }
}

impl Projection {
    pub fn from_matrix(matrix: &[f32; 16], kind: ProjectionType) -> Self {
        Self {
            kind,
            matrix: *matrix,
        }
    }

    /// Build from the six hardware parameters.
    pub fn from_params(kind: ProjectionType, p: [f32; 6]) -> Self {
        let matrix = match kind {
            ProjectionType::Perspective => [
                p[0], 0.0, p[1], 0.0, //
                0.0, p[2], p[3], 0.0, //
                0.0, 0.0, p[4], p[5], //
                0.0, 0.0, -1.0, 0.0,
            ],
            ProjectionType::Orthographic => [
                p[0], 0.0, 0.0, p[1], //
                0.0, p[2], 0.0, p[3], //
                0.0, 0.0, p[4], p[5], //
                0.0, 0.0, 0.0, 1.0,
            ],
        };
        Self { kind, matrix }
    }

    /// The six parameters GXSetProjection extracts from the matrix.
    pub fn params(&self) -> [f32; 6] {
        let m = &self.matrix;
        match self.kind {
            ProjectionType::Perspective => [m[0], m[2], m[5], m[6], m[10], m[11]],
            ProjectionType::Orthographic => [m[0], m[3], m[5], m[7], m[10], m[11]],
        }
    }
}

/// Expand a 3x4 row-major matrix to 4x4 by appending (0, 0, 0, 1).
pub fn expand_3x4(m: &[f32; 12]) -> [f32; 16] {
    let mut out = [0.0; 16];
    out[..12].copy_from_slice(m);
    out[15] = 1.0;
    out
}

/// Row-major 4x4 product `a * b`.
pub fn mul_4x4(a: &[f32; 16], b: &[f32; 16]) -> [f32; 16] {
    let mut out = [0.0; 16];
    for row in 0..4 {
        for col in 0..4 {
            out[row * 4 + col] = (0..4).map(|k| a[row * 4 + k] * b[k * 4 + col]).sum();
        }
    }
    out
}

/// Convert a 3x3 normal matrix to 3x4 with a zero translation column.
pub fn normal_to_3x4(m: &[f32; 9]) -> [f32; 12] {
    [
        m[0], m[1], m[2], 0.0, //
        m[3], m[4], m[5], 0.0, //
        m[6], m[7], m[8], 0.0,
    ]
}

pub fn identity_4x4() -> [f32; 16] {
    expand_3x4(&IDENTITY_3X4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_projection_is_identity() {
        let proj = Projection::default();
        assert_eq!(proj.kind, ProjectionType::Perspective);
        assert_eq!(proj.matrix, identity_4x4());
    }

    #[test]
    fn perspective_params_round_trip() {
        let params = [1.5, 0.1, 2.0, -0.2, -1.01, -0.1];
        let proj = Projection::from_params(ProjectionType::Perspective, params);
        assert_eq!(proj.params(), params);
        assert_eq!(proj.matrix[14], -1.0);
    }

    #[test]
    fn orthographic_params_round_trip() {
        let params = [0.003, -1.0, -0.004, 1.0, -0.5, -0.5];
        let proj = Projection::from_params(ProjectionType::Orthographic, params);
        assert_eq!(proj.params(), params);
        assert_eq!(proj.matrix[15], 1.0);
    }

    #[test]
    fn multiply_applies_translation() {
        let mut t = IDENTITY_3X4;
        t[3] = 5.0;
        t[7] = -2.0;
        let m = mul_4x4(&identity_4x4(), &expand_3x4(&t));
        assert_eq!(m[3], 5.0);
        assert_eq!(m[7], -2.0);
        assert_eq!(m[15], 1.0);
    }

    #[test]
    fn normal_matrix_has_no_translation() {
        let m = normal_to_3x4(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(m[3], 0.0);
        assert_eq!(m[4], 4.0);
        assert_eq!(m[11], 0.0);
    }
}
