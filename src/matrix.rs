//! Color matrices and time-varying matrix providers.
//!
//! Matrices are 4x4, column-major, and multiply RGBA column vectors: flat
//! index `col * 4 + row`. Applying the identity matrix leaves a frame
//! unchanged.

/// A 4x4 RGBA color transformation matrix in column-major order.
pub type ColorMatrix = [f32; 16];

/// The identity color matrix.
pub fn identity() -> ColorMatrix {
    let mut m = [0.0; 16];
    m[0] = 1.0;
    m[5] = 1.0;
    m[10] = 1.0;
    m[15] = 1.0;
    m
}

/// Matrix that replaces R, G and B with BT.709 luma, preserving alpha.
pub fn grayscale() -> ColorMatrix {
    let (lr, lg, lb) = (0.2126, 0.7152, 0.0722);
    [
        lr, lr, lr, 0.0, //
        lg, lg, lg, 0.0, //
        lb, lb, lb, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

/// Matrix that inverts R, G and B of an opaque frame, preserving alpha.
///
/// The constant term rides on the homogeneous alpha component, so this only
/// inverts correctly for alpha = 1 inputs.
pub fn inverted() -> ColorMatrix {
    [
        -1.0, 0.0, 0.0, 0.0, //
        0.0, -1.0, 0.0, 0.0, //
        0.0, 0.0, -1.0, 0.0, //
        1.0, 1.0, 1.0, 1.0,
    ]
}

/// Returns true if every matrix entry is a finite number.
pub fn is_finite(matrix: &ColorMatrix) -> bool {
    matrix.iter().all(|v| v.is_finite())
}

/// CPU reference multiply: `matrix * color`, column vectors.
pub fn transform(matrix: &ColorMatrix, color: [f32; 4]) -> [f32; 4] {
    let mut out = [0.0; 4];
    for (col, component) in color.iter().enumerate() {
        for row in 0..4 {
            out[row] += matrix[col * 4 + row] * component;
        }
    }
    out
}

/// Produces the color matrix to apply at a given presentation timestamp.
///
/// Implementations must return finite values. Providers are owned by the
/// caller and shared with stages via `Arc`.
pub trait ColorMatrixProvider: Send + Sync {
    /// The matrix for the frame presented at `presentation_time_us`.
    fn matrix(&self, presentation_time_us: i64) -> ColorMatrix;
}

/// A provider returning the same matrix for every frame.
#[derive(Debug, Clone, Copy)]
pub struct StaticColorMatrix(pub ColorMatrix);

impl ColorMatrixProvider for StaticColorMatrix {
    fn matrix(&self, _presentation_time_us: i64) -> ColorMatrix {
        self.0
    }
}

/// Linear fade between two matrices over a presentation-time range.
///
/// Before `start_us` the `from` matrix applies, after `end_us` the `to`
/// matrix applies, and in between each entry is interpolated linearly.
#[derive(Debug, Clone, Copy)]
pub struct MatrixFade {
    from: ColorMatrix,
    to: ColorMatrix,
    start_us: i64,
    end_us: i64,
}

impl MatrixFade {
    pub fn new(from: ColorMatrix, to: ColorMatrix, start_us: i64, end_us: i64) -> Self {
        Self {
            from,
            to,
            start_us,
            end_us,
        }
    }
}

impl ColorMatrixProvider for MatrixFade {
    fn matrix(&self, presentation_time_us: i64) -> ColorMatrix {
        if presentation_time_us <= self.start_us {
            return self.from;
        }
        if presentation_time_us >= self.end_us {
            return self.to;
        }

        let frac = (presentation_time_us - self.start_us) as f32
            / (self.end_us - self.start_us) as f32;
        let mut out = [0.0; 16];
        for i in 0..16 {
            out[i] = self.from[i] + (self.to[i] - self.from[i]) * frac;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform_is_noop() {
        let color = [0.25, 0.5, 0.75, 1.0];
        assert_eq!(transform(&identity(), color), color);
    }

    #[test]
    fn test_grayscale_equalizes_channels() {
        let out = transform(&grayscale(), [0.9, 0.2, 0.4, 1.0]);
        assert!((out[0] - out[1]).abs() < 1e-6);
        assert!((out[1] - out[2]).abs() < 1e-6);
        assert!((out[3] - 1.0).abs() < 1e-6);
        // Luma weights sum to 1, so white stays white
        let white = transform(&grayscale(), [1.0, 1.0, 1.0, 1.0]);
        assert!((white[0] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_inverted_flips_opaque_colors() {
        let out = transform(&inverted(), [0.9, 0.2, 0.4, 1.0]);
        assert!((out[0] - 0.1).abs() < 1e-6);
        assert!((out[1] - 0.8).abs() < 1e-6);
        assert!((out[2] - 0.6).abs() < 1e-6);
        assert!((out[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_fade_clamps_outside_range() {
        let fade = MatrixFade::new(identity(), [0.0; 16], 1_000, 2_000);
        assert_eq!(fade.matrix(0), identity());
        assert_eq!(fade.matrix(1_000), identity());
        assert_eq!(fade.matrix(2_000), [0.0; 16]);
        assert_eq!(fade.matrix(5_000), [0.0; 16]);
    }

    #[test]
    fn test_fade_midpoint_is_halfway() {
        let fade = MatrixFade::new(identity(), [0.0; 16], 0, 1_000_000);
        let mid = fade.matrix(500_000);
        assert!((mid[0] - 0.5).abs() < 1e-6);
        assert!((mid[1] - 0.0).abs() < 1e-6);
        assert!((mid[15] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_is_finite_rejects_nan_and_inf() {
        assert!(is_finite(&identity()));
        let mut bad = identity();
        bad[3] = f32::NAN;
        assert!(!is_finite(&bad));
        bad[3] = f32::INFINITY;
        assert!(!is_finite(&bad));
    }

    #[test]
    fn test_static_provider_ignores_timestamp() {
        let provider = StaticColorMatrix(grayscale());
        assert_eq!(provider.matrix(0), provider.matrix(i64::MAX));
    }
}
