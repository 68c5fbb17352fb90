//! Deterministic 2-D projection of embeddings.
//!
//! Each input dimension gets a fixed pseudo-random sign per axis, so the same vector
//! always lands on the same point and nearby vectors land near each other.

use crate::domain::models::Projection;

const X_SEED: u64 = 0x9E37_79B9_7F4A_7C15;
const Y_SEED: u64 = 0xC2B2_AE3D_27D4_EB4F;

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn sign(index: usize, seed: u64) -> f32 {
    if splitmix64(index as u64 ^ seed) & 1 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Signed random projection onto two axes, scaled by `1/sqrt(d)`.
pub fn project(vector: &[f32]) -> Projection {
    if vector.is_empty() {
        return Projection { x: 0.0, y: 0.0 };
    }

    let (x, y) = vector.iter().enumerate().fold((0.0_f32, 0.0_f32), |(x, y), (i, v)| {
        (x + v * sign(i, X_SEED), y + v * sign(i, Y_SEED))
    });
    let scale = (vector.len() as f32).sqrt();

    Projection {
        x: x / scale,
        y: y / scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_is_deterministic() {
        let v = vec![0.1, -0.4, 0.3, 0.8, 0.05];
        assert_eq!(project(&v), project(&v));
    }

    #[test]
    fn test_empty_vector_projects_to_origin() {
        assert_eq!(project(&[]), Projection { x: 0.0, y: 0.0 });
    }

    #[test]
    fn test_projection_is_linear_in_scale() {
        let v = vec![0.2, 0.4, -0.1, 0.7];
        let doubled: Vec<f32> = v.iter().map(|x| x * 2.0).collect();
        let p = project(&v);
        let q = project(&doubled);
        assert!((q.x - 2.0 * p.x).abs() < 1e-6);
        assert!((q.y - 2.0 * p.y).abs() < 1e-6);
    }
}
