//! Int8 Vector Quantization
//!
//! Packs f32 embedding vectors into signed bytes for the L2 level of the
//! distilled store. A 384-dim f32 vector (1536 bytes) becomes 384 bytes plus
//! one out-of-band f32 norm. Cosine similarity runs directly on the packed
//! representation without dequantizing.

// ============================================================================
// QUANTIZATION
// ============================================================================

/// Quantize an f32 vector to signed bytes.
///
/// Components are scaled by the maximum absolute value, clamped to [-1, 1]
/// and mapped onto [-127, 127]. Returns the packed bytes together with the
/// pre-quantization L2 norm; a norm of 0.0 denotes "no embedding" and the
/// returned bytes are all zero.
pub fn quantize(vector: &[f32]) -> (Vec<i8>, f32) {
    let norm = l2_norm(vector);
    if norm == 0.0 {
        return (vec![0i8; vector.len()], 0.0);
    }

    let max_abs = vector.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    let quantized = vector
        .iter()
        .map(|v| {
            let scaled = (v / max_abs).clamp(-1.0, 1.0) * 127.0;
            scaled.round() as i8
        })
        .collect();

    (quantized, norm)
}

/// Reconstruct an f32 vector from packed bytes and the stored norm.
///
/// Lossy inverse of [`quantize`]: the byte vector is rescaled so its L2 norm
/// matches the stored one. A zero norm round-trips to an all-zero vector.
pub fn dequantize(bytes: &[i8], norm: f32) -> Vec<f32> {
    if norm == 0.0 {
        return vec![0.0; bytes.len()];
    }

    let qnorm = int8_norm(bytes);
    if qnorm == 0.0 {
        return vec![0.0; bytes.len()];
    }

    let scale = norm / qnorm;
    bytes.iter().map(|&b| b as f32 * scale).collect()
}

/// Cosine similarity computed directly on two packed int8 vectors.
///
/// Returns dot / (|a| * |b|) over the signed-byte interpretation. Differing
/// lengths or a zero-norm operand yield 0.0.
pub fn cosine_int8(a: &[i8], b: &[i8]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot: i64 = 0;
    let mut na: i64 = 0;
    let mut nb: i64 = 0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x as i64 * y as i64;
        na += x as i64 * x as i64;
        nb += y as i64 * y as i64;
    }

    if na == 0 || nb == 0 {
        return 0.0;
    }

    dot as f32 / ((na as f64).sqrt() * (nb as f64).sqrt()) as f32
}

/// Cosine similarity between two f32 vectors.
pub fn cosine_f32(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na = l2_norm(a);
    let nb = l2_norm(b);
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

/// L2 norm of an f32 vector.
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}

fn int8_norm(bytes: &[i8]) -> f32 {
    let sum: i64 = bytes.iter().map(|&b| b as i64 * b as i64).sum();
    (sum as f64).sqrt() as f32
}

/// Reinterpret packed i8 bytes as raw u8 for storage.
pub fn as_raw_bytes(bytes: &[i8]) -> &[u8] {
    // i8 and u8 have identical layout
    unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const u8, bytes.len()) }
}

/// Reinterpret raw storage bytes as packed i8.
pub fn from_raw_bytes(bytes: &[u8]) -> &[i8] {
    unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const i8, bytes.len()) }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_known_components() {
        // 384-dim vector with known extremes
        let mut v = vec![1.0f32, 0.0, -1.0];
        v.extend(std::iter::repeat(0.5).take(381));

        let (bytes, norm) = quantize(&v);
        assert_eq!(bytes.len(), 384);
        assert_eq!(bytes[0], 127);
        assert_eq!(bytes[1], 0);
        assert_eq!(bytes[2], -127);
        assert!((norm - l2_norm(&v)).abs() < 1e-4);
    }

    #[test]
    fn test_self_cosine_near_one() {
        let mut v = vec![1.0f32, 0.0, -1.0];
        v.extend(std::iter::repeat(0.5).take(381));
        let (q, _) = quantize(&v);

        let sim = cosine_int8(&q, &q);
        assert!((0.99..=1.0).contains(&sim), "self cosine was {}", sim);
    }

    #[test]
    fn test_zero_vector_roundtrip() {
        let v = vec![0.0f32; 16];
        let (bytes, norm) = quantize(&v);
        assert_eq!(norm, 0.0);
        assert!(bytes.iter().all(|&b| b == 0));

        let back = dequantize(&bytes, norm);
        assert_eq!(back, v);
    }

    #[test]
    fn test_roundtrip_relative_error() {
        let v: Vec<f32> = (0..384)
            .map(|i| ((i as f32 * 0.731).sin() * 2.0) - 0.4)
            .collect();
        let (bytes, norm) = quantize(&v);
        let back = dequantize(&bytes, norm);

        let err: f32 = v
            .iter()
            .zip(back.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt();
        assert!(err / l2_norm(&v) < 0.02, "relative error {}", err / l2_norm(&v));
    }

    #[test]
    fn test_cosine_int8_tracks_f32() {
        let a: Vec<f32> = (0..128).map(|i| (i as f32 * 0.13).sin()).collect();
        let b: Vec<f32> = (0..128).map(|i| (i as f32 * 0.29).cos()).collect();

        let exact = cosine_f32(&a, &b);
        let (qa, _) = quantize(&a);
        let (qb, _) = quantize(&b);
        let approx = cosine_int8(&qa, &qb);

        assert!((exact - approx).abs() <= 0.02, "drift {}", (exact - approx).abs());
    }

    #[test]
    fn test_cosine_int8_mismatched_lengths() {
        assert_eq!(cosine_int8(&[1, 2, 3], &[1, 2]), 0.0);
        assert_eq!(cosine_int8(&[0, 0], &[0, 0]), 0.0);
    }

    #[test]
    fn test_raw_byte_view_roundtrip() {
        let q: Vec<i8> = vec![-128, -1, 0, 1, 127];
        let raw = as_raw_bytes(&q);
        assert_eq!(from_raw_bytes(raw), q.as_slice());
    }
}
