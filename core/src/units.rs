pub const BYTES_PER_GB: u64 = 1 << 30;

/// Two-decimal GB figure for display. Comparisons stay in bytes.
pub fn bytes_to_gb(bytes: u64) -> f64 {
    let gb = bytes as f64 / BYTES_PER_GB as f64;
    (gb * 100.0).round() / 100.0
}

/// Operator-facing sizes arrive in GB; commands want bytes.
pub fn gb_to_bytes(gb: f64) -> u64 {
    (gb * BYTES_PER_GB as f64).round() as u64
}
