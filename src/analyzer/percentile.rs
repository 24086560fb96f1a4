pub const PERCENTILE_RANKS: [u32; 7] = [1, 5, 25, 50, 75, 95, 99];

/// Nearest-rank percentile of already sorted data. The position is
/// `rank / 100 * len`; an even-sized series hitting an exact position
/// averages the two neighbouring elements.
pub fn percentile(data_sorted: &[f64], rank: u32) -> Option<f64> {
    let len = data_sorted.len();
    if len == 0 {
        return None;
    }

    let scaled = rank as usize * len;
    let index = scaled / 100;

    if len % 2 == 0 && scaled % 100 == 0 && index > 0 && index < len {
        return Some((data_sorted[index - 1] + data_sorted[index]) / 2.0);
    }

    Some(data_sorted[index.min(len - 1)])
}
