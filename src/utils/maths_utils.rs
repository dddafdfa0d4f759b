use argminmax::ArgMinMax;

/// Arithmetic mean, summed left to right so results are reproducible bit for bit.
/// Returns None for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    Some(sum / values.len() as f64)
}

/// Running sum: out[k] = values[0] + ... + values[k]
pub fn cumulative_sum(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, &x| {
            *acc += x;
            Some(*acc)
        })
        .collect()
}

/// Elementwise mean of equal-length rows. Returns None if `rows` is empty.
/// Every row must have at least `len` entries; only the first `len` are used.
pub fn column_means(rows: &[&[f64]], len: usize) -> Option<Vec<f64>> {
    if rows.is_empty() {
        return None;
    }
    let n = rows.len() as f64;
    let means = (0..len)
        .map(|k| {
            let sum: f64 = rows.iter().map(|row| row[k]).sum();
            sum / n
        })
        .collect();
    Some(means)
}

/// Given an interval size, how many intervals total in a given range,
/// This assumes the range is exclusive, and hence why we need to add 1
/// i.e `range_end` is start of the last interval, not the end
pub fn intervals(range_start: i64, range_end: i64, interval: i64) -> i64 {
    ((range_end - range_start) / interval) + 1
}

/// In which interval is `value` (values between grid points fall back to the earlier one)
pub fn index_into_range(range_start: i64, value: i64, range_interval: i64) -> i64 {
    (value - range_start).div_euclid(range_interval)
}

pub fn get_max(vec: &[f64]) -> f64 {
    let max_index: usize = vec.argmax();
    vec[max_index]
}

pub fn get_min(vec: &[f64]) -> f64 {
    let min_index: usize = vec.argmin();
    vec[min_index]
}

/// (min, max) of the finite values, None if there are none
pub fn finite_extent(vec: &[f64]) -> Option<(f64, f64)> {
    let finite: Vec<f64> = vec.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    Some((get_min(&finite), get_max(&finite)))
}
