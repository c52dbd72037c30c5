pub mod retry;

/// Clamp a score into the [0, 1] domain.
///
/// All bounded scores are clamped before storage or comparison; upstream
/// analyzers may return out-of-range values and must never leak them past
/// the boundary.
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Deduplicate strings while preserving first-seen order, capped at `max`.
///
/// Comparison is case-insensitive after trimming so that reasons produced by
/// different scorers ("Recent news" / "recent news") collapse into one entry.
pub fn dedup_capped(items: Vec<String>, max: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    for item in items {
        let key = item.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        if seen.insert(key) {
            out.push(item);
            if out.len() >= max {
                break;
            }
        }
    }

    out
}
