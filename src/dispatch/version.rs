//! `major.minor.patch` comparison for adapter version gating.

/// Parse `"4.1.0"` into its three numeric parts. Missing minor/patch parts
/// count as zero; anything non-numeric is rejected.
fn parse(version: &str) -> Option<(u64, u64, u64)> {
    let mut parts = version.trim().splitn(3, '.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    let patch = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    Some((major, minor, patch))
}

/// True when `given` is at least `required`. A malformed version on either
/// side is treated as incompatible.
pub fn is_version_higher_or_equal(given: &str, required: &str) -> bool {
    match (parse(given), parse(required)) {
        (Some(given), Some(required)) => given >= required,
        _ => false,
    }
}
