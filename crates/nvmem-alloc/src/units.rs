pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;
pub const TIB: u64 = 1024 * GIB;

/// Whole GiB contained in `bytes` (rounded down).
pub fn bytes_to_gib(bytes: u64) -> u64 {
    bytes / GIB
}

pub fn gib_to_bytes(gib: u64) -> u64 {
    gib.saturating_mul(GIB)
}

/// Parse a capacity such as `512GiB`, `1.5TiB`, `256 G` or a plain byte count.
///
/// Suffixes are binary (`G`, `GB` and `GiB` all mean 2^30). Fractional values are
/// truncated to whole bytes.
pub fn parse_capacity(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty capacity".to_string());
    }

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '_'))
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(split);
    let number = number.replace('_', "");
    if number.is_empty() {
        return Err(format!("capacity `{trimmed}` has no numeric part"));
    }

    let multiplier = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => KIB,
        "m" | "mb" | "mib" => MIB,
        "g" | "gb" | "gib" => GIB,
        "t" | "tb" | "tib" => TIB,
        other => return Err(format!("unknown capacity suffix `{other}`")),
    };

    if let Ok(whole) = number.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| format!("capacity `{trimmed}` overflows u64"));
    }

    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid capacity `{trimmed}`"))?;
    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes < 0.0 || bytes > u64::MAX as f64 {
        return Err(format!("capacity `{trimmed}` is out of range"));
    }
    Ok(bytes as u64)
}
