//! Human-readable sizes
//!
//! Sizes such as `"5000 MB"` are read with binary multiples: `MB` means
//! 1024 × 1024 bytes, the same as `MiB`.

use std::fmt;

use crate::ConfigError;

const MEBIBYTE: u64 = 1024 * 1024;

/// First-level subdirectories of the cache store
pub const CACHE_L1_DIRS: u32 = 16;

/// Second-level subdirectories of the cache store
pub const CACHE_L2_DIRS: u32 = 256;

/// Parse a size such as `"350 MB"`, `"5GiB"`, `"1.5 g"` or `"0"` into bytes
pub fn parse_size(input: &str) -> Result<u64, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidSize {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    if number.is_empty() {
        return Err(invalid("expected a number"));
    }

    let multiplier = unit_multiplier(unit.trim()).ok_or_else(|| invalid("unknown unit"))?;

    if let Ok(whole) = number.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| invalid("size too large"));
    }

    let fractional: f64 = number.parse().map_err(|_| invalid("malformed number"))?;
    let bytes = (fractional * multiplier as f64).floor();
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(invalid("size too large"));
    }
    Ok(bytes as u64)
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    let unit = unit.to_ascii_lowercase();
    if matches!(unit.as_str(), "" | "b" | "byte" | "bytes") {
        return Some(1);
    }

    let mut chars = unit.chars();
    let power = match chars.next()? {
        'k' => 1,
        'm' => 2,
        'g' => 3,
        't' => 4,
        'p' => 5,
        'e' => 6,
        _ => return None,
    };

    let suffix = chars.as_str();
    let (decimal, binary) = match power {
        1 => ("kilo", "kibi"),
        2 => ("mega", "mebi"),
        3 => ("giga", "gibi"),
        4 => ("tera", "tebi"),
        5 => ("peta", "pebi"),
        _ => ("exa", "exbi"),
    };
    let word = unit.strip_suffix('s').unwrap_or(&unit);
    let known = matches!(suffix, "" | "b" | "ib")
        || word == format!("{}byte", decimal)
        || word == format!("{}byte", binary);

    if known {
        Some(1024u64.pow(power))
    } else {
        None
    }
}

/// The `cache_dir` sizing fields: mebibytes, L1 and L2 directory counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDirDirective {
    pub megabytes: u64,
    pub l1_dirs: u32,
    pub l2_dirs: u32,
}

impl CacheDirDirective {
    /// Derive the directive from a byte budget, truncating to whole mebibytes
    pub fn from_bytes(bytes: u64) -> Self {
        Self {
            megabytes: bytes / MEBIBYTE,
            l1_dirs: CACHE_L1_DIRS,
            l2_dirs: CACHE_L2_DIRS,
        }
    }
}

impl fmt::Display for CacheDirDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.megabytes, self.l1_dirs, self.l2_dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_megabytes_as_binary() {
        assert_eq!(parse_size("5000 MB").unwrap(), 5000 * 1024 * 1024);
        assert_eq!(parse_size("350 MB").unwrap(), 350 * 1024 * 1024);
        assert_eq!(parse_size("350MB").unwrap(), 350 * 1024 * 1024);
        assert_eq!(parse_size("350 MiB").unwrap(), 350 * 1024 * 1024);
    }

    #[test]
    fn test_parse_plain_numbers_and_bytes() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size(" 42 ").unwrap(), 42);
        assert_eq!(parse_size("42 bytes").unwrap(), 42);
    }

    #[test]
    fn test_parse_other_units() {
        assert_eq!(parse_size("5 GB").unwrap(), 5 * 1024 * 1024 * 1024);
        assert_eq!(parse_size("4 kb").unwrap(), 4096);
        assert_eq!(parse_size("2 megabytes").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size("1 T").unwrap(), 1024u64.pow(4));
    }

    #[test]
    fn test_parse_fractional() {
        assert_eq!(parse_size("1.5 KB").unwrap(), 1536);
        assert_eq!(parse_size("0.5 MB").unwrap(), 512 * 1024);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["abc", "", "MB", "12 parsecs", "1.2.3 MB", "-5 MB"] {
            match parse_size(input) {
                Err(ConfigError::InvalidSize { input: i, .. }) => assert_eq!(i, input),
                other => panic!("{:?} should not parse: {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_parse_overflow() {
        assert!(parse_size("99999999999 EB").is_err());
        assert!(parse_size("16 EB").is_err());
        assert!(parse_size("16.0 EB").is_err());
        assert_eq!(parse_size("15.5 EB").unwrap(), 31u64 << 59);
    }

    #[test]
    fn test_cache_dir_directive() {
        let directive = CacheDirDirective::from_bytes(parse_size("5000 MB").unwrap());
        assert_eq!(directive.megabytes, 5000);
        assert_eq!(directive.to_string(), "5000 16 256");
    }

    #[test]
    fn test_cache_dir_directive_truncates() {
        let directive = CacheDirDirective::from_bytes(1024 * 1024 * 3 - 1);
        assert_eq!(directive.megabytes, 2);
    }
}
