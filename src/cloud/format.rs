//! # Point Cloud Format Constants
//!
//! Wire-format definitions shared by the encoders and the decoder.
//!
//! The binary layout is a compatibility contract with downstream point cloud
//! tooling: field order, endianness and type widths must not change.

/// First header line of every PLY file
pub const PLY_MAGIC: &str = "ply";

/// Format tag for the ASCII form
pub const PLY_FORMAT_ASCII: &str = "ascii";

/// Format tag for the binary form
pub const PLY_FORMAT_BINARY: &str = "binary_little_endian";

/// PLY format version emitted in the header
pub const PLY_VERSION: &str = "1.0";

/// Bytes per point in the binary form:
/// three little-endian IEEE-754 f32 coordinates (x, y, z) plus one u8 signal strength
pub const BINARY_POINT_SIZE: usize = 13;

/// Number of lines in the PLY header
/// (magic, format, vertex count, four property declarations, end marker)
pub const PLY_HEADER_LINES: usize = 8;

/// Build the PLY header for `point_count` vertices.
///
/// Both forms share the same eight lines; the binary form carries a trailing
/// newline after the end marker so the point bytes start on a fresh line,
/// while the ASCII form leaves it off and lets each point line bring its own
/// leading newline.
pub fn ply_header(point_count: usize, binary: bool) -> String {
    let format = if binary { PLY_FORMAT_BINARY } else { PLY_FORMAT_ASCII };
    let mut header = String::new();
    header.push_str(PLY_MAGIC);
    header.push('\n');
    header.push_str(&format!("format {format} {PLY_VERSION}\n"));
    header.push_str(&format!("element vertex {point_count}\n"));
    header.push_str("property float x\n");
    header.push_str("property float y\n");
    header.push_str("property float z\n");
    header.push_str("property uchar signal_strength\n");
    header.push_str("end_header");
    if binary {
        header.push('\n');
    }
    header
}

/// Format a coordinate rounded to two decimal places.
///
/// Rounding is half-away-from-zero on the decimal rendering of the value, so
/// `1.005` rounds up to `1.01` even though its closest binary double sits just
/// below the midpoint. Trailing zeros and the trailing decimal point are
/// trimmed (`2.00` renders as `2`), and a negative value that rounds to zero
/// keeps its sign (`-0`).
pub fn format_coord(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let text = value.to_string();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (digits, ""),
    };

    let mut whole: Vec<u8> = int_part.bytes().collect();
    let mut frac: Vec<u8> = frac_part.bytes().take(2).collect();
    while frac.len() < 2 {
        frac.push(b'0');
    }

    // the third fractional digit decides the rounding direction
    if frac_part.as_bytes().get(2).is_some_and(|d| *d >= b'5') {
        let mut combined = whole;
        combined.extend_from_slice(&frac);
        let mut carry = true;
        for digit in combined.iter_mut().rev() {
            if !carry {
                break;
            }
            if *digit == b'9' {
                *digit = b'0';
            } else {
                *digit += 1;
                carry = false;
            }
        }
        if carry {
            combined.insert(0, b'1');
        }
        let split = combined.len() - 2;
        frac = combined.split_off(split);
        whole = combined;
    }

    while frac.last() == Some(&b'0') {
        frac.pop();
    }

    let whole = String::from_utf8_lossy(&whole).into_owned();
    if frac.is_empty() {
        format!("{sign}{whole}")
    } else {
        format!("{sign}{whole}.{}", String::from_utf8_lossy(&frac))
    }
}

/// Round a coordinate to two decimal places, half away from zero.
///
/// Shares its rounding rule with [`format_coord`] so the ASCII and binary
/// forms of the same capture agree on every coordinate.
pub fn round_coord(value: f64) -> f64 {
    format_coord(value).parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_header_lines() {
        let header = ply_header(12, false);
        let lines: Vec<&str> = header.split('\n').collect();
        assert_eq!(lines.len(), PLY_HEADER_LINES);
        assert_eq!(lines[0], "ply");
        assert_eq!(lines[1], "format ascii 1.0");
        assert_eq!(lines[2], "element vertex 12");
        assert_eq!(lines[3], "property float x");
        assert_eq!(lines[4], "property float y");
        assert_eq!(lines[5], "property float z");
        assert_eq!(lines[6], "property uchar signal_strength");
        assert_eq!(lines[7], "end_header");
    }

    #[test]
    fn test_ascii_header_has_no_trailing_newline() {
        assert!(ply_header(1, false).ends_with("end_header"));
    }

    #[test]
    fn test_binary_header_has_trailing_newline() {
        let header = ply_header(3, true);
        assert!(header.ends_with("end_header\n"));
        assert!(header.contains("format binary_little_endian 1.0"));
    }

    #[test]
    fn test_format_coord_rounds_half_away_from_zero() {
        assert_eq!(format_coord(1.005), "1.01");
        assert_eq!(format_coord(-1.005), "-1.01");
        assert_eq!(format_coord(0.995), "1");
        assert_eq!(format_coord(9.995), "10");
    }

    #[test]
    fn test_format_coord_trims_trailing_zeros() {
        assert_eq!(format_coord(2.0), "2");
        assert_eq!(format_coord(1.10), "1.1");
        assert_eq!(format_coord(1.01), "1.01");
        assert_eq!(format_coord(0.05), "0.05");
    }

    #[test]
    fn test_format_coord_negative_zero() {
        assert_eq!(format_coord(-0.004), "-0");
        assert_eq!(format_coord(0.004), "0");
        assert_eq!(format_coord(-0.0), "-0");
    }

    #[test]
    fn test_format_coord_passes_through_short_fractions() {
        assert_eq!(format_coord(1.2), "1.2");
        assert_eq!(format_coord(-33.33), "-33.33");
        assert_eq!(format_coord(123.456), "123.46");
    }

    #[test]
    fn test_round_coord() {
        assert_eq!(round_coord(1.005), 1.01);
        assert_eq!(round_coord(-0.004), 0.0);
        assert!(round_coord(-0.004).is_sign_negative());
        assert_eq!(round_coord(2.0), 2.0);
        assert_eq!(round_coord(123.456), 123.46);
    }
}
