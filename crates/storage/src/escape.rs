//! Bit-exact port of the ASCII-safe string-escaping rules used when
//! formatting row values for the table writer's multi-row `INSERT`
//! statements (§4.3/§6).
//!
//! An empty string becomes the literal `E''`. Otherwise the output is a
//! Postgres `E'...'` string where each Unicode code point is classified:
//! a NUL code point becomes a space; printable 7-bit ASCII passes through
//! unchanged except for a fixed set of meta-characters, which are emitted as
//! backslash-octal escapes; every other code point (non-printable ASCII or
//! non-ASCII) is emitted as `\uXXXX` (four hex digits) for code points that
//! fit in 16 bits, or `\UXXXXXXXX` (eight hex digits) otherwise.

/// Escape `s` into a Postgres `E'...'`-quoted SQL string literal.
pub fn escape_sql(s: &str) -> String {
    if s.is_empty() {
        return "E''".to_string();
    }

    let mut out = String::with_capacity(s.len() + 4);
    out.push_str("E'");

    for ch in s.chars() {
        let code = ch as u32;
        if code == 0 {
            out.push(' ');
            continue;
        }
        if code <= 0x7F && is_printable_ascii(code) {
            match code as u8 as char {
                '\r' => out.push_str("\\015"),
                '\n' => out.push_str("\\012"),
                '\x0B' => out.push_str("\\013"),
                '\x0C' => out.push_str("\\014"),
                '\\' => out.push_str("\\134"),
                '\'' => out.push_str("\\047"),
                '%' => out.push_str("\\045"),
                '_' => out.push_str("\\137"),
                ':' => out.push_str("\\072"),
                other => out.push(other),
            }
            continue;
        }
        if code <= 0xFFFF {
            out.push_str(&format!("\\u{:04X}", code));
        } else {
            out.push_str(&format!("\\U{:08X}", code));
        }
    }

    out.push('\'');
    out
}

/// Mirrors C's `isprint` for the 7-bit ASCII range: printable characters are
/// everything from space (0x20) through tilde (0x7E) inclusive, which also
/// covers the meta-characters re-escaped above.
fn is_printable_ascii(code: u32) -> bool {
    (0x20..=0x7E).contains(&code)
}

/// Hex-encode a byte slice as a plain quoted SQL string literal (`'<hex>'`),
/// used for digests and signatures (§4.3 `escape_raw`). These columns are
/// read back as plain text, not `bytea`, so this deliberately is not a
/// Postgres bytea-hex-escape (`E'\xHH'`) literal. Returns the SQL `NULL`
/// literal for an absent optional signature.
pub fn escape_raw(bytes: Option<&[u8]>) -> String {
    match bytes {
        None => "NULL".to_string(),
        Some(bytes) => format!("'{}'", hex::encode(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_e_quote_quote() {
        assert_eq!(escape_sql(""), "E''");
    }

    #[test]
    fn plain_ascii_passes_through() {
        assert_eq!(escape_sql("hello"), "E'hello'");
    }

    #[test]
    fn meta_characters_are_octal_escaped() {
        assert_eq!(escape_sql("a'b"), "E'a\\047b'");
        assert_eq!(escape_sql("a\\b"), "E'a\\134b'");
        assert_eq!(escape_sql("a%b"), "E'a\\045b'");
        assert_eq!(escape_sql("a_b"), "E'a\\137b'");
        assert_eq!(escape_sql("a:b"), "E'a\\072b'");
        assert_eq!(escape_sql("a\nb"), "E'a\\012b'");
        assert_eq!(escape_sql("a\rb"), "E'a\\015b'");
    }

    #[test]
    fn nul_code_point_becomes_space() {
        assert_eq!(escape_sql("a\u{0}b"), "E'a b'");
    }

    #[test]
    fn non_ascii_bmp_uses_lowercase_u_escape() {
        assert_eq!(escape_sql("caf\u{e9}"), "E'caf\\u00E9'");
    }

    #[test]
    fn supplementary_plane_uses_uppercase_u_escape() {
        assert_eq!(escape_sql("\u{1F600}"), "E'\\U0001F600'");
    }

    #[test]
    fn escape_raw_none_is_null() {
        assert_eq!(escape_raw(None), "NULL");
    }

    #[test]
    fn escape_raw_some_hex_encodes() {
        assert_eq!(escape_raw(Some(&[0xDE, 0xAD, 0xBE, 0xEF])), "'deadbeef'");
    }
}
