//! JSON-style string escaping.
//!
//! `escape_json` escapes `"`, `\`, the five named control characters, and any
//! other byte below 0x20 as `\u00xx`. Forward slashes and non-ASCII text pass
//! through unchanged.
//!
//! `unescape_json` is the inverse for text read from a source file: a
//! backslash followed by `b f n r t \` yields the control character, `\uXXXX`
//! (with surrogate pairs) yields a code point, and a backslash followed by any
//! other character yields that character.

use eyre::{bail, eyre, Result};

/// Length in bytes of `s` after escaping.
pub fn escaped_json_len(s: &str) -> usize {
    s.chars()
        .map(|c| match c {
            '"' | '\\' | '\u{8}' | '\u{c}' | '\n' | '\r' | '\t' => 2,
            c if (c as u32) < 0x20 => 6,
            c => c.len_utf8(),
        })
        .sum()
}

/// Appends the escaped form of `s` to `out`.
pub fn escape_json(s: &str, out: &mut String) {
    if escaped_json_len(s) == s.len() {
        out.push_str(s);
        return;
    }

    out.reserve(escaped_json_len(s));
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                const HEX: &[u8; 16] = b"0123456789abcdef";
                let v = c as u32 as usize;
                out.push_str("\\u00");
                out.push(HEX[(v >> 4) & 0xF] as char);
                out.push(HEX[v & 0xF] as char);
            }
            c => out.push(c),
        }
    }
}

fn parse_hex4(chars: &mut std::str::Chars<'_>) -> Result<u32> {
    let mut v = 0u32;
    for _ in 0..4 {
        let c = chars.next().ok_or_else(|| eyre!("truncated \\u escape"))?;
        let d = c
            .to_digit(16)
            .ok_or_else(|| eyre!("invalid hex digit '{}' in \\u escape", c))?;
        v = (v << 4) | d;
    }
    Ok(v)
}

/// Resolves escape sequences in `s`.
///
/// Fails on a malformed or truncated `\u` escape or an unpaired surrogate.
pub fn unescape_json(s: &str) -> Result<String> {
    if !s.contains('\\') {
        return Ok(s.to_owned());
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let Some(e) = chars.next() else {
            break;
        };
        match e {
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'u' => {
                let hi = parse_hex4(&mut chars)?;
                let code = if (0xD800..=0xDBFF).contains(&hi) {
                    if chars.next() != Some('\\') || chars.next() != Some('u') {
                        bail!("unpaired high surrogate \\u{:04x}", hi);
                    }
                    let lo = parse_hex4(&mut chars)?;
                    if !(0xDC00..=0xDFFF).contains(&lo) {
                        bail!("invalid low surrogate \\u{:04x}", lo);
                    }
                    0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00)
                } else {
                    hi
                };
                let ch = char::from_u32(code)
                    .ok_or_else(|| eyre!("\\u escape {:#x} is not a scalar value", code))?;
                out.push(ch);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}
