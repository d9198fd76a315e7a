// src/protocol/escape.rs

//! Value escaping used inside `'...'` attribute values.
//!
//! `|` is the escape character:
//!
//! | escaped  | decoded     |
//! |----------|-------------|
//! | `\|'`    | `'`         |
//! | `\|\|`   | `\|`        |
//! | `\|n`    | line feed   |
//! | `\|r`    | carriage return |
//! | `\|[`    | `[`         |
//! | `\|]`    | `]`         |
//! | `\|x`    | U+0085      |
//! | `\|l`    | U+2028      |
//! | `\|p`    | U+2029      |
//! | `\|0xHHHH` | U+HHHH    |

/// Decode an escaped value. Returns `None` for a dangling trailing `|`.
///
/// Unknown escapes decode to the escaped character itself.
pub fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '|' {
            out.push(c);
            continue;
        }

        let escaped = chars.next()?;
        let decoded = match escaped {
            '\'' => '\'',
            '|' => '|',
            'n' => '\n',
            'r' => '\r',
            '[' => '[',
            ']' => ']',
            'x' => '\u{0085}',
            'l' => '\u{2028}',
            'p' => '\u{2029}',
            '0' if chars.peek() == Some(&'x') => {
                chars.next();
                let hex: String = chars.by_ref().take(4).collect();
                let digits = hex.len() == 4 && hex.chars().all(|c| c.is_ascii_hexdigit());
                let code = digits.then(|| u32::from_str_radix(&hex, 16).ok()).flatten();
                match code.and_then(char::from_u32) {
                    Some(ch) => ch,
                    _ => {
                        // Not a valid code point; keep the text as written.
                        out.push_str("0x");
                        out.push_str(&hex);
                        continue;
                    }
                }
            }
            other => other,
        };
        out.push(decoded);
    }

    Some(out)
}
