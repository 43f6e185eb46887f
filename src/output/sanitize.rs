//! Strips terminal color sequences from console lines.
//!
//! Only SGR sequences (`ESC [ ... m`) are recognized. Anything else passes
//! through untouched. A sequence still open at end of line is dropped.

const ESC: char = '\u{1b}';

/// Removes `ESC [ ... m` sequences from `line`, keeping every other char in order.
pub fn strip_ansi(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    let mut in_escape = false;

    while let Some(ch) = chars.next() {
        if in_escape {
            if ch == 'm' {
                in_escape = false;
            }
            continue;
        }
        if ch == ESC && chars.peek() == Some(&'[') {
            chars.next();
            in_escape = true;
            continue;
        }
        out.push(ch);
    }
    out
}
