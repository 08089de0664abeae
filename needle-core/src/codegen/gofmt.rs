//! Canonical formatting of emitted Go source.
//!
//! Reindents brace-structured text with tabs and verifies delimiter
//! balance, skipping string literals and comments. Text the scanner
//! cannot balance is a compiler error; no output file is written from
//! it.

use crate::error::{NeedleError, NeedleResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Code,
    BlockComment,
    RawString,
}

/// Format Go source text: normalize indentation, verify balance.
pub fn format_go_code(src: &str) -> NeedleResult<String> {
    let mut out = String::with_capacity(src.len());
    let mut depth: i64 = 0;
    let mut state = ScanState::Code;
    let mut blank_run = 0;

    for line in src.lines() {
        let started_in = state;
        let trimmed = line.trim();

        if started_in == ScanState::Code && trimmed.is_empty() {
            // Collapse runs of blank lines.
            blank_run += 1;
            if blank_run == 1 {
                out.push('\n');
            }
            continue;
        }
        blank_run = 0;

        let scan = scan_line(if started_in == ScanState::Code {
            trimmed
        } else {
            line
        }, state);
        state = scan.state;

        if started_in != ScanState::Code {
            // Inside a raw string or block comment: keep verbatim.
            out.push_str(line);
            out.push('\n');
            depth += scan.net;
            continue;
        }

        let mut level = depth - scan.leading_closers;
        if trimmed.starts_with("case ") || trimmed == "default:" {
            level -= 1;
        }
        for _ in 0..level.max(0) {
            out.push('\t');
        }
        out.push_str(trimmed);
        out.push('\n');

        depth += scan.net;
        if depth < 0 {
            return Err(NeedleError::Compiler(format!(
                "code syntax error: unbalanced delimiters near: {}",
                trimmed
            )));
        }
    }

    if depth != 0 || state != ScanState::Code {
        return Err(NeedleError::Compiler(
            "code syntax error: unbalanced delimiters at end of file".into(),
        ));
    }
    Ok(out)
}

struct LineScan {
    net: i64,
    leading_closers: i64,
    state: ScanState,
}

fn scan_line(line: &str, mut state: ScanState) -> LineScan {
    let mut net = 0i64;
    let mut leading_closers = 0i64;
    let mut seen_code = false;
    let mut in_string = false;
    let mut in_char = false;
    let mut escaped = false;

    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            ScanState::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = ScanState::Code;
                }
            }
            ScanState::RawString => {
                if c == '`' {
                    state = ScanState::Code;
                }
            }
            ScanState::Code => {
                if in_string {
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        in_string = false;
                    }
                    continue;
                }
                if in_char {
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '\'' {
                        in_char = false;
                    }
                    continue;
                }
                match c {
                    '"' => in_string = true,
                    '\'' => in_char = true,
                    '`' => state = ScanState::RawString,
                    '/' if chars.peek() == Some(&'/') => break,
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        state = ScanState::BlockComment;
                    }
                    '{' | '(' | '[' => {
                        net += 1;
                        seen_code = true;
                    }
                    '}' | ')' | ']' => {
                        net -= 1;
                        if !seen_code {
                            leading_closers += 1;
                        }
                    }
                    c if c.is_whitespace() => {}
                    _ => seen_code = true,
                }
            }
        }
    }

    LineScan {
        net,
        leading_closers,
        state,
    }
}
