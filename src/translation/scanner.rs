/// Lexer state. Placeholders are only recognised in `Normal`.
#[derive(Clone)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// A piece of a SQL fragment: literal text or one placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Token<'a> {
    Text(&'a str),
    /// `:name`, stored without the colon.
    Named(&'a str),
    Positional,
    /// `$n`, stored as `n`.
    Ordinal(usize),
}

/// Split `sql` into text and placeholder tokens.
///
/// Quoted strings, quoted identifiers, comments and dollar-quoted bodies are copied
/// through as text. `::` (a cast in several dialects) never starts a named placeholder.
pub(super) fn tokenize(sql: &str) -> Vec<Token<'_>> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut state = State::Normal;
    let mut text_start = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => state = State::BlockComment(1),
                b'?' => {
                    push_text(&mut tokens, sql, text_start, idx);
                    tokens.push(Token::Positional);
                    text_start = idx + 1;
                }
                b':' if idx == 0 || bytes[idx - 1] != b':' => {
                    if let Some(end) = scan_name(bytes, idx + 1) {
                        push_text(&mut tokens, sql, text_start, idx);
                        tokens.push(Token::Named(&sql[idx + 1..end]));
                        text_start = end;
                        idx = end;
                        continue;
                    }
                }
                b'$' => {
                    if let Some((end, n)) = scan_ordinal(bytes, idx + 1) {
                        push_text(&mut tokens, sql, text_start, idx);
                        tokens.push(Token::Ordinal(n));
                        text_start = end;
                        idx = end;
                        continue;
                    } else if let Some((tag, close)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = close;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }

    push_text(&mut tokens, sql, text_start, bytes.len());
    tokens
}

/// True when a `;` outside literals and comments is followed by more SQL.
pub(super) fn has_statement_separator(sql: &str) -> bool {
    let bytes = sql.as_bytes();
    let mut state = State::Normal;
    let mut idx = 0;
    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => state = State::BlockComment(1),
                b';' => {
                    if !sql[idx + 1..].trim().is_empty() {
                        return true;
                    }
                }
                _ => {}
            },
            State::SingleQuoted if b == b'\'' => state = State::Normal,
            State::DoubleQuoted if b == b'"' => state = State::Normal,
            State::LineComment if b == b'\n' => state = State::Normal,
            State::BlockComment(_) if is_block_comment_end(bytes, idx) => {
                state = State::Normal;
                idx += 1;
            }
            _ => {}
        }
        idx += 1;
    }
    false
}

fn push_text<'a>(tokens: &mut Vec<Token<'a>>, sql: &'a str, start: usize, end: usize) {
    if end > start {
        tokens.push(Token::Text(&sql[start..end]));
    }
}

/// `[a-z][a-z0-9_]*` starting at `start`; returns the end index.
fn scan_name(bytes: &[u8], start: usize) -> Option<usize> {
    if !bytes.get(start).is_some_and(u8::is_ascii_lowercase) {
        return None;
    }
    let mut idx = start + 1;
    while idx < bytes.len()
        && (bytes[idx].is_ascii_lowercase() || bytes[idx].is_ascii_digit() || bytes[idx] == b'_')
    {
        idx += 1;
    }
    Some(idx)
}

/// `[1-9][0-9]*` starting at `start`, not followed by a closing `$` of a dollar tag.
fn scan_ordinal(bytes: &[u8], start: usize) -> Option<(usize, usize)> {
    if !bytes.get(start).is_some_and(|b| (b'1'..=b'9').contains(b)) {
        return None;
    }
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if bytes.get(idx) == Some(&b'$') {
        return None;
    }
    std::str::from_utf8(&bytes[start..idx])
        .ok()
        .and_then(|digits| digits.parse().ok())
        .map(|n| (idx, n))
}

fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// `$tag$` opener; returns the tag and the index of its closing `$`.
fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !(b.is_ascii_alphanumeric() || b == b'_') {
            return None;
        }
        idx += 1;
    }
    if idx < bytes.len() {
        let tag = String::from_utf8(bytes[start + 1..idx].to_vec()).ok()?;
        Some((tag, idx))
    } else {
        None
    }
}

fn matches_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    end < bytes.len() && &bytes[idx + 1..end] == tag.as_bytes() && bytes[end] == b'$'
}
