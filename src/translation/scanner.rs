use super::parsers::{
    is_block_comment_end, is_block_comment_start, is_line_comment_start, matches_tag,
    try_start_dollar_quote,
};

#[derive(Clone)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// Walk `bytes`, calling `visit` for every byte that is SQL code: everything outside comments
/// and outside the bodies of literals, quoted identifiers and dollar-quoted blocks. The opening
/// quote of a literal is visited.
///
/// `visit` returns the index to resume scanning from when it consumed more than one byte.
pub(super) fn for_each_code_byte(bytes: &[u8], mut visit: impl FnMut(usize) -> Option<usize>) {
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => {
                let dollar_tag = if b == b'$' {
                    try_start_dollar_quote(bytes, idx)
                } else {
                    None
                };
                if is_line_comment_start(bytes, idx) {
                    state = State::LineComment;
                } else if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(1);
                    idx += 1;
                } else if let Some(resume) = visit(idx) {
                    idx = resume;
                    continue;
                } else if b == b'\'' {
                    state = State::SingleQuoted;
                } else if b == b'"' {
                    state = State::DoubleQuoted;
                } else if let Some((tag, advance)) = dollar_tag {
                    state = State::DollarQuoted(tag);
                    idx = advance;
                }
            }
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // escaped quote
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
}

/// End of the identifier starting at `start`, if one starts there.
pub(super) fn scan_identifier(bytes: &[u8], start: usize) -> Option<usize> {
    let first = *bytes.get(start)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let mut idx = start + 1;
    while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
        idx += 1;
    }
    Some(idx)
}
