fn starts_at(bytes: &[u8], idx: usize, pat: &[u8]) -> bool {
    bytes.get(idx..).is_some_and(|rest| rest.starts_with(pat))
}

pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    starts_at(bytes, idx, b"--")
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    starts_at(bytes, idx, b"/*")
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    starts_at(bytes, idx, b"*/")
}

/// Opening `$tag$` of a dollar-quoted body at `start`: the tag and the index of its closing `$`.
pub(super) fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let body = bytes.get(start + 1..)?;
    let len = body
        .iter()
        .position(|b| !(b.is_ascii_alphanumeric() || *b == b'_'))?;
    if body[len] != b'$' || body.first().is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let tag = std::str::from_utf8(&body[..len]).ok()?.to_string();
    Some((tag, start + 1 + len))
}

/// Whether the closing `$tag$` starts at `idx`.
pub(super) fn matches_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    bytes.get(idx) == Some(&b'$')
        && starts_at(bytes, idx + 1, tag.as_bytes())
        && bytes.get(idx + 1 + tag.len()) == Some(&b'$')
}
