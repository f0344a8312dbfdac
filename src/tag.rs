use md5::{Digest, Md5};

/// Cache key of a statement: lowercase hex MD5 of its exact text.
///
/// Identical text always maps to the same tag, whatever the calling context.
#[must_use]
pub fn tag_for(sql: &str) -> String {
    md5_hex(sql.as_bytes())
}

pub(crate) fn md5_hex(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_md5_hex() {
        assert_eq!(tag_for(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(tag_for("SELECT 1").len(), 32);
    }

    #[test]
    fn tags_are_text_sensitive() {
        assert_eq!(tag_for("SELECT 1"), tag_for("SELECT 1"));
        assert_ne!(tag_for("SELECT 1"), tag_for("select 1"));
    }
}
