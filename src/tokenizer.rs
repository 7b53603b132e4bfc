//! Component B: the tokenizer. Delimiter-driven token extraction with
//! long-token XOR accumulation, producing one hash per logical token.

use crate::hash::strnhash;

/// A byte is a delimiter iff it is not a printable graphic character or it
/// appears in `delims`.
fn is_delimiter(b: u8, delims: &[u8]) -> bool {
    !b.is_ascii_graphic() || delims.contains(&b)
}

/// Tokenizes `text` against `delims`, emitting one `u32` hash per token.
///
/// When `limit_token_size` is set, tokens of length `>= max_token_size` are
/// split into consecutive `max_token_size`-byte segments and their hashes
/// are XORed together into a single accumulator (up to `max_long_tokens`
/// segments), so a very long token still contributes exactly one hash
/// rather than one hash per truncated slice.
pub fn tokenize(
    text: &[u8],
    delims: &[u8],
    limit_token_size: bool,
    max_token_size: u32,
    max_long_tokens: u32,
) -> Vec<u32> {
    let max_token_size = max_token_size.max(1) as usize;
    let mut hashes = Vec::new();
    let mut i = 0;
    while i < text.len() {
        if is_delimiter(text[i], delims) {
            i += 1;
            continue;
        }
        let start = i;
        while i < text.len() && !is_delimiter(text[i], delims) {
            i += 1;
        }
        let token = &text[start..i];

        if !limit_token_size || token.len() < max_token_size {
            hashes.push(strnhash(token));
            continue;
        }

        let mut acc = 0u32;
        let mut segments = 0u32;
        let mut offset = 0;
        while offset < token.len() && segments < max_long_tokens {
            let end = (offset + max_token_size).min(token.len());
            acc ^= strnhash(&token[offset..end]);
            offset = end;
            segments += 1;
        }
        hashes.push(acc);
    }
    hashes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace_by_default() {
        let hashes = tokenize(b"the quick brown fox", b"", true, 60, 1000);
        assert_eq!(hashes.len(), 4);
    }

    #[test]
    fn custom_delimiters_split_additional_bytes() {
        let with_comma = tokenize(b"a,b c", b",", true, 60, 1000);
        let without_comma = tokenize(b"a,b c", b"", true, 60, 1000);
        assert_eq!(with_comma.len(), 3);
        assert_eq!(without_comma.len(), 2);
    }

    #[test]
    fn long_token_collapses_to_one_hash() {
        let long = vec![b'a'; 500];
        let hashes = tokenize(&long, b"", true, 60, 1000);
        assert_eq!(hashes.len(), 1);
    }

    #[test]
    fn unlimited_token_size_hashes_whole_token() {
        let long = vec![b'a'; 500];
        let limited = tokenize(&long, b"", true, 60, 1000);
        let unlimited = tokenize(&long, b"", false, 60, 1000);
        assert_ne!(limited[0], unlimited[0]);
    }

    #[test]
    fn empty_text_yields_no_tokens() {
        assert!(tokenize(b"", b"", true, 60, 1000).is_empty());
    }
}
