//! Splitting long texts into provider-sized pieces.
//!
//! Chunks are translated independently and concatenated in claim order, so
//! the split must be lossless: joining the returned chunks reproduces the
//! input byte for byte. Boundaries prefer paragraphs, then sentences, then
//! whitespace. Markup-like tokens (`<...>` tags, backtick spans) are atomic
//! and never split; a single oversized one travels as its own chunk.

/// Split `text` into chunks of at most `max_chars` characters each,
/// except for atomic tokens longer than the limit.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    if char_count(text) <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for block in text.split_inclusive("\n\n") {
        for piece in explode(block, max_chars) {
            let piece_len = char_count(&piece);
            if current_len > 0 && current_len + piece_len > max_chars {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push_str(&piece);
            current_len += piece_len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Break one paragraph block into pieces no longer than `max_chars`,
/// falling through sentence and then token boundaries.
fn explode(block: &str, max_chars: usize) -> Vec<String> {
    if char_count(block) <= max_chars {
        return vec![block.to_string()];
    }

    let mut pieces = Vec::new();
    for sentence in block.split_inclusive(['.', '!', '?', '\n']) {
        if char_count(sentence) <= max_chars {
            pieces.push(sentence.to_string());
            continue;
        }
        for token in atomic_tokens(sentence) {
            if char_count(token) <= max_chars || is_atomic(token) {
                pieces.push(token.to_string());
            } else {
                pieces.extend(hard_split(token, max_chars));
            }
        }
    }
    pieces
}

/// Whether a token must never be split internally.
fn is_atomic(token: &str) -> bool {
    token.starts_with('<') || token.starts_with('`')
}

/// Tokenize into markup tags, backtick spans, whitespace runs and words.
fn atomic_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(first) = rest.chars().next() {
        let end = match first {
            '<' => rest.find('>').map(|i| i + 1).unwrap_or(rest.len()),
            '`' => rest[1..].find('`').map(|i| i + 2).unwrap_or(rest.len()),
            c if c.is_whitespace() => rest
                .char_indices()
                .find(|(_, c)| !c.is_whitespace())
                .map(|(i, _)| i)
                .unwrap_or(rest.len()),
            _ => rest
                .char_indices()
                .find(|(_, c)| c.is_whitespace() || *c == '<' || *c == '`')
                .map(|(i, _)| i)
                .unwrap_or(rest.len()),
        };
        tokens.push(&rest[..end]);
        rest = &rest[end..];
    }
    tokens
}

/// Last resort for a single word longer than the limit: split on char
/// boundaries into `max_chars`-sized pieces.
fn hard_split(token: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut len = 0usize;
    for c in token.chars() {
        if len == max_chars {
            pieces.push(std::mem::take(&mut piece));
            len = 0;
        }
        piece.push(c);
        len += 1;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

fn char_count(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(chunks: &[String]) -> String {
        chunks.concat()
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = split_chunks("hello world", 100);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn reassembly_is_lossless() {
        let text = "First paragraph with some words.\n\nSecond paragraph, a bit longer than the first one.\n\nThird.";
        let chunks = split_chunks(text, 40);
        assert!(chunks.len() > 1);
        assert_eq!(join(&chunks), text);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 40, "oversized chunk: {chunk:?}");
        }
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = "Alpha paragraph here.\n\nBeta paragraph here.";
        let chunks = split_chunks(text, 25);
        assert_eq!(join(&chunks), text);
        assert!(chunks[0].ends_with("\n\n"));
    }

    #[test]
    fn sentences_split_when_paragraph_too_long() {
        let text = "One sentence here. Another sentence here. A third one here.";
        let chunks = split_chunks(text, 25);
        assert_eq!(join(&chunks), text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 25));
    }

    #[test]
    fn markup_tokens_stay_whole() {
        let text = "word <a href=\"https://example.com/page\">link</a> tail and more words to push past the limit";
        let chunks = split_chunks(text, 30);
        assert_eq!(join(&chunks), text);
        assert!(
            chunks
                .iter()
                .any(|c| c.contains("<a href=\"https://example.com/page\">")),
            "tag was split across chunks: {chunks:?}"
        );
    }

    #[test]
    fn oversized_markup_token_is_its_own_chunk() {
        let tag = "<img src=\"data:image/png;base64,AAAABBBBCCCCDDDD\">";
        let text = format!("intro words first {tag} trailing words after");
        let chunks = split_chunks(&text, 12);
        assert_eq!(join(&chunks), text);
        assert!(chunks.contains(&tag.to_string()));
    }

    #[test]
    fn backtick_span_stays_whole() {
        let text = "run `cargo build --release` then deploy somewhere far away";
        let chunks = split_chunks(text, 15);
        assert_eq!(join(&chunks), text);
        assert!(chunks.iter().any(|c| c.contains("`cargo build --release`")));
    }

    #[test]
    fn long_word_hard_splits_losslessly() {
        let word = "a".repeat(50);
        let chunks = split_chunks(&word, 8);
        assert_eq!(join(&chunks), word);
        assert!(chunks.iter().all(|c| c.chars().count() <= 8));
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "é".repeat(20) + " " + &"ß".repeat(20);
        let chunks = split_chunks(&text, 7);
        assert_eq!(join(&chunks), text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 7));
    }

    #[test]
    fn unterminated_tag_does_not_panic() {
        let text = "before <unclosed tag runs to the end of the text without closing";
        let chunks = split_chunks(text, 10);
        assert_eq!(join(&chunks), text);
    }
}
