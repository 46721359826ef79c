//! Sentence-boundary splitting for oversized blocks.
//!
//! A block longer than its limit is split into sentences, which are then
//! packed greedily back together up to the limit. A single sentence that
//! is itself too long is hard-cut at the limit.

/// Characters that may trail a terminator and still belong to the sentence.
const CLOSERS: &[char] = &['"', '\'', ')', ']', '”', '’', '»'];

/// Split `text` into trimmed sentences.
///
/// A sentence ends at a terminator (plus any closing quotes or brackets)
/// followed by whitespace or the end of input.
pub fn split_sentences<'a>(text: &'a str, terminators: &[char]) -> Vec<&'a str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !terminators.contains(&c) {
            continue;
        }
        while let Some(&(_, next)) = chars.peek() {
            if CLOSERS.contains(&next) {
                chars.next();
            } else {
                break;
            }
        }
        let end = chars.peek().map_or(text.len(), |&(i, _)| i);
        let at_boundary = chars.peek().is_none_or(|&(_, next)| next.is_whitespace());
        if at_boundary {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Text that already fits is returned as a single piece. Otherwise every
/// piece ends on a sentence boundary, except pieces cut out of a sentence
/// that alone exceeds the limit.
pub fn pack(text: &str, max_chars: usize, terminators: &[char]) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(text, terminators) {
        let len = sentence.chars().count();

        if len > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            pieces.extend(hard_cut(sentence, max_chars));
            continue;
        }

        let joined = if current.is_empty() {
            len
        } else {
            current_len + 1 + len
        };
        if joined > max_chars {
            pieces.push(std::mem::take(&mut current));
            current.push_str(sentence);
            current_len = len;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
            current_len = joined;
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Cut a sentence with no usable terminator into windows of exactly
/// `max_chars`. Cuts may fall inside a word.
fn hard_cut(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = sentence;

    while rest.chars().count() > max_chars {
        let cut = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(i, _)| i);

        let piece = rest[..cut].trim_end();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}
