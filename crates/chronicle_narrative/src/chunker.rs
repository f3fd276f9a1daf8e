//! Splitting a message log into numbered chunks.

use chronicle_core::{ChatMessage, Chunk, ChunkStatus, MessageSpan, Watermark};
use chronicle_error::{ArchiveError, ArchiveErrorKind, ChronicleResult};
use std::sync::Arc;

/// Messages strictly after `watermark`.
///
/// The watermark message is located by id first. When it is no longer in the
/// log, the first message with a later timestamp starts the candidates.
pub fn candidates_after<'a>(
    messages: &'a [Arc<ChatMessage>],
    watermark: Option<&Watermark>,
) -> &'a [Arc<ChatMessage>] {
    let Some(watermark) = watermark else {
        return messages;
    };

    if let Some(position) = messages.iter().position(|m| m.id == watermark.message_id) {
        return &messages[position + 1..];
    }

    match messages.iter().position(|m| watermark.precedes(m)) {
        Some(start) => &messages[start..],
        None => &[],
    }
}

/// Chunk the candidates after `watermark`, numbering from `first_display_id`.
///
/// # Errors
///
/// Returns [`ArchiveErrorKind::EmptyInput`] when no message follows the watermark.
pub fn chunk(
    messages: &[Arc<ChatMessage>],
    max_per_unit: usize,
    watermark: Option<&Watermark>,
    first_display_id: u32,
    preview_chars: usize,
) -> ChronicleResult<Vec<Chunk>> {
    let candidates = candidates_after(messages, watermark);
    chunk_candidates(candidates, max_per_unit, first_display_id, preview_chars)
}

/// Split `candidates` into contiguous chunks of at most `max_per_unit` messages.
///
/// Display ids are assigned once over the whole candidate set, so selection
/// changes made afterwards never shift them.
pub fn chunk_candidates(
    candidates: &[Arc<ChatMessage>],
    max_per_unit: usize,
    first_display_id: u32,
    preview_chars: usize,
) -> ChronicleResult<Vec<Chunk>> {
    if candidates.is_empty() {
        return Err(ArchiveError::new(ArchiveErrorKind::EmptyInput).into());
    }

    let chunks: Vec<Chunk> = candidates
        .chunks(max_per_unit.max(1))
        .enumerate()
        .map(|(index, messages)| Chunk {
            index,
            display_id: first_display_id + index as u32,
            preview_text: preview(messages, preview_chars),
            messages: messages.to_vec(),
            selected: true,
            status: ChunkStatus::Pending,
        })
        .collect();

    tracing::debug!(
        candidates = candidates.len(),
        chunks = chunks.len(),
        first_display_id,
        "Chunked message log"
    );
    Ok(chunks)
}

/// Messages a chapter was generated from, looked up again in the log.
///
/// Starts at the span's first message id and ends at its last message id, or
/// after `message_count` messages when the last id is gone.
pub fn messages_in_span(
    messages: &[Arc<ChatMessage>],
    span: &MessageSpan,
) -> Option<Vec<Arc<ChatMessage>>> {
    let start = messages
        .iter()
        .position(|m| m.id == span.first_message_id)?;
    let end = messages[start..]
        .iter()
        .position(|m| m.id == span.last_message_id)
        .map(|offset| start + offset + 1)
        .unwrap_or_else(|| (start + span.message_count).min(messages.len()));
    Some(messages[start..end].to_vec())
}

/// Build a single chunk for `messages`, outside of any chunking pass.
pub fn single_chunk(
    messages: Vec<Arc<ChatMessage>>,
    display_id: u32,
    preview_chars: usize,
) -> Chunk {
    Chunk {
        index: 0,
        display_id,
        preview_text: preview(&messages, preview_chars),
        messages,
        selected: true,
        status: ChunkStatus::Pending,
    }
}

/// Excerpt of the first non-empty message, cut at `max_chars` characters.
fn preview(messages: &[Arc<ChatMessage>], max_chars: usize) -> String {
    let Some(text) = messages
        .iter()
        .map(|m| m.content.trim())
        .find(|content| !content.is_empty())
    else {
        return String::new();
    };

    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut excerpt: String = text.chars().take(max_chars).collect();
    excerpt.push('…');
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn log(contents: &[&str]) -> Vec<Arc<ChatMessage>> {
        contents
            .iter()
            .enumerate()
            .map(|(i, content)| {
                Arc::new(ChatMessage {
                    id: format!("m{}", i),
                    author: if i % 2 == 0 { "ana" } else { "bo" }.to_string(),
                    content: content.to_string(),
                    timestamp: Utc
                        .with_ymd_and_hms(2024, 1, 1, 10, 0, i as u32)
                        .unwrap(),
                })
            })
            .collect()
    }

    #[test]
    fn test_splits_by_count_with_stable_numbering() {
        let messages = log(&["a", "b", "c", "d", "e"]);
        let chunks = chunk(&messages, 2, None, 1, 80).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.display_id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(chunks[2].messages.len(), 1);
        assert!(chunks.iter().all(|c| c.selected));
        assert!(Arc::ptr_eq(&chunks[0].messages[0], &messages[0]));
    }

    #[test]
    fn test_watermark_by_id_continues_numbering() {
        let messages = log(&["a", "b", "c", "d"]);
        let watermark = Watermark::of(&messages[1]);
        let chunks = chunk(&messages, 10, Some(&watermark), 7, 80).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].display_id, 7);
        assert_eq!(chunks[0].messages[0].id, "m2");
    }

    #[test]
    fn test_watermark_falls_back_to_timestamp() {
        let messages = log(&["a", "b", "c"]);
        let mut watermark = Watermark::of(&messages[0]);
        watermark.message_id = "deleted".to_string();

        let candidates = candidates_after(&messages, Some(&watermark));
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_nothing_after_watermark_is_empty_input() {
        let messages = log(&["a", "b"]);
        let watermark = Watermark::of(&messages[1]);
        let err = chunk(&messages, 5, Some(&watermark), 3, 80).unwrap_err();
        assert!(err.is_empty_input());

        assert!(chunk(&[], 5, None, 1, 80).unwrap_err().is_empty_input());
    }

    #[test]
    fn test_messages_in_span() {
        let messages = log(&["a", "b", "c", "d"]);
        let chunks = chunk(&messages, 2, None, 1, 80).unwrap();
        let span = chunks[1].span().unwrap();

        let rebuilt = messages_in_span(&messages, &span).unwrap();
        assert_eq!(rebuilt.len(), 2);
        assert_eq!(rebuilt[0].id, "m2");

        let mut gone = span.clone();
        gone.first_message_id = "missing".to_string();
        assert!(messages_in_span(&messages, &gone).is_none());
    }

    #[test]
    fn test_preview_skips_blank_and_truncates() {
        let messages = log(&["   ", "a fairly long opening line"]);
        let chunks = chunk(&messages, 5, None, 1, 8).unwrap();
        assert_eq!(chunks[0].preview_text, "a fairly…");

        let short = chunk(&messages, 5, None, 1, 80).unwrap();
        assert_eq!(short[0].preview_text, "a fairly long opening line");
    }
}
