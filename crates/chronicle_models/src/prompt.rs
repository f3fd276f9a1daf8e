//! Prompt text for chapter generation.

use chronicle_core::ChapterRequest;

/// Instruction sent as the system message.
pub const SYSTEM_PROMPT: &str = "You turn chat transcripts into chapters of an ongoing story. \
Write in past tense, third person. Respond with a single JSON object with the fields \
title, time_range, narrative and key_quotes (verbatim lines from the transcript). \
Output only the JSON object.";

/// User message carrying the participants and transcript of one chunk.
pub fn build_user_prompt(request: &ChapterRequest) -> String {
    format!(
        "Chapter {}\nParticipants: {}\n\nTranscript:\n{}",
        request.chapter_number,
        request.participants.join(", "),
        request.transcript
    )
}
