//! Chapters: the structured narrative produced from one chunk, or entered by hand.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

/// Identifies the messages a chapter was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageSpan {
    /// Id of the first message in the chunk
    pub first_message_id: String,
    /// Id of the last message in the chunk
    pub last_message_id: String,
    /// Number of messages in the chunk
    pub message_count: usize,
}

/// One entry of the archive.
///
/// # Examples
///
/// ```
/// use chronicle_core::ChapterBuilder;
///
/// let chapter = ChapterBuilder::default()
///     .chapter_number(4u32)
///     .title("The Crossing")
///     .narrative("They left at dawn.")
///     .build()
///     .unwrap();
///
/// assert!(!chapter.is_error);
/// assert!(chapter.key_quotes.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into), build_fn(error = "chronicle_error::BuilderError"))]
pub struct Chapter {
    /// Display id of the producing chunk, or a user-chosen number
    pub chapter_number: u32,
    /// Chapter title
    pub title: String,
    /// Human-readable time span covered
    #[builder(default)]
    #[serde(default)]
    pub time_range: String,
    /// Narrative body, or the failure diagnostic for placeholders
    pub narrative: String,
    /// Verbatim quotes picked from the transcript
    #[builder(default)]
    #[serde(default)]
    pub key_quotes: Vec<String>,
    /// True when generation exhausted its retries
    #[builder(default)]
    #[serde(default)]
    pub is_error: bool,
    /// True for chapters inserted by the user
    #[builder(default)]
    #[serde(default)]
    pub manual: bool,
    /// Messages the chapter was generated from
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<MessageSpan>,
}

impl Chapter {
    /// Build a chapter from parsed backend output.
    pub fn from_content(
        chapter_number: u32,
        content: ChapterContent,
        source: Option<MessageSpan>,
    ) -> Self {
        Self {
            chapter_number,
            title: content.title,
            time_range: content.time_range,
            narrative: content.narrative,
            key_quotes: content.key_quotes,
            is_error: false,
            manual: false,
            source,
        }
    }

    /// Diagnostic chapter committed when generation failed for good.
    pub fn placeholder(
        chapter_number: u32,
        error_message: impl AsRef<str>,
        source: Option<MessageSpan>,
    ) -> Self {
        Self {
            chapter_number,
            title: format!("Chapter {} (generation failed)", chapter_number),
            time_range: String::new(),
            narrative: format!("Generation failed: {}", error_message.as_ref()),
            key_quotes: Vec::new(),
            is_error: true,
            manual: false,
            source,
        }
    }
}

/// Structured fields the backend is asked to return for a chunk.
///
/// Accepts the snake_case names of [`chapter_schema`] as well as the camelCase
/// spellings models tend to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterContent {
    /// Chapter number echoed by the model, if any (never trusted)
    #[serde(default, alias = "chapter", alias = "chapterNumber")]
    pub chapter_number: Option<u32>,
    /// Chapter title
    pub title: String,
    /// Time span covered
    #[serde(default, alias = "timeRange")]
    pub time_range: String,
    /// Narrative body
    pub narrative: String,
    /// Quotes from the transcript
    #[serde(default, alias = "keyQuotes", alias = "quotes")]
    pub key_quotes: Vec<String>,
}

/// User edit of a chapter; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Builder)]
#[builder(
    default,
    setter(into, strip_option),
    build_fn(error = "chronicle_error::BuilderError")
)]
pub struct ChapterEdit {
    /// New chapter number
    pub chapter_number: Option<u32>,
    /// New title
    pub title: Option<String>,
    /// New time range
    pub time_range: Option<String>,
    /// New narrative
    pub narrative: Option<String>,
    /// New quote list
    pub key_quotes: Option<Vec<String>>,
}

impl ChapterEdit {
    /// Apply the edit in place.
    ///
    /// Editing the narrative of a failed chapter clears its error flag: the user
    /// has replaced the diagnostic with content.
    pub fn apply(&self, chapter: &mut Chapter) {
        if let Some(number) = self.chapter_number {
            chapter.chapter_number = number;
        }
        if let Some(title) = &self.title {
            chapter.title = title.clone();
        }
        if let Some(time_range) = &self.time_range {
            chapter.time_range = time_range.clone();
        }
        if let Some(narrative) = &self.narrative {
            chapter.narrative = narrative.clone();
            chapter.is_error = false;
        }
        if let Some(key_quotes) = &self.key_quotes {
            chapter.key_quotes = key_quotes.clone();
        }
    }
}

/// JSON schema sent to the backend for schema-constrained output.
pub fn chapter_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string" },
            "time_range": { "type": "string" },
            "narrative": { "type": "string" },
            "key_quotes": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "required": ["title", "time_range", "narrative", "key_quotes"],
        "additionalProperties": false
    })
}
