//! Service Protocol Types
//!
//! Request and response shapes for the assistance service's unary JSON calls
//! and the chat exchange. Field naming follows the wire exactly: metadata and
//! document fields are snake_case, completion-response fields are camelCase.
//!
//! The service emits protobuf-JSON, which renders 64-bit integers as strings;
//! numeric fields that may arrive either way use a tolerant deserializer.

pub mod language;

use serde::{Deserialize, Deserializer, Serialize};

pub use language::Language;

/// Client identification attached to every request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// API key obtained from `RegisterUser`
    pub api_key: String,
    /// IDE name reported to the service
    pub ide_name: String,
    /// IDE version reported to the service
    pub ide_version: String,
    /// Version of this client
    pub extension_version: String,
}

/// Zero-based caret location in the document
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    /// Zero-based line
    #[serde(default, deserialize_with = "flexible_u32")]
    pub row: u32,
    /// Zero-based column
    #[serde(default, deserialize_with = "flexible_u32")]
    pub col: u32,
}

/// The document a completion is requested for
#[derive(Clone, Debug, Serialize)]
pub struct DocumentState {
    /// Full document text
    pub text: String,
    /// Editor language identifier (e.g. "python")
    pub editor_language: String,
    /// Wire language enum
    pub language: Language,
    /// Caret location
    pub cursor_position: CursorPosition,
}

/// Editor settings the service needs to format completions
#[derive(Clone, Copy, Debug, Serialize)]
pub struct EditorOptions {
    /// Tab width in columns
    pub tab_size: u32,
    /// Whether the editor inserts spaces for tabs
    pub insert_spaces: bool,
}

/// `GetCompletions` request body
#[derive(Clone, Debug, Serialize)]
pub struct CompletionRequest {
    /// Client identification
    pub metadata: RequestMetadata,
    /// Document snapshot
    pub document: DocumentState,
    /// Editor settings
    pub editor_options: EditorOptions,
}

/// `GetCompletions` response body
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CompletionResponse {
    /// Suggested completions, best first
    #[serde(default, rename = "completionItems")]
    pub completion_items: Vec<RawCompletionItem>,
}

/// One completion item as the service sends it
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawCompletionItem {
    /// The whole-completion text
    #[serde(default)]
    pub completion: CompletionText,
    /// Optional structured breakdown of the completion
    #[serde(default, rename = "completionParts")]
    pub completion_parts: Vec<CompletionPart>,
    /// Document span the completion replaces
    #[serde(default)]
    pub range: ReplaceRange,
    /// Optional text to place after the caret
    #[serde(default)]
    pub suffix: Option<CompletionSuffix>,
}

/// Wrapper around the completion text field
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CompletionText {
    /// Full insertion text
    #[serde(default)]
    pub text: String,
}

/// A structured piece of a completion
#[derive(Clone, Debug, Deserialize)]
pub struct CompletionPart {
    /// Part kind
    #[serde(rename = "type")]
    pub kind: CompletionPartKind,
    /// Part text
    #[serde(default)]
    pub text: String,
    /// Text between this part and the previous inline part
    #[serde(default)]
    pub prefix: String,
}

/// Kinds of completion parts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum CompletionPartKind {
    /// Completion continues the current line
    #[serde(rename = "COMPLETION_PART_TYPE_INLINE")]
    Inline,
    /// Portion of the current line already typed
    #[serde(rename = "COMPLETION_PART_TYPE_INLINE_MASK")]
    InlineMask,
    /// Completion adds whole lines below the current one
    #[serde(rename = "COMPLETION_PART_TYPE_BLOCK")]
    Block,
    /// Anything this client does not know
    #[serde(other)]
    Unknown,
}

/// Span of the document the completion replaces
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct ReplaceRange {
    /// Inclusive start of the span
    #[serde(default, rename = "startPosition")]
    pub start_position: CursorPosition,
    /// Exclusive end of the span
    #[serde(default, rename = "endPosition")]
    pub end_position: CursorPosition,
}

/// Text placed after the caret, with a caret adjustment
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CompletionSuffix {
    /// Suffix text inserted after the completion
    #[serde(default)]
    pub text: String,
    /// Signed caret offset applied after insertion
    #[serde(default, rename = "deltaCursorOffset", deserialize_with = "flexible_i64")]
    pub delta_cursor_offset: i64,
}

/// `RegisterUser` request body
#[derive(Clone, Debug, Serialize)]
pub struct RegisterUserRequest {
    /// Auth token obtained from the service's login flow
    pub firebase_id_token: String,
}

/// `RegisterUser` response body
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RegisterUserResponse {
    /// The API key to attach to subsequent requests
    #[serde(default)]
    pub api_key: Option<String>,
}

/// `Heartbeat` request body
#[derive(Clone, Debug, Serialize)]
pub struct HeartbeatRequest {
    /// Client identification
    pub metadata: RequestMetadata,
}

/// Who produced a chat turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The editor user
    User,
    /// The assistance service
    Assistant,
}

/// One prior turn of a conversation
///
/// The service is stateless; the full ordered history rides along with every
/// chat request so the model has context.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who produced this turn
    pub role: ChatRole,
    /// Turn text
    pub text: String,
}

impl ChatTurn {
    /// A turn from the user
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    /// A turn from the assistant
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// `GetChatMessage` request, serialized into the single request frame
#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    /// Client identification
    pub metadata: RequestMetadata,
    /// The user's new question
    pub prompt: String,
    /// Conversation this turn belongs to
    pub conversation_id: String,
    /// Prior turns, oldest first
    pub message_history: Vec<ChatTurn>,
}

/// Deserialize a u32 that may arrive as a JSON number or string
fn flexible_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u32),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Deserialize an i64 that may arrive as a JSON number or string
fn flexible_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_request_shape() {
        let request = CompletionRequest {
            metadata: RequestMetadata {
                api_key: "key".into(),
                ide_name: "vscode".into(),
                ide_version: "1.77.3".into(),
                extension_version: "1.2.15".into(),
            },
            document: DocumentState {
                text: "# hello\n".into(),
                editor_language: "python".into(),
                language: Language::Python,
                cursor_position: CursorPosition { row: 1, col: 0 },
            },
            editor_options: EditorOptions {
                tab_size: 4,
                insert_spaces: true,
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["metadata"]["api_key"], "key");
        assert_eq!(json["document"]["language"], 33);
        assert_eq!(json["document"]["cursor_position"]["row"], 1);
        assert_eq!(json["editor_options"]["insert_spaces"], true);
    }

    #[test]
    fn test_completion_response_parses_stringified_ints() {
        // protobuf-JSON renders int64 as strings
        let json = r#"{
            "completionItems": [{
                "completion": {"text": "print('hello')"},
                "completionParts": [
                    {"type": "COMPLETION_PART_TYPE_INLINE", "text": "print("},
                    {"type": "COMPLETION_PART_TYPE_INLINE", "prefix": "'", "text": "hello')"}
                ],
                "range": {
                    "startPosition": {"row": "1"},
                    "endPosition": {"row": "1", "col": "4"}
                },
                "suffix": {"text": ")", "deltaCursorOffset": "-1"}
            }]
        }"#;

        let response: CompletionResponse = serde_json::from_str(json).unwrap();
        let item = &response.completion_items[0];
        assert_eq!(item.completion.text, "print('hello')");
        assert_eq!(item.completion_parts.len(), 2);
        assert_eq!(item.range.start_position.row, 1);
        assert_eq!(item.range.start_position.col, 0);
        assert_eq!(item.range.end_position.col, 4);
        assert_eq!(item.suffix.as_ref().unwrap().delta_cursor_offset, -1);
    }

    #[test]
    fn test_unknown_part_kind_tolerated() {
        let json = r#"{"type": "COMPLETION_PART_TYPE_FUTURE", "text": "x"}"#;
        let part: CompletionPart = serde_json::from_str(json).unwrap();
        assert_eq!(part.kind, CompletionPartKind::Unknown);
    }

    #[test]
    fn test_chat_request_shape() {
        let request = ChatRequest {
            metadata: RequestMetadata {
                api_key: "key".into(),
                ide_name: "vscode".into(),
                ide_version: "1.77.3".into(),
                extension_version: "1.2.15".into(),
            },
            prompt: "why?".into(),
            conversation_id: "conv_0".into(),
            message_history: vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["message_history"][0]["role"], "user");
        assert_eq!(json["message_history"][1]["role"], "assistant");
        assert_eq!(json["conversation_id"], "conv_0");
    }

    #[test]
    fn test_empty_response_defaults() {
        let response: CompletionResponse = serde_json::from_str("{}").unwrap();
        assert!(response.completion_items.is_empty());
    }
}
