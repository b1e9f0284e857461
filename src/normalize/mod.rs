//! Tool and function-call translation between the OpenAI and Gemini
//! dialects.
//!
//! Every function here is pure. Malformed tool entries never abort a
//! conversion: they are dropped and reported in [`Normalized::skipped`]
//! so callers (and tests) can see what was lost without scraping logs.

pub mod messages;
pub mod types;

use serde_json::Value;
use tracing::debug;

pub use messages::{
    function_response_to_tool_message, last_signature, to_gemini_contents,
    tool_result_to_function_response, visible_text, GeminiContents,
};
pub use types::{
    empty_object_schema, ChatMessage, GeminiFunctionCall, GeminiFunctionDeclaration,
    GeminiFunctionResponse, GeminiToolResult, GeminiTools, MessageContent, OpenAiFunction,
    OpenAiTool, ToolCall, ToolCallFunction,
};

// ---------------------------------------------------------------------------
// Options and diagnostics
// ---------------------------------------------------------------------------

/// Knobs for best-effort normalisation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    /// Log each skipped entry at debug level.
    pub debug: bool,
}

impl NormalizeOptions {
    /// Read the debug flag from `MODELGATE_DEBUG`.
    pub fn from_env() -> Self {
        Self {
            debug: crate::utils::env_flag("MODELGATE_DEBUG"),
        }
    }
}

/// Why a tool entry did not survive conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// `type` was present and not `"function"`.
    UnsupportedType(String),
    /// The entry was not an object, or had no usable `function` object.
    MissingFunction,
    /// `function.name` was absent or empty.
    MissingName,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UnsupportedType(t) => write!(f, "unsupported tool type {t:?}"),
            SkipReason::MissingFunction => f.write_str("missing function definition"),
            SkipReason::MissingName => f.write_str("missing function name"),
        }
    }
}

/// A dropped input entry, by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTool {
    pub index: usize,
    pub reason: SkipReason,
}

/// The surviving output of a best-effort conversion plus its drops.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub value: T,
    pub skipped: Vec<SkippedTool>,
}

// ---------------------------------------------------------------------------
// OpenAI tools → Gemini declarations
// ---------------------------------------------------------------------------

/// Convert an OpenAI `tools` array into a Gemini tools block.
///
/// Entries without `type` count as functions. Returns `None` when the
/// input is empty or nothing survives filtering.
pub fn to_gemini_tools(tools: &[Value], opts: NormalizeOptions) -> Normalized<Option<GeminiTools>> {
    let mut declarations = Vec::new();
    let mut skipped = Vec::new();

    for (index, entry) in tools.iter().enumerate() {
        match declaration_from_openai(entry) {
            Ok(decl) => declarations.push(decl),
            Err(reason) => {
                if opts.debug {
                    debug!(index, reason = %reason, "skipping tool entry");
                }
                skipped.push(SkippedTool { index, reason });
            }
        }
    }

    let value = if declarations.is_empty() {
        None
    } else {
        Some(GeminiTools {
            function_declarations: declarations,
        })
    };

    Normalized { value, skipped }
}

fn declaration_from_openai(entry: &Value) -> Result<GeminiFunctionDeclaration, SkipReason> {
    let obj = entry.as_object().ok_or(SkipReason::MissingFunction)?;

    match obj.get("type") {
        None | Some(Value::Null) => {}
        Some(Value::String(t)) if t == "function" => {}
        Some(Value::String(t)) => return Err(SkipReason::UnsupportedType(t.clone())),
        Some(other) => return Err(SkipReason::UnsupportedType(other.to_string())),
    }

    let function = obj
        .get("function")
        .and_then(Value::as_object)
        .ok_or(SkipReason::MissingFunction)?;

    let name = function
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or(SkipReason::MissingName)?;

    let description = function
        .get("description")
        .and_then(Value::as_str)
        .map(String::from);

    let parameters = match function.get("parameters") {
        None | Some(Value::Null) => empty_object_schema(),
        Some(p) => p.clone(),
    };

    Ok(GeminiFunctionDeclaration {
        name: name.to_string(),
        description,
        parameters,
    })
}

/// `true` when at least one entry is `type: "function"` with a populated
/// `function` object.
pub fn has_function_tools(tools: &[Value]) -> bool {
    tools.iter().any(|t| {
        t.get("type").and_then(Value::as_str) == Some("function")
            && t
                .get("function")
                .and_then(Value::as_object)
                .map(|f| !f.is_empty())
                .unwrap_or(false)
    })
}

// ---------------------------------------------------------------------------
// Gemini calls → OpenAI tool calls
// ---------------------------------------------------------------------------

/// Convert Gemini response parts into OpenAI tool calls, preserving
/// order. Parts without a `functionCall` (including bare
/// `functionResponse` parts) are ignored. Ids are always fresh: the
/// Gemini shape has none to carry over.
pub fn from_gemini_calls(results: &[GeminiToolResult]) -> Vec<ToolCall> {
    results
        .iter()
        .filter_map(|r| r.function_call.as_ref())
        .map(|call| build_tool_call(call, crate::utils::batch_call_id()))
        .collect()
}

/// Like [`from_gemini_calls`] over raw JSON parts; unparseable parts are
/// skipped.
pub fn from_gemini_parts(parts: &[Value]) -> Vec<ToolCall> {
    let results: Vec<GeminiToolResult> = parts
        .iter()
        .filter_map(|p| serde_json::from_value(p.clone()).ok())
        .collect();
    from_gemini_calls(&results)
}

/// Convert one call as it arrives (streaming). Generates an id from the
/// current time and a short random suffix when none is given.
pub fn single_call_to_tool_call(call: &GeminiFunctionCall, id: Option<&str>) -> ToolCall {
    let id = id
        .map(String::from)
        .unwrap_or_else(crate::utils::single_call_id);
    build_tool_call(call, id)
}

fn build_tool_call(call: &GeminiFunctionCall, id: String) -> ToolCall {
    let arguments = match &call.args {
        None | Some(Value::Null) => "{}".to_string(),
        Some(args) => serde_json::to_string(args).unwrap_or_else(|_| "{}".to_string()),
    };
    ToolCall {
        id,
        kind: "function".to_string(),
        function: ToolCallFunction {
            name: call.name.clone(),
            arguments,
        },
    }
}

/// Inverse direction, used when replaying an OpenAI transcript to
/// Gemini. Undecodable `arguments` become `{}`.
pub fn tool_call_to_gemini_call(call: &ToolCall) -> GeminiFunctionCall {
    let args = serde_json::from_str::<Value>(&call.function.arguments)
        .ok()
        .filter(Value::is_object)
        .unwrap_or_else(|| Value::Object(Default::default()));
    GeminiFunctionCall {
        name: call.function.name.clone(),
        args: Some(args),
    }
}

// ---------------------------------------------------------------------------
// Declaration extraction from either shape
// ---------------------------------------------------------------------------

/// Structural classification of a tools value of unknown shape.
#[derive(Debug)]
pub enum ToolsInput<'a> {
    /// An OpenAI-style array.
    RawToolArray(&'a [Value]),
    /// A Gemini container with a non-empty `functionDeclarations`.
    NormalizedGeminiTools(&'a [Value]),
    Unrecognized,
}

impl<'a> ToolsInput<'a> {
    pub fn classify(value: &'a Value) -> Self {
        if let Some(arr) = value.as_array() {
            return ToolsInput::RawToolArray(arr);
        }
        match value.get("functionDeclarations").and_then(Value::as_array) {
            Some(decls) if !decls.is_empty() => ToolsInput::NormalizedGeminiTools(decls),
            _ => ToolsInput::Unrecognized,
        }
    }
}

/// Read Gemini declarations from either an already-normalised container
/// or a raw OpenAI array. Anything else yields an empty list.
pub fn extract_declarations(tools: &Value) -> Vec<GeminiFunctionDeclaration> {
    match ToolsInput::classify(tools) {
        ToolsInput::RawToolArray(arr) => to_gemini_tools(arr, NormalizeOptions::default())
            .value
            .map(|t| t.function_declarations)
            .unwrap_or_default(),
        ToolsInput::NormalizedGeminiTools(decls) => decls
            .iter()
            .filter_map(|d| serde_json::from_value::<GeminiFunctionDeclaration>(d.clone()).ok())
            .filter(|d| !d.name.is_empty())
            .map(GeminiFunctionDeclaration::with_placeholder_parameters)
            .collect(),
        ToolsInput::Unrecognized => Vec::new(),
    }
}
