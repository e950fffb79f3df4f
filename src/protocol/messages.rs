use crate::decoration::{DecorationOption, Position, Range};
use crate::error::{Error, Result};
use crate::trace::{TraceEntry, VerificationStep};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize)]
pub struct Message {
    pub seq: u64,
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(flatten)]
    pub content: MessageContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Request {
        command: String,
        arguments: Option<Value>,
    },
    Response {
        request_seq: u64,
        success: bool,
        command: String,
        message: Option<String>,
        body: Option<Value>,
    },
    Event {
        event: String,
        body: Option<Value>,
    },
}

/// Decoration snapshot and step graph of one completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub uri: String,
    #[serde(default)]
    pub steps: Vec<VerificationStep>,
    pub decoration_options: Vec<DecorationOption>,
    #[serde(default)]
    pub global_info: Option<String>,
    /// Document contents, for editors that do not share a file system with us.
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UriParams {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTraceParams {
    #[serde(default)]
    pub request_id: u64,
    pub uri: String,
    pub client_state: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTrace {
    pub request_id: u64,
    pub uri: String,
    pub trace: Vec<TraceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowHeapParams {
    #[serde(default)]
    pub request_id: u64,
    pub uri: String,
    pub client_index: usize,
}

/// Heap description of one state, answering a [`ShowHeapParams`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeapGraph {
    pub request_id: u64,
    #[serde(rename = "fileUri")]
    pub uri: String,
    pub state: usize,
    pub heap: String,
    #[serde(default)]
    pub method_name: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionParams {
    pub uri: String,
    #[serde(flatten)]
    pub position: Position,
}

/// One marker as pushed to the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedDecoration {
    pub range: Range,
    pub content_text: String,
    pub color: String,
    pub hover_message: String,
}

#[derive(Debug, Clone)]
pub enum Request {
    Initialize(Value),
    StepsAsDecorationOptions(RunSnapshot),
    GetExecutionTrace(ExecutionTraceParams),
    ShowHeap(ShowHeapParams),
    SelectionChanged(SelectionParams),
    ShowStates(UriParams),
    HideStates(UriParams),
    AddMarkers(UriParams),
    RemoveMarkers(UriParams),
    CloseDocument(UriParams),
    StopVerification(UriParams),
    Disconnect,
}

impl Request {
    /// Validate a raw command and its arguments into a typed request.
    pub fn parse(command: &str, arguments: Option<Value>) -> Result<Self> {
        let args = arguments.unwrap_or_else(|| json!({}));
        let request = match command {
            "initialize" => Request::Initialize(args),
            "stepsAsDecorationOptions" => Request::StepsAsDecorationOptions(serde_json::from_value(args)?),
            "getExecutionTrace" => Request::GetExecutionTrace(serde_json::from_value(args)?),
            "showHeap" => Request::ShowHeap(serde_json::from_value(args)?),
            "selectionChanged" | "stateSelected" => Request::SelectionChanged(serde_json::from_value(args)?),
            "showStates" => Request::ShowStates(serde_json::from_value(args)?),
            "hideStates" => Request::HideStates(serde_json::from_value(args)?),
            "addMarkers" => Request::AddMarkers(serde_json::from_value(args)?),
            "removeMarkers" => Request::RemoveMarkers(serde_json::from_value(args)?),
            "closeDocument" => Request::CloseDocument(serde_json::from_value(args)?),
            "stopVerification" => Request::StopVerification(serde_json::from_value(args)?),
            "disconnect" => Request::Disconnect,
            other => return Err(Error::Protocol(format!("unhandled command: {other}"))),
        };
        Ok(request)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "body", rename_all = "camelCase")]
pub enum Event {
    SetDecorations {
        uri: String,
        decorations: Vec<RenderedDecoration>,
    },
    #[serde(rename_all = "camelCase")]
    HeapGraph {
        uri: String,
        state: usize,
        svg_path: PathBuf,
        method_name: Option<String>,
    },
    Hint {
        message: String,
    },
}

impl Event {
    pub fn into_parts(self) -> Result<(String, Value)> {
        let mut value = serde_json::to_value(self)?;
        let name = value
            .get("event")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Protocol("event without a name".to_string()))?;
        let body = value.get_mut("body").map(Value::take).unwrap_or(Value::Null);
        Ok((name, body))
    }
}
