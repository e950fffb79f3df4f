use super::messages::{Event, Message, MessageContent, Request, RunSnapshot, SelectionParams, ShowHeapParams};
use super::service::TraceService;
use crate::anchor::{path_for_uri, AnchorOutcome, EditorSurface, TextDocument};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::session::{DocumentSession, GraphRenderer, SelectionAction};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

struct OpenDocument {
    session: DocumentSession,
    editor: TextDocument,
}

/// Handler result: response body plus events to emit after the response.
#[derive(Default)]
struct Reply {
    body: Option<Value>,
    events: Vec<Event>,
}

impl Reply {
    fn body(body: Value) -> Self {
        Self {
            body: Some(body),
            events: Vec::new(),
        }
    }
}

/// Content-Length framed JSON service over a reader/writer pair.
pub struct Server<R, W> {
    seq: u64,
    reader: R,
    writer: W,
    settings: Settings,
    service: TraceService,
    documents: HashMap<String, OpenDocument>,
}

impl<R: BufRead, W: Write> Server<R, W> {
    pub fn new(reader: R, writer: W, settings: Settings) -> Self {
        Self {
            seq: 0,
            reader,
            writer,
            settings,
            service: TraceService::new(),
            documents: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self, uri: &str) -> Option<&DocumentSession> {
        self.documents.get(uri).map(|doc| &doc.session)
    }

    pub fn document_text(&self, uri: &str) -> Option<&str> {
        self.documents.get(uri).map(|doc| doc.editor.text())
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Serve until `disconnect` or end of input.
    pub fn run(&mut self) -> Result<()> {
        let mut msg_count = 0u64;
        loop {
            msg_count += 1;
            debug!("waiting for message #{}", msg_count);

            let Some(msg) = self.read_message()? else {
                info!("input closed");
                self.shutdown();
                break;
            };

            match msg.content {
                MessageContent::Request { command, arguments } => {
                    if !self.handle_request(msg.seq, command, arguments)? {
                        break;
                    }
                }
                _ => debug!("non-request message ignored"),
            }
        }
        Ok(())
    }

    /// Dispatch one request and answer it. Returns `false` once disconnected.
    pub fn handle_request(&mut self, seq: u64, command: String, arguments: Option<Value>) -> Result<bool> {
        debug!(seq, %command, "received request");
        let request = match Request::parse(&command, arguments) {
            Ok(request) => request,
            Err(e) => {
                warn!(%command, "rejecting request: {}", e);
                self.send_response(seq, command, false, Some(e.to_string()), None)?;
                return Ok(true);
            }
        };

        if let Request::Disconnect = request {
            self.shutdown();
            self.send_response(seq, command, true, None, None)?;
            return Ok(false);
        }

        match self.dispatch(request) {
            Ok(reply) => {
                self.send_response(seq, command, true, None, reply.body)?;
                for event in reply.events {
                    self.send_event(event)?;
                }
            }
            Err(e) => {
                error!(%command, "error handling request: {}", e);
                if let Error::MissingTool { .. } = e {
                    self.send_event(Event::Hint { message: e.to_string() })?;
                }
                self.send_response(seq, command, false, Some(e.to_string()), None)?;
            }
        }
        Ok(true)
    }

    fn dispatch(&mut self, request: Request) -> Result<Reply> {
        match request {
            Request::Initialize(args) => self.handle_initialize(&args),
            Request::StepsAsDecorationOptions(snapshot) => self.handle_steps(snapshot),
            Request::GetExecutionTrace(params) => {
                let trace = self.service.execution_trace(&params, self.settings.mode());
                Ok(Reply::body(serde_json::to_value(trace)?))
            }
            Request::ShowHeap(params) => {
                if !self.settings.show_states {
                    debug!(uri = %params.uri, "states are hidden, heap not requested");
                    return Ok(Reply::default());
                }
                let doc = self.document_mut(&params.uri)?;
                if !doc.session.ready_to_debug() {
                    return Err(Error::NoSnapshot { uri: params.uri });
                }
                let request = doc.session.request_heap(params.client_index);
                self.show_heap(request)
            }
            Request::SelectionChanged(params) => self.handle_selection(params),
            Request::ShowStates(params) => {
                self.settings.show_states = true;
                let dark = self.settings.dark_graphs;
                let doc = self.document_mut(&params.uri)?;
                let outcome = doc.session.show_states(&mut doc.editor)?;
                let decorations = doc.session.rendered_decorations(dark);
                Ok(Reply {
                    body: Some(outcome_body(outcome)),
                    events: vec![Event::SetDecorations {
                        uri: params.uri,
                        decorations,
                    }],
                })
            }
            Request::HideStates(params) => {
                self.settings.show_states = false;
                let doc = self.document_mut(&params.uri)?;
                doc.session.hide_states();
                Ok(Reply {
                    body: None,
                    events: vec![Event::SetDecorations {
                        uri: params.uri,
                        decorations: Vec::new(),
                    }],
                })
            }
            Request::AddMarkers(params) => {
                let doc = self.document_mut(&params.uri)?;
                let outcome = doc.session.add_markers(&mut doc.editor)?;
                Ok(Reply::body(outcome_body(outcome)))
            }
            Request::RemoveMarkers(params) => {
                let doc = self.document_mut(&params.uri)?;
                let outcome = doc.session.remove_markers(&mut doc.editor)?;
                Ok(Reply::body(outcome_body(outcome)))
            }
            Request::CloseDocument(params) => {
                let Some(mut doc) = self.documents.remove(&params.uri) else {
                    return Err(Error::UnknownDocument { uri: params.uri });
                };
                let outcome = match doc.editor.path().map(PathBuf::from) {
                    Some(path) => doc.session.remove_markers_from_closed_document(&path)?,
                    None => doc.session.remove_markers(&mut doc.editor)?,
                };
                doc.session.complete_reset();
                self.service.stop(&params.uri);
                Ok(Reply::body(outcome_body(outcome)))
            }
            Request::StopVerification(params) => {
                self.service.stop(&params.uri);
                Ok(Reply::default())
            }
            Request::Disconnect => Ok(Reply::default()),
        }
    }

    fn handle_initialize(&mut self, args: &Value) -> Result<Reply> {
        self.settings.merge(args)?;
        info!(mode = ?self.settings.mode(), "settings updated");
        Ok(Reply::body(json!({
            "supportsExecutionTrace": true,
            "supportsHeapGraphs": self.settings.renderer_command().is_some(),
            "supportsRequestIds": true,
        })))
    }

    fn handle_steps(&mut self, mut snapshot: RunSnapshot) -> Result<Reply> {
        let uri = snapshot.uri.clone();
        let editor = match snapshot.text.take() {
            Some(text) => TextDocument::new(uri.clone(), text),
            None => TextDocument::open(&path_for_uri(&uri)?)?,
        };
        self.service.store_run(&uri, std::mem::take(&mut snapshot.steps));

        let doc = self.documents.entry(uri.clone()).or_insert_with(|| OpenDocument {
            session: DocumentSession::new(uri.clone()),
            editor: editor.clone(),
        });
        doc.editor = editor;
        doc.session.store_snapshot(snapshot)?;

        let mut reply = Reply::body(json!({ "states": doc.session.store().len() }));
        if self.settings.show_states {
            doc.session.show_states(&mut doc.editor)?;
            reply.events.push(Event::SetDecorations {
                uri,
                decorations: doc.session.rendered_decorations(self.settings.dark_graphs),
            });
        }
        Ok(reply)
    }

    fn handle_selection(&mut self, params: SelectionParams) -> Result<Reply> {
        if !self.settings.show_states {
            return Ok(Reply::body(json!({ "action": "ignored" })));
        }
        let mode = self.settings.mode();
        let doc = self.document_mut(&params.uri)?;
        match doc.session.on_position(params.position, mode) {
            SelectionAction::Ignored => Ok(Reply::body(json!({ "action": "ignored" }))),
            SelectionAction::Redisplay => {
                let mut reply = Reply::body(json!({ "action": "redisplay" }));
                if let Some(heap) = doc.session.heap().focused() {
                    reply.events.push(Event::HeapGraph {
                        uri: params.uri.clone(),
                        state: heap.state,
                        svg_path: heap.svg_path.clone(),
                        method_name: heap.method_name.clone(),
                    });
                }
                Ok(reply)
            }
            SelectionAction::RequestHeap(request) => {
                let mut reply = self.show_heap(request)?;
                reply.body = Some(json!({ "action": "requestHeap" }));
                Ok(reply)
            }
        }
    }

    /// Answer a heap request locally, then render it and mark the selection.
    fn show_heap(&mut self, request: ShowHeapParams) -> Result<Reply> {
        let Some(graph) = self.service.heap_graph(&request) else {
            return Ok(Reply::default());
        };
        let renderer = GraphRenderer::from_settings(&self.settings)?;
        let mode = self.settings.mode();
        let dark = self.settings.dark_graphs;

        let doc = self
            .documents
            .get_mut(&request.uri)
            .ok_or_else(|| Error::UnknownDocument { uri: request.uri.clone() })?;
        let Some(trace_request) = doc.session.accept_heap_graph(&graph, &self.settings, &renderer)? else {
            return Ok(Reply::default());
        };
        let trace = self.service.execution_trace(&trace_request, mode);
        doc.session.apply_trace(&trace);

        let mut reply = Reply::default();
        if let Some(heap) = doc.session.heap().focused() {
            reply.events.push(Event::HeapGraph {
                uri: request.uri.clone(),
                state: heap.state,
                svg_path: heap.svg_path.clone(),
                method_name: heap.method_name.clone(),
            });
        }
        reply.events.push(Event::SetDecorations {
            uri: request.uri,
            decorations: doc.session.rendered_decorations(dark),
        });
        Ok(reply)
    }

    fn document_mut(&mut self, uri: &str) -> Result<&mut OpenDocument> {
        self.documents
            .get_mut(uri)
            .ok_or_else(|| Error::UnknownDocument { uri: uri.to_string() })
    }

    /// Strip anchors from every open document before going away.
    fn shutdown(&mut self) {
        for (uri, doc) in self.documents.iter_mut() {
            debug!(%uri, "removing anchors of open document");
            if let Err(e) = doc.session.remove_markers(&mut doc.editor) {
                error!(%uri, "error removing anchors on shutdown: {}", e);
            }
        }
    }

    pub fn send_response(
        &mut self,
        request_seq: u64,
        command: String,
        success: bool,
        message: Option<String>,
        body: Option<Value>,
    ) -> Result<()> {
        let msg = Message {
            seq: self.next_seq(),
            msg_type: "response".to_string(),
            content: MessageContent::Response {
                request_seq,
                success,
                command,
                message,
                body,
            },
        };
        self.send_message(&msg)
    }

    pub fn send_event(&mut self, event: Event) -> Result<()> {
        let (event, body) = event.into_parts()?;
        let msg = Message {
            seq: self.next_seq(),
            msg_type: "event".to_string(),
            content: MessageContent::Event { event, body: Some(body) },
        };
        self.send_message(&msg)
    }

    fn send_message(&mut self, msg: &Message) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        // Exactly "Content-Length: {len}\r\n\r\n{json}"
        write!(self.writer, "Content-Length: {}\r\n\r\n{}", json.len(), json)?;
        self.writer.flush()?;
        debug!("sent {} bytes", json.len());
        Ok(())
    }

    /// Read one framed message; `None` at end of input.
    pub fn read_message(&mut self) -> Result<Option<Message>> {
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                if content_length > 0 {
                    break;
                }
                continue;
            }
            if let Some(value) = line.strip_prefix("Content-Length:") {
                content_length = value
                    .trim()
                    .parse()
                    .map_err(|_| Error::Protocol(format!("bad Content-Length header: {line}")))?;
            }
        }

        let mut buffer = vec![0u8; content_length];
        self.reader.read_exact(&mut buffer)?;
        Ok(Some(serde_json::from_slice(&buffer)?))
    }
}

fn outcome_body(outcome: AnchorOutcome) -> Value {
    match outcome {
        AnchorOutcome::Applied { edits } => json!({ "outcome": "applied", "edits": edits }),
        AnchorOutcome::Unchanged => json!({ "outcome": "unchanged" }),
        AnchorOutcome::Busy => json!({ "outcome": "busy" }),
    }
}
