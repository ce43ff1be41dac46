//! A backend that drives a llama.cpp `llama-server` over its OpenAI-compatible API.
//!
//! Loading validates the GGUF artifact on disk and confirms the server is
//! serving that same artifact.  Each session keeps its own message history and
//! sends the whole conversation with every generation.

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::stream::{self, Stream, StreamExt};
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use url::Url;

use crate::backend::{Backend, Conversation, LoadOptions, TokenStream};
use crate::error::{Error, Result};
use crate::observability::{
    BACKEND_REQUESTS, BACKEND_REQUEST_ERRORS, SESSIONS_CLOSED, SESSIONS_OPENED,
};
use crate::sse::{SseFrame, process_sse};

/// Default base URL of a locally running `llama-server`.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080/";

/// Magic bytes at the start of every GGUF file.
const GGUF_MAGIC: &[u8; 4] = b"GGUF";

/// A message in the chat-completions wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// One of `system`, `user`, `assistant`.
    pub role: String,
    /// The message text.
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// A model artifact served by a `llama-server` instance.
#[derive(Debug, Clone)]
pub struct LlamaServer {
    client: ReqwestClient,
    base_url: Url,
    artifact: PathBuf,
    model_id: String,
}

impl LlamaServer {
    /// Loads `artifact` through the server at `base_url`.
    ///
    /// Without `allow_network_fetch` the artifact must exist locally and start
    /// with the GGUF magic.  In every case the server must list an artifact
    /// with the same file name; a different model is never substituted.
    pub async fn load(artifact: &Path, base_url: &Url, options: LoadOptions) -> Result<Self> {
        let file_name = artifact
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                Error::model_load("artifact path has no file name", Some(artifact.to_path_buf()))
            })?
            .to_string();

        if artifact.exists() {
            check_gguf_magic(artifact).await?;
        } else if !options.allow_network_fetch {
            return Err(Error::model_load(
                "artifact does not exist and network fetch is disabled",
                Some(artifact.to_path_buf()),
            ));
        }

        // No request timeout: a stalled stream waits for the server or an interrupt.
        let client = ReqwestClient::builder().build().map_err(|e| {
            Error::model_load(
                format!("Failed to build HTTP client: {e}"),
                Some(artifact.to_path_buf()),
            )
        })?;

        let model_id = probe_served_model(&client, base_url, artifact, &file_name).await?;
        tracing::info!(
            artifact = %artifact.display(),
            model_id = %model_id,
            device = %options.device,
            server = %base_url,
            "model loaded"
        );

        Ok(Self {
            client,
            base_url: base_url.clone(),
            artifact: artifact.to_path_buf(),
            model_id,
        })
    }

    /// The artifact this model was loaded from.
    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// The identifier the server uses for this model.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    fn completions_url(&self) -> Result<Url> {
        self.base_url.join("v1/chat/completions").map_err(|e| {
            Error::configuration(format!("invalid server URL: {e}"), Some("server".to_string()))
        })
    }
}

async fn check_gguf_magic(artifact: &Path) -> Result<()> {
    let mut file = tokio::fs::File::open(artifact).await.map_err(|e| {
        Error::model_load(
            format!("cannot open artifact: {e}"),
            Some(artifact.to_path_buf()),
        )
    })?;
    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).await.is_err() || &magic != GGUF_MAGIC {
        return Err(Error::model_load(
            "artifact is not a GGUF file",
            Some(artifact.to_path_buf()),
        ));
    }
    Ok(())
}

async fn probe_served_model(
    client: &ReqwestClient,
    base_url: &Url,
    artifact: &Path,
    file_name: &str,
) -> Result<String> {
    let load_error = |message: String| Error::model_load(message, Some(artifact.to_path_buf()));

    let url = base_url
        .join("v1/models")
        .map_err(|e| load_error(format!("invalid server URL: {e}")))?;
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| load_error(format!("server at {base_url} is unreachable: {e}")))?;
    if !response.status().is_success() {
        return Err(load_error(format!(
            "server at {base_url} answered {} when listing models",
            response.status()
        )));
    }
    let models: ModelList = response
        .json()
        .await
        .map_err(|e| load_error(format!("cannot parse model list from {url}: {e}")))?;

    models
        .data
        .into_iter()
        .map(|entry| entry.id)
        .find(|id| served_id_matches(id, file_name))
        .ok_or_else(|| load_error(format!("server at {base_url} does not serve {file_name}")))
}

fn served_id_matches(id: &str, file_name: &str) -> bool {
    Path::new(id)
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name == file_name)
}

impl Backend for LlamaServer {
    type Session = LlamaSession;

    fn open_session(&self, system_prompt: &str) -> Result<LlamaSession> {
        let url = self.completions_url()?;
        SESSIONS_OPENED.click();
        tracing::debug!(model_id = %self.model_id, "session opened");
        Ok(LlamaSession {
            client: self.client.clone(),
            url,
            model_id: self.model_id.clone(),
            history: vec![ChatMessage::new("system", system_prompt)],
        })
    }
}

/// A conversation held against a [`LlamaServer`].
pub struct LlamaSession {
    client: ReqwestClient,
    url: Url,
    model_id: String,
    history: Vec<ChatMessage>,
}

impl LlamaSession {
    /// The completed turns of this conversation, system message first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    fn request(&self, prompt: &str, max_tokens: u32) -> reqwest::RequestBuilder {
        let mut messages = self.history.clone();
        messages.push(ChatMessage::new("user", prompt));
        let body = CompletionRequest {
            model: &self.model_id,
            messages: &messages,
            max_tokens,
            stream: true,
        };
        self.client
            .post(self.url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body)
    }
}

impl Conversation for LlamaSession {
    fn generate(&mut self, prompt: &str, max_tokens: u32) -> TokenStream<'_> {
        let request = self.request(prompt, max_tokens);
        let turn = Turn {
            history: &mut self.history,
            prompt: prompt.to_string(),
            reply: String::new(),
            phase: Phase::Pending(request),
        };
        Box::pin(turn.into_stream())
    }
}

impl Drop for LlamaSession {
    fn drop(&mut self) {
        SESSIONS_CLOSED.click();
        tracing::debug!(model_id = %self.model_id, turns = self.history.len() / 2, "session closed");
    }
}

type FrameStream = std::pin::Pin<Box<dyn Stream<Item = Result<SseFrame>> + Send>>;

enum Phase {
    Pending(reqwest::RequestBuilder),
    Streaming(FrameStream),
    Finished,
}

/// One generation in flight.  Commits the turn to history only on a clean end.
struct Turn<'a> {
    history: &'a mut Vec<ChatMessage>,
    prompt: String,
    reply: String,
    phase: Phase,
}

impl<'a> Turn<'a> {
    fn into_stream(self) -> impl Stream<Item = Result<String>> + Send + 'a {
        stream::unfold(self, |mut turn| async move {
            loop {
                match std::mem::replace(&mut turn.phase, Phase::Finished) {
                    Phase::Pending(request) => match send(request).await {
                        Ok(frames) => turn.phase = Phase::Streaming(frames),
                        Err(err) => return Some((Err(err), turn)),
                    },
                    Phase::Streaming(mut frames) => match frames.next().await {
                        Some(Ok(SseFrame::Delta(text))) => {
                            turn.phase = Phase::Streaming(frames);
                            if text.is_empty() {
                                continue;
                            }
                            turn.reply.push_str(&text);
                            return Some((Ok(text), turn));
                        }
                        Some(Ok(SseFrame::Done)) => {
                            turn.commit();
                            return None;
                        }
                        None => {
                            BACKEND_REQUEST_ERRORS.click();
                            tracing::warn!(bytes = turn.reply.len(), "completion stream ended without [DONE]");
                            return Some((
                                Err(Error::generation(
                                    "server closed the stream before the response was complete",
                                    None,
                                )),
                                turn,
                            ));
                        }
                        Some(Err(err)) => {
                            BACKEND_REQUEST_ERRORS.click();
                            return Some((Err(err), turn));
                        }
                    },
                    Phase::Finished => return None,
                }
            }
        })
    }

    fn commit(&mut self) {
        self.history
            .push(ChatMessage::new("user", std::mem::take(&mut self.prompt)));
        self.history
            .push(ChatMessage::new("assistant", std::mem::take(&mut self.reply)));
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<FrameStream> {
    BACKEND_REQUESTS.click();
    let start = Instant::now();
    let response = request.send().await.map_err(|e| {
        BACKEND_REQUEST_ERRORS.click();
        Error::generation(format!("Request failed: {e}"), Some(Box::new(e)))
    })?;

    let status = response.status();
    if !status.is_success() {
        BACKEND_REQUEST_ERRORS.click();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::generation(
            format!("server answered {status}: {body}"),
            None,
        ));
    }
    tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "completion stream opened");

    Ok(Box::pin(process_sse(response.bytes_stream())))
}
