//! Request handling for the generative-text proxy.
//!
//! The page posts `{ "prompt": string }` and gets back `{ "text": string }`.
//! Transport to the upstream API sits behind the [`Upstream`] trait; this
//! module owns validation, payload construction, reply extraction and the
//! mapping of every failure onto an HTTP status. Credentials never appear in
//! a response body.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const FILE_SEARCH_STORE_VAR: &str = "FILE_SEARCH_STORE_NAME";
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";
pub const FALLBACK_TEXT: &str = "No he podido generar una respuesta útil en este momento.";

const DEFAULT_PROMPT_PREFIX: &str = "Pregunta del usuario sobre el Re(s)etario de APICCA:\n";

const DEFAULT_INSTRUCTIONS: &[&str] = &[
    "Eres experto en APICCA COMÚN y solo respondes temas relacionados con las tácticas del Re(s)etario.",
    "Responde siempre en español latinoamericano, de forma clara y breve, usando un máximo de 80 palabras.",
    "Responde siempre con un humor negro y una creatividad, que recuerda al de Terry Pratchett.",
    "Nunca utilices modismos.",
    "No utilices markdown en tus respuestas, utiliza siempre etiquetas html.",
    "Usa los documentos del File Search Store del Re(s)etario como fuente principal de información.",
    "La respuesta la debes estructurar como si fuera una receta de cocina que utiliza como ingredientes a las tácticas que el usuario ha enviado.",
    "Estructura SIEMPRE tu respuesta en dos secciones, en este orden:",
    "<h4>1. Poner la mesa común.</h4>",
    "<h4>2. Preparar presentes alternativos.</h4>",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextResponse {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("method not allowed, use POST")]
    MethodNotAllowed,

    #[error("server configuration incomplete: missing {0}")]
    MissingConfig(&'static str),

    #[error("request body must include a non-empty string field 'prompt'")]
    InvalidPrompt,

    #[error("upstream API returned an error")]
    Upstream { status: u16 },

    #[error("internal error while calling the upstream API")]
    Internal,
}

impl ProxyError {
    pub fn status(&self) -> u16 {
        match self {
            ProxyError::MethodNotAllowed => 405,
            ProxyError::InvalidPrompt => 400,
            ProxyError::Upstream { .. } => 502,
            ProxyError::MissingConfig(_) | ProxyError::Internal => 500,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            status: match self {
                ProxyError::Upstream { status } => Some(*status),
                _ => None,
            },
        }
    }
}

#[derive(Clone)]
pub struct ProxyConfig {
    pub api_key: String,
    pub file_search_store: String,
    pub model: String,
    pub prompt_prefix: String,
    pub instructions: Vec<String>,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("api_key", &"<redacted>")
            .field("file_search_store", &self.file_search_store)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ProxyConfig {
    /// Reads settings through `lookup`; blank values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ProxyError> {
        let read = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ProxyError::MissingConfig(name))
        };
        let api_key = read(API_KEY_VAR)?;
        let file_search_store = read(FILE_SEARCH_STORE_VAR)?;
        Ok(Self {
            api_key,
            file_search_store,
            model: DEFAULT_MODEL.to_owned(),
            prompt_prefix: DEFAULT_PROMPT_PREFIX.to_owned(),
            instructions: DEFAULT_INSTRUCTIONS.iter().map(|s| (*s).to_owned()).collect(),
        })
    }

    pub fn from_env() -> Result<Self, ProxyError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: String) -> Self {
        Self {
            role: Some(role.to_owned()),
            parts: vec![Part { text: Some(text) }],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSearch {
    pub file_search_store_names: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub file_search: FileSearch,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
    pub tools: Vec<Tool>,
}

impl GenerateRequest {
    pub fn build(config: &ProxyConfig, prompt: &str) -> Self {
        Self {
            system_instruction: Content::text("system", config.instructions.join(" ")),
            contents: vec![Content::text(
                "user",
                format!("{}{}", config.prompt_prefix, prompt),
            )],
            tools: vec![Tool {
                file_search: FileSearch {
                    file_search_store_names: vec![config.file_search_store.clone()],
                },
            }],
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GenerateReply {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateReply {
    /// Text parts of the first candidate joined by newlines, trimmed.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|p| p.text.as_deref().unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join("\n")
                    .trim()
                    .to_owned()
            })
            .unwrap_or_default()
    }
}

/// Raw upstream HTTP outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: String,
}

/// Transport to the generative-text API. `Err` means the request never
/// produced an HTTP response.
pub trait Upstream {
    fn generate(
        &mut self,
        model: &str,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<UpstreamReply, String>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProxyResponse {
    pub status: u16,
    pub body: Value,
}

impl ProxyResponse {
    fn ok(text: String) -> Self {
        Self {
            status: 200,
            body: serde_json::to_value(TextResponse { text }).unwrap_or(Value::Null),
        }
    }

    fn error(err: &ProxyError) -> Self {
        Self {
            status: err.status(),
            body: serde_json::to_value(err.body()).unwrap_or(Value::Null),
        }
    }
}

/// Handles one proxy request end to end.
pub fn handle(
    method: &str,
    body: &str,
    lookup: impl Fn(&str) -> Option<String>,
    upstream: &mut impl Upstream,
) -> ProxyResponse {
    match respond(method, body, lookup, upstream) {
        Ok(text) => ProxyResponse::ok(text),
        Err(err) => ProxyResponse::error(&err),
    }
}

fn respond(
    method: &str,
    body: &str,
    lookup: impl Fn(&str) -> Option<String>,
    upstream: &mut impl Upstream,
) -> Result<String, ProxyError> {
    if method != "POST" {
        return Err(ProxyError::MethodNotAllowed);
    }

    let config =
        ProxyConfig::from_lookup(lookup).inspect_err(|err| error!(%err, "proxy misconfigured"))?;
    let prompt = parse_prompt(body)?;
    let request = GenerateRequest::build(&config, &prompt);

    let reply = upstream
        .generate(&config.model, &config.api_key, &request)
        .map_err(|err| {
            error!(%err, "upstream call failed");
            ProxyError::Internal
        })?;

    if !(200..300).contains(&reply.status) {
        error!(status = reply.status, body = %reply.body, "upstream returned an error");
        return Err(ProxyError::Upstream {
            status: reply.status,
        });
    }

    let parsed: GenerateReply = serde_json::from_str(&reply.body).map_err(|err| {
        error!(%err, "upstream reply is not valid json");
        ProxyError::Internal
    })?;
    let text = parsed.text();
    if text.is_empty() {
        warn!("upstream reply carried no usable text");
        return Ok(FALLBACK_TEXT.to_owned());
    }
    Ok(text)
}

/// Extracts the prompt, which must be a string that is non-empty once trimmed.
pub fn parse_prompt(body: &str) -> Result<String, ProxyError> {
    let value: Value = serde_json::from_str(body).map_err(|_| ProxyError::InvalidPrompt)?;
    match value.get("prompt").and_then(Value::as_str) {
        Some(prompt) if !prompt.trim().is_empty() => Ok(prompt.to_owned()),
        _ => Err(ProxyError::InvalidPrompt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "sk-secret-123";

    fn env(name: &str) -> Option<String> {
        match name {
            API_KEY_VAR => Some(KEY.to_owned()),
            FILE_SEARCH_STORE_VAR => Some("stores/resetario".to_owned()),
            _ => None,
        }
    }

    struct Canned {
        reply: Result<UpstreamReply, String>,
        seen: Vec<GenerateRequest>,
    }

    impl Canned {
        fn new(status: u16, body: &str) -> Self {
            Self {
                reply: Ok(UpstreamReply {
                    status,
                    body: body.to_owned(),
                }),
                seen: Vec::new(),
            }
        }
    }

    impl Upstream for Canned {
        fn generate(
            &mut self,
            model: &str,
            api_key: &str,
            request: &GenerateRequest,
        ) -> Result<UpstreamReply, String> {
            assert_eq!(model, DEFAULT_MODEL);
            assert_eq!(api_key, KEY);
            self.seen.push(request.clone());
            self.reply.clone()
        }
    }

    const GOOD: &str = r#"{ "candidates": [ { "content": { "parts": [
        { "text": " <h4>1.</h4>" }, { "text": "<h4>2.</h4> " } ] } } ] }"#;

    #[test]
    fn success_joins_parts() {
        let mut up = Canned::new(200, GOOD);
        let res = handle("POST", r#"{ "prompt": "hola" }"#, env, &mut up);
        assert_eq!(res.status, 200);
        assert_eq!(res.body["text"], "<h4>1.</h4>\n<h4>2.</h4>");

        let sent = &up.seen[0];
        let user = sent.contents[0].parts[0].text.as_deref().unwrap();
        assert!(user.ends_with("\nhola"));
        assert_eq!(sent.tools[0].file_search.file_search_store_names, ["stores/resetario"]);
    }

    #[test]
    fn payload_uses_camel_case_keys() {
        let config = ProxyConfig::from_lookup(env).unwrap();
        let json = serde_json::to_value(GenerateRequest::build(&config, "x")).unwrap();
        assert!(json.get("systemInstruction").is_some());
        assert!(json["tools"][0]["fileSearch"]["fileSearchStoreNames"].is_array());
    }

    #[test]
    fn rejects_other_methods() {
        let mut up = Canned::new(200, GOOD);
        for method in ["GET", "PUT", "post", "Post"] {
            let res = handle(method, r#"{ "prompt": "hola" }"#, env, &mut up);
            assert_eq!(res.status, 405, "{method}");
        }
        assert!(up.seen.is_empty());
    }

    #[test]
    fn missing_config_is_500() {
        let mut up = Canned::new(200, GOOD);
        let res = handle("POST", r#"{ "prompt": "hola" }"#, |_| None, &mut up);
        assert_eq!(res.status, 500);
        assert!(res.body["error"].as_str().unwrap().contains(API_KEY_VAR));
    }

    #[test]
    fn invalid_prompts_are_400() {
        for body in ["", "{}", r#"{ "prompt": 3 }"#, r#"{ "prompt": "   " }"#, "not json"] {
            let mut up = Canned::new(200, GOOD);
            assert_eq!(handle("POST", body, env, &mut up).status, 400, "{body}");
        }
    }

    #[test]
    fn upstream_failure_is_502_with_status() {
        let mut up = Canned::new(429, "quota");
        let res = handle("POST", r#"{ "prompt": "hola" }"#, env, &mut up);
        assert_eq!(res.status, 502);
        assert_eq!(res.body["status"], 429);
    }

    #[test]
    fn transport_failure_is_500() {
        let mut up = Canned::new(200, GOOD);
        up.reply = Err("connection reset".to_owned());
        let res = handle("POST", r#"{ "prompt": "hola" }"#, env, &mut up);
        assert_eq!(res.status, 500);
    }

    #[test]
    fn empty_reply_falls_back() {
        let mut up = Canned::new(200, r#"{ "candidates": [] }"#);
        let res = handle("POST", r#"{ "prompt": "hola" }"#, env, &mut up);
        assert_eq!(res.status, 200);
        assert_eq!(res.body["text"], FALLBACK_TEXT);
    }

    #[test]
    fn key_never_leaks() {
        let cases = [
            Canned::new(200, GOOD),
            Canned::new(500, KEY),
            Canned::new(200, "garbage"),
        ];
        for mut up in cases {
            let res = handle("POST", r#"{ "prompt": "hola" }"#, env, &mut up);
            assert!(!res.body.to_string().contains(KEY));
        }
        let config = ProxyConfig::from_lookup(env).unwrap();
        assert!(!format!("{config:?}").contains(KEY));
    }
}
