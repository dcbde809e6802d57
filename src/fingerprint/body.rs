//! Request body augmentation.
//!
//! Fields the known client always sends are injected when the caller left
//! them out: the adaptive-thinking capability flag (gated by model family),
//! a synthetic per-request user/session identifier, an output-size default,
//! and the client-identity system preamble the upstream validates against.
//! Caller-supplied values are never clobbered.

use rand::Rng;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

/// Inbound request body was not a JSON object.
#[derive(Debug, Error)]
#[error("request body must be a JSON object")]
pub struct ValidationError;

/// Identity sentence the upstream's fingerprint check looks for.
const IDENTITY_PREAMBLE: &str = "You are Claude Code, Anthropic's official CLI for Claude.";

/// Output-size defaults with and without the thinking capability.
const MAX_TOKENS_THINKING: u64 = 16000;
const MAX_TOKENS_DEFAULT: u64 = 8192;

/// Whether a model accepts the adaptive `thinking` field.
///
/// Haiku-family and 3.5-family models reject it; matching is case-sensitive
/// substring comparison against the model identifier.
pub fn supports_adaptive_thinking(model: &str) -> bool {
    if model.contains("haiku") {
        return false;
    }
    if model.contains("claude-3-5-") {
        return false;
    }
    true
}

/// Fill in the defaulted body fields in place. Fails only when the body is
/// not a JSON object.
pub fn augment_request(body: &mut Value) -> Result<(), ValidationError> {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let thinking_capable = supports_adaptive_thinking(&model);

    let object = body.as_object_mut().ok_or(ValidationError)?;

    if !object.contains_key("thinking") && thinking_capable {
        object.insert("thinking".into(), json!({ "type": "adaptive" }));
    }

    if !object.contains_key("metadata") {
        object.insert(
            "metadata".into(),
            json!({ "user_id": synthetic_user_id() }),
        );
    }

    if !object.contains_key("max_tokens") {
        let limit = if thinking_capable {
            MAX_TOKENS_THINKING
        } else {
            MAX_TOKENS_DEFAULT
        };
        object.insert("max_tokens".into(), json!(limit));
    }

    if !object.contains_key("system") {
        object.insert("system".into(), identity_system_blocks());
    }

    Ok(())
}

/// `user_<64 hex>_account__session_<uuid4>`, fresh per request.
fn synthetic_user_id() -> String {
    format!(
        "user_{}_account__session_{}",
        random_hex(64),
        Uuid::new_v4()
    )
}

fn random_hex(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| format!("{:x}", rng.gen_range(0u8..16)))
        .collect()
}

/// The two-block system preamble the known client sends, with ephemeral
/// cache-control markers.
fn identity_system_blocks() -> Value {
    let environment = format!(
        "You are an interactive CLI tool that helps users with software \
         engineering tasks. Use the instructions below and the tools \
         available to you to assist the user.\n\n\
         # Tone and style\n\
         - Only use emojis if the user explicitly requests it.\n\
         - Your output will be displayed on a command line interface. Your \
         responses should be short and concise.\n\n\
         # Doing tasks\n\
         The user will primarily request you perform software engineering \
         tasks.\n\n\
         Here is useful information about the environment you are running \
         in:\n<env>\nPlatform: {}\nShell: bash\n</env>",
        std::env::consts::OS
    );

    json!([
        {
            "type": "text",
            "text": IDENTITY_PREAMBLE,
            "cache_control": { "type": "ephemeral" }
        },
        {
            "type": "text",
            "text": environment,
            "cache_control": { "type": "ephemeral" }
        }
    ])
}
