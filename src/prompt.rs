//! Chat request types and instruct-format prompt rendering.
//!
//! A message list is rendered to one string with fixed role markers:
//! begin-of-text, a system block, each message wrapped in a role header and
//! terminator, and an open assistant header left for generation.

use serde::{Deserialize, Serialize};

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of a `/messages` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// System prompt; empty when omitted.
    #[serde(default)]
    pub system: String,
    pub messages: Vec<ChatMessage>,
    /// Generation budget in tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Stream the reply as newline-separated delta chunks.
    #[serde(default)]
    pub stream: bool,
}

fn default_max_tokens() -> usize {
    1024
}

/// Render a chat request in llama3-instruct format.
pub fn render_llama3(req: &ChatRequest) -> String {
    let mut out = String::new();
    out.push_str("<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n\n");
    out.push_str(&req.system);
    out.push_str("<|eot_id|>\n");
    for msg in &req.messages {
        out.push_str("<|start_header_id|>");
        out.push_str(&msg.role);
        out.push_str("<|end_header_id|>\n\n");
        out.push_str(&msg.content);
        out.push_str("<|eot_id|>");
    }
    out.push_str("<|start_header_id|>assistant<|end_header_id|>\n\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(messages: &[(&str, &str)]) -> ChatRequest {
        ChatRequest {
            system: "be brief".into(),
            messages: messages
                .iter()
                .map(|(role, content)| ChatMessage {
                    role: (*role).into(),
                    content: (*content).into(),
                })
                .collect(),
            max_tokens: 16,
            stream: false,
        }
    }

    #[test]
    fn test_render_single_turn() {
        let rendered = render_llama3(&request(&[("user", "hi")]));
        assert_eq!(
            rendered,
            "<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n\n\
             be brief<|eot_id|>\n\
             <|start_header_id|>user<|end_header_id|>\n\nhi<|eot_id|>\
             <|start_header_id|>assistant<|end_header_id|>\n\n"
        );
    }

    #[test]
    fn test_render_multi_turn_keeps_order() {
        let rendered = render_llama3(&request(&[
            ("user", "one"),
            ("assistant", "two"),
            ("user", "three"),
        ]));
        let one = rendered.find("one").unwrap();
        let two = rendered.find("two").unwrap();
        let three = rendered.find("three").unwrap();
        assert!(one < two && two < three);
        assert!(rendered.ends_with("<|start_header_id|>assistant<|end_header_id|>\n\n"));
    }

    #[test]
    fn test_request_defaults() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user","content":"x"}]}"#).unwrap();
        assert_eq!(req.max_tokens, 1024);
        assert_eq!(req.system, "");
        assert!(!req.stream);
    }
}
