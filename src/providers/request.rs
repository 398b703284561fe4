//! Request planning for the generation API.
//!
//! Everything here is pure: given a prompt, a history and an endpoint, the
//! functions decide which HTTP method, URL and body a turn turns into. The
//! client in `client.rs` only executes the resulting [`RequestPlan`].

use serde_json::{json, Value};
use url::Url;

use super::catalog::{is_audio_model, DEFAULT_IMAGE_MODEL_ID, DEFAULT_TEXT_MODEL_ID};
use super::types::{ApiError, HistoryTurn, TextRequest};
use crate::config::{DEFAULT_IMAGE_ENDPOINT, DEFAULT_MAX_TOKENS, DEFAULT_TEXT_ENDPOINT, IMAGE_SIZE};
use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Text,
    Image,
}

/// Ordered intent rules. The first keyword found in the lowercased prompt wins;
/// a prompt matching none of them is a text request.
///
/// This is a plain substring test, so "imagine" is an image request and
/// "paint me a cat" is not.
pub const INTENT_POLICY: &[(&str, Intent)] = &[
    ("image", Intent::Image),
    ("generate", Intent::Image),
    ("draw", Intent::Image),
    ("create picture", Intent::Image),
];

pub fn classify_intent(prompt: &str) -> Intent {
    let lowered = prompt.to_lowercase();
    INTENT_POLICY
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, intent)| *intent)
        .unwrap_or(Intent::Text)
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestPlan {
    Get { url: Url },
    Post { url: Url, body: Value },
}

impl RequestPlan {
    pub fn url(&self) -> &Url {
        match self {
            RequestPlan::Get { url } | RequestPlan::Post { url, .. } => url,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            RequestPlan::Get { .. } => "GET",
            RequestPlan::Post { .. } => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlan {
    pub request: RequestPlan,
    /// The endpoint belongs to the trusted image host.
    pub trusted: bool,
}

/// Build the ordered history: optional system prompt, then the non-empty
/// caller turns (trimmed), then the bare prompt if nothing else remained.
pub fn build_history(
    system_prompt: Option<&str>,
    messages: &[HistoryTurn],
    prompt: Option<&str>,
) -> Result<Vec<HistoryTurn>, ApiError> {
    let mut history = Vec::new();

    if let Some(system) = system_prompt.map(str::trim).filter(|s| !s.is_empty()) {
        history.push(HistoryTurn::new(Role::System, system));
    }

    history.extend(
        messages
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .map(|m| HistoryTurn::new(m.role, m.content.trim())),
    );

    if history.is_empty() {
        if let Some(prompt) = prompt.map(str::trim).filter(|p| !p.is_empty()) {
            history.push(HistoryTurn::new(Role::User, prompt));
        }
    }

    if history.is_empty() {
        return Err(ApiError::InvalidRequest("Prompt is required".to_string()));
    }

    Ok(history)
}

/// Flatten a history into `Role: content` blocks separated by blank lines.
pub fn serialize_history(history: &[HistoryTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn plan_text_request(request: &TextRequest) -> Result<RequestPlan, ApiError> {
    let history = build_history(
        request.system_prompt.as_deref(),
        &request.messages,
        request.prompt.as_deref(),
    )?;

    let final_prompt = request
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .or_else(|| {
            history
                .iter()
                .rev()
                .find(|t| t.role == Role::User)
                .map(|t| t.content.as_str())
        })
        .unwrap_or_default()
        .to_string();

    let endpoint = resolve_endpoint(request.endpoint.as_deref(), DEFAULT_TEXT_ENDPOINT);
    let model = request
        .model
        .as_deref()
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_TEXT_MODEL_ID);

    let serialized = {
        let s = serialize_history(&history);
        if s.is_empty() {
            final_prompt
        } else {
            s
        }
    };
    let encoded = urlencoding::encode(&serialized);

    if is_template_endpoint(&endpoint) {
        let substituted = replace_ignore_ascii_case(&endpoint, "{prompt}", &encoded);
        let substituted = replace_ignore_ascii_case(&substituted, "%7bprompt%7d", &encoded);
        let mut url = Url::parse(&substituted)?;
        attach_text_model(&mut url, model);
        return Ok(RequestPlan::Get { url });
    }

    let url = Url::parse(&endpoint)?;
    let openai_compatible = url.path().contains("/openai");
    let use_post = openai_compatible || (!is_audio_model(model) && history.len() > 1);

    if !use_post {
        let base = endpoint.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/{}", base, encoded))?;
        attach_text_model(&mut url, model);
        return Ok(RequestPlan::Get { url });
    }

    let body = json!({
        "model": model,
        "messages": history
            .iter()
            .map(|t| json!({ "role": t.role.as_str(), "content": t.content }))
            .collect::<Vec<_>>(),
        "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
    });

    Ok(RequestPlan::Post { url, body })
}

pub fn plan_image_request(
    prompt: &str,
    model: Option<&str>,
    endpoint: Option<&str>,
    trusted_host: &str,
) -> Result<ImagePlan, ApiError> {
    if prompt.trim().is_empty() {
        return Err(ApiError::InvalidRequest("Prompt is required".to_string()));
    }

    let endpoint = resolve_endpoint(endpoint, DEFAULT_IMAGE_ENDPOINT);
    let model = model.filter(|m| !m.is_empty());

    if !is_trusted_host(&endpoint, trusted_host) {
        let url = Url::parse(&endpoint)?;
        let body = json!({
            "model": model.unwrap_or(DEFAULT_IMAGE_MODEL_ID),
            "prompt": prompt,
            "width": IMAGE_SIZE,
            "height": IMAGE_SIZE,
        });
        return Ok(ImagePlan {
            request: RequestPlan::Post { url, body },
            trusted: false,
        });
    }

    let encoded = urlencoding::encode(prompt);
    let has_placeholder =
        endpoint.to_ascii_lowercase().contains("{prompt}") || endpoint.contains("%s");
    let raw = if has_placeholder {
        replace_ignore_ascii_case(&endpoint, "{prompt}", &encoded).replace("%s", &encoded)
    } else {
        format!("{}/{}", endpoint.trim_end_matches('/'), encoded)
    };

    let mut url = Url::parse(&raw)?;
    if let Some(model) = model {
        if !has_query_param(&url, "model") {
            url.query_pairs_mut().append_pair("model", model);
        }
    }

    Ok(ImagePlan {
        request: RequestPlan::Get { url },
        trusted: true,
    })
}

/// Trim the endpoint, fall back to `default`, and add `https://` when no
/// scheme was given.
pub fn resolve_endpoint(endpoint: Option<&str>, default: &str) -> String {
    let endpoint = endpoint
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(default);
    if endpoint.starts_with("http") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    }
}

pub fn is_template_endpoint(endpoint: &str) -> bool {
    let lowered = endpoint.to_ascii_lowercase();
    lowered.contains("{prompt}") || lowered.contains("%7bprompt%7d")
}

/// Exact host match or a subdomain of it.
pub fn is_trusted_host(endpoint: &str, trusted_host: &str) -> bool {
    Url::parse(endpoint)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
        .map(|host| host == trusted_host || host.ends_with(&format!(".{}", trusted_host)))
        .unwrap_or(false)
}

fn attach_text_model(url: &mut Url, model: &str) {
    if model != DEFAULT_TEXT_MODEL_ID && !has_query_param(url, "model") {
        url.query_pairs_mut().append_pair("model", model);
    }
}

fn has_query_param(url: &Url, name: &str) -> bool {
    url.query_pairs().any(|(key, _)| key == name)
}

/// `needle` must be lowercase ASCII.
fn replace_ignore_ascii_case(haystack: &str, needle: &str, with: &str) -> String {
    let lowered = haystack.to_ascii_lowercase();
    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    for (idx, _) in lowered.match_indices(needle) {
        out.push_str(&haystack[last..idx]);
        out.push_str(with);
        last = idx + needle.len();
    }
    out.push_str(&haystack[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: Role, content: &str) -> HistoryTurn {
        HistoryTurn::new(role, content)
    }

    fn text_request(endpoint: &str, model: &str, messages: Vec<HistoryTurn>) -> TextRequest {
        TextRequest {
            prompt: None,
            model: Some(model.to_string()),
            endpoint: Some(endpoint.to_string()),
            messages,
            ..Default::default()
        }
    }

    #[test]
    fn test_classify_intent() {
        assert_eq!(classify_intent("please draw a cat"), Intent::Image);
        assert_eq!(classify_intent("Generate a logo"), Intent::Image);
        assert_eq!(classify_intent("can you create picture of a dog"), Intent::Image);
        assert_eq!(classify_intent("tell me a joke"), Intent::Text);
    }

    #[test]
    fn test_build_history_drops_blank_turns_and_trims() {
        let history = build_history(
            Some("  be brief "),
            &[turn(Role::User, "  hi  "), turn(Role::Assistant, "   ")],
            None,
        )
        .unwrap();
        assert_eq!(
            history,
            vec![turn(Role::System, "be brief"), turn(Role::User, "hi")]
        );
    }

    #[test]
    fn test_build_history_seeds_from_prompt() {
        let history = build_history(None, &[], Some(" hello ")).unwrap();
        assert_eq!(history, vec![turn(Role::User, "hello")]);
    }

    #[test]
    fn test_build_history_empty_is_invalid() {
        let err = build_history(None, &[turn(Role::User, " ")], Some("")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn test_serialize_history() {
        let s = serialize_history(&[
            turn(Role::System, "rules"),
            turn(Role::User, "hi"),
            turn(Role::Assistant, "hello"),
        ]);
        assert_eq!(s, "System: rules\n\nUser: hi\n\nAssistant: hello");
    }

    #[test]
    fn test_template_endpoint_substitutes_serialized_history() {
        let req = text_request("https://x.com/gen/{prompt}", "openai", vec![turn(Role::User, "hi")]);
        let plan = plan_text_request(&req).unwrap();
        assert_eq!(plan.method(), "GET");
        assert_eq!(plan.url().as_str(), "https://x.com/gen/User%3A%20hi");
    }

    #[test]
    fn test_template_endpoint_matches_encoded_placeholder_any_case() {
        let req = text_request("https://x.com/gen/%7BPROMPT%7D", "mistral", vec![turn(Role::User, "hi")]);
        let plan = plan_text_request(&req).unwrap();
        assert_eq!(plan.url().as_str(), "https://x.com/gen/User%3A%20hi?model=mistral");
    }

    #[test]
    fn test_template_endpoint_keeps_existing_model_param() {
        let req = text_request(
            "https://x.com/gen/{prompt}?model=llama",
            "mistral",
            vec![turn(Role::User, "hi")],
        );
        let plan = plan_text_request(&req).unwrap();
        assert_eq!(plan.url().query(), Some("model=llama"));
    }

    #[test]
    fn test_single_turn_plain_endpoint_uses_get_with_path_segment() {
        let req = text_request("https://text.example.com/", "openai", vec![turn(Role::User, "hi there")]);
        let plan = plan_text_request(&req).unwrap();
        assert_eq!(plan.method(), "GET");
        assert_eq!(plan.url().as_str(), "https://text.example.com/User%3A%20hi%20there");
    }

    #[test]
    fn test_default_model_is_not_added_as_query_param() {
        let req = text_request("text.pollinations.ai", "openai", vec![turn(Role::User, "hi")]);
        let plan = plan_text_request(&req).unwrap();
        assert_eq!(plan.url().query(), None);

        let req = text_request("text.pollinations.ai", "mistral", vec![turn(Role::User, "hi")]);
        let plan = plan_text_request(&req).unwrap();
        assert_eq!(plan.url().query(), Some("model=mistral"));
    }

    #[test]
    fn test_openai_path_always_posts() {
        let req = text_request(DEFAULT_TEXT_ENDPOINT, "openai", vec![turn(Role::User, "hi")]);
        match plan_text_request(&req).unwrap() {
            RequestPlan::Post { url, body } => {
                assert_eq!(url.as_str(), DEFAULT_TEXT_ENDPOINT);
                assert_eq!(url.query(), None);
                assert_eq!(body["model"], "openai");
                assert_eq!(body["max_tokens"], 1000);
                assert_eq!(body["messages"][0]["role"], "user");
                assert_eq!(body["messages"][0]["content"], "hi");
            }
            other => panic!("Expected POST, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_turn_posts_unless_audio_model() {
        let history = vec![turn(Role::User, "hi"), turn(Role::Assistant, "hello")];

        let req = text_request("https://text.example.com", "mistral", history.clone());
        assert_eq!(plan_text_request(&req).unwrap().method(), "POST");

        let req = text_request("https://text.example.com", "openai-audio", history);
        let plan = plan_text_request(&req).unwrap();
        assert_eq!(plan.method(), "GET");
        assert_eq!(plan.url().query(), Some("model=openai-audio"));
    }

    #[test]
    fn test_missing_endpoint_uses_default() {
        let req = TextRequest {
            prompt: Some("hi".to_string()),
            ..Default::default()
        };
        let plan = plan_text_request(&req).unwrap();
        assert_eq!(plan.url().as_str(), DEFAULT_TEXT_ENDPOINT);
    }

    #[test]
    fn test_image_plan_trusted_host_appends_prompt() {
        let plan =
            plan_image_request("a red fox", Some("turbo"), Some("https://image.pollinations.ai/prompt/"), "pollinations.ai")
                .unwrap();
        assert!(plan.trusted);
        assert_eq!(
            plan.request.url().as_str(),
            "https://image.pollinations.ai/prompt/a%20red%20fox?model=turbo"
        );
    }

    #[test]
    fn test_image_plan_trusted_host_placeholders() {
        let plan = plan_image_request(
            "fox",
            None,
            Some("https://image.pollinations.ai/p/%s?seed=1"),
            "pollinations.ai",
        )
        .unwrap();
        assert_eq!(plan.request.url().as_str(), "https://image.pollinations.ai/p/fox?seed=1");

        let plan = plan_image_request(
            "fox",
            None,
            Some("https://image.pollinations.ai/p/{PROMPT}"),
            "pollinations.ai",
        )
        .unwrap();
        assert_eq!(plan.request.url().as_str(), "https://image.pollinations.ai/p/fox");
    }

    #[test]
    fn test_image_plan_untrusted_host_posts_json() {
        let plan = plan_image_request("fox", None, Some("https://img.example.com/v1/generate"), "pollinations.ai")
            .unwrap();
        assert!(!plan.trusted);
        match plan.request {
            RequestPlan::Post { body, .. } => {
                assert_eq!(body["model"], "flux");
                assert_eq!(body["prompt"], "fox");
                assert_eq!(body["width"], 1024);
                assert_eq!(body["height"], 1024);
            }
            other => panic!("Expected POST, got {:?}", other),
        }
    }

    #[test]
    fn test_image_plan_rejects_empty_prompt() {
        let err = plan_image_request("   ", None, None, "pollinations.ai").unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn test_trusted_host_requires_domain_boundary() {
        assert!(is_trusted_host("https://image.pollinations.ai/prompt", "pollinations.ai"));
        assert!(is_trusted_host("https://pollinations.ai", "pollinations.ai"));
        assert!(!is_trusted_host("https://evilpollinations.ai", "pollinations.ai"));
        assert!(!is_trusted_host("not a url", "pollinations.ai"));
    }
}
