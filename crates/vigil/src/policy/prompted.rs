use std::sync::Arc;

use async_trait::async_trait;

use super::types::{Decision, DecisionPolicy, PolicyError, PolicyInput};

const CONTRACT_PREVIEW_CHARS: usize = 500;

const DEFAULT_INSTRUCTIONS: &str = "You are a smart contract security analyst. \
Decide which analysis tool to run next, or conclude the analysis when the \
evidence gathered so far is sufficient. Prefer tools covering aspects that \
have not been examined yet.";

/// Text-completion backend used by [`PromptedPolicy`].
///
/// Transport failures map to [`PolicyError::Unavailable`].
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, PolicyError>;
}

/// Policy that asks a language model for the next action using a
/// line-oriented `ACTION` / `TOOL` / `REASONING` protocol.
pub struct PromptedPolicy {
    client: Arc<dyn CompletionClient>,
    instructions: String,
    expected_tools: Vec<String>,
}

impl PromptedPolicy {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            expected_tools: Vec::new(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Declare the tools this policy was written against.
    pub fn with_expected_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn build_prompt(&self, input: &PolicyInput) -> String {
        let tools = input
            .available_tools
            .iter()
            .map(|tool| {
                let used = if input.tools_used.contains(&tool.name) {
                    " (already used)"
                } else {
                    ""
                };
                format!(
                    "- {} [{}]: {}{used}",
                    tool.name, tool.category, tool.description
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let network = input.contract.network().unwrap_or("unspecified network");
        let block = match input.contract.block() {
            Some(block) => format!("block {block}"),
            None => "latest block".to_string(),
        };

        let mut source = input.contract.source_preview(CONTRACT_PREVIEW_CHARS);
        if source.is_empty() {
            source = "(source not available)".to_string();
        }

        format!(
            "{instructions}\n\n\
             CONTRACT: {address} on {network} at {block}\n\
             SOURCE PREVIEW:\n{source}\n\n\
             ITERATION: {iteration} of {max}\n\
             FINDINGS SO FAR: {findings}\n\n\
             EVIDENCE:\n{summary}\n\n\
             AVAILABLE TOOLS:\n{tools}\n\n\
             Respond in exactly this format:\n\
             ACTION: USE_TOOL or COMPLETE\n\
             TOOL: <tool name, only when ACTION is USE_TOOL>\n\
             REASONING: <one or two sentences>",
            instructions = self.instructions,
            address = input.contract.address(),
            iteration = input.iteration,
            max = input.max_iterations,
            findings = input.finding_count,
            summary = input.ledger_summary,
        )
    }
}

#[async_trait]
impl DecisionPolicy for PromptedPolicy {
    fn id(&self) -> &str {
        "prompted"
    }

    async fn decide(&self, input: &PolicyInput) -> Result<Decision, PolicyError> {
        let prompt = self.build_prompt(input);
        tracing::debug!(
            model = self.client.model(),
            prompt_chars = prompt.len(),
            iteration = input.iteration,
            "requesting policy decision"
        );
        let response = self.client.complete(&prompt).await?;
        parse_decision(&response)
    }

    fn expected_tools(&self) -> Vec<String> {
        self.expected_tools.clone()
    }
}

/// Parse an `ACTION` / `TOOL` / `REASONING` response.
///
/// Keys are case-insensitive and may carry markdown emphasis. Tool names are
/// returned as written; validating them is the guard's job.
pub fn parse_decision(response: &str) -> Result<Decision, PolicyError> {
    let mut action = None;
    let mut tool = None;
    let mut reasoning = None;

    for line in response.lines() {
        let line = line.trim().trim_start_matches(['-', '*', '#', ' ']);
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().trim_matches('*').trim().to_ascii_uppercase();
        let value = value.trim().trim_matches('*').trim();
        match key.as_str() {
            "ACTION" if action.is_none() => action = Some(value.to_ascii_uppercase()),
            "TOOL" if tool.is_none() => tool = Some(clean_tool_name(value)),
            "REASONING" if reasoning.is_none() => reasoning = Some(value.to_string()),
            _ => {}
        }
    }

    let rationale = reasoning.unwrap_or_default();
    match action.as_deref() {
        Some("COMPLETE") | Some("STOP") => Ok(Decision::Stop { rationale }),
        Some("USE_TOOL") => match tool {
            Some(name) if !name.is_empty() => Ok(Decision::ChooseTool { name, rationale }),
            _ => Err(PolicyError::MalformedResponse(
                "USE_TOOL without a TOOL line".to_string(),
            )),
        },
        Some(other) => Err(PolicyError::MalformedResponse(format!(
            "unrecognized action '{other}'"
        ))),
        None => Err(PolicyError::MalformedResponse(
            "response has no ACTION line".to_string(),
        )),
    }
}

fn clean_tool_name(raw: &str) -> String {
    raw.trim_matches(|c: char| c == '`' || c == '"' || c == '\'' || c == '<' || c == '>')
        .trim()
        .to_string()
}
