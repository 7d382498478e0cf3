//! Prompt templates for MoE intent voting

use crate::config::ParticipantConfig;
use crate::core::string::{single_line, truncate};
use crate::voting::round::VotingRound;
use crate::voting::vote::Vote;

const MAX_REASONING_LEN: usize = 200;

/// Templates for the voting prompts
pub struct VotingPromptTemplate;

impl VotingPromptTemplate {
    /// System prompt for a voter
    pub fn system(role: &str) -> String {
        format!(
            r#"You act as the {} of a voice assistant.
You classify a transcribed user utterance into exactly one intent, extract its entities and propose the subtasks needed to fulfil it.
Answer only with a JSON object. Do not add explanations outside the JSON."#,
            role
        )
    }

    /// Default user prompt; placeholders are filled by [`PromptBuilder`]
    pub fn default_template() -> &'static str {
        r#"Role: {llm_role}

User message: "{user_message}"

Conversation context:
{conversation_context}

Conversation history: {conversation_history}

Available actions: {available_actions}
{prior_votes}
Respond with a JSON object:
{
  "intent": "<one of the available actions>",
  "confidence": <number between 0.0 and 1.0>,
  "entities": {"<name>": "<value>"},
  "subtasks": [{"action": "<action>", "priority": "high|medium|low"}],
  "reasoning": "<one or two sentences>"
}"#
    }

    /// Section describing the previous round for a debate round
    pub fn prior_votes_section(own: Option<&Vote>, others: &[&Vote]) -> String {
        let mut section = String::from("\nPrevious round votes from other participants:\n");
        if others.is_empty() {
            section.push_str("- (none)\n");
        }
        for vote in others {
            section.push_str(&format!(
                "- {}: {} (confidence {:.2}) {}\n",
                vote.llm_name,
                vote.intent,
                vote.confidence,
                truncate(&single_line(&vote.reasoning), MAX_REASONING_LEN)
            ));
        }
        if let Some(own) = own {
            section.push_str(&format!(
                "Your previous position: {} (confidence {:.2})\n",
                own.intent, own.confidence
            ));
        }
        section.push_str(
            "Reconsider your classification in light of these votes. Keep it if you still think it is right.\n",
        );
        section
    }
}

/// Builds the user prompt for one participant in one round
///
/// Deterministic: context renders in key order, prior votes in
/// participant registration order.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    available_actions: Vec<String>,
}

impl PromptBuilder {
    pub fn new(available_actions: Vec<String>) -> Self {
        Self { available_actions }
    }

    pub fn build(&self, participant: &ParticipantConfig, round: &VotingRound) -> String {
        let template = participant
            .prompt_template
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(VotingPromptTemplate::default_template());

        let prior = self.render_prior_votes(participant, round);
        let has_prior_placeholder = template.contains("{prior_votes}");

        let mut prompt = fill_placeholders(template, |name| match name {
            "user_message" => Some(round.user_message.clone()),
            "conversation_context" => Some(render_context(round)),
            "conversation_history" => Some(render_history(round)),
            "available_actions" => Some(self.render_actions()),
            "llm_role" => Some(participant.role.clone()),
            "prior_votes" => Some(prior.clone()),
            _ => None,
        });

        if !has_prior_placeholder && !prior.is_empty() {
            prompt.push('\n');
            prompt.push_str(&prior);
        }
        prompt
    }

    fn render_actions(&self) -> String {
        if self.available_actions.is_empty() {
            "(any)".to_string()
        } else {
            self.available_actions.join(", ")
        }
    }

    fn render_prior_votes(&self, participant: &ParticipantConfig, round: &VotingRound) -> String {
        if round.prior_votes.is_empty() {
            return String::new();
        }
        let others: Vec<&Vote> = round
            .prior_votes
            .iter()
            .filter(|v| v.llm_id != participant.id && v.is_valid())
            .collect();
        VotingPromptTemplate::prior_votes_section(round.prior_vote_of(&participant.id), &others)
    }
}

/// Substitute `{name}` tokens in one left-to-right pass.
///
/// Inserted values are copied verbatim and never rescanned; unknown names
/// and braces that do not enclose a name (e.g. JSON examples) stay as-is.
fn fill_placeholders(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let token = after
            .find('}')
            .map(|close| &after[..close])
            .filter(|name| is_placeholder_name(name));

        match token {
            Some(name) => {
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn render_context(round: &VotingRound) -> String {
    if round.conversation_context.is_empty() {
        return "(no context)".to_string();
    }
    round
        .conversation_context
        .iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => format!("- {}: {}", key, s),
            other => format!("- {}: {}", key, other),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_history(round: &VotingRound) -> String {
    if round.conversation_history.is_empty() {
        "(no history)".to_string()
    } else {
        round.conversation_history.join(" | ")
    }
}
