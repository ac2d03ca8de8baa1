use hypersight_core::Ticket;
use serde::Serialize;

use crate::bridge::{AssistantBridge, ChartSuggestion};

pub const GREETING_MESSAGE: &str =
    "Hello! I can help you analyze your ticket data. Ask me anything about trends, patterns, or insights!";
pub const APOLOGY_MESSAGE: &str =
    "Sorry, I encountered an error while analyzing the data. Please try again.";
pub const ANALYSIS_FAILED_TITLE: &str = "Analysis Failed";
pub const ANALYSIS_FAILED_DESCRIPTION: &str = "Failed to analyze the data. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSuggestion>,
}

impl ChatMessage {
    fn user(text: &str) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.to_owned(),
            chart: None,
        }
    }

    fn assistant(text: impl Into<String>, chart: Option<ChartSuggestion>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
            chart,
        }
    }
}

/// The one-off notice shown when a question could not be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FailureNotice {
    pub title: &'static str,
    pub description: &'static str,
}

impl Default for FailureNotice {
    fn default() -> Self {
        Self {
            title: ANALYSIS_FAILED_TITLE,
            description: ANALYSIS_FAILED_DESCRIPTION,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Blank input; nothing was sent or recorded.
    Ignored,
    Answered,
    Failed(FailureNotice),
}

/// Chat transcript. Starts with the greeting; each submission appends the
/// user's message and then exactly one assistant message.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::assistant(GREETING_MESSAGE, None)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub async fn submit(
        &mut self,
        bridge: &AssistantBridge<'_>,
        input: &str,
        context: Option<&[Ticket]>,
    ) -> SubmitOutcome {
        if input.trim().is_empty() {
            return SubmitOutcome::Ignored;
        }

        self.messages.push(ChatMessage::user(input));

        match bridge.ask(input, context).await {
            Ok(reply) => {
                self.messages
                    .push(ChatMessage::assistant(reply.text, reply.chart));
                SubmitOutcome::Answered
            }
            Err(err) => {
                tracing::error!(error = %err, mode = bridge.mode().as_str(), "assistant request failed");
                self.messages
                    .push(ChatMessage::assistant(APOLOGY_MESSAGE, None));
                SubmitOutcome::Failed(FailureNotice::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{AssistantMode, ChartKind};
    use crate::{FailingAssistantProvider, MockAssistantProvider};

    #[test]
    fn starts_with_greeting() {
        let conversation = Conversation::new();

        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].speaker, Speaker::Assistant);
        assert_eq!(conversation.messages()[0].text, GREETING_MESSAGE);
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let provider = MockAssistantProvider::default();
        let bridge = AssistantBridge::new(&provider, AssistantMode::Insights);
        let mut conversation = Conversation::new();

        let outcome = conversation.submit(&bridge, "   ", None).await;

        assert_eq!(outcome, SubmitOutcome::Ignored);
        assert_eq!(conversation.messages().len(), 1);
    }

    #[tokio::test]
    async fn answer_is_appended_after_user_message() {
        let provider = MockAssistantProvider::with_reply(
            r#"{"analysis":"Mostly batteries.","chart_suggestion":"Bar chart","chart_data":[{"name":"Batterier","value":3}]}"#,
        );
        let bridge = AssistantBridge::new(&provider, AssistantMode::Charts);
        let mut conversation = Conversation::new();

        let outcome = conversation.submit(&bridge, "What dominates?", None).await;

        assert_eq!(outcome, SubmitOutcome::Answered);
        let messages = conversation.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].speaker, Speaker::User);
        assert_eq!(messages[1].text, "What dominates?");
        assert_eq!(messages[2].text, "Mostly batteries.");
        assert_eq!(
            messages[2].chart.as_ref().map(|chart| chart.kind),
            Some(ChartKind::Bar)
        );
    }

    #[tokio::test]
    async fn failure_appends_apology_and_returns_notice_once() {
        let provider = FailingAssistantProvider::new("503 Service Unavailable");
        let bridge = AssistantBridge::new(&provider, AssistantMode::Insights);
        let mut conversation = Conversation::new();

        let outcome = conversation.submit(&bridge, "Why?", None).await;

        match outcome {
            SubmitOutcome::Failed(notice) => {
                assert_eq!(notice.title, "Analysis Failed");
                assert_eq!(notice.description, "Failed to analyze the data. Please try again.");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(conversation.messages().len(), 3);
        assert_eq!(
            conversation.last().map(|message| message.text.as_str()),
            Some(APOLOGY_MESSAGE)
        );
    }
}
