use hypersight_core::Ticket;
use serde::{Deserialize, Serialize};

use crate::{AssistantProvider, CompletionRequest, InferError};

pub const INSIGHTS_SYSTEM_PROMPT: &str = "You are a helpful assistant analyzing ticket data. \
Use the following context to provide insights and answer questions accurately. \
Format your responses in clear, concise markdown.

When analyzing data, focus on:
1. Identifying patterns in issues and categories
2. Highlighting common problems and their solutions
3. Providing relevant links when available
4. Explaining department justifications when relevant

Always be concise and factual.";

pub const CHARTS_SYSTEM_PROMPT: &str = "You are a data analysis assistant for support ticket data. \
Answer the user's question and suggest one chart that illustrates the answer.

Respond with a single JSON object and nothing else:
{\"analysis\": \"<short markdown answer>\", \"chart_suggestion\": \"<bar or line chart, with a short reason>\", \"chart_data\": [{\"name\": \"<label>\", \"value\": <number>}]}";

pub const FOLLOW_UP_QUESTIONS: [&str; 3] = [
    "Which common issues affect the most tickets?",
    "Which department is responsible for most tickets, and why?",
    "How are tickets distributed across categories?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantMode {
    /// Free-text markdown grounded in the ticket rows.
    #[default]
    Insights,
    /// A short analysis plus a suggested chart, without row context.
    Charts,
}

impl AssistantMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insights => "insights",
            Self::Charts => "charts",
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            Self::Insights => INSIGHTS_SYSTEM_PROMPT,
            Self::Charts => CHARTS_SYSTEM_PROMPT,
        }
    }

    /// Whether ticket rows are sent along with the question.
    pub fn uses_context(self) -> bool {
        matches!(self, Self::Insights)
    }
}

impl std::str::FromStr for AssistantMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "insights" => Ok(Self::Insights),
            "charts" => Ok(Self::Charts),
            other => Err(format!(
                "invalid assistant mode '{other}', expected one of: insights, charts"
            )),
        }
    }
}

/// The per-ticket fields the assistant may see. Identifiers and timestamps
/// are never sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketContext {
    pub summary: Option<String>,
    pub issue: Option<String>,
    pub common_issue: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub link: Option<String>,
    pub justification: Option<String>,
}

impl From<&Ticket> for TicketContext {
    fn from(ticket: &Ticket) -> Self {
        Self {
            summary: ticket.summary.clone(),
            issue: ticket.issue.clone(),
            common_issue: ticket.common_issue.clone(),
            category: ticket.category.clone(),
            subcategory: ticket.subcategory.clone(),
            link: ticket.link.clone(),
            justification: ticket.responsible_department_justification.clone(),
        }
    }
}

/// Serialize `rows` as the JSON array embedded in the user message.
pub fn context_blob(rows: &[Ticket]) -> Result<String, InferError> {
    let context: Vec<TicketContext> = rows.iter().map(TicketContext::from).collect();
    Ok(serde_json::to_string(&context)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
}

impl ChartKind {
    /// `bar` when the suggestion mentions it anywhere, `line` otherwise.
    pub fn from_suggestion(suggestion: &str) -> Self {
        if suggestion.to_lowercase().contains("bar") {
            Self::Bar
        } else {
            Self::Line
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSuggestion {
    pub kind: ChartKind,
    pub suggestion: String,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistantReply {
    pub text: String,
    pub chart: Option<ChartSuggestion>,
    pub follow_ups: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChartReplyBody {
    analysis: String,
    #[serde(default, alias = "chartSuggestion")]
    chart_suggestion: Option<String>,
    #[serde(default, alias = "chartData")]
    chart_data: Option<Vec<ChartPoint>>,
}

/// Split a charts-mode reply into its analysis text and optional chart.
/// Replies that are not the expected JSON object are kept whole as text.
pub fn parse_chart_reply(raw: &str) -> (String, Option<ChartSuggestion>) {
    let normalized = normalize_candidate_json(raw);
    match serde_json::from_str::<ChartReplyBody>(&normalized) {
        Ok(body) => {
            let chart = body.chart_data.map(|points| {
                let suggestion = body.chart_suggestion.unwrap_or_default();
                ChartSuggestion {
                    kind: ChartKind::from_suggestion(&suggestion),
                    suggestion,
                    points,
                }
            });
            (body.analysis, chart)
        }
        Err(err) => {
            tracing::warn!(error = %err, "chart reply was not structured JSON, keeping raw text");
            (raw.trim().to_owned(), None)
        }
    }
}

/// One question, one completion call.
pub struct AssistantBridge<'a> {
    provider: &'a dyn AssistantProvider,
    mode: AssistantMode,
}

impl<'a> AssistantBridge<'a> {
    pub fn new(provider: &'a dyn AssistantProvider, mode: AssistantMode) -> Self {
        Self { provider, mode }
    }

    pub fn mode(&self) -> AssistantMode {
        self.mode
    }

    pub fn build_request(
        &self,
        question: &str,
        context: Option<&[Ticket]>,
    ) -> Result<CompletionRequest, InferError> {
        let user = match context {
            Some(rows) if self.mode.uses_context() => {
                format!("Context: {}\n\nQuestion: {question}", context_blob(rows)?)
            }
            _ => question.to_owned(),
        };

        Ok(CompletionRequest {
            system: self.mode.system_prompt().to_owned(),
            user,
            json_output: self.mode == AssistantMode::Charts,
        })
    }

    pub async fn ask(
        &self,
        question: &str,
        context: Option<&[Ticket]>,
    ) -> Result<AssistantReply, InferError> {
        let request = self.build_request(question, context)?;
        let raw = self.provider.complete(&request).await?;

        let (text, chart) = match self.mode {
            AssistantMode::Insights => (raw, None),
            AssistantMode::Charts => parse_chart_reply(&raw),
        };

        Ok(AssistantReply {
            text,
            chart,
            follow_ups: FOLLOW_UP_QUESTIONS.iter().map(|q| (*q).to_owned()).collect(),
        })
    }
}

fn normalize_candidate_json(candidate_json: &str) -> String {
    let trimmed = candidate_json.trim();

    if !trimmed.starts_with("```") {
        return trimmed.to_owned();
    }

    let mut lines = trimmed.lines();
    let _fence_line = lines.next();

    let mut body: Vec<&str> = lines.collect();
    if body.last().is_some_and(|line| line.trim() == "```") {
        body.pop();
    }

    body.join("\n").trim().to_owned()
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::{FailingAssistantProvider, MockAssistantProvider};

    fn ticket() -> Ticket {
        Ticket {
            id: Some("17".to_owned()),
            summary: Some("Charger stops at 80%".to_owned()),
            issue: Some("Charging halts early".to_owned()),
            common_issue: Some("Charging".to_owned()),
            category: Some("Batterier".to_owned()),
            link: Some("https://support.example/17".to_owned()),
            responsible_department_justification: Some("Firmware owns charging".to_owned()),
            created_at: Some("2024-12-01T10:00:00Z".to_owned()),
            ..Ticket::default()
        }
    }

    #[test]
    fn only_insights_mode_sends_ticket_context() {
        assert!(AssistantMode::Insights.uses_context());
        assert!(!AssistantMode::Charts.uses_context());
    }

    #[test]
    fn context_blob_omits_ids_and_timestamps() {
        let blob = context_blob(&[ticket()]).expect("blob");
        let parsed: Value = serde_json::from_str(&blob).expect("json");

        let entry = &parsed[0];
        assert_eq!(entry["justification"], "Firmware owns charging");
        assert_eq!(entry["subcategory"], Value::Null);
        assert!(entry.get("id").is_none());
        assert!(entry.get("created_at").is_none());
        assert_eq!(entry.as_object().map(|object| object.len()), Some(7));
    }

    #[test]
    fn insights_request_embeds_context_and_question() {
        let provider = MockAssistantProvider::default();
        let bridge = AssistantBridge::new(&provider, AssistantMode::Insights);
        let rows = [ticket()];

        let request = bridge
            .build_request("What breaks most?", Some(rows.as_slice()))
            .expect("request");

        assert_eq!(request.system, INSIGHTS_SYSTEM_PROMPT);
        assert!(request.user.starts_with("Context: [{\"summary\":\"Charger stops at 80%\""));
        assert!(request.user.ends_with("\n\nQuestion: What breaks most?"));
        assert!(!request.json_output);

        let bare = bridge.build_request("Hi", None).expect("request");
        assert_eq!(bare.user, "Hi");
    }

    #[test]
    fn chart_kind_depends_on_bar_substring() {
        assert_eq!(ChartKind::from_suggestion("A BAR chart fits"), ChartKind::Bar);
        assert_eq!(ChartKind::from_suggestion("Stacked-bar"), ChartKind::Bar);
        assert_eq!(ChartKind::from_suggestion("line chart over time"), ChartKind::Line);
        assert_eq!(ChartKind::from_suggestion(""), ChartKind::Line);
    }

    #[test]
    fn fenced_chart_reply_is_parsed() {
        let raw = "```json\n{\"analysis\":\"Batteries dominate.\",\"chart_suggestion\":\"bar chart\",\"chart_data\":[{\"name\":\"Batterier\",\"value\":3}]}\n```";

        let (text, chart) = parse_chart_reply(raw);

        assert_eq!(text, "Batteries dominate.");
        let chart = chart.expect("chart");
        assert_eq!(chart.kind, ChartKind::Bar);
        assert_eq!(
            chart.points,
            vec![ChartPoint {
                name: "Batterier".to_owned(),
                value: 3.0
            }]
        );
    }

    #[test]
    fn unstructured_chart_reply_becomes_plain_text() {
        let (text, chart) = parse_chart_reply("  Batteries dominate.  ");
        assert_eq!(text, "Batteries dominate.");
        assert!(chart.is_none());

        let (text, chart) = parse_chart_reply("{\"analysis\":\"No data.\"}");
        assert_eq!(text, "No data.");
        assert!(chart.is_none());
    }

    #[tokio::test]
    async fn ask_returns_reply_with_follow_ups() {
        let provider = MockAssistantProvider::with_reply("## Findings\n- Charging");
        let bridge = AssistantBridge::new(&provider, AssistantMode::Insights);

        let rows = [ticket()];
        let reply = bridge
            .ask("Summarize", Some(rows.as_slice()))
            .await
            .expect("reply");

        assert_eq!(reply.text, "## Findings\n- Charging");
        assert!(reply.chart.is_none());
        assert_eq!(reply.follow_ups.len(), FOLLOW_UP_QUESTIONS.len());
    }

    #[tokio::test]
    async fn ask_propagates_provider_failure() {
        let provider = FailingAssistantProvider::new("connection refused");
        let bridge = AssistantBridge::new(&provider, AssistantMode::Charts);

        assert!(bridge.ask("Trends?", None).await.is_err());
    }
}
