use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};
use hypersight_core::Ticket;
use hypersight_infer::{
    AssistantBridge, AssistantProvider, AssistantReply, ChartSuggestion, Conversation, Speaker,
    SubmitOutcome,
};

use crate::cli::AskArgs;

const PROMPT: &str = "you> ";
const EXIT_COMMANDS: [&str; 2] = ["exit", "quit"];

pub async fn run_ask(
    provider: &dyn AssistantProvider,
    args: &AskArgs,
    context: Option<&[Ticket]>,
    out: &mut dyn Write,
) -> Result<()> {
    let question = args.question.trim();
    if question.is_empty() {
        bail!("question must not be empty");
    }

    let bridge = AssistantBridge::new(provider, args.mode);
    let reply = bridge
        .ask(question, context)
        .await
        .context("Analysis Failed: Failed to analyze the data. Please try again.")?;
    write_reply(&reply, out).context("failed to write assistant reply")
}

pub fn write_reply(reply: &AssistantReply, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "{}", reply.text.trim_end())?;
    if let Some(chart) = &reply.chart {
        writeln!(out)?;
        write_chart(chart, out)?;
    }
    if !reply.follow_ups.is_empty() {
        writeln!(out)?;
        writeln!(out, "You might also ask:")?;
        for follow_up in &reply.follow_ups {
            writeln!(out, "  - {follow_up}")?;
        }
    }
    Ok(())
}

pub fn write_chart(chart: &ChartSuggestion, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Suggested {} chart: {}", chart.kind.as_str(), chart.suggestion)?;
    for point in &chart.points {
        writeln!(out, "  {}: {}", point.name, point.value)?;
    }
    Ok(())
}

/// Read questions line by line until EOF or `exit`, printing each answer.
pub async fn run_chat(
    bridge: &AssistantBridge<'_>,
    context: Option<&[Ticket]>,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<Conversation> {
    let mut conversation = Conversation::new();
    if let Some(greeting) = conversation.last() {
        writeln!(out, "{}", greeting.text)?;
    }

    let mut line = String::new();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line).context("failed to read chat input")? == 0 {
            writeln!(out)?;
            break;
        }
        let text = line.trim_end_matches(['\n', '\r']);
        if EXIT_COMMANDS.contains(&text.trim()) {
            break;
        }

        match conversation.submit(bridge, text, context).await {
            SubmitOutcome::Ignored => continue,
            SubmitOutcome::Answered => {}
            SubmitOutcome::Failed(notice) => {
                writeln!(err, "{}: {}", notice.title, notice.description)?;
            }
        }

        if let Some(message) = conversation.last()
            && message.speaker == Speaker::Assistant
        {
            writeln!(out, "{}", message.text.trim_end())?;
            if let Some(chart) = &message.chart {
                write_chart(chart, out)?;
            }
        }
    }

    Ok(conversation)
}
