pub mod charts;
pub mod chat;
pub mod cli;
pub mod dashboard;
pub mod logging;
pub mod server;
pub mod session;

use std::io::Write;

use anyhow::{Context, Result};
use hypersight_core::Ticket;
use hypersight_infer::{AssistantBridge, AssistantMode};
use hypersight_store::fetch_context_rows;

use crate::charts::{run_categories, run_distribution};
use crate::chat::{run_ask, run_chat};
use crate::cli::{Cli, Commands};
use crate::dashboard::{run_options, run_table};
use crate::server::{ServerState, serve};
use crate::session::{Session, block_on, load_ticket_rows};

pub fn run(cli: Cli) -> Result<()> {
    let session = Session::open(&cli)?;
    block_on(dispatch(&session, cli.command))?
}

async fn dispatch(session: &Session, command: Commands) -> Result<()> {
    let row_limit = session.config.store.row_limit;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Table(args) => {
            let store = session.row_store()?.store;
            let rows = load_ticket_rows(store.as_ref(), row_limit).await?;
            run_table(&rows, &args, &mut out)
        }
        Commands::Options(args) => {
            let store = session.row_store()?.store;
            let rows = load_ticket_rows(store.as_ref(), row_limit).await?;
            run_options(&rows, &args, &mut out)
        }
        Commands::Categories(args) => {
            let store = session.row_store()?.store;
            let limit = args
                .limit
                .unwrap_or(session.config.dashboard.top_categories_limit);
            run_categories(
                store.as_ref(),
                row_limit,
                limit,
                args.select.as_deref(),
                args.output,
                &mut out,
            )
            .await
        }
        Commands::Distribution(args) => {
            let store = session.row_store()?.store;
            run_distribution(store.as_ref(), args.output, &mut out).await
        }
        Commands::Ask(args) => {
            let assistant = session.assistant()?;
            log_assistant(&assistant.provider_name, &assistant.model_name);
            let context = load_context(session, args.mode, args.no_context).await?;
            run_ask(
                assistant.provider.as_ref(),
                &args,
                context.as_deref(),
                &mut out,
            )
            .await
        }
        Commands::Chat(args) => {
            let assistant = session.assistant()?;
            log_assistant(&assistant.provider_name, &assistant.model_name);
            let context = load_context(session, args.mode, args.no_context).await?;
            let bridge = AssistantBridge::new(assistant.provider.as_ref(), args.mode);

            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut err = std::io::stderr();
            run_chat(&bridge, context.as_deref(), &mut input, &mut out, &mut err).await?;
            out.flush().context("failed to flush chat output")
        }
        Commands::Serve(args) => {
            let assistant = session.assistant()?;
            log_assistant(&assistant.provider_name, &assistant.model_name);
            let store = session.row_store()?.store;
            drop(out);
            serve(
                &args.bind,
                ServerState {
                    store,
                    provider: assistant.provider,
                },
            )
            .await
        }
    }
}

/// Context rows for modes that send them. The store is opened only here, so
/// context-free questions work without a configured store.
async fn load_context(
    session: &Session,
    mode: AssistantMode,
    no_context: bool,
) -> Result<Option<Vec<Ticket>>> {
    if no_context || !mode.uses_context() {
        return Ok(None);
    }
    let store = session.row_store()?.store;
    let rows = fetch_context_rows(store.as_ref())
        .await
        .context("failed to load ticket context")?;
    Ok(Some(rows))
}

fn log_assistant(provider: &str, model: &str) {
    tracing::info!(provider, model, "assistant provider loaded");
}
