//! Sends one message to an LLM council and prints its progress live.
//!
//! Progress goes to stderr; the final answer (or the JSON state with
//! `--json`) goes to stdout.

mod config;
mod render;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use council_stream::{
    ClientConfig, CouncilClient, SendMessageRequest, SessionConfig, SessionReport, StageObserver,
    StageStatus, StreamEvent, StreamSession, chunks_from, init_observability, send_message,
};
use tracing::warn;

use crate::render::ProgressPrinter;

#[derive(Parser, Debug)]
#[command(name = "council")]
#[command(about = "Ask an LLM council a question and follow the three stages as they stream in")]
struct Args {
    /// Council backend base URL
    #[arg(long, env = "COUNCIL_API_URL")]
    api_url: Option<String>,

    /// Conversation the message belongs to
    #[arg(long, env = "COUNCIL_CONVERSATION_ID", required_unless_present = "replay")]
    conversation: Option<String>,

    /// Council member model; repeat to override the server's council
    #[arg(long = "council-model")]
    council_models: Vec<String>,

    /// Chairman model override
    #[arg(long)]
    chairman: Option<String>,

    /// Print the final stage state as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Replay a captured event stream from a file instead of calling the backend
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Message to send
    #[arg(required_unless_present = "replay")]
    message: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    config::init();
    let args = Args::parse();
    init_observability();

    let session = StreamSession::new(SessionConfig::named("council-cli"));
    let abort = session.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });

    let report = match &args.replay {
        Some(path) => replay(&session, path, &args).await?,
        None => live(&session, &args).await?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.state)?);
    } else {
        print!("{}", render::summary(&report.state));
    }

    Ok(match report.state.status() {
        StageStatus::Completed => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

async fn replay(
    session: &StreamSession,
    path: &Path,
    args: &Args,
) -> Result<SessionReport, Box<dyn std::error::Error>> {
    let captured = tokio::fs::read(path).await?;
    let mut observer = observer_for(args, args.council_models.clone());
    Ok(session
        .drive(chunks_from([captured]), observer.as_mut())
        .await?)
}

async fn live(
    session: &StreamSession,
    args: &Args,
) -> Result<SessionReport, Box<dyn std::error::Error>> {
    let mut client_config = ClientConfig::from_env()?;
    if let Some(url) = &args.api_url {
        client_config = client_config.base_url(url.as_str());
    }
    let client = CouncilClient::new(client_config)?;

    let mut council = args.council_models.clone();
    if council.is_empty() && !args.json {
        match client.fetch_defaults().await {
            Ok(defaults) => {
                eprintln!(
                    "council: {} (chairman: {})",
                    defaults.council_models.join(", "),
                    args.chairman.as_deref().unwrap_or(&defaults.chairman_model)
                );
                council = defaults.council_models;
            }
            Err(err) => warn!(error = %err, "could not fetch council defaults"),
        }
    }

    let mut request = SendMessageRequest::new(args.message.clone().unwrap_or_default())
        .council_models(args.council_models.iter().cloned());
    if let Some(chairman) = &args.chairman {
        request = request.chairman_model(chairman.as_str());
    }

    let conversation = args.conversation.as_deref().unwrap_or_default();
    let mut observer = observer_for(args, council);
    Ok(send_message(&client, session, conversation, &request, observer.as_mut()).await?)
}

fn observer_for(args: &Args, council: Vec<String>) -> Box<dyn StageObserver> {
    if args.json {
        Box::new(|_: &StreamEvent, _: &council_stream::StageState| {})
    } else {
        Box::new(ProgressPrinter::new(std::io::stderr(), council))
    }
}
