use std::cell::RefCell;
use std::convert::Infallible;
use std::io::Write;

use anyhow::Context;
use clap::Parser;
use wallet_unlock_core::{
    ApprovalTarget, DispatchSequencer, PendingRequest, QueryParams, RequestKind, SettleSignal,
    UnlockConfig, UnlockPrompt, UrlNavigator, approval_url, parse_pending_request,
};

#[derive(Parser)]
#[command(name = "wallet-unlock")]
#[command(about = "Inspect and build wallet unlock resumption links")]
pub struct WalletUnlockCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Parse an unlock page query and print the pending request as JSON
    Parse {
        /// Query string, with or without the leading `?`
        query: String,
        /// Print the unlock prompt that would be rendered instead
        #[arg(long)]
        prompt: bool,
    },
    /// Build the unlock page query for a pending request
    Encode {
        #[arg(long)]
        kind: RequestKind,
        #[arg(long)]
        origin: String,
        #[arg(long)]
        app_name: Option<String>,
    },
    /// Print the approval page URL a request kind resumes to
    Target { kind: RequestKind },
    /// Dry-run the post-unlock dispatch for an unlock page query
    Resume {
        /// Query string, with or without the leading `?`
        query: String,
    },
}

pub fn run() -> anyhow::Result<()> {
    let cli = WalletUnlockCli::parse();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(cli.command, &mut out)
}

pub fn execute(command: Commands, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Commands::Parse { query, prompt } => {
            let pending = parse_pending_request(&QueryParams::from_search(&query));
            tracing::debug!(found = pending.is_some(), "parsed unlock query");
            let rendered = if prompt {
                let view = UnlockPrompt::new(pending.as_ref(), false, true, None);
                serde_json::to_string_pretty(&view)
            } else {
                serde_json::to_string_pretty(&pending)
            }
            .context("serialize parse output")?;
            writeln!(out, "{rendered}")?;
        }
        Commands::Encode {
            kind,
            origin,
            app_name,
        } => {
            let origin = origin.trim();
            if origin.is_empty() {
                anyhow::bail!("origin must not be empty");
            }
            let request = PendingRequest::new(kind, origin, app_name);
            writeln!(out, "?{}", request.to_query())?;
        }
        Commands::Target { kind } => {
            let config = UnlockConfig::from_env().context("resolve unlock config")?;
            let url = approval_url(&config.approval_page, ApprovalTarget::from(kind));
            writeln!(out, "{url}")?;
        }
        Commands::Resume { query } => {
            let config = UnlockConfig::from_env().context("resolve unlock config")?;
            let rendered = serde_json::to_string_pretty(&dry_run_dispatch(&query, &config)?)
                .context("serialize resume output")?;
            writeln!(out, "{rendered}")?;
        }
    }
    Ok(())
}

/// Runs the sequencer the unlock page would build from `config`, with no
/// wallets and a handler that commits immediately.
fn dry_run_dispatch(query: &str, config: &UnlockConfig) -> anyhow::Result<serde_json::Value> {
    let pending = parse_pending_request(&QueryParams::from_search(query));
    let opened = RefCell::new(None);
    let sequencer = DispatchSequencer::from_config(
        UrlNavigator::new(config.approval_page.as_str(), |url: &str| {
            *opened.borrow_mut() = Some(url.to_string());
        }),
        config,
    );
    let ready = |_wallets: Vec<()>| Ok::<_, Infallible>(SettleSignal::Timed);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("start dispatch runtime")?;
    let started = tokio::time::Instant::now();
    let Ok(report) =
        runtime.block_on(sequencer.on_unlocked(Vec::<()>::new(), pending.as_ref(), &ready));
    let waited = started.elapsed();
    tracing::debug!(?report, waited_ms = waited.as_millis() as u64, "dry-run dispatch finished");

    let settle_delay_ms = sequencer.settle_delay().as_millis() as u64;
    drop(sequencer);
    Ok(serde_json::json!({
        "report": report,
        "settle_delay_ms": settle_delay_ms,
        "waited_ms": waited.as_millis() as u64,
        "opened": opened.into_inner(),
    }))
}
