use anyhow::Context as _;
use clap::Parser;
use lambdahttp::{config::Config, Adapter, InvocationContext, ProxyEvent, Request, ResponseWriter};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Local invocation harness: feeds one proxy event through the adapter with
/// an echo handler and prints the response event.
#[derive(Parser)]
#[command(name = "lambdahttp")]
#[command(about = "Invoke an echo handler with an API Gateway proxy event")]
struct Cli {
    /// Proxy event JSON file, `-` for stdin
    #[arg(short, long, default_value = "-")]
    event: String,

    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Invocation deadline relative to now
    #[arg(long)]
    deadline_ms: Option<i64>,

    /// Defaults to the event's request id, or a fresh UUID
    #[arg(long)]
    request_id: Option<String>,

    #[arg(long)]
    pretty: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    let level = if cli.verbose { "debug" } else { config.log.level.as_str() };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber")?;

    let raw = read_event(&cli.event)?;
    let event: ProxyEvent = serde_json::from_str(&raw).context("parsing proxy event")?;

    let request_id = cli
        .request_id
        .or_else(|| Some(event.request_context.request_id.clone()).filter(|id| !id.is_empty()))
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut ctx = InvocationContext::new(request_id);
    if let Some(ms) = cli.deadline_ms {
        ctx = ctx.with_deadline(chrono::Utc::now() + chrono::Duration::milliseconds(ms));
    }

    info!("Invoking {} {}", event.http_method, event.path);

    let adapter = Arc::new(Adapter::with_config(echo, config));
    let invocation = {
        let adapter = Arc::clone(&adapter);
        let ctx = ctx.clone();
        tokio::task::spawn_blocking(move || adapter.invoke(ctx, &event))
    };
    tokio::pin!(invocation);

    // Ctrl+C only signals the handler; the invocation still runs to completion.
    let result = tokio::select! {
        result = &mut invocation => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received interrupt, cancelling invocation");
            ctx.cancel();
            invocation.await
        }
    };
    let response = result.context("invocation task panicked")??;

    let out = if cli.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", out)?;

    Ok(())
}

fn read_event(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("reading event from stdin")?;
        Ok(raw)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading event from {}", source))
    }
}

/// Answers with the reconstructed request as JSON.
fn echo(w: &mut dyn ResponseWriter, req: &mut Request) {
    let mut body = Vec::new();
    if let Err(e) = req.body_mut().read_to_end(&mut body) {
        warn!("Failed to read request body: {}", e);
    }

    let headers: serde_json::Map<String, serde_json::Value> = req
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned().into(),
            )
        })
        .collect();

    let payload = serde_json::json!({
        "method": req.method(),
        "url": req.url().to_string(),
        "rawPath": req.url().raw_path,
        "query": req.query_pairs(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
        "contentLength": req.content_length(),
        "remoteAddr": req.remote_addr(),
        "requestId": req.context().request_id(),
        "cancelled": req.context().is_cancelled(),
    });

    w.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    if let Err(e) = serde_json::to_writer(&mut *w, &payload) {
        warn!("Failed to write echo response: {}", e);
        w.write_header(http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
