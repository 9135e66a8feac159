//! gqlsh - command-line GraphQL client entrypoint.
//!
//! - `gqlsh query` - one-shot query with a schema-aware normalized cache
//! - `gqlsh mutate` - one-shot mutation (variables payload required)
//! - `gqlsh subscribe` - long-lived WebSocket subscription
//!
//! Query and mutation failures are visible on the diagnostic sink (stderr)
//! only; stdout stays silent and the process still exits 0. Subscriptions
//! exit 1 on a stream error and 0 on server-initiated completion.

#![forbid(unsafe_code)]

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use futures_util::StreamExt;
use tracing::debug;

use gqlsh_client::{
    execute, introspect, Endpoint, NormalizedCache, OperationKind, OperationRequest,
    SubscriptionSession, TransportBuilder,
};

/// Command-line GraphQL client.
#[derive(Parser)]
#[command(name = "gqlsh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a one-shot query.
    ///
    /// Introspects the schema first so fragment matching on interfaces and
    /// unions is resolved from the live abstract-type table; falls back to
    /// the default cache when introspection fails.
    Query(OperationArgs),

    /// Execute a one-shot mutation.
    ///
    /// Mutations never introspect and use the default cache; the variables
    /// payload is required.
    Mutate(OperationArgs),

    /// Open a long-lived subscription and print one JSON line per result.
    ///
    /// The connection is lazy and reconnects automatically on transport
    /// drop. Exits 0 when the server completes the stream, 1 on error.
    Subscribe(OperationArgs),
}

#[derive(Args)]
struct OperationArgs {
    /// GraphQL endpoint URI.
    endpoint: String,
    /// Bearer token, injected verbatim into the Authorization value.
    token: String,
    /// Operation document text.
    document: String,
    /// Variables payload as JSON text.
    #[arg(short = 'V', long)]
    variables: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Write logs to stderr so stdout is clean for JSON output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Query(args) => run_oneshot(OperationKind::Query, args).await,
        Commands::Mutate(args) => run_oneshot(OperationKind::Mutation, args).await,
        Commands::Subscribe(args) => run_subscribe(args).await,
    }
}

async fn run_oneshot(kind: OperationKind, args: OperationArgs) -> ExitCode {
    trace_inputs(&args);
    let endpoint = Endpoint::new(&args.endpoint, &args.token);

    // The abstract-type table is fully computed before the cache exists;
    // only the query path introspects, and a failed introspection degrades
    // to the default matcher instead of failing the operation.
    let table = if kind == OperationKind::Query {
        let chain = TransportBuilder::new(endpoint.clone()).http();
        match introspect(&chain).await {
            Ok(table) => Some(table),
            Err(err) => {
                debug!(error = %err, "introspection failed; using default cache");
                None
            }
        }
    } else {
        None
    };

    let mut cache = NormalizedCache::configure(table);
    let transport = TransportBuilder::new(endpoint).http();
    let request = OperationRequest::new(kind, args.document, args.variables);

    match execute(&request, &transport, &mut cache).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            // Diagnostic sink only; the invocation still resolves cleanly.
            debug!(error = %err, kind = kind.as_str(), "operation failed");
            ExitCode::SUCCESS
        }
    }
}

async fn run_subscribe(args: OperationArgs) -> ExitCode {
    trace_inputs(&args);
    let endpoint = Endpoint::new(&args.endpoint, &args.token);
    let transport = TransportBuilder::new(endpoint).websocket();
    let request =
        OperationRequest::new(OperationKind::Subscription, args.document, args.variables);

    let mut session = match SubscriptionSession::subscribe(transport, &request) {
        Ok(session) => session,
        Err(err) => {
            debug!(error = %err, "subscription setup failed");
            return ExitCode::from(1);
        }
    };

    while let Some(item) = session.next().await {
        match item {
            Ok(response) => match serde_json::to_string(&response) {
                Ok(line) => println!("{line}"),
                Err(err) => {
                    debug!(error = %err, "failed to serialize subscription result");
                    return ExitCode::from(1);
                }
            },
            Err(err) => {
                debug!(error = %err, "subscription stream error");
                return ExitCode::from(1);
            }
        }
    }

    debug!("subscription complete");
    ExitCode::SUCCESS
}

fn trace_inputs(args: &OperationArgs) {
    debug!(endpoint = %args.endpoint, "Endpoint");
    debug!(token = %args.token, "Token");
    debug!(document = %args.document, "Document");
}
