use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use volley_client::cli::CliArgs;
use volley_client::metrics::{run_metrics_server, LoadMetrics};
use volley_client::request::{build_post_request, load_payload};
use volley_client::{run_waves, Client, ConnectionSettings, Counters, DispatchPlan, Reactor, Snapshot};
use volley_common::{LogFormat, Settings};

fn init_logging(settings: &Settings) {
    // With diagnostics off only warnings and errors from the bootstrap get through.
    let level = if settings.logging_enabled {
        settings.log_level.as_str()
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    match settings.log_format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .init(),
    }
}

fn print_settings(settings: &Settings) {
    println!("Settings:");
    println!("Host: {}", settings.host);
    println!("Port: {}", settings.port);
    println!("Endpoint: {}", settings.endpoint);
    println!("Request file: {}", settings.request_file.display());
    println!("Volume: {} requests sent on each connection", settings.waves);
    println!(
        "Response Wait Timeout: {} seconds",
        settings.response_timeout.as_secs()
    );
    println!(
        "Connections: {} total connections to be opened",
        settings.connections
    );
    println!(
        "Threads: {} total threads pushing to all available connections",
        settings.threads
    );
    println!(
        "Delay between sending requests: {}(ms)",
        settings.delay.as_millis()
    );
    println!(
        "Logging enabled: {}. If true, prints additional information to console",
        settings.logging_enabled
    );
}

fn print_summary(snapshot: &Snapshot) {
    println!("Summary:");
    println!("Total Requests Sent: {}", snapshot.sent);
    println!("Total Responses Received: {}", snapshot.received);
    println!("Send Failures: {}", snapshot.send_failures);
    println!("Response Timeouts: {}", snapshot.timeouts);
    println!("Response Errors: {}", snapshot.read_errors);
    println!("Connect Failures: {}", snapshot.connect_failures);
}

fn run(settings: &Settings) -> Result<Snapshot, Box<dyn Error>> {
    // Nothing is opened until the payload is known to be readable.
    let body = load_payload(&settings.request_file)?;
    let request = build_post_request(&settings.host, settings.port, &settings.endpoint, &body);

    let reactor = Reactor::new(settings.threads)?;
    let counters = Counters::new();
    let shutdown = reactor.shutdown_token();

    if settings.metrics_enabled {
        let metrics = Arc::new(LoadMetrics::new(Arc::clone(&counters))?);
        reactor.handle().spawn(run_metrics_server(
            metrics,
            settings.metrics_port,
            shutdown.child_token(),
        ));
    }

    let interrupt = shutdown.clone();
    reactor.handle().spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, abandoning in-flight requests");
            interrupt.cancel();
        }
    });

    let clients: Vec<Client> = (0..settings.connections)
        .map(|id| {
            let conn = ConnectionSettings {
                id,
                host: settings.host.clone(),
                port: settings.port,
                response_timeout: settings.response_timeout,
                connect_timeout: settings.connect_timeout,
                logging: settings.logging_enabled,
            };
            Client::spawn(&reactor, conn, Arc::clone(&counters))
        })
        .collect();

    println!("Start sending ...");
    let plan = DispatchPlan {
        waves: settings.waves,
        delay: settings.delay,
    };
    let issued = run_waves(&clients, &request, plan, &shutdown);
    info!(issued, "Dispatch finished, draining outstanding requests");

    drop(clients);
    reactor.drain();

    Ok(counters.snapshot())
}

fn main() -> ExitCode {
    let settings = match CliArgs::parse().resolve() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&settings);
    print_settings(&settings);

    match run(&settings) {
        Ok(snapshot) => {
            print_summary(&snapshot);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Load run aborted");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
