//! The standalone kigo admin server: serves `GET /api/ping` against the
//! target database until interrupted.

use axum::Router;
use clap::Parser;
use tokio::signal;

use kigo_core::{add_routes, Store, DEFAULT_WEBFACE_ADDRESS};

#[derive(Parser)]
#[command(name = "webface", about = "Serve the kigo admin API")]
struct Args {
    /// Postgres URL; falls back to the KIGO_URL environment variable.
    #[arg(env = "KIGO_URL")]
    url: Option<String>,

    /// Address to bind.
    #[arg(long, default_value = DEFAULT_WEBFACE_ADDRESS)]
    address: String,
}

async fn shutdown() {
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");
    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = terminate.recv() => {},
        _ = interrupt.recv() => {},
    };

    tracing::info!("shutting down gracefully...");
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let Some(url) = args.url else {
        eprintln!("Pass a postgres URL via command-line args or the KIGO_URL environment variable");
        std::process::exit(1);
    };

    let store = match Store::connect(&url).await {
        Ok(store) => store,
        Err(error) => {
            eprintln!("Couldn't connect to kigo: {error}");
            std::process::exit(1);
        }
    };

    let app = add_routes(Router::new(), store);

    let listener = match tokio::net::TcpListener::bind(&args.address).await {
        Ok(listener) => listener,
        Err(error) => {
            eprintln!("Couldn't bind {}: {error}", args.address);
            std::process::exit(1);
        }
    };

    tracing::info!(address = %args.address, "webface listening");

    if let Err(error) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown())
        .await
    {
        eprintln!("Webface server failed: {error}");
        std::process::exit(1);
    }
}
