//! Create or update the kigo schema in the target database.

use clap::Parser;

use kigo_core::Store;

#[derive(Parser)]
#[command(name = "migrate", about = "Run kigo's schema migrations")]
struct Args {
    /// Postgres URL; falls back to the KIGO_URL environment variable.
    #[arg(env = "KIGO_URL")]
    url: Option<String>,
}

#[tokio::main]
async fn main() {
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

    if let Err(error) = store.migrate().await {
        eprintln!("Couldn't perform migration: {error}");
        std::process::exit(1);
    }

    println!("Migrated");
}
