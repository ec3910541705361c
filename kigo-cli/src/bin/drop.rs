//! Drop every kigo table from the target database, after an explicit
//! confirmation on stdin.

use std::io::{self, BufRead, Write};

use clap::Parser;

use kigo_core::Store;

const CONFIRMATION: &str = "DROP ALL";

#[derive(Parser)]
#[command(name = "drop", about = "Drop all kigo tables")]
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

    print!("Type `{CONFIRMATION}` to confirm > ");
    if io::stdout().flush().is_err() {
        std::process::exit(1);
    }

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        eprintln!("Couldn't read confirmation from stdin");
        std::process::exit(1);
    }

    if line.trim() == CONFIRMATION {
        println!("Confirmed");
        if let Err(error) = store.drop_everything().await {
            eprintln!("Couldn't drop: {error}");
            std::process::exit(1);
        }
        println!("Dropped");
    } else {
        println!("Not confirmed; not doing anything");
    }
}
