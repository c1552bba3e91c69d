use clap::{Parser, Subcommand};
use serde::Serialize;
use watchlist_sdk::WatchlistClient;

#[derive(Parser)]
#[command(name = "watchlist-cli")]
#[command(about = "Management CLI for the watchlist service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:50051")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add media to a user's watchlist
    Add {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        media: i64,
    },
    /// Remove media from a user's watchlist
    Remove {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        media: i64,
    },
    /// List a user's watchlist
    List {
        #[arg(long)]
        user: i64,
    },
    /// Check whether media is on a user's watchlist
    Check {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        media: i64,
    },
    /// Check service health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = WatchlistClient::new(&cli.url);

    match cli.command {
        Commands::Add { user, media } => print_json(&client.add(user, media).await?)?,
        Commands::Remove { user, media } => print_json(&client.remove(user, media).await?)?,
        Commands::List { user } => print_json(&client.list(user).await?)?,
        Commands::Check { user, media } => print_json(&client.check(user, media).await?)?,
        Commands::Health => {
            if client.health().await? {
                println!("ok");
            } else {
                eprintln!("Error: service is unhealthy");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
