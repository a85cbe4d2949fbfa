use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use planner_core::Database;
use smart_task_planner::api;

#[derive(Parser)]
#[command(name = "stp")]
#[command(about = "AI-assisted goal planning with chat, task plans and PDF export")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the planner API server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "4000")]
        port: u16,
    },
    /// Check whether a local server is accepting connections
    Status {
        #[arg(short, long, default_value = "4000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "smart_task_planner=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let port = match cli.command {
        Some(Commands::Serve { port }) => port,
        Some(Commands::Status { port }) => {
            match tokio::net::TcpStream::connect(("127.0.0.1", port)).await {
                Ok(_) => println!("Planner server is running on port {}", port),
                Err(_) => println!("No planner server on port {}", port),
            }
            return Ok(());
        }
        None => 4000,
    };

    let db = Database::open_default()?;
    db.migrate()?;

    let app = api::create_router(db);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Planner API listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
