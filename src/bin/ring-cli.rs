use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "ring-cli")]
#[command(about = "Management CLI for the ring proxy admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show membership and ring size
    Status,
    /// List registered backends and their keyspace share
    Backends,
    /// Show ring ownership per backend
    Ring,
    /// Register a backend (host:port)
    Register {
        id: String,
        #[arg(long)]
        virtual_nodes: Option<u32>,
    },
    /// Deregister a backend
    Deregister { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)).send().await?,
        Commands::Backends => client.get(format!("{}/admin/backends", base)).send().await?,
        Commands::Ring => client.get(format!("{}/admin/ring", base)).send().await?,
        Commands::Register { id, virtual_nodes } => {
            client
                .post(format!("{}/admin/backends", base))
                .json(&json!({ "id": id, "virtual_nodes": virtual_nodes }))
                .send()
                .await?
        }
        Commands::Deregister { id } => {
            client
                .delete(format!("{}/admin/backends/{}", base, id))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
