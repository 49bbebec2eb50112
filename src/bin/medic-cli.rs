use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "medic-cli")]
#[command(about = "Management CLI for agent-medic", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "MEDIC_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Latest scheduler snapshot
    Status,
    /// Circuit breaker states
    Breakers,
    /// Uptime, recovery success rate, MTTR
    Metrics,
    /// Quarantine stats and pending items
    Quarantine,
    /// Submit an external signal for quarantine
    Submit {
        /// incident, threat, pattern, oracle_data or external_intel
        #[arg(long)]
        data_type: String,
        /// Signal content as JSON
        #[arg(long)]
        content: String,
        #[arg(long)]
        source: String,
    },
    /// Confirm a pending quarantine item
    Confirm {
        id: String,
        #[arg(long)]
        reviewer: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Reject a pending quarantine item
    Reject {
        id: String,
        #[arg(long)]
        reason: String,
    },
    /// Mark an incident as a false positive
    FalsePositive { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );
    let get = |path: &str| client.get(format!("{}{}", cli.url, path)).headers(headers.clone());
    let post = |path: String| client.post(format!("{}{}", cli.url, path)).headers(headers.clone());

    let res = match cli.command {
        Commands::Status => get("/admin/status").send().await?,
        Commands::Breakers => get("/admin/breakers").send().await?,
        Commands::Metrics => get("/admin/metrics").send().await?,
        Commands::Quarantine => get("/admin/quarantine").send().await?,
        Commands::Submit {
            data_type,
            content,
            source,
        } => {
            let content: Value = serde_json::from_str(&content)?;
            post("/admin/quarantine".to_string())
                .json(&json!({ "data_type": data_type, "content": content, "source": source }))
                .send()
                .await?
        }
        Commands::Confirm { id, reviewer, notes } => {
            post(format!("/admin/quarantine/{}/confirm", id))
                .json(&json!({ "reviewer": reviewer, "notes": notes }))
                .send()
                .await?
        }
        Commands::Reject { id, reason } => {
            post(format!("/admin/quarantine/{}/reject", id))
                .json(&json!({ "reason": reason }))
                .send()
                .await?
        }
        Commands::FalsePositive { id } => {
            post(format!("/admin/incidents/{}/false-positive", id)).send().await?
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
        return Ok(());
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
