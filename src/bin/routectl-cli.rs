use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "routectl-cli")]
#[command(about = "Management CLI for routectl", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// API key, when the server has one configured
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show mosdns and sing-box service status
    Status,
    /// List outbound nodes by group
    Outbounds,
    /// List route rules and rule sets
    Rules,
    /// Run sing-box check on the configuration on disk
    Validate,
    /// Restart sing-box
    Restart,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let api = format!("{}/api", cli.url.trim_end_matches('/'));
    let request = match cli.command {
        Commands::Status => client.get(format!("{}/services", api)),
        Commands::Outbounds => client.get(format!("{}/singbox/outbounds", api)),
        Commands::Rules => client.get(format!("{}/singbox/rules", api)),
        Commands::Validate => client.post(format!("{}/singbox/config/validate-current", api)),
        Commands::Restart => client.post(format!("{}/singbox/restart", api)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json.get("data").unwrap_or(&json))?);
    Ok(())
}
