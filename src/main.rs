//! Schemaforge server binary
//!
//! ```bash
//! # Start with in-memory storage
//! schemaforge serve --port 8081
//!
//! # Check health
//! schemaforge health --url http://localhost:8081
//! ```

use clap::{Parser, Subcommand};
use schemaforge::{RegistryConfig, SchemaRegistry};
use std::net::SocketAddr;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "schemaforge")]
#[command(author, version, about = "Schemaforge - content-addressed schema registry")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the schema registry server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8081")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Check protobuf imports against declared references
        #[arg(long, default_value = "true")]
        verify_imports: bool,
    },

    /// Check server health
    Health {
        /// Schema registry URL
        #[arg(long, default_value = "http://localhost:8081")]
        url: String,
    },

    /// Register a schema
    Register {
        /// Schema registry URL
        #[arg(long, default_value = "http://localhost:8081")]
        url: String,

        /// Subject name
        #[arg(short, long)]
        subject: String,

        /// Schema type (avro, json, protobuf)
        #[arg(short = 't', long, default_value = "protobuf")]
        schema_type: String,

        /// Schema file path
        #[arg(short = 'f', long)]
        file: String,
    },

    /// Get schema by ID
    Get {
        /// Schema registry URL
        #[arg(long, default_value = "http://localhost:8081")]
        url: String,

        /// Schema ID
        #[arg(short, long)]
        id: u32,
    },

    /// List subjects
    Subjects {
        /// Schema registry URL
        #[arg(long, default_value = "http://localhost:8081")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Serve {
            port,
            host,
            verify_imports,
        } => serve(port, host, verify_imports).await,
        Commands::Health { url } => health_check(&url).await,
        Commands::Register {
            url,
            subject,
            schema_type,
            file,
        } => register_schema(&url, &subject, &schema_type, &file).await,
        Commands::Get { url, id } => get_schema(&url, id).await,
        Commands::Subjects { url } => list_subjects(&url).await,
    }
}

#[cfg(feature = "server")]
async fn serve(port: u16, host: String, verify_imports: bool) -> anyhow::Result<()> {
    use schemaforge::{SchemaServer, ServerConfig};

    info!("starting schemaforge on {}:{}", host, port);

    let config = RegistryConfig::memory().with_verify_imports(verify_imports);
    let registry = SchemaRegistry::new(config).await?;

    let server_config = ServerConfig {
        host: host.clone(),
        port,
    };
    let server = SchemaServer::new(registry, server_config);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("API endpoints:");
    info!("  POST /subjects/{{subject}}/versions - register schema");
    info!("  POST /subjects/{{subject}} - look up existing registration");
    info!("  GET  /schemas/ids/{{id}} - get schema by id");
    info!("  GET  /subjects - list subjects");
    info!("  GET  /subjects/{{subject}}/versions - list versions");

    server.run(addr).await?;
    Ok(())
}

#[cfg(not(feature = "server"))]
async fn serve(_port: u16, _host: String, _verify_imports: bool) -> anyhow::Result<()> {
    anyhow::bail!("Server feature not enabled. Rebuild with --features server")
}

async fn health_check(url: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let response = client.get(format!("{}/health", url)).send().await?;

    if response.status().is_success() {
        println!("✓ schema registry is healthy");
        Ok(())
    } else {
        anyhow::bail!("health check failed: {}", response.status())
    }
}

async fn register_schema(
    url: &str,
    subject: &str,
    schema_type: &str,
    file: &str,
) -> anyhow::Result<()> {
    let schema_content = std::fs::read_to_string(file)?;
    let client = reqwest::Client::new();

    let body = serde_json::json!({
        "schemaType": schema_type.to_uppercase(),
        "schema": schema_content,
    });

    let response = client
        .post(format!("{}/subjects/{}/versions", url, subject))
        .header("Content-Type", "application/vnd.schemaregistry.v1+json")
        .json(&body)
        .send()
        .await?;

    if response.status().is_success() {
        let result: serde_json::Value = response.json().await?;
        let id = result.get("id").and_then(|v| v.as_u64()).unwrap_or(0);
        println!("✓ schema registered");
        println!("  subject: {}", subject);
        println!("  schema id: {}", id);
        Ok(())
    } else {
        let error: serde_json::Value = response.json().await?;
        anyhow::bail!(
            "failed to register schema: {}",
            error
                .get("message")
                .unwrap_or(&serde_json::json!("unknown error"))
        )
    }
}

async fn get_schema(url: &str, id: u32) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/schemas/ids/{}", url, id))
        .send()
        .await?;

    if response.status().is_success() {
        let result: serde_json::Value = response.json().await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        Ok(())
    } else {
        anyhow::bail!("schema not found: {}", id)
    }
}

async fn list_subjects(url: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let response = client.get(format!("{}/subjects", url)).send().await?;

    if response.status().is_success() {
        let subjects: Vec<String> = response.json().await?;
        println!("subjects ({}):", subjects.len());
        for subject in subjects {
            println!("  - {}", subject);
        }
        Ok(())
    } else {
        anyhow::bail!("failed to list subjects")
    }
}
