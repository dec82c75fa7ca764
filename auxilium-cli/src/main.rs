//! auxilium-cli — operator console frontend for the Auxilium HTTP API
//!
//! # Subcommands
//! - `status`              — backend health + classifier liveness
//! - `sessions`            — list emergency sessions
//! - `ai-result <id>`      — stored verdict for one session
//! - `reanalyze <id>`      — destructive re-analysis of one session

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8002";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "auxilium-cli",
    version,
    about = "Auxilium emergency backend — operator console CLI"
)]
struct Cli {
    /// Auxilium HTTP server URL (overrides AUXILIUM_HTTP_URL env var)
    #[arg(long, env = "AUXILIUM_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Output raw JSON instead of human-readable lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show backend health and classifier availability
    Status,

    /// List emergency sessions
    Sessions,

    /// Show the stored AI verdict for a session
    AiResult {
        /// Session id
        id: i64,
    },

    /// Re-run classification for a session (overwrites the stored verdict)
    Reanalyze {
        /// Session id
        id: i64,
    },
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SessionSummary {
    id: i64,
    status: String,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct SessionList {
    sessions: Vec<SessionSummary>,
}

#[derive(Debug, Deserialize)]
struct AiResult {
    session_id: i64,
    ai_result: Option<String>,
    ai_reason: Option<String>,
    status: String,
}

// ============================================================================
// Commands
// ============================================================================

fn get(server: &str, path: &str) -> anyhow::Result<serde_json::Value> {
    let url = format!("{}{}", server.trim_end_matches('/'), path);
    let resp = reqwest::blocking::get(&url).with_context(|| format!("GET {} failed", url))?;
    let status = resp.status();
    let body: serde_json::Value = resp.json().context("response was not JSON")?;
    if !status.is_success() {
        bail!("{} answered {}: {}", url, status, body["error"].as_str().unwrap_or("unknown error"));
    }
    Ok(body)
}

fn post(server: &str, path: &str) -> anyhow::Result<serde_json::Value> {
    let url = format!("{}{}", server.trim_end_matches('/'), path);
    let client = reqwest::blocking::Client::new();
    let resp = client
        .post(&url)
        .send()
        .with_context(|| format!("POST {} failed", url))?;
    let status = resp.status();
    let body: serde_json::Value = resp.json().context("response was not JSON")?;
    if !status.is_success() {
        bail!("{} answered {}: {}", url, status, body["error"].as_str().unwrap_or("unknown error"));
    }
    Ok(body)
}

fn cmd_status(server: &str, json: bool) -> anyhow::Result<()> {
    let health = get(server, "/health")?;
    let ai = get(server, "/ai/status")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "health": health, "ai": ai }))?
        );
        return Ok(());
    }

    println!("backend:    {}", health["status"].as_str().unwrap_or("unknown"));
    println!("database:   {}", health["database"].as_str().unwrap_or("unknown"));
    println!(
        "classifier: {}",
        if ai["ai_available"].as_bool().unwrap_or(false) {
            "available"
        } else {
            "unavailable"
        }
    );
    Ok(())
}

fn cmd_sessions(server: &str, json: bool) -> anyhow::Result<()> {
    let body = get(server, "/emergency-sessions")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let list: SessionList = serde_json::from_value(body).context("unexpected session list shape")?;
    if list.sessions.is_empty() {
        println!("no sessions");
        return Ok(());
    }
    for s in list.sessions {
        println!("{:>6}  {:<15} {}", s.id, s.status, s.created_at);
    }
    Ok(())
}

fn cmd_ai_result(server: &str, id: i64, json: bool) -> anyhow::Result<()> {
    let body = get(server, &format!("/emergency-sessions/{}/ai-result", id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let result: AiResult = serde_json::from_value(body).context("unexpected ai-result shape")?;
    println!("session: {}", result.session_id);
    println!("status:  {}", result.status);
    println!("verdict: {}", result.ai_result.as_deref().unwrap_or("-"));
    println!("reason:  {}", result.ai_reason.as_deref().unwrap_or("-"));
    Ok(())
}

fn cmd_reanalyze(server: &str, id: i64, json: bool) -> anyhow::Result<()> {
    let body = post(server, &format!("/emergency-sessions/{}/analyze", id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!(
        "session {} re-analyzed, status: {}",
        id,
        body["status"].as_str().unwrap_or("unknown")
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status => cmd_status(&cli.server, cli.json),
        Commands::Sessions => cmd_sessions(&cli.server, cli.json),
        Commands::AiResult { id } => cmd_ai_result(&cli.server, id, cli.json),
        Commands::Reanalyze { id } => cmd_reanalyze(&cli.server, id, cli.json),
    }
}
