//! Itinera
//!
//! Command-line entry point and HTTP server for the travel itinerary
//! orchestrator.

mod api;
mod config;

use clap::{Parser, Subcommand};
use itinera_core::swarm::{
    Orchestrator, ProgressRecorder, Record, RecordKind, RunContext, RunOptions, RunReport,
};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::config::{parse_fallback, parse_mode, PersistedConfig};

#[derive(Parser, Clone)]
#[command(author, version, about = "Itinera - multi-agent travel itinerary planner")]
struct Args {
    /// Debug logging for the orchestration core
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Configuration override file
    #[arg(long, global = true, default_value = config::CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Plan one trip on the terminal
    Run {
        /// Travel request, e.g. "2025年7月1日去北京3天，预算1200元"
        query: String,
        /// static or dynamic
        #[arg(long)]
        mode: Option<String>,
        /// What a dynamic run does when planning fails: fail or static
        #[arg(long)]
        fallback: Option<String>,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the expert agents and their input contracts
    Agents,
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "info,itinera_core=debug,itinera_server=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints progress records as they arrive
struct TerminalRecorder {
    /// Records go to stderr so stdout stays machine-readable
    to_stderr: bool,
}

impl ProgressRecorder for TerminalRecorder {
    fn record(&self, record: Record) {
        let marker = match record.kind {
            RecordKind::Supervisor => "▶",
            RecordKind::Agent => "●",
            RecordKind::Tool => "⚙",
        };
        let line = format!("{marker} [{}] {}", record.name, record.description);
        if self.to_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}

fn print_report(report: &RunReport) {
    let sections = [
        ("需求分析", &report.results.analysis.text),
        ("天气信息", &report.results.weather.text),
        ("行程规划", &report.results.planner.text),
    ];

    println!();
    if report.fell_back {
        println!("(任务规划失败, 已改用固定流程)");
    }
    for (title, text) in sections {
        println!("═══ {title} ═══");
        if text.is_empty() {
            println!("(未执行)");
        } else {
            println!("{text}");
        }
        println!();
    }
    if let Some(run) = &report.dynamic {
        let stats = run.stats();
        println!(
            "步骤: {}/{} 完成, {} 失败",
            stats.completed, stats.total, stats.failed
        );
    }
}

async fn run_once(
    config_path: &std::path::Path,
    query: String,
    mode: Option<String>,
    fallback: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let config = PersistedConfig::load(config_path).await.to_orchestrator_config()?;
    let mut options = RunOptions::from(&config);
    if let Some(mode) = mode {
        options.mode = parse_mode(&mode)?;
    }
    if let Some(fallback) = fallback {
        options.planning_fallback = parse_fallback(&fallback)?;
    }

    let orchestrator = Orchestrator::from_config(config)?;
    let ctx = RunContext::new(Arc::new(TerminalRecorder { to_stderr: json }));
    let cancel = ctx.cancel_token().clone();

    let outcome = tokio::select! {
        outcome = orchestrator.run_with(&query, options, &ctx) => outcome,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            tracing::warn!("interrupted");
            Err(itinera_core::swarm::OrchestrationError::Cancelled)
        }
    };

    let report = outcome?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn list_agents() {
    for agent in api::config::agent_infos() {
        println!("{} ({})", agent.name, agent.component);
        println!("  {}", agent.description);
        println!("  输入格式: {}", agent.input_format.replace('\n', "\n  "));
        println!("  输入示例: {}", agent.input_example.lines().next().unwrap_or_default());
        println!();
    }
}

async fn serve(config_path: PathBuf, port: u16) -> anyhow::Result<()> {
    let state = Arc::new(api::AppState::new(config_path));
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "itinera listening (OpenAPI at /api/v1/openapi.json)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Keys such as DASHSCOPE_API_KEY and QWEATHER_API_KEY may live in .env
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Some(CliCommand::Run {
            query,
            mode,
            fallback,
            json,
        }) => run_once(&args.config, query, mode, fallback, json).await,
        Some(CliCommand::Agents) => {
            list_agents();
            Ok(())
        }
        Some(CliCommand::Serve { port }) => serve(args.config, port).await,
        None => serve(args.config, 8080).await,
    }
}
