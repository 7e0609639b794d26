use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use market_intel::agents::{execute_research_pipeline, ResearchRequest};
use market_intel::citations::CitationStyle;
use market_intel::db::{connect_store, store_report, StatusNotifier};
use market_intel::pipelines::PipelineKind;
use market_intel::search::build_search;
use market_intel::utils::init_logger;
use market_intel::{AppState, Config};

#[derive(Parser)]
#[command(name = "market-intel", version, about = "Cited market and sales intelligence reports")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API
    Serve,
    /// Run one pipeline and print the report
    Run {
        #[arg(long)]
        pipeline: PipelineKind,
        #[arg(long)]
        topic: String,
        /// Also store the report on this project
        #[arg(long)]
        project_id: Option<String>,
        /// Overrides CITATION_STYLE
        #[arg(long)]
        style: Option<CitationStyle>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger("market_intel=debug,tower_http=debug");

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Run {
            pipeline,
            topic,
            project_id,
            style,
        } => {
            if let Some(style) = style {
                config.research.citation_style = style;
            }
            run_once(config, pipeline, topic, project_id).await
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!(host = %config.server.host, port = config.server.port, "Configuration loaded");

    let store = connect_store(&config.database).await?;
    let notifier = StatusNotifier::from_config(&config.status);
    info!(status_callback = notifier.is_enabled(), "Status notifier configured");

    let state = AppState {
        search: build_search(&config),
        notifier,
        store,
        config: config.clone(),
    };

    let app = market_intel::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn run_once(
    config: Config,
    pipeline: PipelineKind,
    topic: String,
    project_id: Option<String>,
) -> anyhow::Result<()> {
    let search = build_search(&config);
    let mut request = ResearchRequest::new(topic);
    if let Some(id) = &project_id {
        request = request.with_project(id);
    }

    let report = execute_research_pipeline(pipeline, request, &config, search.as_ref()).await?;

    if let Some(project_id) = project_id {
        let store = connect_store(&config.database).await?;
        store.create_blank_project(&project_id).await?;
        let notifier = StatusNotifier::from_config(&config.status);
        store_report(store.as_ref(), &notifier, &project_id, &report.report, pipeline).await;
    }

    println!("{}", report.report);
    info!(
        sources = report.sources.len(),
        cited = report.cited.len(),
        outcome = ?report.loop_summary.outcome,
        "Done"
    );
    Ok(())
}
