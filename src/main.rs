use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

use ors_route::config::{AppConfig, LoggingConfig, RoutingLimits};
use ors_route::directions::{self, DirectionsRequest};
use ors_route::formats::ResponseFormat;
use ors_route::parse::parse_pbf;
use ors_route::{logging, server, storage, Profile, RouteGraph, SpatialIndex};

#[derive(Parser)]
#[command(name = "ors-route")]
#[command(about = "OpenStreetMap routing service with an openrouteservice-compatible /v2 API", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a routing graph from a PBF file
    Build {
        /// Input OSM PBF file
        #[arg(short, long)]
        input: PathBuf,
        /// Output graph file
        #[arg(short, long)]
        output: PathBuf,
        /// Comma-separated profiles, e.g. driving-car,foot-walking (default: all)
        #[arg(long, value_delimiter = ',')]
        profiles: Vec<Profile>,
    },
    /// Start the HTTP API server
    Serve {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Graph file, overrides `engine.graph_path`
        #[arg(short, long)]
        graph: Option<PathBuf>,
        /// Port, overrides `server.port`
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Compute one route and print it as JSON
    Route {
        /// Graph file
        #[arg(short, long)]
        graph: PathBuf,
        /// Routing profile
        #[arg(long, default_value = "driving-car")]
        profile: Profile,
        /// Start coordinate (lon,lat)
        #[arg(long)]
        from: String,
        /// End coordinate (lon,lat)
        #[arg(long)]
        to: String,
    },
}

fn build(input: PathBuf, output: PathBuf, profiles: Vec<Profile>) -> Result<()> {
    let profiles = if profiles.is_empty() {
        Profile::ALL.to_vec()
    } else {
        profiles
    };
    let start = Instant::now();
    let data = parse_pbf(&input).with_context(|| format!("Failed to read {}", input.display()))?;
    let graph = RouteGraph::from_osm(&data, &profiles).context("Failed to build graph")?;
    storage::save(&graph, &output).with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!(elapsed_s = start.elapsed().as_secs_f64(), "build finished");
    Ok(())
}

fn load_graph(config: &AppConfig) -> Result<RouteGraph> {
    let path = &config.engine.graph_path;
    if path.exists() {
        return storage::load(path).with_context(|| format!("Failed to load graph {}", path.display()));
    }
    let Some(source) = &config.engine.source_file else {
        bail!(
            "Graph file {} not found and no engine.source_file configured",
            path.display()
        );
    };
    tracing::info!(source = %source.display(), "graph file missing, building from source");
    let data = parse_pbf(source).with_context(|| format!("Failed to read {}", source.display()))?;
    let graph = RouteGraph::from_osm(&data, &config.engine.profiles).context("Failed to build graph")?;
    storage::save(&graph, path).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(graph)
}

fn route(graph: PathBuf, profile: Profile, from: &str, to: &str) -> Result<()> {
    let parse = |s: &str| {
        directions::request::parse_lon_lat(s).with_context(|| format!("Invalid coordinate '{s}', expected lon,lat"))
    };
    let (from, to) = (parse(from)?, parse(to)?);
    let graph = storage::load(&graph).with_context(|| format!("Failed to load graph {}", graph.display()))?;
    let index = SpatialIndex::build(&graph);

    let query = directions::request::validate(
        &DirectionsRequest::from_points(from, to),
        profile,
        ResponseFormat::Json,
        &RoutingLimits::default(),
    )
    .map_err(|e| anyhow::anyhow!("{} (code {})", e.message, e.code()))?;
    let start = Instant::now();
    let routes = directions::compute(&graph, &index, &query)?;
    tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "route computed");
    println!("{}", serde_json::to_string_pretty(&routes)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            profiles,
        } => {
            logging::init(&LoggingConfig::default());
            build(input, output, profiles)
        }
        Commands::Serve { config, graph, port } => {
            let mut config = AppConfig::load_or_default(config.as_deref())?;
            if let Some(graph) = graph {
                config.engine.graph_path = graph;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            logging::init(&config.logging);
            let graph = tokio::task::spawn_blocking({
                let config = config.clone();
                move || load_graph(&config)
            })
            .await??;
            server::serve(graph, config).await
        }
        Commands::Route {
            graph,
            profile,
            from,
            to,
        } => {
            logging::init(&LoggingConfig::default());
            route(graph, profile, &from, &to)
        }
    }
}
