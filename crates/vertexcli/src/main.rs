// crates/vertexcli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vertexcore::{BuildEvent, Value};
use vertexruntime::{BuildOptions, BuildRuntime, FactoryRegistry, Graph, RuntimeConfig};

#[derive(Parser)]
#[command(name = "vertex")]
#[command(about = "Vertex build engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a graph file up to one vertex
    Build {
        /// Path to graph JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Vertex to build (defaults to the graph's root)
        #[arg(long)]
        vertex: Option<String>,

        /// Rebuild even if already built
        #[arg(long)]
        force: bool,

        /// Parameter values per vertex, e.g. '{"ChatInput-a1b2c": {"input_value": "hi"}}'
        #[arg(short, long)]
        input: Option<String>,

        /// Runtime configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a graph file
    Validate {
        /// Path to graph JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List available component types
    Components,

    /// Create an example chat graph
    Init {
        /// Output file path
        #[arg(short, long, default_value = "graph.json")]
        output: PathBuf,
    },

    /// Build a graph and write a checkpoint of its vertices
    Checkpoint {
        /// Path to graph JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Vertex to build before capturing (defaults to the graph's root)
        #[arg(long)]
        vertex: Option<String>,

        /// Output file path
        #[arg(short, long, default_value = "checkpoint.json")]
        output: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn runtime(config: Option<&Path>) -> Result<BuildRuntime> {
    let config = match config {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };

    let mut registry = FactoryRegistry::new();
    vertexnodes::register_all(&mut registry);
    Ok(BuildRuntime::with_config(Arc::new(registry), config))
}

fn load(runtime: &BuildRuntime, file: &Path) -> Result<Graph> {
    runtime
        .load_file(file)
        .with_context(|| format!("loading graph {}", file.display()))
}

fn target_vertex(graph: &Graph, vertex: Option<String>) -> Result<String> {
    match vertex {
        Some(id) => Ok(id),
        None => graph
            .root_vertex()
            .map(|v| v.id().to_string())
            .ok_or_else(|| anyhow::anyhow!("Graph has no single root vertex; pass --vertex")),
    }
}

/// Parse `{"vertex": {"param": value}}` into per-vertex parameter updates
fn parse_inputs(input: &str) -> Result<BTreeMap<String, BTreeMap<String, Value>>> {
    let json: serde_json::Value = serde_json::from_str(input)?;
    let serde_json::Value::Object(vertices) = json else {
        return Err(anyhow::anyhow!("Input must be a JSON object"));
    };

    let mut inputs = BTreeMap::new();
    for (vertex_id, params) in vertices {
        let serde_json::Value::Object(params) = params else {
            return Err(anyhow::anyhow!("Input for {} must be a JSON object", vertex_id));
        };
        let params = params.into_iter().map(|(k, v)| (k, Value::from(v))).collect();
        inputs.insert(vertex_id, params);
    }
    Ok(inputs)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { file, vertex, force, input, config, verbose } => {
            init_logging(verbose);
            build_graph(file, vertex, force, input, config).await?;
        }

        Commands::Validate { file } => {
            init_logging(false);
            validate_graph(file)?;
        }

        Commands::Components => {
            list_components();
        }

        Commands::Init { output } => {
            create_example_graph(output)?;
        }

        Commands::Checkpoint { file, vertex, output } => {
            init_logging(false);
            write_checkpoint(file, vertex, output).await?;
        }
    }

    Ok(())
}

async fn build_graph(
    file: PathBuf,
    vertex: Option<String>,
    force: bool,
    input: Option<String>,
    config: Option<PathBuf>,
) -> Result<()> {
    println!("🚀 Loading graph from: {}", file.display());

    let runtime = runtime(config.as_deref())?;
    let mut graph = load(&runtime, &file)?;
    info!(graph = graph.name().unwrap_or("untitled"), vertices = graph.len(), "Graph loaded");

    println!("📋 Graph: {}", graph.name().unwrap_or("untitled"));
    println!("   Vertices: {}", graph.len());
    println!("   Edges: {}", graph.edges().len());
    println!();

    if let Some(input) = input {
        for (vertex_id, params) in parse_inputs(&input)? {
            graph.update_params(&vertex_id, params, true)?;
        }
    }

    let target = target_vertex(&graph, vertex)?;
    let mut events = runtime.subscribe_events();

    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                BuildEvent::BuildStarted { vertex_id, .. } => {
                    println!("▶️  Building {}", vertex_id);
                }
                BuildEvent::VertexBuilding { vertex_id, vertex_type, .. } => {
                    println!("  ⚡ Building vertex: {} ({})", vertex_id, vertex_type);
                }
                BuildEvent::VertexBuilt { vertex_id, duration_ms, .. } => {
                    println!("  ✅ Vertex {} built in {}ms", vertex_id, duration_ms);
                }
                BuildEvent::VertexFailed { vertex_id, error, .. } => {
                    println!("  ❌ Vertex {} failed: {}", vertex_id, error);
                }
                BuildEvent::VertexInvalidated { vertex_id, invalidated_by, .. } => {
                    println!("     ♻️  {} invalidated by {}", vertex_id, invalidated_by);
                }
                BuildEvent::DeferredSubmitted { vertex_id, task, .. } => {
                    println!("     📨 [{}] submitted as task {}", vertex_id, task);
                }
                BuildEvent::DeferredPending { vertex_id, task, .. } => {
                    println!("     ⏳ [{}] task {} still pending", vertex_id, task);
                }
                BuildEvent::BuildCompleted { success, duration_ms, .. } => {
                    if success {
                        println!("✨ Build completed successfully in {}ms", duration_ms);
                    } else {
                        println!("💥 Build failed after {}ms", duration_ms);
                    }
                }
            }
        }
    });

    let result = graph.build_with(&target, BuildOptions { force }, None).await;

    // Wait for events to finish printing
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    let object = match result {
        Ok(object) => object,
        Err(e) => {
            error!(vertex = %target, build_id = %graph.build_id(), "Build failed: {}", e);
            return Err(e.into());
        }
    };
    info!(
        vertex = %target,
        built = graph.vertices().filter(|v| v.is_built()).count(),
        "Build finished"
    );

    println!();
    println!("📊 Build Summary:");
    println!("   Build ID: {}", graph.build_id());
    println!(
        "   Built: {}/{} vertices",
        graph.vertices().filter(|v| v.is_built()).count(),
        graph.len()
    );

    println!();
    println!("📤 Output of {}:", target);
    if let Some(object) = object {
        println!("   {}", object);
    }
    if let Some(artifacts) = graph.vertex(&target).and_then(|v| v.artifacts()) {
        for (key, value) in artifacts {
            println!("     {}: {}", key, value);
        }
    }

    Ok(())
}

fn validate_graph(file: PathBuf) -> Result<()> {
    println!("🔍 Validating graph: {}", file.display());

    let runtime = runtime(None)?;
    let graph = load(&runtime, &file)?;
    if let Err(e) = graph.validate() {
        warn!(file = %file.display(), "Graph failed validation: {}", e);
        return Err(e.into());
    }

    let layers = graph.layered_sort()?;

    println!("✅ Graph is valid:");
    println!("   Name: {}", graph.name().unwrap_or("untitled"));
    println!("   Vertices: {}", graph.len());
    println!("   Edges: {}", graph.edges().len());
    if let Some(root) = graph.root_vertex() {
        println!("   Root: {}", root.id());
    }
    for (depth, layer) in layers.iter().enumerate() {
        println!("   Layer {}: {}", depth, layer.join(", "));
    }

    Ok(())
}

fn list_components() {
    println!("📦 Available Component Types:");
    println!();

    let mut registry = FactoryRegistry::new();
    vertexnodes::register_all(&mut registry);

    for component_type in registry.list_component_types() {
        if let Some(metadata) = registry.get_metadata(&component_type) {
            println!("  • {} ({})", component_type, metadata.category);
            println!("    {}", metadata.description);
            for input in &metadata.inputs {
                let marker = if input.required { "*" } else { " " };
                println!("      {}{}: {}", marker, input.name, input.description);
            }
        } else {
            println!("  • {}", component_type);
        }
    }
}

fn create_example_graph(output: PathBuf) -> Result<()> {
    let spec = vertexnodes::example_graph();

    let json = serde_json::to_string_pretty(&spec)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example graph: {}", output.display());
    println!();
    println!("Build it with:");
    println!(
        "  vertex build --file {} --input '{{\"ChatInput-a1b2c\": {{\"input_value\": \"What is Rust?\"}}}}'",
        output.display()
    );

    Ok(())
}

async fn write_checkpoint(file: PathBuf, vertex: Option<String>, output: PathBuf) -> Result<()> {
    let runtime = runtime(None)?;
    let mut graph = load(&runtime, &file)?;

    let target = target_vertex(&graph, vertex)?;
    graph.build(&target, false, None).await?;

    let checkpoint = graph.checkpoint()?;
    let json = serde_json::to_string_pretty(&checkpoint)?;
    std::fs::write(&output, json)
        .with_context(|| format!("writing checkpoint {}", output.display()))?;
    info!(vertices = checkpoint.vertices.len(), output = %output.display(), "Checkpoint written");

    println!("💾 Wrote checkpoint of {} vertices to {}", checkpoint.vertices.len(), output.display());

    Ok(())
}
