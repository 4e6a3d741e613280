use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use process_engine::{
    enumerate_paths, evaluate, init_config, normalize, render_chain, ChainNodeStatus,
    EngineConfig, ProcessDefinition, ProcessGraph, VariableValue, Variables,
};

#[derive(Parser)]
#[command(name = "process-engine")]
#[command(about = "Inspect and exercise graph-driven approval process definitions")]
#[command(long_about = "Validates process definitions, lists their structural paths, renders the \
                       approval chain for a position, and evaluates gateway guard expressions.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the process graph and report its shape
    Validate {
        /// Definition file (JSON with `nodes` and `edges`)
        definition: PathBuf,
    },
    /// Print every path from the start node to a terminal node
    Paths {
        definition: PathBuf,
    },
    /// Print the classified chain of visible nodes for a current position
    Chain {
        definition: PathBuf,
        /// Node the instance currently sits on
        #[arg(long, help = "Id of the node the instance currently sits on")]
        current: String,
        /// Emit the chain as JSON
        #[arg(long, help = "Print JSON instead of a table")]
        json: bool,
    },
    /// Evaluate a guard expression against variables
    Eval {
        /// Guard text; designer markup such as {{amount}} &gt; 100 is accepted
        expression: String,
        /// Variable binding, repeatable
        #[arg(long = "var", value_name = "NAME=VALUE", help = "Bind a variable (true/false, number, or text)")]
        vars: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = init_config()?;

    match cli.command {
        Commands::Validate { definition } => validate_command(&definition, config),
        Commands::Paths { definition } => paths_command(&definition, config),
        Commands::Chain {
            definition,
            current,
            json,
        } => chain_command(&definition, &current, json, config),
        Commands::Eval { expression, vars } => eval_command(&expression, &vars),
    }
}

fn load_graph(path: &Path) -> Result<ProcessGraph> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read definition {}", path.display()))?;
    let definition = ProcessDefinition::from_json(&raw)?;
    let graph = ProcessGraph::new(definition)
        .with_context(|| format!("Invalid process definition {}", path.display()))?;
    Ok(graph)
}

fn validate_command(path: &Path, config: &EngineConfig) -> Result<()> {
    let graph = load_graph(path)?;
    let start = graph.start_node()?;
    let paths = enumerate_paths(&graph, config.engine.detect_cycles)?;

    println!("✅ Definition is valid");
    println!("   Nodes: {}", graph.nodes().len());
    println!("   Edges: {}", graph.edges().len());
    println!("   Start: {}", start.id);
    println!("   Paths: {}", paths.len());
    Ok(())
}

fn paths_command(path: &Path, config: &EngineConfig) -> Result<()> {
    let graph = load_graph(path)?;
    let paths = enumerate_paths(&graph, config.engine.detect_cycles)?;

    for path in &paths {
        println!("{}", path.join(" -> "));
    }
    println!("{} path(s)", paths.len());
    Ok(())
}

fn chain_command(path: &Path, current: &str, json: bool, config: &EngineConfig) -> Result<()> {
    let graph = load_graph(path)?;
    let chain = render_chain(&graph, current, config.engine.detect_cycles)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chain)?);
        return Ok(());
    }

    for node in &chain {
        let marker = match node.status {
            ChainNodeStatus::Completed => "[x]",
            ChainNodeStatus::Current => "[>]",
            ChainNodeStatus::Pending => "[ ]",
        };
        let obligatory = if node.obligatory { " (obligatory)" } else { "" };
        println!("{marker} {:>3} {} {}{obligatory}", node.sort, node.id, node.label);
    }
    Ok(())
}

fn eval_command(expression: &str, vars: &[String]) -> Result<()> {
    let variables = parse_bindings(vars)?;
    let result = evaluate(expression, &variables)
        .with_context(|| format!("Could not evaluate '{}'", normalize(expression)))?;
    println!("{result}");
    Ok(())
}

fn parse_bindings(vars: &[String]) -> Result<Variables> {
    let mut variables = Variables::new();
    for binding in vars {
        let Some((name, value)) = binding.split_once('=') else {
            bail!("Variable binding '{binding}' must look like NAME=VALUE");
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("Variable binding '{binding}' has an empty name");
        }
        variables.insert(name.to_string(), VariableValue::parse_literal(value.trim()));
    }
    Ok(variables)
}
