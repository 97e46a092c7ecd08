use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use clap::{Parser as ClapParser, Subcommand};
use tracing_subscriber::EnvFilter;

use charter::sim::{register_celestial_bodies, register_kerbal_names, BodyCatalog};
use charter::{
    evaluate, ConfigNode, EvalContext, Evaluator, FactoryRegistry, Loader, ReloadStep, TypeRegistry,
};

#[derive(ClapParser)]
#[command(name = "charter")]
#[command(about = "Charter - a declarative mission contract engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a contract configuration file and report what loaded
    Load {
        /// Path to the configuration file
        file: PathBuf,
    },

    /// Evaluate a single expression
    Eval {
        /// The expression to evaluate
        expression: String,

        /// Result type (bool, int, float, string, or a registered type)
        #[arg(short = 't', long = "type", default_value = "string")]
        result_type: String,
    },

    /// Render a display-text template
    Render {
        /// The template text
        template: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = standard_registry();

    let result = match cli.command {
        Commands::Load { file } => run_load(&file, &registry),
        Commands::Eval {
            expression,
            result_type,
        } => run_eval(&expression, &result_type, &registry),
        Commands::Render { template } => run_render(&template, &registry),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn standard_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    let catalog = Rc::new(BodyCatalog::sample());
    register_celestial_bodies(&mut registry, catalog).expect("built-in types registered");
    register_kerbal_names(&mut registry).expect("string type registered");
    registry
}

fn run_load(file: &PathBuf, registry: &TypeRegistry) -> Result<(), String> {
    let text = fs::read_to_string(file).map_err(|e| format!("{}: {}", file.display(), e))?;
    let nodes = ConfigNode::parse_document(&text).map_err(|e| e.to_string())?;

    let factories = FactoryRegistry::new();
    let mut loader = Loader::new(registry, &factories, nodes);
    while loader.step() != ReloadStep::Done {}

    let (success, attempted, total) = loader.progress();
    println!(
        "Loaded {} out of {} contract types ({} attempted)",
        success, total, attempted
    );
    for contract_type in loader.database().contract_types() {
        println!("  {} - {}", contract_type.name, contract_type.title);
    }
    Ok(())
}

fn run_eval(expression: &str, result_type: &str, registry: &TypeRegistry) -> Result<(), String> {
    let ctx = EvalContext::new();

    let output = match result_type {
        "bool" => evaluate::<bool>(expression, registry, &ctx).map(|v| v.to_string()),
        "int" => evaluate::<i64>(expression, registry, &ctx).map(|v| v.to_string()),
        "float" => evaluate::<f64>(expression, registry, &ctx).map(|v| v.to_string()),
        "string" => evaluate::<String>(expression, registry, &ctx),
        other => Evaluator::new(registry, other)
            .and_then(|evaluator| evaluator.evaluate_text(expression, &ctx))
            .and_then(|value| registry.convert(&value, "string"))
            .and_then(|value| Ok(value.as_str()?.to_string())),
    }
    .map_err(|e| e.to_string())?;

    println!("{}", output);
    Ok(())
}

fn run_render(template: &str, registry: &TypeRegistry) -> Result<(), String> {
    let ctx = EvalContext::new();
    let rendered =
        charter::template::render(template, registry, &ctx).map_err(|e| e.to_string())?;
    println!("{}", rendered);
    Ok(())
}
