mod server;

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{error, info};
use spectra_analysis::{CaptureReport, files::read_capture_file, get_layer_count, get_profile, supported_models};
use spectra_capture::{SyntheticEngine, TensorCollector};

use crate::server::{ServerConfig, run_server};

const DEFAULT_PROMPTS: [&str; 3] = [
    "What is the capital of France?",
    "Explain photosynthesis in simple terms.",
    "Write a haiku about programming.",
];

/// Define the serve subcommand.
fn serve_subcommand() -> Command {
    Command::new("serve")
        .about("Serve the capture query API over HTTP")
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Address to bind [default: 0.0.0.0]"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to listen on [default: 8000]")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("DIR")
                .help("Directory holding capture files [default: data]"),
        )
        .arg(
            Arg::new("max-upload")
                .long("max-upload")
                .value_name("BYTES")
                .help("Largest accepted request body in bytes [default: 67108864]")
                .value_parser(clap::value_parser!(usize)),
        )
}

/// Define the analyze subcommand.
fn analyze_subcommand() -> Command {
    Command::new("analyze")
        .about("Print a layer and category summary of a capture file")
        .arg(Arg::new("FILE").help("Capture file (.json)").required(true).index(1))
        .arg(
            Arg::new("family")
                .short('f')
                .long("family")
                .value_name("FAMILY")
                .help("Model family used to interpret the capture")
                .default_value("llama"),
        )
        .arg(
            Arg::new("size")
                .short('s')
                .long("size")
                .value_name("SIZE")
                .help("Model size label, e.g. 7b")
                .default_value("7b"),
        )
}

/// Define the simulate subcommand.
fn simulate_subcommand() -> Command {
    Command::new("simulate")
        .about("Record a capture from a synthetic evaluation graph")
        .arg(
            Arg::new("family")
                .short('f')
                .long("family")
                .value_name("FAMILY")
                .help("Model family whose role cycle the graph follows")
                .default_value("llama"),
        )
        .arg(
            Arg::new("size")
                .short('s')
                .long("size")
                .value_name("SIZE")
                .help("Model size label selecting the layer count")
                .default_value("7b"),
        )
        .arg(
            Arg::new("prompt")
                .short('i')
                .long("prompt")
                .value_name("STRING")
                .help("Prompt recorded as one trial, repeatable")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("tokens")
                .short('t')
                .long("tokens")
                .value_name("INT")
                .help("Forward passes per trial")
                .default_value("4")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("PATH")
                .help("Output file [default: data/capture_synthetic_<family>_<timestamp>.json]"),
        )
}

fn models_subcommand() -> Command {
    Command::new("models").about("List supported model families")
}

fn run_serve_command(matches: &ArgMatches) -> Result<()> {
    let config = ServerConfig::builder()
        .host(matches.get_one::<String>("host"))
        .port(matches.get_one::<u16>("port").copied())
        .data_dir(matches.get_one::<String>("data-dir"))
        .max_upload_bytes(matches.get_one::<usize>("max-upload").copied())
        .build()
        .map_err(|e| anyhow!(e))?;

    run_server(config)
}

fn run_analyze_command(matches: &ArgMatches) -> Result<()> {
    let file = matches.get_one::<String>("FILE").ok_or_else(|| anyhow!("FILE is required"))?;
    let family = matches.get_one::<String>("family").map(String::as_str).unwrap_or("llama");
    let size = matches.get_one::<String>("size").map(String::as_str).unwrap_or("7b");

    let capture = read_capture_file(Path::new(file))?;
    let report = CaptureReport::build(&capture, family, size)?;

    info!("{report}");
    Ok(())
}

fn default_output(family: &str) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("data/capture_synthetic_{family}_{timestamp}.json"))
}

fn run_simulate_command(matches: &ArgMatches) -> Result<()> {
    let family = matches.get_one::<String>("family").map(String::as_str).unwrap_or("llama");
    let size = matches.get_one::<String>("size").map(String::as_str).unwrap_or("7b");
    let tokens = matches.get_one::<usize>("tokens").copied().unwrap_or(4);
    let prompts = match matches.get_many::<String>("prompt") {
        Some(prompts) => prompts.cloned().collect::<Vec<_>>(),
        None => DEFAULT_PROMPTS.iter().map(|prompt| prompt.to_string()).collect(),
    };

    let profile = get_profile(family).ok_or_else(|| anyhow!("Unknown model family: {family}"))?;
    let n_layers = get_layer_count(family, size);
    let engine = SyntheticEngine::new(n_layers, profile.roles_per_layer());
    let collector = TensorCollector::new(family);

    info!("");
    info!("🧪 Synthetic capture: {} ({n_layers} layers, {} nodes per pass)", profile.description, engine.graph_len());

    for prompt in &prompts {
        collector.start_trial(prompt)?;
        let computed = engine.run(&collector, tokens);
        let trial = collector.end_trial(&format!("{computed} synthetic node evaluations"))?;
        info!(
            "Trial {}: {} unique tensors, {} observations",
            trial.trial_id,
            trial.tensors.unique(),
            trial.tensors.total()
        );
    }

    let output = matches.get_one::<String>("output").map(PathBuf::from).unwrap_or_else(|| default_output(family));
    let path = collector.save_to_json(&output)?;
    let statistics = collector.statistics()?;

    info!("💾 Saved {}", path.display());
    info!(
        "📊 {} trials, {} unique tensors, {} callbacks",
        statistics.total_trials, statistics.unique_tensors, statistics.total_callbacks
    );
    Ok(())
}

fn run_models_command() -> Result<()> {
    for family in supported_models() {
        let profile = get_profile(family).ok_or_else(|| anyhow!("Missing profile for {family}"))?;
        let layers = profile
            .layer_counts
            .iter()
            .map(|(size, layers)| format!("{size}={layers}"))
            .collect::<Vec<_>>()
            .join(", ");

        info!("{family}: {}", profile.description);
        info!("  variants: {}", profile.variants.join(", "));
        info!("  layers: {layers}");
        if let Some(notes) = profile.notes {
            info!("  note: {notes}");
        }
    }
    Ok(())
}

fn execute_commands() -> Result<()> {
    // Initialize logger with clean format (no timestamp/module prefix)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "{}", record.args())
        })
        .init();

    let matches = Command::new("spectra")
        .about("Spectra: capture and inspect which tensors a transformer evaluates")
        .subcommand(serve_subcommand())
        .subcommand(analyze_subcommand())
        .subcommand(simulate_subcommand())
        .subcommand(models_subcommand())
        .get_matches();

    match matches.subcommand() {
        Some(("serve", matches)) => run_serve_command(matches),
        Some(("analyze", matches)) => run_analyze_command(matches),
        Some(("simulate", matches)) => run_simulate_command(matches),
        Some(("models", _)) => run_models_command(),
        _ => anyhow::bail!("No subcommand specified. Use -h to print help information."),
    }
}

fn main() {
    if let Err(e) = execute_commands() {
        error!("Error: {e}");
        std::process::exit(1);
    }
}
