use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lecture_lens::cognitive::{combine_segments, compute_load, CentralityMap, LoadOptions};
use lecture_lens::knowledge::KnowledgeGraph;
use lecture_lens::transcription::load_transcript_file;
use lecture_lens::types::transcript_duration;
use lecture_lens::{Analyzer, Config, GenerationGateway, JobStore, TargetLanguage, WhisperTranscriber};

fn cli() -> Command {
    let command = Command::new("Lecture Lens")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Chapters, knowledge graphs and cognitive-load curves for recorded lectures")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (default: ./lecture-lens.toml or ./config/lecture-lens.toml)")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("chapters")
                .about("Generate chapters for a transcript JSON file")
                .arg(transcript_arg())
                .arg(
                    Arg::new("duration")
                        .long("duration")
                        .value_name("SECONDS")
                        .help("Media duration (default: end of the last segment)")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(language_arg())
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("load")
                .about("Compute the cognitive-load curve of a transcript")
                .arg(transcript_arg())
                .arg(
                    Arg::new("graph")
                        .long("graph")
                        .value_name("FILE")
                        .help("Knowledge graph JSON with node centralities")
                        .required(true),
                )
                .arg(
                    Arg::new("str-data")
                        .long("str-data")
                        .value_name("FILE")
                        .help("On-screen text segments to merge with the transcript"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_name("FILE")
                        .help("JSON object of keyword weights used alongside the graph"),
                )
                .arg(
                    Arg::new("window")
                        .long("window")
                        .value_name("SECONDS")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    Arg::new("segment-start")
                        .long("segment-start")
                        .value_name("SECONDS")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    Arg::new("segment-end")
                        .long("segment-end")
                        .value_name("SECONDS")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("analyze")
                .about("Transcribe a video and write every artifact for a job")
                .arg(
                    Arg::new("video")
                        .long("video")
                        .value_name("FILE")
                        .required(true),
                )
                .arg(
                    Arg::new("job-id")
                        .long("job-id")
                        .value_name("ID")
                        .required(true),
                )
                .arg(language_arg()),
        );

    #[cfg(feature = "api")]
    let command = command.subcommand(
        Command::new("serve").about("Start the HTTP API").arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .value_parser(clap::value_parser!(u16)),
        ),
    );

    command
}

fn transcript_arg() -> Arg {
    Arg::new("transcript")
        .short('t')
        .long("transcript")
        .value_name("FILE")
        .help("JSON array of {start, end, text} segments")
        .required(true)
}

fn language_arg() -> Arg {
    Arg::new("language")
        .short('l')
        .long("language")
        .value_name("CODE")
        .help("Output language code (ko, en, ja, ...)")
}

fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_name("FILE")
        .help("Write JSON here instead of stdout")
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let verbose = matches.get_flag("verbose");
    let config_path = matches.get_one::<String>("config").map(PathBuf::from);

    let config = Config::load(config_path.as_deref())?;

    // RUST_LOG wins over both defaults
    let default_filter = if verbose {
        "debug".to_string()
    } else {
        format!("lecture_lens={},warn", config.output.log_level)
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    if verbose {
        info!("Verbose logging enabled");
        info!("{}", config.summary());
    }

    let config = Arc::new(config);
    match matches.subcommand() {
        Some(("chapters", args)) => run_chapters(config, args).await,
        Some(("load", args)) => run_load(&config, args).await,
        Some(("analyze", args)) => run_analyze(config, args).await,
        #[cfg(feature = "api")]
        Some(("serve", args)) => run_serve(config, args).await,
        _ => unreachable!("clap requires a subcommand"),
    }
}

async fn build_analyzer(config: Arc<Config>) -> Result<Analyzer> {
    let store = JobStore::new(&config.output.jobs_dir).await?;
    let transcriber = Arc::new(WhisperTranscriber::new(config.transcription.clone()));
    Ok(Analyzer::new(config, Arc::new(GenerationGateway::new()), transcriber, store))
}

async fn run_chapters(config: Arc<Config>, args: &ArgMatches) -> Result<()> {
    let transcript = required_path(args, "transcript");
    let segments = load_transcript_file(&transcript).await?;
    let duration = args
        .get_one::<f64>("duration")
        .copied()
        .unwrap_or_else(|| transcript_duration(&segments));
    let language = TargetLanguage::resolve(args.get_one::<String>("language").map(String::as_str), None);

    info!("📚 Generating chapters for {} ({:.0}s)", transcript.display(), duration);
    let analyzer = build_analyzer(config).await?;
    let outcome = analyzer.chapters(&segments, duration, &language).await;

    write_output(args, &outcome).await
}

async fn run_load(config: &Config, args: &ArgMatches) -> Result<()> {
    let segments = load_transcript_file(&required_path(args, "transcript")).await?;

    let graph_path = required_path(args, "graph");
    let graph: KnowledgeGraph = read_json(&graph_path).await?;

    let str_data = match args.get_one::<String>("str-data") {
        Some(path) => load_transcript_file(Path::new(path)).await?,
        None => Vec::new(),
    };

    let mut centrality = CentralityMap::from_graph(&graph);
    if let Some(path) = args.get_one::<String>("seed") {
        let seed: HashMap<String, f64> = read_json(Path::new(path)).await?;
        centrality = centrality.with_seed(&seed, config.cognitive_load.seed_top_n);
    }
    if centrality.is_empty() {
        warn!("⚠️ No keyword scores in {}; the load curve will be flat", graph_path.display());
    }

    let options = LoadOptions {
        window_size: args
            .get_one::<f64>("window")
            .copied()
            .unwrap_or(config.cognitive_load.window_size),
        segment_start: args.get_one::<f64>("segment-start").copied().unwrap_or(0.0),
        segment_end: args.get_one::<f64>("segment-end").copied().unwrap_or(0.0),
    };

    let combined = combine_segments(&[&segments, &str_data]);
    options.check(&combined).map_err(anyhow::Error::msg)?;
    let series = compute_load(&combined, &centrality, &options);
    info!("📈 Computed {} load windows", series.len());

    write_output(args, &series).await
}

async fn run_analyze(config: Arc<Config>, args: &ArgMatches) -> Result<()> {
    let video = required_path(args, "video");
    let job_id = args
        .get_one::<String>("job-id")
        .context("--job-id is required")?;
    let language = args.get_one::<String>("language").map(String::as_str);

    let analyzer = build_analyzer(config).await?;
    let report = analyzer.analyze(job_id, &video, language).await?;

    for path in &report.artifacts {
        info!("💾 {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(feature = "api")]
async fn run_serve(config: Arc<Config>, args: &ArgMatches) -> Result<()> {
    let port = args.get_one::<u16>("port").copied().unwrap_or(config.server.port);
    let host = config.server.host.clone();

    let analyzer = Arc::new(build_analyzer(config).await?);
    lecture_lens::api::ApiServer::new(analyzer, host, port)?.start().await
}

fn required_path(args: &ArgMatches, name: &str) -> PathBuf {
    // clap enforces `required(true)` before we get here
    args.get_one::<String>(name).map(PathBuf::from).unwrap_or_default()
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

async fn write_output<T: Serialize>(args: &ArgMatches, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match args.get_one::<String>("output") {
        Some(path) => {
            tokio::fs::write(path, json).await?;
            info!("💾 Wrote {}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_load_arguments_parse() {
        let matches = cli()
            .try_get_matches_from([
                "lecture-lens",
                "load",
                "--transcript",
                "t.json",
                "--graph",
                "g.json",
                "--window",
                "30",
                "-v",
            ])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "load");
        assert_eq!(args.get_one::<f64>("window").copied(), Some(30.0));
        assert!(matches.get_flag("verbose"));
    }

    #[test]
    fn test_chapters_requires_transcript() {
        assert!(cli().try_get_matches_from(["lecture-lens", "chapters"]).is_err());
    }
}
