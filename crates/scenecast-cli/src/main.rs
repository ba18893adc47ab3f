//! `scenecast` command-line frontend

mod session;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use scenecast_core::prelude::*;
use scenecast_llm::{OpenAiConfig, OpenAiGenerator};
use session::Session;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

const DEFAULT_SESSION: &str = ".scenecast/session.json";
const DEFAULT_OUT_DIR: &str = "animations";

fn cli() -> Command {
    let session_arg = Arg::new("session")
        .long("session")
        .value_name("FILE")
        .default_value(DEFAULT_SESSION)
        .value_parser(value_parser!(PathBuf))
        .help("Session file holding history and preferences");
    let config_arg = Arg::new("config")
        .long("config")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file");

    Command::new("scenecast")
        .version(scenecast_core::VERSION)
        .about("Turn a description into a rendered animation")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("render")
                .about("Generate, render and save an animation")
                .arg(
                    Arg::new("description")
                        .required(true)
                        .num_args(1..)
                        .help("What to animate"),
                )
                .arg(
                    Arg::new("quality")
                        .long("quality")
                        .short('q')
                        .value_name("LEVEL")
                        .help("low, medium or high; defaults to the session preference"),
                )
                .arg(session_arg.clone())
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_name("DIR")
                        .default_value(DEFAULT_OUT_DIR)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory videos are copied into"),
                )
                .arg(config_arg.clone()),
        )
        .subcommand(
            Command::new("quality")
                .about("Set the preferred render quality")
                .arg(
                    Arg::new("level")
                        .required(true)
                        .help("low, medium or high"),
                )
                .arg(session_arg),
        )
        .subcommand(
            Command::new("doctor")
                .about("Check the renderer and API key")
                .arg(config_arg),
        )
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("scenecast=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let result = match matches.subcommand() {
        Some(("render", args)) => render(args).await,
        Some(("quality", args)) => set_quality(args),
        Some(("doctor", args)) => doctor(args).await,
        _ => Ok(false),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn description(args: &ArgMatches) -> String {
    args.get_many::<String>("description")
        .map(|words| words.map(String::as_str).collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

fn path_arg<'a>(args: &'a ArgMatches, id: &str) -> Option<&'a Path> {
    args.get_one::<PathBuf>(id).map(PathBuf::as_path)
}

async fn render(args: &ArgMatches) -> anyhow::Result<bool> {
    let description = description(args);
    let session_path = path_arg(args, "session").context("missing --session")?;
    let out_dir = path_arg(args, "out").context("missing --out")?;

    let config = PipelineConfig::resolve(path_arg(args, "config")).context("loading configuration")?;
    let generator = OpenAiGenerator::from_env().context("configuring the code-generation client")?;
    let mut session = Session::load(session_path)?;

    let quality = args
        .get_one::<String>("quality")
        .map_or(session.quality, |label| Quality::from_label(label));
    let request = Request::new(description.as_str())
        .with_history(session.history.clone())
        .with_quality(quality);
    session.record_request(&description);

    let pipeline = Pipeline::from_config(&config, Arc::new(generator));
    let delivery = FileDelivery::new(out_dir, session.next_animation());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let report = pipeline.run_with_cancel(&request, &delivery, &cancel).await;
    tracing::info!(
        request_id = %report.request_id,
        total_ms = u64::try_from(report.journal.total().as_millis()).unwrap_or(u64::MAX),
        "run finished"
    );

    let delivered = match report.user_message() {
        None => {
            let n = session.record_delivery(&description);
            tracing::info!(animation = n, "saved animation");
            true
        }
        Some(message) => {
            eprintln!("{message}");
            false
        }
    };

    session.save(session_path)?;
    Ok(delivered)
}

fn set_quality(args: &ArgMatches) -> anyhow::Result<bool> {
    let session_path = path_arg(args, "session").context("missing --session")?;
    let label = args.get_one::<String>("level").map_or("", String::as_str);

    let mut session = Session::load(session_path)?;
    session.quality = Quality::from_label(label);
    session.save(session_path)?;

    println!("Quality set to {}", session.quality);
    Ok(true)
}

async fn doctor(args: &ArgMatches) -> anyhow::Result<bool> {
    let config = PipelineConfig::resolve(path_arg(args, "config")).context("loading configuration")?;

    let renderer = ProcessRenderer::new(config.renderer.clone());
    let renderer_ok = renderer.is_available().await;
    let llm = OpenAiConfig::from_env();

    println!(
        "renderer   {:<8} {}",
        if renderer_ok { "ok" } else { "missing" },
        config.renderer.program
    );
    match &llm {
        Ok(llm) => println!("api key    {:<8} model {} at {}", "ok", llm.model, llm.base_url),
        Err(e) => println!("api key    {:<8} {e}", "missing"),
    }
    println!(
        "staging    {}",
        config
            .staging
            .root
            .as_deref()
            .map_or_else(|| std::env::temp_dir().display().to_string(), |p| p.display().to_string())
    );

    Ok(renderer_ok && llm.is_ok())
}
