// The help text below quotes the syntax and is not a document itself.
// #!/usr/bin/env omegadoc ignore-this-file

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use omegadoc_config::Config;
use omegadoc_engine::io::{FsPlacer, OnExisting, WalkFinder};
use omegadoc_engine::postprocess::Pipeline;
use omegadoc_engine::{Controller, GitUrlResolver, RunReport};
use std::path::{Path, PathBuf};
use std::{env, process};

const LONG_ABOUT: &str = r#"A documentation extraction and collection program.

Omegadoc brings documentation kept next to the code and configuration it
describes, in text files of any type, together into a single directory.

A document is composed of an opening statement, then an output path, then a
body, and then a delimiting identifier, in that order. The opening statement is
the marker followed by a delimiting identifier (e.g. the word EOF or END), then
optional key:value attributes, then an output path. The body starts on the
next line and is closed by the same delimiting identifier:

    #!/usr/bin/env omegadoc <<DELIMIDENT exampleoutput/readme.md
    Hello I am a markdown document which will be recorded to
    a file at the relative path exampleoutput/readme.md.
    DELIMIDENT

If the file ends before the delimiting identifier is reached, that is the end
of the document.

A file containing the ignore directive before any document is treated as
having no documents at all. An ignore directive after a document has no
effect. The ignore directive is:

    #!/usr/bin/env omegadoc ignore-this-file
"#;

#[derive(Parser, Debug)]
#[command(name = "omegadoc")]
#[command(version, about = "A documentation extraction and collection program")]
#[command(long_about = LONG_ABOUT)]
struct Args {
    /// Path to the file or directory to search for documents
    #[arg(short = 'i', long, value_name = "SEARCHPATH")]
    input_search_path: Option<PathBuf>,

    /// Path to the directory in which to collect all found documents
    #[arg(short = 'o', long, value_name = "OUTPUTPATH")]
    output_path: Option<PathBuf>,

    /// Config file to use instead of ~/.config/omegadoc/config.toml
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Existing destination files: do-not-overwrite, ignore or yes-overwrite
    #[arg(long, value_name = "POLICY")]
    on_existing: Option<OnExisting>,

    /// Do not link documents back to their source repository
    #[arg(long)]
    no_source_urls: bool,

    /// Skip a postprocessor by name (repeatable)
    #[arg(long = "disable", value_name = "NAME")]
    disable: Vec<String>,

    /// Print the available postprocessors and exit
    #[arg(long)]
    list_postprocessors: bool,

    /// Log debug output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else if args.quiet {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match run(args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<i32> {
    if args.list_postprocessors {
        for stage in Pipeline::standard().stages() {
            println!("{} (rank {})", stage.name(), stage.rank());
            println!("    {}", stage.description());
        }
        return Ok(0);
    }

    let config = load_config(args.config.as_deref())?;

    let input = args.input_search_path.or(config.input_search_path);
    let output = args.output_path.or(config.output_path);
    if input.is_none() && output.is_none() {
        eprintln!(
            "Error: you must provide at least one of --input-search-path or --output-path\n"
        );
        eprintln!("{}", Args::command().render_usage());
        return Ok(2);
    }

    let input = input.unwrap_or_else(|| {
        log::info!("--input-search-path not provided, defaulting to ./");
        PathBuf::from("./")
    });
    let output = output.unwrap_or_else(|| {
        let default = env::temp_dir().join("omegadoc");
        log::info!(
            "--output-path not provided, defaulting to {}",
            default.display()
        );
        default
    });
    let input = std::path::absolute(&input)
        .with_context(|| format!("Cannot resolve input path {}", input.display()))?;
    let output = std::path::absolute(&output)
        .with_context(|| format!("Cannot resolve output path {}", output.display()))?;

    let disabled: Vec<String> = config
        .disabled_postprocessors
        .into_iter()
        .chain(args.disable)
        .collect();
    let pipeline = Pipeline::standard().without(&disabled[..])?;

    let finder = WalkFinder::new()
        .exclude(config.exclude)
        .respect_gitignore(config.respect_gitignore);
    let on_existing = args.on_existing.unwrap_or(config.on_existing);
    let mut controller = Controller::new(
        Box::new(finder),
        pipeline,
        Box::new(FsPlacer::new(on_existing)),
    );
    if config.source_urls && !args.no_source_urls {
        controller = controller.with_resolver(Box::new(GitUrlResolver::new()));
    }

    let report = controller
        .generate_tree(&input, &output)
        .context("Error encountered while generating documents")?;
    print_summary(&report, &output);

    Ok(if report.is_success() { 0 } else { 1 })
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => match Config::load_from_path(path)? {
            Some(config) => {
                log::debug!("Loaded config from {}", path.display());
                Ok(config)
            }
            None => bail!("Config file {} does not exist", path.display()),
        },
        None => {
            let config = Config::load()?;
            if config.is_some() {
                log::debug!("Loaded config from {}", Config::config_path().display());
            }
            Ok(config.unwrap_or_default())
        }
    }
}

fn print_summary(report: &RunReport, output: &Path) {
    println!(
        "Placed {} documents from {} files into {}",
        report.placed.len(),
        report.streams,
        output.display()
    );
    if !report.skipped.is_empty() {
        println!("Left {} existing files untouched", report.skipped.len());
    }
    if !report.stream_failures.is_empty() {
        println!("{} files could not be scanned", report.stream_failures.len());
    }
    if !report.placement_failures.is_empty() {
        println!(
            "{} documents could not be placed",
            report.placement_failures.len()
        );
    }
}
