extern crate log;
extern crate pretty_env_logger;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::{arg, command, value_parser, ArgMatches, Command};
use log::warn;

use crate::answers::AnswerKey;
use crate::config::{load_config, SheetConfig};
use crate::grade::{grade_sheet, GradeOptions};
use crate::manifest::{load_manifest, PositionManifest};
use crate::mark::mark_sheet;
use crate::template::generate_template;
use crate::types::Choice;

mod answers;
mod config;
mod debug;
mod geometry;
mod grade;
mod image_utils;
mod layout;
mod manifest;
mod mark;
mod render;
mod report;
mod template;
mod typeface;
mod types;

fn main() {
    pretty_env_logger::init_custom_env("LOG");

    let matches = cli().get_matches();

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                exit(1);
            }
        },
        None => SheetConfig::default(),
    };

    let result = match matches.subcommand() {
        Some(("generate", sub_matches)) => run_generate(config, sub_matches),
        Some(("mark", sub_matches)) => run_mark(config, sub_matches),
        Some(("grade", sub_matches)) => run_grade(config, sub_matches),
        _ => unreachable!("a subcommand is required"),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        exit(1);
    }
}

/// Parses `--choices`: either comma-separated labels (`A,B,C`) or one label
/// per character (`ABCDE`).
fn parse_choices(raw: &str) -> Vec<Choice> {
    if !raw.contains(',') {
        return raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| Choice::from(c.to_string()))
            .collect();
    }

    raw.split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(|label| Choice::from(label))
        .collect()
}

fn run_generate(mut config: SheetConfig, matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    if let Some(n) = matches.get_one::<u32>("questions") {
        config.question_count = *n;
    }
    if let Some(choices) = matches.get_one::<String>("choices") {
        config.choices = parse_choices(choices);
    }
    if let Some(output) = matches.get_one::<PathBuf>("output") {
        config.template_path = output.clone();
    }
    if let Some(manifest) = matches.get_one::<PathBuf>("manifest") {
        config.manifest_path = Some(manifest.clone());
    }
    if let Some(font) = matches.get_one::<PathBuf>("font") {
        config.font_path = Some(font.clone());
    }
    if matches.get_flag("no-reference-marks") {
        config.reference_marks = false;
    }

    let manifest_path = config.manifest_path();
    let manifest = generate_template(
        &config.template_options(),
        &config.template_path,
        &manifest_path,
        config.font_path.as_deref(),
    )?;

    println!(
        "Generated {} with {} questions",
        config.template_path.display(),
        manifest.question_count()
    );
    println!("Saved positions to {}", manifest_path.display());
    Ok(())
}

/// Loads the manifest if it exists. A missing file is reported by the grader
/// as a missing manifest rather than as an I/O failure.
fn load_manifest_if_present(path: &Path) -> Result<Option<PositionManifest>, Box<dyn Error>> {
    if !path.exists() {
        warn!("no position manifest at {}", path.display());
        return Ok(None);
    }
    Ok(Some(load_manifest(path)?))
}

fn manifest_path_for(config: &SheetConfig, matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<PathBuf>("manifest")
        .cloned()
        .unwrap_or_else(|| config.manifest_path())
}

fn run_mark(config: SheetConfig, matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let template_path = matches
        .get_one::<PathBuf>("template")
        .cloned()
        .unwrap_or_else(|| config.template_path.clone());
    let output_path = matches
        .get_one::<PathBuf>("output")
        .expect("output path is required");
    let raw_answers = matches
        .get_one::<String>("answers")
        .expect("answers are required");

    let manifest = load_manifest(&manifest_path_for(&config, matches))?;
    let answers = AnswerKey::parse(raw_answers, &manifest.choices)?;
    let marked = mark_sheet(&template_path, &manifest, &answers, output_path)?;

    println!(
        "Marked {} of {} questions into {}",
        marked,
        manifest.question_count(),
        output_path.display()
    );
    Ok(())
}

fn run_grade(config: SheetConfig, matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let image_path = matches
        .get_one::<PathBuf>("image")
        .expect("image path is required");
    let raw_key = matches
        .get_one::<String>("key")
        .expect("answer key is required");

    let manifest = load_manifest_if_present(&manifest_path_for(&config, matches))?;
    let choices = manifest
        .as_ref()
        .map_or_else(|| config.choices.clone(), |m| m.choices.clone());
    let key = AnswerKey::parse(raw_key, &choices)?;

    let options = GradeOptions {
        threshold: matches
            .get_one::<f32>("threshold")
            .copied()
            .unwrap_or(config.threshold),
        debug: matches.get_flag("debug"),
        font_path: matches
            .get_one::<PathBuf>("font")
            .cloned()
            .or(config.font_path),
    };

    let report = grade_sheet(image_path, manifest.as_ref(), &key, &options)?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}

#[allow(clippy::cognitive_complexity)]
fn cli() -> Command {
    command!()
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            arg!(-c --config <PATH> "Path to a JSON config file")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate a blank answer sheet and its position manifest")
                .arg(
                    arg!(-n --questions <N> "Number of questions")
                        .value_parser(value_parser!(u32)),
                )
                .arg(arg!(--choices <LABELS> "Choice labels, e.g. ABCD or A,B,C,D"))
                .arg(
                    arg!(-o --output <PATH> "Path to write the template image")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-m --manifest <PATH> "Path to write the position manifest")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--font <PATH> "TrueType font used for labels")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(arg!(--"no-reference-marks" "Do not draw alignment marks")),
        )
        .subcommand(
            Command::new("mark")
                .about("Fill in bubbles on a blank sheet for the given answers")
                .arg(
                    arg!(template: [TEMPLATE] "Blank template image")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-m --manifest <PATH> "Path to the position manifest")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-a --answers <ANSWERS> "Comma-separated answers, blank for unanswered")
                        .required(true),
                )
                .arg(
                    arg!(-o --output <PATH> "Path to write the marked sheet")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("grade")
                .about("Grade a marked sheet against an answer key")
                .arg(
                    arg!(image: <IMAGE> "Image of the marked sheet")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-m --manifest <PATH> "Path to the position manifest")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(arg!(-k --key <ANSWERS> "Comma-separated expected answers").required(true))
                .arg(
                    arg!(-t --threshold <RATIO> "Fill ratio above which a bubble is marked")
                        .value_parser(value_parser!(f32)),
                )
                .arg(arg!(-d --debug "Write annotated debug images next to the input"))
                .arg(arg!(--json "Print the report as JSON"))
                .arg(
                    arg!(--font <PATH> "TrueType font used in debug images")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}
