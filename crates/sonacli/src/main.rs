use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use form_analysis::{AnalysisParams, ScoreAnalysis};
use owo_colors::OwoColorize;
use std::path::PathBuf;

/// Sonata-form analysis from the command line
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a MIDI file for sonata-form structure
    Analyze {
        /// Path to the .mid/.midi file
        file: PathBuf,

        /// Emit the raw JSON record instead of a formatted report
        #[arg(long)]
        json: bool,

        /// TOML file overriding analysis parameters
        #[arg(long)]
        params: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Analyze { file, json, params } => {
            let params = load_params(params.as_deref())?;
            let midi_bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;

            let analysis = form_analysis::analyze_midi(&midi_bytes, &params)
                .with_context(|| format!("analysis of {} failed", file.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&analysis.result)?);
            } else {
                print_report(&analysis);
            }
        }
    }

    Ok(())
}

fn load_params(path: Option<&std::path::Path>) -> Result<AnalysisParams> {
    match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))
        }
        None => Ok(AnalysisParams::default()),
    }
}

fn print_report(analysis: &ScoreAnalysis) {
    let result = &analysis.result;

    println!("{}", "Sonascope structural analysis".bright_cyan().bold());
    println!("{}\n", result.summary);

    for section in &result.sections {
        let span = format!(
            "{:>7.1}s – {:>7.1}s",
            section.start_time, section.end_time
        );
        let confidence = format!("{:>4.0}%", section.confidence * 100.0);
        let key = section
            .musical_key
            .as_deref()
            .map(|k| format!("  [{}]", k))
            .unwrap_or_default();

        println!(
            "  {}  {}  {}{}",
            span.dimmed(),
            confidence.bright_green(),
            section.kind.as_str().bright_white().bold(),
            key.dimmed(),
        );
        println!("      {}", section.description.dimmed());
    }

    if !result.musical_insights.is_empty() {
        println!("\n{}", "Insights".bright_cyan().bold());
        for insight in &result.musical_insights {
            println!("  • {}", insight);
        }
    }

    println!(
        "\n{} {:.0}%  ({} key areas, {} cadences)",
        "Overall confidence:".bright_white().bold(),
        result.overall_confidence * 100.0,
        analysis.key_areas.len(),
        analysis.cadences.len(),
    );
}
