//! taxomap CLI tool
//!
//! Command-line interface for running ingredient code linking with taxomap-core.
//!
//! ## Commands
//!
//! - `link`: Run the full pipeline and write enriched ingredient records
//! - `audit`: Compare the primary link table with codes embedded in the taxonomy

use clap::{Parser, Subcommand};
use std::{fs::write, path::PathBuf};
use taxomap_core::{
    config::{ConfigProvider, TomlConfigProvider},
    linking::AuditStatus,
    pipeline::Pipeline,
};

#[derive(Parser)]
#[command(name = "taxomap")]
#[command(author, version, about = "Links an ingredient taxonomy to nutrition and impact databases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve codes for every ingredient and write the enriched records
    Link {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,

        /// Where to write the enriched ingredient records (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Also write the per-ingredient mapping report (CSV)
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List linked ingredients whose table codes disagree with their embedded code
    Audit {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,

        /// Also list ingredients whose codes agree
        #[arg(short, long)]
        all: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Link {
            config,
            output,
            report,
            verbose,
        } => {
            let pipeline = Pipeline::from_config(TomlConfigProvider::new(config).load()?)?;
            let result = pipeline.run()?;

            let merged = pipeline.merged_records(&result)?;
            write(&output, serde_json::to_string_pretty(&merged)?)?;
            println!(
                "Wrote {} ingredient records to {}",
                merged.len(),
                output.display()
            );

            if let Some(report_path) = report {
                pipeline.mapping_report(&result).write_csv_path(&report_path)?;
                println!("Wrote mapping report to {}", report_path.display());
            }

            println!("\n=== Coverage ===");
            println!("Nodes: {}", result.summary.nodes);
            for (origin, count) in result.summary.by_origin.iter() {
                println!("  {origin}: {count}");
            }
            println!("With nutriments: {}", result.summary.with_nutriments);
            println!(
                "With impact sources: {}",
                result.summary.with_impact_sources
            );
            println!(
                "Diagnostics: {} ({} warnings)",
                result.diagnostics.len(),
                result.diagnostics.warnings().count()
            );

            if verbose {
                for diagnostic in result.diagnostics.iter() {
                    println!("  {diagnostic}");
                }
            }
            Ok(())
        }

        Commands::Audit { config, all } => {
            let pipeline = Pipeline::from_config(TomlConfigProvider::new(config).load()?)?;
            let entries = pipeline.audit();
            for entry in entries
                .iter()
                .filter(|e| all || e.status != AuditStatus::Same)
            {
                println!(
                    "{}\t{:?}\tembedded={}\tlinked={}",
                    entry.id,
                    entry.status,
                    entry.embedded_code,
                    entry.link_codes.join(",")
                );
            }
            println!(
                "\n{} linked ingredients carry an embedded code, {} disagree",
                entries.len(),
                entries
                    .iter()
                    .filter(|e| e.status == AuditStatus::Differs)
                    .count()
            );
            Ok(())
        }
    }
}
