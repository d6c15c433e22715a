//! layoutmd CLI - layout-aware PDF to Markdown converter

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use layoutmd::detect::ensure_input_exists;
use layoutmd::{
    detect_input, images_dir_for, open_document, ConvertOptions, DocumentAssembler, FontMetrics,
    PdfBackend,
};

#[derive(Parser)]
#[command(name = "layoutmd")]
#[command(version)]
#[command(about = "Convert PDF documents to Markdown with headings, emphasis and images", long_about = None)]
struct Cli {
    /// Input document (PDF or structured-text JSON)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output Markdown file
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    #[command(flatten)]
    split: SplitArgs,

    /// Hide the progress bar
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone)]
struct SplitArgs {
    /// Insert a separator line between pages
    #[arg(long, overrides_with = "no_split")]
    split: bool,

    /// Do not separate pages (default)
    #[arg(long = "no-split", overrides_with = "split")]
    no_split: bool,

    /// Separator text placed between pages with --split
    #[arg(long, value_name = "STRING", default_value = "---")]
    page_separator: String,
}

impl SplitArgs {
    fn to_options(&self) -> ConvertOptions {
        ConvertOptions::new()
            .with_split_by_page(self.split && !self.no_split)
            .with_page_separator(self.page_separator.clone())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a document to Markdown, extracting images next to it
    Convert {
        /// Input document
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output Markdown file
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        #[command(flatten)]
        split: SplitArgs,
    },

    /// Show per-page layout statistics
    Info {
        /// Input document
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Convert {
            input,
            output,
            split,
        }) => cmd_convert(&input, &output, split.to_options(), cli.quiet),
        Some(Commands::Info { input }) => cmd_info(&input),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => match (cli.input, cli.output) {
            (Some(input), Some(output)) => {
                cmd_convert(&input, &output, cli.split.to_options(), cli.quiet)
            }
            _ => {
                println!("{}", "Usage: layoutmd <INPUT> <OUTPUT>".yellow());
                println!("       layoutmd --help for more information");
                Ok(())
            }
        },
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn cmd_convert(
    input: &Path,
    output: &Path,
    options: ConvertOptions,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    ensure_input_exists(input)?;
    fs::create_dir_all(images_dir_for(output))?;

    let source = open_document(input)?;
    log::info!(
        "Converting {} ({} pages)",
        input.display(),
        source.page_count()
    );

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(source.page_count() as u64)
    };
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message("Converting pages...");

    let summary = DocumentAssembler::new(options)
        .on_progress(|progress| pb.set_position(progress.page as u64))
        .convert(&source, output)?;

    pb.finish_with_message("Done!");

    println!("\n{}", "Output files:".green().bold());
    println!("  {} {}", "├─".dimmed(), summary.output_path.display());
    println!(
        "  {} {}/ ({} images)",
        "└─".dimmed(),
        summary.images_dir.display(),
        summary.image_count
    );

    Ok(())
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let kind = detect_input(input)?;
    let source = open_document(input)?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Format".bold(), kind);
    println!("{}: {}", "Pages".bold(), source.page_count());

    println!();
    println!("{}", "Pages".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let mut total_images = 0;
    for index in 0..source.page_count() {
        let page = source.load_page(index)?;
        let metrics = FontMetrics::compute(&page.blocks);
        let text_blocks = page.blocks.iter().filter(|b| b.is_text()).count();
        let image_blocks = page.blocks.len() - text_blocks;
        total_images += page.images.len();

        println!(
            "{:>4}: {} text blocks, {} image blocks, {} images listed, base {:.1}pt",
            index + 1,
            text_blocks,
            image_blocks,
            page.images.len(),
            metrics.base_size
        );
    }

    println!();
    println!("{}: {}", "Images".bold(), total_images);

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "layoutmd".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Layout-aware PDF to Markdown converter");
    println!();
    println!("License: MIT");
}
