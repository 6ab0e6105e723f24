//! Command-line entrypoint for fundus-image severity training

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use retinopathy::backend::{backend_name, default_device, TrainingBackend};
use retinopathy::dataset::index::{class_counts, load_partition, Partition};
use retinopathy::logging::{init_logging, LogLevel};
use retinopathy::model::Backbone;
use retinopathy::training::{run_training, RunArgs, TrainingConfig};
use retinopathy::{class_name, NUM_CLASSES, VERSION};

#[derive(Parser)]
#[command(name = "retinopathy")]
#[command(about = "Diabetic-retinopathy severity grading from fundus photographs")]
#[command(version = VERSION)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a classifier on the train partition and evaluate every epoch
    Train {
        /// Directory holding the partition index files
        #[arg(long, default_value = ".")]
        data_dir: PathBuf,

        /// Directory holding the image files
        #[arg(long, default_value = "data")]
        image_root: PathBuf,

        /// JSON file of hyperparameters, replacing the individual flags
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory artifacts are written to
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,

        /// Backbone depth
        #[arg(long, value_enum, default_value = "resnet18")]
        backbone: Backbone,

        /// Saved record to initialize the model from
        #[arg(long)]
        weights: Option<PathBuf>,

        /// Number of epochs
        #[arg(long, default_value_t = 50)]
        epochs: usize,

        /// Samples per batch
        #[arg(long, default_value_t = 4)]
        batch_size: usize,

        /// SGD learning rate
        #[arg(long, default_value_t = 8e-4)]
        learning_rate: f64,

        /// SGD momentum
        #[arg(long, default_value_t = 0.9)]
        momentum: f64,

        /// L2 weight decay
        #[arg(long, default_value_t = 5e-4)]
        weight_decay: f64,

        /// Seed for shuffling, augmentation and weight init
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Image-decoding worker threads
        #[arg(long, default_value_t = 4)]
        num_workers: usize,

        /// Square side images are cropped to
        #[arg(long, default_value_t = 512)]
        image_size: u32,
    },

    /// Print the label distribution of both partitions
    Stats {
        /// Directory holding the partition index files
        #[arg(long, default_value = ".")]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });

    print_banner();

    match cli.command {
        Commands::Train {
            data_dir,
            image_root,
            output_dir,
            backbone,
            weights,
            config,
            epochs,
            batch_size,
            learning_rate,
            momentum,
            weight_decay,
            seed,
            num_workers,
            image_size,
        } => {
            let config = match config {
                Some(path) => TrainingConfig::load(&path)?,
                None => TrainingConfig {
                    epochs,
                    batch_size,
                    learning_rate,
                    momentum,
                    weight_decay,
                    seed,
                    num_workers,
                    image_size,
                    ..TrainingConfig::default()
                },
            };
            let args = RunArgs {
                data_dir,
                image_root,
                output_dir,
                backbone,
                weights,
                config,
            };

            println!("  backend:  {}", backend_name().cyan());
            println!("  backbone: {}", args.backbone.to_string().cyan());
            println!();

            let device = default_device();
            let report = run_training::<TrainingBackend>(&args, device)?;

            println!();
            println!(
                "{} best test accuracy {} at epoch {}",
                "Done:".green().bold(),
                format!("{:.2}%", report.best_accuracy).bold(),
                report.best_epoch
            );
            if let Some(checkpoint) = report.checkpoint {
                println!("  checkpoint: {}", checkpoint.display());
            }
            Ok(())
        }

        Commands::Stats { data_dir } => {
            for partition in [Partition::Train, Partition::Test] {
                let samples = load_partition(&data_dir, partition)?;
                let counts = class_counts(&samples);
                let max = counts.iter().copied().max().unwrap_or(1).max(1);

                println!(
                    "{} ({} samples)",
                    partition.to_string().bold(),
                    samples.len()
                );
                for grade in 0..NUM_CLASSES {
                    let bar_len = counts[grade] * 40 / max;
                    println!(
                        "  {:>18} {:>6}  {}",
                        class_name(grade),
                        counts[grade],
                        "█".repeat(bar_len).blue()
                    );
                }
                println!();
            }
            Ok(())
        }
    }
}

fn print_banner() {
    println!();
    println!(
        "{}",
        "╔══════════════════════════════════════════╗".bright_blue()
    );
    println!(
        "{}",
        format!("║  Retinopathy Grading v{VERSION:<19}║").bright_blue()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════╝".bright_blue()
    );
    println!();
}
