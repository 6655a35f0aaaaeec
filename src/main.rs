use clap::{Parser, Subcommand};
use pixo::batch::{self, BatchError, BatchItem, CancelToken};
use pixo::bridge::{BridgeChoice, BridgeError, ConversionBridge, ConversionOptions, select_bridge};
use pixo::config::{self, PixoConfig};
use pixo::output;
use pixo::presets::{self, Preset};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pixo")]
#[command(about = "Convert images between PNG, JPEG, WebP, HEIC, BMP and PDF")]
#[command(long_about = "\
Convert images between PNG, JPEG, WebP, HEIC, BMP and PDF

Every conversion writes a new file named pixo-<uuid>.<format> under
<output_root>/pixo-output/ and never touches the source.

Quality accepts a fraction (0.85) or a percentage (85).

Run 'pixo gen-config' to generate a documented pixo.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./pixo.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root for the pixo-output/ directory (overrides config)
    #[arg(long, global = true)]
    output_root: Option<PathBuf>,

    /// Bridge implementation (overrides config)
    #[arg(long, global = true, value_enum)]
    bridge: Option<BridgeArg>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum BridgeArg {
    Auto,
    Native,
    Copy,
}

impl From<BridgeArg> for BridgeChoice {
    fn from(arg: BridgeArg) -> Self {
        match arg {
            BridgeArg::Auto => BridgeChoice::Auto,
            BridgeArg::Native => BridgeChoice::Native,
            BridgeArg::Copy => BridgeChoice::Copy,
        }
    }
}

/// Shared flags for commands that convert images.
#[derive(clap::Args, Clone)]
struct ConvertArgs {
    /// Target format: png, jpg, webp, heic, bmp, pdf
    #[arg(long)]
    to: Option<String>,

    /// Start from a preset (see `pixo presets`)
    #[arg(long)]
    preset: Option<String>,

    /// Lossy quality, fraction or percentage
    #[arg(short, long)]
    quality: Option<f64>,

    /// Bound the longer side to this many pixels
    #[arg(long)]
    max_dimension: Option<f64>,

    /// Force both sides to --max-dimension, ignoring aspect ratio
    #[arg(long)]
    exact: bool,

    /// Progressive JPEG
    #[arg(long)]
    progressive: bool,

    /// Drop the embedded color profile
    #[arg(long)]
    strip_color_profile: bool,

    /// Do not copy EXIF or color profile
    #[arg(long)]
    no_metadata: bool,

    /// PNG deflate effort, 0-9
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=9))]
    compression_level: Option<u8>,

    /// Lossless WebP
    #[arg(long)]
    webp_lossless: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Convert one image
    Convert {
        source: String,
        #[command(flatten)]
        args: ConvertArgs,
    },
    /// Show image metadata without decoding pixels
    Metadata { path: String },
    /// Estimate the converted size without writing a file
    Estimate {
        source: String,
        /// Target format (default from config)
        #[arg(long)]
        to: Option<String>,
        #[arg(short, long)]
        quality: Option<f64>,
    },
    /// Convert files and directories, one image at a time
    Batch {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[command(flatten)]
        args: ConvertArgs,
    },
    /// List built-in and configured presets
    Presets,
    /// Print a stock pixo.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(err.as_ref(), cli.json);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "pixo=debug" } else { "pixo=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn report(err: &(dyn std::error::Error + 'static), json: bool) {
    if let Some(bridge_err) = err.downcast_ref::<BridgeError>() {
        if json {
            println!("{}", serde_json::to_string(bridge_err).unwrap_or_default());
        } else {
            eprintln!("{}", output::format_error(bridge_err));
        }
    } else if let Some(BatchError::Item {
        error, completed, ..
    }) = err.downcast_ref::<BatchError>()
    {
        eprintln!("{}", err);
        eprintln!("{}", output::format_error(error));
        eprintln!("{} item(s) converted before the failure", completed.len());
    } else {
        eprintln!("error: {}", err);
    }
}

fn load_config(cli: &Cli) -> Result<PixoConfig, config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => config::load_config_file(path, true)?,
        None => config::load_config(&std::env::current_dir()?)?,
    };
    if let Some(root) = &cli.output_root {
        config.output_root = Some(root.clone());
    }
    if let Some(bridge) = cli.bridge {
        config.bridge = bridge.into();
    }
    Ok(config)
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli)?;

    match &cli.command {
        Command::Convert { source, args } => {
            let bridge = select_bridge(config.bridge, config.output_dir());
            let (target, options) = resolve_conversion(&config, args)?;
            let result = bridge.convert_image(source, &target, &options)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                output::print_conversion(source, &result);
            }
        }
        Command::Metadata { path } => {
            let bridge = select_bridge(config.bridge, config.output_dir());
            let meta = bridge.get_image_metadata(path)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&meta)?);
            } else {
                output::print_metadata(path, &meta);
            }
        }
        Command::Estimate { source, to, quality } => {
            let bridge = select_bridge(config.bridge, config.output_dir());
            let target = to.clone().unwrap_or_else(|| config.defaults.format.clone());
            let quality = quality.unwrap_or(config.defaults.quality);
            let bytes = bridge.estimate_output_size(source, &target, quality)?;
            if cli.json {
                println!("{}", serde_json::json!({ "estimatedSize": bytes }));
            } else {
                println!("{}", output::format_estimate(source, &target, bytes));
            }
        }
        Command::Batch { paths, args } => {
            let bridge = select_bridge(config.bridge, config.output_dir());
            let (target, options) = resolve_conversion(&config, args)?;
            run_batch(bridge.as_ref(), paths, &target, &options, cli.json)?;
        }
        Command::Presets => {
            let all = presets::all_presets(&config.presets);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&all)?);
            } else {
                output::print_presets(&all);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Target format and options: config defaults, then the preset, then flags.
fn resolve_conversion(
    config: &PixoConfig,
    args: &ConvertArgs,
) -> Result<(String, ConversionOptions), String> {
    let all = presets::all_presets(&config.presets);
    let preset: Option<&Preset> = match &args.preset {
        Some(id) => Some(
            presets::find_preset(&all, id).ok_or_else(|| format!("unknown preset '{id}'"))?,
        ),
        None => None,
    };

    let mut target = config.defaults.format.clone();
    let mut options = config.defaults.options();
    if let Some(preset) = preset {
        target = preset.to.clone();
        options = preset.options.clone();
    }

    if let Some(to) = &args.to {
        target = to.clone();
    }
    if let Some(quality) = args.quality {
        options.quality = quality;
    }
    if let Some(max) = args.max_dimension {
        options.max_dimension = Some(max);
    }
    if args.exact {
        options.maintain_aspect_ratio = false;
    }
    if args.progressive {
        options.progressive = true;
    }
    if args.strip_color_profile {
        options.strip_color_profile = true;
    }
    if args.no_metadata {
        options.preserve_metadata = false;
    }
    if let Some(level) = args.compression_level {
        options.compression_level = Some(level);
    }
    if args.webp_lossless {
        options.webp_lossless = true;
    }
    Ok((target, options))
}

fn run_batch(
    bridge: &dyn ConversionBridge,
    paths: &[PathBuf],
    target: &str,
    options: &ConversionOptions,
    json: bool,
) -> Result<(), BatchError> {
    let items: Vec<BatchItem> = batch::collect_sources(paths)
        .into_iter()
        .map(BatchItem::from_path)
        .collect();
    let total = items.len();

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            if json {
                continue;
            }
            for line in output::format_batch_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = batch::run_batch(bridge, &items, target, options, &CancelToken::new(), Some(tx));
    printer.join().ok();

    let outcome = result?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome.records).unwrap_or_default()
        );
    } else {
        output::print_batch_summary(&outcome, total);
    }
    Ok(())
}
