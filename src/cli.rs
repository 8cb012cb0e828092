//! Command-line interface implementation

use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::output::{generate_output_path, load_buffer, save_buffer};
use crate::palette::{extract_palette, reduce_palette_to_count};
use crate::scale::{
    contrast_aware, edge_priority, palette_area, sharpener, DeblurMethod, ScaleOptions,
};

const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_INVALID_ARGS: u8 = 2;

/// superpix - pixel-art-preserving image downscaler
#[derive(Parser)]
#[command(name = "spx")]
#[command(about = "superpix - pixel-art-preserving image downscaler")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    /// Seeded region growth, edges win inside each cell
    EdgePriority,
    /// Four-phase ink/background resolver
    ContrastAware,
    /// Edge-priority plus deblur and palette snap
    Sharpener,
    /// Area-majority vote against a reduced palette
    PaletteArea,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeblurArg {
    None,
    Bilateral,
    Wavelet,
}

impl From<DeblurArg> for DeblurMethod {
    fn from(arg: DeblurArg) -> Self {
        match arg {
            DeblurArg::None => DeblurMethod::None,
            DeblurArg::Bilateral => DeblurMethod::Bilateral,
            DeblurArg::Wavelet => DeblurMethod::Wavelet,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Downscale images to a target pixel grid
    Scale {
        /// Input image files or glob patterns
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Target width in pixels
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        width: u32,

        /// Target height in pixels
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        height: u32,

        /// Output file (single input) or directory.
        /// If omitted: {input}_{width}x{height}.png beside each input
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Scaling algorithm
        #[arg(long, value_enum, default_value_t = Algorithm::EdgePriority)]
        algorithm: Algorithm,

        /// Region-growth admission threshold (Manhattan RGB)
        #[arg(long)]
        threshold: Option<u32>,

        /// Deblur pass for the sharpener algorithm
        #[arg(long, value_enum)]
        deblur: Option<DeblurArg>,

        /// Bilateral smoothing strength, 0.0-1.0
        #[arg(long)]
        bilateral_strength: Option<f32>,

        /// Wavelet sharpening strength, 0.0-1.5
        #[arg(long)]
        wavelet_strength: Option<f32>,

        /// Colors kept per hue/lightness band (0 = no quantization)
        #[arg(long)]
        max_colors_per_shade: Option<usize>,

        /// Palette size for the palette-area algorithm
        #[arg(long, default_value = "16")]
        max_colors: usize,

        /// TOML file with scaling options; flags override its values
        #[arg(long)]
        options: Option<PathBuf>,

        /// Write per-phase snapshots of the contrast-aware resolver
        /// into this directory (single input only)
        #[arg(long)]
        dump_phases: Option<PathBuf>,
    },

    /// Extract and reduce an image's color palette
    Palette {
        /// Input image file
        input: PathBuf,

        /// Reduce the palette to at most this many colors
        #[arg(long)]
        max_colors: Option<usize>,

        /// Emit the palette as JSON instead of hex lines
        #[arg(long)]
        json: bool,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scale {
            inputs,
            width,
            height,
            output,
            algorithm,
            threshold,
            deblur,
            bilateral_strength,
            wavelet_strength,
            max_colors_per_shade,
            max_colors,
            options,
            dump_phases,
        } => run_scale(ScaleArgs {
            inputs,
            width,
            height,
            output,
            algorithm,
            threshold,
            deblur,
            bilateral_strength,
            wavelet_strength,
            max_colors_per_shade,
            max_colors,
            options,
            dump_phases,
        }),
        Commands::Palette { input, max_colors, json } => run_palette(&input, max_colors, json),
    }
}

struct ScaleArgs {
    inputs: Vec<String>,
    width: u32,
    height: u32,
    output: Option<PathBuf>,
    algorithm: Algorithm,
    threshold: Option<u32>,
    deblur: Option<DeblurArg>,
    bilateral_strength: Option<f32>,
    wavelet_strength: Option<f32>,
    max_colors_per_shade: Option<usize>,
    max_colors: usize,
    options: Option<PathBuf>,
    dump_phases: Option<PathBuf>,
}

/// Execute the scale command
fn run_scale(args: ScaleArgs) -> ExitCode {
    let opts = match build_options(&args) {
        Ok(o) => o,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let files = match expand_inputs(&args.inputs) {
        Ok(f) => f,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    if args.dump_phases.is_some() && files.len() > 1 {
        eprintln!("Error: --dump-phases requires a single input file");
        return ExitCode::from(EXIT_INVALID_ARGS);
    }
    if args.dump_phases.is_some() && args.algorithm != Algorithm::ContrastAware {
        eprintln!("Error: --dump-phases is only supported with --algorithm contrast-aware");
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    // Explicit non-directory output only makes sense for one input.
    if let Some(out) = &args.output {
        let is_dir = out.as_os_str().to_string_lossy().ends_with('/') || out.is_dir();
        if !is_dir && files.len() > 1 {
            eprintln!("Error: -o names a single file but {} inputs matched", files.len());
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    }

    let results: Vec<Result<PathBuf, String>> = files
        .par_iter()
        .map(|path| scale_one(path, &args, &opts).map_err(|e| format!("{}: {}", path.display(), e)))
        .collect();

    let mut failed = false;
    for result in results {
        match result {
            Ok(path) => println!("Saved: {}", path.display()),
            Err(msg) => {
                eprintln!("Error: {}", msg);
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::from(EXIT_ERROR)
    } else {
        ExitCode::from(EXIT_SUCCESS)
    }
}

/// Scale a single file and save the result, returning the output path.
fn scale_one(input: &Path, args: &ScaleArgs, opts: &ScaleOptions) -> Result<PathBuf, String> {
    let buffer = load_buffer(input).map_err(|e| e.to_string())?;

    let scaled = match args.algorithm {
        Algorithm::EdgePriority => {
            edge_priority::scale(&buffer, args.width, args.height, opts)
                .map_err(|e| e.to_string())?
        }
        Algorithm::ContrastAware => match &args.dump_phases {
            Some(dir) => {
                let mut capture_err: Option<String> = None;
                let mut capture = |phase: contrast_aware::ResolvePhase,
                                   snap: &crate::buffer::PixelBuffer| {
                    if capture_err.is_some() {
                        return;
                    }
                    let path = dir.join(format!("{}.png", phase.name()));
                    if let Err(e) = save_buffer(snap, &path) {
                        capture_err = Some(e.to_string());
                    }
                };
                let out = contrast_aware::scale_with_capture(
                    &buffer,
                    args.width,
                    args.height,
                    opts,
                    Some(&mut capture),
                )
                .map_err(|e| e.to_string())?;
                if let Some(e) = capture_err {
                    return Err(e);
                }
                out
            }
            None => contrast_aware::scale(&buffer, args.width, args.height, opts)
                .map_err(|e| e.to_string())?,
        },
        Algorithm::Sharpener => sharpener::scale(&buffer, args.width, args.height, opts)
            .map_err(|e| e.to_string())?,
        Algorithm::PaletteArea => {
            let palette =
                reduce_palette_to_count(&extract_palette(&buffer), args.max_colors);
            palette_area::scale(&buffer, args.width, args.height, &palette)
                .map_err(|e| e.to_string())?
        }
    };

    let out_path =
        generate_output_path(input, args.width, args.height, args.output.as_deref());
    save_buffer(&scaled, &out_path).map_err(|e| e.to_string())?;
    Ok(out_path)
}

/// Merge the options file (if any) with the explicit flag overrides.
fn build_options(args: &ScaleArgs) -> Result<ScaleOptions, String> {
    let mut opts = match &args.options {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read options file '{}': {}", path.display(), e))?;
            toml::from_str(&text)
                .map_err(|e| format!("invalid options file '{}': {}", path.display(), e))?
        }
        None => ScaleOptions::default(),
    };

    if let Some(t) = args.threshold {
        opts.superpixel_threshold = t;
    }
    if let Some(d) = args.deblur {
        opts.deblur_method = d.into();
    }
    if let Some(s) = args.bilateral_strength {
        opts.bilateral_strength = s;
    }
    if let Some(s) = args.wavelet_strength {
        opts.wavelet_strength = s;
    }
    if let Some(n) = args.max_colors_per_shade {
        opts.max_colors_per_shade = n;
    }

    Ok(opts)
}

/// Expand glob patterns into a sorted, de-duplicated file list.
/// Patterns with no matches are treated as literal paths so the error
/// surfaces when the file is opened.
fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>, String> {
    let mut files = Vec::new();

    for pattern in patterns {
        match glob::glob(pattern) {
            Ok(paths) => {
                let mut matched = false;
                for entry in paths {
                    let path = entry.map_err(|e| format!("cannot read '{}': {}", pattern, e))?;
                    files.push(path);
                    matched = true;
                }
                if !matched {
                    files.push(PathBuf::from(pattern));
                }
            }
            Err(_) => files.push(PathBuf::from(pattern)),
        }
    }

    files.sort();
    files.dedup();

    if files.is_empty() {
        return Err("no input files given".to_string());
    }
    Ok(files)
}

/// Execute the palette command
fn run_palette(input: &Path, max_colors: Option<usize>, json: bool) -> ExitCode {
    let buffer = match load_buffer(input) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: cannot load '{}': {}", input.display(), e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let mut palette = extract_palette(&buffer);
    if let Some(n) = max_colors {
        palette = reduce_palette_to_count(&palette, n);
    }

    if json {
        match serde_json::to_string_pretty(&palette) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: cannot serialize palette: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    } else {
        for color in &palette {
            println!("{} ({})", color.to_hex(), color.count);
        }
    }

    ExitCode::from(EXIT_SUCCESS)
}
