//! pathpass CLI - render the demo scene and inspect sampling sequences.

mod output;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use pathpass::prelude::*;
use pathpass::sequence::{lens_samples, sample_points};

const BUILD_DATE: &str = env!("PATHPASS_BUILD_DATE");
const BUILD_TIME: &str = env!("PATHPASS_BUILD_TIME");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }

    let _trace_guard = init_tracing(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let result = match filtered_args[0] {
        "r" | "render" => cmd_render(&filtered_args[1..]),
        "s" | "sequence" => cmd_sequence(&filtered_args[1..]),
        "c" | "config" => cmd_config(&filtered_args[1..]),
        "h" | "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        "--version" | "version" => {
            println!("pathpass {} (built {} {})", env!("CARGO_PKG_VERSION"), BUILD_DATE, BUILD_TIME);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Run 'pathpass-cli help' for usage");
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// fmt subscriber on stderr, plus a chrome trace when `PATHPASS_TRACE=1`.
fn init_tracing(level: &str) -> Option<tracing_chrome::FlushGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pathpass={0},pathpass_cli={0}", level)));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (chrome_layer, guard) = if std::env::var("PATHPASS_TRACE").ok().as_deref() == Some("1") {
        let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
            .file("trace.json")
            .build();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(chrome_layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    guard
}

fn print_help() {
    println!("pathpass-cli - progressive path tracing toolkit");
    println!("built {} {}", BUILD_DATE, BUILD_TIME);
    println!();
    println!("USAGE:");
    println!("    pathpass-cli [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    r, render   -o <out.hdr|out.exr> [flags]   Render the demo scene");
    println!("    s, sequence <mode> <count> [index] [--lens <bokeh>]");
    println!("                                             Print a generated point set");
    println!("    c, config   [--config FILE] [--save]     Print effective configuration as JSON");
    println!("    h, help                                  Show this help");
    println!();
    println!("RENDER FLAGS:");
    println!("    --width W, --height H     Frame size (default from config)");
    println!("    --passes N                Samples per pixel (max_render_passes)");
    println!("    --mode M                  random | halton | hammersley | blue_noise | sobol");
    println!("    --bokeh B                 circular | polygon | polygon:N");
    println!("    --aperture A              Lens radius (0 = pinhole)");
    println!("    --interactive             Spread each sample over the interactive block");
    println!("    --batch                   One full-frame sample per pass");
    println!("    --config FILE             Load settings from FILE instead of the default");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!();
    println!("EXAMPLES:");
    println!("    pathpass-cli render -o demo.exr --passes 64");
    println!("    pathpass-cli render -o demo.hdr --mode sobol --aperture 0.1 --bokeh polygon:5");
    println!("    pathpass-cli sequence halton 16 0");
    println!("    pathpass-cli sequence blue_noise 32 3 --lens circular");
    println!();
    println!("NOTES:");
    println!("    - RUST_LOG overrides -v/-q");
    println!("    - PATHPASS_TRACE=1 writes a chrome trace to trace.json");
}

/// Value following `flag`, if present.
fn flag_value<'a>(args: &[&'a str], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|&a| a == flag)
        .and_then(|i| args.get(i + 1).copied())
}

fn parse_flag<T: std::str::FromStr>(args: &[&str], flag: &str) -> Result<Option<T>> {
    match flag_value(args, flag) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("invalid value for {}: '{}'", flag, v)),
        None => Ok(None),
    }
}

fn load_config(args: &[&str]) -> Result<SchedulerConfig> {
    match flag_value(args, "--config") {
        Some(path) => SchedulerConfig::load_from(&PathBuf::from(path))
            .with_context(|| format!("loading config {}", path)),
        None => Ok(SchedulerConfig::load()),
    }
}

/// Override config values with the render flags that are present.
fn apply_render_flags(config: &mut SchedulerConfig, args: &[&str]) -> Result<()> {
    if let Some(w) = parse_flag(args, "--width")? {
        config.width = w;
    }
    if let Some(h) = parse_flag(args, "--height")? {
        config.height = h;
    }
    if let Some(n) = parse_flag(args, "--passes")? {
        config.options.max_render_passes = n;
    }
    if let Some(m) = flag_value(args, "--mode") {
        config.options.sample_mode =
            SampleMode::parse(m).with_context(|| format!("unknown sample mode '{}'", m))?;
    }
    if let Some(b) = flag_value(args, "--bokeh") {
        config.options.bokeh_shape =
            BokehShape::parse(b).with_context(|| format!("unknown bokeh shape '{}'", b))?;
    }
    if let Some(a) = parse_flag(args, "--aperture")? {
        config.options.camera.aperture = a;
    }
    match (args.contains(&"--interactive"), args.contains(&"--batch")) {
        (true, true) => bail!("--interactive and --batch are mutually exclusive"),
        (true, false) => config.options.enable_interactive_mode = true,
        (false, true) => config.options.enable_interactive_mode = false,
        (false, false) => {}
    }
    Ok(())
}

/// Render calls needed to reach `max_render_passes` samples per pixel.
fn total_passes(options: &RenderOptions) -> Result<u32> {
    let per_sample = if options.enable_interactive_mode {
        let block = options.interactive_block_size;
        block.x.checked_mul(block.y)
    } else {
        Some(1)
    };
    per_sample
        .and_then(|n| n.checked_mul(options.max_render_passes))
        .with_context(|| {
            format!(
                "{} samples over a {}x{} block is too many passes",
                options.max_render_passes,
                options.interactive_block_size.x,
                options.interactive_block_size.y
            )
        })
}

fn cmd_render(args: &[&str]) -> Result<()> {
    let out = flag_value(args, "-o")
        .or_else(|| flag_value(args, "--output"))
        .map(PathBuf::from)
        .context("missing output file (-o out.exr)")?;
    output::check_extension(&out)?;

    let mut config = load_config(args)?;
    apply_render_flags(&mut config, args)?;
    config.validate()?;

    let options = config.options;
    let total_passes = total_passes(&options)?;

    tracing::info!(
        "rendering {}x{}, {} samples ({:?}, {} passes)",
        config.width,
        config.height,
        options.max_render_passes,
        options.sample_mode,
        total_passes
    );

    let start = Instant::now();
    let scheduler = PassScheduler::with_config(CpuBackend::new(), &config);
    scheduler.init(config.width, config.height);
    scheduler.load_scene(true, demo_scene);

    let latest: Arc<Mutex<Option<PassResult>>> = Arc::new(Mutex::new(None));
    for _ in 0..total_passes {
        let latest = Arc::clone(&latest);
        scheduler.render_pass(options, move |result| {
            if result.block_pixel == pathpass::util::UVec2::ZERO {
                tracing::debug!(
                    "sample {} ({:.1} ms)",
                    result.sample_index,
                    result.pass_time_seconds * 1000.0
                );
            }
            *latest.lock() = Some(result);
        });
    }
    scheduler.finish();

    if scheduler.state() == SchedulerState::Destroyed {
        bail!("renderer failed; see log for details");
    }
    scheduler.shutdown();

    let result = latest.lock().take().context("no pass completed")?;
    tracing::info!(
        "{} samples/pixel in {:.2}s",
        result.pixels.min_samples(),
        start.elapsed().as_secs_f64()
    );

    output::write_image(&out, &result.pixels)?;
    tracing::info!("wrote {}", out.display());
    Ok(())
}

fn cmd_sequence(args: &[&str]) -> Result<()> {
    let positional: Vec<&str> = {
        let mut v = Vec::new();
        let mut skip = false;
        for &a in args {
            if skip {
                skip = false;
                continue;
            }
            if a == "--lens" {
                skip = true;
                continue;
            }
            v.push(a);
        }
        v
    };
    if positional.len() < 2 {
        bail!("usage: pathpass-cli sequence <mode> <count> [index] [--lens <bokeh>]");
    }

    let mode = SampleMode::parse(positional[0])
        .with_context(|| format!("unknown sample mode '{}'", positional[0]))?;
    let count: usize = positional[1]
        .parse()
        .with_context(|| format!("invalid count '{}'", positional[1]))?;
    let index: u32 = match positional.get(2) {
        Some(s) => s.parse().with_context(|| format!("invalid index '{}'", s))?,
        None => 0,
    };
    if index >= pathpass::scheduler::MAX_SEQUENCES {
        bail!(
            "sequence index must be below {}",
            pathpass::scheduler::MAX_SEQUENCES
        );
    }

    let points = match flag_value(args, "--lens") {
        Some(b) => {
            let shape =
                BokehShape::parse(b).with_context(|| format!("unknown bokeh shape '{}'", b))?;
            if let BokehShape::Polygon(sides) = shape {
                if sides < 3 {
                    bail!("polygonal bokeh needs at least 3 sides");
                }
            }
            lens_samples(count, index, shape)
        }
        None => sample_points(mode, count, index),
    };

    tracing::debug!("{} {} points, sequence {}", count, mode.name(), index);
    for (i, p) in points.iter().enumerate() {
        println!("{:5}  {:.6}  {:.6}", i, p.x, p.y);
    }
    Ok(())
}

fn cmd_config(args: &[&str]) -> Result<()> {
    let config = load_config(args)?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    if args.contains(&"--save") {
        config.save()?;
        if let Some(path) = SchedulerConfig::default_path() {
            tracing::info!("saved {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathpass::util::UVec2;

    #[test]
    fn test_mode_flags_override_config() {
        let mut config = SchedulerConfig::default();
        assert!(config.options.enable_interactive_mode);

        apply_render_flags(&mut config, &["--passes", "32"]).unwrap();
        assert!(config.options.enable_interactive_mode);
        assert_eq!(config.options.max_render_passes, 32);

        apply_render_flags(&mut config, &["--batch"]).unwrap();
        assert!(!config.options.enable_interactive_mode);

        apply_render_flags(&mut config, &["--interactive"]).unwrap();
        assert!(config.options.enable_interactive_mode);

        assert!(apply_render_flags(&mut config, &["--batch", "--interactive"]).is_err());
        assert!(apply_render_flags(&mut config, &["--passes", "many"]).is_err());
    }

    #[test]
    fn test_total_passes() {
        let mut options = RenderOptions {
            max_render_passes: 64,
            interactive_block_size: UVec2::new(5, 5),
            ..Default::default()
        };
        assert_eq!(total_passes(&options).unwrap(), 64 * 25);

        options.enable_interactive_mode = false;
        assert_eq!(total_passes(&options).unwrap(), 64);

        options.enable_interactive_mode = true;
        options.max_render_passes = 200_000_000;
        assert!(total_passes(&options).is_err());

        options.max_render_passes = 1;
        options.interactive_block_size = UVec2::new(u32::MAX, 2);
        assert!(total_passes(&options).is_err());
    }
}
