use clap::{Parser, Subcommand};
use deferred_images::filters::FilterTable;
use deferred_images::process::Processor;
use deferred_images::{config, output, site};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deferred-images")]
#[command(about = "Deferred, fingerprint-cached image builds for static sites")]
#[command(long_about = "\
Deferred, fingerprint-cached image builds for static sites

Templates emit placeholders instead of image URLs. After the site is
rendered, this tool builds every referenced image once and rewrites the
pages to point at the results.

Placeholder format (emitted by the get_url shortcode):

  <!--SHARP_IMAGE {\"inputPath\":\"/photos/dawn.jpg\",\"operations\":[...]}-->/img/dawn-<hash>.avif

Output layout:

  _site/img/
  ├── dawn-<hash>.avif       # <name>-<fingerprint>.<ext>
  └── logo-<hash>.png

An artifact that already exists is reused as-is, so keeping the output
directory between builds makes them incremental.

Run 'deferred-images gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    /// Config file (stock defaults apply when it doesn't exist)
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build images and substitute placeholders in a rendered site
    Process {
        /// Rendered site directory
        site_dir: PathBuf,
    },
    /// Print the placeholder and final URL for an image, without building it
    Url {
        /// Image path ("/..." resolves against input_root)
        input: String,
        /// Operation to append, in order: NAME or NAME=JSON-ARGS
        #[arg(long = "op", value_name = "NAME[=JSON]")]
        ops: Vec<String>,
    },
    /// Delete every built image and recreate the output directory
    Clean,
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Process { site_dir } => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_build_event(&event);
                }
            });
            let processor = Processor::new(config).with_events(tx);
            let result = site::process_site(&processor, &site_dir);
            let stats = processor.stats();
            drop(processor);
            printer.join().map_err(|_| "output thread panicked")?;
            let report = result?;
            output::print_site_report(&report, &stats);
        }
        Command::Url { input, ops } => {
            let config = config::load_config(&cli.config)?;
            let processor = Processor::new(config);
            let filters = FilterTable::new(&processor);
            let mut descriptor = filters.image(input);
            for op in &ops {
                let (name, args) = parse_op(op)?;
                descriptor = filters.apply(name, descriptor, args)?;
            }
            let placeholder = filters.get_url(&descriptor)?;
            let target = processor.target(&processor.finalize(&descriptor))?;
            output::print_url_output(&placeholder, &target);
        }
        Command::Clean => {
            let config = config::load_config(&cli.config)?;
            let processor = Processor::new(config);
            processor.clear_output_dir()?;
            println!("Cleared {}", processor.config().output_dir.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Split `NAME=JSON` into a filter name and positional arguments.
///
/// A JSON array supplies all arguments; any other value is the only one.
fn parse_op(op: &str) -> Result<(&str, Vec<Value>), serde_json::Error> {
    let Some((name, json)) = op.split_once('=') else {
        return Ok((op, Vec::new()));
    };
    let args = match serde_json::from_str::<Value>(json)? {
        Value::Array(args) => args,
        single => vec![single],
    };
    Ok((name, args))
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
