use std::path::{Path, PathBuf};

use cascade::{CascadingFinder, Loader, Settings, Templates, ViewLoader, VIEWS};
use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use serde_json::Value as JsonValue;

#[derive(Parser, Debug)]
#[clap(name = "cascade", about, version)]
struct Args {
    /// Increase output logging verbosity.
    #[clap(short, long)]
    verbose: bool,

    /// Settings file describing root paths, extension and loader options.
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Root path(s) to search, highest priority first. Searched before any
    /// root paths from the settings file.
    #[clap(short, long = "path")]
    paths: Vec<PathBuf>,

    /// Default template file extension.
    #[clap(short, long)]
    extension: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the source of a template.
    Source { name: String },
    /// Print the cache key (resolved path) of a template.
    Key { name: String },
    /// Print whether a template is unmodified since the given Unix timestamp.
    Fresh { name: String, timestamp: u64 },
    /// Render a template.
    Render {
        name: String,
        /// JSON or YAML file with the data to render.
        #[clap(short, long)]
        data: Option<PathBuf>,
        /// Template(s) to register as partials before rendering.
        #[clap(long = "partial")]
        partials: Vec<String>,
    },
    /// List all views visible through the cascade.
    List,
}

fn main() {
    let args = Args::parse();
    simple_logger::init_with_level(if args.verbose {
        log::Level::Debug
    } else {
        log::Level::Info
    })
    .unwrap();

    if let Err(e) = run(args) {
        log::error!("Failed: {:?}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let finder = CascadingFinder::new(args.paths.iter().chain(settings.paths.iter()))?;
    if finder.roots().is_empty() {
        log::warn!("No root paths to search");
    }

    let loader = ViewLoader::new(finder)
        .with_extension(args.extension.or(settings.extension).unwrap_or_default())
        .with_options(settings.options);

    match args.command {
        Command::Source { name } => print!("{}", loader.source(&name)?),
        Command::Key { name } => println!("{}", loader.cache_key(&name)?),
        Command::Fresh { name, timestamp } => println!("{}", loader.is_fresh(&name, timestamp)?),
        Command::Render {
            name,
            data,
            partials,
        } => {
            let data = match data {
                Some(path) => load_data(&path)?,
                None => JsonValue::Object(Default::default()),
            };
            let mut templates = Templates::new(&loader);
            for partial in &partials {
                templates.register_partial(partial)?;
            }
            print!("{}", templates.render(&name, &data)?);
        }
        Command::List => {
            for (name, path) in loader.finder().list_files(VIEWS)? {
                println!("{}\t{}", name, path.display());
            }
        }
    }
    Ok(())
}

fn load_data(path: &Path) -> Result<JsonValue> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read data file {}", path.display()))?;
    let value = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };
    Ok(value)
}
