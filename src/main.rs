use assetpack::config::parse_extension_list;
use assetpack::fs_utils::read_file_contents;
use assetpack::lexer::{DEFAULT_LEFT_DELIM, DEFAULT_RIGHT_DELIM};
use assetpack::minify::{self, ContentType};
use assetpack::{
    BundleConfig, Delimiters, DependencyResolver, ResolveMode, Result, RunMode, TagRenderer,
    find_references, generate, locator_for,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const LONG_HELP: &str = r#"
Directives:
  //include(lib/util.js)   - Inline lib/util.js here (default delimiters)
  --left-delim '/*@' --right-delim '@*/'
                           - Use /*@lib/util.js@*/ instead

Examples:
  # Bundle ./assets into ./public and write public/assets/manifest.txt
  assetpack generate -i assets -o public
  # Only process .txt files, skip anything under vendor/
  assetpack generate -i assets -o public --extensions .txt --ignore '^vendor/'
  # Print what js/app.js pulls in, dependencies first
  assetpack deps js/app.js -i assets
  # Render development tags (live from the source tree)
  assetpack tags js/app.js -i assets --mode dev
  # Render production tags (from the manifest)
  assetpack tags css/site.css -i assets -o public --mode prod
  # List the directives of one file as JSON
  assetpack list assets/js/app.js -i assets --format json
"#;

/// Bundle, fingerprint and locate static assets that include one another.
#[derive(Parser, Debug)]
#[command(
    name = "assetpack",
    version,
    about = "Bundle, fingerprint and locate static assets that include one another.",
    after_long_help = LONG_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bundle a source tree, fingerprint the results and write the manifest
    Generate(GenerateArgs),
    /// Print the files an asset depends on, dependencies first
    Deps(DepsArgs),
    /// Render reference tags for an asset
    Tags(TagsArgs),
    /// List the directives found in a file
    List(ListArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Asset directory
    #[arg(short, long, value_name = "DIR", env = "ASSETPACK_INPUT")]
    input: PathBuf,

    /// Left delimiter for file includes
    #[arg(
        long,
        visible_alias = "ld",
        value_name = "DELIM",
        env = "ASSETPACK_LEFT_DELIM",
        default_value = DEFAULT_LEFT_DELIM,
        value_parser = non_empty
    )]
    left_delim: String,

    /// Right delimiter for file includes
    #[arg(
        long,
        visible_alias = "rd",
        value_name = "DELIM",
        env = "ASSETPACK_RIGHT_DELIM",
        default_value = DEFAULT_RIGHT_DELIM,
        value_parser = non_empty
    )]
    right_delim: String,

    /// Resolve includes relative to the including file instead of the asset directory
    #[arg(long)]
    relative_to_file: bool,
}

impl SourceArgs {
    fn delimiters(&self) -> Delimiters {
        Delimiters::new(&self.left_delim, &self.right_delim)
    }

    fn resolve_mode(&self) -> ResolveMode {
        if self.relative_to_file {
            ResolveMode::RelativeToFile
        } else {
            ResolveMode::RelativeToBase
        }
    }

    fn config(&self, output: Option<&Path>) -> BundleConfig {
        BundleConfig::new(&self.input, output.unwrap_or(&self.input))
            .with_delimiters(self.delimiters())
            .with_resolve_mode(self.resolve_mode())
    }
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Output directory (defaults to the asset directory)
    #[arg(short, long, value_name = "DIR", env = "ASSETPACK_OUTPUT")]
    output: Option<PathBuf>,

    /// Comma separated extensions of files to process
    #[arg(
        long,
        value_name = "LIST",
        env = "ASSETPACK_EXTENSIONS",
        default_value = ".js,.css",
        value_parser = extension_list
    )]
    extensions: BTreeSet<String>,

    /// Skip entries whose path (relative to the asset directory) matches this regex
    #[arg(long, value_name = "REGEX", value_parser = Regex::new)]
    ignore: Option<Regex>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "plain")]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct DepsArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Asset name, relative to the asset directory
    #[arg(value_name = "NAME")]
    name: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct TagsArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Asset name, relative to the asset directory
    #[arg(value_name = "NAME")]
    name: String,

    /// Output directory of the generation run (production mode)
    #[arg(short, long, value_name = "DIR", env = "ASSETPACK_OUTPUT")]
    output: Option<PathBuf>,

    /// Where tags point to
    #[arg(short, long, value_enum, default_value = "development")]
    mode: ModeArg,

    /// Tag kind (inferred from the name's extension when omitted)
    #[arg(short, long, value_enum)]
    kind: Option<KindArg>,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// File to scan
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// List format
    #[arg(short, long, value_enum, default_value = "plain")]
    format: ListFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// Human readable text
    Plain,
    /// JSON output for scripting
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum ListFormat {
    /// Simple list of referenced names
    Plain,
    /// Detailed information about each directive
    Detailed,
    /// JSON output for scripting
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    /// Live resolution from the source tree
    #[value(alias = "dev")]
    Development,
    /// Lookup in the manifest of the last generation run
    #[value(alias = "prod")]
    Production,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Development => RunMode::Development,
            ModeArg::Production => RunMode::Production,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    /// <script> tags
    Script,
    /// <link rel="stylesheet"> tags
    Stylesheet,
}

impl From<KindArg> for ContentType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Script => ContentType::Script,
            KindArg::Stylesheet => ContentType::Stylesheet,
        }
    }
}

#[derive(Serialize)]
struct ReferenceInfo {
    reference: String,
    start: usize,
    end: usize,
    path: String,
    exists: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Deps(args) => run_deps(args),
        Command::Tags(args) => run_tags(args),
        Command::List(args) => list_directives(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn non_empty(value: &str) -> std::result::Result<String, String> {
    if value.is_empty() {
        Err("delimiter must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

fn extension_list(value: &str) -> std::result::Result<BTreeSet<String>, String> {
    let extensions = parse_extension_list(value);
    if extensions.is_empty() {
        Err("no file extensions given".to_string())
    } else {
        Ok(extensions)
    }
}

fn run_generate(args: &GenerateArgs) -> Result<()> {
    let config = args
        .source
        .config(args.output.as_deref())
        .with_extensions(&args.extensions)
        .with_ignore(args.ignore.clone());

    let report = generate(&config, minify::registry())?;

    match args.format {
        OutputFormat::Plain => {
            println!("The following files were processed:\n");
            for record in &report.records {
                println!("  {}", record.new_path);
            }
            println!("\nManifest Generated: {}", report.manifest_path.display());
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

fn run_deps(args: &DepsArgs) -> Result<()> {
    let resolver = DependencyResolver::new(
        &args.source.input,
        args.source.delimiters(),
        args.source.resolve_mode(),
    );
    let files = resolver.resolve(&args.name)?;

    match args.format {
        OutputFormat::Plain => {
            for file in &files {
                println!("{file}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&files)?),
    }

    Ok(())
}

fn run_tags(args: &TagsArgs) -> Result<()> {
    let Some(kind) = args
        .kind
        .map(ContentType::from)
        .or_else(|| ContentType::from_path(Path::new(&args.name)))
    else {
        eprintln!(
            "[ERROR] Cannot infer tag kind for '{}'; pass --kind",
            args.name
        );
        std::process::exit(2);
    };

    let config = args.source.config(args.output.as_deref());
    let renderer = TagRenderer::new(locator_for(args.mode.into(), &config)?);
    println!("{}", renderer.render(kind, &args.name)?);

    Ok(())
}

fn list_directives(args: &ListArgs) -> Result<()> {
    let content = read_file_contents(&args.file)?;
    let references = find_references(&content, &args.source.delimiters(), &args.file)?;

    let base = match args.source.resolve_mode() {
        ResolveMode::RelativeToBase => args.source.input.clone(),
        ResolveMode::RelativeToFile => args
            .file
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
    };

    match args.format {
        ListFormat::Plain => {
            for reference in &references {
                println!("{}", reference.name);
            }
        }
        ListFormat::Detailed => {
            for reference in &references {
                let path = base.join(&reference.name);
                println!("Reference: {}", reference.name);
                println!("  Position: {}..{}", reference.start, reference.end);
                println!("  Path: {}", path.display());
                println!("  Exists: {}", if path.is_file() { "yes" } else { "no" });
                println!();
            }
        }
        ListFormat::Json => {
            let infos: Vec<ReferenceInfo> = references
                .iter()
                .map(|reference| {
                    let path = base.join(&reference.name);
                    ReferenceInfo {
                        reference: reference.name.clone(),
                        start: reference.start,
                        end: reference.end,
                        exists: path.is_file(),
                        path: path.display().to_string(),
                    }
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&infos)?);
        }
    }

    Ok(())
}
