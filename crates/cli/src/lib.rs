use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pagemark_core::persistence::{self, sidecar_path};
use pagemark_core::render::rasterize;
use pagemark_core::{
    Document, EditorConfig, EditorSession, ImageEncoding, SaveChannel, SaveOutcome,
};
use pdf_engine::{system_engine, OpenSource};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "pagemark")]
#[command(about = "Pagemark PDF annotation CLI")]
pub struct Cli {
    /// Log scheduling and export progress
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Editor configuration JSON; defaults come from PAGEMARK_* variables
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Rasterize one page to a PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Pixels per PDF point; defaults to the configured render scale
        #[arg(long)]
        scale: Option<f32>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Burn saved annotations into a new PDF.
    Flatten {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Annotation sidecar; defaults to the one next to FILE
        #[arg(long, value_name = "JSON")]
        annotations: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum)]
        format: Option<ExportFormat>,
        /// JPEG quality, 1-100
        #[arg(long, default_value_t = 90)]
        quality: u8,
        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Png,
    Jpeg,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
    has_annotations: bool,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Render { file, page, scale, output } => {
            run_render(&file, page, scale.unwrap_or(config.render_scale), output.as_deref())
        }
        Commands::Flatten { file, annotations, output, format, quality, force } => {
            let config = match format {
                Some(ExportFormat::Png) => config.with_export_encoding(ImageEncoding::Png),
                Some(ExportFormat::Jpeg) => {
                    config.with_export_encoding(ImageEncoding::Jpeg { quality })
                }
                None => config,
            };
            let mut channel = FileSaveChannel::new(&file, output, force);
            run_flatten(&file, annotations.as_deref(), config, &mut channel)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    // A second `run` in the same process keeps the first logger
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    match path {
        Some(path) => EditorConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => EditorConfig::from_env().context("invalid PAGEMARK_* environment"),
    }
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = system_engine();
    let document =
        Document::open(engine.as_mut(), OpenSource::from(file)).context("failed to open PDF")?;

    let first_page_size_pt = document
        .page_size(0)
        .map(|size| PageSizeOutput { width: size.width_pt, height: size.height_pt });

    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count: document.page_count(),
        first_page_size_pt,
        has_annotations: persistence::annotations_exist(file),
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(document.handle())?;

    Ok(())
}

fn run_render(file: &Path, page: u32, scale: f32, output: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }
    if !(scale.is_finite() && scale > 0.0) {
        anyhow::bail!("--scale must be a positive number");
    }

    let mut engine = system_engine();
    let document =
        Document::open(engine.as_mut(), OpenSource::from(file)).context("failed to open PDF")?;

    if page > document.page_count() {
        anyhow::bail!("page {page} out of range (document has {} pages)", document.page_count());
    }

    let surface = rasterize(engine.as_ref(), &document, page, scale)
        .with_context(|| format!("failed to render page {page}"))?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    let png = surface.encode(ImageEncoding::Png).context("failed to encode page")?;
    fs::write(&output, png)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    engine.close(document.handle())?;

    Ok(())
}

fn run_flatten(
    file: &Path,
    annotations: Option<&Path>,
    config: EditorConfig,
    channel: &mut dyn SaveChannel,
) -> Result<()> {
    ensure_pdf_exists(file)?;

    let set = match annotations {
        Some(path) => persistence::read_annotations(path)
            .with_context(|| format!("failed to read annotations {}", path.display()))?,
        None => persistence::load_annotations(file)
            .context("failed to read annotation sidecar")?
            .with_context(|| format!("no annotations found at {}", sidecar_path(file).display()))?,
    };

    let mut session =
        EditorSession::open(system_engine(), file, config).context("failed to open PDF")?;
    session.restore_annotations(&set).context("annotations do not fit this document")?;

    let outcome = session.save(channel).context("failed to export PDF")?;
    log::debug!("render stats: {:?}", session.stats());

    match outcome {
        SaveOutcome::Saved { location } => println!("{location}"),
        SaveOutcome::Cancelled => eprintln!("output exists; nothing written (use --force to overwrite)"),
    }

    Ok(())
}

/// Writes exported documents to disk
///
/// Without an explicit target the document's suggested name is used next to
/// the source file. An existing file is left alone unless `force` is set.
#[derive(Debug)]
pub struct FileSaveChannel {
    target: Option<PathBuf>,
    fallback_dir: PathBuf,
    force: bool,
}

impl FileSaveChannel {
    pub fn new(source: &Path, target: Option<PathBuf>, force: bool) -> Self {
        let fallback_dir = source.parent().map(Path::to_path_buf).unwrap_or_default();
        Self { target, fallback_dir, force }
    }

    fn destination(&self, suggested_name: &str) -> PathBuf {
        self.target.clone().unwrap_or_else(|| self.fallback_dir.join(suggested_name))
    }
}

impl SaveChannel for FileSaveChannel {
    fn save(&mut self, bytes: &[u8], suggested_name: &str) -> io::Result<SaveOutcome> {
        let path = self.destination(suggested_name);
        if path.exists() && !self.force {
            log::info!("{} exists; not overwriting", path.display());
            return Ok(SaveOutcome::Cancelled);
        }

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(SaveOutcome::Saved { location: path.display().to_string() })
    }

    fn progress(&mut self, done: usize, total: usize) {
        log::info!("exported {done}/{total} pages");
    }
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
