use crate::{
    format_bytes, format_duration, save_capture, validate_config, validate_url, BrowserLauncher,
    CaptureError, CaptureResult, Config, PageCapturer, SavedFiles,
};
use anyhow::Context;
use clap::error::ErrorKind as ClapErrorKind;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::{error, info};

const RULE_WIDTH: usize = 50;

#[derive(Parser, Debug)]
#[command(name = "page-capture")]
#[command(about = "Capture a rendered web page: full-page screenshot, HTML and metadata")]
#[command(version)]
pub struct Cli {
    #[arg(help = "URL to capture (must start with http:// or https://)")]
    pub url: Option<String>,

    #[arg(long, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Root directory for captures")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, help = "Navigation timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Grace period after load in milliseconds")]
    pub settle_ms: Option<u64>,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,
}

fn rule() -> String {
    "═".repeat(RULE_WIDTH)
}

pub fn usage_text() -> String {
    let mut text = String::new();
    text.push_str(&format!("\n{}\n", rule()));
    text.push_str("PAGE CAPTURE & HTML EXTRACTION\n");
    text.push_str(&format!("{}\n", rule()));
    text.push_str("\nUsage:\n");
    text.push_str("  page-capture [OPTIONS] <url>\n");
    text.push_str("\nExamples:\n");
    text.push_str("  page-capture https://example.com\n");
    text.push_str("  page-capture https://github.com --output-dir ./snapshots\n");
    text.push_str("  page-capture https://google.com --settle-ms 5000\n");
    text.push_str("\nRun with --help for all options.\n");
    text.push_str(&format!("{}\n", rule()));
    text
}

pub fn print_usage() {
    eprintln!("{}", usage_text());
}

/// Validate the target URL argument, returning it unmodified.
pub fn parse_target_url(arg: Option<&str>) -> Result<String, CaptureError> {
    let url = arg.ok_or(CaptureError::MissingUrl)?;
    validate_url(url).map_err(|reason| CaptureError::InvalidUrl(format!("{reason} (got: {url})")))?;
    Ok(url.to_string())
}

pub async fn load_config(args: &Cli) -> Result<Config, CaptureError> {
    let mut config = if let Some(config_path) = &args.config {
        let config_content = fs::read_to_string(config_path).await.map_err(|e| {
            CaptureError::ConfigurationError(format!("{}: {e}", config_path.display()))
        })?;
        serde_json::from_str(&config_content).map_err(|e| {
            CaptureError::ConfigurationError(format!("{}: {e}", config_path.display()))
        })?
    } else {
        Config::default()
    };

    if let Some(output_dir) = &args.output_dir {
        config.output_dir = output_dir.clone();
    }

    if let Some(timeout) = args.timeout {
        config.navigation_timeout = Duration::from_secs(timeout);
    }

    if let Some(settle_ms) = args.settle_ms {
        config.settle_delay = Duration::from_millis(settle_ms);
    }

    if let Some(chrome_path) = &args.chrome_path {
        config.chrome_path = Some(chrome_path.clone());
    }

    validate_config(&config)?;

    info!("Output directory: {}", config.output_dir.display());
    info!("Navigation timeout: {:?}", config.navigation_timeout);
    info!("Settle delay: {:?}", config.settle_delay);

    Ok(config)
}

pub fn format_results(result: &CaptureResult) -> String {
    let info = &result.page_info;
    let mut text = String::new();
    text.push_str(&format!("{}\nCAPTURE RESULTS\n{}\n\n", rule(), rule()));
    text.push_str(&format!("URL: {}\n", result.url));
    text.push_str(&format!("Title: {}\n", result.title));
    text.push_str(&format!("Timestamp: {}\n", result.timestamp_iso()));
    text.push_str("Page Dimensions:\n");
    text.push_str(&format!("   - Viewport: {}x{}px\n", info.width, info.height));
    text.push_str(&format!(
        "   - Document: {}x{}px\n",
        info.document_width, info.document_height
    ));
    text.push_str(&format!(
        "HTML Size: {} bytes ({})\n",
        result.html.len(),
        format_bytes(result.html.len())
    ));
    text.push_str(&format!(
        "Screenshot Size: {}\n",
        format_bytes(result.screenshot.len())
    ));
    text.push_str(&format!("Duration: {}\n", format_duration(result.duration)));
    text
}

pub fn format_saved(saved: &SavedFiles) -> String {
    let mut text = String::new();
    text.push_str(&format!("{}\nCAPTURE COMPLETE!\n{}\n\n", rule(), rule()));
    text.push_str(&format!("Domain folder: {}\n", saved.domain_folder.display()));
    text.push_str("\nFiles saved:\n");
    text.push_str(&format!("  • Screenshot: {}\n", saved.screenshot.display()));
    text.push_str(&format!("  • HTML: {}\n", saved.html.display()));
    text.push_str(&format!("  • Metadata: {}\n", saved.metadata.display()));
    text
}

pub struct CliRunner<L: BrowserLauncher> {
    pub config: Config,
    capturer: PageCapturer<L>,
}

impl<L: BrowserLauncher> CliRunner<L> {
    pub fn with_launcher(config: Config, launcher: L) -> Self {
        Self {
            capturer: PageCapturer::new(launcher, config.clone()),
            config,
        }
    }

    /// Capture `url`, print the summary and persist the artifacts.
    pub async fn run(&self, url: &str) -> anyhow::Result<SavedFiles> {
        println!("{}", rule());
        println!("PAGE CAPTURE & HTML EXTRACTION");
        println!("{}\n", rule());
        println!("Target URL: {url}\n");

        let result = self
            .capturer
            .capture(url)
            .await
            .with_context(|| format!("capturing {url}"))?;

        println!("{}", format_results(&result));

        let saved = save_capture(&result, &self.config.output_dir)
            .await
            .with_context(|| format!("saving capture under {}", self.config.output_dir.display()))?;

        println!("{}", format_saved(&saved));

        Ok(saved)
    }
}

/// Exit status for an argument-parsing outcome: 0 for `--help` and
/// `--version`, 1 for every usage error.
pub fn usage_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

/// Whole program: parse `args`, validate the URL before anything starts,
/// then capture and save. Returns the process exit status.
pub async fn run_main<I, T, L, F>(args: I, make_launcher: F) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    L: BrowserLauncher,
    F: FnOnce(&Config) -> L,
{
    let args = match Cli::try_parse_from(args) {
        Ok(args) => args,
        Err(e) => {
            let code = usage_exit_code(&e);
            let _ = e.print();
            if code != 0 {
                print_usage();
            }
            return code;
        }
    };

    let url = match parse_target_url(args.url.as_deref()) {
        Ok(url) => url,
        Err(e) => {
            eprintln!("Error: {e}");
            print_usage();
            return 1;
        }
    };

    if let Err(e) = setup_logging(args.verbose) {
        eprintln!("Warning: {e:#}");
    }

    info!("Starting page-capture v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&args).await {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            eprintln!("Error: {e}");
            return 1;
        }
    };

    let runner = CliRunner::with_launcher(config.clone(), make_launcher(&config));
    if let Err(e) = runner.run(&url).await {
        error!("Capture failed: {:#}", e);
        eprintln!("Error: {e:#}");
        return 1;
    }

    info!("page-capture finished");
    0
}

pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))?;

    Ok(())
}
