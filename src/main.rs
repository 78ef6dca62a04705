use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tablesnap::{SaveOptions, Table, Viewport, WebDriver};

/// Export tables described as JSON to HTML, images or PDF.
#[derive(Parser)]
#[command(name = "tablesnap", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the table's HTML
    Html {
        /// Table definition (JSON)
        table: PathBuf,
        /// Emit a complete HTML document
        #[arg(long)]
        make_page: bool,
        /// Mark every CSS declaration !important
        #[arg(long)]
        all_important: bool,
    },
    /// Screenshot the table and write an image or PDF
    Save(SaveArgs),
}

#[derive(Args)]
struct SaveArgs {
    /// Table definition (JSON)
    table: PathBuf,
    /// Output file; the extension picks the format (.png when omitted)
    output: PathBuf,
    #[arg(long, default_value = "table")]
    selector: String,
    #[arg(long, default_value_t = 1.0)]
    scale: f64,
    #[arg(long, default_value_t = 5)]
    expand: u32,
    #[arg(long, default_value = "chrome", value_parser = parse_driver)]
    web_driver: WebDriver,
    /// Browser window size as WIDTHxHEIGHT
    #[arg(long, default_value = "6000x6000", value_parser = parse_viewport)]
    window_size: Viewport,
    #[arg(long, default_value_t = 30000)]
    timeout_ms: u64,
    #[arg(long)]
    chrome_path: Option<PathBuf>,
    #[arg(long)]
    driver_path: Option<PathBuf>,
    /// Connect to a running WebDriver server instead of spawning one
    #[arg(long)]
    webdriver_url: Option<String>,
}

impl From<SaveArgs> for SaveOptions {
    fn from(a: SaveArgs) -> Self {
        SaveOptions {
            selector: a.selector,
            scale: a.scale,
            expand: a.expand,
            web_driver: a.web_driver,
            window_size: a.window_size,
            timeout_ms: a.timeout_ms,
            chrome_path: a.chrome_path,
            driver_path: a.driver_path,
            webdriver_url: a.webdriver_url,
        }
    }
}

fn parse_driver(s: &str) -> std::result::Result<WebDriver, String> {
    s.parse().map_err(|e: tablesnap::Error| e.to_string())
}

fn parse_viewport(s: &str) -> std::result::Result<Viewport, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let width = w.trim().parse().map_err(|e| format!("bad width '{}': {}", w, e))?;
    let height = h.trim().parse().map_err(|e| format!("bad height '{}': {}", h, e))?;
    Ok(Viewport { width, height })
}

fn load_table(path: &Path) -> Result<Table> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid table JSON in {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match Cli::parse().command {
        Command::Html {
            table,
            make_page,
            all_important,
        } => {
            let table = load_table(&table)?;
            print!("{}", tablesnap::as_raw_html(&table, make_page, all_important));
        }
        Command::Save(args) => {
            let table = load_table(&args.table)?;
            let output = args.output.clone();
            let options = SaveOptions::from(args);
            let written = tablesnap::save(&table, &output, &options)
                .with_context(|| format!("failed to save {}", output.display()))?;
            println!("{}", written.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_parses_both_separators() {
        assert_eq!(parse_viewport("800x600").unwrap(), Viewport { width: 800, height: 600 });
        assert_eq!(parse_viewport("10X20").unwrap(), Viewport { width: 10, height: 20 });
        assert!(parse_viewport("800").is_err());
    }

    #[test]
    fn driver_names_parse() {
        assert_eq!(parse_driver("edge").unwrap(), WebDriver::Edge);
        assert!(parse_driver("opera").unwrap_err().contains("opera"));
    }

    #[test]
    fn cli_defaults_match_library_defaults() {
        let cli = Cli::try_parse_from(["tablesnap", "save", "t.json", "out"]).unwrap();
        let Command::Save(args) = cli.command else {
            panic!("expected save");
        };
        assert_eq!(SaveOptions::from(args), SaveOptions::default());
    }
}
