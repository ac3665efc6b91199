use std::io::Write;
use std::path::PathBuf;

use anyhow::{Result, Context, anyhow, bail};
use aview::{AppConfig, GenericView, ViewConfig, ViewRenderer, warn::set_trace};
use clap::Parser as ClapParser;
use serde_json::Value;

#[derive(clap::Parser, Debug)]
/// Render a view to stdout.
struct Args {
    /// Path of a template (found via the discovery roots) or, if
    /// it doesn't end in the template suffix, the markup itself.
    #[clap(required(true))]
    view: String,

    /// JSON file holding an object, the view data
    #[clap(long)]
    data: Option<PathBuf>,

    /// Discovery root, can be given multiple times; searched in the
    /// order given, before those from --config or the
    /// AVIEW_DISCOVERY_PATHS env var
    #[clap(long)]
    root: Vec<PathBuf>,

    /// JSON file with the application config
    #[clap(long)]
    config: Option<PathBuf>,

    /// HTML-escape interpolated values
    #[clap(long)]
    escape: bool,

    /// Print trace messages to stderr
    #[clap(long)]
    trace: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.trace {
        set_trace(true);
    }

    let mut app_config = match &args.config {
        Some(path) => AppConfig::from_json_file(path)?,
        None => AppConfig::from_env()?,
    };
    if !args.root.is_empty() {
        let mut roots = AppConfig::new(args.root.iter().cloned());
        roots.discovery_locations.extend(app_config.discovery_locations);
        app_config = roots;
    }

    let mut view = GenericView::new(args.view.as_str());
    if let Some(path) = &args.data {
        let s = std::fs::read_to_string(path).with_context(
            || anyhow!("reading data file {:?}", path.to_string_lossy()))?;
        match serde_json::from_str(&s).with_context(
            || anyhow!("parsing data file {:?}", path.to_string_lossy()))?
        {
            Value::Object(map) => view = view.with_data(map),
            other => bail!("data file {:?}: expecting a JSON object, got {}",
                           path.to_string_lossy(), other),
        }
    }

    let view_config = ViewConfig::default()
        .escape_interpolations(args.escape)
        .discover(&app_config)?;
    let renderer = ViewRenderer::new(app_config, view_config);
    let html = renderer.render(Some(&view))?;

    let mut outp = std::io::stdout().lock();
    writeln!(&mut outp, "{html}")?;
    outp.flush()?;
    Ok(())
}
