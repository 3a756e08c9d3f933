use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use treezoom_core::{
    export, human::human_count, search::find_by_label, source::load_tree, Phase, RecordId, Tree,
    TreemapConfig, TreemapView, Viewport, ZoomState,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Csv,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PhaseArg {
    Start,
    Enter,
    Update,
    Leave,
}

impl From<PhaseArg> for Phase {
    fn from(p: PhaseArg) -> Self {
        match p {
            PhaseArg::Start => Phase::Start,
            PhaseArg::Enter => Phase::Enter,
            PhaseArg::Update => Phase::Update,
            PhaseArg::Leave => Phase::Leave,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "treezoom", about = "Zoomable treemap frame generator")]
struct Args {
    /// Record file (.json or .csv)
    input: PathBuf,
    #[arg(long, default_value_t = 960.0)]
    width: f64,
    #[arg(long, default_value_t = 600.0)]
    height: f64,
    /// Deepest level shown; overrides the config file
    #[arg(short, long)]
    depth: Option<u32>,
    /// Zoom root, by id or label
    #[arg(short, long)]
    root: Option<String>,
    /// Replay a click on each target, in order
    #[arg(long = "zoom-in", value_name = "TARGET")]
    zoom_in: Vec<String>,
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,
    /// Emit transition descriptors for this phase instead of the frame (JSON only)
    #[arg(long, value_enum)]
    phase: Option<PhaseArg>,
    /// Output path; stdout when absent
    #[arg(short, long)]
    out: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Rejects flag combinations before anything touches the filesystem.
    fn validate(&self) -> anyhow::Result<()> {
        if self.phase.is_some() && matches!(self.format, Format::Csv) {
            bail!("--phase needs --format json");
        }
        Ok(())
    }
}

fn resolve(tree: &Tree, target: &str) -> anyhow::Result<RecordId> {
    find_by_label(tree, target).with_context(|| format!("no node matches {target:?}"))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    args.validate()?;
    let default = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => TreemapConfig::from_path(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => TreemapConfig::default(),
    };
    if let Some(depth) = args.depth {
        config.show_to_depth = depth;
    }

    let tree = load_tree(&args.input)
        .with_context(|| format!("loading {}", args.input.display()))?;
    let tree = Arc::new(tree);
    tracing::info!(nodes = tree.len(), "hierarchy ready");

    let viewport = Viewport::new(args.width, args.height);
    let mut view = TreemapView::with_config(tree.clone(), viewport, &config);
    if let Some(root) = &args.root {
        let id = resolve(&tree, root)?;
        view.set_zoom(ZoomState::new(Some(id), config.show_to_depth));
    }
    for target in &args.zoom_in {
        let id = resolve(&tree, target)?;
        view.zoom_in(&id);
    }

    let mut out: Box<dyn Write> = match &args.out {
        Some(path) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };

    let frame = view.frame();
    match (args.phase, args.format) {
        (Some(phase), _) => {
            let phase = Phase::from(phase);
            let entries = view.transitions(phase).unwrap_or_default();
            let json = export::transitions_to_json(&phase.to_string(), &entries);
            serde_json::to_writer_pretty(&mut out, &json)?;
            writeln!(out)?;
        }
        (None, Format::Json) => {
            serde_json::to_writer_pretty(&mut out, &export::frame_to_json(&frame))?;
            writeln!(out)?;
        }
        (None, Format::Csv) => export::frame_to_csv(&frame, &mut out)?,
    }
    out.flush()?;

    let zoom = view.zoom();
    let shown = zoom
        .root_node_id
        .as_ref()
        .and_then(|r| tree.find_node(r))
        .unwrap_or_else(|| tree.root());
    eprintln!(
        "{} cells under {} ({}), depth {}",
        frame.len(),
        shown.label(),
        human_count(shown.aggregate),
        zoom.show_to_depth
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_with_csv_fails_before_output_exists() {
        let dir = std::env::temp_dir().join(format!("treezoom-cli-{}", std::process::id()));
        let out = dir.join("frame.csv");
        let args = Args::try_parse_from([
            "treezoom",
            "records.json",
            "--phase",
            "enter",
            "--format",
            "csv",
            "--out",
            out.to_str().unwrap(),
        ])
        .unwrap();
        assert!(args.validate().is_err());
        assert!(!out.exists());
    }

    #[test]
    fn phase_with_json_is_accepted() {
        let args = Args::try_parse_from(["treezoom", "records.json", "--phase", "leave"]).unwrap();
        assert!(args.validate().is_ok());
        let args = Args::try_parse_from(["treezoom", "records.csv", "-f", "csv"]).unwrap();
        assert!(args.validate().is_ok());
    }
}
