use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use lottie_model::Document;
use lottie_scene::animatable::color_to_hex;
use lottie_scene::{DrawCommand, DrawContent, Scene};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the animation JSON
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// First frame to evaluate
    #[arg(long, default_value_t = 0.0)]
    from: f32,

    /// Last frame to evaluate (defaults to the document's out point)
    #[arg(long)]
    to: Option<f32>,

    /// Distance between evaluated frames
    #[arg(long, default_value_t = 1.0)]
    step: f32,

    /// Output format for frame summaries
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum OutputFormat {
    /// One JSON object per line
    Json,
    /// Indented JSON, one object per frame
    Pretty,
}

#[derive(Serialize, Debug)]
struct FrameSummary {
    frame: f32,
    active_nodes: usize,
    applied_masks: usize,
    commands: Vec<CommandSummary>,
}

#[derive(Serialize, Debug)]
struct CommandSummary {
    name: Option<String>,
    kind: &'static str,
    /// World-space `[x0, y0, x1, y1]`.
    bounds: [f64; 4],
    alpha: f32,
    masked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    fill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stroke: Option<String>,
}

impl From<&DrawCommand> for CommandSummary {
    fn from(cmd: &DrawCommand) -> Self {
        let bounds = cmd.world_bounds();
        let hex = |color| format!("#{:06x}", color_to_hex(color));
        let (kind, fill, stroke) = match &cmd.content {
            DrawContent::Shape(shape) => (
                "shape",
                shape.fill.as_ref().map(|f| hex(f.color)),
                shape.stroke.as_ref().map(|s| hex(s.color)),
            ),
            DrawContent::Image(_) => ("image", None, None),
        };
        CommandSummary {
            name: cmd.name.clone(),
            kind,
            bounds: [bounds.x0, bounds.y0, bounds.x1, bounds.y1],
            alpha: cmd.alpha,
            masked: cmd.masked,
            fill,
            stroke,
        }
    }
}

fn summarize(scene: &Scene, frame: f32) -> FrameSummary {
    let state = scene.evaluate_frame(frame);
    let commands = scene
        .render_tree(&state)
        .draw_list()
        .iter()
        .map(CommandSummary::from)
        .collect();
    FrameSummary {
        frame,
        active_nodes: state.nodes.iter().filter(|n| n.active).count(),
        applied_masks: state.applied_masks(),
        commands,
    }
}

fn frame_range(scene: &Scene, from: f32, to: Option<f32>, step: f32) -> Result<Vec<f32>> {
    ensure!(step > 0.0, "--step must be positive, got {}", step);
    let from = scene.check_frame(from)?;
    let to = scene.check_frame(to.unwrap_or_else(|| scene.total_frames()))?;
    if to < from {
        warn!(from, to, "empty frame range");
        return Ok(Vec::new());
    }
    let count = ((to - from) / step).floor() as usize + 1;
    Ok((0..count).map(|i| from + i as f32 * step).collect())
}

fn run(cli: &Cli) -> Result<()> {
    let file = File::open(&cli.input).with_context(|| format!("opening {:?}", cli.input))?;
    let doc = Document::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {:?}", cli.input))?;

    let scene = Scene::build(&doc).context("resolving scene")?;
    info!(
        "[Frames] {}x{} @ {} fps, {} frames, {} nodes",
        scene.width,
        scene.height,
        scene.frame_rate,
        scene.total_frames(),
        scene.len()
    );

    let frames = frame_range(&scene, cli.from, cli.to, cli.step)?;
    let started = Instant::now();
    let summaries: Vec<FrameSummary> = frames.par_iter().map(|&f| summarize(&scene, f)).collect();
    info!(
        "[Frames] evaluated {} frames in {:?}",
        summaries.len(),
        started.elapsed()
    );

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for summary in &summaries {
        match cli.format {
            OutputFormat::Json => serde_json::to_writer(&mut out, summary)?,
            OutputFormat::Pretty => serde_json::to_writer_pretty(&mut out, summary)?,
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(cli.log_level).into())
        .from_env_lossy();

    let subscriber_builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match cli.log_format {
        LogFormat::Json => subscriber_builder.json().init(),
        LogFormat::Pretty => subscriber_builder.pretty().init(),
    }

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
