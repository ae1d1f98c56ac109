use std::{
    cell::RefCell,
    f64::consts::PI,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    rc::Rc,
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use explanaria::{
    AnimationOptions, Area, AreaConfig, ArrayConfig, ArrayDomain, Director, DirectorConfig,
    Domain as _, FlatArrayOutput, HeadlessDeck, HistoryConfig, HistoryRecorder, LineOutput,
    Material, NavKey, NodeExt as _, NodeRef, PointConfig, PointOutput, PropertyMap, RenderLoop,
    Rgb, SurfaceConfig, SurfaceOutput, Transformation, VectorOutput, domain::drive,
};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(name = "explanaria", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a built-in scene and print its output buffers as JSON.
    Eval(EvalArgs),
    /// Replay timed key presses against the demo presentation.
    Present(PresentArgs),
}

#[derive(Parser, Debug)]
struct EvalArgs {
    #[arg(long, value_enum)]
    scene: SceneChoice,

    /// Clock time (seconds) at the last evaluated frame.
    #[arg(long, default_value_t = 0.0)]
    time: f64,

    /// Number of frames to step to reach `--time`.
    #[arg(long, default_value_t = 1)]
    frames: u64,

    #[arg(long)]
    pretty: bool,
}

#[derive(Parser, Debug)]
struct PresentArgs {
    /// JSON list of `{ "at": secs, "key": "right" }` presses.
    #[arg(long)]
    script: PathBuf,

    /// Seconds to keep running after the last press.
    #[arg(long, default_value_t = 2.0)]
    tail: f64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SceneChoice {
    Parabola,
    Helix,
    Ripple,
    Trail,
}

impl SceneChoice {
    fn name(self) -> &'static str {
        match self {
            Self::Parabola => "parabola",
            Self::Helix => "helix",
            Self::Ripple => "ripple",
            Self::Trail => "trail",
        }
    }
}

type Snapshot = Box<dyn Fn() -> serde_json::Value>;

struct Scene {
    // Keeps the tree alive; the render loop only holds a weak handle.
    _root: NodeRef,
    snapshot: Snapshot,
}

#[derive(Serialize)]
struct EvalReport {
    scene: &'static str,
    time: f64,
    frames: u64,
    outputs: serde_json::Value,
}

#[derive(Clone, Copy, Debug, Deserialize)]
struct KeyPress {
    at: f64,
    key: NavKey,
    #[serde(default)]
    repeat: bool,
}

#[derive(Serialize)]
struct PresentLogEntry {
    t: f64,
    key: NavKey,
    slide: usize,
    x: f64,
}

#[derive(Serialize)]
struct PresentReport {
    log: Vec<PresentLogEntry>,
    final_slide: usize,
    final_x: f64,
    undo_stack: Vec<&'static str>,
}

const FRAME_SECS: f64 = 1.0 / 60.0;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Eval(args) => cmd_eval(args),
        Command::Present(args) => cmd_present(args),
    }
}

fn cmd_eval(args: EvalArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.frames > 0, "--frames must be at least 1");
    anyhow::ensure!(args.time.is_finite(), "--time must be finite");

    let render_loop = RenderLoop::new();
    let scene = match args.scene {
        SceneChoice::Parabola => parabola(&render_loop)?,
        SceneChoice::Helix => helix(&render_loop)?,
        SceneChoice::Ripple => ripple(&render_loop)?,
        SceneChoice::Trail => trail(&render_loop)?,
    };
    render_loop.run_frames(args.frames, args.time / args.frames as f64);

    let report = EvalReport {
        scene: args.scene.name(),
        time: render_loop.time(),
        frames: render_loop.frame(),
        outputs: (scene.snapshot)(),
    };
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}

fn parabola(render_loop: &RenderLoop) -> anyhow::Result<Scene> {
    let area = Area::new(AreaConfig::new(vec![[-1.0, 1.0]]).num_items(11))?;
    let curve = area.add(Transformation::new(|_, t, x: &[f64]| {
        [x[0], x[0] * x[0] * t.cos(), 0.0]
    }));
    let line = curve.add(LineOutput::new(Material::default()));
    let sink = curve.add(FlatArrayOutput::new());
    area.borrow_mut().build()?;
    drive(&area, render_loop);

    Ok(Scene {
        _root: area,
        snapshot: Box::new(move || {
            serde_json::json!({
                "line": line.borrow().positions().data(),
                "values": sink.borrow().values(),
            })
        }),
    })
}

fn helix(render_loop: &RenderLoop) -> anyhow::Result<Scene> {
    let area = Area::new(AreaConfig::new(vec![[0.0, 4.0 * PI]]).num_items(48))?;
    let coil = area.add(Transformation::new(|_, t, s: &[f64]| {
        [(s[0] + t).cos(), (s[0] + t).sin(), s[0] / 8.0]
    }));
    let line = coil.add(LineOutput::new(Material {
        color: Rgb::from_hex(0x1f77b4),
        ..Material::default()
    }));
    let points = coil.add(PointOutput::new(PointConfig::default()));
    let arrow = coil.add(VectorOutput::new(Material {
        color: Rgb::from_hex(0xd62728),
        ..Material::default()
    }));
    area.borrow_mut().build()?;
    drive(&area, render_loop);

    Ok(Scene {
        _root: area,
        snapshot: Box::new(move || {
            serde_json::json!({
                "line": line.borrow().positions().data(),
                "points": points.borrow().visible_points().map(|p| p.position).collect::<Vec<_>>(),
                "arrowheads": arrow.borrow().arrowheads(),
            })
        }),
    })
}

fn ripple(render_loop: &RenderLoop) -> anyhow::Result<Scene> {
    let area = Area::new(AreaConfig::new(vec![[-1.0, 1.0], [-1.0, 1.0]]).num_items(12))?;
    let wave = area.add(Transformation::new(|_, t, p: &[f64]| {
        let r = p[0].hypot(p[1]);
        [p[0], p[1], 0.2 * (6.0 * r - 2.0 * t).sin()]
    }));
    let surface = wave.add(SurfaceOutput::new(SurfaceConfig::default()));
    area.borrow_mut().build()?;
    drive(&area, render_loop);

    Ok(Scene {
        _root: area,
        snapshot: Box::new(move || {
            let s = surface.borrow();
            serde_json::json!({
                "grid": s.grid_size(),
                "positions": s.positions().data(),
                "normals": s.normals().data(),
                "indices": s.indices().len(),
            })
        }),
    })
}

fn trail(render_loop: &RenderLoop) -> anyhow::Result<Scene> {
    let domain = ArrayDomain::new(ArrayConfig::from_scalars([0.0, 1.0]))?;
    let orbit = domain.add(Transformation::new(|_, t, phase: &[f64]| {
        let a = t + phase[0] * PI;
        [a.cos(), a.sin(), 0.0]
    }));
    let history = orbit.add(HistoryRecorder::new(
        HistoryConfig::default()
            .memory_length(10)
            .record_frame_interval(1),
    )?);
    let line = history.add(LineOutput::new(Material::default()));
    domain.borrow_mut().build()?;
    drive(&domain, render_loop);

    Ok(Scene {
        _root: domain,
        snapshot: Box::new(move || {
            serde_json::json!({
                "history_index": history.borrow().current_history_index(),
                "line": line.borrow().positions().data(),
            })
        }),
    })
}

fn read_script(path: &Path) -> anyhow::Result<Vec<KeyPress>> {
    let f = File::open(path).with_context(|| format!("open script '{}'", path.display()))?;
    let mut presses: Vec<KeyPress> =
        serde_json::from_reader(BufReader::new(f)).with_context(|| "parse script JSON")?;
    presses.sort_by(|a, b| a.at.total_cmp(&b.at));
    Ok(presses)
}

fn cmd_present(args: PresentArgs) -> anyhow::Result<()> {
    let presses = read_script(&args.script)?;
    let render_loop = RenderLoop::new();
    let director = Director::new(&render_loop, DirectorConfig::default())?;
    let deck = Rc::new(RefCell::new(HeadlessDeck::new(3)));
    director.begin(deck)?;

    let obj = Rc::new(RefCell::new(PropertyMap::new().with("x", 0.0)));
    let target = obj.clone();
    director.run(move |d| async move {
        d.transition_to(
            target.clone(),
            [("x", 1.0)],
            Duration::from_millis(500),
            AnimationOptions::default(),
        )?;
        d.next_slide().await?;
        d.transition_to(
            target,
            [("x", 2.0)],
            Duration::from_millis(500),
            AnimationOptions::default(),
        )?;
        d.next_slide().await
    })?;

    let x = || obj.borrow().number("x").unwrap_or(f64::NAN);
    let end = presses.last().map_or(0.0, |p| p.at) + args.tail.max(0.0);
    let mut pending = presses.into_iter().peekable();
    let mut log = Vec::new();
    while render_loop.time() < end {
        while let Some(press) = pending.next_if(|p| p.at <= render_loop.time()) {
            director.handle_key(press.key, press.repeat);
            log.push(PresentLogEntry {
                t: render_loop.time(),
                key: press.key,
                slide: director.current_slide_index(),
                x: x(),
            });
        }
        render_loop.step(FRAME_SECS);
    }

    let report = PresentReport {
        log,
        final_slide: director.current_slide_index(),
        final_x: x(),
        undo_stack: director.undo_stack_kinds(),
    };
    director.dispose();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
