use std::path::{Path, PathBuf};
use std::process::ExitCode;

use meshflow_core::{
    BuiltinNodeKind, Generator, GeneratorConfig, Mesh, NodeId, ParamValue, PinType, Project,
    SceneSnapshot, Severity,
};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

const BASE_COLOR: [f32; 3] = [0.7, 0.72, 0.75];

#[derive(Debug)]
struct CliArgs {
    project_path: Option<PathBuf>,
    save_path: Option<PathBuf>,
    mesh_path: Option<PathBuf>,
    print: bool,
    log_level: LevelFilter,
    help: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            project_path: None,
            save_path: None,
            mesh_path: None,
            print: false,
            log_level: LevelFilter::INFO,
            help: false,
        }
    }
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut parsed = CliArgs::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match arg.as_str() {
            "--project" => parsed.project_path = Some(PathBuf::from(value("--project")?)),
            "--save" => parsed.save_path = Some(PathBuf::from(value("--save")?)),
            "--mesh-out" => parsed.mesh_path = Some(PathBuf::from(value("--mesh-out")?)),
            "--log-level" => {
                let level = value("--log-level")?;
                parsed.log_level = level
                    .parse()
                    .map_err(|_| format!("unknown log level `{level}`"))?;
            }
            "--print" => parsed.print = true,
            "--help" | "-h" => parsed.help = true,
            other => return Err(format!("unknown argument `{other}`")),
        }
    }

    Ok(parsed)
}

fn print_help() {
    println!(
        "meshflow: evaluate a procedural geometry graph\n\n\
         Options:\n  \
         --project <path>    load a project file instead of the demo graph\n  \
         --save <path>       write the project as JSON\n  \
         --mesh-out <path>   write the resulting mesh as JSON\n  \
         --print             print node previews and a scene summary\n  \
         --log-level <lvl>   off, error, warn, info, debug or trace\n  \
         --help              show this message"
    );
}

fn init_tracing(level: LevelFilter) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(level))
        .init();
}

/// Rectangle outline with an octagonal hole, capped at both ends.
fn demo_generator() -> Result<Generator, String> {
    let mut generator = Generator::new(GeneratorConfig::default());
    let outer = generator.add_builtin(BuiltinNodeKind::ShapeVolume);
    let hole = generator.add_builtin(BuiltinNodeKind::ShapeVolume);
    let caps = generator.add_builtin(BuiltinNodeKind::VolumeCaps);

    let params = [
        (outer, "size", ParamValue::Vec2([4.0, 2.0])),
        (outer, "length", ParamValue::Float(3.0)),
        (hole, "shape", ParamValue::Text("polygon".to_string())),
        (hole, "sides", ParamValue::Int(8)),
        (hole, "length", ParamValue::Float(3.0)),
    ];
    for (node, name, value) in params {
        generator
            .set_param(node, name, value)
            .map_err(|err| err.to_string())?;
    }
    generator
        .connect_by_name(outer, "volume", caps, "volume")
        .map_err(|err| err.to_string())?;
    generator
        .connect_by_name(hole, "volume", caps, "holes")
        .map_err(|err| err.to_string())?;
    Ok(generator)
}

fn load_project(path: &Path) -> Result<Generator, String> {
    let data = std::fs::read(path).map_err(|err| format!("{}: {err}", path.display()))?;
    let project: Project = serde_json::from_slice(&data).map_err(|err| err.to_string())?;
    let (generator, keys) = project.build().map_err(|err| err.to_string())?;
    tracing::info!(nodes = keys.len(), "loaded project from {:?}", path);
    Ok(generator)
}

fn write_json<T: serde::Serialize>(value: &T, path: &Path) -> Result<(), String> {
    let data = serde_json::to_vec_pretty(value).map_err(|err| err.to_string())?;
    std::fs::write(path, data).map_err(|err| format!("{}: {err}", path.display()))
}

/// Mesh outputs nothing else consumes.
fn mesh_sinks(generator: &Generator) -> Vec<NodeId> {
    let graph = generator.graph();
    graph
        .nodes()
        .filter(|node| {
            node.outputs.iter().any(|pin_id| {
                graph
                    .pin(*pin_id)
                    .is_some_and(|pin| pin.pin_type == PinType::Mesh)
            }) && graph.downstream_nodes(node.id).is_empty()
        })
        .map(|node| node.id)
        .collect()
}

fn collect_mesh(generator: &Generator) -> Mesh {
    let mut mesh = Mesh::new();
    for node in mesh_sinks(generator) {
        if let Some(output) = generator.output(node, 0).as_mesh() {
            mesh.append(output);
        }
    }
    mesh
}

fn run(args: &CliArgs) -> Result<bool, String> {
    let mut generator = match &args.project_path {
        Some(path) => load_project(path)?,
        None => demo_generator()?,
    };

    if let Some(path) = &args.save_path {
        write_json(&Project::from_generator(&generator), path)?;
        tracing::info!("saved project to {:?}", path);
    }

    let report = generator
        .request_refresh()
        .map_err(|err| err.to_string())?;
    tracing::info!(
        computed = report.computed.len(),
        disabled = report.disabled.len(),
        cache_hits = report.cache_hits,
        cache_misses = report.cache_misses,
        errors = report.errors.len(),
        "refresh finished in {:.2} ms",
        report.duration_ms
    );

    let diagnostics = generator.take_diagnostics();
    let failed = diagnostics
        .iter()
        .any(|diagnostic| diagnostic.severity == Severity::Error);

    let mesh = collect_mesh(&generator);
    if let Some(path) = &args.mesh_path {
        write_json(&mesh, path)?;
        tracing::info!(
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            "wrote mesh to {:?}",
            path
        );
    }

    if args.print {
        for node in generator.graph().nodes() {
            let kind = generator.node_kind(node.id).unwrap_or("?");
            let preview = generator.preview(node.id).unwrap_or_default();
            println!("{:>4} {kind:<14} {preview}", node.id.0);
        }
        for diagnostic in &diagnostics {
            let node = diagnostic
                .node
                .map(|node| node.0.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{:?} [{node}] {}", diagnostic.severity, diagnostic.message);
        }
        let scene = SceneSnapshot::from_mesh(&mesh, BASE_COLOR);
        println!(
            "scene: {} batches, {} triangles",
            scene.meshes.len(),
            scene.triangle_count()
        );
    }

    Ok(!failed)
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            print_help();
            return ExitCode::from(2);
        }
    };
    if args.help {
        print_help();
        return ExitCode::SUCCESS;
    }

    init_tracing(args.log_level);
    tracing::info!("meshflow starting");

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            tracing::warn!("graph refreshed with errors");
            ExitCode::FAILURE
        }
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
