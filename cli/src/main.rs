use std::path::{Component, Path, PathBuf};
use std::sync::Once;

use anyhow::Context;
use clap::Parser;
use kelp_core::{Environment, Value, reader, vm::VmConfig};
use tracing::debug;

mod repl;

static TRACING_INIT: Once = Once::new();
const DEFAULT_TRACE_FILTER: &str = "kelp_core=info,kelp_cli=info";

#[derive(Debug, Parser)]
#[command(name = "kelp", author, version, about = "Run kelp scripts or start a REPL", long_about = None)]
struct CliArgs {
    /// Source file to run; starts the REPL when omitted
    #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
    file: Option<PathBuf>,

    /// Evaluate an expression and print its value
    #[arg(short = 'e', long = "eval", value_name = "EXPR", conflicts_with = "file")]
    eval: Option<String>,

    /// Print the bytecode of each top-level form instead of running it
    #[arg(long)]
    dump: bool,

    /// TOML file with VM limits
    #[arg(long, value_name = "PATH", value_parser = parse_sanitized_path)]
    config: Option<PathBuf>,
}

fn read_file_content(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("Failed to read file '{}': {}", path.display(), e))
}

fn sanitize_path(raw: &str) -> anyhow::Result<PathBuf> {
    let p = Path::new(raw);
    if p.components().any(|comp| matches!(comp, Component::ParentDir)) {
        anyhow::bail!("Parent directory components ('..') are not allowed in file paths.");
    }
    Ok(p.to_path_buf())
}

fn parse_sanitized_path(raw: &str) -> Result<PathBuf, String> {
    sanitize_path(raw).map_err(|e| e.to_string())
}

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        use tracing_subscriber::fmt;

        let filter = std::env::var("RUST_LOG")
            .ok()
            .and_then(|expr| EnvFilter::try_new(expr).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_TRACE_FILTER));

        let _ = fmt().with_writer(std::io::stderr).with_env_filter(filter).try_init();
    });
}

fn load_config(path: Option<&Path>) -> anyhow::Result<VmConfig> {
    let base = match path {
        Some(p) => VmConfig::from_path(p)?,
        None => VmConfig::default(),
    };
    base.apply_env()
}

fn build_environment(config: VmConfig) -> Environment {
    debug!(target: "kelp::cli", ?config, "building environment");
    let mut env = Environment::with_config(config);
    kelp_stdlib::register_stdlib(&mut env);
    env
}

/// Evaluate `src`, printing the captured stack trace on failure.
fn run_source(env: &mut Environment, src: &str) -> anyhow::Result<Value> {
    match env.eval_str(src) {
        Ok(v) => Ok(v),
        Err(e) => {
            if let Some(trace) = env.stack_trace() {
                eprint!("{}", trace);
            }
            env.clear();
            Err(e)
        }
    }
}

fn dump_source(env: &mut Environment, src: &str) -> anyhow::Result<String> {
    let forms = reader::read_all(src, env.symbols())?;
    let mut out = Vec::with_capacity(forms.len());
    for form in &forms {
        let f = env.compile(form).with_context(|| format!("failed to compile {}", form))?;
        out.push(env.dump_function(&f));
    }
    Ok(out.join("\n\n"))
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let CliArgs { file, eval, dump, config } = CliArgs::parse();
    let config = load_config(config.as_deref())?;
    let mut env = build_environment(config);

    let (src, print_result) = match (file, eval) {
        (Some(path), _) => (read_file_content(&path)?, false),
        (None, Some(expr)) => (expr, true),
        (None, None) => return repl::run(&mut env),
    };

    if dump {
        println!("{}", dump_source(&mut env, &src)?);
        return Ok(());
    }

    let value = run_source(&mut env, &src)?;
    if print_result {
        println!("{}", value);
    }
    Ok(())
}
