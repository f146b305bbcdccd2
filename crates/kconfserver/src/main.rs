//! Long-running server process: reads JSON requests on stdin, writes JSON
//! responses on stdout, one object per line. Diagnostics go to stderr.

use {
    anyhow::{bail, Context as _, Result},
    clap::Parser,
    kconfix::{
        conf::{self, DefaultsPolicy},
        eval::{Engine, Origin},
        model::Model,
        parser::{Kconfig, KconfigError, ParseContext},
        renames::RenameMap,
        report::Report,
        server::{Session, MAX_PROTOCOL_VERSION, MIN_PROTOCOL_VERSION},
    },
    std::{
        collections::HashMap,
        env,
        io::{self, BufRead, Write},
        path::{Path, PathBuf},
        process::ExitCode,
    },
};

/// Command line options.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Options {
    /// Kconfig file with config item definitions.
    #[arg(long)]
    kconfig: PathBuf,

    /// Project configuration settings.
    #[arg(long)]
    config: PathBuf,

    /// File with deprecated option renames. May repeat.
    #[arg(long)]
    rename_file: Vec<PathBuf>,

    /// Environment to set when evaluating the config file, as NAME=VAL.
    #[arg(long)]
    env: Vec<String>,

    /// Protocol version to use for the initial status message.
    #[arg(long, default_value_t = MAX_PROTOCOL_VERSION)]
    version: u64,
}

fn main() -> ExitCode {
    env_logger::init();
    let options = Options::parse();

    match run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if e.downcast_ref::<KconfigError>().is_some() {
                ExitCode::from(1)
            } else {
                ExitCode::from(2)
            }
        }
    }
}

fn run(options: Options) -> Result<()> {
    if options.version < MIN_PROTOCOL_VERSION || options.version > MAX_PROTOCOL_VERSION {
        eprintln!(
            "Version {} is outside the supported protocol range {}-{}",
            options.version, MIN_PROTOCOL_VERSION, MAX_PROTOCOL_VERSION
        );
    }

    let mut vars: HashMap<String, String> = env::vars().collect();
    for entry in &options.env {
        let Some((name, value)) = entry.split_once('=') else {
            bail!("--env arguments must each contain =. To unset an environment variable, use 'NAME='");
        };
        vars.insert(name.to_string(), value.to_string());
    }
    let ctx = ParseContext::with_env(vars);

    let base_dir = options.kconfig.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let kconfig = Kconfig::from_file(&options.kconfig, &base_dir, &ctx)
        .with_context(|| format!("parsing {}", options.kconfig.display()))?;

    let mut report = Report::new();
    let model = Model::build(&kconfig, &ctx, &mut report)?;
    let mut engine = Engine::new(model, report);

    let mut renames = RenameMap::new();
    for path in &options.rename_file {
        for (old, new, inverted) in RenameMap::load(path)?.pairs() {
            renames.add(&old, &new, inverted)?;
        }
    }
    renames.check_cycles()?;

    if options.config.exists() {
        conf::load_config(&mut engine, &renames, &options.config, Origin::PrimaryConfig, DefaultsPolicy::from_env())
            .with_context(|| format!("loading {}", options.config.display()))?;
    }

    let mut session = Session::new(engine, renames, options.config.clone(), options.version);

    eprintln!("Server running, waiting for requests on stdin...");

    let stdout = io::stdout();
    let mut out = stdout.lock();

    serde_json::to_writer(&mut out, &session.initial_state())?;
    out.write_all(b"\n")?;
    out.flush()?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = session.handle_line(&line);
        serde_json::to_writer(&mut out, &response)?;
        out.write_all(b"\n")?;
        out.flush()?;
    }

    Ok(())
}
