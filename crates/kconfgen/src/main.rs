//! Command-line configuration generator: reads a Kconfig tree and prior
//! configuration files, evaluates the result, and writes updated outputs.

use {
    anyhow::{bail, Context as _, Result},
    clap::Parser,
    kconfix::{
        conf::{self, DefaultsPolicy},
        eval::{Engine, Origin},
        model::Model,
        parser::{Kconfig, KconfigError, ParseContext},
        renames::RenameMap,
        report::{Report, Status},
    },
    log::info,
    std::{
        collections::HashMap,
        env, fs,
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
    config: Option<PathBuf>,

    /// Optional project defaults file, loaded before --config. May repeat.
    #[arg(long)]
    defaults: Vec<PathBuf>,

    /// File with deprecated option renames. May repeat.
    #[arg(long)]
    rename_file: Vec<PathBuf>,

    /// Write an output file: FORMAT is `config`, `header`, or `report`.
    #[arg(long, num_args = 2, value_names = ["FORMAT", "FILE"])]
    output: Vec<String>,

    /// Environment to set when evaluating the config file, as NAME=VAL.
    #[arg(long)]
    env: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let options = Options::parse();

    match run(options) {
        Ok(status) => {
            if status == Status::Failed {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
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

fn run(options: Options) -> Result<Status> {
    let ctx = parse_context(&options.env)?;

    let base_dir = options.kconfig.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let kconfig = Kconfig::from_file(&options.kconfig, &base_dir, &ctx)
        .with_context(|| format!("parsing {}", options.kconfig.display()))?;

    let mut report = Report::new();
    let model = Model::build(&kconfig, &ctx, &mut report)?;
    let mut engine = Engine::new(model, report);

    let mut renames = RenameMap::new();
    for path in &options.rename_file {
        let loaded = RenameMap::load(path).with_context(|| format!("reading {}", path.display()))?;
        merge_renames(&mut renames, loaded)?;
    }

    let policy = DefaultsPolicy::from_env();

    for path in &options.defaults {
        info!("Loading defaults file {}", path.display());
        conf::load_config(&mut engine, &renames, path, Origin::DefaultsFile, policy)
            .with_context(|| format!("loading {}", path.display()))?;
    }

    if let Some(config) = &options.config {
        if config.exists() {
            let outcome = conf::load_config(&mut engine, &renames, config, Origin::PrimaryConfig, policy)
                .with_context(|| format!("loading {}", config.display()))?;

            if policy == DefaultsPolicy::Interactive {
                resolve_interactively(&mut engine, outcome.undecided)?;
            }
        }
    }

    for pair in options.output.chunks(2) {
        let [format, filename] = pair else {
            bail!("--output takes a format and a filename");
        };
        let path = Path::new(filename);

        let changed = match format.as_str() {
            "config" => conf::write_config(&mut engine, &renames, path, None)?,
            "header" => conf::write_header(&mut engine, &renames, path, None)?,
            "report" => {
                let mut contents = serde_json::to_string_pretty(&engine.report.to_json())?;
                contents.push('\n');
                fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
                true
            }
            other => bail!("unknown output format {other:?}; known formats: config, header, report"),
        };

        if changed {
            info!("Wrote {}", path.display());
        }
    }

    engine.report.emit();
    Ok(engine.report.status())
}

/// Build the parse context from the process environment plus --env overrides.
fn parse_context(overrides: &[String]) -> Result<ParseContext> {
    let mut vars: HashMap<String, String> = env::vars().collect();

    for entry in overrides {
        let Some((name, value)) = entry.split_once('=') else {
            bail!("--env arguments must each contain =. To unset an environment variable, use 'NAME='");
        };
        vars.insert(name.to_string(), value.to_string());
    }

    Ok(ParseContext::with_env(vars))
}

fn merge_renames(into: &mut RenameMap, from: RenameMap) -> Result<()> {
    for (old, new, inverted) in from.pairs() {
        into.add(&old, &new, inverted)?;
    }
    into.check_cycles()?;
    Ok(())
}

/// Ask the user which side wins for each stored default that disagrees with
/// the Kconfig default.
fn resolve_interactively(engine: &mut Engine, undecided: Vec<conf::Mismatch>) -> Result<()> {
    let stdin = io::stdin();

    for mismatch in undecided {
        eprint!(
            "{}: stored default {} differs from Kconfig default {}; keep stored? [Y/n] ",
            mismatch.name, mismatch.stored, mismatch.computed
        );
        io::stderr().flush()?;

        let mut answer = String::new();
        stdin.lock().read_line(&mut answer)?;

        if matches!(answer.trim(), "n" | "N" | "no") {
            if let Some(id) = engine.lookup(&mismatch.name) {
                engine.unset_user(id);
            }
        }
    }

    Ok(())
}
