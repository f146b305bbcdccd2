//! Style checker for Kconfig files.
//!
//! Checks indentation, whitespace, line length, and config name conventions.
//! For every file with findings, a `<file>.new` sibling with the suggested
//! fixes is written next to it. Exit status is 0 when every file is clean,
//! 1 otherwise. A trailing `# NOERROR` comment downgrades a line's findings
//! to notices.

use {
    anyhow::{Context as _, Result},
    clap::Parser,
    std::{fs, path::PathBuf, process::ExitCode},
};

const SPACES_PER_INDENT: usize = 4;
const MAX_LINE_LENGTH: usize = 120;
const CONFIG_NAME_MAX_LENGTH: usize = 50;

/// Command line options.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Options {
    /// Kconfig files to check.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Print every finding, including suppressed ones.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let options = Options::parse();

    let mut failed = false;
    let mut broke = false;

    for path in &options.files {
        match check_file(path, options.verbose) {
            Ok(true) => {}
            Ok(false) => failed = true,
            Err(e) => {
                eprintln!("Error: {e:#}");
                broke = true;
            }
        }
    }

    if broke {
        ExitCode::from(2)
    } else if failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

/// Check one file; returns whether it was clean. Writes the `.new` sibling
/// when any fix was suggested.
fn check_file(path: &PathBuf, verbose: bool) -> Result<bool> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    let mut findings = Vec::new();
    let mut fixed_lines = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let (fixed, line_findings) = check_line(line);

        let suppressed = line.trim_end().ends_with("# NOERROR");
        for finding in line_findings {
            if suppressed {
                if verbose {
                    eprintln!("NOERROR: {}:{}: {}", path.display(), idx + 1, finding);
                }
            } else {
                findings.push(format!("{}:{}: {}", path.display(), idx + 1, finding));
            }
        }

        fixed_lines.push(fixed);
    }

    for finding in &findings {
        eprintln!("{finding}");
    }

    let mut fixed_text = fixed_lines.join("\n");
    if text.ends_with('\n') {
        fixed_text.push('\n');
    }

    if fixed_text != text {
        let new_path = path.with_file_name(format!(
            "{}.new",
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
        ));
        fs::write(&new_path, &fixed_text).with_context(|| format!("writing {}", new_path.display()))?;
        eprintln!("Suggested fixes written to {}", new_path.display());
    }

    Ok(findings.is_empty())
}

/// Apply the line rules; returns the fixed line and the findings.
fn check_line(line: &str) -> (String, Vec<String>) {
    let mut findings = Vec::new();
    let mut fixed = line.to_string();

    if fixed.contains('\t') {
        findings.push("tabulators should be replaced by spaces".to_string());
        fixed = fixed.replace('\t', &" ".repeat(SPACES_PER_INDENT));
    }

    if fixed.trim_end().len() != fixed.len() {
        findings.push("trailing whitespaces should be removed".to_string());
        fixed.truncate(fixed.trim_end().len());
    }

    if fixed.chars().count() > MAX_LINE_LENGTH {
        findings.push(format!("line should be shorter than {MAX_LINE_LENGTH} characters"));
    }

    let indent = fixed.len() - fixed.trim_start().len();
    if indent % SPACES_PER_INDENT != 0 && !fixed.trim_start().starts_with('#') {
        findings.push(format!("indentation should be a multiple of {SPACES_PER_INDENT} spaces"));
    }

    findings.extend(check_config_name(&fixed));

    (fixed, findings)
}

/// Validate the symbol name on `config`/`menuconfig`/`choice` lines.
fn check_config_name(line: &str) -> Vec<String> {
    let trimmed = line.trim_start();

    let name = ["config ", "menuconfig ", "choice "]
        .iter()
        .find_map(|kw| trimmed.strip_prefix(kw))
        .map(|rest| rest.split_whitespace().next().unwrap_or(""));

    let Some(name) = name else {
        return Vec::new();
    };

    if name.is_empty() || name.starts_with('#') {
        return Vec::new();
    }

    let mut findings = Vec::new();

    if !name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_') {
        findings.push(format!(
            "config name {name:?} should consist of uppercase letters, digits, and underscores"
        ));
    }

    if name.chars().count() > CONFIG_NAME_MAX_LENGTH {
        findings.push(format!("config name {name:?} is longer than {CONFIG_NAME_MAX_LENGTH} characters"));
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::{check_config_name, check_line};

    #[test]
    fn tabs_are_replaced() {
        let (fixed, findings) = check_line("\tbool \"foo\"");
        assert_eq!(fixed, "    bool \"foo\"");
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("tabulators"));
    }

    #[test]
    fn trailing_whitespace_is_trimmed() {
        let (fixed, findings) = check_line("config FOO   ");
        assert_eq!(fixed, "config FOO");
        assert!(findings.iter().any(|f| f.contains("trailing")));
    }

    #[test]
    fn long_lines_are_reported_without_fix() {
        let line = format!("config {}", "A".repeat(130));
        let (fixed, findings) = check_line(&line);
        assert_eq!(fixed, line);
        assert!(findings.iter().any(|f| f.contains("shorter than")));
    }

    #[test]
    fn odd_indentation_is_reported() {
        let (_, findings) = check_line("   bool \"foo\"");
        assert!(findings.iter().any(|f| f.contains("multiple of 4")));

        let (_, findings) = check_line("    bool \"foo\"");
        assert!(findings.is_empty());
    }

    #[test]
    fn config_name_conventions() {
        assert!(check_config_name("config lower_case").iter().any(|f| f.contains("uppercase")));
        assert!(check_config_name("config GOOD_NAME_2").is_empty());
        assert!(check_config_name(&format!("config {}", "X".repeat(60)))
            .iter()
            .any(|f| f.contains("longer than")));
        assert!(check_config_name("menu \"not a config\"").is_empty());
    }
}
