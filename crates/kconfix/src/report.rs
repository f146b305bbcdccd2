use {
    crate::parser::Location,
    log::{error, info, warn},
    serde_json::json,
    std::{
        env,
        fmt::{Display, Formatter, Result as FmtResult},
    },
};

/// Environment variable selecting the report verbosity.
pub const VERBOSITY_ENV: &str = "KCONFIG_REPORT_VERBOSITY";

/// How severe a diagnostic is.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Severity {
    /// Purely informational.
    Info,

    /// Something worth knowing about, but harmless.
    Notification,

    /// Something that probably causes a problem.
    Warning,

    /// The configuration cannot be trusted.
    Error,
}

/// What a diagnostic is about.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Category {
    /// Two or more definitions of the same symbol or choice name.
    MultipleDefinition,

    /// A stored default value disagrees with the Kconfig default.
    DefaultMismatch,

    /// A stored value for a promptless symbol was dropped.
    PromptlessOverride,

    /// A reverse dependency names a symbol that is never defined.
    UnusedReverseDep,

    /// A `default` value does not fit the symbol's kind.
    DefaultTypeMismatch,

    /// A value fell outside the active range and was clamped.
    RangeViolation,

    /// A referenced symbol is never defined.
    UndefinedReference,

    /// Style or indentation issue found by the checker.
    Style,

    /// Anything else.
    Misc,
}

impl Category {
    /// The `# ignore:` pragma codes that suppress this category.
    pub fn ignore_codes(&self) -> &'static [&'static str] {
        match self {
            Category::MultipleDefinition => &["multiple-definition", "MD"],
            _ => &[],
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Category::MultipleDefinition => f.write_str("multiple-definition"),
            Category::DefaultMismatch => f.write_str("default-mismatch"),
            Category::PromptlessOverride => f.write_str("promptless-override"),
            Category::UnusedReverseDep => f.write_str("unused-reverse-dep"),
            Category::DefaultTypeMismatch => f.write_str("default-type-mismatch"),
            Category::RangeViolation => f.write_str("range-violation"),
            Category::UndefinedReference => f.write_str("undefined-reference"),
            Category::Style => f.write_str("style"),
            Category::Misc => f.write_str("misc"),
        }
    }
}

/// One diagnostic record.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// How severe the finding is.
    pub severity: Severity,

    /// What the finding is about.
    pub category: Category,

    /// Where it was found, when known.
    pub location: Option<Location>,

    /// Human-readable message.
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        if let Some(location) = &self.location {
            write!(f, "{location}: {}", self.message)
        } else {
            f.write_str(&self.message)
        }
    }
}

/// Overall status of a configuration run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    /// Nothing above info.
    Ok,

    /// At least one notification, nothing worse.
    OkWithNotifications,

    /// At least one warning, no errors.
    OkWithWarnings,

    /// At least one error.
    Failed,
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Status::Ok => f.write_str("OK"),
            Status::OkWithNotifications => f.write_str("OK, with notifications"),
            Status::OkWithWarnings => f.write_str("OK, with warnings"),
            Status::Failed => f.write_str("Failed"),
        }
    }
}

/// How much of the report to print.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Verbosity {
    /// Print only if something failed.
    Quiet,

    /// Print notifications and worse.
    #[default]
    Default,

    /// Print everything.
    Verbose,
}

impl Verbosity {
    /// Read the verbosity from `KCONFIG_REPORT_VERBOSITY`, defaulting on
    /// unset or unrecognized values.
    pub fn from_env() -> Verbosity {
        match env::var(VERBOSITY_ENV).as_deref() {
            Ok("quiet") => Verbosity::Quiet,
            Ok("verbose") => Verbosity::Verbose,
            _ => Verbosity::Default,
        }
    }
}

/// Collected diagnostics for one engine run.
#[derive(Debug, Default)]
pub struct Report {
    diags: Vec<Diagnostic>,
    verbosity: Option<Verbosity>,
}

impl Report {
    /// Create an empty report that reads its verbosity from the environment
    /// when first printed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty report with a fixed verbosity.
    pub fn with_verbosity(verbosity: Verbosity) -> Self {
        Self {
            diags: Vec::new(),
            verbosity: Some(verbosity),
        }
    }

    /// The effective verbosity.
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity.unwrap_or_else(Verbosity::from_env)
    }

    /// Record a diagnostic. Exact repeats are collapsed, so re-evaluation
    /// after an invalidation does not inflate the report.
    pub fn add(&mut self, severity: Severity, category: Category, location: Option<Location>, message: impl Into<String>) {
        let message = message.into();

        if self.diags.iter().any(|d| d.category == category && d.location == location && d.message == message) {
            return;
        }

        self.diags.push(Diagnostic {
            severity,
            category,
            location,
            message,
        });
    }

    /// Record an info diagnostic.
    pub fn info(&mut self, category: Category, location: Option<Location>, message: impl Into<String>) {
        self.add(Severity::Info, category, location, message);
    }

    /// Record a notification.
    pub fn notify(&mut self, category: Category, location: Option<Location>, message: impl Into<String>) {
        self.add(Severity::Notification, category, location, message);
    }

    /// Record a warning.
    pub fn warn(&mut self, category: Category, location: Option<Location>, message: impl Into<String>) {
        self.add(Severity::Warning, category, location, message);
    }

    /// Record an error.
    pub fn error(&mut self, category: Category, location: Option<Location>, message: impl Into<String>) {
        self.add(Severity::Error, category, location, message);
    }

    /// All diagnostics recorded so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diags
    }

    /// Diagnostics of one category.
    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Diagnostic> {
        self.diags.iter().filter(move |d| d.category == category)
    }

    /// The aggregate status.
    pub fn status(&self) -> Status {
        let mut status = Status::Ok;

        for diag in &self.diags {
            status = match (status, diag.severity) {
                (_, Severity::Error) => return Status::Failed,
                (Status::Ok, Severity::Notification) => Status::OkWithNotifications,
                (Status::Ok | Status::OkWithNotifications, Severity::Warning) => Status::OkWithWarnings,
                (status, _) => status,
            };
        }

        status
    }

    /// Emit the report through the `log` facade, honoring the verbosity.
    pub fn emit(&self) {
        let verbosity = self.verbosity();

        if verbosity == Verbosity::Quiet && self.status() != Status::Failed {
            return;
        }

        for diag in &self.diags {
            match diag.severity {
                Severity::Error => error!("{diag}"),
                Severity::Warning => warn!("{diag}"),
                Severity::Notification => info!("{diag}"),
                Severity::Info => {
                    if verbosity == Verbosity::Verbose {
                        info!("{diag}");
                    }
                }
            }
        }

        info!("Configuration status: {}", self.status());
    }

    /// Render the report as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        let diags: Vec<serde_json::Value> = self
            .diags
            .iter()
            .map(|d| {
                json!({
                    "severity": format!("{:?}", d.severity).to_lowercase(),
                    "category": d.category.to_string(),
                    "location": d.location.map(|l| l.to_string()),
                    "message": d.message,
                })
            })
            .collect();

        json!({
            "status": self.status().to_string(),
            "diagnostics": diags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Category, Report, Severity, Status};

    #[test]
    fn status_aggregation() {
        let mut report = Report::new();
        assert_eq!(report.status(), Status::Ok);

        report.info(Category::Misc, None, "nothing");
        assert_eq!(report.status(), Status::Ok);

        report.notify(Category::MultipleDefinition, None, "twice");
        assert_eq!(report.status(), Status::OkWithNotifications);

        report.warn(Category::RangeViolation, None, "clamped");
        assert_eq!(report.status(), Status::OkWithWarnings);

        report.error(Category::Misc, None, "boom");
        assert_eq!(report.status(), Status::Failed);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Notification);
        assert!(Severity::Notification > Severity::Info);
    }

    #[test]
    fn json_rendering() {
        let mut report = Report::new();
        report.warn(Category::RangeViolation, None, "value clamped");

        let json = report.to_json();
        assert_eq!(json["status"], "OK, with warnings");
        assert_eq!(json["diagnostics"][0]["severity"], "warning");
        assert_eq!(json["diagnostics"][0]["category"], "range-violation");
        assert_eq!(json["diagnostics"][0]["message"], "value clamped");
        assert!(json["diagnostics"][0]["location"].is_null());
    }
}
