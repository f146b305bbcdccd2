use std::{
    cell::RefCell,
    collections::HashMap,
    env,
    path::{Path, PathBuf},
};

/// State shared across the files of one parse: the macro table built from
/// `NAME = value` / `NAME := value` lines, the environment snapshot taken when
/// parsing started, and the stack of files currently being sourced.
#[derive(Debug)]
pub struct ParseContext {
    macros: RefCell<HashMap<String, String>>,
    env: HashMap<String, String>,
    file_stack: RefCell<Vec<PathBuf>>,
}

impl ParseContext {
    /// Create a context capturing the current process environment.
    pub fn new() -> Self {
        Self::with_env(env::vars().collect())
    }

    /// Create a context with an explicit environment map.
    pub fn with_env(env: HashMap<String, String>) -> Self {
        Self {
            macros: RefCell::new(HashMap::new()),
            env,
            file_stack: RefCell::new(Vec::new()),
        }
    }

    /// Record a macro definition. `:=` and `=` behave identically for the
    /// simple substitutions this dialect supports; later definitions win.
    pub fn define_macro(&self, name: impl Into<String>, value: impl Into<String>) {
        self.macros.borrow_mut().insert(name.into(), value.into());
    }

    /// Expand `$(name)`: the macro table takes precedence over the captured
    /// environment. Returns `None` when neither defines the name.
    pub fn expand(&self, name: &str) -> Option<String> {
        if let Some(value) = self.macros.borrow().get(name) {
            return Some(value.clone());
        }
        self.env.get(name).cloned()
    }

    /// Expand every `$(NAME)` reference in `s` with quoted-context semantics:
    /// unset names expand to the empty string.
    pub fn expand_string(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        let mut rest = s;

        while let Some(start) = rest.find("$(") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find(')') {
                Some(end) => {
                    if let Some(value) = self.expand(&after[..end]) {
                        out.push_str(&value);
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }

        out.push_str(rest);
        out
    }

    /// Push a file onto the source stack. Returns false if the file is
    /// already being parsed (a recursive source).
    pub fn push_file(&self, filename: &Path) -> bool {
        let mut stack = self.file_stack.borrow_mut();
        if stack.iter().any(|f| f == filename) {
            return false;
        }
        stack.push(filename.to_path_buf());
        true
    }

    /// Pop the most recently pushed file.
    pub fn pop_file(&self) {
        self.file_stack.borrow_mut().pop();
    }
}

impl Default for ParseContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use {super::ParseContext, std::collections::HashMap, std::path::Path};

    #[test]
    fn macro_shadows_env() {
        let mut env = HashMap::new();
        env.insert("NAME".to_string(), "from-env".to_string());
        let ctx = ParseContext::with_env(env);
        assert_eq!(ctx.expand("NAME").as_deref(), Some("from-env"));

        ctx.define_macro("NAME", "from-macro");
        assert_eq!(ctx.expand("NAME").as_deref(), Some("from-macro"));
        assert_eq!(ctx.expand("OTHER"), None);
    }

    #[test]
    fn file_stack_detects_recursion() {
        let ctx = ParseContext::with_env(HashMap::new());
        assert!(ctx.push_file(Path::new("a/Kconfig")));
        assert!(ctx.push_file(Path::new("b/Kconfig")));
        assert!(!ctx.push_file(Path::new("a/Kconfig")));
        ctx.pop_file();
        assert!(ctx.push_file(Path::new("b2/Kconfig")));
    }
}
