use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// The shell's view of its process environment.
///
/// - `vars`: variables consulted by the shell itself (`PATH` for program lookup,
///   `HOME` for `cd` without an argument). Children inherit the real process
///   environment.
/// - `current_dir`: the working directory, kept in sync with the process by `cd`.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the current process state.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { vars, current_dir }
    }

    /// Look up a variable, falling back to the live process environment.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override a variable for the shell's own lookups.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Directories searched for programs, as the raw `PATH` value.
    pub fn search_path(&self) -> String {
        self.get_var("PATH").unwrap_or_default()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
