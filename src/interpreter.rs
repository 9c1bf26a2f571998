use crate::config::Config;
use crate::error::JobError;
use crate::parser;
use crate::reconciler::JobOutcome;
use crate::shell::Shell;
use crate::terminal::Terminal;
use anyhow::{Context, bail};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// The line-reading front end: feeds lines to the parser and the resulting jobs to
/// the [`Shell`].
///
/// Example
/// ```no_run
/// use jobshell::{Config, Interpreter};
/// let mut sh = Interpreter::batch(&Config::default());
/// sh.execute_line("echo hello | tr a-z A-Z");
/// ```
pub struct Interpreter {
    shell: Shell,
    prompt: String,
}

impl Interpreter {
    /// Interpreter that takes control of the terminal when stdin is one.
    pub fn interactive(config: &Config) -> Result<Self, JobError> {
        Ok(Self {
            shell: Shell::new(Terminal::init()?, config.max_jobs),
            prompt: config.prompt.clone(),
        })
    }

    /// Interpreter that never touches the terminal.
    pub fn batch(config: &Config) -> Self {
        Self {
            shell: Shell::new(Terminal::detached(), config.max_jobs),
            prompt: config.prompt.clone(),
        }
    }

    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    /// Parse and submit one line. Problems are reported on stderr; `None` means no
    /// job was run.
    pub fn execute_line(&mut self, line: &str) -> Option<JobOutcome> {
        let job = match parser::parse_job(line) {
            Ok(Some(job)) => job,
            Ok(None) => return None,
            Err(e) => {
                eprintln!("jobshell: {e}");
                return None;
            }
        };
        match self.shell.submit(job) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                eprintln!("jobshell: {e}");
                None
            }
        }
    }

    fn report_finished(&mut self) {
        if let Err(e) = self.shell.sweep() {
            warn!(error = %e, "sweep failed");
        }
    }

    /// Read-eval loop on the terminal. Ctrl-C re-prompts, end of input returns.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;

        loop {
            self.report_finished();
            match rl.readline(&self.prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    self.execute_line(&line);
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }
        debug!("end of input");
        Ok(())
    }

    /// Run every line of a `.bat` file, echoing each one first, then wait for all
    /// jobs still active.
    pub fn run_batch(&mut self, path: &Path) -> anyhow::Result<()> {
        if path.extension().and_then(|ext| ext.to_str()) != Some("bat") {
            bail!("{}: batch files must have the .bat extension", path.display());
        }
        let file = File::open(path).with_context(|| format!("{}", path.display()))?;

        for line in BufReader::new(file).lines() {
            let line = line.with_context(|| format!("reading {}", path.display()))?;
            println!("{line}");
            self.execute_line(&line);
            self.report_finished();
        }
        self.shell.barrier(None, &mut io::stdout())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::serial;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_unique_temp_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "jobshell_interpreter_{}_{}",
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn test_execute_line_reports_and_skips_bad_lines() {
        let _guard = serial();
        let mut sh = Interpreter::batch(&Config::default());

        assert!(sh.execute_line("   ").is_none());
        assert!(sh.execute_line("echo 'unterminated").is_none());
        assert!(sh.execute_line("cat </nonexistent_jobshell/in").is_none());
        assert!(sh.shell().jobs().is_empty());

        let outcome = sh.execute_line("true | true");
        assert!(matches!(outcome, Some(JobOutcome::Completed(_))));
    }

    #[test]
    fn test_batch_file_runs_lines_and_waits() {
        let _guard = serial();
        let dir = make_unique_temp_dir();
        let script = dir.join("run.bat");
        let first = dir.join("first.txt");
        let second = dir.join("second.txt");
        fs::write(
            &script,
            format!(
                "echo one >{}\nsleep 0.1 &\n\nsh -c 'sleep 0.1; echo two' >{} &\n",
                first.display(),
                second.display()
            ),
        )
        .unwrap();

        let mut sh = Interpreter::batch(&Config::default());
        sh.run_batch(&script).unwrap();

        assert!(sh.shell().jobs().is_empty());
        assert_eq!(fs::read_to_string(&first).unwrap(), "one\n");
        assert_eq!(fs::read_to_string(&second).unwrap(), "two\n");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_batch_file_needs_bat_extension() {
        let mut sh = Interpreter::batch(&Config::default());
        let err = sh.run_batch(Path::new("script.sh")).unwrap_err();
        assert!(err.to_string().contains(".bat"));
    }
}
