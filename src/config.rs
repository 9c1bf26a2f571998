use crate::job_table::DEFAULT_CAPACITY;
use argh::FromArgs;
use std::path::PathBuf;

pub const DEFAULT_PROMPT: &str = "jobshell> ";

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

#[derive(FromArgs, Debug, PartialEq)]
/// Interactive shell with job control. Runs a `.bat` file line by line when one is given.
pub struct Config {
    #[argh(option, default = "DEFAULT_CAPACITY")]
    /// maximum number of simultaneously active jobs
    pub max_jobs: usize,

    #[argh(option, default = "default_prompt()")]
    /// prompt shown before each line in interactive mode
    pub prompt: String,

    #[argh(positional)]
    /// batch file to execute instead of reading from the terminal
    pub batch: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_jobs: DEFAULT_CAPACITY,
            prompt: default_prompt(),
            batch: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_args(&["jobshell"], &[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.max_jobs, 16);
        assert_eq!(config.prompt, "jobshell> ");
    }

    #[test]
    fn test_options_and_batch_file() {
        let config =
            Config::from_args(&["jobshell"], &["--max-jobs", "4", "--prompt", "$ ", "run.bat"])
                .unwrap();
        assert_eq!(config.max_jobs, 4);
        assert_eq!(config.prompt, "$ ");
        assert_eq!(config.batch, Some(PathBuf::from("run.bat")));
    }

    #[test]
    fn test_invalid_capacity_is_rejected() {
        assert!(Config::from_args(&["jobshell"], &["--max-jobs", "many"]).is_err());
    }
}
