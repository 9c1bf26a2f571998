//! An interactive shell with job control.
//!
//! Each input line becomes a [`job::Job`]: a pipeline of processes that share one
//! process group and are tracked together in a fixed-capacity [`job_table::JobTable`].
//! Foreground jobs get the controlling terminal and are waited for; background jobs
//! are reconciled at idle points, before each prompt. `cd`, `quit` and `barrier`
//! (plus `jobs`, `fg`, `bg` and `help`) run inside the shell process.
//!
//! The main entry point is [`Interpreter`], which reads lines from the terminal or a
//! batch file and hands them to a [`Shell`].

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
mod external;
mod glob;
pub mod interpreter;
pub mod job;
pub mod job_table;
mod launcher;
pub mod lexer;
pub mod parser;
pub mod reconciler;
pub mod shell;
pub mod terminal;

pub use config::Config;
pub use error::JobError;
pub use interpreter::Interpreter;
pub use shell::Shell;
