use crate::glob;
use crate::job::{ExecMode, Job, Process};
use crate::lexer::{self, LexingError, Token, WordPart};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while turning a line into a job.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParsingError {
    #[error(transparent)]
    Lexing(#[from] LexingError),
    /// An operator where a word was required, e.g. `&` in the middle of the line.
    #[error("syntax error near unexpected token `{0}'")]
    UnexpectedToken(&'static str),
    /// `<` or `>` at the end of a stage.
    #[error("missing file name after `{0}'")]
    MissingRedirectTarget(&'static str),
    /// The same direction redirected twice in one stage.
    #[error("duplicate `{0}' redirection")]
    DuplicateRedirect(&'static str),
    /// A stage without a command name (`| cmd`, `cmd |`, `cmd | | cmd`, a lone `&`).
    #[error("empty command in pipeline")]
    EmptyCommand,
}

fn symbol(token: &Token) -> &'static str {
    match token {
        Token::Word(_) => "word",
        Token::PipeOp => "|",
        Token::RedirectLeft => "<",
        Token::RedirectRight => ">",
        Token::Ampersand => "&",
    }
}

/// A stage under construction.
#[derive(Default)]
struct Stage {
    argv: Vec<String>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
}

impl Stage {
    fn finish(self) -> Result<Process, ParsingError> {
        if self.argv.is_empty() {
            return Err(ParsingError::EmptyCommand);
        }
        Ok(Process::new(self.argv, self.input, self.output))
    }
}

struct JobBuilder {
    tokens: Vec<Token>,
    pos: usize,
}

impl JobBuilder {
    fn from(tokens: Vec<Token>) -> Self {
        JobBuilder { tokens, pos: 0 }
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn build(mut self) -> Result<Vec<Process>, ParsingError> {
        let mut processes = Vec::new();
        let mut stage = Stage::default();

        while let Some(token) = self.consume() {
            match token {
                Token::Word(parts) => stage.argv.extend(expand_word(parts)),
                Token::PipeOp => processes.push(std::mem::take(&mut stage).finish()?),
                Token::RedirectLeft => {
                    let target = self.redirect_target("<")?;
                    if stage.input.replace(target).is_some() {
                        return Err(ParsingError::DuplicateRedirect("<"));
                    }
                }
                Token::RedirectRight => {
                    let target = self.redirect_target(">")?;
                    if stage.output.replace(target).is_some() {
                        return Err(ParsingError::DuplicateRedirect(">"));
                    }
                }
                Token::Ampersand => return Err(ParsingError::UnexpectedToken("&")),
            }
        }
        processes.push(stage.finish()?);
        Ok(processes)
    }

    fn redirect_target(&mut self, op: &'static str) -> Result<PathBuf, ParsingError> {
        match self.consume() {
            Some(Token::Word(parts)) => Ok(PathBuf::from(join_parts(&parts))),
            Some(other) => Err(ParsingError::UnexpectedToken(symbol(&other))),
            None => Err(ParsingError::MissingRedirectTarget(op)),
        }
    }
}

fn join_parts(parts: &[WordPart]) -> String {
    parts
        .iter()
        .map(|part| match part {
            WordPart::Literal(s) | WordPart::Quoted(s) => s.as_str(),
        })
        .collect()
}

/// Turn one word into arguments. Only wildcards written unquoted expand, so a word
/// mixing quoted wildcard characters with unquoted ones is left as written.
fn expand_word(parts: Vec<WordPart>) -> Vec<String> {
    let text = join_parts(&parts);
    let unquoted_wildcard = parts
        .iter()
        .any(|p| matches!(p, WordPart::Literal(s) if glob::has_wildcards(s)));
    let quoted_wildcard = parts
        .iter()
        .any(|p| matches!(p, WordPart::Quoted(s) if glob::has_wildcards(s)));
    if unquoted_wildcard && !quoted_wildcard {
        glob::expand(&text)
    } else {
        vec![text]
    }
}

/// Parse one input line into a job that is not yet in any table.
///
/// Leading and trailing blanks are ignored; a trailing `&` makes the whole job a
/// background job and is not part of its command text. A blank line yields `None`.
pub fn parse_job(line: &str) -> Result<Option<Job>, ParsingError> {
    let mut text = line.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let mut mode = ExecMode::Foreground;
    if let Some(stripped) = text.strip_suffix('&') {
        mode = ExecMode::Background;
        text = stripped.trim_end();
    }

    let tokens = lexer::split_into_tokens(text)?;
    let processes = JobBuilder::from(tokens).build()?;
    Ok(Some(Job::new(text, processes, mode)))
}
