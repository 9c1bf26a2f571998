//! Lexical analysis (tokenization) of one command line.

use thiserror::Error;

/// A part of a word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordPart {
    /// Unquoted text; wildcards in it are subject to expansion.
    Literal(String),
    /// Text from quotes or a backslash escape; never expanded.
    Quoted(String),
}

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word token, which may be composed of multiple parts (`WordPart`).
    Word(Vec<WordPart>),
    /// The pipe operator, `|`.
    PipeOp,
    /// Input redirection symbol, `<`.
    RedirectLeft,
    /// Output redirection symbol, `>`.
    RedirectRight,
    /// `&` anywhere but at the end of the line.
    Ampersand,
}

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    #[error("unterminated quote")]
    UnfinishedQuote,
    /// The line ends with a lone backslash.
    #[error("trailing backslash")]
    TrailingEscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    current_word: Vec<WordPart>,
    buffer: String,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            current_word: Vec::new(),
            buffer: String::new(),
        }
    }

    /// Runs the machine over the whole input.
    fn make_tokens(&mut self) -> Result<Vec<Token>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start | LexingState::ReadingWord => self.handle_word(ch, &mut out)?,
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch)?,
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote => {
                return Err(LexingError::UnfinishedQuote);
            }
            _ => {}
        }

        self.finish_word(&mut out);
        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) -> Result<(), LexingError> {
        match ch {
            ' ' | '\t' | '\r' | '\n' => {
                self.finish_word(out);
                self.state = LexingState::Start;
            }
            '|' | '<' | '>' | '&' => {
                self.finish_word(out);
                out.push(match ch {
                    '|' => Token::PipeOp,
                    '<' => Token::RedirectLeft,
                    '>' => Token::RedirectRight,
                    _ => Token::Ampersand,
                });
                self.state = LexingState::Start;
            }
            '\'' => {
                self.flush_literal();
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.flush_literal();
                self.state = LexingState::ReadingDoubleQuote;
            }
            '\\' => {
                let escaped = self.read_char().ok_or(LexingError::TrailingEscape)?;
                self.flush_literal();
                self.current_word.push(WordPart::Quoted(escaped.to_string()));
                self.state = LexingState::ReadingWord;
            }
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
        Ok(())
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.close_quote(),
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            '"' => self.close_quote(),
            '\\' if matches!(self.input.get(self.pos).copied(), Some('"' | '\\')) => {
                let escaped = self.read_char().ok_or(LexingError::TrailingEscape)?;
                self.buffer.push(escaped);
            }
            c => self.buffer.push(c),
        }
        Ok(())
    }

    /// A quoted section always yields a part, so `""` is an empty argument.
    fn close_quote(&mut self) {
        self.current_word
            .push(WordPart::Quoted(std::mem::take(&mut self.buffer)));
        self.state = LexingState::ReadingWord;
    }

    fn flush_literal(&mut self) {
        if !self.buffer.is_empty() {
            self.current_word
                .push(WordPart::Literal(std::mem::take(&mut self.buffer)));
        }
    }

    fn finish_word(&mut self, out: &mut Vec<Token>) {
        self.flush_literal();
        if !self.current_word.is_empty() {
            out.push(Token::Word(std::mem::take(&mut self.current_word)));
        }
    }
}

/// Split `line` into words and operators.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>, LexingError> {
    let mut lexer = LexingFSM::new(line);
    lexer.make_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Token {
        Token::Word(vec![WordPart::Literal(s.to_string())])
    }

    #[test]
    fn test_words_and_pipes() {
        let tokens = split_into_tokens("echo hello | tr a-z A-Z").unwrap();
        assert_eq!(
            tokens,
            vec![
                lit("echo"),
                lit("hello"),
                Token::PipeOp,
                lit("tr"),
                lit("a-z"),
                lit("A-Z"),
            ]
        );
    }

    #[test]
    fn test_attached_and_detached_redirections() {
        let attached = split_into_tokens("cat <in.txt >out.txt").unwrap();
        let detached = split_into_tokens("cat < in.txt > out.txt").unwrap();
        let expected = vec![
            lit("cat"),
            Token::RedirectLeft,
            lit("in.txt"),
            Token::RedirectRight,
            lit("out.txt"),
        ];
        assert_eq!(attached, expected);
        assert_eq!(detached, expected);
    }

    #[test]
    fn test_operators_split_words_without_spaces() {
        let tokens = split_into_tokens("ls|wc").unwrap();
        assert_eq!(tokens, vec![lit("ls"), Token::PipeOp, lit("wc")]);
    }

    #[test]
    fn test_quotes_keep_spaces_and_operators() {
        let tokens = split_into_tokens(r#"echo "a | b" 'c > d'"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                lit("echo"),
                Token::Word(vec![WordPart::Quoted("a | b".to_string())]),
                Token::Word(vec![WordPart::Quoted("c > d".to_string())]),
            ]
        );
    }

    #[test]
    fn test_mixed_word_parts() {
        let tokens = split_into_tokens(r#"pre"mid"*"#).unwrap();
        assert_eq!(
            tokens,
            vec![Token::Word(vec![
                WordPart::Literal("pre".to_string()),
                WordPart::Quoted("mid".to_string()),
                WordPart::Literal("*".to_string()),
            ])]
        );
    }

    #[test]
    fn test_empty_quotes_are_an_argument() {
        let tokens = split_into_tokens(r#"printf """#).unwrap();
        assert_eq!(
            tokens,
            vec![lit("printf"), Token::Word(vec![WordPart::Quoted(String::new())])]
        );
    }

    #[test]
    fn test_backslash_escapes() {
        let tokens = split_into_tokens(r"echo \* \|").unwrap();
        assert_eq!(
            tokens,
            vec![
                lit("echo"),
                Token::Word(vec![WordPart::Quoted("*".to_string())]),
                Token::Word(vec![WordPart::Quoted("|".to_string())]),
            ]
        );
        assert_eq!(
            split_into_tokens(r#"echo "say \"hi\"""#).unwrap()[1],
            Token::Word(vec![WordPart::Quoted("say \"hi\"".to_string())])
        );
    }

    #[test]
    fn test_ampersand_token() {
        let tokens = split_into_tokens("a & b").unwrap();
        assert_eq!(tokens, vec![lit("a"), Token::Ampersand, lit("b")]);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            split_into_tokens("echo 'oops"),
            Err(LexingError::UnfinishedQuote)
        );
        assert_eq!(
            split_into_tokens("echo \"oops"),
            Err(LexingError::UnfinishedQuote)
        );
        assert_eq!(split_into_tokens("echo \\"), Err(LexingError::TrailingEscape));
    }

    #[test]
    fn test_blank_line_has_no_tokens() {
        assert!(split_into_tokens("   \t ").unwrap().is_empty());
    }
}
