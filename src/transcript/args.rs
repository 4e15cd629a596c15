// ABOUTME: Parses STF command arguments, either `key=value` pairs with
// ABOUTME: optional quoting or a single JSON5 object literal.

use serde_json::{Map, Value};

use crate::error::TranscriptError;

/// Parsed command arguments.
pub type CommandArgs = Map<String, Value>;

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Parse the text after a command name. `line` is 1-based.
pub fn parse_command_args(text: &str, line: usize) -> Result<CommandArgs, TranscriptError> {
    let text = text.trim_matches(is_blank);
    if text.is_empty() {
        return Ok(CommandArgs::new());
    }
    if text.starts_with('{') {
        return match json5::from_str::<Value>(text) {
            Ok(Value::Object(args)) => Ok(args),
            Ok(_) => Err(TranscriptError::syntax(
                line,
                "Expected object literal after command name",
            )),
            Err(e) => Err(TranscriptError::syntax(line, format!("Invalid JSON5 arguments: {}", e))),
        };
    }

    KeyValueScanner {
        chars: text.char_indices().collect(),
        text,
        pos: 0,
        line,
    }
    .scan()
}

struct KeyValueScanner<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    line: usize,
}

impl KeyValueScanner<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn offset(&self, pos: usize) -> usize {
        self.chars
            .get(pos)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.text.len())
    }

    fn skip_blank(&mut self) {
        while self.peek().is_some_and(is_blank) {
            self.pos += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> TranscriptError {
        TranscriptError::syntax(self.line, message)
    }

    fn scan(mut self) -> Result<CommandArgs, TranscriptError> {
        let mut args = CommandArgs::new();

        loop {
            self.skip_blank();
            if self.peek().is_none() {
                return Ok(args);
            }

            let key = self.key()?;
            self.skip_blank();
            if self.peek() != Some('=') {
                return Err(self.error("Expected '=' after argument key"));
            }
            self.pos += 1;
            self.skip_blank();

            let value = match self.peek() {
                None => return Err(self.error("Expected value after '='")),
                Some('"' | '\'') => self.quoted()?,
                Some(_) => self.bare()?,
            };

            if args.contains_key(&key) {
                return Err(self.error(format!("Duplicate argument key '{}'", key)));
            }
            args.insert(key, Value::String(value));
        }
    }

    fn key(&mut self) -> Result<String, TranscriptError> {
        let start = self.pos;
        if !self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            return Err(self.error("Argument key must start with a letter"));
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        Ok(self.text[self.offset(start)..self.offset(self.pos)].to_string())
    }

    fn quoted(&mut self) -> Result<String, TranscriptError> {
        let start = self.pos;
        let Some(quote) = self.peek() else {
            return Err(self.error("Expected a quoted value"));
        };
        self.pos += 1;

        let mut escaped = false;
        while let Some(c) = self.peek() {
            self.pos += 1;
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                let literal = &self.text[self.offset(start)..self.offset(self.pos)];
                return json5::from_str::<String>(literal)
                    .map_err(|e| self.error(format!("Invalid quoted string: {}", e)));
            }
        }
        Err(self.error("Unterminated quoted string"))
    }

    fn bare(&mut self) -> Result<String, TranscriptError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| !is_blank(c)) {
            self.pos += 1;
        }
        let token = &self.text[self.offset(start)..self.offset(self.pos)];
        if token.ends_with('"') || token.ends_with('\'') {
            return Err(self.error("Unquoted value cannot end with a quote"));
        }
        Ok(token.to_string())
    }
}
