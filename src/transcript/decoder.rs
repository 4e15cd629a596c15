// ABOUTME: STF decoder - turns the line-oriented transcript format into
// ABOUTME: canonical messages, with commands, blocks, and nestable comments.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::args::{CommandArgs, parse_command_args};
use super::parse_json5_value;
use crate::error::TranscriptError;
use crate::message::{Extra, Message, role, validate_message};

static COMMAND_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^;[ \t]*(//|/\*|\*/|#|[a-z][a-z0-9]*)").expect("valid STF command regex")
});

/// Decode an STF transcript into messages.
///
/// Lines are split on `\n` only; a trailing newline in the source becomes a
/// trailing empty line of the last message.
pub fn decode_stf(source: &str) -> Result<Vec<Message>, TranscriptError> {
    let mut state = DecodeState::default();
    for (index, raw_line) in source.split('\n').enumerate() {
        state.line(raw_line, index + 1)?;
    }
    let messages = state.finish()?;
    debug!(messages = messages.len(), "Decoded STF transcript");
    Ok(messages)
}

/// A data line with its `;;` escape removed, or `None` for a command line.
fn data_line(raw_line: &str) -> Option<&str> {
    if raw_line.starts_with(";;") {
        return Some(&raw_line[1..]);
    }
    (!raw_line.starts_with(';')).then_some(raw_line)
}

fn is_blank(line: &str) -> bool {
    line.chars().all(|c| c == ' ' || c == '\t')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Raw,
    Extra,
}

impl BlockKind {
    fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Extra => "extra",
        }
    }
}

/// A `raw` or `extra` command collecting lines until `;end`.
#[derive(Debug)]
struct OpenBlock {
    kind: BlockKind,
    line: usize,
    lines: Vec<String>,
}

#[derive(Debug, Default)]
struct DecodeState {
    messages: Vec<Message>,
    /// Index of the message receiving data lines.
    current: Option<usize>,
    /// Data lines not yet appended to the current message.
    pending: Vec<String>,
    block: Option<OpenBlock>,
    /// Start lines of the open block comments, outermost first.
    comments: Vec<usize>,
}

impl DecodeState {
    fn line(&mut self, raw_line: &str, line: usize) -> Result<(), TranscriptError> {
        match data_line(raw_line) {
            Some(data) => self.data(data, line),
            None => self.command_line(raw_line, line),
        }
    }

    fn data(&mut self, data: &str, line: usize) -> Result<(), TranscriptError> {
        if !self.comments.is_empty() {
            return Ok(());
        }
        if let Some(block) = &mut self.block {
            block.lines.push(data.to_string());
            return Ok(());
        }
        if self.current.is_none() {
            if is_blank(data) {
                return Ok(());
            }
            return Err(TranscriptError::syntax(
                line,
                "Unexpected data line before a message",
            ));
        }
        self.pending.push(data.to_string());
        Ok(())
    }

    fn command_line(&mut self, raw_line: &str, line: usize) -> Result<(), TranscriptError> {
        let Some(captures) = COMMAND_LINE.captures(raw_line) else {
            return Err(TranscriptError::syntax(line, "Unknown command line"));
        };
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            return Err(TranscriptError::syntax(line, "Unknown command line"));
        };
        let name = name.as_str();

        match name {
            "//" | "#" => return Ok(()),
            "/*" => {
                self.comments.push(line);
                return Ok(());
            }
            "*/" => {
                if self.comments.pop().is_none() {
                    return Err(TranscriptError::syntax(line, "Unexpected block comment end"));
                }
                return Ok(());
            }
            _ => {}
        }
        if !self.comments.is_empty() {
            return Ok(());
        }

        if name == "end" {
            let Some(block) = self.block.take() else {
                return Err(TranscriptError::syntax(line, "Unexpected 'end' command"));
            };
            return self.close_block(block);
        }
        if let Some(block) = &self.block {
            return Err(TranscriptError::syntax(
                line,
                format!(
                    "Unexpected command '{}' inside a '{}' block",
                    name,
                    block.kind.name()
                ),
            ));
        }

        self.flush_pending();
        let args = parse_command_args(&raw_line[whole.end()..], line)?;
        self.command(name, args, line)
    }

    fn command(
        &mut self,
        name: &str,
        args: CommandArgs,
        line: usize,
    ) -> Result<(), TranscriptError> {
        match name {
            "system" | "sys" => self.start_message(name, Some(role::SYSTEM), args, line),
            "developer" | "dev" => self.start_message(name, Some(role::DEVELOPER), args, line),
            "user" => self.start_message(name, Some(role::USER), args, line),
            "assistant" | "ai" => self.start_message(name, Some(role::ASSISTANT), args, line),
            "tool" => self.start_message(name, Some(role::TOOL), args, line),
            "message" | "msg" => self.start_message(name, None, args, line),
            "raw" => {
                no_args(name, &args, line)?;
                self.close_message();
                self.open_block(BlockKind::Raw, line);
                Ok(())
            }
            "extra" => {
                no_args(name, &args, line)?;
                if self.current.is_none() {
                    return Err(TranscriptError::syntax(
                        line,
                        "'extra' command requires an active message",
                    ));
                }
                self.open_block(BlockKind::Extra, line);
                Ok(())
            }
            "flush" => {
                no_args(name, &args, line)?;
                self.close_message();
                Ok(())
            }
            _ => Err(TranscriptError::syntax(line, format!("Unknown command '{}'", name))),
        }
    }

    fn start_message(
        &mut self,
        command: &str,
        fixed_role: Option<&str>,
        args: CommandArgs,
        line: usize,
    ) -> Result<(), TranscriptError> {
        let mut fields = MessageFields::parse(command, args, fixed_role.is_none(), line)?;

        let inherited = self
            .current
            .and_then(|index| self.messages.get(index))
            .map(|m| m.role.clone());
        let Some(message_role) = fixed_role
            .map(str::to_string)
            .or(fields.role.take())
            .or(inherited)
        else {
            return Err(TranscriptError::syntax(
                line,
                "Attempt to create a new message without a role",
            ));
        };

        self.close_message();
        self.messages.push(Message {
            role: message_role,
            id: fields.id,
            name: fields.name,
            call_id: fields.call_id,
            ..Default::default()
        });
        self.current = Some(self.messages.len() - 1);
        Ok(())
    }

    fn open_block(&mut self, kind: BlockKind, line: usize) {
        self.block = Some(OpenBlock {
            kind,
            line,
            lines: Vec::new(),
        });
    }

    fn close_block(&mut self, block: OpenBlock) -> Result<(), TranscriptError> {
        let value = parse_json5_value(&block.lines.join("\n")).map_err(|e| {
            TranscriptError::syntax(
                block.line,
                format!("Invalid JSON5 in '{}' block: {}", block.kind.name(), e),
            )
        })?;

        match block.kind {
            BlockKind::Raw => {
                let message = validate_message(value, "$")?;
                self.messages.push(message);
                self.current = None;
            }
            BlockKind::Extra => {
                let Value::Object(fields) = value else {
                    return Err(TranscriptError::syntax(
                        block.line,
                        "'extra' block must contain an object",
                    ));
                };
                let Some(message) = self.current.and_then(|index| self.messages.get_mut(index))
                else {
                    return Err(TranscriptError::syntax(
                        block.line,
                        "'extra' command requires an active message",
                    ));
                };
                message.extra.get_or_insert_with(Extra::new).extend(fields);
            }
        }
        Ok(())
    }

    /// Append buffered data lines to the current message.
    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let text = self.pending.join("\n");
        self.pending.clear();
        if let Some(message) = self.current.and_then(|index| self.messages.get_mut(index)) {
            message.content.concat_into(text);
        }
    }

    fn close_message(&mut self) {
        self.flush_pending();
        self.current = None;
    }

    fn finish(mut self) -> Result<Vec<Message>, TranscriptError> {
        if let Some(&line) = self.comments.first() {
            return Err(TranscriptError::syntax(line, "Unterminated block comment"));
        }
        if let Some(block) = &self.block {
            return Err(TranscriptError::syntax(
                block.line,
                format!("Unterminated '{}' command", block.kind.name()),
            ));
        }
        self.close_message();
        Ok(self.messages)
    }
}

fn no_args(command: &str, args: &CommandArgs, line: usize) -> Result<(), TranscriptError> {
    match args.keys().next() {
        Some(key) => Err(TranscriptError::syntax(
            line,
            format!("Unknown argument '{}' for '{}'", key, command),
        )),
        None => Ok(()),
    }
}

/// String fields a message command may set.
#[derive(Debug, Default)]
struct MessageFields {
    role: Option<String>,
    id: Option<String>,
    name: Option<String>,
    call_id: Option<String>,
}

impl MessageFields {
    fn parse(
        command: &str,
        args: CommandArgs,
        allow_role: bool,
        line: usize,
    ) -> Result<Self, TranscriptError> {
        let mut fields = Self::default();
        for (key, value) in args {
            let slot = match key.as_str() {
                "role" if allow_role => &mut fields.role,
                "id" => &mut fields.id,
                "name" => &mut fields.name,
                "call_id" => &mut fields.call_id,
                _ => {
                    return Err(TranscriptError::syntax(
                        line,
                        format!("Unknown argument '{}' for '{}'", key, command),
                    ));
                }
            };
            let Value::String(value) = value else {
                return Err(TranscriptError::syntax(
                    line,
                    format!("Argument '{}' must be a string", key),
                ));
            };
            *slot = Some(value);
        }
        Ok(fields)
    }
}
