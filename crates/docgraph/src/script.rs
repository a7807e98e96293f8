/// Edit scripts: one command per line, `#` comments, blank lines skipped.
use anyhow::{bail, Context, Result};
use docgraph_history::ValuePath;
use serde_json::Value;

/// A single script command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `set <path> <json> [| description]`
    Set {
        path: ValuePath,
        value: Value,
        description: Option<String>,
    },
    /// `del <path> [| description]`
    Del {
        path: ValuePath,
        description: Option<String>,
    },
    /// `put <entity-id> <json> [| description]`
    Put {
        id: u64,
        value: Value,
        description: Option<String>,
    },
    /// `drop <entity-id> [| description]`
    Drop { id: u64, description: Option<String> },
    /// `begin [description]`
    Begin { description: Option<String> },
    Commit,
    Undo,
    Redo,
    /// `expect <path> <json>` or `expect <path> absent`
    Expect {
        path: ValuePath,
        value: Option<Value>,
    },
}

/// A parsed script. Commands keep their 1-based source line numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub commands: Vec<(usize, Command)>,
}

impl Script {
    /// Parses script text.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first line that fails to parse.
    pub fn parse(text: &str) -> Result<Self> {
        let mut commands = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let command = parse_command(line).with_context(|| format!("line {}", idx + 1))?;
            commands.push((idx + 1, command));
        }
        Ok(Self { commands })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

fn parse_command(line: &str) -> Result<Command> {
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (line, ""),
    };
    match word {
        "set" => {
            let (path, rest) = take_token(rest, "path")?;
            let (value, description) = take_json(rest)?;
            Ok(Command::Set {
                path: parse_path(path)?,
                value,
                description,
            })
        }
        "del" => {
            let (path, rest) = take_token(rest, "path")?;
            Ok(Command::Del {
                path: parse_path(path)?,
                description: take_description(rest)?,
            })
        }
        "put" => {
            let (id, rest) = take_token(rest, "entity id")?;
            let (value, description) = take_json(rest)?;
            Ok(Command::Put {
                id: parse_id(id)?,
                value,
                description,
            })
        }
        "drop" => {
            let (id, rest) = take_token(rest, "entity id")?;
            Ok(Command::Drop {
                id: parse_id(id)?,
                description: take_description(rest)?,
            })
        }
        "begin" => Ok(Command::Begin {
            description: non_empty(rest),
        }),
        "commit" => no_args(rest, Command::Commit),
        "undo" => no_args(rest, Command::Undo),
        "redo" => no_args(rest, Command::Redo),
        "expect" => {
            let (path, rest) = take_token(rest, "path")?;
            let value = if rest.trim() == "absent" {
                None
            } else {
                let (value, description) = take_json(rest)?;
                if description.is_some() {
                    bail!("`expect` takes no description");
                }
                Some(value)
            };
            Ok(Command::Expect {
                path: parse_path(path)?,
                value,
            })
        }
        other => bail!("unknown command `{other}`"),
    }
}

fn take_token<'a>(text: &'a str, what: &str) -> Result<(&'a str, &'a str)> {
    let text = text.trim_start();
    if text.is_empty() {
        bail!("missing {what}");
    }
    Ok(match text.split_once(char::is_whitespace) {
        Some((token, rest)) => (token, rest.trim_start()),
        None => (text, ""),
    })
}

/// Reads one JSON value, then an optional `| description` tail.
fn take_json(text: &str) -> Result<(Value, Option<String>)> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    let value = match stream.next() {
        Some(value) => value.context("invalid JSON value")?,
        None => bail!("missing JSON value"),
    };
    let tail = &text[stream.byte_offset()..];
    Ok((value, take_description(tail)?))
}

fn take_description(text: &str) -> Result<Option<String>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    match text.strip_prefix('|') {
        Some(description) => Ok(non_empty(description)),
        None => bail!("unexpected trailing text `{text}`"),
    }
}

fn no_args(rest: &str, command: Command) -> Result<Command> {
    if !rest.trim().is_empty() {
        bail!("unexpected arguments `{}`", rest.trim());
    }
    Ok(command)
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn parse_path(text: &str) -> Result<ValuePath> {
    text.parse::<ValuePath>()
        .with_context(|| format!("invalid path `{text}`"))
}

fn parse_id(text: &str) -> Result<u64> {
    text.parse::<u64>()
        .with_context(|| format!("invalid entity id `{text}`"))
}
