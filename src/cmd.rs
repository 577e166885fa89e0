use std::io::{self, BufRead, Write};
use std::str::SplitWhitespace;

use thiserror::Error;
use tracing::warn;

use crate::core::driver::{SchedCore, Selector};
use crate::core::state::{JobId, JobSpec, Registry, Timestamp, MAX_IMPORTANCE, MIN_IMPORTANCE};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Cpus { count: u64 },
    Job(JobSpec),
    Assign { timestamp: Timestamp, slots: u64 },
    Query { timestamp: Timestamp, selector: Selector },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command `{0}`")]
    UnknownVerb(String),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid {what} `{token}`")]
    Invalid { what: &'static str, token: String },
    #[error("importance {0} outside 1..=100")]
    ImportanceRange(u64),
}

// Blank lines yield None.
pub fn parse_line(line: &str) -> Result<Option<Command>, ParseError> {
    let mut tokens = line.split_whitespace();
    let Some(verb) = tokens.next() else {
        return Ok(None);
    };
    let command = match verb {
        "cpus" => Command::Cpus {
            count: number(&mut tokens, "CPU count")?,
        },
        "job" => {
            let timestamp = number(&mut tokens, "timestamp")?;
            let process_id = number(&mut tokens, "process id")?;
            let origin = word(&mut tokens, "origin system")?;
            let instruction = word(&mut tokens, "instruction")?;
            let importance = number(&mut tokens, "importance")?;
            let duration = number(&mut tokens, "duration")?;
            if !(MIN_IMPORTANCE..=MAX_IMPORTANCE).contains(&importance) {
                return Err(ParseError::ImportanceRange(importance));
            }
            Command::Job(JobSpec {
                timestamp,
                process_id,
                origin,
                instruction,
                importance,
                duration,
            })
        }
        "assign" => Command::Assign {
            timestamp: number(&mut tokens, "timestamp")?,
            slots: number(&mut tokens, "job count")?,
        },
        "query" => {
            let timestamp = number(&mut tokens, "timestamp")?;
            let token = word(&mut tokens, "selector")?;
            // Any alphabetic character marks an origin filter; everything
            // else must parse as a top-K count.
            let selector = if token.chars().any(char::is_alphabetic) {
                Selector::Origin(token)
            } else {
                Selector::TopK(parse_number(&token, "top-K count")?)
            };
            Command::Query { timestamp, selector }
        }
        other => return Err(ParseError::UnknownVerb(other.to_owned())),
    };
    Ok(Some(command))
}

fn word(tokens: &mut SplitWhitespace<'_>, what: &'static str) -> Result<String, ParseError> {
    tokens
        .next()
        .map(str::to_owned)
        .ok_or(ParseError::Missing(what))
}

fn number(tokens: &mut SplitWhitespace<'_>, what: &'static str) -> Result<u64, ParseError> {
    let token = tokens.next().ok_or(ParseError::Missing(what))?;
    parse_number(token, what)
}

fn parse_number(token: &str, what: &'static str) -> Result<u64, ParseError> {
    token.parse().map_err(|_| ParseError::Invalid {
        what,
        token: token.to_owned(),
    })
}

// Parses each line, applies it to the core and writes one output line per
// emitted job. Malformed lines, and commands before `cpus`, are skipped
// with a warning.
pub fn replay<R: BufRead, W: Write>(input: R, mut output: W) -> io::Result<()> {
    let mut core: Option<SchedCore> = None;
    for line in input.lines() {
        let line = line?;
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                warn!(%err, line = %line, "skipping malformed command");
                continue;
            }
        };
        match command {
            Command::Cpus { count } => core = Some(SchedCore::new(count)),
            Command::Job(spec) => match core.as_mut() {
                Some(core) => {
                    core.admit(spec);
                }
                None => warn!(line = %line, "`job` before `cpus`, skipping"),
            },
            Command::Assign { timestamp, slots } => match core.as_mut() {
                Some(core) => {
                    let picked = core.assign(timestamp, slots);
                    emit(&mut output, core.registry(), &picked)?;
                }
                None => warn!(line = %line, "`assign` before `cpus`, skipping"),
            },
            Command::Query { timestamp, selector } => match core.as_mut() {
                Some(core) => {
                    let matched = core.query(timestamp, &selector);
                    emit(&mut output, core.registry(), &matched)?;
                }
                None => warn!(line = %line, "`query` before `cpus`, skipping"),
            },
        }
    }
    output.flush()
}

fn emit<W: Write>(output: &mut W, registry: &Registry, ids: &[JobId]) -> io::Result<()> {
    for &id in ids {
        writeln!(output, "{}", registry.line(id))?;
    }
    Ok(())
}
