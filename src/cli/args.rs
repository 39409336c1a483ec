//! Command-line argument parsing for the ragbridge binary.

use crate::models::RetrievalMethod;

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Stream one chat turn, printing canonical events
    Chat {
        message: String,
        session_id: Option<String>,
    },
    /// Poll an evaluation job until it settles
    Watch { job_id: String },
    /// Submit an evaluation and poll it until it settles
    Submit {
        dataset_id: String,
        method: RetrievalMethod,
        k_values: Option<Vec<u32>>,
    },
    /// Probe both services
    Health,
    /// Arguments could not be parsed
    Invalid(String),
}

pub const USAGE: &str = "\
Usage:
  ragbridge chat [--session <id>] <message...>
  ragbridge watch <job_id>
  ragbridge submit <dataset_id> [--method basic|multi-query|hybrid] [--k 1,3,5,10]
  ragbridge health
  ragbridge --version | --help

Environment:
  RAGBRIDGE_AGENT_URL, RAGBRIDGE_TESTER_URL,
  RAGBRIDGE_POLL_INTERVAL_MS, RAGBRIDGE_IDLE_TIMEOUT_SECS (0 disables),
  RUST_LOG (default ragbridge=info)";

/// Parse command-line arguments and return the appropriate command.
///
/// # Examples
///
/// ```
/// use ragbridge::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["ragbridge".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), CliCommand::Version);
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    // Skip the program name
    let args: Vec<String> = args.skip(1).collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        return CliCommand::Version;
    }
    if args.iter().any(|a| a == "--help" || a == "-h") {
        return CliCommand::Help;
    }

    let Some((command, rest)) = args.split_first() else {
        return CliCommand::Help;
    };

    match command.as_str() {
        "chat" => parse_chat(rest),
        "watch" => match rest {
            [job_id] => CliCommand::Watch {
                job_id: job_id.clone(),
            },
            _ => CliCommand::Invalid("watch takes exactly one job id".to_string()),
        },
        "submit" => parse_submit(rest),
        "health" => CliCommand::Health,
        other => CliCommand::Invalid(format!("unknown command '{}'", other)),
    }
}

fn parse_chat(rest: &[String]) -> CliCommand {
    let mut session_id = None;
    let mut words = Vec::new();
    let mut iter = rest.iter();

    while let Some(arg) = iter.next() {
        if arg == "--session" {
            match iter.next() {
                Some(id) => session_id = Some(id.clone()),
                None => return CliCommand::Invalid("--session needs a value".to_string()),
            }
        } else {
            words.push(arg.as_str());
        }
    }

    let message = words.join(" ");
    if message.trim().is_empty() {
        return CliCommand::Invalid("chat needs a message".to_string());
    }
    CliCommand::Chat {
        message,
        session_id,
    }
}

fn parse_submit(rest: &[String]) -> CliCommand {
    let mut dataset_id = None;
    let mut method = RetrievalMethod::default();
    let mut k_values = None;
    let mut iter = rest.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--method" => match iter.next().map(|m| m.parse::<RetrievalMethod>()) {
                Some(Ok(parsed)) => method = parsed,
                Some(Err(e)) => return CliCommand::Invalid(e),
                None => return CliCommand::Invalid("--method needs a value".to_string()),
            },
            "--k" => match iter.next().map(|raw| parse_k_values(raw)) {
                Some(Ok(parsed)) => k_values = Some(parsed),
                Some(Err(e)) => return CliCommand::Invalid(e),
                None => return CliCommand::Invalid("--k needs a value".to_string()),
            },
            other if dataset_id.is_none() && !other.starts_with("--") => {
                dataset_id = Some(other.to_string())
            }
            other => return CliCommand::Invalid(format!("unexpected argument '{}'", other)),
        }
    }

    match dataset_id {
        Some(dataset_id) => CliCommand::Submit {
            dataset_id,
            method,
            k_values,
        },
        None => CliCommand::Invalid("submit needs a dataset id".to_string()),
    }
}

fn parse_k_values(raw: &str) -> Result<Vec<u32>, String> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid k value '{}'", part.trim()))
        })
        .collect()
}
