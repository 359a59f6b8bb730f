//! Chat commands understood by the trivia bot
//!
//! `]trivia start` options are parsed like command-line flags:
//! `]trivia start [N] [-diff D] [-categories tok ...] [-excludecats] [-byrating]
//! [-autoskip S] [-quizbowl]`. Single-dash long flags are accepted as written.

use clap::Parser;

use crate::types::{
    QuestionMode, QuestionSpec, SortOrder, ANAGRAM_AUTOSKIP_SECS, DEFAULT_AUTOSKIP_SECS,
    DEFAULT_DIFFICULTY, DEFAULT_ROUNDS,
};

/// Leading character of every command
pub const COMMAND_PREFIX: char = ']';
pub const DEFAULT_LEADERBOARD_ROWS: usize = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid parameters: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameKind {
    Trivia,
    Anagrams,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    Start(QuestionSpec),
    Stop,
    /// Score of the named user, or of the caller
    Score(Option<String>),
    Leaderboard(usize),
    Skip,
}

#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_help_flag = true, disable_version_flag = true)]
struct StartArgs {
    /// Number of questions
    #[arg(default_value_t = DEFAULT_ROUNDS)]
    len: usize,

    #[arg(long, default_value_t = DEFAULT_DIFFICULTY as i64, allow_negative_numbers = true)]
    diff: i64,

    #[arg(long, num_args = 1..)]
    categories: Vec<String>,

    #[arg(long)]
    excludecats: bool,

    #[arg(long)]
    byrating: bool,

    /// Seconds before an unanswered question is skipped, 0 for never
    #[arg(long, default_value_t = DEFAULT_AUTOSKIP_SECS)]
    autoskip: u64,

    #[arg(long)]
    quizbowl: bool,
}

/// Parse a chat line. `None` means it is not a trivia command.
pub fn parse_command(text: &str) -> Option<Result<ChatCommand, CommandError>> {
    let body = text.trim().strip_prefix(COMMAND_PREFIX)?;
    let tokens: Vec<&str> = body.split_whitespace().collect();

    let (kind, rest) = match tokens.split_first()? {
        (&"trivia", rest) => (GameKind::Trivia, rest),
        (&"anagrams", rest) => (GameKind::Anagrams, rest),
        (&"skip", _) => return Some(Ok(ChatCommand::Skip)),
        _ => return None,
    };

    let (sub, args) = rest.split_first()?;
    let command = match *sub {
        "start" => parse_start(kind, args).map(ChatCommand::Start),
        "stop" | "end" => Ok(ChatCommand::Stop),
        "score" => Ok(ChatCommand::Score((!args.is_empty()).then(|| args.concat()))),
        "leaderboard" => Ok(ChatCommand::Leaderboard(
            args.first()
                .and_then(|n| n.parse().ok())
                .unwrap_or(DEFAULT_LEADERBOARD_ROWS),
        )),
        "skip" => Ok(ChatCommand::Skip),
        _ => return None,
    };
    Some(command)
}

/// Turn `start` arguments into a session spec
pub fn parse_start(kind: GameKind, args: &[&str]) -> Result<QuestionSpec, CommandError> {
    let args = StartArgs::try_parse_from(args.iter().map(|t| long_flag(t)))
        .map_err(|e| CommandError::InvalidArguments(first_line(&e.to_string())))?;

    if args.len == 0 {
        return Err(CommandError::InvalidArguments(
            "the number of questions must be positive".to_string(),
        ));
    }

    let (mode, autoskip) = match kind {
        GameKind::Anagrams => {
            let autoskip = if args.autoskip == DEFAULT_AUTOSKIP_SECS {
                ANAGRAM_AUTOSKIP_SECS
            } else {
                args.autoskip
            };
            (QuestionMode::Anagram, autoskip)
        }
        GameKind::Trivia if args.quizbowl => (QuestionMode::Quizbowl, args.autoskip),
        GameKind::Trivia => (QuestionMode::Image, args.autoskip),
    };

    let spec = QuestionSpec {
        rounds: args.len,
        exclude_categories: args.excludecats,
        order: if args.byrating {
            SortOrder::Rating
        } else {
            SortOrder::Popularity
        },
        mode,
        ..QuestionSpec::default()
    };

    Ok(spec
        .with_difficulty(args.diff)
        .with_categories(args.categories)
        .with_autoskip_secs(autoskip))
}

/// `-diff` becomes `--diff`; short flags and negative numbers are left alone
fn long_flag(token: &str) -> String {
    match token.strip_prefix('-') {
        Some(name)
            if name.len() > 1
                && !name.starts_with('-')
                && name.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            format!("--{}", name)
        }
        _ => token.to_string(),
    }
}

fn first_line(message: &str) -> String {
    let line = message.lines().next().unwrap_or_default();
    line.strip_prefix("error: ").unwrap_or(line).to_string()
}
