//! Answer matching for trivia guesses
//!
//! Titles in most catalogs have many colloquial and abbreviated forms, so the
//! default matcher accepts a guess that contains the full answer, or that is a
//! long-enough leading run of the answer's words.

/// Accumulated prefix length at which a leading run of words becomes acceptable
pub const MIN_PREFIX_LEN: usize = 8;

/// Strip everything that is not an ASCII letter or digit and lowercase the rest.
///
/// Used for answers, user identities and category tokens alike.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Split text into its alphanumeric runs, lowercased
fn alphanumeric_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

/// Normalized guesses that count as a match for `answer` besides the full answer.
///
/// Whole tokens are concatenated from the start of the answer; every
/// accumulation point from the first one reaching [`MIN_PREFIX_LEN`] characters
/// onward is acceptable. Text before a colon is an alias of its own.
pub fn acceptable_prefixes(answer: &str) -> Vec<String> {
    let mut prefixes = Vec::new();
    let mut accumulated = String::new();

    for token in alphanumeric_tokens(answer) {
        accumulated.push_str(&token);
        if accumulated.len() >= MIN_PREFIX_LEN {
            prefixes.push(accumulated.clone());
        }
    }

    if let Some((before_colon, _)) = answer.split_once(':') {
        let alias = normalize(before_colon);
        if !alias.is_empty() && !prefixes.contains(&alias) {
            prefixes.push(alias);
        }
    }

    prefixes
}

/// Check a raw guess against the accepted answers.
///
/// Returns the first accepted answer that matched, for display in
/// "the answer was X" messages.
pub fn check_answer<'a>(guess: &str, answers: &'a [String], exact: bool) -> Option<&'a str> {
    let guess = normalize(guess);

    answers
        .iter()
        .find(|answer| {
            let key = normalize(answer);
            if guess == key {
                return true;
            }
            if exact || guess.is_empty() {
                return false;
            }
            if !key.is_empty() && guess.contains(&key) {
                return true;
            }
            acceptable_prefixes(answer).contains(&guess)
        })
        .map(String::as_str)
}
