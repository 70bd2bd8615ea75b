use std::fs::File;
use std::io::{BufRead, BufReader};

use tracing::{debug, warn};

use crate::config::TokenizerType;
use crate::reference::References;
use crate::{Config, Result, UserError};

/// What the tokenizer read and produced, for logging and reporting.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenizeOutcome {
    pub references_read: u64,
    pub tokens_found: u64,
    pub lines_skipped: u64,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Uppercase the body, turn every run of non-word characters into a single
/// space, then split on whitespace.
fn tokenize_splitter(body: &str) -> Vec<String> {
    let mut spaced = String::with_capacity(body.len());
    for c in body.to_uppercase().chars() {
        if is_word_char(c) {
            spaced.push(c);
        } else {
            spaced.push(' ');
        }
    }
    spaced.split_whitespace().map(str::to_string).collect()
}

/// Strips the non-word characters out of a token instead of splitting on
/// them, so `O'BRIEN` compresses to `OBRIEN`.
fn compress_token(token: &str) -> String {
    token.chars().filter(|c| is_word_char(*c)).collect()
}

/// Uppercase, split on the field delimiter then whitespace, and compress
/// each token.
fn tokenize_compress(body: &str, delimiter: &str) -> Vec<String> {
    body.to_uppercase()
        .replace(delimiter, " ")
        .split_whitespace()
        .map(compress_token)
        .filter(|token| !token.is_empty())
        .collect()
}

/// Like `Compress`, but adjacent all-digit tokens within a field are
/// concatenated into a single numeric token.
fn tokenize_compress_nbr(body: &str, delimiter: &str) -> Vec<String> {
    let body = body.to_uppercase();
    let mut tokens = Vec::new();
    for field in body.split(delimiter) {
        let mut number = String::new();
        for token in field.split_whitespace() {
            let token = compress_token(token);
            if crate::is_numeric_token(&token) {
                number.push_str(&token);
            } else {
                if !number.is_empty() {
                    tokens.push(std::mem::take(&mut number));
                }
                if !token.is_empty() {
                    tokens.push(token);
                }
            }
        }
        if !number.is_empty() {
            tokens.push(number);
        }
    }
    tokens
}

fn remove_duplicates(tokens: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(tokens.len());
    for token in tokens {
        if !seen.contains(&token) {
            seen.push(token);
        }
    }
    seen
}

impl TokenizerType {
    pub fn tokenize(&self, body: &str, delimiter: &str) -> Vec<String> {
        match self {
            TokenizerType::Splitter => tokenize_splitter(body),
            TokenizerType::Compress => tokenize_compress(body, delimiter),
            TokenizerType::CompressNbr => tokenize_compress_nbr(body, delimiter),
        }
    }
}

/// Reads the configured input file and builds the reference dictionary.
///
/// The first delimited field of every line is the external reference id, the
/// rest of the line is the body handed to the tokenizer. Lines without a
/// delimiter are skipped.
pub fn read_references(config: &Config) -> Result<(References, TokenizeOutcome)> {
    let file = File::open(&config.input_file).map_err(|error| UserError::InputFileUnreadable {
        path: config.input_file.display().to_string(),
        error,
    })?;

    let mut references = References::new();
    let mut outcome = TokenizeOutcome::default();
    let mut lines = BufReader::new(file).lines();
    if config.has_header {
        lines.next().transpose()?;
    }

    for line in lines {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(position) = line.find(&config.delimiter) else {
            warn!("skipping malformed input line without delimiter: {line:?}");
            outcome.lines_skipped += 1;
            continue;
        };
        let ref_id = &line[..position];
        let body = &line[position + config.delimiter.len()..];
        let mut tokens = config.tokenizer_type.tokenize(body, &config.delimiter);
        outcome.tokens_found += tokens.len() as u64;
        if config.remove_duplicate_tokens {
            tokens = remove_duplicates(tokens);
        }
        references.insert(ref_id, tokens);
        outcome.references_read += 1;
    }

    debug!(
        references = outcome.references_read,
        tokens = outcome.tokens_found,
        skipped = outcome.lines_skipped,
        "input file tokenized"
    );

    Ok((references, outcome))
}
