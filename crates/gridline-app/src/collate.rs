// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Human-order string comparison. At the primary level accents, case,
/// punctuation and whitespace are ignored and digit runs compare by value, so
/// `"file 9" < "File-10"` and `"ann" < "Émile"`. Primary ties are broken by
/// accents (unaccented first), then case (lowercase first), then the raw
/// text, so only identical strings compare equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Collator;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(String),
    Char(char),
}

/// Precomputed comparison key for one string; build it once and compare
/// many times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollationKey {
    primary: Vec<Token>,
    accents: Vec<String>,
    uppercase: Vec<bool>,
    raw: String,
}

impl Ord for CollationKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_primary(&self.primary, &other.primary)
            .then_with(|| self.accents.cmp(&other.accents))
            .then_with(|| self.uppercase.cmp(&other.uppercase))
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for CollationKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Collator {
    pub fn new() -> Self {
        Self
    }

    pub fn key(&self, input: &str) -> CollationKey {
        collation_key(input)
    }

    pub fn compare(&self, left: &str, right: &str) -> Ordering {
        self.key(left).cmp(&self.key(right))
    }

    /// True when the strings differ only in accents, case or punctuation.
    pub fn primary_eq(&self, left: &str, right: &str) -> bool {
        compare_primary(&self.key(left).primary, &self.key(right).primary) == Ordering::Equal
    }
}

fn compare_primary(left: &[Token], right: &[Token]) -> Ordering {
    for (a, b) in left.iter().zip(right.iter()) {
        let order = compare_tokens(a, b);
        if order != Ordering::Equal {
            return order;
        }
    }
    left.len().cmp(&right.len())
}

fn collation_key(input: &str) -> CollationKey {
    let mut key = CollationKey {
        primary: Vec::with_capacity(input.len()),
        accents: Vec::with_capacity(input.len()),
        uppercase: Vec::with_capacity(input.len()),
        raw: input.to_owned(),
    };
    let mut digits = String::new();
    // Marks attach to the preceding letter; punctuation in between detaches them.
    let mut attached = false;

    for ch in input.nfd() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            attached = false;
            continue;
        }
        if !digits.is_empty() {
            key.push(number_token(&digits), false);
            digits.clear();
        }
        if is_combining_mark(ch) {
            if attached && let Some(marks) = key.accents.last_mut() {
                marks.push(ch);
            }
            continue;
        }
        if !ch.is_alphanumeric() {
            attached = false;
            continue;
        }
        let upper = ch.is_uppercase();
        for lower in ch.to_lowercase() {
            key.push(Token::Char(lower), upper);
        }
        attached = true;
    }
    if !digits.is_empty() {
        key.push(number_token(&digits), false);
    }
    key
}

impl CollationKey {
    fn push(&mut self, token: Token, upper: bool) {
        self.primary.push(token);
        self.accents.push(String::new());
        self.uppercase.push(upper);
    }
}

fn number_token(digits: &str) -> Token {
    let trimmed = digits.trim_start_matches('0');
    Token::Number(if trimmed.is_empty() { "0" } else { trimmed }.to_owned())
}

fn compare_tokens(left: &Token, right: &Token) -> Ordering {
    match (left, right) {
        (Token::Number(a), Token::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
        (Token::Number(_), Token::Char(_)) => Ordering::Less,
        (Token::Char(_), Token::Number(_)) => Ordering::Greater,
        (Token::Char(a), Token::Char(b)) => a.cmp(b),
    }
}
