/*!
    Parses one-line task drafts typed into the dashboard:

    `[2025-03-31] Buy milk #errands !high`

    A leading bracketed date sets the due date, `#word` the category
    and `!high`, `!medium`, `!low` (or `!h`, `!m`, `!l`) the priority.
    Everything else is the description.
!*/
use chrono::NaiveDate;
use thiserror::Error;
use winnow::Parser;
use winnow::Result;
use winnow::ascii::{Caseless, digit1, multispace0};
use winnow::combinator::{alt, delimited, eof, preceded, terminated};
use winnow::error::ParserError;
use winnow::token::{one_of, rest, take_while};

use crate::task::{Draft, Priority};

#[derive(Debug, Error, PartialEq)]
pub enum DraftError {
    #[error("task description can't be empty")]
    EmptyDescription,
    #[error("invalid date tag, expected [YYYY-MM-DD]")]
    InvalidDate,
}

enum Word<'s> {
    Category(&'s str),
    Priority(Priority),
    Text(&'s str),
}

pub fn parse_draft(line: &str) -> std::result::Result<Draft, DraftError> {
    let mut input = line.trim_start();
    let due_date = if input.starts_with('[') {
        let due = terminated(parse_date_tag, multispace0)
            .parse_next(&mut input)
            .map_err(|_| DraftError::InvalidDate)?;
        Some(due)
    } else {
        None
    };

    let mut draft = Draft {
        due_date,
        ..Default::default()
    };
    let mut text = Vec::new();
    for token in input.split_whitespace() {
        match parse_word.parse(token) {
            Ok(Word::Category(category)) => draft.category = Some(category.to_string()),
            Ok(Word::Priority(priority)) => draft.priority = Some(priority),
            Ok(Word::Text(word)) => text.push(word),
            Err(_) => text.push(token),
        }
    }

    if text.is_empty() {
        return Err(DraftError::EmptyDescription);
    }
    draft.description = text.join(" ");
    Ok(draft)
}

fn parse_word<'s>(input: &mut &'s str) -> Result<Word<'s>> {
    alt((
        preceded('#', take_while(1.., |c: char| !c.is_whitespace())).map(Word::Category),
        preceded('!', terminated(parse_priority, eof)).map(Word::Priority),
        rest.map(Word::Text),
    ))
    .parse_next(input)
}

fn parse_priority(input: &mut &str) -> Result<Priority> {
    alt((
        Caseless("high").value(Priority::High),
        Caseless("medium").value(Priority::Medium),
        Caseless("low").value(Priority::Low),
        Caseless("h").value(Priority::High),
        Caseless("m").value(Priority::Medium),
        Caseless("l").value(Priority::Low),
    ))
    .parse_next(input)
}

fn parse_date_tag(input: &mut &str) -> Result<NaiveDate> {
    delimited('[', parse_date, ']').parse_next(input)
}

fn parse_date(input: &mut &str) -> Result<NaiveDate> {
    let (year, _, month, _, day) = (
        parse_year,
        parse_separator,
        parse_two_digits,
        parse_separator,
        parse_two_digits,
    )
        .parse_next(input)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| ParserError::from_input(input))
}

fn parse_year(input: &mut &str) -> Result<i32> {
    digit1
        .verify(|digits: &str| digits.len() == 4)
        .try_map(str::parse::<i32>)
        .parse_next(input)
}

fn parse_two_digits(input: &mut &str) -> Result<u32> {
    digit1
        .verify(|digits: &str| digits.len() == 2)
        .try_map(str::parse::<u32>)
        .parse_next(input)
}

fn parse_separator(input: &mut &str) -> Result<char> {
    one_of(['-', '/']).parse_next(input)
}
