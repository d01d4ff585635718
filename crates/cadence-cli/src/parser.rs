use anyhow::{anyhow, Result};
use cadence_core::models::CellValue;
use chrono::{DateTime, Utc};
use chrono_english::{parse_date_string, Dialect};

/// Parses a point in time. ISO dates are taken literally (midnight UTC),
/// anything else goes through the English date parser relative to `now`.
pub fn parse_when(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if let CellValue::Date(date) = CellValue::parse_input(input) {
        return Ok(date);
    }
    parse_date_string(input.trim(), now, Dialect::Us)
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", input, e))
}

/// Parses an A1-style cell reference into 1-based `(row, column)`.
pub fn parse_cell_ref(input: &str) -> Result<(usize, usize)> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(input.len());
    let (letters, digits) = input.split_at(split);
    if letters.is_empty() || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(anyhow!("Invalid cell reference '{}', expected e.g. 'A4'", input));
    }

    let mut column = 0usize;
    for c in letters.chars() {
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        column = column
            .checked_mul(26)
            .and_then(|n| n.checked_add(digit))
            .ok_or_else(|| anyhow!("Column '{}' is out of range", letters))?;
    }
    let row: usize = digits
        .parse()
        .map_err(|_| anyhow!("Row '{}' is out of range", digits))?;
    if row == 0 {
        return Err(anyhow!("Rows start at 1, got '{}'", input));
    }
    Ok((row, column))
}

/// Column letters for a 1-based column index.
pub fn column_letters(mut column: usize) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}
