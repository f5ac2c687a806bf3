use serde::{Deserialize, Serialize};

use crate::card::{Card, CardId};

/// Header names of the page columns that feed each card field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub word: String,
    pub pronunciation: String,
    pub translation_primary: String,
    pub translation_secondary: String,
    pub example_sentence: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            word: "German Word".to_string(),
            pronunciation: "Bangla Pronunciation".to_string(),
            translation_primary: "Bangla Meaning".to_string(),
            translation_secondary: "English Meaning".to_string(),
            example_sentence: "German sentence".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Parses delimited text whose first line is the header row.
///
/// A quote character toggles quoted mode, inside which the delimiter is
/// literal. Quotes are never escaped. Rows whose field count differs from
/// the header are dropped.
pub fn parse_table(text: &str, delimiter: char) -> Table {
    let mut lines = text.trim().lines();
    let Some(header_line) = lines.next() else {
        return Table::default();
    };
    let headers: Vec<String> = header_line
        .split(delimiter)
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields = split_row(line, delimiter);
        if fields.len() == headers.len() {
            rows.push(fields);
        } else {
            log::trace!(
                "dropping row with {} fields (header has {}): {line}",
                fields.len(),
                headers.len()
            );
        }
    }

    Table { headers, rows }
}

fn split_row(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for ch in line.chars() {
        if ch == '"' {
            quoted = !quoted;
        } else if ch == delimiter && !quoted {
            fields.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(ch);
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Maps a page of delimited text to cards, skipping rows without a word.
pub fn cards_from_table(text: &str, columns: &ColumnMap, delimiter: char) -> Vec<Card> {
    let table = parse_table(text, delimiter);
    let word = table.column(&columns.word);
    let pronunciation = table.column(&columns.pronunciation);
    let primary = table.column(&columns.translation_primary);
    let secondary = table.column(&columns.translation_secondary);
    let example = table.column(&columns.example_sentence);

    let field = |row: &[String], index: Option<usize>| -> String {
        index
            .and_then(|i| row.get(i))
            .cloned()
            .unwrap_or_default()
    };

    table
        .rows
        .iter()
        .filter_map(|row| {
            let id = CardId::new(field(row, word));
            if id.is_empty() {
                return None;
            }
            Some(Card {
                word: id,
                pronunciation: field(row, pronunciation),
                translation_primary: field(row, primary),
                translation_secondary: field(row, secondary),
                example_sentence: field(row, example),
            })
        })
        .collect()
}
