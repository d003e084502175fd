//! Cleaning of scraped channel messages before they are stored.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::timestamp::{parse_timestamp, to_iso_seconds};
use crate::error::CleaningError;

/// One scraped message as exported by the channel scraper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageRecord {
    #[serde(default)]
    pub channel_title: Option<String>,
    #[serde(default)]
    pub channel_username: Option<String>,
    #[serde(rename = "id")]
    pub message_id: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub media_path: Option<String>,
}

impl MessageRecord {
    fn missing_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        [
            ("channel_title", self.channel_title.is_none()),
            ("channel_username", self.channel_username.is_none()),
            ("text", self.text.is_none()),
            ("date", self.date.is_none()),
            ("media_path", self.media_path.is_none()),
        ]
        .into_iter()
        .filter(|(_, missing)| *missing)
        .map(|(column, _)| column)
    }
}

/// Missing-value count for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingCount {
    pub column: &'static str,
    pub count: usize,
}

/// Trims `text` and turns an empty result into a missing value.
fn trimmed_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

pub struct MessageCleaner {
    rows: Vec<MessageRecord>,
}

impl MessageCleaner {
    pub fn new(rows: Vec<MessageRecord>) -> Self {
        Self { rows }
    }

    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, CleaningError> {
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<MessageRecord>, _>>()?;
        Ok(Self::new(rows))
    }

    pub fn rows(&self) -> &[MessageRecord] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<MessageRecord> {
        self.rows
    }

    /// Rows identical to an earlier row.
    pub fn count_duplicates(&self) -> usize {
        let mut seen = HashSet::new();
        self.rows.iter().filter(|row| !seen.insert(*row)).count()
    }

    /// Every row that has at least one identical twin, all occurrences included.
    pub fn identical_rows(&self) -> Vec<MessageRecord> {
        let mut seen = HashSet::new();
        let repeated: HashSet<&MessageRecord> =
            self.rows.iter().filter(|row| !seen.insert(*row)).collect();
        self.rows
            .iter()
            .filter(|row| repeated.contains(row))
            .cloned()
            .collect()
    }

    /// Keeps the first occurrence of each row. Returns the number of rows removed
    /// and the duplicated rows as they were before removal.
    pub fn remove_duplicates(&mut self) -> (usize, Vec<MessageRecord>) {
        let duplicates = self.identical_rows();
        let before = self.rows.len();
        let mut seen = HashSet::new();
        self.rows.retain(|row| seen.insert(row.clone()));
        let removed = before - self.rows.len();
        tracing::info!(removed, "removed identical rows");
        (removed, duplicates)
    }

    /// Per-column missing values, counting blank text as missing.
    pub fn missing_values(&self) -> Vec<MissingCount> {
        let mut counts = [
            ("channel_title", 0usize),
            ("channel_username", 0),
            ("text", 0),
            ("date", 0),
            ("media_path", 0),
        ];
        for row in &self.rows {
            let mut row = row.clone();
            row.text = trimmed_text(row.text);
            for column in row.missing_columns() {
                if let Some(entry) = counts.iter_mut().find(|(name, _)| *name == column) {
                    entry.1 += 1;
                }
            }
        }
        counts
            .into_iter()
            .map(|(column, count)| MissingCount { column, count })
            .collect()
    }

    pub fn total_missing(&self) -> usize {
        self.missing_values().iter().map(|m| m.count).sum()
    }

    /// Drops every row with a missing value after trimming `text`.
    pub fn remove_missing_values(&mut self) -> usize {
        let before = self.rows.len();
        self.rows = std::mem::take(&mut self.rows)
            .into_iter()
            .map(|mut row| {
                row.text = trimmed_text(row.text);
                row
            })
            .filter(|row| row.missing_columns().next().is_none())
            .collect();
        let removed = before - self.rows.len();
        tracing::info!(removed, "removed rows with missing values");
        removed
    }

    /// Rewrites every date as `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn standardize_dates(&mut self) -> Result<(), CleaningError> {
        for (index, row) in self.rows.iter_mut().enumerate() {
            let Some(date) = &row.date else { continue };
            let invalid = || CleaningError::InvalidDate {
                row: index,
                value: date.clone(),
            };
            let parsed = parse_timestamp(date).ok_or_else(invalid)?;
            let formatted = to_iso_seconds(parsed).map_err(|_| invalid())?;
            row.date = Some(formatted);
        }
        tracing::info!("standardized date format");
        Ok(())
    }

    /// Trims text and collapses runs of whitespace to a single space.
    pub fn remove_whitespaces(&mut self) {
        for row in &mut self.rows {
            if let Some(text) = &row.text {
                row.text = Some(text.split_whitespace().collect::<Vec<_>>().join(" "));
            }
        }
        tracing::info!("normalized whitespace in text");
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), CleaningError> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: i64, text: Option<&str>, date: Option<&str>) -> MessageRecord {
        MessageRecord {
            channel_title: Some("Pharmacy".into()),
            channel_username: Some("@pharmacy".into()),
            message_id: id,
            text: text.map(str::to_string),
            date: date.map(str::to_string),
            media_path: Some(format!("photos/{id}.jpg")),
        }
    }

    #[test]
    fn duplicates_are_counted_and_removed() {
        let a = msg(1, Some("hello"), Some("2024-10-10"));
        let b = msg(2, Some("world"), Some("2024-10-11"));
        let mut cleaner = MessageCleaner::new(vec![a.clone(), b.clone(), a.clone(), a.clone()]);

        assert_eq!(cleaner.count_duplicates(), 2);
        assert_eq!(cleaner.identical_rows().len(), 3);

        let (removed, duplicates) = cleaner.remove_duplicates();
        assert_eq!(removed, 2);
        assert_eq!(duplicates, vec![a.clone(), a.clone(), a.clone()]);
        assert_eq!(cleaner.rows(), &[a, b]);
    }

    #[test]
    fn blank_text_counts_as_missing() {
        let mut cleaner = MessageCleaner::new(vec![
            msg(1, Some("   "), Some("2024-10-10")),
            msg(2, None, None),
            msg(3, Some(" ok "), Some("2024-10-10")),
        ]);
        let missing = cleaner.missing_values();
        let text = missing.iter().find(|m| m.column == "text").unwrap();
        let date = missing.iter().find(|m| m.column == "date").unwrap();
        assert_eq!(text.count, 2);
        assert_eq!(date.count, 1);
        assert_eq!(cleaner.total_missing(), 3);

        assert_eq!(cleaner.remove_missing_values(), 2);
        assert_eq!(cleaner.rows().len(), 1);
        assert_eq!(cleaner.rows()[0].text.as_deref(), Some("ok"));
    }

    #[test]
    fn dates_are_standardized() {
        let mut cleaner = MessageCleaner::new(vec![
            msg(1, Some("a"), Some("2024-10-10 12:30:45+00:00")),
            msg(2, Some("b"), None),
        ]);
        cleaner.standardize_dates().unwrap();
        assert_eq!(cleaner.rows()[0].date.as_deref(), Some("2024-10-10T12:30:45Z"));
        assert_eq!(cleaner.rows()[1].date, None);
    }

    #[test]
    fn bad_date_names_the_row() {
        let mut cleaner = MessageCleaner::new(vec![
            msg(1, Some("a"), Some("2024-10-10")),
            msg(2, Some("b"), Some("not a date")),
        ]);
        match cleaner.standardize_dates() {
            Err(CleaningError::InvalidDate { row, value }) => {
                assert_eq!(row, 1);
                assert_eq!(value, "not a date");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn whitespace_is_collapsed() {
        let mut cleaner =
            MessageCleaner::new(vec![msg(1, Some("  buy \t now\n\n  today "), None)]);
        cleaner.remove_whitespaces();
        assert_eq!(cleaner.rows()[0].text.as_deref(), Some("buy now today"));
    }

    #[test]
    fn csv_round_trip_keeps_missing_fields() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("messages.csv");
        std::fs::write(
            &path,
            "channel_title,channel_username,id,text,date,media_path\n\
             Pharmacy,@pharmacy,7,hello,2024-10-10,\n",
        )
        .unwrap();

        let cleaner = MessageCleaner::from_csv(&path).unwrap();
        assert_eq!(cleaner.rows().len(), 1);
        assert_eq!(cleaner.rows()[0].message_id, 7);
        assert_eq!(cleaner.rows()[0].media_path, None);

        let out = dir.path().join("clean.csv");
        cleaner.write_csv(&out).unwrap();
        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.starts_with("channel_title,channel_username,id,text,date,media_path\n"));
    }
}
