//! Topic filters
//!
//! A `TopicFilter` is a conjunction of optional constraints. It compiles to
//! a parameterized `WHERE` clause; the text constraint is applied afterwards
//! in Rust so that case folding covers non-ASCII titles.

use std::collections::BTreeSet;

use chrono::{Days, Duration, NaiveDate, TimeZone};
use chrono_tz::Tz;
use rusqlite::types::Value;

use crate::models::{Topic, User};
use crate::storage::{StoreError, StoreResult};

/// Criteria for listing topics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicFilter {
    /// Match any of these categories (empty = any)
    pub categories: BTreeSet<String>,
    /// Match any of these authors (empty = any)
    pub authors: BTreeSet<User>,
    /// Case-insensitive substring of title or description
    pub text: Option<String>,
    /// Inclusive lower bound on the local creation date
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the local creation date
    pub date_to: Option<NaiveDate>,
    /// `false` selects active topics, `true` archived ones
    pub archived_only: bool,
}

impl TopicFilter {
    /// Active topics, no other constraint
    pub fn active() -> Self {
        Self::default()
    }

    /// Archived topics, no other constraint
    pub fn archived() -> Self {
        Self {
            archived_only: true,
            ..Self::default()
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.categories.insert(category.into());
        self
    }

    pub fn author(mut self, author: User) -> Self {
        self.authors.insert(author);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    /// Build the SQL predicate and its parameters
    ///
    /// Date bounds become a half-open range of UTC milliseconds covering
    /// whole local days in `tz`.
    pub(crate) fn to_sql(&self, tz: Tz) -> StoreResult<(String, Vec<Value>)> {
        let mut clauses = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        clauses.push(if self.archived_only {
            "archived_at IS NOT NULL".to_string()
        } else {
            "archived_at IS NULL".to_string()
        });

        if !self.categories.is_empty() {
            clauses.push(format!("category IN ({})", placeholders(self.categories.len())));
            params.extend(self.categories.iter().cloned().map(Value::Text));
        }

        if !self.authors.is_empty() {
            clauses.push(format!("created_by IN ({})", placeholders(self.authors.len())));
            params.extend(
                self.authors
                    .iter()
                    .map(|u| Value::Text(u.as_str().to_string())),
            );
        }

        if let Some(from) = self.date_from {
            clauses.push("created_at >= ?".to_string());
            params.push(Value::Integer(start_of_day_millis(from, tz)?));
        }

        if let Some(to) = self.date_to {
            let next = to
                .checked_add_days(Days::new(1))
                .ok_or_else(|| StoreError::validation(format!("date out of range: {}", to)))?;
            clauses.push("created_at < ?".to_string());
            params.push(Value::Integer(start_of_day_millis(next, tz)?));
        }

        Ok((clauses.join(" AND "), params))
    }

    /// Apply the constraints that are evaluated outside SQL
    pub(crate) fn retain(&self, topics: &mut Vec<Topic>) {
        if let Some(text) = self.text.as_deref() {
            topics.retain(|t| t.matches_text(text));
        }
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// UTC milliseconds of the first instant of `date` in `tz`
///
/// Usually local midnight. Where a DST gap swallows midnight the day starts
/// at the first local minute that exists.
fn start_of_day_millis(date: NaiveDate, tz: Tz) -> StoreResult<i64> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| StoreError::validation(format!("invalid date: {}", date)))?;
    (0..=MAX_GAP_MINUTES)
        .find_map(|m| {
            tz.from_local_datetime(&(midnight + Duration::minutes(m)))
                .earliest()
        })
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| StoreError::validation(format!("no start of day on {} in {}", date, tz)))
}

/// Longest DST gap searched for the start of a day
const MAX_GAP_MINUTES: i64 = 180;
