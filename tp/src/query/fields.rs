//! Trip form fields and their validation errors

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw trip parameters as the user entered them
///
/// Values are kept as strings so that validation can report every problem
/// at once instead of failing on the first parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripFields {
    pub destination: String,
    pub origin: String,
    /// Start date, `YYYY-MM-DD`
    pub start_date: String,
    /// End date, `YYYY-MM-DD`
    pub end_date: String,
    /// Party size
    pub people: String,
    /// Overall budget, free-form ("3000 EUR")
    pub budget: String,
    pub interests: Vec<String>,
    /// Daily spending budget per person, free-form
    pub daily_budget: Option<String>,
}

/// Identifies one form field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Destination,
    Origin,
    StartDate,
    EndDate,
    People,
    Budget,
    Interests,
    DailyBudget,
    /// Free-form request text
    Query,
}

impl Field {
    /// Form key, as used on the wire and in error maps
    pub fn key(&self) -> &'static str {
        match self {
            Field::Destination => "destination",
            Field::Origin => "origin",
            Field::StartDate => "start_date",
            Field::EndDate => "end_date",
            Field::People => "people",
            Field::Budget => "budget",
            Field::Interests => "interests",
            Field::DailyBudget => "daily_budget",
            Field::Query => "query",
        }
    }

    /// Human readable label for messages
    pub fn label(&self) -> &'static str {
        match self {
            Field::Destination => "Destination",
            Field::Origin => "Origin",
            Field::StartDate => "Start date",
            Field::EndDate => "End date",
            Field::People => "Number of people",
            Field::Budget => "Budget",
            Field::Interests => "Interests",
            Field::DailyBudget => "Daily spending budget",
            Field::Query => "Trip description",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Field → message map produced when a form cannot become a query
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", summarize(.errors))]
pub struct ValidationErrors {
    errors: BTreeMap<Field, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for a field; the first message for a field wins
    pub fn add(&mut self, field: Field, message: impl Into<String>) {
        self.errors.entry(field).or_insert_with(|| message.into());
    }

    /// Record the standard "is required" message
    pub fn require(&mut self, field: Field) {
        self.add(field, format!("{} is required.", field.label()));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    /// Fields with errors, in form order
    pub fn fields(&self) -> Vec<Field> {
        self.errors.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.errors.iter().map(|(field, message)| (*field, message.as_str()))
    }
}

fn summarize(errors: &BTreeMap<Field, String>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{}: {}", field, message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_message_wins() {
        let mut errors = ValidationErrors::new();
        errors.require(Field::Origin);
        errors.add(Field::Origin, "something else");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get(Field::Origin), Some("Origin is required."));
    }

    #[test]
    fn test_fields_in_form_order() {
        let mut errors = ValidationErrors::new();
        errors.require(Field::Budget);
        errors.require(Field::Destination);
        errors.require(Field::EndDate);

        assert_eq!(errors.fields(), vec![Field::Destination, Field::EndDate, Field::Budget]);
    }

    #[test]
    fn test_display_lists_every_field() {
        let mut errors = ValidationErrors::new();
        errors.require(Field::Destination);
        errors.add(Field::People, "Number of people must be a positive whole number.");

        let text = errors.to_string();
        assert!(text.contains("destination: Destination is required."));
        assert!(text.contains("people: Number of people must be a positive whole number."));
    }

    #[test]
    fn test_field_keys_serialize_snake_case() {
        let json = serde_json::to_string(&Field::DailyBudget).unwrap();
        assert_eq!(json, r#""daily_budget""#);
        assert_eq!(Field::StartDate.to_string(), "start_date");
    }
}
