//! Turns trip form fields into the natural-language query the planner expects

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::fields::{Field, TripFields, ValidationErrors};

/// Date format accepted for the trip range
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A finished planning request, built once per submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripQuery(String);

impl TripQuery {
    /// Wrap an already written trip description
    pub fn free_form(text: impl AsRef<str>) -> Result<Self, ValidationErrors> {
        let text = text.as_ref().trim();
        debug!(len = text.len(), "TripQuery::free_form: called");
        if text.is_empty() {
            let mut errors = ValidationErrors::new();
            errors.require(Field::Query);
            return Err(errors);
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// JSON body for the planning endpoint
    pub fn to_request_body(&self) -> serde_json::Value {
        serde_json::json!({ "user_query": self.0 })
    }
}

impl fmt::Display for TripQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate the form and build the query
///
/// Every problem is reported at once. Required fields that are blank get a
/// "required" message; format checks only run on fields that are present.
pub fn build_query(fields: &TripFields) -> Result<TripQuery, ValidationErrors> {
    debug!(?fields, "build_query: called");
    let mut errors = ValidationErrors::new();

    let destination = required(&fields.destination, Field::Destination, &mut errors);
    let origin = required(&fields.origin, Field::Origin, &mut errors);
    let budget = required(&fields.budget, Field::Budget, &mut errors);

    let start = required(&fields.start_date, Field::StartDate, &mut errors)
        .and_then(|s| parse_date(s, Field::StartDate, &mut errors));
    let end = required(&fields.end_date, Field::EndDate, &mut errors)
        .and_then(|s| parse_date(s, Field::EndDate, &mut errors));

    let days = match (start, end) {
        (Some(start), Some(end)) if end < start => {
            debug!(%start, %end, "build_query: end before start");
            errors.add(Field::EndDate, "End date must not be before the start date.");
            None
        }
        (Some(start), Some(end)) => Some((end - start).num_days() + 1),
        _ => None,
    };

    let people = required(&fields.people, Field::People, &mut errors).and_then(|s| match s.parse::<u32>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            debug!(people = %s, "build_query: invalid party size");
            errors.add(Field::People, "Number of people must be a positive whole number.");
            None
        }
    });

    // Every check that fails leaves its value as None
    let (Some(destination), Some(origin), Some(budget), Some(start), Some(end), Some(days), Some(people)) =
        (destination, origin, budget, start, end, days, people)
    else {
        debug!(error_count = errors.len(), "build_query: validation failed");
        return Err(errors);
    };

    let mut query = format!(
        "Plan a trip to {} from {}. Dates: {} to {} ({} {}). Number of people: {}. Our budget is around {}.",
        destination,
        origin,
        start.format(DATE_FORMAT),
        end.format(DATE_FORMAT),
        days,
        if days == 1 { "day" } else { "days" },
        people,
        budget,
    );

    if let Some(daily) = fields.daily_budget.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        debug!(%daily, "build_query: adding daily budget");
        query.push_str(&format!(" Daily spending budget per person: {}.", daily));
    }

    let interests: Vec<&str> = fields
        .interests
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .collect();
    if !interests.is_empty() {
        debug!(count = interests.len(), "build_query: adding interests");
        query.push_str(&format!(" We are interested in {}.", interests.join(", ")));
    }

    Ok(TripQuery(query))
}

fn required<'a>(value: &'a str, field: Field, errors: &mut ValidationErrors) -> Option<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        debug!(%field, "required: missing");
        errors.require(field);
        None
    } else {
        Some(value)
    }
}

fn parse_date(value: &str, field: Field, errors: &mut ValidationErrors) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(value, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            debug!(%field, %value, error = %e, "parse_date: invalid date");
            errors.add(field, format!("{} must be a date in YYYY-MM-DD format.", field.label()));
            None
        }
    }
}
