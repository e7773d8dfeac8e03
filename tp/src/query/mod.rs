//! Request building: trip form fields to a planner query

mod builder;
mod fields;

pub use builder::{DATE_FORMAT, TripQuery, build_query};
pub use fields::{Field, TripFields, ValidationErrors};
