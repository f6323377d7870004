//! nba-stats: decoding for stats.nba.com result-set payloads
//!
//! Every stats endpoint answers with the same envelope: a `resource` name, the
//! echoed `parameters`, and zero or more named tables under `resultSets`, each
//! with its own `headers` and `rowSet`. This crate provides:
//!
//! - [`Envelope::decode`] to turn a response body into an immutable envelope
//! - [`Envelope::get_dataset`] to pick a table by name
//! - [`Dataset`] to read rows as header-keyed [`Record`]s
//! - [`data::DataClient`] and [`endpoints`] to fetch envelopes over HTTP

pub mod value;
pub mod error;
pub mod model;
pub mod dataset;
pub mod data;
pub mod endpoints;

pub use crate::dataset::{Dataset, Record};
pub use crate::error::Error;
pub use crate::model::{is_valid_json, Envelope, Table};
pub use crate::value::Value;

pub type Result<T> = std::result::Result<T, Error>;
