//! Page parser
//!
//! Turns a raw API response into a batch of records plus the cursor for the
//! next request.
//!
//! Expected shape:
//!
//! ```json
//! {
//!   "results": [{"sched_a_sk": 5, ...}, {"sched_a_sk": 9, ...}],
//!   "pagination": {"last_indexes": {"last_index": 9.0}}
//! }
//! ```
//!
//! `last_indexes: null` or an empty `results` array marks the terminal page
//! of a sweep.

use crate::error::{Error, Result};
use crate::types::{cursor_from_value, Cursor, Endpoint, JsonValue, Record};

/// One validated page
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    /// Records in server iteration order
    pub records: Vec<Record>,
    /// Cursor for the next request; `None` on the terminal page
    pub next_cursor: Option<Cursor>,
    /// Primary key of the last record on this page
    pub last_record_key: Option<Cursor>,
}

impl ParsedPage {
    /// Whether this page ends the sweep
    pub fn is_terminal(&self) -> bool {
        self.next_cursor.is_none()
    }

    /// Number of records on the page
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the page has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parser for one endpoint's pages
#[derive(Debug, Clone)]
pub struct PageParser {
    pk_field: String,
}

impl PageParser {
    /// Create a parser keyed on `pk_field`
    pub fn new(pk_field: impl Into<String>) -> Self {
        Self {
            pk_field: pk_field.into(),
        }
    }

    /// Create a parser for an endpoint's primary key
    pub fn for_endpoint(endpoint: Endpoint) -> Self {
        Self::new(endpoint.pk_field())
    }

    /// Primary-key field this parser reads
    pub fn pk_field(&self) -> &str {
        &self.pk_field
    }

    /// Parse a response body
    ///
    /// The whole page is validated before anything is returned, so a
    /// malformed page never yields a partial batch.
    pub fn parse(&self, body: JsonValue) -> Result<ParsedPage> {
        let JsonValue::Object(mut body) = body else {
            return Err(Error::malformed("response body is not a JSON object"));
        };

        let api_cursor = match body
            .get("pagination")
            .ok_or_else(|| Error::malformed("missing 'pagination'"))?
            .get("last_indexes")
        {
            None => return Err(Error::malformed("missing 'pagination.last_indexes'")),
            Some(JsonValue::Null) => None,
            Some(JsonValue::Object(indexes)) => {
                let value = indexes.get("last_index").ok_or_else(|| {
                    Error::malformed("missing 'pagination.last_indexes.last_index'")
                })?;
                Some(cursor_from_value(value).ok_or_else(|| {
                    Error::malformed(format!("invalid last_index {value}"))
                })?)
            }
            Some(other) => {
                return Err(Error::malformed(format!(
                    "'pagination.last_indexes' is neither an object nor null: {other}"
                )))
            }
        };

        let records = match body.remove("results") {
            Some(JsonValue::Array(records)) => records,
            Some(_) => return Err(Error::malformed("'results' is not an array")),
            None => return Err(Error::malformed("missing 'results'")),
        };

        let mut last_record_key = None;
        for (idx, record) in records.iter().enumerate() {
            let key = record
                .get(&self.pk_field)
                .and_then(cursor_from_value)
                .ok_or_else(|| {
                    Error::malformed(format!(
                        "record {idx} has no usable '{}' value",
                        self.pk_field
                    ))
                })?;
            last_record_key = Some(key);
        }

        // The last record's key wins over the API's own token; resuming
        // later depends on exactly this tie-break. An empty page ends the
        // stream whatever token it carries.
        let next_cursor = api_cursor.and(last_record_key);

        Ok(ParsedPage {
            records,
            next_cursor,
            last_record_key,
        })
    }
}
