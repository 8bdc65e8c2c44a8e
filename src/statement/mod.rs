//! SQL statements with bound parameters.
//!
//! A [`Statement`] never interpolates values into SQL text. Placeholders are
//! `?` for positional parameters and `#{name}` for named ones; rendering
//! rewrites each placeholder into the driver's own syntax and collects the
//! values in placeholder order.

mod cache;
mod parser;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::DbError;
use crate::udbc::driver::Driver;
use crate::udbc::serializer::{Params, to_params};
use crate::udbc::value::Value;

pub use parser::{Segment, parse_statement, split_statements};

/// SQL text plus parameters. Immutable once built.
#[derive(Clone, PartialEq)]
pub struct Statement {
    sql: String,
    positional: Vec<Value>,
    named: IndexMap<String, Value>,
    cached: bool,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            positional: Vec::new(),
            named: IndexMap::new(),
            cached: true,
        }
    }

    /// A one-off statement whose parse is not kept in the statement cache.
    pub fn ad_hoc(sql: impl Into<String>) -> Self {
        Self {
            cached: false,
            ..Self::new(sql)
        }
    }

    /// Builds a statement whose parameters come from a `Serialize` value.
    pub fn with_args<T: Serialize + ?Sized>(
        sql: impl Into<String>,
        args: &T,
    ) -> Result<Self, DbError> {
        let stmt = Self::new(sql);
        Ok(match to_params(args)? {
            Params::Positional(values) => Self {
                positional: values,
                ..stmt
            },
            Params::Named(values) => Self {
                named: values.into_iter().collect(),
                ..stmt
            },
        })
    }

    /// Appends a value for the next `?`.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Sets the value for every `#{name}`.
    pub fn bind_named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_count(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    /// Rewrites placeholders for `driver` and returns the values in binding order.
    pub fn render(&self, driver: &dyn Driver) -> Result<(String, Vec<Value>), DbError> {
        let segments = if self.cached {
            cache::get_segments(&self.sql)
        } else {
            Arc::new(parse_statement(&self.sql))
        };

        let mut sql = String::with_capacity(self.sql.len());
        let mut params = Vec::with_capacity(self.param_count());
        let mut next_positional = self.positional.iter();

        for segment in segments.iter() {
            match segment {
                Segment::Text(text) => sql.push_str(text),
                Segment::Positional => {
                    let value = next_positional.next().ok_or_else(|| {
                        DbError::Value(format!(
                            "statement has more `?` placeholders than the {} bound values",
                            self.positional.len()
                        ))
                    })?;
                    params.push(value.clone());
                    sql.push_str(&driver.placeholder(params.len(), ""));
                }
                Segment::Named(name) => {
                    let value = self.named.get(name).ok_or_else(|| {
                        DbError::Value(format!("no value bound for parameter `{}`", name))
                    })?;
                    params.push(value.clone());
                    sql.push_str(&driver.placeholder(params.len(), name));
                }
            }
        }

        let unused = next_positional.count();
        if unused > 0 {
            return Err(DbError::Value(format!(
                "{} positional values bound but only {} `?` placeholders found",
                self.positional.len(),
                self.positional.len() - unused
            )));
        }

        Ok((sql, params))
    }
}

impl fmt::Debug for Statement {
    // Parameter values may carry secrets; only their names and count are shown.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("positional", &self.positional.len())
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Statement::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Statement::new(sql)
    }
}
