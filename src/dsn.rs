//! Connection-string (DSN) parsing for emulator-hosted databases.
//!
//! A DSN names a logical database as
//! `projects/<PROJECT>/instances/<INSTANCE>/databases/<DATABASE>`. Parsing is
//! pure string processing: markers are located by their first occurrence, so a
//! marker substring appearing inside a value fragment is undefined behavior
//! (a documented limitation of the format, not something we try to detect).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const PROJECT_MARKER: &str = "projects/";
const INSTANCE_MARKER: &str = "/instances/";
const DATABASE_MARKER: &str = "/databases/";

/// Placeholder rendered for unset fields so a malformed configuration stays
/// readable in error output instead of silently collapsing segments.
const UNSPECIFIED: &str = "!!UNSPECIFIED!!";

/// Result type for DSN parsing.
pub type Result<T> = std::result::Result<T, DsnError>;

/// Errors produced while parsing a DSN.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DsnError {
    /// A required marker substring was not present.
    #[error("could not find marker {marker:?} in {input:?}")]
    MissingMarker {
        /// The marker that was absent.
        marker: &'static str,
        /// The offending input.
        input: String,
    },

    /// Markers were present but in the wrong relative order.
    #[error(
        "invalid dsn: expected projects/PROJECT/instances/INSTANCE/databases/DATABASE, got {input:?}"
    )]
    OutOfOrder {
        /// The offending input.
        input: String,
    },

    /// A segment between markers was empty.
    #[error("could not find a {field} name in {input:?}")]
    EmptyField {
        /// Which segment was empty ("project", "instance" or "database").
        field: &'static str,
        /// The offending input.
        input: String,
    },
}

/// Structured identifier for a logical database resource.
///
/// Immutable after construction. Round-trip law: for any well-formed DSN `s`,
/// `DatabaseId::parse(s)?.to_string() == s`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseId {
    /// Name of the project.
    pub project: String,
    /// Name of the instance.
    pub instance: String,
    /// Name of the database.
    pub database: String,
}

impl DatabaseId {
    /// Parse a DSN of the form
    /// `projects/<PROJECT>/instances/<INSTANCE>/databases/<DATABASE>`.
    pub fn parse(dsn: &str) -> Result<Self> {
        let database_idx = dsn.find(DATABASE_MARKER).ok_or(DsnError::MissingMarker {
            marker: DATABASE_MARKER,
            input: dsn.to_string(),
        })?;
        let instance_idx = dsn.find(INSTANCE_MARKER).ok_or(DsnError::MissingMarker {
            marker: INSTANCE_MARKER,
            input: dsn.to_string(),
        })?;

        if database_idx < instance_idx {
            return Err(DsnError::OutOfOrder {
                input: dsn.to_string(),
            });
        }

        let project = dsn[..instance_idx]
            .strip_prefix(PROJECT_MARKER)
            .unwrap_or(&dsn[..instance_idx]);
        let instance = &dsn[instance_idx + INSTANCE_MARKER.len()..database_idx];
        let database = &dsn[database_idx + DATABASE_MARKER.len()..];

        for (field, value) in [
            ("project", project),
            ("instance", instance),
            ("database", database),
        ] {
            if value.is_empty() {
                return Err(DsnError::EmptyField {
                    field,
                    input: dsn.to_string(),
                });
            }
        }

        Ok(Self {
            project: project.to_string(),
            instance: instance.to_string(),
            database: database.to_string(),
        })
    }

    /// Resource path of the owning project: `projects/<PROJECT>`.
    pub fn project_path(&self) -> String {
        format!("{PROJECT_MARKER}{}", self.project)
    }

    /// Resource path of the owning instance:
    /// `projects/<PROJECT>/instances/<INSTANCE>`.
    pub fn instance_path(&self) -> String {
        format!(
            "{PROJECT_MARKER}{}{INSTANCE_MARKER}{}",
            self.project, self.instance
        )
    }
}

impl FromStr for DatabaseId {
    type Err = DsnError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = |v: &str| {
            if v.is_empty() {
                UNSPECIFIED.to_string()
            } else {
                v.to_string()
            }
        };
        write!(
            f,
            "{PROJECT_MARKER}{}{INSTANCE_MARKER}{}{DATABASE_MARKER}{}",
            field(&self.project),
            field(&self.instance),
            field(&self.database)
        )
    }
}
