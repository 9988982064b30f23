//! Validation for names that end up inside SQL text.
//!
//! Values are always bound as parameters. Collection names and JSON field
//! names are the exception: they are spliced into JSON path expressions, so
//! they are checked here first.

use thiserror::Error;

/// Maximum length for identifiers (collection names, field names)
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

const SQL_KEYWORDS: &[&str] = &[
  "ALTER", "AND", "CREATE", "DELETE", "DROP", "EXEC", "FROM", "GRANT", "INSERT", "JOIN", "OR",
  "REVOKE", "SELECT", "TABLE", "TRUNCATE", "UNION", "UPDATE", "WHERE",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlSanitizeError {
  #[error("Identifier cannot be empty")]
  EmptyIdentifier,
  #[error("Identifier too long: {0} > {MAX_IDENTIFIER_LENGTH}")]
  IdentifierTooLong(usize),
  #[error("Identifier must start with letter or underscore, got '{0}'")]
  InvalidIdentifierStart(char),
  #[error("Invalid character '{0}' in identifier")]
  InvalidIdentifierChar(char),
  #[error("Collection names must be lowercase alphanumeric or underscore, got '{0}'")]
  InvalidCollectionChar(char),
  #[error("'{0}' is a reserved SQL keyword")]
  ReservedKeyword(String),
}

fn check_common(s: &str) -> Result<(), SqlSanitizeError> {
  let Some(first) = s.chars().next() else {
    return Err(SqlSanitizeError::EmptyIdentifier);
  };
  if s.len() > MAX_IDENTIFIER_LENGTH {
    return Err(SqlSanitizeError::IdentifierTooLong(s.len()));
  }
  if !first.is_ascii_alphabetic() && first != '_' {
    return Err(SqlSanitizeError::InvalidIdentifierStart(first));
  }
  if SQL_KEYWORDS.contains(&s.to_uppercase().as_str()) {
    return Err(SqlSanitizeError::ReservedKeyword(s.to_string()));
  }
  Ok(())
}

/// Validates a top-level document field name (used as `$.field`).
pub fn validate_identifier(s: &str) -> Result<(), SqlSanitizeError> {
  if let Some(c) = s.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
    return Err(SqlSanitizeError::InvalidIdentifierChar(c));
  }
  check_common(s)
}

/// Validates a collection name: lowercase alphanumeric and underscore only.
pub fn validate_collection_name(s: &str) -> Result<(), SqlSanitizeError> {
  if let Some(c) = s
    .chars()
    .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '_')
  {
    return Err(SqlSanitizeError::InvalidCollectionChar(c));
  }
  check_common(s)
}
