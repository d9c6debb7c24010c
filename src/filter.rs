//! Filter expressions for organization listings.
//!
//! A filter is a conjunction of clauses:
//!
//! ```text
//! <attribute> <operator> <value> [and <attribute> <operator> <value>]*
//! ```
//!
//! Attributes: `id`, `name`, `description`, `status`, `parentId`, `created`,
//! `lastModified` and `attributes.<key>`. Operators: `eq`, `ne`, `co`, `sw`,
//! `ew`, `gt`, `ge`, `lt`, `le` and the value-less `pr`. Values containing
//! spaces are written in double quotes.
//!
//! ```rust
//! use organization_manager::filter::Filter;
//! use organization_manager::model::Organization;
//!
//! let filter = Filter::parse(r#"name sw "Acme" and attributes.region eq EU"#).unwrap();
//! let org = Organization::new("Acme Europe").with_attribute("region", "EU");
//! assert!(filter.matches(&org));
//! ```

use crate::error::{OrganizationError, OrganizationResult};
use crate::model::Organization;
use chrono::{DateTime, Utc};
use std::fmt;

/// Comparison operator of a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    Contains,
    StartsWith,
    EndsWith,
    Present,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl FilterOperator {
    fn parse(token: &str) -> OrganizationResult<Self> {
        match token.to_ascii_lowercase().as_str() {
            "eq" => Ok(Self::Equal),
            "ne" => Ok(Self::NotEqual),
            "co" => Ok(Self::Contains),
            "sw" => Ok(Self::StartsWith),
            "ew" => Ok(Self::EndsWith),
            "pr" => Ok(Self::Present),
            "gt" => Ok(Self::GreaterThan),
            "ge" => Ok(Self::GreaterThanOrEqual),
            "lt" => Ok(Self::LessThan),
            "le" => Ok(Self::LessThanOrEqual),
            other => Err(OrganizationError::bad_request(format!(
                "Unsupported filter operator '{}'",
                other
            ))),
        }
    }

    fn is_substring_match(&self) -> bool {
        matches!(self, Self::Contains | Self::StartsWith | Self::EndsWith)
    }

    fn compare<T: PartialOrd + ?Sized>(&self, actual: &T, expected: &T) -> bool {
        match self {
            Self::Equal => actual == expected,
            Self::NotEqual => actual != expected,
            Self::GreaterThan => actual > expected,
            Self::GreaterThanOrEqual => actual >= expected,
            Self::LessThan => actual < expected,
            Self::LessThanOrEqual => actual <= expected,
            Self::Contains | Self::StartsWith | Self::EndsWith | Self::Present => false,
        }
    }
}

/// Organization field a clause tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterAttribute {
    Id,
    Name,
    Description,
    Status,
    ParentId,
    Created,
    LastModified,
    Attribute(String),
}

impl FilterAttribute {
    fn parse(token: &str) -> OrganizationResult<Self> {
        if let Some(key) = token.strip_prefix("attributes.") {
            if key.is_empty() {
                return Err(OrganizationError::bad_request(
                    "Filter attribute key must not be empty",
                ));
            }
            return Ok(Self::Attribute(key.to_string()));
        }
        match token {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "description" => Ok(Self::Description),
            "status" => Ok(Self::Status),
            "parentId" => Ok(Self::ParentId),
            "created" | "meta.created" => Ok(Self::Created),
            "lastModified" | "meta.lastModified" => Ok(Self::LastModified),
            other => Err(OrganizationError::bad_request(format!(
                "Unsupported filter attribute '{}'",
                other
            ))),
        }
    }

    fn is_timestamp(&self) -> bool {
        matches!(self, Self::Created | Self::LastModified)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FilterValue {
    None,
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// A single `<attribute> <operator> <value>` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub attribute: FilterAttribute,
    pub operator: FilterOperator,
    value: FilterValue,
}

impl FilterClause {
    fn matches(&self, org: &Organization) -> bool {
        match (&self.attribute, &self.value) {
            (FilterAttribute::Created, FilterValue::Timestamp(expected)) => {
                self.operator.compare(&org.created, expected)
            }
            (FilterAttribute::LastModified, FilterValue::Timestamp(expected)) => {
                self.operator.compare(&org.last_modified, expected)
            }
            (attribute, value) => {
                let actual = match attribute {
                    FilterAttribute::Id => Some(org.id.as_str()),
                    FilterAttribute::Name => Some(org.name.as_str()),
                    FilterAttribute::Description => org.description.as_deref(),
                    FilterAttribute::Status => Some(org.status.as_str()),
                    FilterAttribute::ParentId => org.parent_id.as_deref(),
                    FilterAttribute::Attribute(key) => org.attribute(key),
                    FilterAttribute::Created | FilterAttribute::LastModified => None,
                };
                self.matches_text(actual, value)
            }
        }
    }

    fn matches_text(&self, actual: Option<&str>, value: &FilterValue) -> bool {
        if self.operator == FilterOperator::Present {
            return actual.is_some_and(|v| !v.is_empty());
        }
        let (Some(actual), FilterValue::Text(expected)) = (actual, value) else {
            return self.operator == FilterOperator::NotEqual;
        };
        match self.operator {
            FilterOperator::Contains => actual.contains(expected.as_str()),
            FilterOperator::StartsWith => actual.starts_with(expected.as_str()),
            FilterOperator::EndsWith => actual.ends_with(expected.as_str()),
            op => op.compare(actual, expected.as_str()),
        }
    }
}

/// Parsed filter expression; a conjunction of clauses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    clauses: Vec<FilterClause>,
    source: String,
}

impl Filter {
    /// Parse a filter expression. Malformed input is a bad request.
    pub fn parse(expression: &str) -> OrganizationResult<Self> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err(OrganizationError::bad_request("Filter expression is empty"));
        }

        let mut clauses = Vec::new();
        let mut tokens = tokens.into_iter().peekable();
        loop {
            let attribute = match tokens.next() {
                Some(Token::Word(word)) => FilterAttribute::parse(&word)?,
                _ => {
                    return Err(OrganizationError::bad_request(format!(
                        "Expected attribute name in filter '{}'",
                        expression
                    )));
                }
            };
            let operator = match tokens.next() {
                Some(Token::Word(word)) => FilterOperator::parse(&word)?,
                _ => {
                    return Err(OrganizationError::bad_request(format!(
                        "Expected operator after '{:?}' in filter '{}'",
                        attribute, expression
                    )));
                }
            };

            let value = if operator == FilterOperator::Present {
                FilterValue::None
            } else {
                let raw = match tokens.next() {
                    Some(Token::Word(word)) | Some(Token::Quoted(word)) => word,
                    None => {
                        return Err(OrganizationError::bad_request(format!(
                            "Missing value in filter '{}'",
                            expression
                        )));
                    }
                };
                clause_value(&attribute, operator, raw)?
            };

            clauses.push(FilterClause {
                attribute,
                operator,
                value,
            });

            match tokens.next() {
                None => break,
                Some(Token::Word(word)) if word.eq_ignore_ascii_case("and") => {
                    if tokens.peek().is_none() {
                        return Err(OrganizationError::bad_request(
                            "Filter ends with a dangling 'and'",
                        ));
                    }
                }
                Some(other) => {
                    return Err(OrganizationError::bad_request(format!(
                        "Unexpected token '{}' in filter '{}'",
                        other, expression
                    )));
                }
            }
        }

        Ok(Self {
            clauses,
            source: expression.trim().to_string(),
        })
    }

    /// Parse an optional expression; blank input means no filter.
    pub fn parse_optional(expression: Option<&str>) -> OrganizationResult<Option<Self>> {
        match expression.map(str::trim) {
            None | Some("") => Ok(None),
            Some(expression) => Self::parse(expression).map(Some),
        }
    }

    pub fn matches(&self, org: &Organization) -> bool {
        self.clauses.iter().all(|clause| clause.matches(org))
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn clause_value(
    attribute: &FilterAttribute,
    operator: FilterOperator,
    raw: String,
) -> OrganizationResult<FilterValue> {
    if attribute.is_timestamp() {
        if operator.is_substring_match() {
            return Err(OrganizationError::bad_request(format!(
                "Operator {:?} is not supported for timestamp attributes",
                operator
            )));
        }
        let parsed = DateTime::parse_from_rfc3339(&raw).map_err(|e| {
            OrganizationError::bad_request(format!("Invalid timestamp '{}': {}", raw, e))
        })?;
        return Ok(FilterValue::Timestamp(parsed.with_timezone(&Utc)));
    }
    if *attribute == FilterAttribute::Status {
        return Ok(FilterValue::Text(raw.to_ascii_uppercase()));
    }
    Ok(FilterValue::Text(raw))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(word) => f.write_str(word),
            Token::Quoted(text) => write!(f, "\"{}\"", text),
        }
    }
}

fn tokenize(expression: &str) -> OrganizationResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some(escaped) => text.push(escaped),
                        None => break,
                    },
                    '"' => {
                        closed = true;
                        break;
                    }
                    other => text.push(other),
                }
            }
            if !closed {
                return Err(OrganizationError::bad_request(format!(
                    "Unterminated quoted value in filter '{}'",
                    expression
                )));
            }
            tokens.push(Token::Quoted(text));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }

    Ok(tokens)
}
