use crate::error::DbError;
use core_types::{Limit, Params, SqlFragment, Value};
use std::collections::HashMap;

/// A statement with `:name` placeholders.
///
/// Templates are assembled only from `&'static str` text and validated
/// [`SqlFragment`]s, so nothing supplied at runtime ends up in the SQL text
/// except through bound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    sql: String,
}

/// A template rewritten to `$n` placeholders with values in bind order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub values: Vec<Value>,
}

impl QueryTemplate {
    pub fn new(sql: &'static str) -> Self {
        Self {
            sql: sql.to_string(),
        }
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for segment in scan(&self.sql) {
            if let Segment::Placeholder(name) = segment {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    /// Rewrites `:name` to `$n` and orders `params` to match.
    ///
    /// A name used several times binds once. Every placeholder must have a
    /// value and every value must be used.
    pub fn bind(&self, params: &Params) -> Result<BoundQuery, DbError> {
        let mut sql = String::with_capacity(self.sql.len());
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut values = Vec::new();

        for segment in scan(&self.sql) {
            match segment {
                Segment::Text(text) => sql.push_str(text),
                Segment::Placeholder(name) => {
                    let position = match positions.get(name) {
                        Some(p) => *p,
                        None => {
                            let value = params
                                .get(name)
                                .ok_or_else(|| DbError::MissingParameter(name.to_string()))?;
                            values.push(value.clone());
                            positions.insert(name, values.len());
                            values.len()
                        }
                    };
                    sql.push('$');
                    sql.push_str(&position.to_string());
                }
            }
        }

        if let Some(unused) = params.names().find(|n| !positions.contains_key(n)) {
            return Err(DbError::UnusedParameter(unused.to_string()));
        }

        Ok(BoundQuery { sql, values })
    }
}

/// Assembles a [`QueryTemplate`] from static text and validated fragments.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    sql: String,
}

impl QueryBuilder {
    pub fn push(self, sql: &'static str) -> Self {
        self.append(sql)
    }

    /// Appends `sql` only when `condition` holds, e.g. an optional filter.
    pub fn push_if(self, condition: bool, sql: &'static str) -> Self {
        if condition { self.append(sql) } else { self }
    }

    pub fn push_fragment(self, fragment: SqlFragment) -> Self {
        self.append(fragment.as_str())
    }

    pub fn limit(self, limit: Option<Limit>) -> Self {
        match limit {
            Some(l) => self.push_fragment(SqlFragment::limit(l)),
            None => self,
        }
    }

    pub fn build(self) -> QueryTemplate {
        QueryTemplate { sql: self.sql }
    }

    fn append(mut self, sql: &str) -> Self {
        if !self.sql.is_empty() && !self.sql.ends_with(char::is_whitespace) {
            self.sql.push(' ');
        }
        self.sql.push_str(sql);
        self
    }
}

enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

/// Splits SQL into literal text and `:name` placeholders.
///
/// Quoted strings, quoted identifiers, `--` comments and `::` casts are
/// passed through untouched.
fn scan(sql: &str) -> Vec<Segment<'_>> {
    let bytes = sql.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                i += 1;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b':' if bytes.get(i + 1) == Some(&b':') => i += 2,
            b':' if bytes
                .get(i + 1)
                .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_') =>
            {
                let name_start = i + 1;
                let mut end = name_start;
                while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                if start < i {
                    segments.push(Segment::Text(&sql[start..i]));
                }
                segments.push(Segment::Placeholder(&sql[name_start..end]));
                i = end;
                start = end;
            }
            _ => i += 1,
        }
    }

    let end = bytes.len();
    if start < end {
        segments.push(Segment::Text(&sql[start..end]));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_become_positional() {
        let template = QueryTemplate::new(
            "SELECT * FROM jvd_ra WHERE kaisai_nen BETWEEN :start_year AND :end_year AND x = :start_year",
        );
        let params = Params::new().with("start_year", "2020").with("end_year", "2024");
        let bound = template.bind(&params).unwrap();
        assert_eq!(
            bound.sql,
            "SELECT * FROM jvd_ra WHERE kaisai_nen BETWEEN $1 AND $2 AND x = $1"
        );
        assert_eq!(bound.values, vec![Value::from("2020"), Value::from("2024")]);
        assert_eq!(template.placeholders(), vec!["start_year", "end_year"]);
    }

    #[test]
    fn casts_strings_and_comments_are_not_placeholders() {
        let template = QueryTemplate::new(
            "SELECT COUNT(*)::NUMERIC, ':not_me', \":nor_me\" -- :comment\nFROM t WHERE a = :a",
        );
        let bound = template.bind(&Params::new().with("a", 1i64)).unwrap();
        assert_eq!(
            bound.sql,
            "SELECT COUNT(*)::NUMERIC, ':not_me', \":nor_me\" -- :comment\nFROM t WHERE a = $1"
        );
        assert_eq!(bound.values, vec![Value::Int(1)]);
    }

    #[test]
    fn missing_and_unused_parameters_fail() {
        let template = QueryTemplate::new("SELECT :a");
        assert!(matches!(
            template.bind(&Params::new()),
            Err(DbError::MissingParameter(name)) if name == "a"
        ));
        assert!(matches!(
            template.bind(&Params::new().with("a", 1i64).with("b", 2i64)),
            Err(DbError::UnusedParameter(name)) if name == "b"
        ));
    }

    #[test]
    fn builder_joins_fragments_and_limits() {
        let template = QueryTemplate::builder()
            .push("SELECT * FROM jvd_ra")
            .push_if(false, "WHERE 1 = 0")
            .push("ORDER BY kaisai_nen")
            .limit(Some(Limit::new(10).unwrap()))
            .build();
        assert_eq!(template.sql(), "SELECT * FROM jvd_ra ORDER BY kaisai_nen LIMIT 10");

        let unlimited = QueryTemplate::builder().push("SELECT 1").limit(None).build();
        assert_eq!(unlimited.sql(), "SELECT 1");
    }
}
