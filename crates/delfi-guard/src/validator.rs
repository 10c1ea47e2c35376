//! SQL security validation.
//!
//! The validator parses candidate SQL and rejects anything outside the
//! read-only policy before it can reach the database. Checks run in a
//! fixed order and the first violation is reported: statement type,
//! dangerous functions, blocked tables, blocked columns, subquery
//! contents.

use std::collections::{BTreeSet, HashSet};
use std::ops::ControlFlow;

use sqlparser::ast::{
    visit_expressions, visit_relations, visit_statements, Expr, ObjectName, ObjectNamePart, Query,
    SetExpr, Statement, TableFactor, TableWithJoins,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use delfi_core::{GatewayError, SecurityConfig, ValidationResult};

use crate::functions::BUILTIN_DANGEROUS_FUNCTIONS;

/// Statement keywords that are rejected unconditionally, even when
/// write operations are enabled.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "DROP", "CREATE", "ALTER", "GRANT", "REVOKE", "SET", "USE", "TRUNCATE",
];

/// Validates generated SQL against the security policy.
///
/// Only single SELECT statements (including CTEs and set operations)
/// pass by default. Write statements require `allow_write_operations`;
/// DDL and administrative statements never pass. Function, table, and
/// column deny lists apply to the whole parse tree, subqueries
/// included.
pub struct SqlValidator {
    dialect: PostgreSqlDialect,
    allow_write_operations: bool,
    allow_explain: bool,
    blocked_functions: HashSet<String>,
    blocked_tables: HashSet<String>,
    blocked_columns: HashSet<String>,
}

impl SqlValidator {
    /// Build a validator from the security policy. Deny list entries
    /// are matched case-insensitively; the built-in function deny list
    /// is always in effect.
    pub fn new(config: &SecurityConfig) -> Self {
        let mut blocked_functions: HashSet<String> = BUILTIN_DANGEROUS_FUNCTIONS
            .iter()
            .map(|f| f.to_string())
            .collect();
        blocked_functions.extend(config.blocked_functions.iter().map(|f| f.to_lowercase()));

        Self {
            dialect: PostgreSqlDialect {},
            allow_write_operations: config.allow_write_operations,
            allow_explain: config.allow_explain,
            blocked_functions,
            blocked_tables: config
                .blocked_tables
                .iter()
                .map(|t| t.to_lowercase())
                .collect(),
            blocked_columns: config
                .blocked_columns
                .iter()
                .map(|c| c.to_lowercase())
                .collect(),
        }
    }

    /// Validate SQL, returning a result instead of an error.
    pub fn validate(&self, sql: &str) -> ValidationResult {
        match self.validate_or_raise(sql) {
            Ok(()) => ValidationResult::all_clear(),
            Err(err) => ValidationResult {
                is_valid: false,
                is_select: false,
                allows_data_modification: false,
                uses_blocked_functions: Vec::new(),
                error_message: Some(err.message),
            },
        }
    }

    /// Validate SQL and fail on the first violation.
    ///
    /// Parse failures and empty input produce an `sql_parse_error`;
    /// policy violations produce a `security_violation`.
    pub fn validate_or_raise(&self, sql: &str) -> Result<(), GatewayError> {
        if sql.trim().is_empty() {
            return Err(GatewayError::sql_parse("SQL query cannot be empty"));
        }

        let statements = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| GatewayError::sql_parse(format!("Failed to parse SQL: {e}")))?;

        if statements.len() > 1 {
            return Err(GatewayError::security_violation(
                "Multiple statements not allowed. Only single SELECT queries are permitted.",
            ));
        }
        let Some(statement) = statements.first() else {
            // Comment-only input tokenizes to nothing.
            return Err(GatewayError::sql_parse("No valid SQL statement found"));
        };

        if let Statement::Explain { analyze, .. } = statement {
            if !self.allow_explain {
                return Err(GatewayError::security_violation(
                    "EXPLAIN statements are not allowed",
                ));
            }
            if *analyze {
                // EXPLAIN ANALYZE runs its subject; plain EXPLAIN only
                // plans it.
                return Err(GatewayError::security_violation(
                    "EXPLAIN ANALYZE statements are not allowed",
                ));
            }
            // Plain EXPLAIN never executes the inner statement, so it
            // is accepted without validating the subject.
            return Ok(());
        }

        self.check_statement_type(statement)?;
        self.check_blocked_functions(statement)?;
        self.check_blocked_tables(statement)?;
        self.check_blocked_columns(statement)?;
        self.check_subquery_safety(statement)?;
        Ok(())
    }

    /// Re-emit the first statement in canonical formatting.
    pub fn normalize_sql(&self, sql: &str) -> Result<String, GatewayError> {
        let statements = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| GatewayError::sql_parse(format!("Failed to normalize SQL: {e}")))?;
        match statements.first() {
            Some(statement) => Ok(statement.to_string()),
            None => Err(GatewayError::sql_parse(
                "Failed to normalize SQL: no statement found",
            )),
        }
    }

    /// All table names referenced anywhere in the SQL, lowercased,
    /// deduplicated, and sorted.
    pub fn extract_tables(&self, sql: &str) -> Result<Vec<String>, GatewayError> {
        let statements = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| GatewayError::sql_parse(format!("Failed to extract tables: {e}")))?;
        if statements.is_empty() {
            return Err(GatewayError::sql_parse(
                "Failed to extract tables: no statement found",
            ));
        }

        let mut tables = BTreeSet::new();
        for statement in &statements {
            let _: ControlFlow<()> = visit_relations(statement, |relation| {
                tables.insert(object_name_tail(relation));
                ControlFlow::Continue(())
            });
        }
        Ok(tables.into_iter().collect())
    }

    fn check_statement_type(&self, statement: &Statement) -> Result<(), GatewayError> {
        match statement {
            Statement::Query(query) => self.check_query_body(&query.body),
            Statement::Insert { .. } => self.check_write_allowed("INSERT"),
            Statement::Update { .. } => self.check_write_allowed("UPDATE"),
            Statement::Delete { .. } => self.check_write_allowed("DELETE"),
            Statement::Merge { .. } => self.check_write_allowed("MERGE"),
            other => {
                let keyword = leading_keyword_of(&other.to_string());
                if FORBIDDEN_KEYWORDS.contains(&keyword.as_str()) {
                    Err(GatewayError::security_violation(format!(
                        "{keyword} statements are not allowed."
                    )))
                } else {
                    Err(GatewayError::security_violation(format!(
                        "Statement type {keyword} is not allowed. Only SELECT queries are permitted."
                    )))
                }
            }
        }
    }

    /// The main query body must resolve to a SELECT or a set operation.
    /// A CTE prefix is already unwrapped here since the body excludes
    /// the WITH clause.
    fn check_query_body(&self, body: &SetExpr) -> Result<(), GatewayError> {
        match body {
            SetExpr::Select(_) | SetExpr::SetOperation { .. } => Ok(()),
            SetExpr::Query(inner) => self.check_query_body(&inner.body),
            other => {
                let keyword = leading_keyword_of(&other.to_string());
                Err(GatewayError::security_violation(format!(
                    "Statement type {keyword} is not allowed. Only SELECT queries are permitted."
                )))
            }
        }
    }

    fn check_write_allowed(&self, keyword: &str) -> Result<(), GatewayError> {
        if self.allow_write_operations {
            Ok(())
        } else {
            Err(GatewayError::security_violation(format!(
                "{keyword} statements are not allowed. Write operations are disabled."
            )))
        }
    }

    /// Deny-listed functions are caught in expression position and in
    /// table function position (`FROM dblink(...)`), including inside
    /// subqueries of any form.
    fn check_blocked_functions(&self, statement: &Statement) -> Result<(), GatewayError> {
        let flow = visit_expressions(statement, |expr| {
            if let Expr::Function(func) = expr {
                let name = object_name_tail(&func.name);
                if self.blocked_functions.contains(&name) {
                    return ControlFlow::Break(name);
                }
            }
            if let Some(query) = expr_subquery(expr) {
                if let Some(name) = self.table_function_match(query) {
                    return ControlFlow::Break(name);
                }
            }
            ControlFlow::Continue(())
        });
        if let ControlFlow::Break(name) = flow {
            return Err(GatewayError::security_violation(format!(
                "Function '{name}' is blocked for security reasons"
            )));
        }

        if let Statement::Query(query) = statement {
            if let Some(name) = self.table_function_match(query) {
                return Err(GatewayError::security_violation(format!(
                    "Function '{name}' is blocked for security reasons"
                )));
            }
        }
        Ok(())
    }

    /// First deny-listed table function reachable from this query's
    /// FROM clauses, CTEs included.
    fn table_function_match(&self, query: &Query) -> Option<String> {
        walk_table_factors(query, &mut |factor| {
            if let TableFactor::Table {
                name,
                args: Some(_),
                ..
            } = factor
            {
                let name = object_name_tail(name);
                if self.blocked_functions.contains(&name) {
                    return Some(name);
                }
            }
            None
        })
    }

    fn check_blocked_tables(&self, statement: &Statement) -> Result<(), GatewayError> {
        if self.blocked_tables.is_empty() {
            return Ok(());
        }
        let flow = visit_relations(statement, |relation| {
            let name = object_name_tail(relation);
            if self.blocked_tables.contains(&name) {
                return ControlFlow::Break(name);
            }
            ControlFlow::Continue(())
        });
        if let ControlFlow::Break(name) = flow {
            return Err(GatewayError::security_violation(format!(
                "Access to table '{name}' is not allowed"
            )));
        }
        Ok(())
    }

    /// Exact-match column blocking: a bare entry blocks the column name
    /// wherever it appears; a `table.column` entry blocks only that
    /// qualified reference. Substring matches never trigger.
    fn check_blocked_columns(&self, statement: &Statement) -> Result<(), GatewayError> {
        if self.blocked_columns.is_empty() {
            return Ok(());
        }
        let flow = visit_expressions(statement, |expr| {
            match expr {
                Expr::Identifier(ident) => {
                    let column = ident.value.to_lowercase();
                    if self.blocked_columns.contains(&column) {
                        return ControlFlow::Break(column);
                    }
                }
                Expr::CompoundIdentifier(parts) => {
                    if let [.., qualifier, column] = parts.as_slice() {
                        let column = column.value.to_lowercase();
                        if self.blocked_columns.contains(&column) {
                            return ControlFlow::Break(column);
                        }
                        let qualified = format!("{}.{column}", qualifier.value.to_lowercase());
                        if self.blocked_columns.contains(&qualified) {
                            return ControlFlow::Break(qualified);
                        }
                    }
                }
                _ => {}
            }
            ControlFlow::Continue(())
        });
        if let ControlFlow::Break(column) = flow {
            return Err(GatewayError::security_violation(format!(
                "Access to column '{column}' is not allowed"
            )));
        }
        Ok(())
    }

    /// Subqueries may contain only SELECT bodies. Any statement nested
    /// below the root (writes smuggled into a query body) is rejected
    /// outright.
    fn check_subquery_safety(&self, statement: &Statement) -> Result<(), GatewayError> {
        let mut is_root = true;
        let flow = visit_statements(statement, |nested| {
            if is_root {
                is_root = false;
                return ControlFlow::Continue(());
            }
            ControlFlow::Break(leading_keyword_of(&nested.to_string()))
        });
        if let ControlFlow::Break(keyword) = flow {
            return Err(GatewayError::security_violation(format!(
                "{keyword} statements in subqueries are not allowed"
            )));
        }

        // Expression-position subqueries anywhere in the tree.
        let flow = visit_expressions(statement, |expr| {
            if let Some(inner) = expr_subquery(expr) {
                if let Some(message) = subquery_violation(inner) {
                    return ControlFlow::Break(message);
                }
            }
            ControlFlow::Continue(())
        });
        if let ControlFlow::Break(message) = flow {
            return Err(GatewayError::security_violation(message));
        }

        // Derived tables in FROM clauses.
        if let Statement::Query(query) = statement {
            if let Some(message) = derived_table_violation(query) {
                return Err(GatewayError::security_violation(message));
            }
        }
        Ok(())
    }
}

/// First keyword of the rendered statement, uppercased. Used to name
/// statement kinds in rejection messages without enumerating every AST
/// variant.
fn leading_keyword_of(rendered: &str) -> String {
    rendered
        .split_whitespace()
        .next()
        .unwrap_or("UNKNOWN")
        .to_uppercase()
}

/// Last identifier of a possibly qualified name, lowercased.
fn object_name_tail(name: &ObjectName) -> String {
    match name.0.last() {
        Some(ObjectNamePart::Identifier(ident)) => ident.value.to_lowercase(),
        Some(other) => other.to_string().to_lowercase(),
        None => String::new(),
    }
}

/// Query body of a subquery in expression position, whichever form the
/// parser gave it: `(SELECT ..)`, `x IN (SELECT ..)`, `EXISTS (..)`.
fn expr_subquery(expr: &Expr) -> Option<&Query> {
    match expr {
        Expr::Subquery(query) => Some(query),
        Expr::InSubquery { subquery, .. } => Some(subquery),
        Expr::Exists { subquery, .. } => Some(subquery),
        _ => None,
    }
}

/// A subquery body must be a plain SELECT (possibly parenthesized or
/// carrying its own CTEs). Set operations and VALUES inside a subquery
/// are rejected, as are non-SELECT derived tables nested below it.
fn subquery_violation(query: &Query) -> Option<String> {
    if !body_is_select(&query.body) {
        return Some(SUBQUERY_MESSAGE.to_string());
    }
    derived_table_violation(query)
}

const SUBQUERY_MESSAGE: &str = "Subqueries must contain only SELECT statements";

fn body_is_select(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(_) => true,
        SetExpr::Query(inner) => body_is_select(&inner.body),
        _ => false,
    }
}

/// First derived table under this query whose body is not a SELECT.
fn derived_table_violation(query: &Query) -> Option<String> {
    walk_table_factors(query, &mut |factor| match factor {
        TableFactor::Derived { subquery, .. } if !body_is_select(&subquery.body) => {
            Some(SUBQUERY_MESSAGE.to_string())
        }
        _ => None,
    })
}

/// Depth-first walk over every table factor reachable from a query:
/// FROM clauses and joins, set operation arms, CTE bodies, and the
/// bodies of derived tables. Returns the first `Some` the callback
/// produces. Expression-position subqueries are not entered; callers
/// reach those through the expression visitor.
fn walk_table_factors(
    query: &Query,
    f: &mut dyn FnMut(&TableFactor) -> Option<String>,
) -> Option<String> {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            if let Some(found) = walk_table_factors(&cte.query, f) {
                return Some(found);
            }
        }
    }
    walk_set_expr(&query.body, f)
}

fn walk_set_expr(
    body: &SetExpr,
    f: &mut dyn FnMut(&TableFactor) -> Option<String>,
) -> Option<String> {
    match body {
        SetExpr::Select(select) => {
            for table in &select.from {
                if let Some(found) = walk_table_with_joins(table, f) {
                    return Some(found);
                }
            }
            None
        }
        SetExpr::Query(inner) => walk_table_factors(inner, f),
        SetExpr::SetOperation { left, right, .. } => {
            walk_set_expr(left, f).or_else(|| walk_set_expr(right, f))
        }
        _ => None,
    }
}

fn walk_table_with_joins(
    table: &TableWithJoins,
    f: &mut dyn FnMut(&TableFactor) -> Option<String>,
) -> Option<String> {
    if let Some(found) = walk_table_factor(&table.relation, f) {
        return Some(found);
    }
    for join in &table.joins {
        if let Some(found) = walk_table_factor(&join.relation, f) {
            return Some(found);
        }
    }
    None
}

fn walk_table_factor(
    factor: &TableFactor,
    f: &mut dyn FnMut(&TableFactor) -> Option<String>,
) -> Option<String> {
    if let Some(found) = f(factor) {
        return Some(found);
    }
    match factor {
        TableFactor::Derived { subquery, .. } => walk_table_factors(subquery, f),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => walk_table_with_joins(table_with_joins, f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn validator() -> SqlValidator {
        SqlValidator::new(&SecurityConfig::default())
    }

    fn validator_with(config: SecurityConfig) -> SqlValidator {
        SqlValidator::new(&config)
    }

    fn expect_rejection(validator: &SqlValidator, sql: &str) -> String {
        match validator.validate_or_raise(sql) {
            Ok(()) => panic!("expected rejection for: {sql}"),
            Err(err) => err.message,
        }
    }

    #[test]
    fn test_simple_select_passes() {
        let v = validator();
        v.validate_or_raise("SELECT * FROM users").unwrap();
        v.validate_or_raise("SELECT id, name FROM users WHERE age > 18")
            .unwrap();
        v.validate_or_raise("SELECT COUNT(*) FROM orders GROUP BY status HAVING COUNT(*) > 5")
            .unwrap();
    }

    #[test]
    fn test_joins_pass() {
        let v = validator();
        v.validate_or_raise(
            "SELECT u.name, o.total FROM users u JOIN orders o ON u.id = o.user_id",
        )
        .unwrap();
        v.validate_or_raise(
            "SELECT * FROM a LEFT JOIN b ON a.id = b.a_id RIGHT JOIN c ON b.id = c.b_id",
        )
        .unwrap();
    }

    #[test]
    fn test_subqueries_pass() {
        let v = validator();
        v.validate_or_raise("SELECT * FROM users WHERE id IN (SELECT user_id FROM orders)")
            .unwrap();
        v.validate_or_raise("SELECT * FROM (SELECT id, name FROM users) AS active")
            .unwrap();
        v.validate_or_raise(
            "SELECT name, (SELECT COUNT(*) FROM orders o WHERE o.user_id = u.id) FROM users u",
        )
        .unwrap();
    }

    #[test]
    fn test_ctes_pass() {
        let v = validator();
        v.validate_or_raise(
            "WITH active AS (SELECT * FROM users WHERE active) SELECT name FROM active",
        )
        .unwrap();
        v.validate_or_raise(
            "WITH a AS (SELECT 1 AS x), b AS (SELECT x FROM a) SELECT * FROM b",
        )
        .unwrap();
    }

    #[test]
    fn test_window_functions_pass() {
        validator()
            .validate_or_raise(
                "SELECT name, ROW_NUMBER() OVER (PARTITION BY city ORDER BY id) FROM users",
            )
            .unwrap();
    }

    #[test]
    fn test_case_expressions_pass() {
        validator()
            .validate_or_raise(
                "SELECT CASE WHEN age >= 18 THEN 'adult' ELSE 'minor' END FROM users",
            )
            .unwrap();
    }

    #[test]
    fn test_set_operations_pass() {
        let v = validator();
        v.validate_or_raise("SELECT id FROM a UNION SELECT id FROM b")
            .unwrap();
        v.validate_or_raise("SELECT id FROM a INTERSECT SELECT id FROM b")
            .unwrap();
        v.validate_or_raise("SELECT id FROM a EXCEPT SELECT id FROM b")
            .unwrap();
    }

    #[test]
    fn test_insert_rejected_by_default() {
        let message = expect_rejection(
            &validator(),
            "INSERT INTO users (name) VALUES ('mallory')",
        );
        assert_eq!(
            message,
            "INSERT statements are not allowed. Write operations are disabled."
        );
    }

    #[test]
    fn test_update_rejected_by_default() {
        let message = expect_rejection(&validator(), "UPDATE users SET name = 'x' WHERE id = 1");
        assert_eq!(
            message,
            "UPDATE statements are not allowed. Write operations are disabled."
        );
    }

    #[test]
    fn test_delete_rejected_by_default() {
        let message = expect_rejection(&validator(), "DELETE FROM users WHERE id = 1");
        assert_eq!(
            message,
            "DELETE statements are not allowed. Write operations are disabled."
        );
    }

    #[test]
    fn test_writes_pass_when_enabled() {
        let v = validator_with(SecurityConfig {
            allow_write_operations: true,
            ..SecurityConfig::default()
        });
        v.validate_or_raise("INSERT INTO users (name) VALUES ('alice')")
            .unwrap();
        v.validate_or_raise("UPDATE users SET name = 'bob' WHERE id = 1")
            .unwrap();
        v.validate_or_raise("DELETE FROM users WHERE id = 2").unwrap();
    }

    #[test]
    fn test_ddl_rejected_even_with_writes_enabled() {
        let v = validator_with(SecurityConfig {
            allow_write_operations: true,
            ..SecurityConfig::default()
        });
        assert_eq!(
            expect_rejection(&v, "DROP TABLE users"),
            "DROP statements are not allowed."
        );
        assert_eq!(
            expect_rejection(&v, "CREATE TABLE t (id INT)"),
            "CREATE statements are not allowed."
        );
        assert_eq!(
            expect_rejection(&v, "ALTER TABLE users ADD COLUMN x INT"),
            "ALTER statements are not allowed."
        );
        assert_eq!(
            expect_rejection(&v, "TRUNCATE TABLE users"),
            "TRUNCATE statements are not allowed."
        );
    }

    #[test]
    fn test_privilege_statements_rejected() {
        let v = validator();
        assert_eq!(
            expect_rejection(&v, "GRANT SELECT ON users TO alice"),
            "GRANT statements are not allowed."
        );
        assert_eq!(
            expect_rejection(&v, "REVOKE SELECT ON users FROM alice"),
            "REVOKE statements are not allowed."
        );
    }

    #[test]
    fn test_set_rejected() {
        assert_eq!(
            expect_rejection(&validator(), "SET search_path TO public"),
            "SET statements are not allowed."
        );
    }

    #[test]
    fn test_unknown_statement_kind_rejected() {
        let message = expect_rejection(&validator(), "SHOW search_path");
        assert_eq!(
            message,
            "Statement type SHOW is not allowed. Only SELECT queries are permitted."
        );
    }

    #[test]
    fn test_bare_values_rejected() {
        let message = expect_rejection(&validator(), "VALUES (1, 2)");
        assert_eq!(
            message,
            "Statement type VALUES is not allowed. Only SELECT queries are permitted."
        );
    }

    #[test]
    fn test_multiple_statements_rejected() {
        let message = expect_rejection(&validator(), "SELECT 1; SELECT 2");
        assert_eq!(
            message,
            "Multiple statements not allowed. Only single SELECT queries are permitted."
        );
    }

    #[test]
    fn test_empty_sql_rejected() {
        let v = validator();
        for sql in ["", "   ", "\n\t"] {
            let err = v.validate_or_raise(sql).unwrap_err();
            assert_eq!(err.message, "SQL query cannot be empty");
        }
    }

    #[test]
    fn test_comment_only_rejected() {
        let err = validator()
            .validate_or_raise("-- nothing to see here")
            .unwrap_err();
        assert_eq!(err.message, "No valid SQL statement found");
    }

    #[test]
    fn test_malformed_sql_rejected() {
        let v = validator();
        for sql in ["SELEC * FROM users", "SELECT * FORM users", "SELECT * FROM"] {
            let err = v.validate_or_raise(sql).unwrap_err();
            assert!(
                err.message.starts_with("Failed to parse SQL"),
                "unexpected message for {sql:?}: {}",
                err.message
            );
        }
    }

    #[test]
    fn test_sql_with_comments_passes() {
        let v = validator();
        v.validate_or_raise("SELECT id FROM users -- trailing note")
            .unwrap();
        v.validate_or_raise("SELECT /* every column */ * FROM users")
            .unwrap();
    }

    #[test]
    fn test_builtin_dangerous_functions_blocked() {
        let v = validator();
        assert_eq!(
            expect_rejection(&v, "SELECT pg_sleep(10)"),
            "Function 'pg_sleep' is blocked for security reasons"
        );
        assert_eq!(
            expect_rejection(&v, "SELECT pg_read_file('/etc/passwd')"),
            "Function 'pg_read_file' is blocked for security reasons"
        );
        assert_eq!(
            expect_rejection(&v, "SELECT lo_import('/tmp/x')"),
            "Function 'lo_import' is blocked for security reasons"
        );
        assert_eq!(
            expect_rejection(
                &v,
                "SELECT * FROM dblink('host=evil', 'SELECT 1') AS t(x INT)"
            ),
            "Function 'dblink' is blocked for security reasons"
        );
        assert_eq!(
            expect_rejection(&v, "SELECT pg_terminate_backend(123)"),
            "Function 'pg_terminate_backend' is blocked for security reasons"
        );
    }

    #[test]
    fn test_blocked_function_case_insensitive() {
        assert_eq!(
            expect_rejection(&validator(), "SELECT PG_SLEEP(1)"),
            "Function 'pg_sleep' is blocked for security reasons"
        );
    }

    #[test]
    fn test_blocked_function_in_subquery() {
        let message = expect_rejection(
            &validator(),
            "SELECT * FROM users WHERE id IN (SELECT pg_sleep(5))",
        );
        assert_eq!(message, "Function 'pg_sleep' is blocked for security reasons");
    }

    #[test]
    fn test_blocked_table_function_inside_expression_subquery() {
        let v = validator();
        assert_eq!(
            expect_rejection(
                &v,
                "SELECT * FROM users WHERE id IN \
                 (SELECT x FROM dblink('host=evil', 'SELECT 1') AS t(x INT))",
            ),
            "Function 'dblink' is blocked for security reasons"
        );
        assert_eq!(
            expect_rejection(
                &v,
                "SELECT * FROM users u WHERE EXISTS \
                 (SELECT 1 FROM dblink('host=evil', 'SELECT 1') AS t(x INT))",
            ),
            "Function 'dblink' is blocked for security reasons"
        );
    }

    #[test]
    fn test_custom_blocked_function() {
        let v = validator_with(SecurityConfig {
            blocked_functions: vec!["my_secret_func".to_string()],
            ..SecurityConfig::default()
        });
        assert_eq!(
            expect_rejection(&v, "SELECT my_secret_func(1)"),
            "Function 'my_secret_func' is blocked for security reasons"
        );
    }

    #[test]
    fn test_safe_functions_pass() {
        validator()
            .validate_or_raise(
                "SELECT COUNT(*), SUM(total), AVG(total), UPPER(name), NOW() FROM orders, users",
            )
            .unwrap();
    }

    #[test]
    fn test_blocked_table() {
        let v = validator_with(SecurityConfig {
            blocked_tables: vec!["secrets".to_string()],
            ..SecurityConfig::default()
        });
        assert_eq!(
            expect_rejection(&v, "SELECT * FROM secrets"),
            "Access to table 'secrets' is not allowed"
        );
        // Case-insensitive match, lowercased in the message.
        assert_eq!(
            expect_rejection(&v, "SELECT * FROM Secrets"),
            "Access to table 'secrets' is not allowed"
        );
        v.validate_or_raise("SELECT * FROM users").unwrap();
    }

    #[test]
    fn test_blocked_table_in_join() {
        let v = validator_with(SecurityConfig {
            blocked_tables: vec!["audit_log".to_string()],
            ..SecurityConfig::default()
        });
        let message = expect_rejection(
            &v,
            "SELECT * FROM users u JOIN audit_log a ON u.id = a.user_id",
        );
        assert_eq!(message, "Access to table 'audit_log' is not allowed");
    }

    #[test]
    fn test_blocked_table_in_subquery() {
        let v = validator_with(SecurityConfig {
            blocked_tables: vec!["secrets".to_string()],
            ..SecurityConfig::default()
        });
        let message = expect_rejection(
            &v,
            "SELECT * FROM users WHERE id IN (SELECT user_id FROM secrets)",
        );
        assert_eq!(message, "Access to table 'secrets' is not allowed");
    }

    #[test]
    fn test_blocked_column() {
        let v = validator_with(SecurityConfig {
            blocked_columns: vec!["password".to_string()],
            ..SecurityConfig::default()
        });
        assert_eq!(
            expect_rejection(&v, "SELECT password FROM users"),
            "Access to column 'password' is not allowed"
        );
        assert_eq!(
            expect_rejection(&v, "SELECT Password FROM users"),
            "Access to column 'password' is not allowed"
        );
        assert_eq!(
            expect_rejection(&v, "SELECT u.password FROM users u"),
            "Access to column 'password' is not allowed"
        );
    }

    #[test]
    fn test_blocked_column_exact_match_only() {
        let v = validator_with(SecurityConfig {
            blocked_columns: vec!["password".to_string()],
            ..SecurityConfig::default()
        });
        v.validate_or_raise("SELECT password_hash FROM users").unwrap();
    }

    #[test]
    fn test_qualified_blocked_column() {
        let v = validator_with(SecurityConfig {
            blocked_columns: vec!["users.ssn".to_string()],
            ..SecurityConfig::default()
        });
        assert_eq!(
            expect_rejection(&v, "SELECT users.ssn FROM users"),
            "Access to column 'users.ssn' is not allowed"
        );
        // The block names the qualified form only; bare references and
        // other qualifiers use exact string matching and pass.
        v.validate_or_raise("SELECT ssn FROM users").unwrap();
        v.validate_or_raise("SELECT u.ssn FROM users u").unwrap();
    }

    #[test]
    fn test_function_check_runs_before_table_check() {
        let v = validator_with(SecurityConfig {
            blocked_tables: vec!["secrets".to_string()],
            ..SecurityConfig::default()
        });
        let message = expect_rejection(&v, "SELECT pg_sleep(1) FROM secrets");
        assert_eq!(message, "Function 'pg_sleep' is blocked for security reasons");
    }

    #[test]
    fn test_explain_rejected_by_default() {
        assert_eq!(
            expect_rejection(&validator(), "EXPLAIN SELECT * FROM users"),
            "EXPLAIN statements are not allowed"
        );
    }

    #[test]
    fn test_explain_allowed_when_configured() {
        let v = validator_with(SecurityConfig {
            allow_explain: true,
            ..SecurityConfig::default()
        });
        v.validate_or_raise("EXPLAIN SELECT * FROM users").unwrap();
        // Plain EXPLAIN never executes its subject, so the inner
        // statement is not validated.
        v.validate_or_raise("EXPLAIN DELETE FROM users").unwrap();
    }

    #[test]
    fn test_explain_analyze_rejected_even_when_explain_allowed() {
        let v = validator_with(SecurityConfig {
            allow_explain: true,
            ..SecurityConfig::default()
        });
        assert_eq!(
            expect_rejection(&v, "EXPLAIN ANALYZE SELECT * FROM users"),
            "EXPLAIN ANALYZE statements are not allowed"
        );
    }

    #[test]
    fn test_set_operation_inside_derived_table_rejected() {
        let message = expect_rejection(
            &validator(),
            "SELECT * FROM (SELECT 1 UNION SELECT 2) AS t",
        );
        assert_eq!(message, "Subqueries must contain only SELECT statements");
    }

    #[test]
    fn test_set_operation_inside_expression_subquery_rejected() {
        let v = validator();
        assert_eq!(
            expect_rejection(&v, "SELECT * FROM users WHERE id IN (SELECT 1 UNION SELECT 2)"),
            "Subqueries must contain only SELECT statements"
        );
        assert_eq!(
            expect_rejection(&v, "SELECT * FROM users WHERE EXISTS (SELECT 1 UNION SELECT 2)"),
            "Subqueries must contain only SELECT statements"
        );
    }

    #[test]
    fn test_validate_returns_structured_result() {
        let v = validator();
        let ok = v.validate("SELECT * FROM users");
        assert!(ok.is_valid);
        assert!(ok.is_safe());

        let bad = v.validate("DROP TABLE users");
        assert!(!bad.is_valid);
        assert!(!bad.is_safe());
        assert_eq!(
            bad.error_message.as_deref(),
            Some("DROP statements are not allowed.")
        );
    }

    #[test]
    fn test_normalize_sql() {
        let v = validator();
        assert_eq!(
            v.normalize_sql("select  *  from USERS   where id=1").unwrap(),
            "SELECT * FROM USERS WHERE id = 1"
        );
        let err = v.normalize_sql("not sql at all").unwrap_err();
        assert!(err.message.starts_with("Failed to normalize SQL"));
    }

    #[test]
    fn test_extract_tables() {
        let v = validator();
        assert_eq!(v.extract_tables("SELECT * FROM Users").unwrap(), vec!["users"]);
        assert_eq!(
            v.extract_tables(
                "SELECT * FROM users JOIN orders ON users.id = orders.user_id"
            )
            .unwrap(),
            vec!["orders", "users"]
        );
        // Duplicated references collapse.
        assert_eq!(
            v.extract_tables("SELECT a.id FROM users a JOIN users b ON a.id = b.id")
                .unwrap(),
            vec!["users"]
        );
    }

    #[test]
    fn test_extract_tables_includes_subqueries_and_ctes() {
        let v = validator();
        assert_eq!(
            v.extract_tables("SELECT * FROM users WHERE id IN (SELECT user_id FROM orders)")
                .unwrap(),
            vec!["orders", "users"]
        );
        assert_eq!(
            v.extract_tables("WITH active AS (SELECT * FROM users) SELECT * FROM active")
                .unwrap(),
            vec!["active", "users"]
        );
    }

    #[test]
    fn test_extract_tables_parse_failure() {
        let err = validator().extract_tables("???").unwrap_err();
        assert!(err.message.starts_with("Failed to extract tables"));
    }
}
