//! SQL security validation for the Delfi query gateway.
//!
//! Candidate SQL is parsed with a PostgreSQL-dialect parser and checked
//! against a read-only policy: a single SELECT statement per request, a
//! deny list of dangerous functions, configurable table and column
//! blocks, and subquery inspection. Generated SQL never reaches the
//! database without passing through [`SqlValidator`].

pub mod functions;
pub mod validator;

pub use functions::BUILTIN_DANGEROUS_FUNCTIONS;
pub use validator::SqlValidator;
