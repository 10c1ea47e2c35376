//! Built-in deny list of dangerous Postgres functions.

/// Functions blocked regardless of configuration.
///
/// Covers server control, file system access, large object import and
/// export, and cross-database links. User configuration can extend
/// this list but never shrink it.
pub const BUILTIN_DANGEROUS_FUNCTIONS: &[&str] = &[
    // Server control
    "pg_sleep",
    "pg_terminate_backend",
    "pg_cancel_backend",
    "pg_reload_conf",
    "pg_rotate_logfile",
    // File system access
    "pg_read_file",
    "pg_read_binary_file",
    "pg_write_file",
    "pg_ls_dir",
    "pg_stat_file",
    // Large objects
    "lo_import",
    "lo_export",
    // Cross-database links
    "dblink",
    "dblink_exec",
    "dblink_connect",
    "dblink_open",
    // Misc execution and bulk transfer
    "pg_execute_sql",
    "copy_from",
    "copy_to",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_deny_list_is_lowercase_and_unique() {
        let unique: HashSet<_> = BUILTIN_DANGEROUS_FUNCTIONS.iter().collect();
        assert_eq!(unique.len(), BUILTIN_DANGEROUS_FUNCTIONS.len());
        for name in BUILTIN_DANGEROUS_FUNCTIONS {
            assert_eq!(*name, name.to_lowercase());
        }
    }

    #[test]
    fn test_deny_list_covers_core_threats() {
        for name in ["pg_sleep", "pg_read_file", "lo_import", "dblink"] {
            assert!(BUILTIN_DANGEROUS_FUNCTIONS.contains(&name));
        }
    }
}
