//! Well-known error messages
//!
//! Adapters recognize lower-layer errors by message equality, so every
//! message that crosses a layer boundary is declared here once.

/// Persistent store vocabulary
pub mod persistent {
    pub const NO_ROWS: &str = "no rows in result set";
    pub const ZERO_ROWS_AFFECTED: &str = "zero rows affected";
    pub const DUPLICATE_KEY: &str = "duplicate key value violates unique constraint";
    pub const QUERY_TIMEOUT: &str = "query timeout exceeded";
    pub const POOL_TIMED_OUT: &str = "connection pool timed out";
    pub const DATABASE_ERROR: &str = "database error";
    pub const INVALID_SCHEMA_NAME: &str = "invalid schema name";
    pub const CORRUPTED_ROW: &str = "corrupted row";
}

/// In-memory store vocabulary
pub mod in_memory {
    pub const EMPTY_RESULT: &str = "empty result";
    pub const NOT_NUMERIC: &str = "not numeric value";
    pub const MALFORMED_VALUE: &str = "malformed value";
    pub const CONNECTION_FAILED: &str = "connection failed";
    pub const COMMAND_FAILED: &str = "command failed";
}

/// Joint repository vocabulary
pub mod joint {
    pub const EMPTY_RESULT: &str = "empty result";
    pub const DATA_NOT_SAVED: &str = "data not saved";
    pub const DUPLICATE_DATA: &str = "duplicate data";
    pub const TYPE_CONVERSION_FAILED: &str = "data type conversion failed";
}

/// Service layer vocabulary
pub mod service {
    pub const EMPTY_RESULT: &str = "empty result";
    pub const ALREADY_EXISTS: &str = "already exists";
    pub const NOTHING_CHANGED: &str = "nothing was changed";
    pub const INCORRECT_CREDENTIALS: &str = "incorrect login or password";
    pub const ACCOUNT_NOT_ACTIVE: &str = "account is not active";
    pub const ERROR_LOGOUT: &str = "error logout";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const ACCESS_DENIED: &str = "access denied";
    pub const INVALID_ARGUMENT: &str = "invalid argument";
    pub const HASHING_FAILED: &str = "password hashing failed";
    pub const TOKEN_GENERATION_FAILED: &str = "failed to generate unique token";
}

/// Broker producer vocabulary
pub mod broker {
    pub const SEND_FAILED: &str = "failed to send message";
    pub const WRITE_TIMEOUT: &str = "deadline exceeded";
    pub const FAILED_TO_CLOSE_WRITER: &str = "failed to close writer";
}
