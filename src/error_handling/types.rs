use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadBindAddress(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadBindAddress(e) => write!(f, "Bind address error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum StorageError {
    ConnectionFailed(String),
    QueryFailed(String),
    MigrationFailed(String),
    NotFound,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(e) => write!(f, "Storage connection failed: {}", e),
            StorageError::QueryFailed(e) => write!(f, "Storage query failed: {}", e),
            StorageError::MigrationFailed(e) => write!(f, "Storage migration failed: {}", e),
            StorageError::NotFound => write!(f, "Record not found"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            e => StorageError::QueryFailed(e.to_string()),
        }
    }
}

#[derive(Debug)]
pub enum ImportError {
    WorkbookError(String),
    MissingColumn(String),
    StorageError(StorageError),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::WorkbookError(e) => write!(f, "Workbook error: {}", e),
            ImportError::MissingColumn(e) => write!(f, "Missing column: {}", e),
            ImportError::StorageError(e) => write!(f, "Import storage error: {}", e),
        }
    }
}

impl std::error::Error for ImportError {}

impl From<StorageError> for ImportError {
    fn from(err: StorageError) -> Self {
        ImportError::StorageError(err)
    }
}

#[derive(Debug)]
pub enum AuthError {
    InvalidCredentials,
    InvalidToken,
    TokenExpired,
    UnknownSubject,
    StorageError(StorageError),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Incorrect username or password"),
            AuthError::InvalidToken => write!(f, "Invalid token"),
            AuthError::TokenExpired => write!(f, "Token expired"),
            AuthError::UnknownSubject => write!(f, "Unknown token subject"),
            AuthError::StorageError(e) => write!(f, "Auth storage error: {}", e),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::StorageError(err)
    }
}

#[derive(Debug)]
pub enum AssignmentError {
    NoOwners,
    NoProcesses,
    StorageError(StorageError),
}

impl fmt::Display for AssignmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentError::NoOwners => write!(f, "No owners in the database"),
            AssignmentError::NoProcesses => write!(f, "No processes in the database"),
            AssignmentError::StorageError(e) => write!(f, "Assignment storage error: {}", e),
        }
    }
}

impl std::error::Error for AssignmentError {}

impl From<StorageError> for AssignmentError {
    fn from(err: StorageError) -> Self {
        AssignmentError::StorageError(err)
    }
}
