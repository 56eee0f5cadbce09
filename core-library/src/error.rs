use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Library database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    /// A row's column map named a column the table does not have
    #[error("Unknown column {column} for table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Library database is missing seed rows: {0}")]
    MissingSeed(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
