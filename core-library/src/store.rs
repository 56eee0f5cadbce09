//! Library store trait and SQLite implementation
//!
//! The sync engine never issues row-at-a-time statements. It loads every
//! table it caches in full, then flushes its unit of work through one bulk
//! insert and one column-restricted bulk update per entity kind, and finally
//! deletes orphans by key.

use crate::error::{LibraryError, Result};
use crate::models::{
    Album, Artist, ClassificationEntry, ClassificationType, ColumnValue, RelatedImage, Song,
    TableRow, ValueListEntry,
};
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::{query, query_as, SqlitePool};
use tracing::debug;

/// Upper bound on bound parameters per statement
const MAX_PARAMETERS: usize = 900;

/// (table, column) pairs the engine may delete by
const DELETABLE: &[(&str, &str)] = &[
    ("songs", "id"),
    ("song_classifications", "song_id"),
    ("party_relations", "subject_id"),
    ("party_relations", "party_id"),
    ("related_images", "id"),
    ("related_images", "related_id"),
    ("play_history", "song_id"),
    ("playlist_songs", "song_id"),
    ("albums", "id"),
    ("artists", "id"),
];

/// Rows of one table prepared for a bulk statement.
///
/// For inserts each row holds one value per column. For updates each row
/// holds the values of the allow-listed columns followed by the key values.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRows {
    pub table: &'static str,
    pub key: &'static [&'static str],
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<ColumnValue>>,
}

impl TableRows {
    /// Full-row inserts for `rows`
    pub fn inserts<'a, T, I>(rows: I) -> Self
    where
        T: TableRow + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let rows = rows
            .into_iter()
            .map(|row| {
                T::COLUMNS
                    .iter()
                    .map(|column| row.column_value(column).unwrap_or(ColumnValue::Null))
                    .collect()
            })
            .collect();

        Self {
            table: T::TABLE,
            key: T::KEY,
            columns: T::COLUMNS.to_vec(),
            rows,
        }
    }

    /// Updates touching only `columns`, which must be in the entity's
    /// `UPDATABLE` allow-list
    pub fn updates<'a, T, I>(rows: I, columns: &[&'static str]) -> Result<Self>
    where
        T: TableRow + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        if let Some(column) = columns.iter().find(|c| !T::UPDATABLE.contains(c)) {
            return Err(LibraryError::UnknownColumn {
                table: T::TABLE.to_string(),
                column: column.to_string(),
            });
        }

        let rows = rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .chain(T::KEY.iter())
                    .map(|column| row.column_value(column).unwrap_or(ColumnValue::Null))
                    .collect()
            })
            .collect();

        Ok(Self {
            table: T::TABLE,
            key: T::KEY,
            columns: columns.to_vec(),
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Storage interface consumed by the sync engine
#[async_trait]
pub trait LibraryStore: Send + Sync {
    async fn load_value_lists(&self) -> Result<Vec<ValueListEntry>>;

    async fn load_classification_types(&self) -> Result<Vec<ClassificationType>>;

    async fn load_classification_entries(&self) -> Result<Vec<ClassificationEntry>>;

    async fn load_artists(&self) -> Result<Vec<Artist>>;

    async fn load_albums(&self) -> Result<Vec<Album>>;

    async fn load_songs(&self) -> Result<Vec<Song>>;

    async fn load_images(&self) -> Result<Vec<RelatedImage>>;

    async fn count_songs(&self) -> Result<i64>;

    /// Insert every row in one transaction. Returns the number of rows written.
    async fn bulk_insert(&self, rows: TableRows) -> Result<u64>;

    /// Update only the listed columns of every row in one transaction.
    async fn bulk_update(&self, rows: TableRows) -> Result<u64>;

    /// Delete rows of `table` whose `column` is one of `ids`
    async fn delete_where(&self, table: &str, column: &str, ids: &[String]) -> Result<u64>;

    /// Candidate albums that no song references any more
    async fn albums_without_songs(&self, candidates: &[String]) -> Result<Vec<String>>;

    /// Candidate artists with no song credits, no composer credits and no albums
    async fn artists_without_songs(&self, candidates: &[String]) -> Result<Vec<String>>;
}

/// SQLite implementation of [`LibraryStore`]
pub struct SqliteLibraryStore {
    pool: SqlitePool,
}

impl SqliteLibraryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn load_all<T>(&self, table: &str) -> Result<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin,
    {
        let sql = format!("SELECT * FROM {}", table);
        let rows = query_as::<_, T>(&sql).fetch_all(&self.pool).await?;
        debug!(table, count = rows.len(), "Loaded table");
        Ok(rows)
    }

    /// Ids among `candidates` for which `filter` holds, `filter` referring to `alias.id`
    async fn filter_candidates(
        &self,
        table: &str,
        alias: &str,
        filter: &str,
        candidates: &[String],
    ) -> Result<Vec<String>> {
        let mut matches = Vec::new();

        for chunk in candidates.chunks(MAX_PARAMETERS) {
            let sql = format!(
                "SELECT {alias}.id FROM {table} {alias} WHERE {alias}.id IN ({}) AND {filter}",
                placeholders(chunk.len()),
                alias = alias,
                table = table,
                filter = filter,
            );

            let mut statement = query_as::<_, (String,)>(&sql);
            for id in chunk {
                statement = statement.bind(id);
            }

            let rows = statement.fetch_all(&self.pool).await?;
            matches.extend(rows.into_iter().map(|(id,)| id));
        }

        Ok(matches)
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn bind_value<'q>(
    statement: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &ColumnValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        ColumnValue::Null => statement.bind(None::<String>),
        ColumnValue::Integer(v) => statement.bind(*v),
        ColumnValue::Real(v) => statement.bind(*v),
        ColumnValue::Text(v) => statement.bind(v.clone()),
    }
}

#[async_trait]
impl LibraryStore for SqliteLibraryStore {
    async fn load_value_lists(&self) -> Result<Vec<ValueListEntry>> {
        self.load_all(ValueListEntry::TABLE).await
    }

    async fn load_classification_types(&self) -> Result<Vec<ClassificationType>> {
        self.load_all(ClassificationType::TABLE).await
    }

    async fn load_classification_entries(&self) -> Result<Vec<ClassificationEntry>> {
        self.load_all(ClassificationEntry::TABLE).await
    }

    async fn load_artists(&self) -> Result<Vec<Artist>> {
        self.load_all(Artist::TABLE).await
    }

    async fn load_albums(&self) -> Result<Vec<Album>> {
        self.load_all(Album::TABLE).await
    }

    async fn load_songs(&self) -> Result<Vec<Song>> {
        self.load_all(Song::TABLE).await
    }

    async fn load_images(&self) -> Result<Vec<RelatedImage>> {
        self.load_all(RelatedImage::TABLE).await
    }

    async fn count_songs(&self) -> Result<i64> {
        let (count,): (i64,) = query_as("SELECT COUNT(*) FROM songs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn bulk_insert(&self, rows: TableRows) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let column_count = rows.columns.len();
        let row_placeholder = format!("({})", placeholders(column_count));
        let rows_per_statement = (MAX_PARAMETERS / column_count.max(1)).max(1);

        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for chunk in rows.rows.chunks(rows_per_statement) {
            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                rows.table,
                rows.columns.join(", "),
                vec![row_placeholder.as_str(); chunk.len()].join(", ")
            );

            let mut statement = query(&sql);
            for value in chunk.iter().flatten() {
                statement = bind_value(statement, value);
            }

            written += statement.execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        debug!(table = rows.table, rows = written, "Bulk inserted rows");
        Ok(written)
    }

    async fn bulk_update(&self, rows: TableRows) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        if rows.columns.is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "columns".to_string(),
                message: format!("bulk update of {} lists no columns", rows.table),
            });
        }

        let assignments: Vec<String> = rows.columns.iter().map(|c| format!("{} = ?", c)).collect();
        let predicate: Vec<String> = rows.key.iter().map(|k| format!("{} = ?", k)).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            rows.table,
            assignments.join(", "),
            predicate.join(" AND ")
        );

        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for row in &rows.rows {
            let mut statement = query(&sql);
            for value in row {
                statement = bind_value(statement, value);
            }
            written += statement.execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        debug!(
            table = rows.table,
            columns = ?rows.columns,
            rows = written,
            "Bulk updated rows"
        );
        Ok(written)
    }

    async fn delete_where(&self, table: &str, column: &str, ids: &[String]) -> Result<u64> {
        if !DELETABLE.iter().any(|(t, c)| *t == table && *c == column) {
            return Err(LibraryError::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;

        for chunk in ids.chunks(MAX_PARAMETERS) {
            let sql = format!(
                "DELETE FROM {} WHERE {} IN ({})",
                table,
                column,
                placeholders(chunk.len())
            );
            let mut statement = query(&sql);
            for id in chunk {
                statement = statement.bind(id);
            }
            deleted += statement.execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        debug!(table, column, rows = deleted, "Deleted rows");
        Ok(deleted)
    }

    async fn albums_without_songs(&self, candidates: &[String]) -> Result<Vec<String>> {
        self.filter_candidates(
            "albums",
            "al",
            "NOT EXISTS (SELECT 1 FROM songs s WHERE s.primary_album_id = al.id)",
            candidates,
        )
        .await
    }

    async fn artists_without_songs(&self, candidates: &[String]) -> Result<Vec<String>> {
        self.filter_candidates(
            "artists",
            "ar",
            "NOT EXISTS (
                SELECT 1 FROM party_relations pr JOIN songs s ON s.id = pr.subject_id
                WHERE pr.party_id = ar.id AND pr.relation_type <> 'contributor'
            )
            AND NOT EXISTS (
                SELECT 1 FROM party_relations pr JOIN songs s ON s.id = pr.subject_id
                WHERE pr.party_id = ar.id AND pr.relation_type = 'contributor'
            )
            AND NOT EXISTS (SELECT 1 FROM albums al WHERE al.primary_artist_id = ar.id)",
            candidates,
        )
        .await
    }
}
