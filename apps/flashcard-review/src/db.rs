//! SQLite storage for flashcards and review history.

use chrono::{DateTime, Utc};
use review_scheduler::{
    CardId, Flashcard, FlashcardStore, Quality, ReviewHistory, ReviewLog, StoreError, StoreResult,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        debug!(path = %path.display(), "opened flashcard database");
        Ok(db)
    }

    pub fn in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> DbResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS flashcards (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                front TEXT NOT NULL,
                back TEXT NOT NULL,
                topic TEXT,
                interval INTEGER NOT NULL,
                repetitions INTEGER NOT NULL,
                easiness_factor REAL NOT NULL,
                next_review_at INTEGER NOT NULL,
                version INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reviews (
                id TEXT PRIMARY KEY,
                card_id TEXT NOT NULL REFERENCES flashcards(id),
                owner_id TEXT NOT NULL,
                quality INTEGER NOT NULL,
                reviewed_at INTEGER NOT NULL,
                previous_interval INTEGER NOT NULL,
                interval INTEGER NOT NULL,
                previous_easiness_factor REAL NOT NULL,
                easiness_factor REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_flashcards_due ON flashcards(owner_id, next_review_at);
            CREATE INDEX IF NOT EXISTS idx_reviews_owner ON reviews(owner_id, reviewed_at);
            "#,
        )?;
        Ok(())
    }

    fn stored_version(&self, id: CardId) -> SqlResult<Option<u64>> {
        self.conn
            .query_row(
                "SELECT version FROM flashcards WHERE id = ?1",
                params![id.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map(|v| v.map(|v| v as u64))
    }

    fn query_cards(&self, sql: &str, args: impl rusqlite::Params) -> SqlResult<Vec<Flashcard>> {
        let mut stmt = self.conn.prepare(sql)?;
        let cards = stmt
            .query_map(args, parse_card_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(cards)
    }

    /// Versioned update, or insert when the card is new. Callers own the transaction.
    fn write_card(&self, card: &Flashcard) -> StoreResult<Flashcard> {
        let mut stored = card.clone();
        stored.version = card.version + 1;

        let updated = self
            .conn
            .execute(
                "UPDATE flashcards SET front = ?3, back = ?4, topic = ?5, interval = ?6,
                    repetitions = ?7, easiness_factor = ?8, next_review_at = ?9,
                    version = ?10, updated_at = ?11
                 WHERE id = ?1 AND version = ?2",
                params![
                    card.id.to_string(),
                    card.version as i64,
                    card.front,
                    card.back,
                    card.topic,
                    card.interval,
                    card.repetitions,
                    card.easiness_factor,
                    timestamp(&card.next_review_at),
                    stored.version as i64,
                    timestamp(&card.updated_at),
                ],
            )
            .map_err(backend)?;

        if updated == 1 {
            return Ok(stored);
        }

        if let Some(found) = self.stored_version(card.id).map_err(backend)? {
            return Err(StoreError::Conflict {
                id: card.id,
                expected: card.version,
                found,
            });
        }

        self.conn
            .execute(
                "INSERT INTO flashcards (id, owner_id, front, back, topic, interval, repetitions,
                    easiness_factor, next_review_at, version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    card.id.to_string(),
                    card.owner_id,
                    card.front,
                    card.back,
                    card.topic,
                    card.interval,
                    card.repetitions,
                    card.easiness_factor,
                    timestamp(&card.next_review_at),
                    stored.version as i64,
                    timestamp(&card.created_at),
                    timestamp(&card.updated_at),
                ],
            )
            .map_err(backend)?;
        Ok(stored)
    }
}

// Microseconds since the Unix epoch. Integer order is time order across chrono's whole range.
fn timestamp(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_micros()
}

impl FlashcardStore for Database {
    fn find_by_id(&self, id: CardId) -> StoreResult<Option<Flashcard>> {
        self.conn
            .query_row(
                "SELECT * FROM flashcards WHERE id = ?1",
                params![id.to_string()],
                parse_card_row,
            )
            .optional()
            .map_err(backend)
    }

    fn save(&self, card: &Flashcard) -> StoreResult<Flashcard> {
        let tx = self.conn.unchecked_transaction().map_err(backend)?;
        let stored = self.write_card(card)?;
        tx.commit().map_err(backend)?;
        Ok(stored)
    }

    fn list_due(&self, owner_id: &str, as_of: DateTime<Utc>) -> StoreResult<Vec<Flashcard>> {
        self.query_cards(
            "SELECT * FROM flashcards
             WHERE owner_id = ?1 AND next_review_at <= ?2
             ORDER BY next_review_at, id",
            params![owner_id, timestamp(&as_of)],
        )
        .map_err(backend)
    }

    fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<Flashcard>> {
        self.query_cards(
            "SELECT * FROM flashcards WHERE owner_id = ?1 ORDER BY next_review_at, id",
            params![owner_id],
        )
        .map_err(backend)
    }

    fn delete(&self, id: CardId) -> StoreResult<bool> {
        let tx = self.conn.unchecked_transaction().map_err(backend)?;
        tx.execute("DELETE FROM reviews WHERE card_id = ?1", params![id.to_string()])
            .map_err(backend)?;
        let removed = tx
            .execute("DELETE FROM flashcards WHERE id = ?1", params![id.to_string()])
            .map_err(backend)?;
        tx.commit().map_err(backend)?;
        Ok(removed > 0)
    }
}

impl ReviewHistory for Database {
    fn save_review(&self, card: &Flashcard, review: &ReviewLog) -> StoreResult<Flashcard> {
        let tx = self.conn.unchecked_transaction().map_err(backend)?;
        let stored = self.write_card(card)?;
        tx.execute(
            "INSERT INTO reviews (id, card_id, owner_id, quality, reviewed_at, previous_interval,
                interval, previous_easiness_factor, easiness_factor)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                review.id.to_string(),
                review.card_id.to_string(),
                review.owner_id,
                review.quality.value(),
                timestamp(&review.reviewed_at),
                review.previous_interval,
                review.interval,
                review.previous_easiness_factor,
                review.easiness_factor,
            ],
        )
        .map_err(backend)?;
        tx.commit().map_err(backend)?;
        Ok(stored)
    }

    fn list_reviews(&self, owner_id: &str) -> StoreResult<Vec<ReviewLog>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM reviews WHERE owner_id = ?1 ORDER BY reviewed_at DESC")
            .map_err(backend)?;
        let reviews = stmt
            .query_map(params![owner_id], parse_review_row)
            .map_err(backend)?
            .collect::<SqlResult<Vec<_>>>()
            .map_err(backend)?;
        Ok(reviews)
    }
}

fn parse_uuid(row: &rusqlite::Row, name: &str) -> SqlResult<Uuid> {
    let idx = row.as_ref().column_index(name)?;
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(row: &rusqlite::Row, name: &str) -> SqlResult<DateTime<Utc>> {
    let idx = row.as_ref().column_index(name)?;
    let micros: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, micros))
}

fn parse_card_row(row: &rusqlite::Row) -> SqlResult<Flashcard> {
    Ok(Flashcard {
        id: parse_uuid(row, "id")?,
        owner_id: row.get("owner_id")?,
        front: row.get("front")?,
        back: row.get("back")?,
        topic: row.get("topic")?,
        interval: row.get("interval")?,
        repetitions: row.get("repetitions")?,
        easiness_factor: row.get("easiness_factor")?,
        next_review_at: parse_timestamp(row, "next_review_at")?,
        version: row.get::<_, i64>("version")? as u64,
        created_at: parse_timestamp(row, "created_at")?,
        updated_at: parse_timestamp(row, "updated_at")?,
    })
}

fn parse_review_row(row: &rusqlite::Row) -> SqlResult<ReviewLog> {
    let quality_idx = row.as_ref().column_index("quality")?;
    let quality = Quality::new(row.get(quality_idx)?).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(quality_idx, Type::Integer, Box::new(e))
    })?;

    Ok(ReviewLog {
        id: parse_uuid(row, "id")?,
        card_id: parse_uuid(row, "card_id")?,
        owner_id: row.get("owner_id")?,
        quality,
        reviewed_at: parse_timestamp(row, "reviewed_at")?,
        previous_interval: row.get("previous_interval")?,
        interval: row.get("interval")?,
        previous_easiness_factor: row.get("previous_easiness_factor")?,
        easiness_factor: row.get("easiness_factor")?,
    })
}
