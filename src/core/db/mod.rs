mod detection;
mod messages;
mod state;

use std::sync::Arc;

use state::DbState;

use crate::core::cleaning::MessageRecord;
use crate::core::timestamp::{parse_timestamp, to_rfc3339};
use crate::error::StoreError;
use crate::models::DetectionBatch;

pub use detection::{Detection, DetectionRepository, DetectionUpdate, NewDetection};
pub use messages::MessageRepository;

const DETECTION_COLUMNS: &str = "id, img_name, name, confidence, xmin_coord, ymin, xmax_coord, ymax, image_path, detection_time";

/// Storage adapter and record service over the `detections` table.
///
/// Cloning shares the underlying connection.
#[derive(Debug, Clone)]
pub struct DetectionDb {
    state: Arc<DbState>,
}

#[derive(sqlx::FromRow)]
struct DetectionRow {
    id: i64,
    img_name: String,
    name: String,
    confidence: f64,
    xmin_coord: f64,
    ymin: f64,
    xmax_coord: f64,
    ymax: f64,
    image_path: Option<String>,
    detection_time: String,
}

impl TryFrom<DetectionRow> for Detection {
    type Error = StoreError;

    fn try_from(row: DetectionRow) -> Result<Self, Self::Error> {
        let detection_time =
            parse_timestamp(&row.detection_time).ok_or_else(|| StoreError::CorruptRow {
                id: row.id,
                reason: format!("unreadable detection_time {:?}", row.detection_time),
            })?;
        Ok(Detection {
            id: row.id,
            img_name: row.img_name,
            name: row.name,
            confidence: row.confidence,
            xmin: row.xmin_coord,
            ymin: row.ymin,
            xmax: row.xmax_coord,
            ymax: row.ymax,
            image_path: row.image_path,
            detection_time,
            _guard: (),
        })
    }
}

impl DetectionDb {
    /// Opens the database. Failure here is fatal for the caller.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            state: Arc::new(DbState::connect(url).await?),
        })
    }

    /// Connects and makes sure the schema exists.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let db = Self::connect(url).await?;
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Creates the `detections` table if it is missing. Safe to call on every start.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.state.migrate().await?;
        tracing::debug!(url = self.state.url(), "detections schema ready");
        Ok(())
    }

    /// Inserts every detection of the batch in one transaction.
    ///
    /// A row rejected by the table constraints rolls back the whole batch.
    pub async fn insert_batch(&self, batch: &DetectionBatch) -> Result<u64, StoreError> {
        let mut tx = self.state.begin().await?;
        let mut inserted = 0u64;
        for detection in &batch.detections {
            insert_detection(&mut tx, detection).await?;
            inserted += 1;
        }
        tx.commit().await?;
        tracing::info!(run_id = %batch.run_id, rows = inserted, "detection batch stored");
        Ok(inserted)
    }

    pub async fn count_detections(&self) -> Result<i64, StoreError> {
        let mut conn = self.state.conn().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM detections")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    /// Releases the connection. Later calls fail with a persistence error.
    pub async fn close(&self) {
        self.state.close().await;
    }
}

async fn insert_detection(
    conn: &mut sqlx::SqliteConnection,
    detection: &NewDetection,
) -> Result<Detection, StoreError> {
    let detection_time = detection.detection_time.map(to_rfc3339).transpose()?;
    let sql = format!(
        "INSERT INTO detections (img_name, name, confidence, xmin_coord, ymin, xmax_coord, ymax, image_path, detection_time)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, strftime('%Y-%m-%dT%H:%M:%fZ', 'now')))
        RETURNING {DETECTION_COLUMNS}"
    );
    let row: DetectionRow = sqlx::query_as(&sql)
        .bind(&detection.img_name)
        .bind(&detection.name)
        .bind(detection.confidence)
        .bind(detection.xmin)
        .bind(detection.ymin)
        .bind(detection.xmax)
        .bind(detection.ymax)
        .bind(&detection.image_path)
        .bind(detection_time)
        .fetch_one(&mut *conn)
        .await?;
    Detection::try_from(row)
}

async fn fetch_detection(
    conn: &mut sqlx::SqliteConnection,
    id: i64,
) -> Result<Option<Detection>, StoreError> {
    let sql = format!("SELECT {DETECTION_COLUMNS} FROM detections WHERE id = $1");
    sqlx::query_as::<_, DetectionRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .map(Detection::try_from)
        .transpose()
}

impl DetectionRepository for DetectionDb {
    async fn add_detection(&self, detection: &NewDetection) -> Result<Detection, StoreError> {
        detection.validate()?;
        let mut conn = self.state.conn().await?;
        insert_detection(&mut conn, detection).await
    }

    async fn get_detection_by_id(&self, id: i64) -> Result<Option<Detection>, StoreError> {
        let mut conn = self.state.conn().await?;
        fetch_detection(&mut conn, id).await
    }

    async fn get_detections(&self, skip: u32, limit: u32) -> Result<Vec<Detection>, StoreError> {
        let mut conn = self.state.conn().await?;
        let sql =
            format!("SELECT {DETECTION_COLUMNS} FROM detections ORDER BY id ASC LIMIT $1 OFFSET $2");
        sqlx::query_as::<_, DetectionRow>(&sql)
            .bind(i64::from(limit))
            .bind(i64::from(skip))
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(Detection::try_from)
            .collect()
    }

    async fn update_detection(
        &self,
        id: i64,
        update: &DetectionUpdate,
    ) -> Result<Option<Detection>, StoreError> {
        let mut tx = self.state.begin().await?;
        let Some(current) = fetch_detection(&mut tx, id).await? else {
            return Ok(None);
        };
        if update.is_empty() {
            return Ok(Some(current));
        }

        let updated = update.apply_to(current);
        crate::models::validate_detection(
            updated.confidence,
            updated.xmin,
            updated.ymin,
            updated.xmax,
            updated.ymax,
        )?;

        sqlx::query(
            r#"UPDATE detections SET img_name = $1, name = $2, confidence = $3, xmin_coord = $4,
            ymin = $5, xmax_coord = $6, ymax = $7, image_path = $8, detection_time = $9
            WHERE id = $10"#,
        )
        .bind(&updated.img_name)
        .bind(&updated.name)
        .bind(updated.confidence)
        .bind(updated.xmin)
        .bind(updated.ymin)
        .bind(updated.xmax)
        .bind(updated.ymax)
        .bind(&updated.image_path)
        .bind(to_rfc3339(updated.detection_time)?)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(updated))
    }
}

impl MessageRepository for DetectionDb {
    async fn replace_messages(
        &self,
        table: &str,
        rows: &[MessageRecord],
    ) -> Result<u64, StoreError> {
        let table = messages::checked_table_name(table)?;
        let mut tx = self.state.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "CREATE TABLE {table} (
                channel_title TEXT,
                channel_username TEXT,
                message_id INTEGER NOT NULL,
                text TEXT,
                date TEXT,
                media_path TEXT
            )"
        ))
        .execute(&mut *tx)
        .await?;

        let insert = format!(
            "INSERT INTO {table} (channel_title, channel_username, message_id, text, date, media_path)
            VALUES ($1, $2, $3, $4, $5, $6)"
        );
        let mut inserted = 0u64;
        for row in rows {
            sqlx::query(&insert)
                .bind(&row.channel_title)
                .bind(&row.channel_username)
                .bind(row.message_id)
                .bind(&row.text)
                .bind(&row.date)
                .bind(&row.media_path)
                .execute(&mut *tx)
                .await?;
            inserted += 1;
        }
        tx.commit().await?;
        tracing::info!(table, rows = inserted, "messages table replaced");
        Ok(inserted)
    }

    async fn get_messages(&self, table: &str) -> Result<Vec<MessageRecord>, StoreError> {
        let table = messages::checked_table_name(table)?;
        let mut conn = self.state.conn().await?;
        Ok(sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT channel_title, channel_username, message_id, text, date, media_path
            FROM {table} ORDER BY rowid ASC"
        ))
        .fetch_all(&mut *conn)
        .await?)
    }
}
