use async_trait::async_trait;

use super::types::{Category, CategoryNode, PostRecord, PostStatus, PostSummary, PresentationMode};
use crate::database::{Database, DbError};
use crate::services::{PersistenceService, ServiceError, TaxonomyService};

const POST_COLUMNS: &str = "id, title, summary, category_id, slug, seo_title, seo_description,
    seo_keywords, schema_type, published_at, is_pinned, publisher_id, language, thumbnail,
    presentation_mode, status, items, created_at, updated_at";

impl Database {
    /// Create the post and category tables
    pub fn create_post_tables(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                summary TEXT NOT NULL DEFAULT '',
                category_id TEXT,
                slug TEXT NOT NULL DEFAULT '',
                seo_title TEXT NOT NULL DEFAULT '',
                seo_description TEXT NOT NULL DEFAULT '',
                seo_keywords TEXT NOT NULL DEFAULT '',
                schema_type TEXT NOT NULL DEFAULT 'NewsArticle',
                published_at INTEGER,
                is_pinned INTEGER DEFAULT 0,
                publisher_id TEXT,
                language TEXT NOT NULL,
                thumbnail TEXT NOT NULL DEFAULT '',
                presentation_mode TEXT NOT NULL DEFAULT 'standard',
                status TEXT NOT NULL DEFAULT 'draft',
                items TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_posts_updated_at ON posts(updated_at DESC)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                parent_id TEXT,
                language TEXT NOT NULL,
                name TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_categories_language ON categories(language, position)",
            [],
        )?;

        Ok(())
    }

    // ==================== Post Methods ====================

    /// Insert or update a post, returning its id
    pub fn upsert_post(&self, record: &PostRecord) -> Result<String, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;
        let now = chrono::Utc::now().timestamp_millis();
        let id = record
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let items_json = serde_json::to_string(&record.items)?;

        conn.execute(
            "INSERT INTO posts (
                id, title, summary, category_id, slug, seo_title, seo_description,
                seo_keywords, schema_type, published_at, is_pinned, publisher_id, language,
                thumbnail, presentation_mode, status, items, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?18)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                summary = excluded.summary,
                category_id = excluded.category_id,
                slug = excluded.slug,
                seo_title = excluded.seo_title,
                seo_description = excluded.seo_description,
                seo_keywords = excluded.seo_keywords,
                schema_type = excluded.schema_type,
                published_at = excluded.published_at,
                is_pinned = excluded.is_pinned,
                publisher_id = excluded.publisher_id,
                language = excluded.language,
                thumbnail = excluded.thumbnail,
                presentation_mode = excluded.presentation_mode,
                status = excluded.status,
                items = excluded.items,
                updated_at = excluded.updated_at",
            rusqlite::params![
                id,
                record.title,
                record.summary,
                record.category_id,
                record.slug,
                record.seo_title,
                record.seo_description,
                record.seo_keywords,
                record.schema_type,
                record.published_at,
                record.is_pinned,
                record.publisher_id,
                record.language,
                record.thumbnail,
                record.presentation_mode.as_str(),
                record.status.as_str(),
                items_json,
                now,
            ],
        )?;

        Ok(id)
    }

    /// Get a post by ID
    pub fn get_post(&self, id: &str) -> Result<Option<PostRecord>, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        let mut stmt = conn.prepare(&format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS))?;
        let mut rows = stmt.query([id])?;

        if let Some(row) = rows.next()? {
            let items_json: String = row.get(16)?;
            let mut record = row_to_record(row)?;
            record.items = serde_json::from_str(&items_json)?;
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    /// List posts, most recently updated first
    pub fn list_posts(&self) -> Result<Vec<PostSummary>, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        let mut stmt = conn.prepare(
            "SELECT id, title, status, language, updated_at
             FROM posts
             ORDER BY updated_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(PostSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                status: PostStatus::from_str(&row.get::<_, String>(2)?),
                language: row.get(3)?,
                updated_at: row.get(4)?,
            })
        })?;

        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }

        Ok(posts)
    }

    /// Delete a post by ID
    pub fn delete_post(&self, id: &str) -> Result<bool, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        let affected = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;

        Ok(affected > 0)
    }

    // ==================== Category Methods ====================

    pub fn add_category(&self, category: &Category) -> Result<(), DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        conn.execute(
            "INSERT OR REPLACE INTO categories (id, parent_id, language, name, position)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                category.id,
                category.parent_id,
                category.language,
                category.name,
                category.position,
            ],
        )?;

        Ok(())
    }

    /// Category tree for `language`, siblings ordered by position
    pub fn get_category_tree(&self, language: &str) -> Result<Vec<CategoryNode>, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Lock)?;

        let mut stmt = conn.prepare(
            "SELECT id, parent_id, language, name, position
             FROM categories
             WHERE language = ?1
             ORDER BY position ASC, name ASC",
        )?;

        let rows = stmt.query_map([language], |row| {
            Ok(Category {
                id: row.get(0)?,
                parent_id: row.get(1)?,
                language: row.get(2)?,
                name: row.get(3)?,
                position: row.get(4)?,
            })
        })?;

        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?);
        }

        Ok(build_tree(&categories, None))
    }
}

fn row_to_record(row: &rusqlite::Row) -> Result<PostRecord, rusqlite::Error> {
    Ok(PostRecord {
        id: Some(row.get(0)?),
        title: row.get(1)?,
        summary: row.get(2)?,
        category_id: row.get(3)?,
        slug: row.get(4)?,
        seo_title: row.get(5)?,
        seo_description: row.get(6)?,
        seo_keywords: row.get(7)?,
        schema_type: row.get(8)?,
        published_at: row.get(9)?,
        is_pinned: row.get(10)?,
        publisher_id: row.get(11)?,
        language: row.get(12)?,
        thumbnail: row.get(13)?,
        presentation_mode: PresentationMode::from_str(&row.get::<_, String>(14)?),
        status: PostStatus::from_str(&row.get::<_, String>(15)?),
        items: Vec::new(),
        created_at: Some(row.get(17)?),
        updated_at: Some(row.get(18)?),
    })
}

/// Children of `parent` (roots for `None`); orphans whose parent is missing are dropped
fn build_tree(categories: &[Category], parent: Option<&str>) -> Vec<CategoryNode> {
    categories
        .iter()
        .filter(|c| c.parent_id.as_deref() == parent)
        .map(|c| CategoryNode {
            id: c.id.clone(),
            name: c.name.clone(),
            children: build_tree(categories, Some(&c.id)),
        })
        .collect()
}

#[async_trait]
impl PersistenceService for Database {
    async fn load_post(&self, id: &str) -> Result<Option<PostRecord>, ServiceError> {
        Ok(self.get_post(id)?)
    }

    async fn save_post(&self, record: &PostRecord) -> Result<String, ServiceError> {
        Ok(self.upsert_post(record)?)
    }
}

#[async_trait]
impl TaxonomyService for Database {
    async fn list_categories(&self, language: &str) -> Result<Vec<CategoryNode>, ServiceError> {
        Ok(self.get_category_tree(language)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Block, BlockContent, BlockKind, FaqEntry};
    use crate::post::types::Document;

    fn category(id: &str, parent: Option<&str>, language: &str, position: i32) -> Category {
        Category {
            id: id.to_string(),
            parent_id: parent.map(String::from),
            language: language.to_string(),
            name: id.to_uppercase(),
            position,
        }
    }

    #[test]
    fn test_upsert_and_get_post() {
        let db = Database::in_memory().unwrap();
        let mut doc = Document::new("en");
        doc.title = "Election night".to_string();
        doc.blocks.append(Block::new(BlockKind::Text));
        doc.faqs.push(FaqEntry {
            question: "When?".to_string(),
            answer: "<p>Tonight</p>".to_string(),
        });

        let id = db.upsert_post(&doc.to_record()).unwrap();
        let loaded = db.get_post(&id).unwrap().unwrap();
        assert_eq!(loaded.title, "Election night");
        assert_eq!(loaded.items.len(), 2);
        assert!(loaded.created_at.is_some());

        let restored = Document::from_record(loaded);
        assert_eq!(restored.faqs.len(), 1);
        assert_eq!(restored.blocks.len(), 1);
    }

    #[test]
    fn test_nan_review_score_reloads() {
        let db = Database::in_memory().unwrap();
        let mut doc = Document::new("en");
        let mut review = Block::new(BlockKind::Review);
        if let BlockContent::Review(data) = &mut review.content {
            data.score = f64::NAN;
        }
        doc.blocks.append(review);

        let id = db.upsert_post(&doc.to_record()).unwrap();
        let loaded = db.get_post(&id).unwrap().unwrap();
        match &loaded.items[0].content {
            BlockContent::Review(data) => assert!(data.score.is_nan()),
            other => panic!("expected review, got {:?}", other),
        }
    }

    #[test]
    fn test_upsert_updates_existing_row() {
        let db = Database::in_memory().unwrap();
        let mut record = Document::new("en").to_record();
        record.title = "Draft".to_string();
        let id = db.upsert_post(&record).unwrap();

        record.id = Some(id.clone());
        record.title = "Final".to_string();
        record.status = PostStatus::Published;
        assert_eq!(db.upsert_post(&record).unwrap(), id);

        let posts = db.list_posts().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "Final");
        assert_eq!(posts[0].status, PostStatus::Published);
    }

    #[test]
    fn test_missing_post_is_none() {
        let db = Database::in_memory().unwrap();
        assert!(db.get_post("nope").unwrap().is_none());
        assert!(!db.delete_post("nope").unwrap());
    }

    #[test]
    fn test_category_tree_by_language() {
        let db = Database::in_memory().unwrap();
        db.add_category(&category("sport", None, "en", 2)).unwrap();
        db.add_category(&category("news", None, "en", 1)).unwrap();
        db.add_category(&category("tech", Some("news"), "en", 0)).unwrap();
        db.add_category(&category("noticias", None, "es", 0)).unwrap();

        let tree = db.get_category_tree("en").unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].id, "news");
        assert_eq!(tree[0].children[0].id, "tech");
        assert_eq!(tree[1].id, "sport");

        assert_eq!(db.get_category_tree("es").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_service_round_trip() {
        let db = Database::in_memory().unwrap();
        let record = Document::new("en").to_record();
        let id = db.save_post(&record).await.unwrap();
        assert!(db.load_post(&id).await.unwrap().is_some());
    }
}
