use serde::{Deserialize, Serialize};

use crate::blocks::{Block, BlockContent, BlockKind, BlockSequence, FaqData, FaqEntry};

/// Id of the block that carries the FAQ list inside a persisted record
pub const SYNTHETIC_FAQ_ID: &str = "post-faq";

/// Maximum title length accepted by validation
pub const MAX_TITLE_LENGTH: usize = 200;

/// Presentation mode of a post
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresentationMode {
    #[default]
    Standard,
    Article,
    Poll,
    Video,
    Quiz,
    Gallery,
}

impl PresentationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresentationMode::Standard => "standard",
            PresentationMode::Article => "article",
            PresentationMode::Poll => "poll",
            PresentationMode::Video => "video",
            PresentationMode::Quiz => "quiz",
            PresentationMode::Gallery => "gallery",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "article" => PresentationMode::Article,
            "poll" => PresentationMode::Poll,
            "video" => PresentationMode::Video,
            "quiz" => PresentationMode::Quiz,
            "gallery" => PresentationMode::Gallery,
            _ => PresentationMode::Standard,
        }
    }

    /// Block variant that must always be present in this mode
    pub fn governing_kind(&self) -> Option<BlockKind> {
        match self {
            PresentationMode::Article => Some(BlockKind::Text),
            PresentationMode::Poll => Some(BlockKind::Poll),
            PresentationMode::Video => Some(BlockKind::Video),
            PresentationMode::Quiz => Some(BlockKind::Quiz),
            PresentationMode::Standard | PresentationMode::Gallery => None,
        }
    }

    pub fn requires_block(&self) -> bool {
        self.governing_kind().is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "published" => PostStatus::Published,
            _ => PostStatus::Draft,
        }
    }
}

/// The post being edited
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Option<String>,
    pub title: String,
    pub summary: String,
    pub category_id: Option<String>,
    pub slug: String,
    pub seo_title: String,
    pub seo_description: String,
    pub seo_keywords: String,
    /// schema.org type emitted for the post, e.g. `NewsArticle`
    pub schema_type: String,
    pub published_at: Option<i64>,
    pub is_pinned: bool,
    pub publisher_id: Option<String>,
    pub language: String,
    pub thumbnail: String,
    pub presentation_mode: PresentationMode,
    pub status: PostStatus,
    pub faqs: Vec<FaqEntry>,
    pub blocks: BlockSequence,
}

impl Document {
    pub fn new(language: &str) -> Self {
        Document {
            id: None,
            title: String::new(),
            summary: String::new(),
            category_id: None,
            slug: String::new(),
            seo_title: String::new(),
            seo_description: String::new(),
            seo_keywords: String::new(),
            schema_type: "NewsArticle".to_string(),
            published_at: None,
            is_pinned: false,
            publisher_id: None,
            language: language.to_string(),
            thumbnail: String::new(),
            presentation_mode: PresentationMode::default(),
            status: PostStatus::default(),
            faqs: Vec::new(),
            blocks: BlockSequence::new(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Number of blocks of the mode's governing variant
    pub fn governing_block_count(&self) -> usize {
        match self.presentation_mode.governing_kind() {
            Some(kind) => self.blocks.blocks().iter().filter(|b| b.kind() == kind).count(),
            None => 0,
        }
    }

    /// Serialize into the persisted shape, folding FAQs into one synthetic block
    pub fn to_record(&self) -> PostRecord {
        let mut items: Vec<Block> = self.blocks.blocks().to_vec();

        if !self.faqs.is_empty() {
            let next_number = items.iter().map(|b| b.order_number).max().unwrap_or(0) + 1;
            items.push(Block {
                id: SYNTHETIC_FAQ_ID.to_string(),
                title: String::new(),
                description: String::new(),
                order_number: next_number,
                created_at: None,
                content: BlockContent::Faq(FaqData {
                    items: self.faqs.clone(),
                }),
            });
        }

        PostRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            summary: self.summary.clone(),
            category_id: self.category_id.clone(),
            slug: self.slug.clone(),
            seo_title: self.seo_title.clone(),
            seo_description: self.seo_description.clone(),
            seo_keywords: self.seo_keywords.clone(),
            schema_type: self.schema_type.clone(),
            published_at: self.published_at,
            is_pinned: self.is_pinned,
            publisher_id: self.publisher_id.clone(),
            language: self.language.clone(),
            thumbnail: self.thumbnail.clone(),
            presentation_mode: self.presentation_mode,
            status: self.status,
            items,
            created_at: None,
            updated_at: None,
        }
    }

    /// Hydrate from a persisted record, pulling the synthetic FAQ block back out
    pub fn from_record(record: PostRecord) -> Self {
        let mut faqs = Vec::new();
        let mut blocks = Vec::with_capacity(record.items.len());

        for item in record.items {
            match item.content {
                BlockContent::Faq(data) if item.id == SYNTHETIC_FAQ_ID => faqs.extend(data.items),
                _ => blocks.push(item),
            }
        }

        Document {
            id: record.id,
            title: record.title,
            summary: record.summary,
            category_id: record.category_id,
            slug: record.slug,
            seo_title: record.seo_title,
            seo_description: record.seo_description,
            seo_keywords: record.seo_keywords,
            schema_type: record.schema_type,
            published_at: record.published_at,
            is_pinned: record.is_pinned,
            publisher_id: record.publisher_id,
            language: record.language,
            thumbnail: record.thumbnail,
            presentation_mode: record.presentation_mode,
            status: record.status,
            faqs,
            blocks: BlockSequence::from_blocks(blocks),
        }
    }
}

/// Persisted post as exchanged with the persistence service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub id: Option<String>,
    pub title: String,
    pub summary: String,
    pub category_id: Option<String>,
    pub slug: String,
    pub seo_title: String,
    pub seo_description: String,
    pub seo_keywords: String,
    pub schema_type: String,
    pub published_at: Option<i64>,
    pub is_pinned: bool,
    pub publisher_id: Option<String>,
    pub language: String,
    pub thumbnail: String,
    pub presentation_mode: PresentationMode,
    pub status: PostStatus,
    /// Tagged block objects; FAQs ride along as a trailing `faq` block
    pub items: Vec<Block>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

/// Lightweight row for post listings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub status: PostStatus,
    pub language: String,
    pub updated_at: i64,
}

// ==================== Validation ====================

/// Form fields that can fail validation, in form order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DocumentField {
    Title,
    Category,
    Language,
    Thumbnail,
}

impl DocumentField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentField::Title => "title",
            DocumentField::Category => "category",
            DocumentField::Language => "language",
            DocumentField::Thumbnail => "thumbnail",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    pub field: DocumentField,
    pub message: String,
}

/// Check required scalar fields; issues come back in form order so the first
/// one is the field to focus
pub fn validate(doc: &Document, for_publish: bool) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let title = doc.title.trim();
    if title.is_empty() {
        issues.push(ValidationIssue {
            field: DocumentField::Title,
            message: "Title is required".to_string(),
        });
    } else if title.chars().count() > MAX_TITLE_LENGTH {
        issues.push(ValidationIssue {
            field: DocumentField::Title,
            message: format!("Title must be at most {} characters", MAX_TITLE_LENGTH),
        });
    }

    if doc.category_id.as_deref().map(str::trim).unwrap_or("").is_empty() {
        issues.push(ValidationIssue {
            field: DocumentField::Category,
            message: "Category is required".to_string(),
        });
    }

    if doc.language.trim().is_empty() {
        issues.push(ValidationIssue {
            field: DocumentField::Language,
            message: "Language is required".to_string(),
        });
    }

    if for_publish && doc.thumbnail.trim().is_empty() {
        issues.push(ValidationIssue {
            field: DocumentField::Thumbnail,
            message: "A thumbnail is required to publish".to_string(),
        });
    }

    issues
}

/// URL slug: lowercased letters and digits, any script, joined by single dashes
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

// ==================== Taxonomy ====================

/// Category row as stored
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub parent_id: Option<String>,
    pub language: String,
    pub name: String,
    pub position: i32,
}

/// Category with its children, as returned by the taxonomy service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    pub id: String,
    pub name: String,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    pub fn contains(&self, id: &str) -> bool {
        self.id == id || self.children.iter().any(|c| c.contains(id))
    }
}

/// Whether `id` appears anywhere in `tree`
pub fn tree_contains(tree: &[CategoryNode], id: &str) -> bool {
    tree.iter().any(|node| node.contains(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Direction, SequencingMode};

    fn faq(q: &str) -> FaqEntry {
        FaqEntry {
            question: q.to_string(),
            answer: "<p>yes</p>".to_string(),
        }
    }

    #[test]
    fn test_record_folds_and_strips_faqs() {
        let mut doc = Document::new("en");
        doc.blocks.append(Block::new(BlockKind::Text));
        doc.blocks.append(Block::new(BlockKind::Image));
        doc.faqs = vec![faq("one?"), faq("two?")];

        let record = doc.to_record();
        assert_eq!(record.items.len(), 3);
        let last = record.items.last().unwrap();
        assert_eq!(last.id, SYNTHETIC_FAQ_ID);
        assert_eq!(last.kind(), BlockKind::Faq);
        assert_eq!(last.order_number, 3);

        let restored = Document::from_record(record);
        assert_eq!(restored.faqs, doc.faqs);
        assert_eq!(restored.blocks.len(), 2);
    }

    #[test]
    fn test_user_faq_block_is_kept_as_block() {
        let mut doc = Document::new("en");
        doc.blocks.append(Block::new(BlockKind::Faq));

        let restored = Document::from_record(doc.to_record());
        assert!(restored.faqs.is_empty());
        assert_eq!(restored.blocks.blocks()[0].kind(), BlockKind::Faq);
    }

    fn block_ids(doc: &Document) -> Vec<String> {
        doc.blocks.blocks().iter().map(|b| b.id.clone()).collect()
    }

    fn named(id: &str) -> Block {
        let mut block = Block::new(BlockKind::Text);
        block.id = id.to_string();
        block
    }

    #[test]
    fn test_desc_post_reloads_in_saved_order() {
        let mut doc = Document::new("en");
        doc.blocks.set_mode(SequencingMode::Desc);
        for id in ["a", "b", "c"] {
            doc.blocks.append(named(id));
        }

        let restored = Document::from_record(doc.to_record());
        assert_eq!(block_ids(&restored), vec!["a", "b", "c"]);
        let numbers: Vec<u32> = restored.blocks.blocks().iter().map(|b| b.order_number).collect();
        assert_eq!(numbers, vec![3, 2, 1]);
    }

    #[test]
    fn test_unsequenced_move_survives_reload() {
        let mut doc = Document::new("en");
        for id in ["a", "b", "c"] {
            doc.blocks.append(named(id));
        }
        assert!(doc.blocks.move_block(1, Direction::Down));
        assert_eq!(block_ids(&doc), vec!["a", "c", "b"]);

        let restored = Document::from_record(doc.to_record());
        assert_eq!(block_ids(&restored), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_validate_reports_in_form_order() {
        let doc = Document::new("");
        let issues = validate(&doc, true);
        let fields: Vec<_> = issues.iter().map(|i| i.field).collect();
        assert_eq!(
            fields,
            vec![
                DocumentField::Title,
                DocumentField::Category,
                DocumentField::Language,
                DocumentField::Thumbnail
            ]
        );
    }

    #[test]
    fn test_validate_thumbnail_only_for_publish() {
        let mut doc = Document::new("en");
        doc.title = "Launch day".to_string();
        doc.category_id = Some("news".to_string());
        assert!(validate(&doc, false).is_empty());
        assert_eq!(validate(&doc, true)[0].field, DocumentField::Thumbnail);
    }

    #[test]
    fn test_validate_title_length() {
        let mut doc = Document::new("en");
        doc.title = "x".repeat(MAX_TITLE_LENGTH + 1);
        doc.category_id = Some("news".to_string());
        let issues = validate(&doc, false);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("at most"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Hello, World!  "), "hello-world");
        assert_eq!(slugify("Top 10 -- Picks"), "top-10-picks");
        assert_eq!(slugify("¿Qué?"), "qué");
        assert_eq!(slugify("Año Nuevo 2025"), "año-nuevo-2025");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_governing_kinds() {
        assert_eq!(PresentationMode::Article.governing_kind(), Some(BlockKind::Text));
        assert_eq!(PresentationMode::Poll.governing_kind(), Some(BlockKind::Poll));
        assert!(!PresentationMode::Gallery.requires_block());
        assert_eq!(PresentationMode::from_str("bogus"), PresentationMode::Standard);
    }

    #[test]
    fn test_category_tree_lookup() {
        let tree = vec![CategoryNode {
            id: "news".to_string(),
            name: "News".to_string(),
            children: vec![CategoryNode {
                id: "tech".to_string(),
                name: "Tech".to_string(),
                children: vec![],
            }],
        }];
        assert!(tree_contains(&tree, "tech"));
        assert!(!tree_contains(&tree, "sport"));
    }
}
