use serde::{Deserialize, Deserializer, Serialize};

/// Variant tag of a content block
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Image,
    Slider,
    Video,
    Audio,
    File,
    Social,
    Flipcard,
    Beforeafter,
    Poll,
    Vs,
    Review,
    Quote,
    Iframe,
    Quiz,
    Faq,
}

impl BlockKind {
    pub const ALL: [BlockKind; 16] = [
        BlockKind::Text,
        BlockKind::Image,
        BlockKind::Slider,
        BlockKind::Video,
        BlockKind::Audio,
        BlockKind::File,
        BlockKind::Social,
        BlockKind::Flipcard,
        BlockKind::Beforeafter,
        BlockKind::Poll,
        BlockKind::Vs,
        BlockKind::Review,
        BlockKind::Quote,
        BlockKind::Iframe,
        BlockKind::Quiz,
        BlockKind::Faq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Image => "image",
            BlockKind::Slider => "slider",
            BlockKind::Video => "video",
            BlockKind::Audio => "audio",
            BlockKind::File => "file",
            BlockKind::Social => "social",
            BlockKind::Flipcard => "flipcard",
            BlockKind::Beforeafter => "beforeafter",
            BlockKind::Poll => "poll",
            BlockKind::Vs => "vs",
            BlockKind::Review => "review",
            BlockKind::Quote => "quote",
            BlockKind::Iframe => "iframe",
            BlockKind::Quiz => "quiz",
            BlockKind::Faq => "faq",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

/// One content unit of a post body.
///
/// Common fields live here; the variant payload is flattened next to them
/// and discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Rich text for most variants, plain text for a few
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(flatten)]
    pub content: BlockContent,
}

impl Block {
    /// Fresh block of `kind` with a new id and the variant's default payload.
    /// The order number is assigned when the block enters a sequence.
    pub fn new(kind: BlockKind) -> Self {
        Block {
            id: uuid::Uuid::new_v4().to_string(),
            title: String::new(),
            description: String::new(),
            order_number: 0,
            created_at: Some(chrono::Utc::now().timestamp_millis()),
            content: BlockContent::default_for(kind),
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.content.kind()
    }

    /// Every media URL the block references, in display order
    pub fn media_urls(&self) -> Vec<&str> {
        let urls: Vec<&str> = match &self.content {
            BlockContent::Image(m)
            | BlockContent::Video(m)
            | BlockContent::Audio(m)
            | BlockContent::File(m)
            | BlockContent::Social(m) => vec![m.media_url.as_str()],
            BlockContent::Slider(s) => s.media_urls.iter().map(String::as_str).collect(),
            BlockContent::Flipcard(f) => vec![f.front_image.as_str(), f.back_image.as_str()],
            BlockContent::Beforeafter(b) => vec![b.before_image.as_str(), b.after_image.as_str()],
            BlockContent::Poll(p) | BlockContent::Vs(p) => std::iter::once(p.media_url.as_str())
                .chain(p.options.iter().map(|o| o.image.as_str()))
                .collect(),
            BlockContent::Text {}
            | BlockContent::Review(_)
            | BlockContent::Quote(_)
            | BlockContent::Iframe(_)
            | BlockContent::Quiz(_)
            | BlockContent::Faq(_) => Vec::new(),
        };

        urls.into_iter().filter(|u| !u.is_empty()).collect()
    }
}

/// Variant payloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockContent {
    Text {},
    Image(SingleMedia),
    Slider(SliderData),
    Video(SingleMedia),
    Audio(SingleMedia),
    File(SingleMedia),
    Social(SingleMedia),
    Flipcard(FlipCardData),
    Beforeafter(BeforeAfterData),
    Poll(PollData),
    Vs(PollData),
    Review(ReviewData),
    Quote(QuoteData),
    Iframe(IframeData),
    Quiz(QuizData),
    Faq(FaqData),
}

impl BlockContent {
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockContent::Text {} => BlockKind::Text,
            BlockContent::Image(_) => BlockKind::Image,
            BlockContent::Slider(_) => BlockKind::Slider,
            BlockContent::Video(_) => BlockKind::Video,
            BlockContent::Audio(_) => BlockKind::Audio,
            BlockContent::File(_) => BlockKind::File,
            BlockContent::Social(_) => BlockKind::Social,
            BlockContent::Flipcard(_) => BlockKind::Flipcard,
            BlockContent::Beforeafter(_) => BlockKind::Beforeafter,
            BlockContent::Poll(_) => BlockKind::Poll,
            BlockContent::Vs(_) => BlockKind::Vs,
            BlockContent::Review(_) => BlockKind::Review,
            BlockContent::Quote(_) => BlockKind::Quote,
            BlockContent::Iframe(_) => BlockKind::Iframe,
            BlockContent::Quiz(_) => BlockKind::Quiz,
            BlockContent::Faq(_) => BlockKind::Faq,
        }
    }

    pub fn default_for(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Text => BlockContent::Text {},
            BlockKind::Image => BlockContent::Image(SingleMedia::default()),
            BlockKind::Slider => BlockContent::Slider(SliderData::default()),
            BlockKind::Video => BlockContent::Video(SingleMedia::default()),
            BlockKind::Audio => BlockContent::Audio(SingleMedia::default()),
            BlockKind::File => BlockContent::File(SingleMedia::default()),
            BlockKind::Social => BlockContent::Social(SingleMedia::default()),
            BlockKind::Flipcard => BlockContent::Flipcard(FlipCardData::default()),
            BlockKind::Beforeafter => BlockContent::Beforeafter(BeforeAfterData::default()),
            BlockKind::Poll => BlockContent::Poll(PollData::with_options(2, PollLayout::Image)),
            BlockKind::Vs => BlockContent::Vs(PollData::with_options(2, PollLayout::Image)),
            BlockKind::Review => BlockContent::Review(ReviewData::default()),
            BlockKind::Quote => BlockContent::Quote(QuoteData::default()),
            BlockKind::Iframe => BlockContent::Iframe(IframeData::default()),
            BlockKind::Quiz => BlockContent::Quiz(QuizData {
                questions: vec![QuizQuestion::new()],
            }),
            BlockKind::Faq => BlockContent::Faq(FaqData::default()),
        }
    }
}

/// Payload of image, video, audio, file and social blocks
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SingleMedia {
    pub media_url: String,
    pub alt_text: String,
    /// Credit line shown under the media
    pub source: String,
}

/// Gallery payload; `alt_texts` is index-aligned with `media_urls` and may be shorter
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SliderData {
    pub media_urls: Vec<String>,
    pub alt_texts: Vec<String>,
}

impl SliderData {
    pub fn alt_text(&self, index: usize) -> &str {
        self.alt_texts.get(index).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FlipCardData {
    pub front_image: String,
    pub back_image: String,
    pub front_text: String,
    pub back_text: String,
}

impl FlipCardData {
    pub const IMAGE_SLOTS: [&'static str; 2] = ["frontImage", "backImage"];

    /// Write `url` into the image slot named `slot`; false for unknown slots
    pub fn set_image(&mut self, slot: &str, url: &str) -> bool {
        match slot {
            "frontImage" => self.front_image = url.to_string(),
            "backImage" => self.back_image = url.to_string(),
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BeforeAfterData {
    pub before_image: String,
    pub after_image: String,
    pub before_label: String,
    pub after_label: String,
}

impl BeforeAfterData {
    pub const IMAGE_SLOTS: [&'static str; 2] = ["beforeImage", "afterImage"];

    pub fn set_image(&mut self, slot: &str, url: &str) -> bool {
        match slot {
            "beforeImage" => self.before_image = url.to_string(),
            "afterImage" => self.after_image = url.to_string(),
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PollLayout {
    #[default]
    Text,
    Image,
}

/// Payload of poll and versus blocks
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PollData {
    pub options: Vec<PollOption>,
    /// Cover image, used when no option is targeted
    pub media_url: String,
    pub layout: PollLayout,
}

impl PollData {
    pub fn with_options(count: usize, layout: PollLayout) -> Self {
        PollData {
            options: (0..count).map(|_| PollOption::new()).collect(),
            media_url: String::new(),
            layout,
        }
    }

    pub fn total_votes(&self) -> i64 {
        self.options.iter().map(|o| o.votes).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PollOption {
    pub id: String,
    pub text: String,
    pub votes: i64,
    pub image: String,
}

impl PollOption {
    pub fn new() -> Self {
        PollOption {
            id: uuid::Uuid::new_v4().to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewData {
    pub product_name: String,
    /// Non-finite scores are written as `null`
    #[serde(deserialize_with = "score_or_nan")]
    pub score: f64,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
}

fn score_or_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteData {
    pub text: String,
    pub author: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct IframeData {
    pub url: String,
    pub height: u32,
}

impl Default for IframeData {
    fn default() -> Self {
        Self {
            url: String::new(),
            height: 400,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizData {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizQuestion {
    pub id: String,
    pub question: String,
    pub answers: Vec<QuizAnswer>,
}

impl QuizQuestion {
    pub fn new() -> Self {
        QuizQuestion {
            id: uuid::Uuid::new_v4().to_string(),
            question: String::new(),
            answers: vec![QuizAnswer::default(), QuizAnswer::default()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizAnswer {
    pub text: String,
    pub correct: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FaqData {
    pub items: Vec<FaqEntry>,
}

/// Question/answer pair; the answer is rich text
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}
