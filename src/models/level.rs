use serde::{Deserialize, Serialize};

/// One level of the interlinear hierarchy.
///
/// Levels are declared outermost first, so the derived `Ord` matches
/// containment: a text contains paragraphs, a paragraph contains phrases,
/// and so on down to morphemes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    #[serde(rename = "interlinear-text")]
    Text,
    Paragraph,
    Phrase,
    Word,
    Morph,
}

impl Level {
    /// Every level in hierarchy order.
    pub const ALL: [Level; 5] = [
        Level::Text,
        Level::Paragraph,
        Level::Phrase,
        Level::Word,
        Level::Morph,
    ];

    /// The markup tag and stored unit type for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "interlinear-text",
            Self::Paragraph => "paragraph",
            Self::Phrase => "phrase",
            Self::Word => "word",
            Self::Morph => "morph",
        }
    }

    /// Tag of the element that holds this level's units inside their parent.
    /// The outermost level is never grouped.
    pub fn group_tag(&self) -> Option<&'static str> {
        match self {
            Self::Text => None,
            Self::Paragraph => Some("paragraphs"),
            Self::Phrase => Some("phrases"),
            Self::Word => Some("words"),
            Self::Morph => Some("morphemes"),
        }
    }

    /// Match a markup tag exactly.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "interlinear-text" => Some(Self::Text),
            "paragraph" => Some(Self::Paragraph),
            "phrase" => Some(Self::Phrase),
            "word" => Some(Self::Word),
            "morph" => Some(Self::Morph),
            _ => None,
        }
    }

    /// Match a level name given by a user, which may also be the short
    /// alias `text` for `interlinear-text`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "text" => Some(Self::Text),
            other => Self::from_tag(other),
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
