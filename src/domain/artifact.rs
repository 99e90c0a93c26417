//! Artifacts: the text objects every stage consumes and produces.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// What kind of text the pipeline is refining
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    #[default]
    Code,
    Document,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Code => "code",
            ArtifactKind::Document => "document",
        }
    }

    /// Focus area used when nothing has been derived yet
    pub fn default_focus_area(&self) -> &'static str {
        match self {
            ArtifactKind::Code => "Initial focus on code structure and functionality",
            ArtifactKind::Document => "Initial focus on document structure and content",
        }
    }

    /// Next steps used when nothing has been derived yet
    pub fn default_next_steps(&self) -> &'static str {
        match self {
            ArtifactKind::Code => {
                "Begin by implementing basic functionality and ensuring code structure is sound."
            }
            ArtifactKind::Document => {
                "Begin by drafting the core content and ensuring the document structure is sound."
            }
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "code" => Ok(ArtifactKind::Code),
            "document" | "doc" => Ok(ArtifactKind::Document),
            other => Err(format!("unknown artifact kind: {}", other)),
        }
    }
}

/// An immutable text blob. Stages never mutate one; they return a new Artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    kind: ArtifactKind,
    content: String,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    /// A new artifact of the same kind with different content
    pub fn derive(&self, content: impl Into<String>) -> Self {
        Self::new(self.kind, content)
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// True when the content is empty or whitespace-only
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Hex SHA-256 of the content
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.content.as_bytes()))
    }

    /// First 12 hex chars of the digest, for receipts and log lines
    pub fn short_digest(&self) -> String {
        self.digest()[..12].to_string()
    }

    /// Same content modulo surrounding whitespace
    pub fn same_content(&self, other: &Artifact) -> bool {
        self.content.trim() == other.content.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_kind_from_str() {
        assert_eq!("code".parse::<ArtifactKind>(), Ok(ArtifactKind::Code));
        assert_eq!("Document".parse::<ArtifactKind>(), Ok(ArtifactKind::Document));
        assert_eq!("doc".parse::<ArtifactKind>(), Ok(ArtifactKind::Document));
        assert!("poem".parse::<ArtifactKind>().is_err());
    }

    #[test]
    fn test_artifact_kind_serialization() {
        assert_eq!(serde_json::to_string(&ArtifactKind::Code).unwrap(), "\"code\"");
        assert_eq!(serde_json::to_string(&ArtifactKind::Document).unwrap(), "\"document\"");
    }

    #[test]
    fn test_artifact_is_blank() {
        assert!(Artifact::new(ArtifactKind::Code, "  \n\t ").is_blank());
        assert!(!Artifact::new(ArtifactKind::Code, "fn main() {}").is_blank());
    }

    #[test]
    fn test_artifact_derive_keeps_kind() {
        let doc = Artifact::new(ArtifactKind::Document, "# Title");
        let next = doc.derive("# Better title");
        assert_eq!(next.kind(), ArtifactKind::Document);
        assert_eq!(next.content(), "# Better title");
        assert_eq!(doc.content(), "# Title");
    }

    #[test]
    fn test_artifact_digest_is_stable() {
        let a = Artifact::new(ArtifactKind::Code, "abc");
        // sha256("abc")
        assert_eq!(
            a.digest(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(a.short_digest(), "ba7816bf8f01");
    }

    #[test]
    fn test_same_content_ignores_surrounding_whitespace() {
        let a = Artifact::new(ArtifactKind::Code, "x = 1\n");
        let b = Artifact::new(ArtifactKind::Code, "  x = 1");
        let c = Artifact::new(ArtifactKind::Code, "x = 2");
        assert!(a.same_content(&b));
        assert!(!a.same_content(&c));
    }

    #[test]
    fn test_default_steering_text() {
        assert!(ArtifactKind::Code.default_focus_area().contains("code structure"));
        assert!(!ArtifactKind::Document.default_next_steps().is_empty());
    }
}
