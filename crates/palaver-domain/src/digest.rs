//! Content digest used as the cache key

use crate::conversation::Conversation;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable content hash over a conversation and a recipe fingerprint
///
/// Two digests are equal iff the ordered message sequence (sender, text,
/// timestamp) and the recipe's semantic surface (version, prompt template,
/// expected keys) are identical. Together with the conversation identifier
/// this is the cache key; any semantically relevant change forces a miss.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationDigest(String);

impl ConversationDigest {
    /// Compute the digest for a conversation under a recipe fingerprint
    pub fn compute(conversation: &Conversation, recipe_fingerprint: &str) -> Self {
        let mut hasher = Sha256::new();
        for message in &conversation.messages {
            hasher.update(message.sender.as_str().as_bytes());
            hasher.update([0x1f]);
            hasher.update(message.text.as_bytes());
            hasher.update([0x1f]);
            hasher.update(message.timestamp.timestamp_millis().to_be_bytes());
            hasher.update([0x1e]);
        }
        hasher.update([0u8]);
        hasher.update(recipe_fingerprint.as_bytes());

        let mut out = String::with_capacity(64);
        for b in hasher.finalize() {
            out.push_str(&format!("{:02x}", b));
        }
        Self(out)
    }

    /// Reconstruct a digest from its stored hex form
    ///
    /// For storage-layer deserialization only; no validation beyond shape.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Hex string view
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
