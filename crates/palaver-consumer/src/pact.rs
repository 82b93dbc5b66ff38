//! Pact artifact for plugin transports.
//!
//! One JSON document per consumer/provider pair at
//! `<pact_dir>/<consumer>-<provider>.json`. Writes merge into whatever is
//! already on disk: interactions are keyed by message, a later response
//! replaces an earlier one in place, and first-seen order is kept, so
//! repeated writes never duplicate entries.

use std::path::{Path, PathBuf};

use palaver_proto::Interaction;
use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, PactTarget};

/// Pact specification version written to `metadata`.
pub const PACT_SPECIFICATION_VERSION: &str = "4.0";

/// Named party to a pact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pacticipant {
    /// Name
    pub name: String,
}

/// `metadata.pactSpecification`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PactSpecification {
    /// Specification version
    pub version: String,
}

/// Pact metadata block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PactMetadata {
    /// Specification the document follows
    pub pact_specification: PactSpecification,
}

impl Default for PactMetadata {
    fn default() -> Self {
        Self {
            pact_specification: PactSpecification {
                version: PACT_SPECIFICATION_VERSION.to_string(),
            },
        }
    }
}

/// Pact document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PactFile {
    /// Consumer
    pub consumer: Pacticipant,
    /// Provider
    pub provider: Pacticipant,
    /// Verified interactions, unique by message
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    /// Metadata
    #[serde(default)]
    pub metadata: PactMetadata,
}

impl PactFile {
    /// Empty pact between `consumer` and `provider`.
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            consumer: Pacticipant { name: consumer.into() },
            provider: Pacticipant { name: provider.into() },
            interactions: Vec::new(),
            metadata: PactMetadata::default(),
        }
    }

    /// Merge `interactions` in; returns how many messages were new.
    pub fn merge(&mut self, interactions: &[Interaction]) -> usize {
        merge_interactions(&mut self.interactions, interactions)
    }

    /// Read the pact at `path`, or `None` if no file exists.
    pub async fn load(path: &Path) -> Result<Option<Self>, EngineError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(write_failed(path, &e)),
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| write_failed(path, &e))
    }

    /// Merge `interactions` into the pact at `target` and write it back.
    ///
    /// The document is written to a sibling temp file and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns `WriteFailed` if:
    /// - The pact directory cannot be created
    /// - An existing file cannot be parsed
    /// - An existing file names a different consumer or provider
    /// - The file cannot be written
    pub async fn write_merged(
        target: &PactTarget,
        interactions: &[Interaction],
    ) -> Result<PathBuf, EngineError> {
        let path = target.file_path();
        tokio::fs::create_dir_all(&target.dir).await.map_err(|e| write_failed(&target.dir, &e))?;

        let mut pact = match Self::load(&path).await? {
            Some(existing) => {
                if existing.consumer.name != target.consumer
                    || existing.provider.name != target.provider
                {
                    return Err(EngineError::write_failed(format!(
                        "{} belongs to {} -> {}",
                        path.display(),
                        existing.consumer.name,
                        existing.provider.name
                    )));
                }
                existing
            },
            None => Self::new(&target.consumer, &target.provider),
        };

        let added = pact.merge(interactions);
        let json = serde_json::to_vec_pretty(&pact).map_err(|e| write_failed(&path, &e))?;

        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, json).await.map_err(|e| write_failed(&staging, &e))?;
        tokio::fs::rename(&staging, &path).await.map_err(|e| write_failed(&path, &e))?;

        tracing::debug!(
            path = %path.display(),
            added,
            total = pact.interactions.len(),
            "pact file written"
        );

        Ok(path)
    }
}

/// Merge `incoming` into `existing` by message key; returns how many were new.
pub fn merge_interactions(existing: &mut Vec<Interaction>, incoming: &[Interaction]) -> usize {
    let mut added = 0;
    for interaction in incoming {
        match existing.iter_mut().find(|known| known.message == interaction.message) {
            Some(known) => known.clone_from(interaction),
            None => {
                existing.push(interaction.clone());
                added += 1;
            },
        }
    }
    added
}

fn write_failed(path: &Path, err: &dyn std::fmt::Display) -> EngineError {
    EngineError::write_failed(format!("{}: {err}", path.display()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn target(dir: &Path) -> PactTarget {
        PactTarget {
            dir: dir.to_path_buf(),
            consumer: "billing".to_string(),
            provider: "ledger".to_string(),
        }
    }

    #[test]
    fn merge_dedupes_by_message() {
        let mut pact = PactFile::new("billing", "ledger");

        assert_eq!(pact.merge(&[Interaction::new("PING", "PONG"), Interaction::new("A", "1")]), 2);
        assert_eq!(pact.merge(&[Interaction::new("A", "2"), Interaction::new("B", "3")]), 1);

        let messages: Vec<_> = pact.interactions.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(messages, vec!["PING", "A", "B"]);
        assert_eq!(pact.interactions[1].response, "2");
    }

    #[test]
    fn document_shape() {
        let mut pact = PactFile::new("billing", "ledger");
        pact.merge(&[Interaction::new("PING", "PONG")]);

        let json = serde_json::to_value(&pact).unwrap();

        assert_eq!(json["consumer"]["name"], "billing");
        assert_eq!(json["provider"]["name"], "ledger");
        assert_eq!(json["interactions"][0]["message"], "PING");
        assert_eq!(json["metadata"]["pactSpecification"]["version"], "4.0");
    }

    #[tokio::test]
    async fn repeated_writes_do_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let target = target(&dir.path().join("pacts"));

        let path = PactFile::write_merged(&target, &[Interaction::new("PING", "PONG")]).await.unwrap();
        PactFile::write_merged(
            &target,
            &[Interaction::new("PING", "PONG"), Interaction::new("STATUS", "UP")],
        )
        .await
        .unwrap();

        let pact = PactFile::load(&path).await.unwrap().unwrap();
        assert_eq!(pact.interactions.len(), 2);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();

        assert!(PactFile::load(&dir.path().join("nope.json")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let target = target(dir.path());
        std::fs::write(target.file_path(), b"{not json").unwrap();

        let err = PactFile::write_merged(&target, &[]).await.unwrap_err();
        assert!(matches!(err, EngineError::WriteFailed { .. }));
    }

    #[tokio::test]
    async fn foreign_pact_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let target = target(dir.path());
        let foreign = serde_json::to_vec(&PactFile::new("someone", "else")).unwrap();
        std::fs::write(target.file_path(), &foreign).unwrap();

        let err = PactFile::write_merged(&target, &[]).await.unwrap_err();

        assert!(matches!(err, EngineError::WriteFailed { .. }));
        assert_eq!(std::fs::read(target.file_path()).unwrap(), foreign);
    }
}
