//! Schema-version classification and ordered document migrations.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Relationship between a persisted version tag and the running schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaVersion {
    /// No tag was persisted (fresh install or pre-versioning snapshot).
    Unversioned,
    /// A tag was persisted but differs from the running schema.
    Outdated(String),
    /// The tag matches the running schema.
    Current,
}

impl SchemaVersion {
    /// Classify a stored tag against `current`.
    #[must_use]
    pub fn classify(stored: Option<&str>, current: &str) -> Self {
        match stored.map(str::trim) {
            None | Some("") => Self::Unversioned,
            Some(tag) if tag == current => Self::Current,
            Some(tag) => Self::Outdated(tag.to_string()),
        }
    }

    /// `true` unless the tag is current.
    #[must_use]
    pub const fn needs_migration(&self) -> bool {
        !matches!(self, Self::Current)
    }

    /// The stored tag, when one exists.
    #[must_use]
    pub fn stored(&self) -> Option<&str> {
        match self {
            Self::Outdated(tag) => Some(tag),
            Self::Unversioned | Self::Current => None,
        }
    }
}

type Transform = Arc<dyn Fn(&mut Value) + Send + Sync>;

struct MigrationStep {
    from: Option<String>,
    transform: Transform,
}

/// Ordered chain of document transforms.
///
/// Steps are registered oldest first. Migration starts at the first step
/// whose source version matches the stored tag and runs every later step.
#[derive(Clone, Default)]
pub struct Migrator {
    steps: Vec<Arc<MigrationStep>>,
}

impl Migrator {
    /// Create a migrator with no steps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step upgrading documents tagged `from`.
    ///
    /// `None` matches unversioned documents.
    #[must_use]
    pub fn step<F>(mut self, from: Option<&str>, transform: F) -> Self
    where
        F: Fn(&mut Value) + Send + Sync + 'static,
    {
        self.steps.push(Arc::new(MigrationStep {
            from: from.map(str::to_string),
            transform: Arc::new(transform),
        }));
        self
    }

    /// Number of registered steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// `true` when no step is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply the steps relevant to `state` and return how many ran.
    pub fn migrate(&self, state: &SchemaVersion, document: &mut Value) -> usize {
        let source = match state {
            SchemaVersion::Current => return 0,
            SchemaVersion::Unversioned => None,
            SchemaVersion::Outdated(tag) => Some(tag.as_str()),
        };
        let Some(start) = self
            .steps
            .iter()
            .position(|step| step.from.as_deref() == source)
        else {
            return 0;
        };
        let pending = &self.steps[start..];
        for step in pending {
            (step.transform)(document);
        }
        pending.len()
    }
}

impl fmt::Debug for Migrator {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<Option<&str>> = self
            .steps
            .iter()
            .map(|step| step.from.as_deref())
            .collect();
        formatter
            .debug_struct("Migrator")
            .field("steps", &sources)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_covers_every_state() {
        assert_eq!(SchemaVersion::classify(None, "1.0.0"), SchemaVersion::Unversioned);
        assert_eq!(SchemaVersion::classify(Some(" "), "1.0.0"), SchemaVersion::Unversioned);
        assert_eq!(SchemaVersion::classify(Some("1.0.0"), "1.0.0"), SchemaVersion::Current);
        let outdated = SchemaVersion::classify(Some("0.9.0"), "1.0.0");
        assert_eq!(outdated, SchemaVersion::Outdated("0.9.0".into()));
        assert_eq!(outdated.stored(), Some("0.9.0"));
        assert!(outdated.needs_migration());
        assert!(!SchemaVersion::Current.needs_migration());
    }

    #[test]
    fn empty_migrator_leaves_document_alone() {
        let mut document = json!({"audio": {"volume": 0.2}});
        let ran = Migrator::new().migrate(&SchemaVersion::Unversioned, &mut document);
        assert_eq!(ran, 0);
        assert_eq!(document, json!({"audio": {"volume": 0.2}}));
    }

    #[test]
    fn runs_from_matching_step_onward() {
        let migrator = Migrator::new()
            .step(None, |doc| doc["trail"] = json!(["unversioned"]))
            .step(Some("0.8.0"), |doc| {
                if let Some(trail) = doc["trail"].as_array_mut() {
                    trail.push(json!("0.8.0"));
                } else {
                    doc["trail"] = json!(["0.8.0"]);
                }
            })
            .step(Some("0.9.0"), |doc| {
                if let Some(trail) = doc["trail"].as_array_mut() {
                    trail.push(json!("0.9.0"));
                }
            });
        assert_eq!(migrator.len(), 3);

        let mut document = json!({});
        let ran = migrator.migrate(&SchemaVersion::Outdated("0.8.0".into()), &mut document);
        assert_eq!(ran, 2);
        assert_eq!(document["trail"], json!(["0.8.0", "0.9.0"]));

        let mut document = json!({});
        assert_eq!(migrator.migrate(&SchemaVersion::Unversioned, &mut document), 3);
        assert_eq!(document["trail"], json!(["unversioned", "0.8.0", "0.9.0"]));
    }

    #[test]
    fn unknown_source_version_runs_nothing() {
        let migrator = Migrator::new().step(Some("0.9.0"), |doc| doc["touched"] = json!(true));
        let mut document = json!({});
        assert_eq!(
            migrator.migrate(&SchemaVersion::Outdated("0.1.0".into()), &mut document),
            0
        );
        assert!(document.get("touched").is_none());
    }
}
