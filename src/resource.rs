//! # Resource references
//!
//! Turns the names users type into fully-qualified API resource names. A
//! command may receive any of:
//!
//! * a bare id (`my-vm`),
//! * a relative name (`projects/p/zones/z/instances/my-vm`),
//! * a self-link (`https://compute.googleapis.com/compute/v1/projects/...`).
//!
//! Bare ids are completed attribute by attribute through an ordered list of
//! fallthroughs (flag, configuration property, fixed default). Relative names
//! and self-links are validated against the collection's path template, so a
//! topic name never silently resolves as an instance.

use std::fmt;

use crate::config::{ConfigError, ConfigStore, Property};

/// Release track selecting the API version a command family targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseTrack {
    Alpha,
    Beta,
    #[default]
    Ga,
}

impl ReleaseTrack {
    /// Version path segment for the Compute API. Storage and Pub/Sub only
    /// publish `v1`, so the track does not change their URLs.
    pub fn compute_version(self) -> &'static str {
        match self {
            ReleaseTrack::Alpha => "alpha",
            ReleaseTrack::Beta => "beta",
            ReleaseTrack::Ga => "v1",
        }
    }
}

/// The API services commands talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Api {
    Compute,
    Pubsub,
    Storage,
}

impl Api {
    /// Versioned base URL, no trailing slash.
    pub fn base_url(self, track: ReleaseTrack) -> String {
        match self {
            Api::Compute => format!(
                "https://compute.googleapis.com/compute/{}",
                track.compute_version()
            ),
            Api::Pubsub => "https://pubsub.googleapis.com/v1".to_string(),
            Api::Storage => "https://storage.googleapis.com/storage/v1".to_string(),
        }
    }

    fn hosts(self) -> &'static [&'static str] {
        match self {
            // Older compute self-links use the www host.
            Api::Compute => &["compute.googleapis.com", "www.googleapis.com"],
            Api::Pubsub => &["pubsub.googleapis.com"],
            Api::Storage => &["storage.googleapis.com"],
        }
    }

    fn version_paths(self) -> &'static [&'static str] {
        match self {
            Api::Compute => &["compute/v1", "compute/beta", "compute/alpha"],
            Api::Pubsub => &["v1"],
            Api::Storage => &["storage/v1"],
        }
    }

    /// Strips the scheme, host and version prefix off a self-link, accepting
    /// any published version of this service.
    fn strip_base(self, url: &str) -> Option<&str> {
        for host in self.hosts() {
            for version in self.version_paths() {
                let prefix = format!("https://{host}/{version}/");
                if let Some(rest) = url.strip_prefix(prefix.as_str()) {
                    return Some(rest);
                }
            }
        }
        None
    }
}

/// A static descriptor for one API collection.
#[derive(Debug, PartialEq, Eq)]
pub struct Collection {
    /// Dotted collection name, e.g. `compute.instances`.
    pub name: &'static str,
    pub api: Api,
    /// Path template with `{attribute}` placeholders, relative to the
    /// service base URL.
    pub template: &'static str,
}

impl Collection {
    /// Attribute names in template order.
    pub fn attributes(&self) -> impl DoubleEndedIterator<Item = &'static str> {
        self.template
            .split('/')
            .filter_map(|seg| seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
    }

    /// The attribute naming the resource itself (the last one).
    pub fn resource_attribute(&self) -> &'static str {
        self.attributes().next_back().unwrap_or(self.template)
    }
}

pub static COMPUTE_INSTANCES: Collection = Collection {
    name: "compute.instances",
    api: Api::Compute,
    template: "projects/{project}/zones/{zone}/instances/{instance}",
};

pub static COMPUTE_ZONE_OPERATIONS: Collection = Collection {
    name: "compute.zoneOperations",
    api: Api::Compute,
    template: "projects/{project}/zones/{zone}/operations/{operation}",
};

pub static COMPUTE_REGION_OPERATIONS: Collection = Collection {
    name: "compute.regionOperations",
    api: Api::Compute,
    template: "projects/{project}/regions/{region}/operations/{operation}",
};

pub static COMPUTE_GLOBAL_OPERATIONS: Collection = Collection {
    name: "compute.globalOperations",
    api: Api::Compute,
    template: "projects/{project}/global/operations/{operation}",
};

pub static PUBSUB_TOPICS: Collection = Collection {
    name: "pubsub.projects.topics",
    api: Api::Pubsub,
    template: "projects/{project}/topics/{topic}",
};

pub static PUBSUB_SUBSCRIPTIONS: Collection = Collection {
    name: "pubsub.projects.subscriptions",
    api: Api::Pubsub,
    template: "projects/{project}/subscriptions/{subscription}",
};

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error(
        "[{input}] is not a valid resource name for [{collection}] \
         (expected the form [{template}])"
    )]
    Malformed {
        input: String,
        collection: &'static str,
        template: &'static str,
    },

    #[error("[{input}] is not a self-link for [{collection}]")]
    ForeignSelfLink {
        input: String,
        collection: &'static str,
    },

    #[error("Failed to determine the value of [{attribute}].{}", hint_block(.hints))]
    MissingAttribute {
        attribute: &'static str,
        hints: Vec<String>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn hint_block(hints: &[String]) -> String {
    if hints.is_empty() {
        String::new()
    } else {
        format!("\n{}", hints.join("\n"))
    }
}

/// One source for an attribute value that was not given inline.
pub enum Fallthrough<'a> {
    /// An explicit flag value, with the flag name for error hints.
    Flag(Option<&'a str>, &'static str),
    /// A property of the active configuration, e.g. `compute/zone`.
    Property(&'a ConfigStore, &'static str),
    /// A fixed default.
    Default(&'static str),
}

impl Fallthrough<'_> {
    fn value(&self) -> Result<Option<String>, ResourceError> {
        match self {
            Fallthrough::Flag(value, _) => Ok(value.map(|v| v.to_string())),
            Fallthrough::Property(store, key) => Ok(store.get(&Property::parse(key)?)?),
            Fallthrough::Default(value) => Ok(Some(value.to_string())),
        }
    }

    fn hint(&self) -> Option<String> {
        match self {
            Fallthrough::Flag(_, flag) => {
                Some(format!("It can be provided with the [{flag}] flag."))
            }
            Fallthrough::Property(_, key) => Some(format!(
                "It can be set for all invocations by running:\n\
                 \x20 $ gcloud config set {key} VALUE"
            )),
            Fallthrough::Default(_) => None,
        }
    }
}

/// Resolves a single attribute through an ordered fallthrough list.
pub fn resolve_attribute(
    attribute: &'static str,
    fallthroughs: &[Fallthrough<'_>],
) -> Result<String, ResourceError> {
    let mut hints = Vec::new();
    for fallthrough in fallthroughs {
        if let Some(value) = fallthrough.value()? {
            return Ok(value);
        }
        if let Some(hint) = fallthrough.hint() {
            hints.push(hint);
        }
    }
    Err(ResourceError::MissingAttribute { attribute, hints })
}

/// Resolves the project from the `--project` flag or `core/project`.
pub fn resolve_project(
    store: &ConfigStore,
    flag: Option<&str>,
) -> Result<String, ResourceError> {
    resolve_attribute(
        "project",
        &[
            Fallthrough::Flag(flag, "--project"),
            Fallthrough::Property(store, "core/project"),
        ],
    )
}

/// Declarative resolver for one collection: every attribute except the
/// resource's own name gets an ordered fallthrough list consulted when the
/// input does not pin the attribute down itself.
pub struct RefResolver<'a> {
    collection: &'static Collection,
    sources: Vec<(&'static str, Vec<Fallthrough<'a>>)>,
}

impl<'a> RefResolver<'a> {
    pub fn new(collection: &'static Collection) -> Self {
        RefResolver {
            collection,
            sources: Vec::new(),
        }
    }

    pub fn attribute(
        mut self,
        name: &'static str,
        fallthroughs: Vec<Fallthrough<'a>>,
    ) -> Self {
        self.sources.push((name, fallthroughs));
        self
    }

    /// Parses `input` as a bare id, relative name, or self-link.
    pub fn parse(&self, input: &str) -> Result<ResourceRef, ResourceError> {
        if input.is_empty() {
            return Err(self.malformed(input));
        }
        if input.starts_with("https://") || input.starts_with("http://") {
            let rest = self
                .collection
                .api
                .strip_base(input)
                .ok_or_else(|| ResourceError::ForeignSelfLink {
                    input: input.to_string(),
                    collection: self.collection.name,
                })?;
            return self.parse_relative(rest, input);
        }
        if input.contains('/') {
            return self.parse_relative(input, input);
        }

        let mut values = Vec::new();
        let resource_attribute = self.collection.resource_attribute();
        for attribute in self.collection.attributes() {
            if attribute == resource_attribute {
                values.push((attribute, input.to_string()));
                continue;
            }
            let fallthroughs = self
                .sources
                .iter()
                .find(|(name, _)| *name == attribute)
                .map(|(_, f)| f.as_slice())
                .unwrap_or(&[]);
            values.push((attribute, resolve_attribute(attribute, fallthroughs)?));
        }
        Ok(ResourceRef {
            collection: self.collection,
            values,
        })
    }

    /// Matches a relative name against the path template segment by segment.
    fn parse_relative(&self, rel: &str, original: &str) -> Result<ResourceRef, ResourceError> {
        let template: Vec<&str> = self.collection.template.split('/').collect();
        let segments: Vec<&str> = rel.trim_end_matches('/').split('/').collect();
        if template.len() != segments.len() {
            return Err(self.malformed(original));
        }
        let mut values = Vec::new();
        for (pattern, segment) in template.iter().zip(&segments) {
            match pattern.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(attribute) => {
                    if segment.is_empty() {
                        return Err(self.malformed(original));
                    }
                    values.push((attribute, segment.to_string()));
                }
                None if pattern == segment => {}
                None => return Err(self.malformed(original)),
            }
        }
        Ok(ResourceRef {
            collection: self.collection,
            values,
        })
    }

    fn malformed(&self, input: &str) -> ResourceError {
        ResourceError::Malformed {
            input: input.to_string(),
            collection: self.collection.name,
            template: self.collection.template,
        }
    }
}

/// A fully-resolved reference to one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub collection: &'static Collection,
    values: Vec<(&'static str, String)>,
}

impl ResourceRef {
    /// The resource's own id (the value of the last template attribute).
    pub fn name(&self) -> &str {
        self.values
            .last()
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| *name == attribute)
            .map(|(_, v)| v.as_str())
    }

    /// The relative name, e.g. `projects/p/zones/z/instances/i`.
    pub fn relative_name(&self) -> String {
        let mut out = String::new();
        let mut values = self.values.iter();
        for segment in self.collection.template.split('/') {
            if !out.is_empty() {
                out.push('/');
            }
            if segment.starts_with('{') {
                // values are stored in template order
                if let Some((_, value)) = values.next() {
                    out.push_str(value);
                }
            } else {
                out.push_str(segment);
            }
        }
        out
    }

    /// The full URL of the resource under the given release track.
    pub fn self_link(&self, track: ReleaseTrack) -> String {
        format!(
            "{}/{}",
            self.collection.api.base_url(track),
            self.relative_name()
        )
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relative_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(props: &[(&str, &str)]) -> (tempfile::TempDir, ConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path());
        for (key, value) in props {
            store.set(&Property::parse(key).unwrap(), value).unwrap();
        }
        (dir, store)
    }

    #[test]
    fn bare_id_uses_fallthroughs() {
        let (_dir, store) = store_with(&[("core/project", "p1"), ("compute/zone", "us-central1-a")]);
        let r = RefResolver::new(&COMPUTE_INSTANCES)
            .attribute("project", vec![Fallthrough::Property(&store, "core/project")])
            .attribute(
                "zone",
                vec![
                    Fallthrough::Flag(None, "--zone"),
                    Fallthrough::Property(&store, "compute/zone"),
                ],
            )
            .parse("my-vm")
            .unwrap();
        assert_eq!(
            r.relative_name(),
            "projects/p1/zones/us-central1-a/instances/my-vm"
        );
        assert_eq!(r.name(), "my-vm");
        assert_eq!(r.get("zone"), Some("us-central1-a"));
    }

    #[test]
    fn flag_beats_property() {
        let (_dir, store) = store_with(&[("core/project", "p1"), ("compute/zone", "us-central1-a")]);
        let r = RefResolver::new(&COMPUTE_INSTANCES)
            .attribute("project", vec![Fallthrough::Property(&store, "core/project")])
            .attribute(
                "zone",
                vec![
                    Fallthrough::Flag(Some("europe-west1-b"), "--zone"),
                    Fallthrough::Property(&store, "compute/zone"),
                ],
            )
            .parse("my-vm")
            .unwrap();
        assert_eq!(r.get("zone"), Some("europe-west1-b"));
    }

    #[test]
    fn missing_attribute_lists_hints() {
        let (_dir, store) = store_with(&[("core/project", "p1")]);
        let err = RefResolver::new(&COMPUTE_INSTANCES)
            .attribute("project", vec![Fallthrough::Property(&store, "core/project")])
            .attribute(
                "zone",
                vec![
                    Fallthrough::Flag(None, "--zone"),
                    Fallthrough::Property(&store, "compute/zone"),
                ],
            )
            .parse("my-vm")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Failed to determine the value of [zone]"), "{msg}");
        assert!(msg.contains("[--zone] flag"), "{msg}");
        assert!(msg.contains("gcloud config set compute/zone VALUE"), "{msg}");
    }

    #[test]
    fn relative_name_needs_no_fallthroughs() {
        let r = RefResolver::new(&COMPUTE_INSTANCES)
            .parse("projects/p2/zones/asia-northeast1-b/instances/vm-2")
            .unwrap();
        assert_eq!(r.get("project"), Some("p2"));
        assert_eq!(r.get("zone"), Some("asia-northeast1-b"));
        assert_eq!(r.name(), "vm-2");
    }

    #[test]
    fn self_link_round_trip() {
        let r = RefResolver::new(&COMPUTE_INSTANCES)
            .parse("https://compute.googleapis.com/compute/v1/projects/p/zones/z/instances/i")
            .unwrap();
        assert_eq!(r.relative_name(), "projects/p/zones/z/instances/i");
        assert_eq!(
            r.self_link(ReleaseTrack::Ga),
            "https://compute.googleapis.com/compute/v1/projects/p/zones/z/instances/i"
        );
        assert_eq!(
            r.self_link(ReleaseTrack::Beta),
            "https://compute.googleapis.com/compute/beta/projects/p/zones/z/instances/i"
        );
    }

    #[test]
    fn accepts_legacy_www_self_links() {
        let r = RefResolver::new(&COMPUTE_ZONE_OPERATIONS)
            .parse("https://www.googleapis.com/compute/v1/projects/p/zones/z/operations/op-123")
            .unwrap();
        assert_eq!(r.name(), "op-123");
    }

    #[test]
    fn rejects_wrong_collection() {
        let err = RefResolver::new(&COMPUTE_INSTANCES)
            .parse("projects/p/topics/t")
            .unwrap_err();
        assert!(matches!(err, ResourceError::Malformed { .. }));

        let err = RefResolver::new(&PUBSUB_TOPICS)
            .parse("https://compute.googleapis.com/compute/v1/projects/p/zones/z/instances/i")
            .unwrap_err();
        assert!(matches!(err, ResourceError::ForeignSelfLink { .. }));
    }

    #[test]
    fn global_operations_have_literal_segment() {
        let r = RefResolver::new(&COMPUTE_GLOBAL_OPERATIONS)
            .parse("projects/p/global/operations/op-9")
            .unwrap();
        assert_eq!(r.name(), "op-9");
        // zone-scoped name does not parse as global
        assert!(
            RefResolver::new(&COMPUTE_GLOBAL_OPERATIONS)
                .parse("projects/p/zones/z/operations/op-9")
                .is_err()
        );
    }

    #[test]
    fn pubsub_topic_from_bare_name() {
        let (_dir, store) = store_with(&[("core/project", "p1")]);
        let r = RefResolver::new(&PUBSUB_TOPICS)
            .attribute("project", vec![Fallthrough::Property(&store, "core/project")])
            .parse("alerts")
            .unwrap();
        assert_eq!(r.relative_name(), "projects/p1/topics/alerts");
        assert_eq!(
            r.self_link(ReleaseTrack::Ga),
            "https://pubsub.googleapis.com/v1/projects/p1/topics/alerts"
        );
    }

    #[test]
    fn resolve_project_prefers_flag() {
        let (_dir, store) = store_with(&[("core/project", "from-config")]);
        assert_eq!(
            resolve_project(&store, Some("from-flag")).unwrap(),
            "from-flag"
        );
        assert_eq!(resolve_project(&store, None).unwrap(), "from-config");

        let (_dir2, empty) = store_with(&[]);
        let msg = resolve_project(&empty, None).unwrap_err().to_string();
        assert!(msg.contains("[--project] flag"), "{msg}");
    }
}
