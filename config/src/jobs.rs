//! # Replication Jobs
//!
//! `prefix` stanzas name KV subtrees to copy; `exclude` stanzas name
//! subtrees to skip. Both are collections: merging two configs replaces the
//! whole list, and repeated declarations inside one file collapse to the
//! last one.

use crate::binder::{Fields, Stanza};
use crate::error::BindError;
use crate::precedence::{Finalize, Merge, pick};
use crate::rules::{FromValue, Rule, map_to_stanza};
use crate::value::Value;
use serde::Serialize;

/// One prefix to replicate.
///
/// # M-CANONICAL-DOCS
///
/// ## Markup
/// ```text
/// prefix {
///   source      = "global/config"
///   datacenter  = "dc2"
///   destination = "local/config"
/// }
/// ```
/// The string form `prefix = "global/config@dc2:local/config"` is equivalent;
/// both `@dc` and `:destination` are optional.
///
/// ## Defaults
/// - `destination`: the prefix's own `source`
/// - `datacenter`: "" (the agent's local datacenter)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrefixConfig {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub datacenter: Option<String>,
}

impl Merge for PrefixConfig {
    fn merge(&self, other: &Self) -> Self {
        Self {
            source: pick(&self.source, &other.source),
            destination: pick(&self.destination, &other.destination),
            datacenter: pick(&self.datacenter, &other.datacenter),
        }
    }
}

impl Finalize for PrefixConfig {
    fn finalize(&mut self) {
        let source = self.source.get_or_insert_with(String::new).clone();
        self.destination.get_or_insert(source);
        self.datacenter.get_or_insert_with(String::new);
    }
}

/// `source[@dc][:destination]` → prefix job.
fn string_to_prefix(value: &Value, path: &str) -> Result<Option<PrefixConfig>, BindError> {
    let Some(s) = value.as_str() else {
        return Ok(None);
    };

    let (head, destination) = match s.split_once(':') {
        Some((head, destination)) => (head, Some(destination)),
        None => (s, None),
    };
    let (source, datacenter) = match head.split_once('@') {
        Some((source, datacenter)) => (source, Some(datacenter)),
        None => (head, None),
    };

    if source.trim().is_empty() {
        return Err(BindError::InvalidValue {
            path: path.to_string(),
            message: format!("missing source in prefix {:?}", s),
        });
    }

    let non_empty = |part: Option<&str>| part.filter(|p| !p.is_empty()).map(str::to_string);
    Ok(Some(PrefixConfig {
        source: Some(source.to_string()),
        destination: non_empty(destination),
        datacenter: non_empty(datacenter),
    }))
}

impl FromValue for PrefixConfig {
    const EXPECTED: &'static str = "prefix stanza";
    const RULES: &'static [Rule<Self>] = &[string_to_prefix, map_to_stanza::<Self>];
}

impl Stanza for PrefixConfig {
    fn bind_fields(fields: &mut Fields<'_>) -> Result<Self, BindError> {
        Ok(Self {
            source: fields.get("source")?,
            destination: fields.get("destination")?,
            datacenter: fields.get("datacenter")?,
        })
    }
}

/// One prefix to leave out of replication.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExcludeConfig {
    pub source: Option<String>,
}

impl Merge for ExcludeConfig {
    fn merge(&self, other: &Self) -> Self {
        Self {
            source: pick(&self.source, &other.source),
        }
    }
}

impl Finalize for ExcludeConfig {
    fn finalize(&mut self) {
        self.source.get_or_insert_with(String::new);
    }
}

fn string_to_exclude(value: &Value, _path: &str) -> Result<Option<ExcludeConfig>, BindError> {
    Ok(value.as_str().map(|source| ExcludeConfig {
        source: Some(source.to_string()),
    }))
}

impl FromValue for ExcludeConfig {
    const EXPECTED: &'static str = "exclude stanza";
    const RULES: &'static [Rule<Self>] = &[string_to_exclude, map_to_stanza::<Self>];
}

impl Stanza for ExcludeConfig {
    fn bind_fields(fields: &mut Fields<'_>) -> Result<Self, BindError> {
        Ok(Self {
            source: fields.get("source")?,
        })
    }
}

impl Finalize for Vec<PrefixConfig> {
    fn finalize(&mut self) {
        self.iter_mut().for_each(Finalize::finalize);
    }
}

impl Finalize for Vec<ExcludeConfig> {
    fn finalize(&mut self) {
        self.iter_mut().for_each(Finalize::finalize);
    }
}

/// Jobs that share an identity collapse to one entry.
pub(crate) trait Job {
    type Key: PartialEq;

    /// `None` for jobs that are never collapsed.
    fn identity(&self) -> Option<Self::Key>;
}

impl Job for PrefixConfig {
    type Key = (String, Option<String>);

    fn identity(&self) -> Option<Self::Key> {
        self.source
            .clone()
            .map(|source| (source, self.datacenter.clone()))
    }
}

impl Job for ExcludeConfig {
    type Key = String;

    fn identity(&self) -> Option<Self::Key> {
        self.source.clone()
    }
}

/// Collapse repeated jobs: the last declaration's values win, kept at the
/// position of the first declaration.
pub(crate) fn collapse_repeats<T: Job>(jobs: Vec<T>) -> Vec<T> {
    let mut collapsed: Vec<T> = Vec::with_capacity(jobs.len());
    for job in jobs {
        let existing = job.identity().and_then(|key| {
            collapsed
                .iter()
                .position(|kept| kept.identity().as_ref() == Some(&key))
        });
        match existing {
            Some(index) => collapsed[index] = job,
            None => collapsed.push(job),
        }
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::convert;

    fn prefix(source: &str) -> PrefixConfig {
        PrefixConfig {
            source: Some(source.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_prefix_shorthand_forms() {
        let p: PrefixConfig = convert(&Value::from("global/"), "prefix[0]").unwrap();
        assert_eq!(p, prefix("global/"));

        let p: PrefixConfig = convert(&Value::from("global/@dc2:local/"), "prefix[0]").unwrap();
        assert_eq!(p.source.as_deref(), Some("global/"));
        assert_eq!(p.datacenter.as_deref(), Some("dc2"));
        assert_eq!(p.destination.as_deref(), Some("local/"));

        let p: PrefixConfig = convert(&Value::from("global/:local/"), "prefix[0]").unwrap();
        assert_eq!(p.datacenter, None);
        assert_eq!(p.destination.as_deref(), Some("local/"));
    }

    #[test]
    fn test_prefix_shorthand_requires_source() {
        let err = convert::<PrefixConfig>(&Value::from("@dc2"), "prefix[1]").unwrap_err();
        assert_eq!(err.path(), "prefix[1]");
        assert!(matches!(err, BindError::InvalidValue { .. }));
    }

    #[test]
    fn test_prefix_finalize_replicates_in_place() {
        let mut p = prefix("global/");
        p.finalize();
        assert_eq!(p.destination.as_deref(), Some("global/"));
        assert_eq!(p.datacenter.as_deref(), Some(""));

        let mut p = PrefixConfig {
            destination: Some("elsewhere/".into()),
            ..prefix("global/")
        };
        p.finalize();
        assert_eq!(p.destination.as_deref(), Some("elsewhere/"));
    }

    #[test]
    fn test_collapse_keeps_last_values_at_first_position() {
        let jobs = vec![
            PrefixConfig {
                destination: Some("one/".into()),
                ..prefix("a/")
            },
            prefix("b/"),
            PrefixConfig {
                destination: Some("two/".into()),
                ..prefix("a/")
            },
        ];
        let collapsed = collapse_repeats(jobs);
        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0].destination.as_deref(), Some("two/"));
        assert_eq!(collapsed[1], prefix("b/"));
    }

    #[test]
    fn test_collapse_distinguishes_datacenters() {
        let jobs = vec![
            prefix("a/"),
            PrefixConfig {
                datacenter: Some("dc2".into()),
                ..prefix("a/")
            },
        ];
        assert_eq!(collapse_repeats(jobs).len(), 2);
    }

    #[test]
    fn test_collapse_never_merges_sourceless_jobs() {
        let jobs = vec![PrefixConfig::default(), PrefixConfig::default()];
        assert_eq!(collapse_repeats(jobs).len(), 2);
    }

    #[test]
    fn test_excludes_collapse_by_source() {
        let excludes: Vec<ExcludeConfig> =
            convert(&Value::from("tmp/, cache/, tmp/"), "exclude").unwrap();
        let collapsed = collapse_repeats(excludes);
        let sources: Vec<_> = collapsed.iter().filter_map(|e| e.source.as_deref()).collect();
        assert_eq!(sources, vec!["tmp/", "cache/"]);
    }
}
