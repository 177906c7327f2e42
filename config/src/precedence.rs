//! # Configuration Precedence
//!
//! Merge and finalize operations shared by every configuration entity.
//!
//! Every leaf field is an `Option`: `None` means "not specified here,
//! inherit from a merge partner or the default", `Some` means present.
//!
//! # Precedence Order
//! 1. Later sources (right-hand side of `merge`)
//! 2. Earlier sources
//! 3. Defaults applied by `finalize`

/// Right-biased, field-granular deep merge.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Combines two partially specified entities. For every field present in
/// `other` the result takes `other`'s value; for every absent field it keeps
/// `self`'s. Nested entities merge recursively, collections are replaced
/// wholesale.
///
/// ## Usage
/// ```rust
/// use replicate_config::{Config, Merge};
///
/// let base = Config { log_level: Some("INFO".into()), ..Default::default() };
/// let overlay = Config { pid_file: Some("/run/cr.pid".into()), ..Default::default() };
/// let merged = base.merge(&overlay);
/// assert_eq!(merged.log_level.as_deref(), Some("INFO"));
/// assert_eq!(merged.pid_file.as_deref(), Some("/run/cr.pid"));
/// ```
///
/// ## Ownership
/// The result never shares data with either input.
pub trait Merge {
    fn merge(&self, other: &Self) -> Self;
}

/// Fill every absent field with its default, recursively.
///
/// Implementations must be idempotent.
pub trait Finalize {
    fn finalize(&mut self);
}

impl<T: Merge + Clone> Merge for Option<T> {
    /// Absent receivers adopt a copy of `other`; absent `other` yields a copy
    /// of the receiver.
    fn merge(&self, other: &Self) -> Self {
        match (self, other) {
            (None, None) => None,
            (None, Some(o)) => Some(o.clone()),
            (Some(s), None) => Some(s.clone()),
            (Some(s), Some(o)) => Some(s.merge(o)),
        }
    }
}

impl<T: Finalize + Default> Finalize for Option<T> {
    /// An absent entity is created empty and then finalized.
    fn finalize(&mut self) {
        self.get_or_insert_with(T::default).finalize();
    }
}

/// Merge rule for leaf fields and collections: `overlay` wins when present.
pub(crate) fn pick<T: Clone>(base: &Option<T>, overlay: &Option<T>) -> Option<T> {
    overlay.clone().or_else(|| base.clone())
}
