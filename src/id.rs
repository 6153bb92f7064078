//! # IDs
//! The host names every document and layer with a process-scoped integer. This module
//! wraps those integers in `Id<T>`, namespaced by the type T, so a layer id can never
//! be passed where a document id is expected.
//!
//! Unlike a locally-allocated id, an `Id<T>` carries no liveness information of its
//! own: the host may close the referent at any time. Liveness lives in the
//! [registry](crate::registry), which pairs each id with a generation counter.

/// A host-assigned identifier, namespaced by the snapshot type it refers to.
/// IDs with different types may share a value but should not be considered equal.
///
/// The host never assigns zero; it is reserved as a niche.
pub struct Id<T: std::any::Any> {
    id: std::num::NonZeroU64,
    // Namespace marker
    _phantom: std::marker::PhantomData<T>,
}
impl<T: std::any::Any> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: std::any::Any> Copy for Id<T> {}
impl<T: std::any::Any> std::cmp::PartialEq<Id<T>> for Id<T> {
    fn eq(&self, other: &Id<T>) -> bool {
        // Namespace already checked at compile time - Self::T == Other::T of course!
        self.id == other.id
    }
}
impl<T: std::any::Any> std::cmp::Eq for Id<T> {}
impl<T: std::any::Any> std::cmp::PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T: std::any::Any> std::cmp::Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

// Safety - it's literally just a u64 lol
// We need these because if T is !Send or !Sync that is carried
// over to the ID, even though we don't actually store a T and thus
// shouldn't be bound by this.
unsafe impl<T: std::any::Any> Send for Id<T> {}
unsafe impl<T: std::any::Any> Sync for Id<T> {}

impl<T: std::any::Any> std::hash::Hash for Id<T> {
    /// A note on hashes - this relies on the internal representation of `TypeID`,
    /// which is unstable between compilations. Do NOT serialize or otherwise rely on
    /// comparisons between hashes from different executions of the program.
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::any::TypeId::of::<T>().hash(state);
        self.id.hash(state);
    }
}

impl<T: std::any::Any> Id<T> {
    /// Wrap a raw id reported by the host. `None` if the host handed us the
    /// reserved zero value, which is a protocol violation on its part.
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        Some(Self {
            id: std::num::NonZeroU64::new(raw)?,
            _phantom: std::marker::PhantomData,
        })
    }
    /// Get the raw numeric value of this ID.
    /// IDs from differing namespaces may share the same numeric ID!
    #[must_use]
    pub fn raw(&self) -> u64 {
        self.id.get()
    }
}

impl<T: std::any::Any> std::fmt::Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        //Unwrap here is safe - the rsplit will always return at least one element, even for empty strings.
        write!(
            f,
            "{}#{}",
            std::any::type_name::<T>().rsplit("::").next().unwrap(),
            self.id
        )
    }
}

impl<T: std::any::Any> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Id<T> as std::fmt::Display>::fmt(self, f)
    }
}

#[cfg(test)]
mod test {
    use super::Id;

    #[test]
    fn zero_is_reserved() {
        struct Namespace;
        type TestID = Id<Namespace>;

        assert!(TestID::from_raw(0).is_none());
        assert_eq!(TestID::from_raw(7).map(|id| id.raw()), Some(7));
    }
    #[test]
    fn equality_is_by_value() {
        struct Namespace;
        type TestID = Id<Namespace>;

        let a = TestID::from_raw(3).unwrap();
        let b = TestID::from_raw(3).unwrap();
        let c = TestID::from_raw(4).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
    #[test]
    fn display_includes_namespace() {
        struct Soup;
        let id = Id::<Soup>::from_raw(12).unwrap();
        assert_eq!(id.to_string(), "Soup#12");
    }
}
