// An insertion-ordered map wrapper with a builder-style API.
macro_rules! map {
    (
        $(#[$attr:meta])*
        pub struct $name:ident(IndexMap<$key:ty, $value:ty, DefaultHashBuilder>);
    ) => {
        $(#[$attr])*
        pub struct $name(::indexmap::IndexMap<$key, $value, ::hashbrown::DefaultHashBuilder>);

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl IntoIterator for $name {
            type Item = ($key, $value);
            type IntoIter = ::indexmap::map::IntoIter<$key, $value>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.into_iter()
            }
        }

        impl<'a> IntoIterator for &'a $name {
            type Item = (&'a $key, &'a $value);
            type IntoIter = ::indexmap::map::Iter<'a, $key, $value>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.iter()
            }
        }

        impl $name {
            #[doc = concat!("Creates an empty [`", stringify!($name), "`].")]
            #[must_use]
            #[inline]
            pub fn new() -> Self {
                Self(::indexmap::IndexMap::with_hasher(
                    ::hashbrown::DefaultHashBuilder::default(),
                ))
            }

            #[doc = concat!("Inserts an entry into [`", stringify!($name), "`].")]
            ///
            /// An existing key keeps its position and takes the new value.
            #[must_use]
            #[inline]
            pub fn insert(mut self, key: $key, value: $value) -> Self {
                self.0.insert(key, value);
                self
            }

            #[doc = concat!("Adds an entry to [`", stringify!($name), "`].")]
            ///
            /// An existing key keeps its position and takes the new value.
            #[inline]
            pub fn add(&mut self, key: $key, value: $value) {
                self.0.insert(key, value);
            }

            /// Checks whether the collection is empty.
            #[must_use]
            #[inline]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Returns the number of entries.
            #[must_use]
            #[inline]
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// Returns an iterator over the entries in insertion order.
            #[inline]
            pub fn iter(&self) -> ::indexmap::map::Iter<'_, $key, $value> {
                self.0.iter()
            }
        }
    };
}

// An insertion-ordered set wrapper with a builder-style API.
//
// Equality ignores the insertion order.
macro_rules! set {
    (
        $(#[$attr:meta])*
        pub struct $name:ident(IndexSet<$ty:ty, DefaultHashBuilder>);
    ) => {
        $(#[$attr])*
        pub struct $name(::indexmap::IndexSet<$ty, ::hashbrown::DefaultHashBuilder>);

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl IntoIterator for $name {
            type Item = $ty;
            type IntoIter = ::indexmap::set::IntoIter<$ty>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.into_iter()
            }
        }

        impl<'a> IntoIterator for &'a $name {
            type Item = &'a $ty;
            type IntoIter = ::indexmap::set::Iter<'a, $ty>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.iter()
            }
        }

        impl FromIterator<$ty> for $name {
            fn from_iter<I: IntoIterator<Item = $ty>>(iter: I) -> Self {
                let mut set = Self::new();
                for element in iter {
                    set.add(element);
                }
                set
            }
        }

        impl $name {
            #[doc = concat!("Creates an empty [`", stringify!($name), "`].")]
            #[must_use]
            #[inline]
            pub fn new() -> Self {
                Self(::indexmap::IndexSet::with_hasher(
                    ::hashbrown::DefaultHashBuilder::default(),
                ))
            }

            #[doc = concat!("Initializes [`", stringify!($name), "`] with an element.")]
            #[must_use]
            #[inline]
            pub fn init(element: $ty) -> Self {
                Self::new().insert(element)
            }

            #[doc = concat!("Inserts an element into [`", stringify!($name), "`].")]
            #[must_use]
            #[inline]
            pub fn insert(mut self, element: $ty) -> Self {
                self.0.insert(element);
                self
            }

            #[doc = concat!("Adds an element to [`", stringify!($name), "`].")]
            ///
            /// Returns `false` when the element was already present.
            #[inline]
            pub fn add(&mut self, element: $ty) -> bool {
                self.0.insert(element)
            }

            /// Checks whether the given element is present.
            #[must_use]
            #[inline]
            pub fn contains<Q>(&self, element: &Q) -> bool
            where
                Q: ?Sized + core::hash::Hash + ::indexmap::Equivalent<$ty>,
            {
                self.0.contains(element)
            }

            /// Checks whether the collection is empty.
            #[must_use]
            #[inline]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Returns the number of elements.
            #[must_use]
            #[inline]
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// Returns an iterator over the elements in insertion order.
            #[inline]
            pub fn iter(&self) -> ::indexmap::set::Iter<'_, $ty> {
                self.0.iter()
            }
        }
    };
}

pub(crate) use map;
pub(crate) use set;
