use serde::{Deserialize, Serialize};

/// The kind of `REST` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestKind {
    /// `GET` request.
    Get,
    /// `PUT` request.
    Put,
    /// `POST` request.
    Post,
    /// `DELETE` request.
    Delete,
}

impl RestKind {
    /// Checks whether a request of this kind carries a representation.
    #[must_use]
    pub const fn has_payload(self) -> bool {
        matches!(self, Self::Put | Self::Post)
    }
}

impl core::fmt::Display for RestKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
        .fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use crate::{deserialize, serialize};

    use super::RestKind;

    #[test]
    fn rest_kinds() {
        for kind in [RestKind::Get, RestKind::Put, RestKind::Post, RestKind::Delete] {
            assert_eq!(deserialize::<RestKind>(serialize(kind)), kind);
        }

        assert!(RestKind::Put.has_payload());
        assert!(RestKind::Post.has_payload());
        assert!(!RestKind::Get.has_payload());
        assert!(!RestKind::Delete.has_payload());
    }
}
