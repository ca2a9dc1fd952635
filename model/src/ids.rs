use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

// Every entity uses an opaque string id rather than a raw UUID or
// database-specific key type, so storage backends can change without
// touching call sites.
opaque_id!(LibraryId, "Identifies a Library");
opaque_id!(CollectionId, "Identifies a Collection");
opaque_id!(ImageId, "Identifies an Image within a Collection");
opaque_id!(CacheRootId, "Identifies a CacheRoot");
opaque_id!(BackgroundJobId, "Identifies a BackgroundJob");
opaque_id!(ScheduledJobId, "Identifies a ScheduledJob");
opaque_id!(ScheduledJobRunId, "Identifies a ScheduledJobRun");
opaque_id!(MessageId, "Identifies a bus message envelope");
