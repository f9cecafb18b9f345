//! Permissions a certificate can grant to a delegated signing key.
//!
//! These are open-ended: the well-known ones have constants, but any string
//! is a valid permission and they compare case-sensitively.

use serde_derive::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    /// Post to the profile's feed
    pub const POST: Permission = Permission(Cow::Borrowed("post"));
    /// Comment on posts
    pub const COMMENT: Permission = Permission(Cow::Borrowed("comment"));
    /// Publish the friends list
    pub const FRIENDS: Permission = Permission(Cow::Borrowed("friends"));
    /// Issue certificates to other keys. Required (on top of whatever is
    /// being delegated) by any key that signs a certificate.
    pub const GRANT: Permission = Permission(Cow::Borrowed("grant"));
    /// Issue certificates that themselves carry `grant`.
    pub const CA: Permission = Permission(Cow::Borrowed("ca"));
    /// Act as the profile in every other respect
    pub const IMPERSONATE: Permission = Permission(Cow::Borrowed("impersonate"));

    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Permission {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}
