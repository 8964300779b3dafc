//! `media://<kind>/<asset id>` virtual paths.

use crate::error::RenditionError;
use std::fmt;

const SCHEME: &str = "media://";

/// What a virtual path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UriTarget {
    Thumbnail,
    Preview,
    Original,
}

impl UriTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            UriTarget::Thumbnail => "thumbnail",
            UriTarget::Preview => "preview",
            UriTarget::Original => "original",
        }
    }
}

/// A parsed virtual path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUri {
    pub target: UriTarget,
    pub asset_id: String,
}

impl MediaUri {
    pub fn new(target: UriTarget, asset_id: impl Into<String>) -> Self {
        Self {
            target,
            asset_id: asset_id.into(),
        }
    }

    pub fn parse(uri: &str) -> Result<Self, RenditionError> {
        let invalid = || RenditionError::InvalidUri {
            uri: uri.to_string(),
        };

        let rest = uri.strip_prefix(SCHEME).ok_or_else(invalid)?;
        let (target, asset_id) = rest.split_once('/').ok_or_else(invalid)?;

        let target = match target {
            "thumbnail" => UriTarget::Thumbnail,
            "preview" => UriTarget::Preview,
            "original" => UriTarget::Original,
            _ => return Err(invalid()),
        };

        // Asset ids are uuids; anything path-like is refused outright.
        let asset_id = asset_id.trim_end_matches('/');
        if asset_id.is_empty()
            || !asset_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(invalid());
        }

        Ok(Self::new(target, asset_id))
    }
}

impl fmt::Display for MediaUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", SCHEME, self.target.as_str(), self.asset_id)
    }
}
