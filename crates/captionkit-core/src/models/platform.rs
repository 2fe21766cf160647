use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target social network for a caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    #[serde(alias = "twitter")]
    X,
    Reddit,
    Tiktok,
    Facebook,
    Onlyfans,
    Fansly,
}

impl Platform {
    /// Maximum caption length the network accepts, in characters.
    pub fn caption_limit(&self) -> usize {
        match self {
            Platform::X => 280,
            Platform::Reddit => 300,
            Platform::Instagram | Platform::Tiktok => 2200,
            Platform::Facebook => 2000,
            Platform::Onlyfans | Platform::Fansly => 1000,
        }
    }

    /// Maximum hashtags attached to one caption.
    pub fn hashtag_limit(&self) -> usize {
        match self {
            Platform::Instagram => 30,
            Platform::Tiktok => 8,
            Platform::X | Platform::Reddit => 3,
            Platform::Facebook | Platform::Onlyfans | Platform::Fansly => 5,
        }
    }

    /// Name used inside provider instructions.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Instagram => "Instagram",
            Platform::X => "X (Twitter)",
            Platform::Reddit => "Reddit",
            Platform::Tiktok => "TikTok",
            Platform::Facebook => "Facebook",
            Platform::Onlyfans => "OnlyFans",
            Platform::Fansly => "Fansly",
        }
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "instagram" => Ok(Platform::Instagram),
            "x" | "twitter" => Ok(Platform::X),
            "reddit" => Ok(Platform::Reddit),
            "tiktok" => Ok(Platform::Tiktok),
            "facebook" => Ok(Platform::Facebook),
            "onlyfans" => Ok(Platform::Onlyfans),
            "fansly" => Ok(Platform::Fansly),
            _ => Err(anyhow::anyhow!("Invalid platform: {}", s)),
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Platform::Instagram => write!(f, "instagram"),
            Platform::X => write!(f, "x"),
            Platform::Reddit => write!(f, "reddit"),
            Platform::Tiktok => write!(f, "tiktok"),
            Platform::Facebook => write!(f, "facebook"),
            Platform::Onlyfans => write!(f, "onlyfans"),
            Platform::Fansly => write!(f, "fansly"),
        }
    }
}
