use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Largest reference image accepted by the form (10 MiB).
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
/// Prompt length cap, counted in characters.
pub const MAX_PROMPT_CHARS: usize = 1000;
/// File name used when saving a generated image locally.
pub const DOWNLOAD_FILENAME: &str = "generated.png";

macro_rules! token_enum {
    ($name:ident { $($variant:ident => $token:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $token)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $token,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

token_enum!(AspectRatio {
    Square => "1:1",
    Widescreen => "16:9",
    Landscape3x2 => "3:2",
    Portrait2x3 => "2:3",
    Portrait4x5 => "4:5",
    Landscape5x4 => "5:4",
    Vertical => "9:16",
    Portrait3x4 => "3:4",
    Landscape4x3 => "4:3",
});

token_enum!(ImageMime {
    Jpeg => "image/jpeg",
    Png => "image/png",
    Gif => "image/gif",
    Webp => "image/webp",
});

impl Default for AspectRatio {
    fn default() -> Self {
        AspectRatio::Square
    }
}

impl FromStr for AspectRatio {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        AspectRatio::ALL
            .iter()
            .copied()
            .find(|ratio| ratio.as_str() == raw)
            .ok_or_else(|| DomainError::UnknownAspectRatio(raw.to_string()))
    }
}

impl FromStr for ImageMime {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        // Some platforms still report the legacy jpeg alias.
        let normalized = if normalized == "image/jpg" {
            "image/jpeg".to_string()
        } else {
            normalized
        };
        ImageMime::ALL
            .iter()
            .copied()
            .find(|mime| mime.as_str() == normalized)
            .ok_or_else(|| DomainError::UnsupportedMimeType(raw.to_string()))
    }
}
