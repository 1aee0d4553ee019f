use chrono::{DateTime, NaiveDateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Платформы, которые поддерживает бэкенд публикаций
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[value(name = "facebook")]
    Facebook,
    #[value(name = "instagram")]
    Instagram,
    #[value(name = "linkedin")]
    Linkedin,
    #[value(name = "twitter")]
    Twitter,
    #[value(name = "tiktok")]
    Tiktok,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::Linkedin,
        Platform::Twitter,
        Platform::Tiktok,
    ];

    /// Идентификатор в путях API (`/social/connect/{id}`)
    pub fn id(self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Linkedin => "linkedin",
            Platform::Twitter => "twitter",
            Platform::Tiktok => "tiktok",
        }
    }

    pub fn descriptor(self) -> &'static PlatformDescriptor {
        // Порядок в PLATFORMS совпадает с порядком вариантов
        &PLATFORMS[self as usize]
    }

    pub fn max_length(self) -> usize {
        self.descriptor().max_length
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Статическое описание платформы. Не сохраняется, не меняется.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDescriptor {
    pub platform: Platform,
    pub name: &'static str,
    pub icon: &'static str,
    pub max_length: usize,
    pub description: &'static str,
}

pub static PLATFORMS: [PlatformDescriptor; 5] = [
    PlatformDescriptor {
        platform: Platform::Facebook,
        name: "Facebook",
        icon: "[f]",
        max_length: 63206,
        description: "Publish on Facebook pages",
    },
    PlatformDescriptor {
        platform: Platform::Instagram,
        name: "Instagram",
        icon: "[ig]",
        max_length: 2200,
        description: "Share photos and videos on Instagram",
    },
    PlatformDescriptor {
        platform: Platform::Linkedin,
        name: "LinkedIn",
        icon: "[in]",
        max_length: 3000,
        description: "Share professional content",
    },
    PlatformDescriptor {
        platform: Platform::Twitter,
        name: "Twitter/X",
        icon: "[x]",
        max_length: 280,
        description: "Publish tweets and threads",
    },
    PlatformDescriptor {
        platform: Platform::Tiktok,
        name: "TikTok",
        icon: "[tt]",
        max_length: 2200,
        description: "Upload videos to TikTok",
    },
];

/// Связь аккаунта пользователя с внешней платформой
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub platform: Platform,
    pub is_active: bool,
    #[serde(default)]
    pub platform_username: Option<String>,
    #[serde(default)]
    pub platform_user_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Разбирает время из ответа бэкенда. Сначала RFC3339 со смещением,
/// затем время без зоны (так его отдаёт бэкенд на SQLite), оно считается UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    for format in &formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
        }
    }

    None
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(value) => parse_timestamp(&value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", value))),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectResponse {
    pub auth_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePostRequest {
    pub content: String,
    pub platforms: Vec<Platform>,
    pub media_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Итог публикации на одной платформе
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResult {
    pub platform: String,
    pub status: String,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PublishResult {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PostResponse {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub results: Vec<PublishResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}
