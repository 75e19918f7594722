//! Request and response bodies of the account endpoints

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ApiError, Result};

/// Preference tags offered at signup and on the my-page screen
pub const AVAILABLE_TAGS: &[&str] = &[
    "공원",
    "관광명소",
    "베이커리",
    "베트남 음식",
    "브런치",
    "비건",
    "서점",
    "양식",
    "일식",
    "전시",
    "주점",
    "중식",
    "카페",
    "태국 음식",
    "피자",
    "한식",
    "햄버거",
];

/// JWT pair returned by the login endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct LogoutRequest<'a> {
    pub refresh_token: &'a str,
}

/// Signup form; tags travel comma-joined
#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub password2: String,
    #[serde(serialize_with = "serialize_tags")]
    pub tags: Vec<String>,
}

impl SignupRequest {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        password2: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            password2: password2.into(),
            tags,
        }
    }

    /// Checks the backend would otherwise reject with a less helpful message
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() || self.password.is_empty() || self.password2.is_empty() {
            return Err(ApiError::Validation("username and both passwords are required".to_string()));
        }
        if self.password != self.password2 {
            return Err(ApiError::Validation("passwords do not match".to_string()));
        }
        validate_tags(&self.tags)
    }
}

/// Password change form
#[derive(Debug, Clone, Serialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

impl PasswordChange {
    pub fn new(current_password: impl Into<String>, new_password: impl Into<String>) -> Self {
        Self {
            current_password: current_password.into(),
            new_password: new_password.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.new_password.is_empty() {
            return Err(ApiError::Validation("new password is required".to_string()));
        }
        if self.new_password == self.current_password {
            return Err(ApiError::Validation(
                "new password must differ from the current one".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TagsBody {
    #[serde(serialize_with = "serialize_tags")]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
}

/// Signed-in user as shown on the my-page screen
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    pub username: String,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
}

/// At least one tag, each from the known catalogue
pub fn validate_tags(tags: &[String]) -> Result<()> {
    if tags.is_empty() {
        return Err(ApiError::Validation("select at least one tag".to_string()));
    }
    if let Some(unknown) = tags.iter().find(|t| !AVAILABLE_TAGS.contains(&t.as_str())) {
        return Err(ApiError::Validation(format!("unknown tag: {}", unknown)));
    }
    Ok(())
}

fn serialize_tags<S>(tags: &[String], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&tags.join(","))
}

/// The backend answers with either `"a,b"` or `["a","b"]` depending on the view
fn deserialize_tags<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TagsRepr {
        Joined(String),
        List(Vec<String>),
        Missing(Option<()>),
    }

    let tags = match TagsRepr::deserialize(deserializer)? {
        TagsRepr::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect(),
        TagsRepr::List(list) => list
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        TagsRepr::Missing(_) => Vec::new(),
    };
    Ok(tags)
}
