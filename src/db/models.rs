use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub created_at: String,
}

/// A profile row joined with the owning user's name and avatar,
/// matching the populated documents the original API returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user: ProfileUser,
    pub status: String,
    pub skills: Vec<String>,
    pub company: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub githubusername: Option<String>,
    pub social: Social,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUser {
    pub id: String,
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Social {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub from: String,
    pub to: Option<String>,
    pub current: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Education {
    pub id: String,
    pub school: String,
    pub degree: String,
    pub fieldofstudy: String,
    pub from: String,
    pub to: Option<String>,
    pub current: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user: String,
    pub text: String,
    pub name: String,
    pub avatar: String,
    pub likes: Vec<Like>,
    pub comments: Vec<Comment>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub user: String,
    pub text: String,
    pub name: String,
    pub avatar: String,
    pub created_at: String,
}
