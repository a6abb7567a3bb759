//! Post model: community help requests and resource offers.

use serde::{Deserialize, Serialize};

/// Whether a post asks for help or offers it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    Necesidad,
    Oferta,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Necesidad => "necesidad",
            PostType::Oferta => "oferta",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "necesidad" => Some(PostType::Necesidad),
            "oferta" => Some(PostType::Oferta),
            _ => None,
        }
    }
}

/// Fixed post categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Agua,
    Logistica,
    Herramientas,
    Salud,
    Hospedaje,
    Animales,
    Voluntarios,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Agua => "agua",
            Category::Logistica => "logistica",
            Category::Herramientas => "herramientas",
            Category::Salud => "salud",
            Category::Hospedaje => "hospedaje",
            Category::Animales => "animales",
            Category::Voluntarios => "voluntarios",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "agua" => Some(Category::Agua),
            "logistica" => Some(Category::Logistica),
            "herramientas" => Some(Category::Herramientas),
            "salud" => Some(Category::Salud),
            "hospedaje" => Some(Category::Hospedaje),
            "animales" => Some(Category::Animales),
            "voluntarios" => Some(Category::Voluntarios),
            _ => None,
        }
    }
}

/// Lifecycle status of a post.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Abierto,
    EnProceso,
    Resuelto,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Abierto => "abierto",
            PostStatus::EnProceso => "en_proceso",
            PostStatus::Resuelto => "resuelto",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "abierto" => Some(PostStatus::Abierto),
            "en_proceso" => Some(PostStatus::EnProceso),
            "resuelto" => Some(PostStatus::Resuelto),
            _ => None,
        }
    }

    /// Status for rows written before `status` existed, derived from the legacy flag.
    pub fn normalize(stored: Option<&str>, resolved: bool) -> Self {
        match stored.and_then(Self::from_str) {
            Some(status) => status,
            None if resolved => PostStatus::Resuelto,
            None => PostStatus::Abierto,
        }
    }
}

/// Kind of entry recorded in a post's history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Creado,
    EnCamino,
    Resuelto,
    Cancelado,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Creado => "creado",
            HistoryAction::EnCamino => "en_camino",
            HistoryAction::Resuelto => "resuelto",
            HistoryAction::Cancelado => "cancelado",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "creado" => Some(HistoryAction::Creado),
            "en_camino" => Some(HistoryAction::EnCamino),
            "resuelto" => Some(HistoryAction::Resuelto),
            "cancelado" => Some(HistoryAction::Cancelado),
            _ => None,
        }
    }
}

/// A volunteer assigned to a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignedUser {
    pub uid: String,
    pub name: String,
}

/// One immutable entry of a post's audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub action: HistoryAction,
    /// Display name of the actor
    pub user: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub timestamp: String,
}

/// A community help request or offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub category: Category,
    pub title: String,
    pub description: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    pub contact: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_photo: Option<String>,
    pub created_at: String,
    /// Legacy flag kept in step with `status`
    pub resolved: bool,
    pub status: PostStatus,
    pub assigned_to: Vec<AssignedUser>,
    pub history: Vec<HistoryItem>,
}

/// Request body for creating a new post.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub category: Category,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

/// Request body for pledging assistance.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitAssistanceRequest {
    #[serde(default)]
    pub note: String,
}

/// Request body for resolving a post.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolvePostRequest {
    #[serde(default)]
    pub note: Option<String>,
}
