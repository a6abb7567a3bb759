//! Database repository for posts, squads, users and the shared config.
//!
//! Every write runs in one transaction together with its revision bump, so a
//! failure leaves the store exactly as it was.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};

use crate::auth::Actor;
use crate::errors::AppError;
use crate::lifecycle;
use crate::models::{
    AssignedUser, Category, CreatePostRequest, HistoryAction, HistoryItem, Post, PostStatus,
    PostType, SheetConfig, Squad, SquadEquipment, SquadMission, SquadSkills, UserProfile,
    UserRole,
};

const POST_COLUMNS: &str = "id, post_type, category, title, description, location, lat, lng, \
     contact, user_id, user_name, user_photo, created_at, resolved, status";

const SQUAD_COLUMNS: &str = "id, leader_name, leader_dni, leader_phone, lodging_location, name, \
     members_count, intervention_zone, location_link, lat, lng, \
     equipment_has_ppe, equipment_ppe_description, equipment_has_tools, equipment_tools_description, \
     equipment_has_machinery, equipment_machinery_description, equipment_has_water, \
     skills_operational, skills_health_safety, skills_logistics, skills_communications, skills_management, \
     mission_departure_day, mission_departure_time, mission_return_time, mission_has_returned, \
     mission_coordination_notes, mission_last_update";

/// Status of a post row, including rows written before `status` existed.
const EFFECTIVE_STATUS: &str =
    "COALESCE(status, CASE WHEN resolved != 0 THEN 'resuelto' ELSE 'abierto' END)";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    // ==================== POST OPERATIONS ====================

    /// List all posts, newest first.
    pub async fn list_posts(&self) -> Result<Vec<Post>, AppError> {
        let sql = format!(
            "SELECT {} FROM posts ORDER BY created_at DESC, rowid DESC",
            POST_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let history_rows = sqlx::query(
            "SELECT post_id, action, user_name, user_id, note, timestamp FROM post_history ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await?;
        let assignment_rows =
            sqlx::query("SELECT post_id, uid, name FROM post_assignments ORDER BY seq")
                .fetch_all(&self.pool)
                .await?;

        let mut history = group_by_post(&history_rows, history_from_row);
        let mut assigned = group_by_post(&assignment_rows, assignment_from_row);

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                post_from_row(
                    row,
                    assigned.remove(&id).unwrap_or_default(),
                    history.remove(&id).unwrap_or_default(),
                )
            })
            .collect()
    }

    /// Get a post by ID, with its assignments and history.
    pub async fn get_post(&self, id: &str) -> Result<Option<Post>, AppError> {
        let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
        let Some(row) = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let history_rows = sqlx::query(
            "SELECT post_id, action, user_name, user_id, note, timestamp FROM post_history WHERE post_id = ? ORDER BY seq",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        let assignment_rows =
            sqlx::query("SELECT post_id, uid, name FROM post_assignments WHERE post_id = ? ORDER BY seq")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;

        let history = history_rows.iter().filter_map(history_from_row).collect();
        let assigned = assignment_rows
            .iter()
            .filter_map(assignment_from_row)
            .collect();

        post_from_row(&row, assigned, history).map(Some)
    }

    /// Create a new post in the `abierto` state.
    pub async fn create_post(
        &self,
        request: &CreatePostRequest,
        owner: &Actor,
    ) -> Result<Post, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let status = PostStatus::Abierto;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO posts (
                id, post_type, category, title, description, location, lat, lng,
                contact, user_id, user_name, user_photo, created_at, resolved, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)"#,
        )
        .bind(&id)
        .bind(request.post_type.as_str())
        .bind(request.category.as_str())
        .bind(request.title.trim())
        .bind(&request.description)
        .bind(&request.location)
        .bind(request.lat)
        .bind(request.lng)
        .bind(&request.contact)
        .bind(&owner.uid)
        .bind(&owner.name)
        .bind(&owner.photo)
        .bind(&now)
        .bind(status.as_str())
        .execute(&mut *tx)
        .await?;

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(Post {
            id,
            post_type: request.post_type,
            category: request.category,
            title: request.title.trim().to_string(),
            description: request.description.clone(),
            location: request.location.clone(),
            lat: request.lat,
            lng: request.lng,
            contact: request.contact.clone(),
            user_id: owner.uid.clone(),
            user_name: Some(owner.name.clone()),
            user_photo: owner.photo.clone(),
            created_at: now,
            resolved: false,
            status,
            assigned_to: Vec::new(),
            history: Vec::new(),
        })
    }

    /// Hard-delete a post. Only its creator may do so.
    pub async fn delete_post(&self, id: &str, actor: &Actor) -> Result<(), AppError> {
        let post = self
            .get_post(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))?;
        lifecycle::ensure_can_delete(&post, actor)?;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM posts WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(&actor.uid)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Post {} not found", id)));
        }

        sqlx::query("DELETE FROM post_history WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM post_assignments WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        bump_revision(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Record a volunteer's commitment to help.
    ///
    /// Appends an `en_camino` history entry, adds the actor to the assignment
    /// set if not already there and moves the post to `en_proceso`.
    pub async fn commit_assistance(
        &self,
        id: &str,
        actor: &Actor,
        note: &str,
    ) -> Result<Post, AppError> {
        let note = lifecycle::validate_commitment_note(note)?;
        let current = self
            .get_post(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))?;
        let next = lifecycle::status_after_commitment(current.status)?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        // First statement takes the write lock; the guard re-checks the state under it.
        let sql = format!(
            "UPDATE posts SET status = ?, resolved = 0 WHERE id = ? AND {} != 'resuelto'",
            EFFECTIVE_STATUS
        );
        let result = sqlx::query(&sql)
            .bind(next.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            drop(tx);
            return Err(self.changed_post_error(id).await);
        }

        append_history(&mut tx, id, HistoryAction::EnCamino, actor, Some(note), &now).await?;

        sqlx::query("INSERT OR IGNORE INTO post_assignments (post_id, uid, name) VALUES (?, ?, ?)")
            .bind(id)
            .bind(&actor.uid)
            .bind(&actor.name)
            .execute(&mut *tx)
            .await?;

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!("{} committed to post {}", actor.uid, id);
        self.get_post(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))
    }

    /// Mark a post as resolved. Allowed for its creator or an admin.
    pub async fn resolve_post(
        &self,
        id: &str,
        actor: &Actor,
        is_admin: bool,
        note: Option<&str>,
    ) -> Result<Post, AppError> {
        let current = self
            .get_post(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))?;
        lifecycle::ensure_can_resolve(&current, actor, is_admin)?;
        let next = lifecycle::status_after_resolution(current.status)?;
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE posts SET status = ?, resolved = 1 WHERE id = ? AND {} != 'resuelto'",
            EFFECTIVE_STATUS
        );
        let result = sqlx::query(&sql)
            .bind(next.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            drop(tx);
            return Err(self.changed_post_error(id).await);
        }

        append_history(&mut tx, id, HistoryAction::Resuelto, actor, note, &now).await?;

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!("{} resolved post {}", actor.uid, id);
        self.get_post(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))
    }

    /// Error for a guarded update that matched nothing: the post was deleted
    /// or resolved between the read and the write.
    async fn changed_post_error(&self, id: &str) -> AppError {
        match self.get_post(id).await {
            Ok(Some(_)) => AppError::Validation("Post is already resolved".to_string()),
            Ok(None) => AppError::NotFound(format!("Post {} not found", id)),
            Err(e) => e,
        }
    }

    // ==================== SQUAD OPERATIONS ====================

    /// List all squads.
    pub async fn list_squads(&self) -> Result<Vec<Squad>, AppError> {
        let sql = format!("SELECT {} FROM squads ORDER BY name, id", SQUAD_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(squad_from_row).collect())
    }

    /// Get a squad by ID.
    pub async fn get_squad(&self, id: &str) -> Result<Option<Squad>, AppError> {
        let sql = format!("SELECT {} FROM squads WHERE id = ?", SQUAD_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(squad_from_row))
    }

    /// Replace each squad's stored record with the given one, all or nothing.
    ///
    /// `INSERT OR REPLACE` drops the previous row, so no column of an older
    /// version survives.
    pub async fn replace_squads(&self, squads: &[Squad]) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT OR REPLACE INTO squads ({}) VALUES ({})",
            SQUAD_COLUMNS,
            vec!["?"; 29].join(", ")
        );

        for squad in squads {
            sqlx::query(&sql)
                .bind(&squad.id)
                .bind(&squad.leader_name)
                .bind(&squad.leader_dni)
                .bind(&squad.leader_phone)
                .bind(&squad.lodging_location)
                .bind(&squad.name)
                .bind(i64::from(squad.members_count))
                .bind(&squad.intervention_zone)
                .bind(&squad.location_link)
                .bind(squad.lat)
                .bind(squad.lng)
                .bind(squad.equipment.has_ppe as i32)
                .bind(&squad.equipment.ppe_description)
                .bind(squad.equipment.has_tools as i32)
                .bind(&squad.equipment.tools_description)
                .bind(squad.equipment.has_machinery as i32)
                .bind(&squad.equipment.machinery_description)
                .bind(squad.equipment.has_water as i32)
                .bind(&squad.skills.operational)
                .bind(&squad.skills.health_safety)
                .bind(&squad.skills.logistics)
                .bind(&squad.skills.communications)
                .bind(&squad.skills.management)
                .bind(&squad.mission.departure_day)
                .bind(&squad.mission.departure_time)
                .bind(&squad.mission.return_time)
                .bind(squad.mission.has_returned as i32)
                .bind(&squad.mission.coordination_notes)
                .bind(&squad.mission.last_update)
                .execute(&mut *tx)
                .await?;
        }

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(squads.len())
    }

    // ==================== CONFIG OPERATIONS ====================

    /// Get the shared sheet configuration (empty if never set).
    pub async fn get_sheet_config(&self) -> Result<SheetConfig, AppError> {
        let row = sqlx::query(
            "SELECT sheets_csv_url, updated_by, last_config_update FROM app_config WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|row| SheetConfig {
                sheets_csv_url: row.get("sheets_csv_url"),
                updated_by: row.get("updated_by"),
                last_config_update: row.get("last_config_update"),
            })
            .unwrap_or_default())
    }

    /// Store the trusted sheet URL along with who set it.
    pub async fn set_sheet_config(
        &self,
        url: &str,
        updated_by: &str,
    ) -> Result<SheetConfig, AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO app_config (id, sheets_csv_url, updated_by, last_config_update)
               VALUES (1, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   sheets_csv_url = excluded.sheets_csv_url,
                   updated_by = excluded.updated_by,
                   last_config_update = excluded.last_config_update"#,
        )
        .bind(url)
        .bind(updated_by)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(SheetConfig {
            sheets_csv_url: Some(url.to_string()),
            updated_by: Some(updated_by.to_string()),
            last_config_update: Some(now),
        })
    }

    // ==================== USER OPERATIONS ====================

    /// Get a user profile by uid.
    pub async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        let row = sqlx::query("SELECT uid, email, display_name, role FROM users WHERE uid = ?")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    /// Return the actor's profile, creating it with `initial_role` on first sight.
    pub async fn ensure_user(
        &self,
        actor: &Actor,
        initial_role: UserRole,
    ) -> Result<UserProfile, AppError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT OR IGNORE INTO users (uid, email, display_name, role, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&actor.uid)
        .bind(actor.email.as_deref().unwrap_or_default())
        .bind(&actor.name)
        .bind(initial_role.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(
                "Created profile for {} with role {}",
                actor.uid,
                initial_role.as_str()
            );
        }

        self.get_user(&actor.uid)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Profile {} vanished", actor.uid)))
    }

    /// Whether the uid has an admin profile.
    pub async fn is_admin(&self, uid: &str) -> Result<bool, AppError> {
        Ok(self
            .get_user(uid)
            .await?
            .is_some_and(|u| u.role == UserRole::Admin))
    }

    /// Change a user's role.
    pub async fn set_user_role(&self, uid: &str, role: UserRole) -> Result<UserProfile, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE users SET role = ? WHERE uid = ?")
            .bind(role.as_str())
            .bind(uid)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", uid)));
        }

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        self.get_user(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))
    }
}

async fn bump_revision(conn: &mut SqliteConnection) -> Result<(), AppError> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
        .bind(&now)
        .execute(conn)
        .await?;
    Ok(())
}

async fn append_history(
    conn: &mut SqliteConnection,
    post_id: &str,
    action: HistoryAction,
    actor: &Actor,
    note: Option<&str>,
    timestamp: &str,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO post_history (post_id, action, user_name, user_id, note, timestamp) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(post_id)
    .bind(action.as_str())
    .bind(&actor.name)
    .bind(&actor.uid)
    .bind(note)
    .bind(timestamp)
    .execute(conn)
    .await?;
    Ok(())
}

// Helper functions for row conversion

fn group_by_post<T>(
    rows: &[SqliteRow],
    convert: fn(&SqliteRow) -> Option<T>,
) -> HashMap<String, Vec<T>> {
    let mut grouped: HashMap<String, Vec<T>> = HashMap::new();
    for row in rows {
        if let Some(item) = convert(row) {
            grouped.entry(row.get("post_id")).or_default().push(item);
        }
    }
    grouped
}

fn post_from_row(
    row: &SqliteRow,
    assigned_to: Vec<AssignedUser>,
    history: Vec<HistoryItem>,
) -> Result<Post, AppError> {
    let id: String = row.get("id");
    let post_type: String = row.get("post_type");
    let category: String = row.get("category");
    let resolved: i32 = row.get("resolved");
    let status: Option<String> = row.get("status");
    let status = PostStatus::normalize(status.as_deref(), resolved != 0);

    Ok(Post {
        post_type: PostType::from_str(&post_type)
            .ok_or_else(|| AppError::Internal(format!("Post {} has unknown type", id)))?,
        category: Category::from_str(&category)
            .ok_or_else(|| AppError::Internal(format!("Post {} has unknown category", id)))?,
        title: row.get("title"),
        description: row.get("description"),
        location: row.get("location"),
        lat: row.get("lat"),
        lng: row.get("lng"),
        contact: row.get("contact"),
        user_id: row.get("user_id"),
        user_name: row.get("user_name"),
        user_photo: row.get("user_photo"),
        created_at: row.get("created_at"),
        resolved: status == PostStatus::Resuelto,
        status,
        assigned_to,
        history,
        id,
    })
}

fn history_from_row(row: &SqliteRow) -> Option<HistoryItem> {
    let action: String = row.get("action");
    let Some(action) = HistoryAction::from_str(&action) else {
        tracing::warn!("Skipping history entry with unknown action '{}'", action);
        return None;
    };
    Some(HistoryItem {
        action,
        user: row.get("user_name"),
        user_id: row.get("user_id"),
        note: row.get("note"),
        timestamp: row.get("timestamp"),
    })
}

fn assignment_from_row(row: &SqliteRow) -> Option<AssignedUser> {
    Some(AssignedUser {
        uid: row.get("uid"),
        name: row.get("name"),
    })
}

fn squad_from_row(row: &SqliteRow) -> Squad {
    let flag = |column: &str| row.get::<i32, _>(column) != 0;
    let members_count: i64 = row.get("members_count");

    Squad {
        id: row.get("id"),
        leader_name: row.get("leader_name"),
        leader_dni: row.get("leader_dni"),
        leader_phone: row.get("leader_phone"),
        lodging_location: row.get("lodging_location"),
        name: row.get("name"),
        members_count: u32::try_from(members_count).unwrap_or(0),
        intervention_zone: row.get("intervention_zone"),
        location_link: row.get("location_link"),
        lat: row.get("lat"),
        lng: row.get("lng"),
        equipment: SquadEquipment {
            has_ppe: flag("equipment_has_ppe"),
            ppe_description: row.get("equipment_ppe_description"),
            has_tools: flag("equipment_has_tools"),
            tools_description: row.get("equipment_tools_description"),
            has_machinery: flag("equipment_has_machinery"),
            machinery_description: row.get("equipment_machinery_description"),
            has_water: flag("equipment_has_water"),
        },
        skills: SquadSkills {
            operational: row.get("skills_operational"),
            health_safety: row.get("skills_health_safety"),
            logistics: row.get("skills_logistics"),
            communications: row.get("skills_communications"),
            management: row.get("skills_management"),
        },
        mission: SquadMission {
            departure_day: row.get("mission_departure_day"),
            departure_time: row.get("mission_departure_time"),
            return_time: row.get("mission_return_time"),
            has_returned: flag("mission_has_returned"),
            coordination_notes: row.get("mission_coordination_notes"),
            last_update: row.get("mission_last_update"),
        },
    }
}

fn user_from_row(row: &SqliteRow) -> UserProfile {
    let role: String = row.get("role");
    UserProfile {
        uid: row.get("uid"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        role: UserRole::from_str(&role).unwrap_or(UserRole::User),
    }
}
