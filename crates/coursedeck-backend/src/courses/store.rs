use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use coursedeck_shared::api::{
    AddContentRequest, CourseResponse, CourseStats, CreateCourseRequest, ReorderContentsRequest,
    UpdateContentRequest, UpdateCourseRequest,
};
use coursedeck_shared::{ContentData, ContentItem, Course, DEFAULT_THUMBNAIL};
use sqlx::types::Json;
use uuid::Uuid;

use crate::access::Actor;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::uploads::cleanup::{delete_content_files, delete_contents_files, delete_course_files};
use crate::uploads::UploadStorage;

const SELECT_COURSE: &str = r#"
    SELECT id, title, description, thumbnail, category, author_id, author_name,
           is_public, contents, created_at, updated_at
    FROM courses
"#;

type CourseRow = (
    Uuid,
    String,
    String,
    String,
    String,
    Uuid,
    String,
    bool,
    Json<Vec<ContentItem>>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn course_from_row(row: CourseRow) -> Course {
    let (
        id,
        title,
        description,
        thumbnail,
        category,
        author,
        author_name,
        is_public,
        Json(contents),
        created_at,
        updated_at,
    ) = row;

    Course {
        id,
        title,
        description,
        thumbnail,
        category,
        author,
        author_name,
        is_public,
        contents,
        created_at,
        updated_at,
    }
}

fn required(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Replace `target` with `value` unless it is missing or blank.
fn set_if_present(target: &mut String, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        *target = value.to_string();
    }
}

/// Aggregate counts over every course for the admin dashboard.
pub fn course_stats(total_users: i64, courses: &[Course]) -> CourseStats {
    let mut contents_by_type = BTreeMap::new();
    for item in courses.iter().flat_map(|c| &c.contents) {
        *contents_by_type
            .entry(item.kind().as_str().to_string())
            .or_insert(0) += 1;
    }

    let public_courses = courses.iter().filter(|c| c.is_public).count();

    CourseStats {
        total_users,
        total_courses: courses.len(),
        total_contents: courses.iter().map(|c| c.contents.len()).sum(),
        contents_by_type,
        public_courses,
        private_courses: courses.len() - public_courses,
    }
}

/// Delete every course `author` owns as part of the caller's transaction.
/// The deleted courses are returned so their files can be cleaned up once
/// the transaction commits.
pub(crate) async fn delete_courses_by_author(
    conn: &mut sqlx::PgConnection,
    author: Uuid,
) -> AppResult<Vec<Course>> {
    let rows: Vec<CourseRow> = sqlx::query_as(
        r#"
        DELETE FROM courses
        WHERE author_id = $1
        RETURNING id, title, description, thumbnail, category, author_id, author_name,
                  is_public, contents, created_at, updated_at
        "#,
    )
    .bind(author)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(course_from_row).collect())
}

/// Courses and their embedded content collections.
///
/// Every mutation reads the whole course, changes it in memory and writes
/// it back. Two concurrent edits of the same course are last-writer-wins.
#[derive(Debug, Clone)]
pub struct CourseStore {
    db: DbPool,
    storage: UploadStorage,
}

impl CourseStore {
    pub fn new(db: DbPool, storage: UploadStorage) -> Self {
        Self { db, storage }
    }

    async fn fetch(&self, id: Uuid) -> AppResult<Course> {
        let row: Option<CourseRow> = sqlx::query_as(&format!("{SELECT_COURSE} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.map(course_from_row).ok_or(AppError::NotFound)
    }

    async fn fetch_many(&self, filter: &str, bind: Option<Uuid>) -> AppResult<Vec<Course>> {
        let sql = format!("{SELECT_COURSE} {filter} ORDER BY created_at DESC");
        let mut query = sqlx::query_as::<_, CourseRow>(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.db).await?;

        Ok(rows.into_iter().map(course_from_row).collect())
    }

    /// Write back everything but the owner and creation time.
    async fn save(&self, course: &Course) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE courses
            SET title = $2, description = $3, thumbnail = $4, category = $5,
                is_public = $6, contents = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(course.id)
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.thumbnail)
        .bind(&course.category)
        .bind(course.is_public)
        .bind(Json(&course.contents))
        .bind(course.updated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn fetch_editable(&self, actor: &Actor, id: Uuid) -> AppResult<Course> {
        let course = self.fetch(id).await?;
        actor.require_edit(&course)?;
        Ok(course)
    }

    pub async fn create(&self, actor: &Actor, req: CreateCourseRequest) -> AppResult<Course> {
        actor.require_course_creation()?;

        let now = Utc::now();
        let course = Course {
            id: Uuid::new_v4(),
            title: required(&req.title, "Title")?,
            description: required(&req.description, "Description")?,
            thumbnail: req
                .thumbnail
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_THUMBNAIL.to_string()),
            category: required(&req.category, "Category")?,
            author: actor.id,
            author_name: actor.name.clone(),
            is_public: req.is_public.unwrap_or(true),
            contents: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO courses (id, title, description, thumbnail, category, author_id,
                                 author_name, is_public, contents, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(course.id)
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.thumbnail)
        .bind(&course.category)
        .bind(course.author)
        .bind(&course.author_name)
        .bind(course.is_public)
        .bind(Json(&course.contents))
        .bind(course.created_at)
        .bind(course.updated_at)
        .execute(&self.db)
        .await?;

        tracing::info!(course_id = %course.id, author = %actor.id, "Course created");
        Ok(course)
    }

    /// Private courses are only visible to their author and admins.
    pub async fn get(&self, viewer: Option<&Actor>, id: Uuid) -> AppResult<CourseResponse> {
        let course = self.fetch(id).await?;
        if !course.is_public && !viewer.is_some_and(|actor| actor.can_edit(&course)) {
            return Err(AppError::NotFound);
        }
        Ok(course.into())
    }

    pub async fn list_public(&self) -> AppResult<Vec<CourseResponse>> {
        let courses = self.fetch_many("WHERE is_public = TRUE", None).await?;
        Ok(courses.into_iter().map(CourseResponse::from).collect())
    }

    pub async fn list_mine(&self, actor: &Actor) -> AppResult<Vec<CourseResponse>> {
        let courses = self.fetch_many("WHERE author_id = $1", Some(actor.id)).await?;
        Ok(courses.into_iter().map(CourseResponse::from).collect())
    }

    pub async fn list_all(&self, actor: &Actor) -> AppResult<Vec<CourseResponse>> {
        actor.require_admin()?;
        let courses = self.fetch_many("", None).await?;
        Ok(courses.into_iter().map(CourseResponse::from).collect())
    }

    /// Update course metadata. Blank strings leave a field unchanged; a
    /// replaced uploaded thumbnail is deleted.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        req: UpdateCourseRequest,
    ) -> AppResult<Course> {
        let mut course = self.fetch_editable(actor, id).await?;
        let old_thumbnail = course.thumbnail.clone();

        set_if_present(&mut course.title, req.title.as_deref());
        set_if_present(&mut course.description, req.description.as_deref());
        set_if_present(&mut course.thumbnail, req.thumbnail.as_deref());
        set_if_present(&mut course.category, req.category.as_deref());
        if let Some(is_public) = req.is_public {
            course.is_public = is_public;
        }
        course.updated_at = Utc::now();

        self.save(&course).await?;

        if course.thumbnail != old_thumbnail {
            self.storage.delete_url(&old_thumbnail);
        }
        Ok(course)
    }

    /// Delete a course and every uploaded file it references.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        let course = self.fetch_editable(actor, id).await?;

        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        delete_course_files(&self.storage, &course);
        tracing::info!(course_id = %id, by = %actor.id, "Course deleted");
        Ok(())
    }

    pub async fn add_content(
        &self,
        actor: &Actor,
        course_id: Uuid,
        req: AddContentRequest,
    ) -> AppResult<ContentItem> {
        let mut course = self.fetch_editable(actor, course_id).await?;
        let item = course.add_content(&req.title, req.body)?.clone();
        self.save(&course).await?;

        tracing::debug!(course_id = %course_id, content_id = %item.id, kind = %item.kind(), "Content added");
        Ok(item)
    }

    /// Update a content item's title and/or payload. The payload is decoded
    /// as the item's existing kind. Files the old payload owned and the new
    /// one no longer references are deleted.
    pub async fn update_content(
        &self,
        actor: &Actor,
        course_id: Uuid,
        content_id: Uuid,
        req: UpdateContentRequest,
    ) -> AppResult<ContentItem> {
        let mut course = self.fetch_editable(actor, course_id).await?;
        let item = course.content_mut(content_id).ok_or(AppError::NotFound)?;

        let body = req
            .data
            .map(|data| ContentData::from_parts(item.kind(), data))
            .transpose()?;

        let old_files: Vec<String> = item.body.file_urls().into_iter().map(String::from).collect();
        item.apply_update(req.title.as_deref(), body)?;
        let item = item.clone();
        course.updated_at = item.updated_at;

        self.save(&course).await?;

        let new_files = item.body.file_urls();
        for url in old_files.iter().filter(|url| !new_files.contains(&url.as_str())) {
            self.storage.delete_url(url);
        }
        Ok(item)
    }

    /// Remove one content item and its files. Remaining items keep their
    /// order values.
    pub async fn delete_content(
        &self,
        actor: &Actor,
        course_id: Uuid,
        content_id: Uuid,
    ) -> AppResult<()> {
        let mut course = self.fetch_editable(actor, course_id).await?;
        let removed = course.remove_content(content_id).ok_or(AppError::NotFound)?;

        self.save(&course).await?;

        delete_content_files(&self.storage, &removed);
        Ok(())
    }

    /// Put the course's contents in the order of `req.content_ids`.
    ///
    /// Items missing from the list are removed from the course together
    /// with their files.
    pub async fn reorder_contents(
        &self,
        actor: &Actor,
        course_id: Uuid,
        req: ReorderContentsRequest,
    ) -> AppResult<CourseResponse> {
        let mut course = self.fetch_editable(actor, course_id).await?;

        let dropped = course.reorder_contents(&req.content_ids);
        self.save(&course).await?;

        if !dropped.is_empty() {
            let removed = delete_contents_files(&self.storage, &dropped);
            tracing::warn!(
                course_id = %course_id,
                dropped = dropped.len(),
                removed,
                "Reorder left out existing contents, they were removed"
            );
        }
        Ok(course.into())
    }

    pub async fn stats(&self, actor: &Actor) -> AppResult<CourseStats> {
        actor.require_admin()?;
        self.stats_unchecked().await
    }

    /// Statistics without an access check, for operator tooling.
    pub async fn stats_unchecked(&self) -> AppResult<CourseStats> {
        let (total_users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        let courses = self.fetch_many("", None).await?;

        Ok(course_stats(total_users, &courses))
    }
}
