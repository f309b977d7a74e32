//! Tag registry: find-or-create of canonical tags and post attachments.

use sqlx::{Executor, Sqlite, SqliteConnection};

use super::repository::{tag_from_row, TAG_SELECT};
use super::{now_timestamp, Repository};
use crate::errors::AppError;
use crate::models::{slugify, Tag};

impl Repository {
    /// Resolve a tag name to its canonical tag, creating it on first use.
    pub async fn resolve_tag(&self, name: &str) -> Result<Tag, AppError> {
        let mut conn = self.pool.acquire().await?;
        resolve_tag(&mut conn, name).await
    }

    /// List all tags, most used first.
    pub async fn list_tags(&self) -> Result<Vec<Tag>, AppError> {
        let rows = sqlx::query(&format!("{TAG_SELECT} ORDER BY t.usage_count DESC, t.name"))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(tag_from_row).collect())
    }
}

/// Find the tag whose slug matches `name`, inserting it if absent.
///
/// The insert ignores uniqueness conflicts and the tag is then read back by
/// slug, so two requests introducing the same new name both end up with the
/// single row that won.
pub(super) async fn resolve_tag(conn: &mut SqliteConnection, name: &str) -> Result<Tag, AppError> {
    let name = name.trim();
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(AppError::Validation("Tag name must not be blank".to_string()));
    }

    let inserted = sqlx::query(
        "INSERT INTO tags (id, name, slug, usage_count, created_at) VALUES (?, ?, ?, 0, ?) ON CONFLICT DO NOTHING",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(name)
    .bind(&slug)
    .bind(now_timestamp())
    .execute(&mut *conn)
    .await?;

    if inserted.rows_affected() > 0 {
        tracing::debug!(slug = %slug, "Tag created");
    }

    let row = sqlx::query(&format!("{TAG_SELECT} WHERE t.slug = ?"))
        .bind(&slug)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref()
        .map(tag_from_row)
        .ok_or_else(|| AppError::Internal(format!("Tag {} vanished after insert", slug)))
}

/// Attach tags to a post in the given order, skipping names that canonicalize
/// to a tag already attached. Each attachment bumps the tag's usage count.
pub(super) async fn attach_tags(
    conn: &mut SqliteConnection,
    post_id: &str,
    names: &[String],
) -> Result<Vec<Tag>, AppError> {
    let mut attached: Vec<Tag> = Vec::with_capacity(names.len());

    for name in names {
        let tag = resolve_tag(conn, name).await?;
        if attached.iter().any(|t| t.id == tag.id) {
            continue;
        }

        sqlx::query("INSERT INTO post_tags (post_id, tag_id, position) VALUES (?, ?, ?)")
            .bind(post_id)
            .bind(&tag.id)
            .bind(attached.len() as i64)
            .execute(&mut *conn)
            .await?;

        sqlx::query("UPDATE tags SET usage_count = usage_count + 1 WHERE id = ?")
            .bind(&tag.id)
            .execute(&mut *conn)
            .await?;

        attached.push(Tag {
            usage_count: tag.usage_count + 1,
            ..tag
        });
    }

    Ok(attached)
}

/// Remove every tag from a post, decrementing usage counts.
pub(super) async fn detach_all_tags(conn: &mut SqliteConnection, post_id: &str) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE tags SET usage_count = usage_count - 1 WHERE id IN (SELECT tag_id FROM post_tags WHERE post_id = ?)",
    )
    .bind(post_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Tags of one post in attachment order.
pub(super) async fn tags_for_post<'e, E>(executor: E, post_id: &str) -> Result<Vec<Tag>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!(
        "{TAG_SELECT} JOIN post_tags pt ON pt.tag_id = t.id WHERE pt.post_id = ? ORDER BY pt.position"
    ))
    .bind(post_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.iter().map(tag_from_row).collect())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::db::testing::test_repo;
    use crate::errors::AppError;

    #[tokio::test]
    async fn test_resolve_is_idempotent_and_case_insensitive() {
        let (repo, _dir) = test_repo().await;

        let first = repo.resolve_tag("Rust").await.unwrap();
        let second = repo.resolve_tag("rust").await.unwrap();
        let third = repo.resolve_tag(" RUST ").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.id, third.id);
        assert_eq!(first.name, "Rust");
        assert_eq!(first.slug, "rust");
        assert_eq!(repo.list_tags().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_rejects_blank_names() {
        let (repo, _dir) = test_repo().await;
        let err = repo.resolve_tag("  ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_punctuation_keeps_tags_apart() {
        let (repo, _dir) = test_repo().await;

        let cpp = repo.resolve_tag("C++").await.unwrap();
        let csharp = repo.resolve_tag("C#").await.unwrap();
        let c = repo.resolve_tag("C").await.unwrap();

        assert_ne!(cpp.id, csharp.id);
        assert_ne!(cpp.id, c.id);
        assert_ne!(csharp.id, c.id);
        assert_eq!(csharp.name, "C#");
        assert_eq!(repo.resolve_tag("c#").await.unwrap().id, csharp.id);
        assert_eq!(repo.list_tags().await.unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_creates_one_row() {
        let (repo, _dir) = test_repo().await;

        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = repo.clone();
            let name = if i % 2 == 0 { "Tokio" } else { "tokio" };
            handles.push(tokio::spawn(async move { repo.resolve_tag(name).await }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap().unwrap().id);
        }

        assert_eq!(ids.len(), 1);
        assert_eq!(repo.list_tags().await.unwrap().len(), 1);
    }
}
