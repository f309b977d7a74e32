//! Post store: posts, their counters and their tag sets.

use std::collections::HashMap;

use sqlx::{QueryBuilder, Row, Sqlite};

use super::repository::{post_from_row, tag_from_row, POST_SELECT};
use super::tags::{attach_tags, detach_all_tags, tags_for_post};
use super::users::touch_last_seen;
use super::{now_timestamp, Repository};
use crate::errors::AppError;
use crate::models::{
    slugify, CategoryCount, CreatePostRequest, ListPostsQuery, Post, PostDetail, PostPage, Tag,
    UpdatePostRequest,
};

impl Repository {
    /// Create a published post and attach its tags in one transaction.
    pub async fn create_post(
        &self,
        author_id: &str,
        request: &CreatePostRequest,
    ) -> Result<Post, AppError> {
        let title = request.title.trim();
        let body = request.body.trim();
        let category = request.category.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        if body.is_empty() {
            return Err(AppError::Validation("Body is required".to_string()));
        }
        if category.is_empty() {
            return Err(AppError::Validation("Category is required".to_string()));
        }
        self.get_user(author_id).await?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO posts (
                id, title, body, author_id, category, published, view_count, like_count,
                is_pinned, is_locked, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, 1, 0, 0, 0, 0, ?, ?)"#,
        )
        .bind(&id)
        .bind(title)
        .bind(body)
        .bind(author_id)
        .bind(category)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        attach_tags(&mut tx, &id, &request.tags).await?;
        touch_last_seen(&mut tx, author_id, &now).await?;

        tx.commit().await?;

        tracing::info!(post_id = %id, author_id, "Post created");

        self.find_post(&id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Post {} missing after create", id)))
    }

    /// Read a post with its author, tags and comment threads.
    ///
    /// Every call counts as a view: the view counter is bumped before the read,
    /// so the returned count includes this request.
    pub async fn get_post(&self, id: &str) -> Result<PostDetail, AppError> {
        let result = sqlx::query(
            "UPDATE posts SET view_count = view_count + 1 WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Post {} not found", id)));
        }

        let post = self.require_post(id).await?;
        let comments = self.list_comments(id).await?;

        Ok(PostDetail { post, comments })
    }

    /// Load a live post without counting a view.
    pub async fn find_post(&self, id: &str) -> Result<Option<Post>, AppError> {
        let row = sqlx::query(&format!("{POST_SELECT} WHERE p.id = ? AND p.deleted_at IS NULL"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut post = post_from_row(&row);
        post.tags = tags_for_post(&self.pool, id).await?;
        Ok(Some(post))
    }

    pub(super) async fn require_post(&self, id: &str) -> Result<Post, AppError> {
        self.find_post(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))
    }

    /// One page of live posts, filtered and sorted.
    pub async fn list_posts(&self, query: &ListPostsQuery) -> Result<PostPage, AppError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts p");
        push_post_filters(&mut count, query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(POST_SELECT);
        push_post_filters(&mut select, query);
        select.push(" ORDER BY ");
        select.push(query.sort.order_by());
        select.push(" LIMIT ");
        select.push_bind(query.limit());
        select.push(" OFFSET ");
        select.push_bind(query.offset());

        let rows = select.build().fetch_all(&self.pool).await?;
        let mut posts: Vec<Post> = rows.iter().map(post_from_row).collect();
        self.hydrate_tags(&mut posts).await?;

        Ok(PostPage {
            posts,
            total,
            page: query.page(),
            limit: query.limit(),
        })
    }

    /// Load tags for a batch of posts with one query.
    async fn hydrate_tags(&self, posts: &mut [Post]) -> Result<(), AppError> {
        if posts.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT pt.post_id, t.id, t.name, t.slug, t.usage_count FROM tags t \
             JOIN post_tags pt ON pt.tag_id = t.id WHERE pt.post_id IN (",
        );
        let mut ids = builder.separated(", ");
        for post in posts.iter() {
            ids.push_bind(post.id.clone());
        }
        builder.push(") ORDER BY pt.post_id, pt.position");

        let rows = builder.build().fetch_all(&self.pool).await?;
        let mut by_post: HashMap<String, Vec<Tag>> = HashMap::new();
        for row in &rows {
            by_post
                .entry(row.get("post_id"))
                .or_default()
                .push(tag_from_row(row));
        }

        for post in posts.iter_mut() {
            post.tags = by_post.remove(&post.id).unwrap_or_default();
        }
        Ok(())
    }

    /// Partially update a post. Only its author may do so.
    ///
    /// Blank fields keep their current value. A non-empty tag list replaces
    /// the whole tag set; an empty one leaves it untouched.
    pub async fn update_post(
        &self,
        id: &str,
        actor_id: &str,
        request: &UpdatePostRequest,
    ) -> Result<Post, AppError> {
        let existing = self.require_post(id).await?;
        if existing.author.id != actor_id {
            return Err(AppError::Forbidden(
                "Only the author may edit this post".to_string(),
            ));
        }

        let title = non_blank(request.title.as_deref());
        let body = non_blank(request.body.as_deref());
        let category = non_blank(request.category.as_deref());
        let new_tags = request.tags.as_deref().filter(|tags| !tags.is_empty());

        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"UPDATE posts SET
                title = COALESCE(?, title),
                body = COALESCE(?, body),
                category = COALESCE(?, category),
                updated_at = ?
            WHERE id = ? AND deleted_at IS NULL"#,
        )
        .bind(title)
        .bind(body)
        .bind(category)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Post {} not found", id)));
        }

        if let Some(tags) = new_tags {
            detach_all_tags(&mut tx, id).await?;
            attach_tags(&mut tx, id, tags).await?;
        }
        touch_last_seen(&mut tx, actor_id, &now).await?;

        tx.commit().await?;

        tracing::debug!(post_id = %id, tags_replaced = new_tags.is_some(), "Post updated");

        self.require_post(id).await
    }

    /// Soft-delete a post. Its author or an admin may do so.
    ///
    /// In the same transaction the post's likes are removed (and the counter
    /// reduced by as many), its comments are soft-deleted and its tags are
    /// detached. Reputation earned on those comments is kept.
    pub async fn delete_post(&self, id: &str, actor_id: &str) -> Result<(), AppError> {
        let existing = self.require_post(id).await?;
        if existing.author.id != actor_id && !self.get_user(actor_id).await?.role.is_admin() {
            return Err(AppError::Forbidden(
                "Only the author may delete this post".to_string(),
            ));
        }

        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("UPDATE posts SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
                .bind(&now)
                .bind(id)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Post {} not found", id)));
        }

        let likes = sqlx::query("DELETE FROM likes WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("UPDATE posts SET like_count = like_count - ? WHERE id = ?")
            .bind(likes as i64)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let comments = sqlx::query(
            "UPDATE comments SET deleted_at = ? WHERE post_id = ? AND deleted_at IS NULL",
        )
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        detach_all_tags(&mut tx, id).await?;

        tx.commit().await?;

        tracing::info!(post_id = %id, likes, comments, "Post deleted");
        Ok(())
    }

    /// Categories of live posts with their post counts, most used first.
    pub async fn list_categories(&self) -> Result<Vec<CategoryCount>, AppError> {
        let rows = sqlx::query(
            r#"SELECT category, COUNT(*) AS post_count FROM posts
               WHERE deleted_at IS NULL
               GROUP BY category
               ORDER BY post_count DESC, category"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| CategoryCount {
                category: row.get("category"),
                post_count: row.get("post_count"),
            })
            .collect())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Append the WHERE clause shared by the listing and its count.
fn push_post_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &ListPostsQuery) {
    builder.push(" WHERE p.deleted_at IS NULL");

    if let Some(category) = non_blank(query.category.as_deref()) {
        builder.push(" AND p.category = ");
        builder.push_bind(category.to_string());
    }

    if let Some(tag) = non_blank(query.tag.as_deref()) {
        builder.push(
            " AND EXISTS (SELECT 1 FROM post_tags pt JOIN tags t ON t.id = pt.tag_id \
             WHERE pt.post_id = p.id AND t.slug = ",
        );
        builder.push_bind(slugify(tag));
        builder.push(")");
    }
}

#[cfg(test)]
mod tests {
    use crate::db::testing::{test_repo, user, user_with_role};
    use crate::errors::AppError;
    use crate::models::{CreatePostRequest, ListPostsQuery, PostSort, Role, UpdatePostRequest};

    fn post_request(title: &str, category: &str, tags: &[&str]) -> CreatePostRequest {
        CreatePostRequest {
            title: title.to_string(),
            body: format!("Body of {title}"),
            category: category.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_post_starts_published_with_zero_counters() {
        let (repo, _dir) = test_repo().await;
        let alice = user(&repo, "alice").await;

        let post = repo
            .create_post(&alice.id, &post_request("Hello", "General", &["rust", "sqlx"]))
            .await
            .unwrap();

        assert!(post.published);
        assert_eq!(post.view_count, 0);
        assert_eq!(post.like_count, 0);
        assert_eq!(post.author.id, alice.id);
        let slugs: Vec<_> = post.tags.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, vec!["rust", "sqlx"]);
    }

    #[tokio::test]
    async fn test_case_variants_share_one_canonical_tag() {
        let (repo, _dir) = test_repo().await;
        let alice = user(&repo, "alice").await;

        let post = repo
            .create_post(&alice.id, &post_request("Go", "Programming", &["Go", "go", "GO"]))
            .await
            .unwrap();

        assert_eq!(post.tags.len(), 1);
        assert_eq!(post.tags[0].name, "Go");
        assert_eq!(post.tags[0].usage_count, 1);

        let tags = repo.list_tags().await.unwrap();
        assert_eq!(tags.len(), 1);
    }

    #[tokio::test]
    async fn test_create_post_reuses_existing_tag() {
        let (repo, _dir) = test_repo().await;
        let alice = user(&repo, "alice").await;

        let first = repo
            .create_post(&alice.id, &post_request("One", "General", &["Rust"]))
            .await
            .unwrap();
        let second = repo
            .create_post(&alice.id, &post_request("Two", "General", &["rust"]))
            .await
            .unwrap();

        assert_eq!(first.tags[0].id, second.tags[0].id);
        let tags = repo.list_tags().await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].usage_count, 2);
    }

    #[tokio::test]
    async fn test_create_post_requires_fields() {
        let (repo, _dir) = test_repo().await;
        let alice = user(&repo, "alice").await;

        for request in [
            post_request("", "General", &[]),
            post_request("Title", "", &[]),
            CreatePostRequest {
                body: "  ".to_string(),
                ..post_request("Title", "General", &[])
            },
        ] {
            let err = repo.create_post(&alice.id, &request).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }

        let page = repo.list_posts(&ListPostsQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_bad_tag_rolls_back_whole_post() {
        let (repo, _dir) = test_repo().await;
        let alice = user(&repo, "alice").await;

        let err = repo
            .create_post(&alice.id, &post_request("Hi", "General", &["fine", "   "]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let page = repo.list_posts(&ListPostsQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);
        assert!(repo.list_tags().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_every_read_counts_a_view() {
        let (repo, _dir) = test_repo().await;
        let alice = user(&repo, "alice").await;
        let post = repo
            .create_post(&alice.id, &post_request("Viewed", "General", &[]))
            .await
            .unwrap();

        assert_eq!(repo.get_post(&post.id).await.unwrap().post.view_count, 1);
        assert_eq!(repo.get_post(&post.id).await.unwrap().post.view_count, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reads_lose_no_views() {
        let (repo, _dir) = test_repo().await;
        let alice = user(&repo, "alice").await;
        let post = repo
            .create_post(&alice.id, &post_request("Hot", "General", &[]))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let repo = repo.clone();
            let id = post.id.clone();
            handles.push(tokio::spawn(async move { repo.get_post(&id).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let post = repo.find_post(&post.id).await.unwrap().unwrap();
        assert_eq!(post.view_count, 20);
    }

    #[tokio::test]
    async fn test_get_missing_post_is_not_found() {
        let (repo, _dir) = test_repo().await;
        let err = repo.get_post("nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters_sorts_and_counts_before_paging() {
        let (repo, _dir) = test_repo().await;
        let alice = user(&repo, "alice").await;

        let a = repo
            .create_post(&alice.id, &post_request("A", "Web", &["Rust"]))
            .await
            .unwrap();
        let b = repo
            .create_post(&alice.id, &post_request("B", "Web", &["Go"]))
            .await
            .unwrap();
        let c = repo
            .create_post(&alice.id, &post_request("C", "DevOps", &["rust"]))
            .await
            .unwrap();

        repo.get_post(&b.id).await.unwrap();
        repo.get_post(&b.id).await.unwrap();
        repo.get_post(&a.id).await.unwrap();

        let newest = repo.list_posts(&ListPostsQuery::default()).await.unwrap();
        let titles: Vec<_> = newest.posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "B", "A"]);
        assert_eq!(newest.total, 3);

        let popular = repo
            .list_posts(&ListPostsQuery {
                sort: PostSort::Popular,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(popular.posts[0].id, b.id);

        let web = repo
            .list_posts(&ListPostsQuery {
                category: Some("Web".to_string()),
                sort: PostSort::Oldest,
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(web.total, 2);
        assert_eq!(web.posts.len(), 1);
        assert_eq!(web.posts[0].id, a.id);

        let rust = repo
            .list_posts(&ListPostsQuery {
                tag: Some("RUST".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rust.total, 2);
        let ids: Vec<_> = rust.posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![c.id.as_str(), a.id.as_str()]);
        assert_eq!(rust.posts[0].tags[0].slug, "rust");
    }

    #[tokio::test]
    async fn test_trending_orders_by_likes() {
        let (repo, _dir) = test_repo().await;
        let alice = user(&repo, "alice").await;
        let bob = user(&repo, "bob").await;
        let carol = user(&repo, "carol").await;

        let old = repo
            .create_post(&alice.id, &post_request("Old", "General", &[]))
            .await
            .unwrap();
        let middle = repo
            .create_post(&alice.id, &post_request("Middle", "General", &[]))
            .await
            .unwrap();
        let new = repo
            .create_post(&alice.id, &post_request("New", "General", &[]))
            .await
            .unwrap();

        repo.toggle_like(&bob.id, &old.id).await.unwrap();
        repo.toggle_like(&carol.id, &old.id).await.unwrap();
        repo.toggle_like(&bob.id, &middle.id).await.unwrap();
        // Views do not count towards trending.
        repo.get_post(&new.id).await.unwrap();

        let trending = repo
            .list_posts(&ListPostsQuery {
                sort: PostSort::Trending,
                ..Default::default()
            })
            .await
            .unwrap();

        let ids: Vec<_> = trending.posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![old.id.as_str(), middle.id.as_str(), new.id.as_str()]);
        let likes: Vec<_> = trending.posts.iter().map(|p| p.like_count).collect();
        assert_eq!(likes, vec![2, 1, 0]);

        // Taking a like back reorders the listing.
        repo.toggle_like(&bob.id, &old.id).await.unwrap();
        repo.toggle_like(&carol.id, &old.id).await.unwrap();
        let trending = repo
            .list_posts(&ListPostsQuery {
                sort: PostSort::Trending,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(trending.posts[0].id, middle.id);
    }

    #[tokio::test]
    async fn test_update_is_partial_and_author_only() {
        let (repo, _dir) = test_repo().await;
        let alice = user(&repo, "alice").await;
        let bob = user(&repo, "bob").await;
        let post = repo
            .create_post(&alice.id, &post_request("Original", "General", &["keep"]))
            .await
            .unwrap();

        let err = repo
            .update_post(
                &post.id,
                &bob.id,
                &UpdatePostRequest {
                    title: Some("Hijacked".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let updated = repo
            .update_post(
                &post.id,
                &alice.id,
                &UpdatePostRequest {
                    title: Some("Renamed".to_string()),
                    body: Some(String::new()),
                    category: None,
                    tags: Some(Vec::new()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.body, post.body);
        assert_eq!(updated.category, "General");
        assert_eq!(updated.tags.len(), 1);
        assert_eq!(updated.tags[0].slug, "keep");
    }

    #[tokio::test]
    async fn test_update_with_tags_replaces_whole_set() {
        let (repo, _dir) = test_repo().await;
        let alice = user(&repo, "alice").await;
        let post = repo
            .create_post(&alice.id, &post_request("Tagged", "General", &["old", "shared"]))
            .await
            .unwrap();

        let updated = repo
            .update_post(
                &post.id,
                &alice.id,
                &UpdatePostRequest {
                    tags: Some(vec!["Shared".to_string(), "new".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let slugs: Vec<_> = updated.tags.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, vec!["shared", "new"]);

        let counts: Vec<_> = repo
            .list_tags()
            .await
            .unwrap()
            .into_iter()
            .map(|t| (t.slug, t.usage_count))
            .collect();
        assert!(counts.contains(&("old".to_string(), 0)));
        assert!(counts.contains(&("shared".to_string(), 1)));
        assert!(counts.contains(&("new".to_string(), 1)));
    }

    #[tokio::test]
    async fn test_delete_is_author_or_admin_and_cascades() {
        let (repo, _dir) = test_repo().await;
        let alice = user(&repo, "alice").await;
        let bob = user(&repo, "bob").await;
        let admin = user_with_role(&repo, "root", Role::Admin).await;
        let post = repo
            .create_post(&alice.id, &post_request("Doomed", "General", &["gone"]))
            .await
            .unwrap();
        repo.toggle_like(&bob.id, &post.id).await.unwrap();

        let err = repo.delete_post(&post.id, &bob.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        repo.delete_post(&post.id, &admin.id).await.unwrap();

        let err = repo.get_post(&post.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = repo.toggle_like(&bob.id, &post.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(repo.list_tags().await.unwrap()[0].usage_count, 0);
        assert_eq!(repo.count_likes(&post.id).await.unwrap(), 0);

        let err = repo.delete_post(&post.id, &alice.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_categories_count_live_posts() {
        let (repo, _dir) = test_repo().await;
        let alice = user(&repo, "alice").await;
        repo.create_post(&alice.id, &post_request("1", "Web", &[]))
            .await
            .unwrap();
        repo.create_post(&alice.id, &post_request("2", "Web", &[]))
            .await
            .unwrap();
        let gone = repo
            .create_post(&alice.id, &post_request("3", "AI", &[]))
            .await
            .unwrap();
        repo.delete_post(&gone.id, &alice.id).await.unwrap();

        let categories = repo.list_categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].category, "Web");
        assert_eq!(categories[0].post_count, 2);
    }
}
