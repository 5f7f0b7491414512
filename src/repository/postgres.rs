use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{RepoResult, Repository};
use crate::models::{
    AdminStats, Category, Comment, CommentView, Label, Like, NewComment, NewPost, NewUser, Post,
    PostChanges, PostSummary, RecentComment, Tag, User, UserSummary,
};

const POST_COLUMNS: &str = r#"
    id, title, slug, content, excerpt, cover_image, published, published_at,
    author_id, view_count, created_at, updated_at
"#;

// Listing rows with author name and like/comment counts. Callers append WHERE/ORDER.
const POST_SUMMARY_SELECT: &str = r#"
    SELECT
        p.id, p.title, p.slug, p.excerpt, p.cover_image, p.published, p.published_at,
        p.author_id, u.name AS author_name, p.view_count,
        (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count,
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count,
        p.created_at
    FROM posts p
    JOIN users u ON u.id = p.author_id
"#;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL through a `PgPool`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects categories to a post, creating missing categories by slug.
    async fn link_categories(
        tx: &mut Transaction<'_, Postgres>,
        post_id: Uuid,
        labels: &[Label],
    ) -> RepoResult<()> {
        for label in labels {
            let category_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO categories (id, name, slug) VALUES ($1, $2, $3)
                ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&label.name)
            .bind(&label.slug)
            .fetch_one(&mut **tx)
            .await?;

            sqlx::query(
                "INSERT INTO post_categories (post_id, category_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(post_id)
            .bind(category_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Connects tags to a post, creating missing tags by slug.
    async fn link_tags(
        tx: &mut Transaction<'_, Postgres>,
        post_id: Uuid,
        labels: &[Label],
    ) -> RepoResult<()> {
        for label in labels {
            let tag_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO tags (id, name, slug) VALUES ($1, $2, $3)
                ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&label.name)
            .bind(&label.slug)
            .fetch_one(&mut **tx)
            .await?;

            sqlx::query(
                "INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn count(&self, sql: &str) -> RepoResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>(sql).fetch_one(&self.pool).await?)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id, name, email, password_hash, role, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn list_recent_users(&self, limit: i64) -> RepoResult<Vec<UserSummary>> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT
                u.id, u.name, u.email, u.role,
                (SELECT COUNT(*) FROM posts p WHERE p.author_id = u.id) AS post_count,
                (SELECT COUNT(*) FROM comments c WHERE c.user_id = u.id) AS comment_count,
                u.created_at
            FROM users u
            ORDER BY u.created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    // --- POSTS ---

    async fn list_published_posts(&self, limit: i64) -> RepoResult<Vec<PostSummary>> {
        let sql = format!(
            "{POST_SUMMARY_SELECT} WHERE p.published = true ORDER BY p.published_at DESC NULLS LAST LIMIT $1"
        );
        let posts = sqlx::query_as::<_, PostSummary>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    async fn list_posts_by_author(&self, author_id: Uuid) -> RepoResult<Vec<PostSummary>> {
        let sql = format!("{POST_SUMMARY_SELECT} WHERE p.author_id = $1 ORDER BY p.created_at DESC");
        let posts = sqlx::query_as::<_, PostSummary>(&sql)
            .bind(author_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    async fn list_recent_posts(&self, limit: i64) -> RepoResult<Vec<PostSummary>> {
        let sql = format!("{POST_SUMMARY_SELECT} ORDER BY p.created_at DESC LIMIT $1");
        let posts = sqlx::query_as::<_, PostSummary>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    async fn get_post(&self, id: Uuid) -> RepoResult<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn find_post_by_slug(&self, slug: &str) -> RepoResult<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE slug = $1");
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    /// create_post
    ///
    /// Inserts the post and its taxonomy links in one transaction. A concurrent
    /// insert of the same slug surfaces as `UniqueViolation("posts_slug_key")`.
    async fn create_post(&self, post: NewPost) -> RepoResult<Post> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO posts (id, title, slug, content, excerpt, cover_image, published,
                               published_at, author_id, view_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, NOW(), NOW())
            RETURNING {POST_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, Post>(&sql)
            .bind(Uuid::new_v4())
            .bind(&post.title)
            .bind(&post.slug)
            .bind(&post.content)
            .bind(&post.excerpt)
            .bind(&post.cover_image)
            .bind(post.published)
            .bind(post.published_at)
            .bind(post.author_id)
            .fetch_one(&mut *tx)
            .await?;

        Self::link_categories(&mut tx, created.id, &post.categories).await?;
        Self::link_tags(&mut tx, created.id, &post.tags).await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> RepoResult<Option<Post>> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE posts
            SET title = $2, slug = $3, content = $4, excerpt = $5, cover_image = $6,
                published = $7, published_at = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .bind(&changes.title)
            .bind(&changes.slug)
            .bind(&changes.content)
            .bind(&changes.excerpt)
            .bind(&changes.cover_image)
            .bind(changes.published)
            .bind(changes.published_at)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(updated) = updated else {
            return Ok(None);
        };

        if let Some(categories) = &changes.categories {
            sqlx::query("DELETE FROM post_categories WHERE post_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            Self::link_categories(&mut tx, id, categories).await?;
        }
        if let Some(tags) = &changes.tags {
            sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            Self::link_tags(&mut tx, id, tags).await?;
        }

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn delete_post(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_view_count(&self, id: Uuid) -> RepoResult<()> {
        sqlx::query("UPDATE posts SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn post_categories(&self, post_id: Uuid) -> RepoResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT c.id, c.name, c.slug
            FROM categories c JOIN post_categories pc ON pc.category_id = c.id
            WHERE pc.post_id = $1
            ORDER BY c.name
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn post_tags(&self, post_id: Uuid) -> RepoResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.name, t.slug
            FROM tags t JOIN post_tags pt ON pt.tag_id = t.id
            WHERE pt.post_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name, slug FROM categories ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    async fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    // --- COMMENTS ---

    async fn get_comment(&self, id: Uuid) -> RepoResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            "SELECT id, content, post_id, user_id, parent_id, created_at FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment> {
        let created = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (id, content, post_id, user_id, parent_id, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id, content, post_id, user_id, parent_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(comment.content)
        .bind(comment.post_id)
        .bind(comment.user_id)
        .bind(comment.parent_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn delete_comment(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_comments(&self, post_id: Uuid) -> RepoResult<Vec<CommentView>> {
        let comments = sqlx::query_as::<_, CommentView>(
            r#"
            SELECT c.id, c.content, c.post_id, c.user_id, c.parent_id,
                   u.name AS author_name, c.created_at
            FROM comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.post_id = $1
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn list_recent_comments(&self, limit: i64) -> RepoResult<Vec<RecentComment>> {
        let comments = sqlx::query_as::<_, RecentComment>(
            r#"
            SELECT c.id, c.content, c.post_id, p.title AS post_title,
                   u.name AS author_name, c.created_at
            FROM comments c
            JOIN users u ON u.id = c.user_id
            JOIN posts p ON p.id = c.post_id
            ORDER BY c.created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    // --- LIKES ---

    async fn find_like(&self, user_id: Uuid, post_id: Uuid) -> RepoResult<Option<Like>> {
        let like = sqlx::query_as::<_, Like>(
            "SELECT id, user_id, post_id, created_at FROM likes WHERE user_id = $1 AND post_id = $2",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(like)
    }

    /// create_like
    ///
    /// `ON CONFLICT DO NOTHING` against `likes_user_id_post_id_key`: a racing
    /// duplicate insert is a no-op, reported as `false`.
    async fn create_like(&self, user_id: Uuid, post_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO likes (id, user_id, post_id, created_at) VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, post_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(post_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_like(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_likes(&self, post_id: Uuid) -> RepoResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // --- MODERATION ---

    async fn get_stats(&self) -> RepoResult<AdminStats> {
        Ok(AdminStats {
            total_users: self.count("SELECT COUNT(*) FROM users").await?,
            total_posts: self.count("SELECT COUNT(*) FROM posts").await?,
            published_posts: self
                .count("SELECT COUNT(*) FROM posts WHERE published = true")
                .await?,
            total_comments: self.count("SELECT COUNT(*) FROM comments").await?,
        })
    }
}
