use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RepoResult, Repository, RepositoryError};
use crate::models::{
    AdminStats, Category, Comment, CommentView, Label, Like, NewComment, NewPost, NewUser, Post,
    PostChanges, PostSummary, RecentComment, Tag, User, UserSummary,
};

#[derive(Default)]
struct Store {
    users: Vec<User>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    likes: Vec<Like>,
    categories: Vec<Category>,
    tags: Vec<Tag>,
    post_categories: HashMap<Uuid, Vec<Uuid>>,
    post_tags: HashMap<Uuid, Vec<Uuid>>,
}

impl Store {
    fn user_name(&self, id: Uuid) -> String {
        self.users
            .iter()
            .find(|user| user.id == id)
            .map(|user| user.name.clone())
            .unwrap_or_default()
    }

    fn summarize(&self, post: &Post) -> PostSummary {
        PostSummary {
            id: post.id,
            title: post.title.clone(),
            slug: post.slug.clone(),
            excerpt: post.excerpt.clone(),
            cover_image: post.cover_image.clone(),
            published: post.published,
            published_at: post.published_at,
            author_id: post.author_id,
            author_name: self.user_name(post.author_id),
            view_count: post.view_count,
            like_count: self.likes.iter().filter(|l| l.post_id == post.id).count() as i64,
            comment_count: self.comments.iter().filter(|c| c.post_id == post.id).count() as i64,
            created_at: post.created_at,
        }
    }

    fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> bool {
        self.posts
            .iter()
            .any(|post| post.slug == slug && Some(post.id) != except)
    }

    fn link_categories(&mut self, post_id: Uuid, labels: &[Label]) {
        let mut ids = Vec::with_capacity(labels.len());
        for label in labels {
            let id = match self.categories.iter().find(|c| c.slug == label.slug) {
                Some(existing) => existing.id,
                None => {
                    let created = Category {
                        id: Uuid::new_v4(),
                        name: label.name.clone(),
                        slug: label.slug.clone(),
                    };
                    let id = created.id;
                    self.categories.push(created);
                    id
                }
            };
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        self.post_categories.insert(post_id, ids);
    }

    fn link_tags(&mut self, post_id: Uuid, labels: &[Label]) {
        let mut ids = Vec::with_capacity(labels.len());
        for label in labels {
            let id = match self.tags.iter().find(|t| t.slug == label.slug) {
                Some(existing) => existing.id,
                None => {
                    let created = Tag {
                        id: Uuid::new_v4(),
                        name: label.name.clone(),
                        slug: label.slug.clone(),
                    };
                    let id = created.id;
                    self.tags.push(created);
                    id
                }
            };
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        self.post_tags.insert(post_id, ids);
    }

    /// Ids of `root` and every reply below it.
    fn comment_subtree(&self, root: Uuid) -> HashSet<Uuid> {
        let mut doomed = HashSet::from([root]);
        loop {
            let before = doomed.len();
            for comment in &self.comments {
                if let Some(parent) = comment.parent_id {
                    if doomed.contains(&parent) {
                        doomed.insert(comment.id);
                    }
                }
            }
            if doomed.len() == before {
                return doomed;
            }
        }
    }
}

/// InMemoryRepository
///
/// A `Repository` kept entirely in process memory. Used for local development
/// without `DATABASE_URL` and by the test suite. Enforces the same uniqueness
/// rules as the Postgres schema (email, slug, one like per user and post) and the
/// same cascades.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
    unavailable: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `RepositoryError::Unavailable` until
    /// switched back, to exercise infrastructure failure paths.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> RepoResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        self.check()?;
        let store = self.store.read().await;
        Ok(store.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.check()?;
        let store = self.store.read().await;
        Ok(store.users.iter().find(|user| user.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        self.check()?;
        let mut store = self.store.write().await;
        if store.users.iter().any(|existing| existing.email == user.email) {
            return Err(RepositoryError::UniqueViolation("users_email_key".to_string()));
        }
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn list_recent_users(&self, limit: i64) -> RepoResult<Vec<UserSummary>> {
        self.check()?;
        let store = self.store.read().await;
        let mut users: Vec<UserSummary> = store
            .users
            .iter()
            .map(|user| UserSummary {
                id: user.id,
                name: user.name.clone(),
                email: user.email.clone(),
                role: user.role,
                post_count: store.posts.iter().filter(|p| p.author_id == user.id).count() as i64,
                comment_count: store.comments.iter().filter(|c| c.user_id == user.id).count()
                    as i64,
                created_at: user.created_at,
            })
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        users.truncate(limit.max(0) as usize);
        Ok(users)
    }

    async fn list_published_posts(&self, limit: i64) -> RepoResult<Vec<PostSummary>> {
        self.check()?;
        let store = self.store.read().await;
        let mut posts: Vec<&Post> = store.posts.iter().filter(|p| p.published).collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(posts
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|post| store.summarize(post))
            .collect())
    }

    async fn list_posts_by_author(&self, author_id: Uuid) -> RepoResult<Vec<PostSummary>> {
        self.check()?;
        let store = self.store.read().await;
        let mut posts: Vec<&Post> = store
            .posts
            .iter()
            .filter(|p| p.author_id == author_id)
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts.into_iter().map(|post| store.summarize(post)).collect())
    }

    async fn list_recent_posts(&self, limit: i64) -> RepoResult<Vec<PostSummary>> {
        self.check()?;
        let store = self.store.read().await;
        let mut posts: Vec<&Post> = store.posts.iter().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|post| store.summarize(post))
            .collect())
    }

    async fn get_post(&self, id: Uuid) -> RepoResult<Option<Post>> {
        self.check()?;
        let store = self.store.read().await;
        Ok(store.posts.iter().find(|post| post.id == id).cloned())
    }

    async fn find_post_by_slug(&self, slug: &str) -> RepoResult<Option<Post>> {
        self.check()?;
        let store = self.store.read().await;
        Ok(store.posts.iter().find(|post| post.slug == slug).cloned())
    }

    async fn create_post(&self, post: NewPost) -> RepoResult<Post> {
        self.check()?;
        let mut store = self.store.write().await;
        if store.slug_taken(&post.slug, None) {
            return Err(RepositoryError::UniqueViolation("posts_slug_key".to_string()));
        }
        let now = Utc::now();
        let created = Post {
            id: Uuid::new_v4(),
            title: post.title,
            slug: post.slug,
            content: post.content,
            excerpt: post.excerpt,
            cover_image: post.cover_image,
            published: post.published,
            published_at: post.published_at,
            author_id: post.author_id,
            view_count: 0,
            created_at: now,
            updated_at: now,
        };
        store.posts.push(created.clone());
        store.link_categories(created.id, &post.categories);
        store.link_tags(created.id, &post.tags);
        Ok(created)
    }

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> RepoResult<Option<Post>> {
        self.check()?;
        let mut store = self.store.write().await;
        if store.slug_taken(&changes.slug, Some(id)) {
            return Err(RepositoryError::UniqueViolation("posts_slug_key".to_string()));
        }
        let Some(post) = store.posts.iter_mut().find(|post| post.id == id) else {
            return Ok(None);
        };
        post.title = changes.title;
        post.slug = changes.slug;
        post.content = changes.content;
        post.excerpt = changes.excerpt;
        post.cover_image = changes.cover_image;
        post.published = changes.published;
        post.published_at = changes.published_at;
        post.updated_at = Utc::now();
        let updated = post.clone();

        if let Some(categories) = &changes.categories {
            store.link_categories(id, categories);
        }
        if let Some(tags) = &changes.tags {
            store.link_tags(id, tags);
        }
        Ok(Some(updated))
    }

    async fn delete_post(&self, id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut store = self.store.write().await;
        let before = store.posts.len();
        store.posts.retain(|post| post.id != id);
        if store.posts.len() == before {
            return Ok(false);
        }
        store.comments.retain(|comment| comment.post_id != id);
        store.likes.retain(|like| like.post_id != id);
        store.post_categories.remove(&id);
        store.post_tags.remove(&id);
        Ok(true)
    }

    async fn increment_view_count(&self, id: Uuid) -> RepoResult<()> {
        self.check()?;
        let mut store = self.store.write().await;
        if let Some(post) = store.posts.iter_mut().find(|post| post.id == id) {
            post.view_count += 1;
        }
        Ok(())
    }

    async fn post_categories(&self, post_id: Uuid) -> RepoResult<Vec<Category>> {
        self.check()?;
        let store = self.store.read().await;
        let ids = store.post_categories.get(&post_id).cloned().unwrap_or_default();
        let mut categories: Vec<Category> = store
            .categories
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn post_tags(&self, post_id: Uuid) -> RepoResult<Vec<Tag>> {
        self.check()?;
        let store = self.store.read().await;
        let ids = store.post_tags.get(&post_id).cloned().unwrap_or_default();
        let mut tags: Vec<Tag> = store
            .tags
            .iter()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        self.check()?;
        let store = self.store.read().await;
        let mut categories = store.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        self.check()?;
        let store = self.store.read().await;
        let mut tags = store.tags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn get_comment(&self, id: Uuid) -> RepoResult<Option<Comment>> {
        self.check()?;
        let store = self.store.read().await;
        Ok(store.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment> {
        self.check()?;
        let mut store = self.store.write().await;
        let created = Comment {
            id: Uuid::new_v4(),
            content: comment.content,
            post_id: comment.post_id,
            user_id: comment.user_id,
            parent_id: comment.parent_id,
            created_at: Utc::now(),
        };
        store.comments.push(created.clone());
        Ok(created)
    }

    async fn delete_comment(&self, id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut store = self.store.write().await;
        if !store.comments.iter().any(|c| c.id == id) {
            return Ok(false);
        }
        let doomed = store.comment_subtree(id);
        store.comments.retain(|c| !doomed.contains(&c.id));
        Ok(true)
    }

    async fn list_comments(&self, post_id: Uuid) -> RepoResult<Vec<CommentView>> {
        self.check()?;
        let store = self.store.read().await;
        let mut comments: Vec<CommentView> = store
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| CommentView {
                id: c.id,
                content: c.content.clone(),
                post_id: c.post_id,
                user_id: c.user_id,
                parent_id: c.parent_id,
                author_name: store.user_name(c.user_id),
                created_at: c.created_at,
            })
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments)
    }

    async fn list_recent_comments(&self, limit: i64) -> RepoResult<Vec<RecentComment>> {
        self.check()?;
        let store = self.store.read().await;
        let mut comments: Vec<RecentComment> = store
            .comments
            .iter()
            .map(|c| RecentComment {
                id: c.id,
                content: c.content.clone(),
                post_id: c.post_id,
                post_title: store
                    .posts
                    .iter()
                    .find(|p| p.id == c.post_id)
                    .map(|p| p.title.clone())
                    .unwrap_or_default(),
                author_name: store.user_name(c.user_id),
                created_at: c.created_at,
            })
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        comments.truncate(limit.max(0) as usize);
        Ok(comments)
    }

    async fn find_like(&self, user_id: Uuid, post_id: Uuid) -> RepoResult<Option<Like>> {
        self.check()?;
        let store = self.store.read().await;
        Ok(store
            .likes
            .iter()
            .find(|l| l.user_id == user_id && l.post_id == post_id)
            .cloned())
    }

    async fn create_like(&self, user_id: Uuid, post_id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut store = self.store.write().await;
        if store
            .likes
            .iter()
            .any(|l| l.user_id == user_id && l.post_id == post_id)
        {
            return Ok(false);
        }
        store.likes.push(Like {
            id: Uuid::new_v4(),
            user_id,
            post_id,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn delete_like(&self, id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut store = self.store.write().await;
        let before = store.likes.len();
        store.likes.retain(|l| l.id != id);
        Ok(store.likes.len() != before)
    }

    async fn count_likes(&self, post_id: Uuid) -> RepoResult<i64> {
        self.check()?;
        let store = self.store.read().await;
        Ok(store.likes.iter().filter(|l| l.post_id == post_id).count() as i64)
    }

    async fn get_stats(&self) -> RepoResult<AdminStats> {
        self.check()?;
        let store = self.store.read().await;
        Ok(AdminStats {
            total_users: store.users.len() as i64,
            total_posts: store.posts.len() as i64,
            published_posts: store.posts.iter().filter(|p| p.published).count() as i64,
            total_comments: store.comments.len() as i64,
        })
    }
}
