use blog_portal::{
    models::{Label, NewComment, NewPost, NewUser, PostChanges, Role, User},
    repository::{InMemoryRepository, PostgresRepository, Repository, RepositoryError},
};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Postgres-backed context. Requires `DATABASE_URL`; the tests using it are
/// ignored by default (`cargo test -- --ignored` with a database available).
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

// Unique per call so the Postgres tests can share a database between runs.
fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

async fn create_test_user(repo: &dyn Repository, role: Role) -> User {
    repo.create_user(NewUser {
        name: "Test User".to_string(),
        email: format!("{}@test.com", unique("user")),
        password_hash: "$argon2id$placeholder".to_string(),
        role,
    })
    .await
    .expect("create user")
}

fn label(name: &str) -> Label {
    Label {
        name: name.to_string(),
        slug: name.to_lowercase().replace(' ', "-"),
    }
}

fn new_post(author_id: Uuid, slug: &str, published: bool) -> NewPost {
    NewPost {
        title: "Title".to_string(),
        slug: slug.to_string(),
        content: "Content long enough".to_string(),
        excerpt: Some("Excerpt".to_string()),
        cover_image: None,
        published,
        published_at: published.then(Utc::now),
        author_id,
        categories: vec![label("Rust")],
        tags: vec![label("Async"), label("Web Dev")],
    }
}

// --- Shared Contract ---

async fn users_contract(repo: &dyn Repository) {
    let user = create_test_user(repo, Role::Moderator).await;

    let fetched = repo.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(fetched.email, user.email);
    assert_eq!(fetched.role, Role::Moderator);
    assert_eq!(
        repo.find_user_by_email(&user.email).await.unwrap().map(|u| u.id),
        Some(user.id)
    );

    let duplicate = repo
        .create_user(NewUser {
            name: "Copy".to_string(),
            email: user.email.clone(),
            password_hash: "x".to_string(),
            role: Role::User,
        })
        .await;
    assert!(matches!(duplicate, Err(RepositoryError::UniqueViolation(_))));
}

async fn posts_contract(repo: &dyn Repository) {
    let author = create_test_user(repo, Role::User).await;
    let slug = unique("post");

    let post = repo
        .create_post(new_post(author.id, &slug, true))
        .await
        .unwrap();
    assert_eq!(post.slug, slug);
    assert_eq!(post.view_count, 0);
    let categories = repo.post_categories(post.id).await.unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].name, "Rust", "typed name is kept");
    assert_eq!(categories[0].slug, "rust");
    let tags = repo.post_tags(post.id).await.unwrap();
    assert_eq!(tags.len(), 2);
    assert!(tags.iter().any(|t| t.name == "Web Dev" && t.slug == "web-dev"));

    // Slug is unique.
    let clash = repo.create_post(new_post(author.id, &slug, false)).await;
    assert!(matches!(clash, Err(RepositoryError::UniqueViolation(_))));

    // Categories are connected, not duplicated.
    let second = repo
        .create_post(new_post(author.id, &unique("post"), false))
        .await
        .unwrap();
    let first_category = repo.post_categories(post.id).await.unwrap();
    let second_category = repo.post_categories(second.id).await.unwrap();
    assert_eq!(first_category[0].id, second_category[0].id);

    repo.increment_view_count(post.id).await.unwrap();
    assert_eq!(repo.get_post(post.id).await.unwrap().unwrap().view_count, 1);

    let updated = repo
        .update_post(
            post.id,
            PostChanges {
                title: "Renamed".to_string(),
                slug: slug.clone(),
                content: post.content.clone(),
                excerpt: None,
                cover_image: None,
                published: true,
                published_at: post.published_at,
                categories: None,
                tags: Some(vec![]),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "Renamed");
    assert!(updated.updated_at >= post.updated_at);
    assert_eq!(repo.post_categories(post.id).await.unwrap().len(), 1, "kept");
    assert!(repo.post_tags(post.id).await.unwrap().is_empty(), "replaced");

    let mine = repo.list_posts_by_author(author.id).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].id, second.id, "newest first");

    let published = repo.list_published_posts(100).await.unwrap();
    assert!(published.iter().any(|p| p.id == post.id));
    assert!(published.iter().all(|p| p.published));

    assert!(repo.update_post(Uuid::new_v4(), PostChanges::default()).await.unwrap().is_none());
}

async fn comments_and_likes_contract(repo: &dyn Repository) {
    let author = create_test_user(repo, Role::User).await;
    let reader = create_test_user(repo, Role::User).await;
    let post = repo
        .create_post(new_post(author.id, &unique("post"), true))
        .await
        .unwrap();

    let parent = repo
        .create_comment(NewComment {
            content: "Parent".to_string(),
            post_id: post.id,
            user_id: reader.id,
            parent_id: None,
        })
        .await
        .unwrap();
    let reply = repo
        .create_comment(NewComment {
            content: "Reply".to_string(),
            post_id: post.id,
            user_id: author.id,
            parent_id: Some(parent.id),
        })
        .await
        .unwrap();

    let listed = repo.list_comments(post.id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, reply.id, "newest first");
    assert_eq!(listed[0].author_name, "Test User");

    // One like per (user, post), however often it is inserted.
    assert!(repo.create_like(reader.id, post.id).await.unwrap());
    assert!(!repo.create_like(reader.id, post.id).await.unwrap());
    assert_eq!(repo.count_likes(post.id).await.unwrap(), 1);
    let like = repo.find_like(reader.id, post.id).await.unwrap().unwrap();
    assert!(repo.delete_like(like.id).await.unwrap());
    assert_eq!(repo.count_likes(post.id).await.unwrap(), 0);

    // Replies go with their parent.
    assert!(repo.delete_comment(parent.id).await.unwrap());
    assert!(repo.get_comment(reply.id).await.unwrap().is_none());
    assert!(!repo.delete_comment(parent.id).await.unwrap());

    // Everything goes with the post.
    repo.create_comment(NewComment {
        content: "Again".to_string(),
        post_id: post.id,
        user_id: reader.id,
        parent_id: None,
    })
    .await
    .unwrap();
    repo.create_like(reader.id, post.id).await.unwrap();
    assert!(repo.delete_post(post.id).await.unwrap());
    assert!(repo.list_comments(post.id).await.unwrap().is_empty());
    assert_eq!(repo.count_likes(post.id).await.unwrap(), 0);
    assert!(!repo.delete_post(post.id).await.unwrap());
}

async fn moderation_contract(repo: &dyn Repository) {
    let before = repo.get_stats().await.unwrap();
    let author = create_test_user(repo, Role::User).await;
    repo.create_post(new_post(author.id, &unique("post"), true))
        .await
        .unwrap();
    repo.create_post(new_post(author.id, &unique("post"), false))
        .await
        .unwrap();

    let after = repo.get_stats().await.unwrap();
    assert_eq!(after.total_users, before.total_users + 1);
    assert_eq!(after.total_posts, before.total_posts + 2);
    assert_eq!(after.published_posts, before.published_posts + 1);

    let users = repo.list_recent_users(10).await.unwrap();
    let summary = users.iter().find(|u| u.id == author.id).unwrap();
    assert_eq!(summary.post_count, 2);
    assert!(repo.list_recent_posts(1).await.unwrap().len() <= 1);
}

// --- In-Memory Store ---

#[tokio::test]
async fn test_memory_users() {
    users_contract(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_posts() {
    posts_contract(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_comments_and_likes() {
    comments_and_likes_contract(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_moderation() {
    moderation_contract(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_unavailable_fails_every_call() {
    let repo = InMemoryRepository::new();
    let user = create_test_user(&repo, Role::User).await;

    repo.set_unavailable(true);
    assert!(matches!(
        repo.get_user(user.id).await,
        Err(RepositoryError::Unavailable(_))
    ));
    assert!(repo.list_published_posts(10).await.is_err());

    repo.set_unavailable(false);
    assert!(repo.get_user(user.id).await.unwrap().is_some());
}

// --- Postgres Store ---

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_users() {
    let ctx = DbTestContext::setup().await;
    users_contract(&ctx.repository()).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_posts() {
    let ctx = DbTestContext::setup().await;
    posts_contract(&ctx.repository()).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_comments_and_likes() {
    let ctx = DbTestContext::setup().await;
    comments_and_likes_contract(&ctx.repository()).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_moderation() {
    let ctx = DbTestContext::setup().await;
    moderation_contract(&ctx.repository()).await;
}
