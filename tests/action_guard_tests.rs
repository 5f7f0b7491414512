use std::sync::Arc;

use axum::{Json, extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse};
use blog_portal::{
    AppState,
    actions::{self, LikeToggled},
    auth::{AuthUser, Viewer},
    config::AppConfig,
    guard::{ActionError, ActionReply},
    invalidation::ViewTarget,
    models::{CommentInput, LoginInput, NewUser, PostInput, RegisterInput, Role},
    repository::{InMemoryRepository, Repository},
};
use tokio::sync::broadcast::error::TryRecvError;
use uuid::Uuid;

// --- Fixtures ---

struct Fixture {
    state: AppState,
    repo: Arc<InMemoryRepository>,
}

fn fixture() -> Fixture {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState::new(repo.clone(), AppConfig::default()).expect("state");
    Fixture { state, repo }
}

async fn seed_user(repo: &InMemoryRepository, email: &str, role: Role) -> Viewer {
    let user = repo
        .create_user(NewUser {
            name: email.split('@').next().unwrap_or_default().to_string(),
            email: email.to_string(),
            password_hash: "unused".to_string(),
            role,
        })
        .await
        .expect("seed user");
    Viewer::signed_in(AuthUser::from(user))
}

fn payload<T>(input: T) -> Result<Json<T>, JsonRejection> {
    Ok(Json(input))
}

fn post_input(title: &str, slug: &str) -> PostInput {
    PostInput {
        title: title.to_string(),
        slug: slug.to_string(),
        content: "Long enough body for a post.".to_string(),
        published: true,
        ..PostInput::default()
    }
}

fn comment_input(post_id: Uuid, content: &str) -> CommentInput {
    CommentInput {
        content: content.to_string(),
        post_id: post_id.to_string(),
        parent_id: None,
    }
}

async fn create_post_as(fx: &Fixture, viewer: &Viewer, slug: &str) -> Uuid {
    actions::create_post(&fx.state, viewer, payload(post_input("A title", slug)))
        .await
        .expect("post created")
        .post_id
}

fn drain(receiver: &mut tokio::sync::broadcast::Receiver<ViewTarget>) -> Vec<ViewTarget> {
    let mut targets = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(target) => targets.push(target),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return targets,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
}

// --- Session Check ---

#[tokio::test]
async fn test_every_action_requires_a_session_first() {
    let fx = fixture();
    let anonymous = Viewer::anonymous();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let post_id = create_post_as(&fx, &author, "existing-post").await;

    // Invalid payloads still report Unauthorized: the session check runs first.
    let results: Vec<ActionError> = vec![
        actions::create_post(&fx.state, &anonymous, payload(PostInput::default()))
            .await
            .unwrap_err(),
        actions::update_post(
            &fx.state,
            &anonymous,
            &post_id.to_string(),
            payload(PostInput::default()),
        )
        .await
        .unwrap_err(),
        actions::delete_post(&fx.state, &anonymous, &post_id.to_string())
            .await
            .unwrap_err(),
        actions::toggle_like(&fx.state, &anonymous, &post_id.to_string())
            .await
            .unwrap_err(),
        actions::create_comment(&fx.state, &anonymous, payload(CommentInput::default()))
            .await
            .unwrap_err(),
        actions::delete_comment(&fx.state, &anonymous, "not-even-an-id")
            .await
            .unwrap_err(),
    ];

    for error in results {
        assert!(matches!(error, ActionError::Unauthorized));
        assert_eq!(error.to_string(), "Unauthorized");
        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
    }
    assert!(fx.repo.get_post(post_id).await.unwrap().is_some());
}

// --- Validation ---

#[tokio::test]
async fn test_validation_reports_first_failing_field() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;

    let mut input = post_input("ab", "s");
    let err = actions::create_post(&fx.state, &author, payload(input.clone()))
        .await
        .unwrap_err();
    assert!(matches!(&err, ActionError::Validation(m) if m == "Title must be at least 3 characters"));

    input.title = "A fine title".to_string();
    let err = actions::create_post(&fx.state, &author, payload(input))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Slug must be at least 3 characters");
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let err = actions::create_comment(&fx.state, &author, payload(comment_input(Uuid::new_v4(), "")))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Comment cannot be empty");
}

// --- Posts ---

#[tokio::test]
async fn test_create_post_stamps_publication_and_links_taxonomy() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;

    let input = PostInput {
        excerpt: Some("   ".to_string()),
        cover_image: Some(String::new()),
        categories: Some(vec!["Rust Lang".to_string(), "rust-lang".to_string()]),
        tags: Some(vec!["async".to_string(), "".to_string()]),
        ..post_input("Hello Rust", "hello-rust")
    };
    let saved = actions::create_post(&fx.state, &author, payload(input))
        .await
        .unwrap();
    assert_eq!(saved.message, "Post created successfully");

    let post = fx.repo.get_post(saved.post_id).await.unwrap().unwrap();
    assert_eq!(post.author_id, author.id().unwrap());
    assert!(post.published);
    assert!(post.published_at.is_some());
    assert_eq!(post.excerpt, None);
    assert_eq!(post.cover_image, None);

    let categories = fx.repo.post_categories(post.id).await.unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].slug, "rust-lang");
    assert_eq!(categories[0].name, "Rust Lang", "first spelling wins");
    let tags = fx.repo.post_tags(post.id).await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].slug, "async");
}

#[tokio::test]
async fn test_draft_has_no_publication_date() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let input = PostInput {
        published: false,
        ..post_input("Draft post", "draft-post")
    };
    let saved = actions::create_post(&fx.state, &author, payload(input))
        .await
        .unwrap();
    let post = fx.repo.get_post(saved.post_id).await.unwrap().unwrap();
    assert!(!post.published);
    assert!(post.published_at.is_none());
}

#[tokio::test]
async fn test_duplicate_slug_is_a_conflict_and_creates_nothing() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let other = seed_user(&fx.repo, "other@example.com", Role::User).await;
    create_post_as(&fx, &author, "taken-slug").await;

    let err = actions::create_post(&fx.state, &other, payload(post_input("Another", "taken-slug")))
        .await
        .unwrap_err();
    assert!(matches!(&err, ActionError::Conflict(m) if m == "A post with this slug already exists"));
    assert_eq!(err.status(), StatusCode::CONFLICT);
    assert!(
        fx.repo
            .list_posts_by_author(other.id().unwrap())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_update_by_stranger_is_forbidden_and_changes_nothing() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let stranger = seed_user(&fx.repo, "stranger@example.com", Role::Moderator).await;
    let post_id = create_post_as(&fx, &author, "original-slug").await;

    let err = actions::update_post(
        &fx.state,
        &stranger,
        &post_id.to_string(),
        payload(post_input("Hijacked", "hijacked")),
    )
    .await
    .unwrap_err();
    assert!(
        matches!(&err, ActionError::Forbidden(m) if m == "You don't have permission to edit this post")
    );
    assert_eq!(err.status(), StatusCode::FORBIDDEN);

    let post = fx.repo.get_post(post_id).await.unwrap().unwrap();
    assert_eq!(post.title, "A title");
    assert_eq!(post.slug, "original-slug");
}

#[tokio::test]
async fn test_update_checks_existence_before_ownership() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;

    for raw_id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
        let err = actions::update_post(
            &fx.state,
            &author,
            &raw_id,
            payload(post_input("Title", "some-slug")),
        )
        .await
        .unwrap_err();
        assert!(matches!(&err, ActionError::NotFound(m) if m == "Post not found"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_update_publication_transition() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let draft = PostInput {
        published: false,
        ..post_input("Title", "transition")
    };
    let post_id = actions::create_post(&fx.state, &author, payload(draft.clone()))
        .await
        .unwrap()
        .post_id;

    // Draft to published stamps the date.
    let publish = PostInput {
        published: true,
        ..draft.clone()
    };
    actions::update_post(&fx.state, &author, &post_id.to_string(), payload(publish.clone()))
        .await
        .unwrap();
    let first = fx.repo.get_post(post_id).await.unwrap().unwrap().published_at;
    assert!(first.is_some());

    // Published to published keeps it.
    actions::update_post(&fx.state, &author, &post_id.to_string(), payload(publish))
        .await
        .unwrap();
    let second = fx.repo.get_post(post_id).await.unwrap().unwrap().published_at;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_update_into_taken_slug_is_a_conflict() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    create_post_as(&fx, &author, "first-post").await;
    let second = create_post_as(&fx, &author, "second-post").await;

    let err = actions::update_post(
        &fx.state,
        &author,
        &second.to_string(),
        payload(post_input("Second", "first-post")),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ActionError::Conflict(_)));
}

#[tokio::test]
async fn test_admin_may_edit_and_delete_any_post() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let admin = seed_user(&fx.repo, "admin@example.com", Role::Admin).await;
    let post_id = create_post_as(&fx, &author, "moderated").await;

    let saved = actions::update_post(
        &fx.state,
        &admin,
        &post_id.to_string(),
        payload(post_input("Moderated title", "moderated")),
    )
    .await
    .unwrap();
    assert_eq!(saved.message, "Post updated successfully");
    let post = fx.repo.get_post(post_id).await.unwrap().unwrap();
    assert_eq!(post.title, "Moderated title");
    assert_eq!(post.author_id, author.id().unwrap(), "authorship is unchanged");

    let deleted = actions::delete_post(&fx.state, &admin, &post_id.to_string())
        .await
        .unwrap();
    assert_eq!(deleted.message, "Post deleted successfully");
    assert!(fx.repo.get_post(post_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_by_stranger_is_forbidden() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let stranger = seed_user(&fx.repo, "stranger@example.com", Role::User).await;
    let post_id = create_post_as(&fx, &author, "keep-me").await;

    let err = actions::delete_post(&fx.state, &stranger, &post_id.to_string())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "You don't have permission to delete this post");
    assert!(fx.repo.get_post(post_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_post_cascades() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let reader = seed_user(&fx.repo, "reader@example.com", Role::User).await;
    let post_id = create_post_as(&fx, &author, "cascade").await;

    let comment = actions::create_comment(&fx.state, &reader, payload(comment_input(post_id, "Nice")))
        .await
        .unwrap();
    actions::toggle_like(&fx.state, &reader, &post_id.to_string())
        .await
        .unwrap();

    actions::delete_post(&fx.state, &author, &post_id.to_string())
        .await
        .unwrap();
    assert!(fx.repo.get_comment(comment.comment_id).await.unwrap().is_none());
    assert!(
        fx.repo
            .find_like(reader.id().unwrap(), post_id)
            .await
            .unwrap()
            .is_none()
    );
}

// --- Likes ---

#[tokio::test]
async fn test_two_toggles_return_to_original_state() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let reader = seed_user(&fx.repo, "reader@example.com", Role::User).await;
    let post_id = create_post_as(&fx, &author, "likeable").await;

    let first = actions::toggle_like(&fx.state, &reader, &post_id.to_string())
        .await
        .unwrap();
    assert_eq!(first, LikeToggled { liked: true });
    assert_eq!(fx.repo.count_likes(post_id).await.unwrap(), 1);

    let second = actions::toggle_like(&fx.state, &reader, &post_id.to_string())
        .await
        .unwrap();
    assert_eq!(second, LikeToggled { liked: false });
    assert_eq!(fx.repo.count_likes(post_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_toggles_never_duplicate_a_like() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let reader = seed_user(&fx.repo, "reader@example.com", Role::User).await;
    let post_id = create_post_as(&fx, &author, "contended").await;
    let raw_id = post_id.to_string();

    let (a, b) = tokio::join!(
        actions::toggle_like(&fx.state, &reader, &raw_id),
        actions::toggle_like(&fx.state, &reader, &raw_id),
    );
    assert!(a.is_ok() && b.is_ok());
    assert!(fx.repo.count_likes(post_id).await.unwrap() <= 1);
}

#[tokio::test]
async fn test_like_on_missing_post_is_not_found() {
    let fx = fixture();
    let reader = seed_user(&fx.repo, "reader@example.com", Role::User).await;
    let err = actions::toggle_like(&fx.state, &reader, &Uuid::new_v4().to_string())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Post not found");
}

// --- Comments ---

#[tokio::test]
async fn test_reply_must_target_a_comment_of_the_same_post() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let first = create_post_as(&fx, &author, "first-post").await;
    let second = create_post_as(&fx, &author, "second-post").await;

    let parent = actions::create_comment(&fx.state, &author, payload(comment_input(first, "Parent")))
        .await
        .unwrap();

    let reply = CommentInput {
        parent_id: Some(parent.comment_id.to_string()),
        ..comment_input(first, "Reply")
    };
    let created = actions::create_comment(&fx.state, &author, payload(reply))
        .await
        .unwrap();
    assert_eq!(created.message, "Comment added successfully");
    let stored = fx.repo.get_comment(created.comment_id).await.unwrap().unwrap();
    assert_eq!(stored.parent_id, Some(parent.comment_id));

    let cross_post = CommentInput {
        parent_id: Some(parent.comment_id.to_string()),
        ..comment_input(second, "Reply elsewhere")
    };
    let err = actions::create_comment(&fx.state, &author, payload(cross_post))
        .await
        .unwrap_err();
    assert!(matches!(&err, ActionError::NotFound(m) if m == "Parent comment not found"));

    let err = actions::create_comment(&fx.state, &author, payload(comment_input(Uuid::new_v4(), "Hi")))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Post not found");
}

#[tokio::test]
async fn test_delete_comment_by_stranger_is_forbidden() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let stranger = seed_user(&fx.repo, "stranger@example.com", Role::User).await;
    let post_id = create_post_as(&fx, &author, "commented").await;
    let comment = actions::create_comment(&fx.state, &author, payload(comment_input(post_id, "Mine")))
        .await
        .unwrap();

    let reply = ActionReply(
        actions::delete_comment(&fx.state, &stranger, &comment.comment_id.to_string()).await,
    );
    assert_eq!(
        reply.body(),
        serde_json::json!({
            "success": false,
            "error": "You don't have permission to delete this comment"
        })
    );
    assert!(fx.repo.get_comment(comment.comment_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_comment_removes_replies() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let admin = seed_user(&fx.repo, "admin@example.com", Role::Admin).await;
    let post_id = create_post_as(&fx, &author, "thread").await;

    let parent = actions::create_comment(&fx.state, &author, payload(comment_input(post_id, "Parent")))
        .await
        .unwrap();
    let reply = actions::create_comment(
        &fx.state,
        &author,
        payload(CommentInput {
            parent_id: Some(parent.comment_id.to_string()),
            ..comment_input(post_id, "Reply")
        }),
    )
    .await
    .unwrap();

    let done = actions::delete_comment(&fx.state, &admin, &parent.comment_id.to_string())
        .await
        .unwrap();
    assert_eq!(done.message, "Comment deleted successfully");
    assert!(fx.repo.get_comment(reply.comment_id).await.unwrap().is_none());

    let err = actions::delete_comment(&fx.state, &admin, &parent.comment_id.to_string())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Comment not found");
}

// --- Invalidation ---

#[tokio::test]
async fn test_successful_actions_publish_their_view_targets() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let mut receiver = fx.state.invalidator.subscribe();

    let post_id = create_post_as(&fx, &author, "old-slug").await;
    assert_eq!(drain(&mut receiver), ViewTarget::post_created("old-slug"));

    actions::update_post(
        &fx.state,
        &author,
        &post_id.to_string(),
        payload(post_input("Renamed", "new-slug")),
    )
    .await
    .unwrap();
    let targets = drain(&mut receiver);
    assert!(targets.contains(&ViewTarget::Post("new-slug".to_string())));
    assert!(targets.contains(&ViewTarget::Post("old-slug".to_string())));
    assert!(targets.contains(&ViewTarget::Admin));

    actions::toggle_like(&fx.state, &author, &post_id.to_string())
        .await
        .unwrap();
    assert_eq!(drain(&mut receiver), ViewTarget::post_activity("new-slug"));
}

#[tokio::test]
async fn test_failed_actions_publish_nothing() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let stranger = seed_user(&fx.repo, "stranger@example.com", Role::User).await;
    let post_id = create_post_as(&fx, &author, "quiet").await;
    let mut receiver = fx.state.invalidator.subscribe();

    let _ = actions::delete_post(&fx.state, &stranger, &post_id.to_string()).await;
    let _ = actions::create_post(&fx.state, &Viewer::anonymous(), payload(post_input("T", "t"))).await;
    assert!(drain(&mut receiver).is_empty());
}

// --- Infrastructure Failures ---

#[tokio::test]
async fn test_store_failure_is_reported_generically() {
    let fx = fixture();
    let author = seed_user(&fx.repo, "author@example.com", Role::User).await;
    let post_id = create_post_as(&fx, &author, "before-outage").await;
    fx.repo.set_unavailable(true);

    let err = actions::create_post(&fx.state, &author, payload(post_input("Title", "outage")))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Unexpected { .. }));
    assert_eq!(err.to_string(), "An error occurred while creating the post");
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let err = actions::toggle_like(&fx.state, &author, &post_id.to_string())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "An error occurred while toggling the like");

    let response = ActionReply::<LikeToggled>(Err(err)).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// --- Registration & Login ---

#[tokio::test]
async fn test_register_then_login() {
    let fx = fixture();
    let registered = actions::register(
        &fx.state,
        payload(RegisterInput {
            name: "Grace".to_string(),
            email: "Grace@Example.com".to_string(),
            password: "hopper123".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(registered.message, "Account created successfully");

    let user = fx
        .repo
        .find_user_by_email("grace@example.com")
        .await
        .unwrap()
        .expect("stored with a normalized email");
    assert_eq!(user.role, Role::User);
    assert_ne!(user.password_hash, "hopper123");

    let outcome = actions::login(
        &fx.state,
        payload(LoginInput {
            email: "grace@example.com".to_string(),
            password: "hopper123".to_string(),
            callback_url: Some("/edit-post/1?tab=seo".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(outcome.reply.redirect_to, "/edit-post/1?tab=seo");
    assert!(!outcome.token.is_empty());
}

#[tokio::test]
async fn test_register_duplicate_email_is_a_conflict() {
    let fx = fixture();
    let input = RegisterInput {
        name: "Grace".to_string(),
        email: "grace@example.com".to_string(),
        password: "hopper123".to_string(),
    };
    actions::register(&fx.state, payload(input.clone())).await.unwrap();
    let err = actions::register(&fx.state, payload(input)).await.unwrap_err();
    assert!(matches!(&err, ActionError::Conflict(m) if m == "User with this email already exists"));
}

#[tokio::test]
async fn test_overlong_password_is_a_validation_error() {
    let fx = fixture();
    let long = "p".repeat(600);

    let err = actions::register(
        &fx.state,
        payload(RegisterInput {
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
            password: long.clone(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(&err, ActionError::Validation(m) if m == "Password must be at most 512 characters"));
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert!(fx.repo.find_user_by_email("grace@example.com").await.unwrap().is_none());

    let err = actions::login(
        &fx.state,
        payload(LoginInput {
            email: "grace@example.com".to_string(),
            password: long,
            callback_url: None,
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let fx = fixture();
    actions::register(
        &fx.state,
        payload(RegisterInput {
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
            password: "hopper123".to_string(),
        }),
    )
    .await
    .unwrap();

    for (email, password) in [
        ("grace@example.com", "wrong-password"),
        ("nobody@example.com", "hopper123"),
    ] {
        let err = actions::login(
            &fx.state,
            payload(LoginInput {
                email: email.to_string(),
                password: password.to_string(),
                callback_url: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ActionError::InvalidCredentials));
        assert_eq!(err.to_string(), "Invalid email or password");
    }
}

#[tokio::test]
async fn test_login_ignores_foreign_callbacks() {
    let fx = fixture();
    actions::register(
        &fx.state,
        payload(RegisterInput {
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
            password: "hopper123".to_string(),
        }),
    )
    .await
    .unwrap();

    let outcome = actions::login(
        &fx.state,
        payload(LoginInput {
            email: "grace@example.com".to_string(),
            password: "hopper123".to_string(),
            callback_url: Some("//evil.example/phish".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(outcome.reply.redirect_to, "/dashboard");
}

// --- Response Shape ---

#[test]
fn test_reply_body_shapes() {
    let ok = ActionReply::<LikeToggled>(Ok(LikeToggled { liked: true }));
    assert_eq!(ok.body(), serde_json::json!({ "success": true, "liked": true }));

    let err = ActionReply::<LikeToggled>(Err(ActionError::Unauthorized));
    assert_eq!(
        err.body(),
        serde_json::json!({ "success": false, "error": "Unauthorized" })
    );
}
