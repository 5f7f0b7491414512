use std::collections::{HashMap, HashSet};

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState, actions,
    access::{AccessDecision, HOME_PATH},
    actions::{CommentCreated, LikeToggled, LoggedIn, Message, PostSaved},
    auth::{AuthUser, Viewer, clear_session_cookie, session_cookie},
    guard::{ActionFailure, ActionReply},
    models::{
        AdminStats, Category, CommentInput, CommentView, DashboardStats, LoginInput, Post,
        PostInput, PostSummary, RecentComment, RegisterInput, Role, Tag, UserSummary,
    },
    repository::RepositoryError,
};

// Listing sizes of the home and admin pages.
const HOME_POST_LIMIT: i64 = 10;
const ADMIN_USER_LIMIT: i64 = 10;
const ADMIN_POST_LIMIT: i64 = 20;
const ADMIN_COMMENT_LIMIT: i64 = 10;

// --- Page Errors ---

/// PageRejection
///
/// Failure modes of page handlers. Unlike actions, pages answer with plain
/// status codes or redirects.
#[derive(Debug)]
pub enum PageRejection {
    NotFound,
    Forbidden,
    Redirect(String),
    Internal,
}

impl From<RepositoryError> for PageRejection {
    fn from(e: RepositoryError) -> Self {
        tracing::error!(error = %e, "page data could not be loaded");
        PageRejection::Internal
    }
}

impl IntoResponse for PageRejection {
    fn into_response(self) -> Response {
        match self {
            PageRejection::NotFound => {
                (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "Not found" })))
                    .into_response()
            }
            PageRejection::Forbidden => {
                (StatusCode::FORBIDDEN, Json(serde_json::json!({ "error": "Forbidden" })))
                    .into_response()
            }
            PageRejection::Redirect(location) => Redirect::temporary(&location).into_response(),
            PageRejection::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Internal server error" })),
            )
                .into_response(),
        }
    }
}

type PageResult<T> = Result<Json<T>, PageRejection>;

// Pages behind the gate re-check the session so that a handler mounted without
// the gate still cannot leak data.
fn signed_in<'a>(viewer: &'a Viewer, path: &str) -> Result<&'a AuthUser, PageRejection> {
    viewer.user().ok_or_else(|| {
        let decision = AccessDecision::RedirectLogin {
            callback: path.to_string(),
        };
        PageRejection::Redirect(decision.location().unwrap_or_default())
    })
}

// --- Page View Models ---

/// ViewerSummary
///
/// Who is looking at the page, as the navigation bar shows it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewerSummary {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

impl ViewerSummary {
    fn of(viewer: &Viewer) -> Option<Self> {
        viewer.user().map(|user| Self {
            id: user.id,
            name: user.name.clone(),
            role: user.role,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomePage {
    pub viewer: Option<ViewerSummary>,
    pub posts: Vec<PostSummary>,
}

/// CommentNode
///
/// One comment of a post page with its replies nested beneath it.
/// `can_delete` is true for the comment's author and for admins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentView,
    pub can_delete: bool,
    pub replies: Vec<CommentNode>,
}

/// PostPage
///
/// Everything the public detail page of a post shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub viewer: Option<ViewerSummary>,
    pub post: Post,
    pub author_name: String,
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
    pub like_count: i64,
    pub is_liked: bool,
    pub is_author: bool,
    pub comments: Vec<CommentNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardPage {
    pub viewer: Option<ViewerSummary>,
    pub stats: DashboardStats,
    pub posts: Vec<PostSummary>,
}

/// PostFormPage
///
/// The create and edit forms: the taxonomy to choose from and, when editing, the
/// post with its current categories and tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFormPage {
    pub viewer: Option<ViewerSummary>,
    pub post: Option<Post>,
    pub post_categories: Vec<Category>,
    pub post_tags: Vec<Tag>,
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminPage {
    pub viewer: Option<ViewerSummary>,
    pub stats: AdminStats,
    pub users: Vec<UserSummary>,
    pub posts: Vec<PostSummary>,
    pub comments: Vec<RecentComment>,
}

/// AuthFormPage
///
/// Descriptor of the login and register forms. `action` is where the form posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFormPage {
    pub form: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginQuery {
    pub callback_url: Option<String>,
}

/// Deepest nesting level of a reply; the top level is depth 0.
pub const MAX_REPLY_DEPTH: usize = 8;

/// thread_comments
///
/// Nests replies under their parents. Input order is kept at every level, so a
/// newest-first list stays newest-first among siblings. A reply whose parent is
/// not in the list is shown at the top level. Replies deeper than
/// [`MAX_REPLY_DEPTH`] are attached next to their deepest visible ancestor, so
/// the tree never nests further than that however long a reply chain gets.
pub fn thread_comments(comments: Vec<CommentView>, viewer: Option<&AuthUser>) -> Vec<CommentNode> {
    let present: HashSet<Uuid> = comments.iter().map(|c| c.id).collect();
    let parent_of: HashMap<Uuid, Uuid> = comments
        .iter()
        .filter_map(|c| {
            c.parent_id
                .filter(|parent| *parent != c.id && present.contains(parent))
                .map(|parent| (c.id, parent))
        })
        .collect();

    // Displayed parent and depth of every comment, assigned ancestors first.
    let mut placed: HashMap<Uuid, (Option<Uuid>, usize)> = HashMap::with_capacity(comments.len());
    for comment in &comments {
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        let mut cursor = Some(comment.id);
        while let Some(id) = cursor {
            if placed.contains_key(&id) || !on_path.insert(id) {
                break;
            }
            path.push(id);
            cursor = parent_of.get(&id).copied();
        }

        for id in path.into_iter().rev() {
            let parent = parent_of
                .get(&id)
                .and_then(|parent| placed.get(parent).map(|slot| (*parent, *slot)));
            let slot = match parent {
                // A root, or a cycle broken at this comment.
                None => (None, 0),
                Some((parent, (_, depth))) if depth < MAX_REPLY_DEPTH => (Some(parent), depth + 1),
                Some((_, (grandparent, depth))) => (grandparent, depth),
            };
            placed.insert(id, slot);
        }
    }

    let mut children: HashMap<Option<Uuid>, Vec<CommentView>> = HashMap::new();
    for comment in comments {
        let parent = placed.get(&comment.id).and_then(|(parent, _)| *parent);
        children.entry(parent).or_default().push(comment);
    }

    // Bounded by MAX_REPLY_DEPTH.
    fn build(
        parent: Option<Uuid>,
        children: &mut HashMap<Option<Uuid>, Vec<CommentView>>,
        viewer: Option<&AuthUser>,
    ) -> Vec<CommentNode> {
        let level = children.remove(&parent).unwrap_or_default();
        level
            .into_iter()
            .map(|comment| {
                let can_delete =
                    viewer.is_some_and(|user| user.id == comment.user_id || user.is_admin());
                let replies = build(Some(comment.id), children, viewer);
                CommentNode {
                    comment,
                    can_delete,
                    replies,
                }
            })
            .collect()
    }

    build(None, &mut children, viewer)
}

// --- Page Handlers ---

/// home
///
/// Latest published posts, newest first.
pub async fn home(State(state): State<AppState>, viewer: Viewer) -> PageResult<HomePage> {
    let posts = state.repo.list_published_posts(HOME_POST_LIMIT).await?;
    Ok(Json(HomePage {
        viewer: ViewerSummary::of(&viewer),
        posts,
    }))
}

/// post_detail
///
/// A draft is only visible to its author; everyone else gets a 404, as if it
/// did not exist. Every successful view bumps the view counter.
pub async fn post_detail(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(slug): Path<String>,
) -> PageResult<PostPage> {
    let mut post = state
        .repo
        .find_post_by_slug(&slug)
        .await?
        .ok_or(PageRejection::NotFound)?;

    let is_author = viewer.id() == Some(post.author_id);
    if !post.published && !is_author {
        return Err(PageRejection::NotFound);
    }

    state.repo.increment_view_count(post.id).await?;
    post.view_count += 1;

    let author_name = state
        .repo
        .get_user(post.author_id)
        .await?
        .map(|author| author.name)
        .unwrap_or_default();
    let categories = state.repo.post_categories(post.id).await?;
    let tags = state.repo.post_tags(post.id).await?;
    let like_count = state.repo.count_likes(post.id).await?;
    let is_liked = match viewer.id() {
        Some(user_id) => state.repo.find_like(user_id, post.id).await?.is_some(),
        None => false,
    };
    let comments = thread_comments(state.repo.list_comments(post.id).await?, viewer.user());

    Ok(Json(PostPage {
        viewer: ViewerSummary::of(&viewer),
        post,
        author_name,
        categories,
        tags,
        like_count,
        is_liked,
        is_author,
        comments,
    }))
}

/// dashboard
///
/// The caller's own posts, drafts included, with totals.
pub async fn dashboard(State(state): State<AppState>, viewer: Viewer) -> PageResult<DashboardPage> {
    let user = signed_in(&viewer, "/dashboard")?;
    let posts = state.repo.list_posts_by_author(user.id).await?;

    let published_posts = posts.iter().filter(|post| post.published).count() as i64;
    let stats = DashboardStats {
        total_posts: posts.len() as i64,
        published_posts,
        draft_posts: posts.len() as i64 - published_posts,
        total_likes: posts.iter().map(|post| post.like_count).sum(),
    };

    Ok(Json(DashboardPage {
        viewer: ViewerSummary::of(&viewer),
        stats,
        posts,
    }))
}

pub async fn create_post_page(
    State(state): State<AppState>,
    viewer: Viewer,
) -> PageResult<PostFormPage> {
    signed_in(&viewer, "/create-post")?;
    Ok(Json(PostFormPage {
        viewer: ViewerSummary::of(&viewer),
        post: None,
        post_categories: Vec::new(),
        post_tags: Vec::new(),
        categories: state.repo.list_categories().await?,
        tags: state.repo.list_tags().await?,
    }))
}

/// edit_post_page
///
/// Only the author or an admin may open the editor.
pub async fn edit_post_page(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(raw_id): Path<String>,
) -> PageResult<PostFormPage> {
    let user = signed_in(&viewer, &format!("/edit-post/{raw_id}"))?;
    let post_id = Uuid::parse_str(&raw_id).map_err(|_| PageRejection::NotFound)?;
    let post = state
        .repo
        .get_post(post_id)
        .await?
        .ok_or(PageRejection::NotFound)?;

    if post.author_id != user.id && !user.is_admin() {
        return Err(PageRejection::Forbidden);
    }

    Ok(Json(PostFormPage {
        viewer: ViewerSummary::of(&viewer),
        post_categories: state.repo.post_categories(post.id).await?,
        post_tags: state.repo.post_tags(post.id).await?,
        post: Some(post),
        categories: state.repo.list_categories().await?,
        tags: state.repo.list_tags().await?,
    }))
}

/// admin
///
/// Moderation overview. The gate already keeps non-admins out; anyone who still
/// gets here without the role is sent home.
pub async fn admin(State(state): State<AppState>, viewer: Viewer) -> PageResult<AdminPage> {
    if !viewer.user().is_some_and(AuthUser::is_admin) {
        return Err(PageRejection::Redirect(HOME_PATH.to_string()));
    }

    Ok(Json(AdminPage {
        viewer: ViewerSummary::of(&viewer),
        stats: state.repo.get_stats().await?,
        users: state.repo.list_recent_users(ADMIN_USER_LIMIT).await?,
        posts: state.repo.list_recent_posts(ADMIN_POST_LIMIT).await?,
        comments: state.repo.list_recent_comments(ADMIN_COMMENT_LIMIT).await?,
    }))
}

pub async fn login_page(Query(query): Query<LoginQuery>) -> Json<AuthFormPage> {
    Json(AuthFormPage {
        form: "login".to_string(),
        action: "/login".to_string(),
        callback_url: query.callback_url,
    })
}

pub async fn register_page() -> Json<AuthFormPage> {
    Json(AuthFormPage {
        form: "register".to_string(),
        action: "/register".to_string(),
        callback_url: None,
    })
}

pub async fn not_found() -> PageRejection {
    PageRejection::NotFound
}

// --- Action Handlers ---

/// register
///
/// [Public Route] Creates a `USER` account. Does not sign the user in.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterInput,
    responses(
        (status = 200, description = "Account created", body = Message),
        (status = 400, description = "Invalid input", body = ActionFailure),
        (status = 409, description = "Email already registered", body = ActionFailure)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterInput>, JsonRejection>,
) -> ActionReply<Message> {
    actions::register(&state, payload).await.into()
}

/// login
///
/// [Public Route] Verifies credentials and sets the session cookie.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Signed in; session cookie set", body = LoggedIn),
        (status = 400, description = "Invalid input", body = ActionFailure),
        (status = 401, description = "Invalid email or password", body = ActionFailure)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> Response {
    match actions::login(&state, payload).await {
        Ok(outcome) => {
            let mut response = ActionReply(Ok(outcome.reply)).into_response();
            if let Some(cookie) = session_cookie(&outcome.token, &state.config) {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            response
        }
        Err(e) => ActionReply::<LoggedIn>(Err(e)).into_response(),
    }
}

/// logout
///
/// [Public Route] Expires the session cookie.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 200, description = "Signed out", body = Message))
)]
pub async fn logout(State(state): State<AppState>, viewer: Viewer) -> Response {
    let mut response = ActionReply(Ok(actions::logout(&viewer))).into_response();
    if let Some(cookie) = clear_session_cookie(&state.config) {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

/// create_post
///
/// [Authenticated Route] The author is always the caller.
#[utoipa::path(
    post,
    path = "/actions/posts",
    request_body = PostInput,
    responses(
        (status = 200, description = "Post created", body = PostSaved),
        (status = 400, description = "Invalid input", body = ActionFailure),
        (status = 401, description = "No session", body = ActionFailure),
        (status = 409, description = "Slug taken", body = ActionFailure)
    )
)]
pub async fn create_post(
    State(state): State<AppState>,
    viewer: Viewer,
    payload: Result<Json<PostInput>, JsonRejection>,
) -> ActionReply<PostSaved> {
    actions::create_post(&state, &viewer, payload).await.into()
}

/// update_post
///
/// [Authenticated Route] Owner or admin.
#[utoipa::path(
    put,
    path = "/actions/posts/{id}",
    params(("id" = String, Path, description = "Post ID")),
    request_body = PostInput,
    responses(
        (status = 200, description = "Post updated", body = PostSaved),
        (status = 400, description = "Invalid input", body = ActionFailure),
        (status = 401, description = "No session", body = ActionFailure),
        (status = 403, description = "Not the author", body = ActionFailure),
        (status = 404, description = "No such post", body = ActionFailure),
        (status = 409, description = "Slug taken", body = ActionFailure)
    )
)]
pub async fn update_post(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
    payload: Result<Json<PostInput>, JsonRejection>,
) -> ActionReply<PostSaved> {
    actions::update_post(&state, &viewer, &id, payload).await.into()
}

/// delete_post
///
/// [Authenticated Route] Owner or admin.
#[utoipa::path(
    delete,
    path = "/actions/posts/{id}",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post deleted", body = Message),
        (status = 401, description = "No session", body = ActionFailure),
        (status = 403, description = "Not the author", body = ActionFailure),
        (status = 404, description = "No such post", body = ActionFailure)
    )
)]
pub async fn delete_post(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> ActionReply<Message> {
    actions::delete_post(&state, &viewer, &id).await.into()
}

/// toggle_like
///
/// [Authenticated Route]
#[utoipa::path(
    post,
    path = "/actions/posts/{id}/like",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Like state after the toggle", body = LikeToggled),
        (status = 401, description = "No session", body = ActionFailure),
        (status = 404, description = "No such post", body = ActionFailure)
    )
)]
pub async fn toggle_like(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> ActionReply<LikeToggled> {
    actions::toggle_like(&state, &viewer, &id).await.into()
}

/// create_comment
///
/// [Authenticated Route] Top-level comment, or a reply when `parentId` is set.
#[utoipa::path(
    post,
    path = "/actions/comments",
    request_body = CommentInput,
    responses(
        (status = 200, description = "Comment added", body = CommentCreated),
        (status = 400, description = "Invalid input", body = ActionFailure),
        (status = 401, description = "No session", body = ActionFailure),
        (status = 404, description = "No such post or parent", body = ActionFailure)
    )
)]
pub async fn create_comment(
    State(state): State<AppState>,
    viewer: Viewer,
    payload: Result<Json<CommentInput>, JsonRejection>,
) -> ActionReply<CommentCreated> {
    actions::create_comment(&state, &viewer, payload).await.into()
}

/// delete_comment
///
/// [Authenticated Route] Comment author or admin.
#[utoipa::path(
    delete,
    path = "/actions/comments/{id}",
    params(("id" = String, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment deleted", body = Message),
        (status = 401, description = "No session", body = ActionFailure),
        (status = 403, description = "Not the author", body = ActionFailure),
        (status = 404, description = "No such comment", body = ActionFailure)
    )
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> ActionReply<Message> {
    actions::delete_comment(&state, &viewer, &id).await.into()
}
