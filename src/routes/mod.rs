/// Router Module Index
///
/// The HTTP surface is split by who may reach it. The split mirrors the route
/// classifier's lists, but enforcement is not left to the split: the access gate
/// covers every request, and each guarded action checks the session itself.

/// Pages and actions open to everyone: the home page, post pages, the login and
/// register forms, and the health check.
pub mod public;

/// Pages that need a session, and the guarded mutations.
pub mod authenticated;

/// The moderation dashboard.
pub mod admin;
