use url::Url;

use crate::{
    credentials::MAX_PASSWORD_LENGTH,
    models::{CommentInput, Label, LoginInput, PostInput, RegisterInput},
};

/// Validate
///
/// A fixed schema per operation type. Rules are checked in field order and the
/// first violated rule's message is returned.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

fn min_chars(value: &str, min: usize, message: &str) -> Result<(), String> {
    if value.chars().count() < min {
        return Err(message.to_string());
    }
    Ok(())
}

fn password(value: &str) -> Result<(), String> {
    min_chars(value, 6, "Password must be at least 6 characters")?;
    if value.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters"
        ));
    }
    Ok(())
}

/// is_valid_email
///
/// Structural check only: a non-empty local part, a single `@`, and a dotted
/// domain without empty labels. Deliverability is not our concern.
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

fn email(value: &str) -> Result<(), String> {
    if is_valid_email(value) {
        Ok(())
    } else {
        Err("Invalid email address".to_string())
    }
}

impl Validate for LoginInput {
    fn validate(&self) -> Result<(), String> {
        email(&self.email)?;
        password(&self.password)
    }
}

impl Validate for RegisterInput {
    fn validate(&self) -> Result<(), String> {
        min_chars(&self.name, 2, "Name must be at least 2 characters")?;
        email(&self.email)?;
        password(&self.password)
    }
}

impl Validate for PostInput {
    fn validate(&self) -> Result<(), String> {
        min_chars(&self.title, 3, "Title must be at least 3 characters")?;
        min_chars(&self.slug, 3, "Slug must be at least 3 characters")?;
        min_chars(&self.content, 10, "Content must be at least 10 characters")?;
        if let Some(cover) = non_empty(&self.cover_image) {
            Url::parse(cover).map_err(|_| "Invalid image URL".to_string())?;
        }
        Ok(())
    }
}

impl Validate for CommentInput {
    fn validate(&self) -> Result<(), String> {
        min_chars(&self.content, 1, "Comment cannot be empty")
    }
}

/// non_empty
///
/// Optional form fields arrive as empty strings when the user leaves them blank.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|inner| !inner.is_empty())
}

/// slugify
///
/// Lower-cases and collapses every run of non-alphanumeric characters into a single
/// `-`, used to key categories and tags.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// normalize_labels
///
/// Turns raw category/tag strings into distinct labels keyed by slug, dropping
/// blanks and keeping first-seen order and spelling.
pub fn normalize_labels(labels: &[String]) -> Vec<Label> {
    let mut out: Vec<Label> = Vec::new();
    for label in labels {
        let slug = slugify(label);
        if !slug.is_empty() && !out.iter().any(|seen| seen.slug == slug) {
            out.push(Label {
                name: label.trim().to_string(),
                slug,
            });
        }
    }
    out
}
