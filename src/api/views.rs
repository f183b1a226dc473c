//! HTML views
//!
//! Every page shares one layout with a navigation bar that reflects
//! whether a user is signed in.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::auth::UserProfile;

fn nav(user: Option<&UserProfile>) -> String {
    match user {
        Some(user) => format!(
            r#"<a href="/">Home</a> | <a href="/account">Account</a> | <span>{}</span> | <a href="/logout">Log Out</a>"#,
            encode_text(user.label())
        ),
        None => r#"<a href="/">Home</a> | <a href="/login">Log In</a>"#.to_string(),
    }
}

/// Wrap page content in the shared layout
pub fn layout(title: &str, user: Option<&UserProfile>, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title} - Gatekeeper</title>
    <link rel="stylesheet" href="/style.css">
</head>
<body>
    <nav>{nav}</nav>
    <main>
{content}
    </main>
</body>
</html>
"#,
        title = encode_text(title),
        nav = nav(user),
        content = content,
    )
}

/// Home page
pub fn index(user: Option<&UserProfile>) -> String {
    let content = match user {
        Some(user) => format!(
            "        <h1>Welcome back, {}</h1>\n        <p>You are signed in with GitHub.</p>",
            encode_text(user.label())
        ),
        None => "        <h1>Welcome</h1>\n        <p>Sign in with GitHub to see your account.</p>"
            .to_string(),
    };
    layout("Home", user, &content)
}

/// Login page
pub fn login(user: Option<&UserProfile>) -> String {
    let content = match user {
        Some(user) => format!(
            "        <p>Already signed in as {}.</p>",
            encode_text(user.label())
        ),
        None => r#"        <h1>Log In</h1>
        <p><a href="/auth/github">Sign in with GitHub</a></p>"#
            .to_string(),
    };
    layout("Log In", user, &content)
}

/// Account page for the signed-in user
pub fn account(user: &UserProfile) -> String {
    let mut content = String::from("        <h1>Account</h1>\n");

    if let Some(avatar_url) = &user.avatar_url {
        content.push_str(&format!(
            "        <img class=\"avatar\" src=\"{}\" alt=\"avatar\">\n",
            encode_double_quoted_attribute(avatar_url)
        ));
    }

    content.push_str("        <dl>\n");
    let mut field = |label: &str, value: &str| {
        content.push_str(&format!(
            "            <dt>{}</dt><dd>{}</dd>\n",
            label,
            encode_text(value)
        ));
    };
    field("ID", &user.id);
    if let Some(username) = &user.username {
        field("Username", username);
    }
    if let Some(display_name) = &user.display_name {
        field("Name", display_name);
    }
    if let Some(email) = user.emails.first() {
        field("Email", email);
    }
    if !user.provider.is_empty() {
        field("Provider", &user.provider);
    }
    content.push_str("        </dl>");

    if let Some(profile_url) = &user.profile_url {
        content.push_str(&format!(
            "\n        <p><a href=\"{}\">View profile</a></p>",
            encode_double_quoted_attribute(profile_url)
        ));
    }

    layout("Account", Some(user), &content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_varies_with_user() {
        let anonymous = index(None);
        assert!(anonymous.contains("Log In"));
        assert!(!anonymous.contains("Log Out"));

        let mut user = UserProfile::new("42");
        user.username = Some("octocat".to_string());
        let signed_in = index(Some(&user));
        assert!(signed_in.contains("Welcome back, octocat"));
        assert!(signed_in.contains(r#"href="/logout""#));
    }

    #[test]
    fn test_login_links_to_provider() {
        assert!(login(None).contains(r#"href="/auth/github""#));
    }

    #[test]
    fn test_account_escapes_profile_fields() {
        let mut user = UserProfile::new("42");
        user.display_name = Some("<script>alert(1)</script>".to_string());
        user.avatar_url = Some(r#"https://example.com/a.png" onerror="x"#.to_string());

        let html = account(&user);
        assert!(html.contains("<dd>42</dd>"));
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains(r#"" onerror=""#));
    }
}
