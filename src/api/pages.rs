//! HTML pages

use html_escape::encode_text;

use crate::data::User;

/// Human-readable provider label
fn provider_label(provider: &str) -> &str {
    match provider {
        "github" => "GitHub",
        "developer" => "Developer",
        other => other,
    }
}

/// Login chooser page
pub fn login_chooser(notice: Option<&str>, user: Option<&User>, providers: &[&str]) -> String {
    let notice_html = notice
        .map(|notice| format!(r#"<p class="notice">{}</p>"#, encode_text(notice)))
        .unwrap_or_default();

    let account_html = match user {
        Some(user) => format!(
            r#"<p>Signed in as <strong>{}</strong>. <a href="/logout">Sign out</a></p>"#,
            encode_text(&user.name)
        ),
        None => "<p>You are not signed in.</p>".to_string(),
    };

    let provider_links: String = providers
        .iter()
        .map(|provider| {
            format!(
                r#"<li><a href="/auth/{provider}">Sign in with {}</a></li>"#,
                provider_label(provider)
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Sign In - Omnilogin</title></head>
<body>
    <h1>Omnilogin</h1>
    {notice_html}
    {account_html}
    <ul>{provider_links}</ul>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_user_supplied_text() {
        let user = User::new("<script>alert(1)</script>");
        let page = login_chooser(Some("Hi & bye"), Some(&user), &[]);

        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("Hi &amp; bye"));
    }

    #[test]
    fn lists_enabled_providers() {
        let page = login_chooser(None, None, &["github", "developer"]);

        assert!(page.contains(r#"href="/auth/github""#));
        assert!(page.contains("Sign in with GitHub"));
        assert!(page.contains(r#"href="/auth/developer""#));
        assert!(page.contains("You are not signed in."));
    }
}
