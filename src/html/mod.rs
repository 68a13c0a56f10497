//! Server-rendered HTML pages
//!
//! Every dynamic value goes through `html_escape` before it reaches markup.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::auth::FlashKind;
use crate::upload::HistoryEntry;

const SITE_NAME: &str = "imgden";

/// Flash message to show at the top of a page
pub type Flash = Option<(FlashKind, String)>;

fn layout(title: &str, username: Option<&str>, flash: &Flash, body: &str) -> String {
    let nav = match username {
        Some(name) => format!(
            r#"<span class="who">{}</span> <a href="/logout">Log out</a>"#,
            encode_text(name)
        ),
        None => r#"<a href="/login">Log in</a> <a href="/register">Register</a>"#.to_string(),
    };

    let flash_html = match flash {
        Some((kind, message)) => format!(
            r#"<div class="alert alert-{}">{}</div>"#,
            kind.as_str(),
            encode_text(message)
        ),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} - {site}</title>
<link rel="stylesheet" href="/css/style.css">
</head>
<body>
<header><a class="brand" href="/">{site}</a><nav>{nav}</nav></header>
<main>
{flash_html}
{body}
</main>
</body>
</html>
"#,
        title = encode_text(title),
        site = SITE_NAME,
        nav = nav,
        flash_html = flash_html,
        body = body,
    )
}

/// Login form
pub fn login_page(flash: &Flash) -> String {
    let body = r#"<h1>Log in</h1>
<form method="post" action="/login" class="card">
<label>Username or email <input name="username" autocomplete="username" required></label>
<label>Password <input type="password" name="password" autocomplete="current-password" required></label>
<button type="submit">Log in</button>
</form>
<p>No account yet? <a href="/register">Register</a></p>"#;
    layout("Log in", None, flash, body)
}

/// Registration form
pub fn register_page(flash: &Flash) -> String {
    let body = r#"<h1>Register</h1>
<form method="post" action="/register" class="card">
<label>Username <input name="username" autocomplete="username" required></label>
<label>Email <input type="email" name="email" autocomplete="email" required></label>
<label>Password <input type="password" name="password" autocomplete="new-password" minlength="6" required></label>
<label>Confirm password <input type="password" name="password2" autocomplete="new-password" minlength="6" required></label>
<button type="submit">Register</button>
</form>
<p>Already registered? <a href="/login">Log in</a></p>"#;
    layout("Register", None, flash, body)
}

/// Upload page with the user's history
pub fn index_page(username: &str, uploads: &[HistoryEntry], max_bytes: usize, flash: &Flash) -> String {
    let history = if uploads.is_empty() {
        r#"<p class="empty">Nothing uploaded yet.</p>"#.to_string()
    } else {
        let items: String = uploads
            .iter()
            .map(|entry| {
                let share = entry
                    .short_id
                    .as_deref()
                    .map(|id| {
                        format!(
                            r#" <a class="share" href="/s/{}">share</a>"#,
                            encode_double_quoted_attribute(id)
                        )
                    })
                    .unwrap_or_default();
                format!(
                    r#"<li><img src="{url}" alt="" loading="lazy" data-url="{url}"><span class="date">{date}</span>{share}</li>"#,
                    url = encode_double_quoted_attribute(&entry.url),
                    date = encode_text(&entry.uploaded_at),
                    share = share,
                )
            })
            .collect();
        format!(r#"<ul class="history">{}</ul>"#, items)
    };

    let body = format!(
        r#"<h1>Upload an image</h1>
<section class="card" id="uploader" data-max-bytes="{max_bytes}">
<input type="file" id="fileInput" accept=".jpg,.jpeg,.png,.gif,image/*">
<p id="selectedFile" class="hidden"></p>
<button id="uploadBtn" disabled>Upload</button>
<p id="status" class="hidden"></p>
<div id="result" class="hidden">
<img id="imagePreview" alt="">
<code id="imageUrl"></code>
<code id="imageMarkdown"></code>
</div>
</section>
<h2>Your uploads</h2>
{history}
<script src="/js/upload.js"></script>"#,
        max_bytes = max_bytes,
        history = history,
    );

    layout("Upload", Some(username), flash, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_is_escaped() {
        let page = index_page("<script>alert(1)</script>", &[], 1024, &None);
        assert!(!page.contains("<script>alert(1)</script>"));
        assert!(page.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_flash_is_rendered() {
        let flash = Some((FlashKind::Error, "Invalid username or password".to_string()));
        let page = login_page(&flash);
        assert!(page.contains("alert-error"));
        assert!(page.contains("Invalid username or password"));
    }

    #[test]
    fn test_history_lists_urls_and_share_links() {
        let uploads = vec![HistoryEntry {
            key: "abc.png".to_string(),
            url: "https://img.example.com/abc.png".to_string(),
            short_id: Some("Zx81kQp0aa".to_string()),
            uploaded_at: "2026-01-01T00:00:00.000000Z".to_string(),
        }];
        let page = index_page("alice", &uploads, 1024, &None);
        assert!(page.contains("https://img.example.com/abc.png"));
        assert!(page.contains("/s/Zx81kQp0aa"));
        assert!(!page.contains("Nothing uploaded yet"));
    }
}
