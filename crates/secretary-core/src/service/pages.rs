//! HTML pages rendered by the OAuth callback.

use crate::util::escape_html;

fn page(title: &str, icon: &str, heading: &str, color: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>
        body {{
            margin: 0;
            min-height: 100vh;
            display: flex;
            justify-content: center;
            align-items: center;
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Arial, sans-serif;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
        }}
        .container {{
            text-align: center;
            padding: 3rem;
            background-color: white;
            border-radius: 20px;
            box-shadow: 0 10px 40px rgba(0, 0, 0, 0.2);
            max-width: 500px;
        }}
        h1 {{ color: {color}; margin: 0 0 1rem 0; font-size: 2rem; }}
        p {{ color: #555; font-size: 1.1rem; line-height: 1.6; margin: 1rem 0; }}
        .icon {{ font-size: 4rem; margin-bottom: 1rem; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="icon">{icon}</div>
        <h1>{heading}</h1>
        {body}
    </div>
</body>
</html>"#
    )
}

pub fn success_page() -> String {
    page(
        "認証完了",
        "✅",
        "認証完了！",
        "#28a745",
        "<p>Google Calendar との連携が完了しました。</p>\n        <p>LINEに戻って、再度カレンダー操作をお試しください。</p>",
    )
}

pub fn missing_session_page() -> String {
    page(
        "エラー",
        "❌",
        "エラー",
        "#dc3545",
        "<p>session_id パラメータが見つかりません。</p>",
    )
}

pub fn not_found_page() -> String {
    page(
        "エラー",
        "❌",
        "セッションが見つかりません",
        "#dc3545",
        "<p>セッションが期限切れか、無効です。</p>\n        <p>LINEに戻って再度お試しください。</p>",
    )
}

/// `detail` is escaped before it is embedded.
pub fn error_page(detail: &str) -> String {
    page(
        "エラー",
        "❌",
        "認証エラー",
        "#dc3545",
        &format!(
            "<p>認証処理中にエラーが発生しました。</p>\n        <p><code>{}</code></p>",
            escape_html(detail)
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_page_escapes_detail() {
        let html = error_page("<script>alert(1)</script>");
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_pages_render() {
        assert!(success_page().contains("認証完了！"));
        assert!(not_found_page().contains("セッションが見つかりません"));
        assert!(missing_session_page().contains("session_id"));
    }
}
