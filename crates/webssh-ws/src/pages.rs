//! HTML pages
//!
//! The terminal page (xterm.js talking to `/ws`) and the connection config
//! form backed by the [`ConfigStore`](webssh_core::ConfigStore).

use std::sync::Arc;

use axum::{
    extract::{Form, State},
    response::{Html, IntoResponse},
};
use serde::Deserialize;
use tracing::{info, warn};
use webssh_core::{ConnectionConfig, Password, DEFAULT_SSH_PORT};

use crate::server::WsState;

/// Terminal page
pub async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

/// Show the config form
pub async fn show_config(State(state): State<Arc<WsState>>) -> impl IntoResponse {
    let config = state.config_store.load();
    Html(render_config_page(&config, None))
}

/// Config form fields, as submitted
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigForm {
    pub hostname: String,
    pub port: String,
    pub username: String,
    pub password: String,
    pub private_key_path: String,
}

impl ConfigForm {
    /// Build the config to save. A blank password keeps `current`'s password.
    pub fn into_config(self, current: &ConnectionConfig) -> Result<ConnectionConfig, String> {
        let port = match self.port.trim() {
            "" => DEFAULT_SSH_PORT,
            port => port
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| format!("Invalid port: {}", port))?,
        };

        let password = if self.password.is_empty() {
            current.password.clone()
        } else {
            Password::from(self.password)
        };

        let private_key_path = Some(self.private_key_path.trim().to_string())
            .filter(|p| !p.is_empty());

        Ok(ConnectionConfig {
            hostname: self.hostname.trim().to_string(),
            port,
            username: self.username.trim().to_string(),
            password,
            private_key_path,
        })
    }
}

/// Save the submitted config and re-render the form
pub async fn save_config(
    State(state): State<Arc<WsState>>,
    Form(form): Form<ConfigForm>,
) -> impl IntoResponse {
    let current = state.config_store.load();
    let message = match form.into_config(&current) {
        Ok(config) => {
            info!("Saving connection config for {}", config.target());
            if state.config_store.save(&config) {
                "Configuration saved successfully!".to_string()
            } else {
                "Error saving configuration!".to_string()
            }
        }
        Err(e) => {
            warn!("Rejected config form: {}", e);
            e
        }
    };

    let config = state.config_store.load();
    Html(render_config_page(&config, Some(&message)))
}

/// Escape text for HTML element content and attribute values
fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            // Keeps stored values from matching a later `{{placeholder}}`.
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            c => out.push(c),
        }
    }
    out
}

/// Render the config page. The stored password is never sent back.
pub fn render_config_page(config: &ConnectionConfig, message: Option<&str>) -> String {
    let message_html = message
        .map(|m| format!(r#"<p class="message">{}</p>"#, escape_html(m)))
        .unwrap_or_default();
    let password_hint = if config.password.is_empty() {
        "not set"
    } else {
        "set; leave blank to keep"
    };

    CONFIG_HTML
        .replace("{{message}}", &message_html)
        .replace("{{hostname}}", &escape_html(&config.hostname))
        .replace("{{port}}", &config.port.to_string())
        .replace("{{username}}", &escape_html(&config.username))
        .replace("{{password_hint}}", password_hint)
        .replace(
            "{{private_key_path}}",
            &escape_html(config.private_key_path.as_deref().unwrap_or("")),
        )
}

const CONFIG_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>webssh - Connection</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f5f5f5; color: #333; }
        .container { max-width: 480px; margin: 40px auto; background: white; padding: 24px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
        label { display: block; margin-top: 12px; font-size: 14px; color: #666; }
        input { width: 100%; padding: 8px; margin-top: 4px; box-sizing: border-box; }
        button { margin-top: 20px; padding: 8px 16px; }
        .message { padding: 8px; background: #eef6ee; border-left: 4px solid #4caf50; }
        .warning { font-size: 12px; color: #a00; }
    </style>
</head>
<body>
<div class="container">
    <h1>SSH Connection</h1>
    {{message}}
    <form method="post" action="/config">
        <label>Hostname <input name="hostname" value="{{hostname}}" required></label>
        <label>Port <input name="port" value="{{port}}" inputmode="numeric"></label>
        <label>Username <input name="username" value="{{username}}" required></label>
        <label>Password ({{password_hint}}) <input name="password" type="password" autocomplete="new-password"></label>
        <label>Private key path (optional) <input name="private_key_path" value="{{private_key_path}}"></label>
        <button type="submit">Save</button>
    </form>
    <p class="warning">The password is stored in plain text on the server.</p>
    <p><a href="/">Open terminal</a></p>
</div>
</body>
</html>
"#;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>webssh</title>
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/@xterm/xterm@5.5.0/css/xterm.css">
    <style>
        html, body { height: 100%; margin: 0; background: #000; }
        #bar { height: 24px; color: #ccc; font: 13px monospace; padding: 2px 8px; background: #222; }
        #bar a { color: #8cf; float: right; }
        #terminal { position: absolute; top: 28px; bottom: 0; left: 0; right: 0; }
    </style>
</head>
<body>
<div id="bar"><span id="status">Connecting...</span><a href="/config">config</a></div>
<div id="terminal"></div>
<script src="https://cdn.jsdelivr.net/npm/@xterm/xterm@5.5.0/lib/xterm.js"></script>
<script src="https://cdn.jsdelivr.net/npm/@xterm/addon-fit@0.10.0/lib/addon-fit.js"></script>
<script>
    const term = new Terminal({ cursorBlink: true });
    const fit = new FitAddon.FitAddon();
    term.loadAddon(fit);
    term.open(document.getElementById('terminal'));
    fit.fit();

    const status = document.getElementById('status');
    const proto = location.protocol === 'https:' ? 'wss://' : 'ws://';
    const ws = new WebSocket(proto + location.host + '/ws');
    ws.binaryType = 'arraybuffer';

    const send = (msg) => { if (ws.readyState === WebSocket.OPEN) ws.send(JSON.stringify(msg)); };
    const sendSize = () => send({ type: 'resize', cols: term.cols, rows: term.rows });

    ws.onopen = () => { sendSize(); term.focus(); };
    ws.onmessage = (event) => {
        if (event.data instanceof ArrayBuffer) {
            term.write(new Uint8Array(event.data));
            return;
        }
        const text = event.data;
        if (text.startsWith('{"type":"status"') || text.startsWith('{"type":"error"')) {
            try {
                const msg = JSON.parse(text);
                status.textContent = msg.data;
                if (msg.type === 'error') term.write('\r\n\x1b[31m' + msg.data + '\x1b[0m\r\n');
                return;
            } catch (e) { /* terminal output that looks like JSON */ }
        }
        term.write(text);
    };
    ws.onclose = () => {
        status.textContent += ' (disconnected)';
        term.write('\r\n\x1b[33mConnection closed.\x1b[0m\r\n');
    };

    term.onData((data) => send({ type: 'input', data: data }));
    window.addEventListener('resize', () => { fit.fit(); sendSize(); });
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn current() -> ConnectionConfig {
        ConnectionConfig {
            hostname: "old".to_string(),
            port: 22,
            username: "bob".to_string(),
            password: "stored".into(),
            private_key_path: None,
        }
    }

    fn form(port: &str, password: &str) -> ConfigForm {
        ConfigForm {
            hostname: "  box.local ".to_string(),
            port: port.to_string(),
            username: " alice".to_string(),
            password: password.to_string(),
            private_key_path: "  ".to_string(),
        }
    }

    #[test]
    fn test_form_trims_and_parses() {
        let config = form("2222", "new").into_config(&current()).unwrap();
        assert_eq!(config.hostname, "box.local");
        assert_eq!(config.username, "alice");
        assert_eq!(config.port, 2222);
        assert_eq!(config.password.expose(), "new");
        assert_eq!(config.private_key_path, None);
    }

    #[test]
    fn test_blank_port_defaults() {
        let config = form("", "x").into_config(&current()).unwrap();
        assert_eq!(config.port, 22);
    }

    #[test]
    fn test_invalid_port_rejected() {
        for port in ["ssh", "0", "70000", "-1"] {
            let err = form(port, "x").into_config(&current()).unwrap_err();
            assert!(err.starts_with("Invalid port"), "{}", port);
        }
    }

    #[test]
    fn test_blank_password_keeps_stored() {
        let config = form("22", "").into_config(&current()).unwrap();
        assert_eq!(config.password.expose(), "stored");
    }

    #[test]
    fn test_render_escapes_and_hides_password() {
        let config = ConnectionConfig {
            hostname: "<script>".to_string(),
            username: "a\"b".to_string(),
            password: "topsecret".into(),
            ..Default::default()
        };
        let html = render_config_page(&config, Some("Saved & done"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("a&quot;b"));
        assert!(html.contains("Saved &amp; done"));
        assert!(!html.contains("topsecret"));
        assert!(html.contains("set; leave blank to keep"));
    }

    #[test]
    fn test_render_placeholder_like_values_stay_literal() {
        let config = ConnectionConfig {
            hostname: "{{username}}".to_string(),
            port: 2222,
            username: "{{port}}".to_string(),
            ..Default::default()
        };
        let html = render_config_page(&config, Some("{{hostname}}"));
        assert!(html.contains(r#"value="&#123;&#123;username&#125;&#125;""#));
        assert!(html.contains(r#"value="&#123;&#123;port&#125;&#125;""#));
        assert!(html.contains(r#"value="2222""#));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_render_without_message() {
        let html = render_config_page(&ConnectionConfig::default(), None);
        assert!(!html.contains("{{"));
        assert!(!html.contains(r#"class="message""#));
        assert!(html.contains(r#"value="22""#));
    }
}
