//! nginx site generation

use crate::storage::layout::Layout;
use crate::storage::settings::Settings;

/// Cache lifetime for `/static`
pub const STATIC_EXPIRES: &str = "1d";

/// Generate the reverse-proxy site.
///
/// `/health` is proxied like everything else but kept out of the access log
/// so probes don't drown real traffic.
pub fn render_site(settings: &Settings, layout: &Layout) -> String {
    let upstream = format!("http://127.0.0.1:{}", settings.app_port);

    format!(
        r#"# Managed by apmdeploy; changes are overwritten on the next deploy.
server {{
    listen 80;
    listen [::]:80;
    server_name _;

    client_max_body_size 10m;

    location / {{
        proxy_pass {upstream};
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_connect_timeout 30s;
        proxy_send_timeout 30s;
        proxy_read_timeout 30s;
    }}

    location /health {{
        proxy_pass {upstream}/health;
        proxy_set_header Host $host;
        access_log off;
    }}

    location /static {{
        alias {static_dir};
        expires {expires};
        add_header Cache-Control "public";
    }}
}}
"#,
        upstream = upstream,
        static_dir = layout.real_static_dir().display(),
        expires = STATIC_EXPIRES,
    )
}
