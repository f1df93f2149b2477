//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::HashMap;

use omnilogin::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const SESSION_SECRET: &str = "test-secret-key-32-bytes-long!!!";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a test server with only the developer strategy enabled
    pub async fn new() -> Self {
        Self::with_github(None).await
    }

    /// Create a test server, optionally with the GitHub strategy
    pub async fn with_github(github: Option<config::GitHubOAuthConfig>) -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                domain: "localhost".to_string(),
                protocol: "http".to_string(),
            },
            database: config::DatabaseConfig { path: db_path },
            auth: config::AuthConfig {
                session_secret: SESSION_SECRET.to_string(),
                session_max_age: 604800,
                developer: config::DeveloperProviderConfig { enabled: true },
                github,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let state = AppState::new(config).await.unwrap();

        // Redirects stay visible to the tests
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = omnilogin::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// GET with the browser's cookies, recording any cookie changes
    pub async fn get(&self, browser: &mut Browser, path: &str) -> reqwest::Response {
        let response = self
            .client
            .get(self.url(path))
            .header("Cookie", browser.cookie_header())
            .send()
            .await
            .unwrap();
        browser.absorb(&response);
        response
    }

    /// POST a form with the browser's cookies
    pub async fn post_form(
        &self,
        browser: &mut Browser,
        path: &str,
        form: &[(&str, &str)],
    ) -> reqwest::Response {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        let response = self
            .client
            .post(self.url(path))
            .header("Cookie", browser.cookie_header())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .unwrap();
        browser.absorb(&response);
        response
    }

    /// Log in through the developer strategy and return the browser
    pub async fn developer_login(&self, form: &[(&str, &str)]) -> Browser {
        let mut browser = Browser::default();
        let response = self
            .post_form(&mut browser, "/auth/developer/callback", form)
            .await;
        assert!(
            response.status().is_redirection(),
            "login failed with {}",
            response.status()
        );
        browser
    }
}

/// Minimal cookie store standing in for a browser
#[derive(Debug, Default, Clone)]
pub struct Browser {
    cookies: HashMap<String, String>,
}

impl Browser {
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Apply `Set-Cookie` headers; removal cookies delete the entry
    pub fn absorb(&mut self, response: &reqwest::Response) {
        for header in response.headers().get_all("set-cookie") {
            let Ok(header) = header.to_str() else {
                continue;
            };
            let pair = header.split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let removed = value.is_empty() || header.to_ascii_lowercase().contains("max-age=0");
            if removed {
                self.cookies.remove(name.trim());
            } else {
                self.cookies
                    .insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }
}

/// Location header of a redirect
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}
