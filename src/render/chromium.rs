//! Chromium engine over the DevTools protocol.
//!
//! Every session is its own browser process with a throwaway profile
//! directory, so cookies, storage and a hung renderer never leak between
//! requests.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, Headers,
    SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures_util::{stream, StreamExt};
use std::path::PathBuf;
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

use crate::config::RenderConfig;
use crate::render::engine::{BrowserEngine, BrowserSession};
use crate::render::types::{Readiness, RenderError, SessionProfile};

/// Launches headless Chromium processes.
#[derive(Debug, Clone, Default)]
pub struct ChromiumEngine {
    executable: Option<PathBuf>,
    disable_sandbox: bool,
}

impl ChromiumEngine {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            executable: config.chrome_executable.as_ref().map(PathBuf::from),
            disable_sandbox: config.disable_sandbox,
        }
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self, profile: &SessionProfile) -> Result<Box<dyn BrowserSession>, RenderError> {
        let profile_dir = std::env::temp_dir().join(format!("live-relay-{}", Uuid::new_v4()));

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&profile_dir)
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--lang={}", primary_language(&profile.accept_language)));
        if self.disable_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        if let Some(size) = profile.viewport {
            builder = builder.window_size(size.width, size.height).viewport(Viewport {
                width: size.width,
                height: size.height,
                ..Viewport::default()
            });
        }
        if let Some(egress) = &profile.egress {
            builder = builder.arg(format!("--proxy-server={}", egress.proxy_server()));
            if egress.credentials().is_some() {
                tracing::warn!(egress = %egress, "Chromium ignores proxy credentials; egress used unauthenticated");
            }
        }
        let config = builder.build().map_err(RenderError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let mut session = ChromiumSession {
            browser,
            handler_task,
            page: None,
            profile_dir,
        };

        let page = session
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        page.set_user_agent(user_agent_override(profile))
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        if !profile.headers.is_empty() {
            let headers: serde_json::Map<String, serde_json::Value> = profile
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
                .collect();
            page.execute(SetExtraHttpHeadersParams::new(Headers::new(
                serde_json::Value::Object(headers),
            )))
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;
        }

        session.page = Some(page);
        Ok(Box::new(session))
    }
}

fn user_agent_override(profile: &SessionProfile) -> SetUserAgentOverrideParams {
    let mut params = SetUserAgentOverrideParams::new(profile.user_agent.clone());
    params.accept_language = Some(profile.accept_language.clone());
    params
}

fn primary_language(accept_language: &str) -> &str {
    accept_language
        .split(',')
        .next()
        .map(|lang| lang.split(';').next().unwrap_or(lang).trim())
        .filter(|lang| !lang.is_empty())
        .unwrap_or("en-US")
}

struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Option<Page>,
    profile_dir: PathBuf,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &Url, readiness: Readiness) -> Result<(), RenderError> {
        let page = self.page.as_ref().ok_or(RenderError::Closed)?;
        let nav = |e: chromiumoxide::error::CdpError| RenderError::Navigation(e.to_string());

        match readiness {
            Readiness::MarkupParsed => {
                page.goto(url.as_str()).await.map_err(nav)?;
            }
            Readiness::NetworkQuiet(quiet) => {
                // Subscribe before navigating so early requests are observed.
                let sent = page.event_listener::<EventRequestWillBeSent>().await.map_err(nav)?;
                let finished = page.event_listener::<EventLoadingFinished>().await.map_err(nav)?;
                let failed = page.event_listener::<EventLoadingFailed>().await.map_err(nav)?;

                page.goto(url.as_str()).await.map_err(nav)?;

                let mut activity = Box::pin(stream::select(
                    stream::select(sent.map(|_| ()), finished.map(|_| ())),
                    failed.map(|_| ()),
                ));
                loop {
                    match tokio::time::timeout(quiet, activity.next()).await {
                        Ok(Some(())) => continue,
                        Ok(None) | Err(_) => break,
                    }
                }
            }
        }
        Ok(())
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        let page = self.page.as_ref().ok_or(RenderError::Closed)?;
        page.content()
            .await
            .map_err(|e| RenderError::Extraction(e.to_string()))
    }

    async fn close(self: Box<Self>) {
        let mut session = self;
        if let Some(page) = session.page.take() {
            let _ = page.close().await;
        }
        if let Err(e) = session.browser.close().await {
            tracing::debug!(error = %e, "Browser close command failed");
        }
        let _ = session.browser.wait().await;
        session.handler_task.abort();
        let _ = tokio::fs::remove_dir_all(&session.profile_dir).await;
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // The Browser's own drop kills a still-running process.
        self.handler_task.abort();
        let _ = std::fs::remove_dir_all(&self.profile_dir);
    }
}
