use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;

use crate::automation::cdp::{CdpBrowser, Locator};
use crate::automation::AutomationClient;
use crate::config::{BrowserConfig, LinkedInConfig};
use crate::error::{AppError, Result};

const LOGIN_URL: &str = "https://www.linkedin.com/login";
const SEARCH_URL: &str = "https://www.linkedin.com/search/results/people/";

/// Path of the signed-in landing page.
const FEED_PATH: &str = "/feed";

/// Pause after clicking Connect so the invitation dialog can open.
const DIALOG_DELAY: Duration = Duration::from_secs(1);

/// How long the optional "Add a note" dialog gets to show up.
const NOTE_DIALOG_TIMEOUT: Duration = Duration::from_secs(3);

/// Collects profile links from a people-search result page.
const PROFILE_LINKS_JS: &str =
    "Array.from(document.querySelectorAll(\"a[href*='linkedin.com/in/']\")).map(a => a.href)";

/// LinkedIn flows on top of a DevTools-driven browser.
pub struct LinkedInBrowser {
    browser: CdpBrowser,
    credentials: LinkedInConfig,
    login_timeout: Duration,
    action_timeout: Duration,
}

impl LinkedInBrowser {
    pub async fn launch(credentials: &LinkedInConfig, config: &BrowserConfig) -> Result<Self> {
        let browser = CdpBrowser::launch(config).await?;
        Ok(Self {
            browser,
            credentials: credentials.clone(),
            login_timeout: Duration::from_secs(config.login_timeout_secs),
            action_timeout: Duration::from_secs(config.action_timeout_secs),
        })
    }

    async fn try_login(&self) -> Result<()> {
        self.browser.navigate(LOGIN_URL, self.login_timeout).await?;

        // A persistent profile may still hold a session; LinkedIn then
        // redirects the login page straight to the feed.
        if self.browser.current_url().await?.contains(FEED_PATH) {
            tracing::info!("Already signed in");
            return Ok(());
        }

        let username = Locator::css("input#username");
        self.browser.wait_for(&username, self.action_timeout).await?;
        self.browser.fill(&username, &self.credentials.email).await?;
        self.browser
            .fill(&Locator::css("input#password"), &self.credentials.password)
            .await?;
        self.browser
            .click(&Locator::css("button[type='submit']"))
            .await?;

        match self
            .browser
            .wait_until(
                "window.location.href.includes('/feed')",
                self.login_timeout,
                "the LinkedIn feed",
            )
            .await
        {
            Ok(()) => {
                tracing::info!("Login successful");
                Ok(())
            }
            Err(AppError::Timeout { .. }) => {
                let url = self.browser.current_url().await.unwrap_or_default();
                Err(AppError::Authentication(format!(
                    "did not reach the feed (stuck at {url}); check credentials or 2FA settings"
                )))
            }
            Err(e) => Err(e),
        }
    }

    async fn try_connect(&self, target: &str, note: &str) -> Result<bool> {
        self.browser.navigate(target, self.action_timeout).await?;

        let connect = Locator::button("Connect");
        match self.browser.wait_for(&connect, self.action_timeout).await {
            Ok(()) => {}
            Err(AppError::Timeout { .. }) => {
                tracing::info!(profile = target, "No Connect button; already connected or unavailable");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
        self.browser.click(&connect).await?;

        tokio::time::sleep(DIALOG_DELAY).await;

        // LinkedIn sometimes sends the invitation straight away without a dialog.
        if let Err(e) = self.add_note(note).await {
            tracing::debug!(profile = target, error = %e, "Invitation sent without a note");
        }

        Ok(true)
    }

    async fn add_note(&self, note: &str) -> Result<()> {
        self.browser
            .wait_and_click(&Locator::button("Add a note"), NOTE_DIALOG_TIMEOUT)
            .await?;
        if !note.is_empty() {
            self.browser
                .fill(&Locator::css("textarea[name='message']"), note)
                .await?;
        }
        self.browser.click(&Locator::button("Send")).await
    }

    async fn try_send_message(&self, target: &str, text: &str) -> Result<()> {
        self.browser.navigate(target, self.action_timeout).await?;
        self.browser
            .wait_and_click(
                &Locator::css("button.message-anywhere-button"),
                self.action_timeout,
            )
            .await?;

        let composer = Locator::css("div.msg-form__contenteditable");
        self.browser.wait_for(&composer, self.action_timeout).await?;
        self.browser.fill(&composer, text).await?;
        self.browser
            .click(&Locator::css("button.msg-form__send-button"))
            .await
    }
}

#[async_trait]
impl AutomationClient for LinkedInBrowser {
    async fn login(&self) -> Result<()> {
        tracing::info!(email = %self.credentials.email, "Logging into LinkedIn");

        match self.try_login().await {
            Ok(()) => Ok(()),
            Err(e @ AppError::Authentication(_)) => Err(e),
            Err(e) => Err(AppError::Authentication(format!("login flow failed: {e}"))),
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let url = search_url(query);
        tracing::info!(query = query, limit = limit, "Searching profiles");

        self.browser.navigate(&url, self.action_timeout).await?;
        self.browser
            .wait_for(
                &Locator::css("div.search-results-container"),
                self.action_timeout,
            )
            .await?;

        let hrefs = self.browser.evaluate(PROFILE_LINKS_JS).await?;
        let hrefs = hrefs
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let profiles = profile_urls(hrefs, limit);
        tracing::info!(found = profiles.len(), "Search complete");
        Ok(profiles)
    }

    async fn connect(&self, target: &str, note: &str) -> Result<bool> {
        self.try_connect(target, note).await
    }

    async fn send_message(&self, target: &str, text: &str) -> Result<bool> {
        match self.try_send_message(target, text).await {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::debug!(profile = target, error = %e, "Message flow did not complete");
                Ok(false)
            }
        }
    }

    async fn shutdown(&self) -> Result<()> {
        self.browser.close().await
    }
}

fn search_url(query: &str) -> String {
    format!(
        "{SEARCH_URL}?keywords={}&origin=GLOBAL_SEARCH_HEADER",
        urlencoding::encode(query)
    )
}

/// Normalize profile links (drop query and fragment), de-duplicate, cap at `limit`.
fn profile_urls(hrefs: Vec<String>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    hrefs
        .into_iter()
        .map(|href| {
            let end = href.find(['?', '#']).unwrap_or(href.len());
            let mut url = href[..end].to_string();
            if !url.ends_with('/') {
                url.push('/');
            }
            url
        })
        .filter(|url| url.contains("/in/") && seen.insert(url.clone()))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::testing::{FakeDevTools, FakePage, FEED_URL};

    const PROFILE: &str = "https://www.linkedin.com/in/jane-doe/";

    fn credentials() -> LinkedInConfig {
        LinkedInConfig {
            email: "rep@example.com".to_string(),
            password: "hunter2".to_string(),
        }
    }

    fn login_form() -> FakePage {
        FakePage::with_elements(&["input#username", "input#password", "button[type='submit']"])
    }

    async fn client_for(devtools: &FakeDevTools) -> LinkedInBrowser {
        LinkedInBrowser::launch(&credentials(), &devtools.browser_config())
            .await
            .unwrap()
    }

    fn evaluations(devtools: &FakeDevTools) -> usize {
        devtools
            .methods()
            .iter()
            .filter(|m| m.as_str() == "Runtime.evaluate")
            .count()
    }

    #[tokio::test]
    async fn test_login_with_existing_session_skips_form() {
        let devtools = FakeDevTools::start(FakePage {
            signed_in: true,
            ..FakePage::with_elements(&[])
        })
        .await;
        let client = client_for(&devtools).await;

        client.login().await.unwrap();

        // Page load check and the URL read; no form interaction.
        assert_eq!(evaluations(&devtools), 2);
    }

    #[tokio::test]
    async fn test_login_submits_form_and_waits_for_feed() {
        let devtools = FakeDevTools::start(FakePage {
            accept_login: true,
            feed_errors: 1,
            ..login_form()
        })
        .await;
        let client = client_for(&devtools).await;

        client.login().await.unwrap();

        assert_eq!(devtools.page.lock().unwrap().url, FEED_URL);
    }

    #[tokio::test]
    async fn test_login_rejected_is_authentication_error() {
        let devtools = FakeDevTools::start(login_form()).await;
        let client = client_for(&devtools).await;

        let err = client.login().await.unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
        assert!(err.to_string().contains("stuck at https://www.linkedin.com/login"));
    }

    #[tokio::test]
    async fn test_login_without_form_is_authentication_error() {
        let devtools = FakeDevTools::start(FakePage::with_elements(&[])).await;
        let client = client_for(&devtools).await;

        let err = client.login().await.unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
        assert!(err.to_string().contains("input#username"));
    }

    #[tokio::test]
    async fn test_search_collects_profile_links() {
        let devtools = FakeDevTools::start(FakePage {
            links: vec![
                "https://www.linkedin.com/in/jane-doe?trk=x".to_string(),
                "https://www.linkedin.com/in/jane-doe/".to_string(),
                "https://www.linkedin.com/in/john-roe/".to_string(),
            ],
            ..FakePage::with_elements(&["div.search-results-container"])
        })
        .await;
        let client = client_for(&devtools).await;

        let profiles = client.search("cardiologist", 10).await.unwrap();

        assert_eq!(
            profiles,
            vec![PROFILE.to_string(), "https://www.linkedin.com/in/john-roe/".to_string()]
        );
        assert!(devtools
            .page
            .lock()
            .unwrap()
            .url
            .starts_with("https://www.linkedin.com/search/results/people/?keywords=cardiologist"));
    }

    #[tokio::test]
    async fn test_connect_without_button_returns_false() {
        let devtools = FakeDevTools::start(FakePage::with_elements(&[])).await;
        let client = client_for(&devtools).await;

        assert!(!client.connect(PROFILE, "Hi Jane").await.unwrap());
    }

    #[tokio::test]
    async fn test_connect_sends_invitation_with_note() {
        let devtools = FakeDevTools::start(FakePage::with_elements(&[
            "connect",
            "add a note",
            "textarea[name='message']",
            "send",
        ]))
        .await;
        let client = client_for(&devtools).await;

        assert!(client.connect(PROFILE, "Hi Jane").await.unwrap());
        assert_eq!(devtools.page.lock().unwrap().url, PROFILE);
    }

    #[tokio::test]
    async fn test_connect_propagates_navigation_failure() {
        let devtools = FakeDevTools::start(FakePage {
            fail_navigation: true,
            ..FakePage::with_elements(&["connect"])
        })
        .await;
        let client = client_for(&devtools).await;

        let err = client.connect(PROFILE, "Hi Jane").await.unwrap_err();
        assert!(matches!(err, AppError::Automation(_)));
    }

    #[tokio::test]
    async fn test_send_message_without_message_button_returns_false() {
        let devtools = FakeDevTools::start(FakePage::with_elements(&[])).await;
        let client = client_for(&devtools).await;

        assert!(!client.send_message(PROFILE, "Hello").await.unwrap());
    }

    #[tokio::test]
    async fn test_send_message_completes_flow() {
        let devtools = FakeDevTools::start(FakePage::with_elements(&[
            "button.message-anywhere-button",
            "div.msg-form__contenteditable",
            "button.msg-form__send-button",
        ]))
        .await;
        let client = client_for(&devtools).await;

        assert!(client.send_message(PROFILE, "Hello").await.unwrap());
    }

    #[test]
    fn test_search_url_encodes_query() {
        assert_eq!(
            search_url("solo health professional"),
            "https://www.linkedin.com/search/results/people/?keywords=solo%20health%20professional&origin=GLOBAL_SEARCH_HEADER"
        );
    }

    #[test]
    fn test_profile_urls_normalizes_and_dedups() {
        let hrefs = vec![
            "https://www.linkedin.com/in/jane-doe?miniProfileUrn=urn%3Ali".to_string(),
            "https://www.linkedin.com/in/jane-doe/".to_string(),
            "https://www.linkedin.com/in/john-roe/#about".to_string(),
            "https://www.linkedin.com/company/acme/".to_string(),
        ];
        assert_eq!(
            profile_urls(hrefs, 10),
            vec![
                "https://www.linkedin.com/in/jane-doe/".to_string(),
                "https://www.linkedin.com/in/john-roe/".to_string(),
            ]
        );
    }

    #[test]
    fn test_profile_urls_respects_limit() {
        let hrefs = (0..20)
            .map(|i| format!("https://www.linkedin.com/in/p{i}/"))
            .collect();
        assert_eq!(profile_urls(hrefs, 10).len(), 10);
    }
}
