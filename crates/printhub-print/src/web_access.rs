// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client for the printer's embedded web management console.
//
// Head cleaning is only exposed through the console's HTML forms, so we
// drive it the way a browser would.  The sequence is strictly linear and
// every step consumes the CSRF token scraped from the previous response:
//
//   1. POST /home/status.html                        login, yields AuthCookie
//   2. GET  /general/head_cleaning.html              token `CSRFToken<type>`
//   3. POST /general/head_cleaning_confirm.html      token `CSRFToken3`
//   4. POST /general/head_cleaning_confirm.html?pc=12 token `CSRFToken2`
//   5. POST /general/head_cleaning.html (btn_def=14) success marker
//
// Nothing is retried.  A failed step leaves no client-side state behind; the
// printer's own page flow owns any partial progress.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::redirect::Policy;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use printhub_core::types::CleaningType;

use crate::csrf::{RegexTokenExtractor, TokenExtractor};

// ---------------------------------------------------------------------------
// Console paths and markers
// ---------------------------------------------------------------------------

/// Login form target; also echoed back as the post-login redirect.
pub const LOGIN_PATH: &str = "/home/status.html";

/// Password field name used by the login form.
const PASSWORD_FIELD: &str = "B16f";

/// Head-cleaning page: source of the initial token and target of the final
/// refresh post.
pub const CLEANING_PAGE_PATH: &str = "/general/head_cleaning.html";

/// Confirmation page for steps 3 and 4.
pub const CLEANING_CONFIRM_PATH: &str = "/general/head_cleaning_confirm.html";

/// Query selecting the second confirmation view.
const CONFIRM_VARIANT_QUERY: &str = "?pc=12";

/// Token element emitted by the first confirmation page.  The firmware
/// appears to number these positionally per page.
pub const INITIATE_NEXT_TOKEN_ID: &str = "CSRFToken3";

/// Token element emitted by the second confirmation page.
pub const CONFIRM_NEXT_TOKEN_ID: &str = "CSRFToken2";

/// `btn_def` value of the final refresh button.
pub const REFRESH_BUTTON: u8 = 14;

/// Literal the console renders once the cleaning cycle is accepted.
pub const SUCCESS_MARKER: &str = r#"<div class="postSuccess">Accepted.</div>"#;

const AUTH_COOKIE_PREFIX: &str = "AuthCookie=";

// ---------------------------------------------------------------------------
// Session values
// ---------------------------------------------------------------------------

/// The console's `AuthCookie` session value.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie(String);

impl SessionCookie {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }

    /// Value for the `Cookie` request header.
    pub fn header_value(&self) -> String {
        format!("{AUTH_COOKIE_PREFIX}{}", self.0)
    }
}

impl std::fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionCookie(<redacted>)")
    }
}

/// A single-use anti-forgery token scraped from a console page.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CsrfToken(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Position in the head-cleaning sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleaningStep {
    Authenticate,
    FetchToken,
    Initiate,
    Confirm,
    Finalize,
}

impl std::fmt::Display for CleaningStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Authenticate => "authenticate",
            Self::FetchToken => "fetch initial token",
            Self::Initiate => "initiate cleaning",
            Self::Confirm => "confirm cleaning",
            Self::Finalize => "finalize cleaning",
        };
        f.write_str(name)
    }
}

/// Why a maintenance sequence stopped.
#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error("printer login did not return an AuthCookie")]
    AuthFailure,

    #[error("CSRF token `{element_id}` missing from the {step} response")]
    TokenNotFound {
        step: CleaningStep,
        element_id: String,
    },

    #[error("printer did not accept the head cleaning request")]
    ActionRejected,

    #[error("{step} request failed: {source}")]
    Transport {
        step: CleaningStep,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid printer base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),
}

impl MaintenanceError {
    /// The step that failed, if the sequence had started.
    pub fn step(&self) -> Option<CleaningStep> {
        match self {
            Self::AuthFailure => Some(CleaningStep::Authenticate),
            Self::TokenNotFound { step, .. } | Self::Transport { step, .. } => Some(*step),
            Self::ActionRejected => Some(CleaningStep::Finalize),
            Self::InvalidBaseUrl(_) | Self::Client(_) => None,
        }
    }
}

fn transport(step: CleaningStep) -> impl FnOnce(reqwest::Error) -> MaintenanceError {
    move |source| {
        warn!(%step, error = %source, "printer console request failed");
        MaintenanceError::Transport { step, source }
    }
}

// ---------------------------------------------------------------------------
// PrinterWebClient
// ---------------------------------------------------------------------------

/// Drives the printer's management console over HTTP.
///
/// Holds no session state of its own: the cookie returned by
/// [`authenticate`](Self::authenticate) is passed explicitly to every later
/// step, and the caller must not run overlapping sequences against one
/// printer.
#[derive(Clone)]
pub struct PrinterWebClient {
    base_url: String,
    /// Follows redirects, for ordinary page loads and form posts.
    client: Client,
    /// Never follows redirects; the login answer is a redirect carrying the
    /// session cookie.
    login_client: Client,
    extractor: Arc<dyn TokenExtractor>,
}

impl PrinterWebClient {
    /// Create a client for the console at `base_url` (e.g. `http://192.168.1.50`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MaintenanceError> {
        let base = base_url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(MaintenanceError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(MaintenanceError::Client)?;
        let login_client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(MaintenanceError::Client)?;

        Ok(Self {
            base_url: base.to_string(),
            client,
            login_client,
            extractor: Arc::new(RegexTokenExtractor),
        })
    }

    /// Swap the token scraping strategy (e.g. for another firmware's markup).
    pub fn with_extractor(mut self, extractor: Arc<dyn TokenExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Step 1: log in and return the session cookie.
    ///
    /// `Ok(None)` means the console answered but issued no `AuthCookie`
    /// (typically a wrong password).
    #[instrument(skip(self, password), fields(base = %self.base_url))]
    pub async fn authenticate(&self, password: &str) -> Result<Option<SessionCookie>, MaintenanceError> {
        let step = CleaningStep::Authenticate;
        let response = self
            .login_client
            .post(self.url(LOGIN_PATH))
            .form(&[(PASSWORD_FIELD, password), ("loginurl", LOGIN_PATH)])
            .send()
            .await
            .map_err(transport(step))?
            .error_for_status()
            .map_err(transport(step))?;

        let status = response.status();
        let cookie = parse_auth_cookie(
            response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        );

        match &cookie {
            Some(_) => info!(%status, "authenticated with printer console"),
            None => warn!(%status, "printer console issued no AuthCookie"),
        }
        Ok(cookie)
    }

    /// Step 2: load `page_path` and scrape the token attached to `element_id`.
    #[instrument(skip(self, session), fields(base = %self.base_url))]
    pub async fn fetch_token(
        &self,
        session: &SessionCookie,
        page_path: &str,
        element_id: &str,
    ) -> Result<Option<CsrfToken>, MaintenanceError> {
        let step = CleaningStep::FetchToken;
        let html = self
            .client
            .get(self.url(page_path))
            .header(COOKIE, session.header_value())
            .send()
            .await
            .map_err(transport(step))?
            .error_for_status()
            .map_err(transport(step))?
            .text()
            .await
            .map_err(transport(step))?;

        Ok(self.scrape(&html, element_id))
    }

    /// Step 3: start the cleaning cycle and return the confirmation token.
    #[instrument(skip(self, session, token), fields(base = %self.base_url))]
    pub async fn initiate_cleaning(
        &self,
        session: &SessionCookie,
        token: &CsrfToken,
        cleaning_type: CleaningType,
    ) -> Result<Option<CsrfToken>, MaintenanceError> {
        let html = self
            .post_form(
                CleaningStep::Initiate,
                session,
                CLEANING_CONFIRM_PATH,
                token,
                cleaning_type.code(),
            )
            .await?;
        Ok(self.scrape(&html, INITIATE_NEXT_TOKEN_ID))
    }

    /// Step 4: confirm the cycle and return the refresh token.
    #[instrument(skip(self, session, token), fields(base = %self.base_url))]
    pub async fn confirm_cleaning(
        &self,
        session: &SessionCookie,
        token: &CsrfToken,
        cleaning_type: CleaningType,
    ) -> Result<Option<CsrfToken>, MaintenanceError> {
        let path = format!("{CLEANING_CONFIRM_PATH}{CONFIRM_VARIANT_QUERY}");
        let html = self
            .post_form(
                CleaningStep::Confirm,
                session,
                &path,
                token,
                cleaning_type.code(),
            )
            .await?;
        Ok(self.scrape(&html, CONFIRM_NEXT_TOKEN_ID))
    }

    /// Step 5: submit the refresh form; `true` iff the console accepted it.
    #[instrument(skip(self, session, token), fields(base = %self.base_url))]
    pub async fn finalize_cleaning(
        &self,
        session: &SessionCookie,
        token: &CsrfToken,
    ) -> Result<bool, MaintenanceError> {
        let html = self
            .post_form(
                CleaningStep::Finalize,
                session,
                CLEANING_PAGE_PATH,
                token,
                REFRESH_BUTTON,
            )
            .await?;
        let accepted = html.contains(SUCCESS_MARKER);
        debug!(accepted, "refresh response checked for success marker");
        Ok(accepted)
    }

    /// Run the full five-step head-cleaning sequence.
    ///
    /// Returns the session cookie so the caller can hand it on; any missing
    /// cookie, token or marker aborts with the step that failed.
    #[instrument(skip(self, password), fields(base = %self.base_url, cleaning_type = %cleaning_type))]
    pub async fn run_head_cleaning(
        &self,
        password: &str,
        cleaning_type: CleaningType,
    ) -> Result<SessionCookie, MaintenanceError> {
        let session = self
            .authenticate(password)
            .await?
            .ok_or(MaintenanceError::AuthFailure)?;

        let initial_id = initial_token_id(cleaning_type);
        let initial = self
            .fetch_token(&session, CLEANING_PAGE_PATH, &initial_id)
            .await?
            .ok_or_else(|| MaintenanceError::TokenNotFound {
                step: CleaningStep::FetchToken,
                element_id: initial_id.clone(),
            })?;

        let confirm = self
            .initiate_cleaning(&session, &initial, cleaning_type)
            .await?
            .ok_or_else(|| MaintenanceError::TokenNotFound {
                step: CleaningStep::Initiate,
                element_id: INITIATE_NEXT_TOKEN_ID.to_string(),
            })?;

        let refresh = self
            .confirm_cleaning(&session, &confirm, cleaning_type)
            .await?
            .ok_or_else(|| MaintenanceError::TokenNotFound {
                step: CleaningStep::Confirm,
                element_id: CONFIRM_NEXT_TOKEN_ID.to_string(),
            })?;

        if !self.finalize_cleaning(&session, &refresh).await? {
            warn!("success marker absent from refresh response");
            return Err(MaintenanceError::ActionRejected);
        }

        info!("head cleaning accepted by printer");
        Ok(session)
    }

    async fn post_form(
        &self,
        step: CleaningStep,
        session: &SessionCookie,
        path: &str,
        token: &CsrfToken,
        btn_def: u8,
    ) -> Result<String, MaintenanceError> {
        let btn_def = btn_def.to_string();
        debug!(%step, path, btn_def = %btn_def, "posting console form");
        self.client
            .post(self.url(path))
            .header(COOKIE, session.header_value())
            .form(&[("CSRFToken", token.value()), ("btn_def", btn_def.as_str())])
            .send()
            .await
            .map_err(transport(step))?
            .error_for_status()
            .map_err(transport(step))?
            .text()
            .await
            .map_err(transport(step))
    }

    fn scrape(&self, html: &str, element_id: &str) -> Option<CsrfToken> {
        self.extractor
            .extract_token(html, element_id)
            .map(CsrfToken)
    }
}

impl std::fmt::Debug for PrinterWebClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrinterWebClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Element id of the head-cleaning page's token for `cleaning_type`.
pub fn initial_token_id(cleaning_type: CleaningType) -> String {
    format!("CSRFToken{}", cleaning_type.code())
}

/// Find the `AuthCookie` value among `Set-Cookie` header values.
pub fn parse_auth_cookie<'a, I>(set_cookie_values: I) -> Option<SessionCookie>
where
    I: IntoIterator<Item = &'a str>,
{
    let header = set_cookie_values
        .into_iter()
        .find(|v| v.contains(AUTH_COOKIE_PREFIX))?;
    let start = header.find(AUTH_COOKIE_PREFIX)? + AUTH_COOKIE_PREFIX.len();
    let value = header[start..].split(';').next()?;
    if value.is_empty() {
        None
    } else {
        Some(SessionCookie(value.to_string()))
    }
}
