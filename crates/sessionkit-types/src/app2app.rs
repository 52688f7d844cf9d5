//! Inbound app2app authentication requests.
//!
//! Another app on the same device that wants to sign in "as" the user of
//! this app opens a deep link shaped like an OAuth authorization request:
//!
//! ```text
//! https://app.example/app2app/authorize
//!     ?client_id=other-app
//!     &redirect_uri=com.other://callback
//!     &code_challenge_method=S256
//!     &code_challenge=...
//!     &state=...            (optional)
//! ```
//!
//! The authorization endpoint is the URI with its query removed.

use url::Url;

use crate::TypesError;

/// PKCE method used by app2app requests.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// A parsed app2app authentication request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App2AppRequest {
    pub authorization_endpoint: Url,
    pub redirect_uri: String,
    pub client_id: String,
    pub code_challenge: String,
    pub state: Option<String>,
}

impl App2AppRequest {
    /// Parses an inbound deep link.
    ///
    /// # Errors
    /// - [`TypesError::InvalidUri`] if `uri` is not an absolute URI
    /// - [`TypesError::MissingParameter`] if `client_id`, `redirect_uri`,
    ///   or `code_challenge` is absent or empty
    pub fn parse(uri: &str) -> Result<Self, TypesError> {
        let url = Url::parse(uri)?;

        let mut client_id = None;
        let mut redirect_uri = None;
        let mut code_challenge = None;
        let mut state = None;
        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "client_id" => client_id = Some(value.into_owned()),
                "redirect_uri" => redirect_uri = Some(value.into_owned()),
                "code_challenge" => code_challenge = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                _ => {}
            }
        }

        let mut authorization_endpoint = url;
        authorization_endpoint.set_query(None);
        authorization_endpoint.set_fragment(None);

        Ok(Self {
            authorization_endpoint,
            redirect_uri: redirect_uri
                .ok_or(TypesError::MissingParameter("redirect_uri"))?,
            client_id: client_id
                .ok_or(TypesError::MissingParameter("client_id"))?,
            code_challenge: code_challenge
                .ok_or(TypesError::MissingParameter("code_challenge"))?,
            state,
        })
    }

    /// Rebuilds the request URI, e.g. for forwarding to the provider.
    pub fn to_uri(&self) -> Url {
        let mut url = self.authorization_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD)
                .append_pair("code_challenge", &self.code_challenge);
            if let Some(state) = &self.state {
                query.append_pair("state", state);
            }
        }
        url
    }
}
