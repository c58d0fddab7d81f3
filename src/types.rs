use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Bearer credential attached to authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct AccessToken(pub String);

impl AccessToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Long-lived credential exchanged for a new token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct RefreshToken(pub String);

impl RefreshToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Key under which the session blob lives in the secret store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From, Into)]
pub struct SessionKey(pub String);

impl SessionKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self("eatpic.session".into())
    }
}

/// Persisted token pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub access_token: Option<AccessToken>,
    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,
}

impl Session {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(AccessToken(access_token.into())),
            refresh_token: Some(RefreshToken(refresh_token.into())),
        }
    }
}

/// Response wrapper used by every EatPic API endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ApiEnvelope<T> {
    pub is_success: bool,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    pub result: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Unwraps the payload of a successful envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`](crate::Error::Api) when `isSuccess` is false or
    /// the result is absent.
    pub fn into_result(self) -> Result<T, crate::Error> {
        match (self.is_success, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(crate::Error::Api {
                code: self.code,
                message: self.message,
            }),
        }
    }
}

/// Token pair returned by the refresh endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result payload of a meal card upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct NewCard {
    pub new_card_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_uses_camel_case_keys() {
        let session = Session::new("a", "r");
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
    }

    #[test]
    fn session_tolerates_missing_fields() {
        let session: Session = serde_json::from_str(r#"{"accessToken":"only"}"#).unwrap();
        assert_eq!(session.access_token, Some(AccessToken("only".into())));
        assert!(session.refresh_token.is_none());
    }

    #[test]
    fn envelope_success_yields_result() {
        let env: ApiEnvelope<NewCard> = serde_json::from_str(
            r#"{"isSuccess":true,"code":"COMMON200","message":"ok","result":{"newCardId":42}}"#,
        )
        .unwrap();
        assert_eq!(env.into_result().unwrap().new_card_id, 42);
    }

    #[test]
    fn envelope_failure_maps_to_api_error() {
        let env: ApiEnvelope<NewCard> = serde_json::from_str(
            r#"{"isSuccess":false,"code":"CARD400","message":"bad image","result":null}"#,
        )
        .unwrap();
        match env.into_result() {
            Err(crate::Error::Api { code, message }) => {
                assert_eq!(code, "CARD400");
                assert_eq!(message, "bad image");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn envelope_without_result_field() {
        let env: ApiEnvelope<TokenPair> =
            serde_json::from_str(r#"{"isSuccess":false,"code":"AUTH4001","message":"expired"}"#)
                .unwrap();
        assert!(!env.is_success);
        assert!(env.result.is_none());
        assert!(matches!(env.into_result(), Err(crate::Error::Api { .. })));
    }

    #[test]
    fn default_session_key() {
        assert_eq!(SessionKey::default().as_str(), "eatpic.session");
    }
}
