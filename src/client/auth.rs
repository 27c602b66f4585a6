use base64::Engine;
use reqwest::header::{HeaderValue, InvalidHeaderValue};

/// Credentials attached to every outbound request
#[derive(Clone)]
pub enum Auth {
    /// Username (account email) and API key sent as HTTP Basic credentials
    Basic(String, String),
    /// Don't use any authentication
    None,
}

impl Auth {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic(username.into(), password.into())
    }

    /// The `Authorization` header value, if any. Marked sensitive so it never
    /// shows up in debug output.
    pub fn header_value(&self) -> Result<Option<HeaderValue>, InvalidHeaderValue> {
        match self {
            Self::Basic(username, password) => {
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                let mut value = HeaderValue::from_str(&format!("Basic {}", credentials))?;
                value.set_sensitive(true);
                Ok(Some(value))
            }
            Self::None => Ok(None),
        }
    }
}

impl std::fmt::Display for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic(username, _) => write!(f, "Basic ({})", username),
            Self::None => write!(f, "None"),
        }
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_header() {
        let auth = Auth::basic("Aladdin", "open sesame");
        let value = auth.header_value().unwrap().unwrap();
        assert_eq!(value.to_str().unwrap(), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_none_has_no_header() {
        assert!(Auth::None.header_value().unwrap().is_none());
    }

    #[test]
    fn test_display_hides_password() {
        let auth = Auth::basic("ops@acme.test", "secret");
        assert_eq!(auth.to_string(), "Basic (ops@acme.test)");
        assert!(!format!("{:?}", auth).contains("secret"));
    }
}
