use thiserror::Error;
use url::Url;

/// Reasons a configured remote endpoint is refused.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Validate the remote quote endpoint from configuration.
///
/// Only `http` and `https` URLs with a host are accepted. Loopback hosts
/// are allowed so a local stub service can stand in for the real one.
///
/// ```
/// use quotebox::util::validate_endpoint;
///
/// assert!(validate_endpoint("https://jsonplaceholder.typicode.com/posts").is_ok());
/// assert!(validate_endpoint("http://127.0.0.1:8080/posts").is_ok());
/// assert!(validate_endpoint("file:///etc/passwd").is_err());
/// ```
pub fn validate_endpoint(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlValidationError::MissingHost(url_str.to_owned())),
    }
}
