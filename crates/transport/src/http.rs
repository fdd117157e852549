use conduit_model::Error;
use mime::Mime;
use reqwest::{Response, header};

/// Longest error body quoted in a transport error.
const MAX_ERROR_BODY: usize = 512;

/// Maps a failed request to a transport error.
#[inline]
pub fn transport_error(err: reqwest::Error) -> Error {
    Error::transport(err.to_string())
}

/// Turns a non-success status into a transport error carrying the status
/// and the (truncated) response body.
pub async fn check_status(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let mut body = body.trim().to_owned();
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    warn!("request failed with status {status}");
    Err(Error::transport(format!("status {status}: {body}")))
}

/// Checks that the response carries the expected media type, compared by
/// essence (`type/subtype`, parameters ignored).
pub fn check_content_type(
    response: &Response,
    expected: &str,
) -> Result<(), Error> {
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let is_valid_content_type = content_type
        .and_then(|v| v.parse().ok())
        .map(|m: Mime| m.essence_str() == expected)
        .unwrap_or(false);
    if !is_valid_content_type {
        return Err(Error::transport(format!(
            "unexpected content type: {content_type:?}"
        )));
    }
    Ok(())
}
