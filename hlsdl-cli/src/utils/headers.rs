use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use tracing::{debug, warn};

/// Parse a header string in format "Name: Value" and add it to the HeaderMap
pub fn parse_and_add_header(headers: &mut HeaderMap, header_str: &str) {
    let Some((name, value)) = header_str.split_once(':') else {
        warn!(
            "Invalid header format: '{}'. Expected 'Name: Value'",
            header_str
        );
        return;
    };
    let name = name.trim();
    let value = value.trim();

    let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
        warn!("Invalid header name: '{}'", name);
        return;
    };

    let Ok(header_value) = HeaderValue::from_str(value) else {
        warn!("Invalid header value: '{}'", value);
        return;
    };

    debug!("Adding header: {}", name);
    headers.insert(header_name, header_value);
}

fn insert_named(headers: &mut HeaderMap, name: HeaderName, value: Option<&str>) {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return;
    };
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => warn!("Invalid value for {}: '{}'", name, value),
    }
}

/// Builds the request header set from the dedicated flags and the raw
/// `-H` lines. Raw lines are applied last and win.
pub fn build_headers(
    user_agent: Option<&str>,
    referer: Option<&str>,
    cookies: Option<&str>,
    origin: Option<&str>,
    raw: &[String],
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert_named(&mut headers, USER_AGENT, user_agent);
    insert_named(&mut headers, REFERER, referer);
    insert_named(&mut headers, COOKIE, cookies);
    insert_named(&mut headers, ORIGIN, origin);
    for line in raw {
        parse_and_add_header(&mut headers, line);
    }
    headers
}
