//! Remote address resolution: turns a link address into the payload endpoint URL.
//!
//! Addresses are stored as the user typed them when linking, so they may be a
//! bare host (`cloud.example.com`), a host with port (`localhost:8080`), or a
//! full base URL with a path prefix (`https://example.com/nextcloud`).

use url::Url;

use crate::{error::ShareError, types::PAYLOAD_PATH};

/// Build the payload endpoint for `address`.
///
/// Bare addresses get `https://`, or `http://` when `allow_plain_http` is set.
/// An existing path prefix is kept.
pub fn payload_url(address: &str, allow_plain_http: bool) -> Result<Url, ShareError> {
    let address = address.trim();
    let base = if has_scheme(address) {
        address.to_owned()
    } else {
        let scheme = if allow_plain_http { "http" } else { "https" };
        format!("{scheme}://{address}")
    };

    let mut url = Url::parse(&base)?;
    let path = format!("{}{}", url.path().trim_end_matches('/'), PAYLOAD_PATH);
    url.set_path(&path);
    url.set_query(None);
    Ok(url)
}

fn has_scheme(address: &str) -> bool {
    address.starts_with("https://") || address.starts_with("http://")
}
