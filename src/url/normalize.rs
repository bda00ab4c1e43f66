use crate::UrlError;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "ref_source",
    "share_id",
];

/// Normalizes a seed URL against the site's base URL
///
/// # Normalization Steps
///
/// 1. Resolve the seed against `base` (absolute seeds are kept as-is)
/// 2. Reject anything that is not HTTP or HTTPS
/// 3. Remove the fragment
/// 4. Remove tracking query parameters, sort the rest
/// 5. Remove an empty query string
///
/// The path is left untouched: it carries the post identifier.
///
/// # Examples
///
/// ```
/// use forum_harvest::url::normalize_seed;
/// use url::Url;
///
/// let base = Url::parse("https://forum.example.com").unwrap();
/// let url = normalize_seed("/r/x/comments/abc/title/?utm_source=share", &base).unwrap();
/// assert_eq!(url.as_str(), "https://forum.example.com/r/x/comments/abc/title/");
/// ```
pub fn normalize_seed(raw: &str, base: &Url) -> Result<Url, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Parse("empty seed URL".to_string()));
    }

    let mut url = base
        .join(raw)
        .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
