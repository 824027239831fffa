/// Append `token` as a URL-encoded `token` query parameter to `base`.
pub fn token_link(base: &str, token: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}token={}", base, separator, urlencoding::encode(token))
}
