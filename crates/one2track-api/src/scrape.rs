// String scanning over untrusted portal content.
//
// The portal has no API contract; the login handshake depends on markers
// inside HTML and headers. Each helper returns `None` when its marker is
// missing so callers can map that onto a typed error.

/// Attribute marker preceding the CSRF token in the login page `<meta>` tag.
const CSRF_MARKER: &str = "name=\"csrf-token\" content=\"";

/// Path segment (splitting the absolute URL on `/`) that holds the account id.
///
/// `https://host/users/42/devices` splits into
/// `["https:", "", "host", "users", "42", "devices"]`.
const ACCOUNT_SEGMENT: usize = 4;

/// Extract the CSRF token from the login page HTML.
///
/// Returns the text between the marker and the next `"`. `None` if the
/// marker is missing or the attribute is never closed.
pub fn extract_csrf_token(html: &str) -> Option<&str> {
    let start = html.find(CSRF_MARKER)? + CSRF_MARKER.len();
    let rest = html.get(start..)?;
    let end = rest.find('"')?;
    rest.get(..end)
}

/// Extract the value of cookie `name` from a single `Set-Cookie` header.
///
/// The value runs up to (not including) the next `;`. The name must start
/// a cookie pair, so `x_iadmin=` does not match `_iadmin`. Empty values
/// count as absent.
pub fn extract_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{name}=");
    let mut offset = 0;
    while let Some(found) = header.get(offset..)?.find(&needle) {
        let at = offset + found;
        let starts_pair = header
            .get(..at)
            .and_then(|before| before.chars().next_back())
            .is_none_or(|c| c == ';' || c == ',' || c.is_whitespace());
        if starts_pair {
            let value_start = at + needle.len();
            let rest = header.get(value_start..)?;
            let value = rest.split(';').next().unwrap_or_default().trim();
            return (!value.is_empty()).then_some(value);
        }
        offset = at + needle.len();
    }
    None
}

/// Scan every `Set-Cookie` header for cookie `name`, first match wins.
pub fn find_cookie<'a, I>(headers: I, name: &str) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    headers
        .into_iter()
        .find_map(|header| extract_cookie(header, name))
        .map(str::to_owned)
}

/// Pull the account identifier out of an absolute redirect URL.
///
/// Segment [`ACCOUNT_SEGMENT`] of the `/`-split URL; `None` when the URL is
/// too short or the segment is empty.
pub fn account_id_from_location(location: &str) -> Option<&str> {
    location
        .split('/')
        .nth(ACCOUNT_SEGMENT)
        .filter(|segment| !segment.is_empty())
}
