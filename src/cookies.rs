//! Process-wide session cookie store.
//!
//! Replaces the transport's implicit cookie jar with an explicitly owned,
//! injectable store so the relay can install solved challenge cookies itself.
//! Cookies are keyed by `(origin, name)`; a later `Set-Cookie` for the same
//! key overwrites the prior value and expiry. Entries are never deleted, but
//! expired ones are excluded from outbound headers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use url::Url;

/// A single stored cookie scoped to one origin.
#[derive(Debug, Clone)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Cookie {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expiry) if expiry <= now)
    }

    /// RFC 6265 path-match: the cookie path is a prefix that ends on a path
    /// segment boundary.
    fn matches_path(&self, request_path: &str) -> bool {
        if self.path == request_path {
            return true;
        }
        request_path.starts_with(&self.path)
            && (self.path.ends_with('/')
                || request_path.as_bytes().get(self.path.len()) == Some(&b'/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CookieKey {
    origin: String,
    name: String,
}

/// Cloneable handle to the shared store. All mutations go through the inner
/// lock, so concurrent solves converge last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct CookieStore {
    inner: Arc<RwLock<HashMap<CookieKey, Cookie>>>,
}

/// Origin string (`scheme://host[:port]`) used as the store key.
pub fn origin_of(url: &Url) -> String {
    let mut origin = format!("{}://{}", url.scheme(), url.host_str().unwrap_or(""));
    if let Some(port) = url.port() {
        origin.push(':');
        origin.push_str(&port.to_string());
    }
    origin
}

impl CookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compose the `Cookie` header value for a URL: every non-expired cookie
    /// whose origin matches and whose path scopes the request path, joined as
    /// `name=value; name2=value2`. Empty string when nothing applies; callers
    /// must then omit the header entirely.
    pub fn cookie_header_for(&self, url: &Url) -> String {
        let origin = origin_of(url);
        let path = url.path();
        let now = Utc::now();

        let guard = match self.inner.read() {
            Ok(guard) => guard,
            Err(_) => return String::new(),
        };

        let mut pairs: Vec<String> = guard
            .iter()
            .filter(|(key, cookie)| {
                key.origin == origin && !cookie.is_expired(now) && cookie.matches_path(path)
            })
            .map(|(_, cookie)| format!("{}={}", cookie.name, cookie.value))
            .collect();
        pairs.sort();
        pairs.join("; ")
    }

    /// Absorb a batch of `Set-Cookie` header lines from a response to `url`.
    /// Malformed lines are logged and skipped without aborting the batch.
    pub fn absorb<'a, I>(&self, set_cookie_lines: I, url: &Url)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for line in set_cookie_lines {
            match parse_set_cookie(line) {
                Some(cookie) => self.store(cookie, &origin_of(url)),
                None => log::warn!("skipping malformed Set-Cookie line: {line:?}"),
            }
        }
    }

    /// Install a cookie directly, used after a successful challenge solve.
    pub fn set(
        &self,
        name: &str,
        value: &str,
        expires_at: Option<DateTime<Utc>>,
        path: &str,
        url: &Url,
    ) {
        self.store(
            Cookie {
                name: name.to_string(),
                value: value.to_string(),
                path: path.to_string(),
                expires_at,
            },
            &origin_of(url),
        );
    }

    /// Whether the store holds any cookie at all (expired or not). The health
    /// endpoint reports presence, never contents.
    pub fn is_empty(&self) -> bool {
        self.inner.read().map(|guard| guard.is_empty()).unwrap_or(true)
    }

    fn store(&self, cookie: Cookie, origin: &str) {
        if let Ok(mut guard) = self.inner.write() {
            guard.insert(
                CookieKey {
                    origin: origin.to_string(),
                    name: cookie.name.clone(),
                },
                cookie,
            );
        }
    }
}

/// Parse one `Set-Cookie` line: `name=value` followed by `;`-separated
/// attributes. Only `Expires`, `Max-Age`, and `Path` are honoured; `Max-Age`
/// takes precedence over `Expires` per RFC 6265.
fn parse_set_cookie(line: &str) -> Option<Cookie> {
    let mut segments = line.split(';');

    let pair = segments.next()?.trim();
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut expires_at = None;
    let mut max_age = None;
    let mut path = "/".to_string();

    for segment in segments {
        let segment = segment.trim();
        let (attr, attr_value) = match segment.split_once('=') {
            Some((attr, attr_value)) => (attr.trim(), attr_value.trim()),
            None => (segment, ""),
        };
        match attr.to_ascii_lowercase().as_str() {
            "expires" => {
                expires_at = DateTime::parse_from_rfc2822(attr_value)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc));
            }
            "max-age" => {
                max_age = attr_value
                    .parse::<i64>()
                    .ok()
                    .map(|secs| Utc::now() + Duration::seconds(secs));
            }
            "path" if !attr_value.is_empty() => path = attr_value.to_string(),
            _ => {}
        }
    }

    Some(Cookie {
        name: name.to_string(),
        value: value.trim().to_string(),
        path,
        expires_at: max_age.or(expires_at),
    })
}
