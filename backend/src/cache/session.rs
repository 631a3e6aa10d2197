use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures::future::{Ready, ok};

pub const SESSION_HEADER: &str = "X-Session-Id";
pub const DEFAULT_SESSION: &str = "default";
const MAX_SESSION_LEN: usize = 128;

/// Session key for the result cache, taken from the `X-Session-Id` header or
/// the `session` query parameter. Requests carrying neither share the
/// default session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_request_parts(req: &HttpRequest) -> Self {
        let from_header = req
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let from_query = || {
            url_query_pairs(req.query_string())
                .into_iter()
                .find(|(key, _)| key == "session")
                .map(|(_, value)| value)
        };

        from_header
            .or_else(from_query)
            .map(|raw| raw.trim().to_string())
            .filter(|id| !id.is_empty() && id.len() <= MAX_SESSION_LEN)
            .map(SessionId)
            .unwrap_or_else(|| SessionId(DEFAULT_SESSION.to_string()))
    }
}

fn url_query_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |s: &str| {
                urlencoding::decode(&s.replace('+', " "))
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            };
            (decode(key), decode(value))
        })
        .collect()
}

impl FromRequest for SessionId {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ok(SessionId::from_request_parts(req))
    }
}
