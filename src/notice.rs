//! One-shot operator notices carried across a redirect in an encrypted
//! cookie.

use axum_extra::extract::cookie::{Cookie, PrivateCookieJar};
use serde::{Deserialize, Serialize};

pub const NOTICE_COOKIE: &str = "drivepay_notice";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }
}

pub fn push(jar: PrivateCookieJar, notice: &Notice) -> PrivateCookieJar {
    let Ok(value) = serde_json::to_string(notice) else {
        return jar;
    };
    jar.add(
        Cookie::build((NOTICE_COOKIE, value))
            .path("/")
            .http_only(true),
    )
}

/// Reads the pending notice, if any, and clears it.
pub fn take(jar: PrivateCookieJar) -> (PrivateCookieJar, Option<Notice>) {
    let Some(cookie) = jar.get(NOTICE_COOKIE) else {
        return (jar, None);
    };
    let notice = serde_json::from_str(cookie.value()).ok();
    let jar = jar.remove(Cookie::build(NOTICE_COOKIE).path("/"));
    (jar, notice)
}
