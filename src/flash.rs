use actix_web::{
    cookie::{Cookie, SameSite},
    dev::Payload,
    FromRequest, HttpRequest, HttpResponse,
};
use std::future::{ready, Ready};

pub const FLASH_COOKIE: &str = "flash";

/// A notice shown once on the page a redirect lands on.
///
/// Flashes travel to the redirect target in the `flash` cookie, so every
/// variant has a stable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    AnonymousWrite,
    InvalidInput,
    MovieAdded,
    MovieUpdated,
    MovieDeleted,
    LoginRequired,
    InvalidCredentials,
    LoggedIn,
    MissingCredentials,
    UsernameTaken,
    SignedUp,
    Goodbye,
    InvalidName,
    SettingsUpdated,
}

const ALL: [Flash; 14] = [
    Flash::AnonymousWrite,
    Flash::InvalidInput,
    Flash::MovieAdded,
    Flash::MovieUpdated,
    Flash::MovieDeleted,
    Flash::LoginRequired,
    Flash::InvalidCredentials,
    Flash::LoggedIn,
    Flash::MissingCredentials,
    Flash::UsernameTaken,
    Flash::SignedUp,
    Flash::Goodbye,
    Flash::InvalidName,
    Flash::SettingsUpdated,
];

impl Flash {
    pub fn code(self) -> &'static str {
        match self {
            Flash::AnonymousWrite => "anonymous_write",
            Flash::InvalidInput => "invalid_input",
            Flash::MovieAdded => "movie_added",
            Flash::MovieUpdated => "movie_updated",
            Flash::MovieDeleted => "movie_deleted",
            Flash::LoginRequired => "login_required",
            Flash::InvalidCredentials => "invalid_credentials",
            Flash::LoggedIn => "logged_in",
            Flash::MissingCredentials => "missing_credentials",
            Flash::UsernameTaken => "username_taken",
            Flash::SignedUp => "signed_up",
            Flash::Goodbye => "goodbye",
            Flash::InvalidName => "invalid_name",
            Flash::SettingsUpdated => "settings_updated",
        }
    }

    pub fn from_code(code: &str) -> Option<Flash> {
        ALL.iter().copied().find(|flash| flash.code() == code)
    }

    pub fn message(self) -> &'static str {
        match self {
            Flash::AnonymousWrite => "Anonymous users cannot add movies.",
            Flash::InvalidInput => "Invalid input.",
            Flash::MovieAdded => "Item created.",
            Flash::MovieUpdated => "Item updated.",
            Flash::MovieDeleted => "Item deleted.",
            Flash::LoginRequired => "Please log in to access this page.",
            Flash::InvalidCredentials => "Invalid username or password.",
            Flash::LoggedIn => "Login success.",
            Flash::MissingCredentials => "Username and password must not be empty.",
            Flash::UsernameTaken => "Username already exists.",
            Flash::SignedUp => "Account created. You can log in now.",
            Flash::Goodbye => "Goodbye.",
            Flash::InvalidName => "Name must be between 1 and 20 characters.",
            Flash::SettingsUpdated => "Settings updated.",
        }
    }
}

/// The flash queued by the previous response, read from the flash cookie.
///
/// A page that renders it must clear the cookie so it is shown once.
#[derive(Debug, Default)]
pub struct PendingFlash {
    code: Option<String>,
}

impl PendingFlash {
    /// Unknown codes are dropped.
    pub fn flash(&self) -> Option<Flash> {
        self.code.as_deref().and_then(Flash::from_code)
    }

    pub fn is_pending(&self) -> bool {
        self.code.is_some()
    }
}

impl FromRequest for PendingFlash {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(PendingFlash {
            code: req
                .cookie(FLASH_COOKIE)
                .map(|cookie| cookie.value().to_owned())
                .filter(|code| !code.is_empty()),
        }))
    }
}

fn flash_cookie(value: &str) -> Cookie<'static> {
    Cookie::build(FLASH_COOKIE, value.to_owned())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

/// Expires the flash cookie on the client.
pub fn clear_cookie() -> Cookie<'static> {
    let mut cookie = flash_cookie("");
    cookie.make_removal();
    cookie
}

pub fn redirect(location: &str, flash: Option<Flash>) -> HttpResponse {
    let mut resp = HttpResponse::Found();
    resp.insert_header(("location", location));
    if let Some(flash) = flash {
        resp.cookie(flash_cookie(flash.code()));
    }
    resp.finish()
}
