use crate::database::UserDb;
use crate::flash::{redirect, Flash};
use crate::log_error;
use crate::model::User;
use actix_identity::{Identity, RequestIdentity};
use actix_web::{dev::Payload, http::StatusCode, web, FromRequest, HttpRequest, HttpResponse};
use log::debug;
use std::future::{ready, Ready};

/// The account behind the request's session cookie, if any.
///
/// The cookie only carries the user id; the user is loaded again on every
/// request, so an account that no longer exists reads as anonymous.
pub struct Viewer(pub Option<User>);

/// A request from a logged-in user. Extracting it from an anonymous request
/// fails with [`LoginRequired`], so the handler never runs.
pub struct Authenticated(pub User);

#[derive(Debug, thiserror::Error)]
#[error("login required")]
pub struct LoginRequired;

impl actix_web::ResponseError for LoginRequired {
    fn status_code(&self) -> StatusCode {
        StatusCode::FOUND
    }

    fn error_response(&self) -> HttpResponse {
        redirect("/login", Some(Flash::LoginRequired))
    }
}

pub fn require_authenticated(viewer: Option<User>) -> Result<Authenticated, LoginRequired> {
    viewer.map(Authenticated).ok_or(LoginRequired)
}

fn load_viewer(req: &HttpRequest) -> actix_web::Result<Option<User>> {
    let identity = match req.get_identity() {
        Some(identity) => identity,
        None => return Ok(None),
    };
    let user_id = match identity.parse::<u64>() {
        Ok(user_id) => user_id,
        Err(_) => {
            debug!("Ignoring malformed identity {:?}", identity);
            return Ok(None);
        }
    };
    let db = req
        .app_data::<web::Data<sled::Db>>()
        .ok_or_else(|| log_error("sled::Db is not registered", "Configuration error"))?;
    let user = db
        .get_user(user_id)
        .map_err(|err| log_error(err, "Database error"))?;
    if user.is_none() {
        debug!("Session refers to unknown user {}", user_id);
    }
    Ok(user)
}

impl FromRequest for Viewer {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(load_viewer(req).map(Viewer))
    }
}

impl FromRequest for Authenticated {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(load_viewer(req).and_then(|viewer| Ok(require_authenticated(viewer)?)))
    }
}

pub fn login(id: &Identity, user: &User) {
    id.remember(user.id.to_string());
}

pub fn logout(id: &Identity) {
    id.forget();
}
