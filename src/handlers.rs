use crate::auth::{self, Authenticated, Viewer};
use crate::credentials;
use crate::database::*;
use crate::flash::{redirect, Flash, PendingFlash};
use crate::log_error;
use crate::model::*;
use crate::view::Page;
use actix_identity::Identity;
use actix_web::{http::StatusCode, web, HttpResponse};
use log::{debug, info};
use serde::Deserialize;

type Tera = web::Data<tera::Tera>;
type Db = web::Data<sled::Db>;

fn db_error(err: Error) -> actix_web::Error {
    log_error(err, "Database error")
}

#[derive(Deserialize)]
struct MovieForm {
    #[serde(default)]
    title: String,
    #[serde(default)]
    year: String,
}

#[derive(Deserialize)]
struct CredentialsForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct SettingsForm {
    #[serde(default)]
    name: String,
}

/// Route patterns only admit digits; ids that overflow `u64` are unknown too.
fn parse_movie_id(raw: &str) -> Option<u64> {
    raw.parse().ok()
}

fn not_found_page(
    tera: &tera::Tera,
    db: &sled::Db,
    viewer: Option<&User>,
) -> actix_web::Result<HttpResponse> {
    Page::new(db, viewer, None)?.render_with_status(tera, "404.html", StatusCode::NOT_FOUND)
}

async fn not_found(Viewer(viewer): Viewer, tera: Tera, db: Db) -> actix_web::Result<HttpResponse> {
    not_found_page(&tera, &db, viewer.as_ref())
}

async fn index(
    Viewer(viewer): Viewer,
    flash: PendingFlash,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let movies = db.list_movies().map_err(db_error)?;
    Page::new(&db, viewer.as_ref(), Some(&flash))?
        .insert("movies", &movies)
        .render(&tera, "index.html")
}

async fn add_movie(
    Viewer(viewer): Viewer,
    form: web::Form<MovieForm>,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    if viewer.is_none() {
        return Ok(redirect("/", Some(Flash::AnonymousWrite)));
    }
    if !valid_movie(&form.title, &form.year) {
        return Ok(redirect("/", Some(Flash::InvalidInput)));
    }
    let movie = db.add_movie(&form.title, &form.year).map_err(db_error)?;
    debug!("Added movie {}", movie.id);
    Ok(redirect("/", Some(Flash::MovieAdded)))
}

async fn edit_form(
    Authenticated(user): Authenticated,
    movie_id: web::Path<String>,
    flash: PendingFlash,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let movie_id = match parse_movie_id(&movie_id) {
        Some(movie_id) => movie_id,
        None => return not_found_page(&tera, &db, Some(&user)),
    };
    let movie = match db.get_movie(movie_id).map_err(db_error)? {
        Some(movie) => movie,
        None => return not_found_page(&tera, &db, Some(&user)),
    };
    Page::new(&db, Some(&user), Some(&flash))?
        .insert("movie", &movie)
        .render(&tera, "edit.html")
}

async fn edit_movie(
    Authenticated(user): Authenticated,
    movie_id: web::Path<String>,
    form: web::Form<MovieForm>,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let movie_id = match parse_movie_id(&movie_id) {
        Some(movie_id) => movie_id,
        None => return not_found_page(&tera, &db, Some(&user)),
    };
    if db.get_movie(movie_id).map_err(db_error)?.is_none() {
        return not_found_page(&tera, &db, Some(&user));
    }
    if !valid_movie(&form.title, &form.year) {
        let location = format!("/movie/edit/{}", movie_id);
        return Ok(redirect(&location, Some(Flash::InvalidInput)));
    }
    match db
        .update_movie(movie_id, &form.title, &form.year)
        .map_err(db_error)?
    {
        Some(_) => Ok(redirect("/", Some(Flash::MovieUpdated))),
        None => not_found_page(&tera, &db, Some(&user)),
    }
}

async fn delete_movie(
    Authenticated(user): Authenticated,
    movie_id: web::Path<String>,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let movie_id = match parse_movie_id(&movie_id) {
        Some(movie_id) => movie_id,
        None => return not_found_page(&tera, &db, Some(&user)),
    };
    match db.delete_movie(movie_id).map_err(db_error)? {
        Some(movie) => {
            debug!("Deleted movie {}", movie.id);
            Ok(redirect("/", Some(Flash::MovieDeleted)))
        }
        None => not_found_page(&tera, &db, Some(&user)),
    }
}

async fn login_form(
    Viewer(viewer): Viewer,
    flash: PendingFlash,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    Page::new(&db, viewer.as_ref(), Some(&flash))?.render(&tera, "login.html")
}

async fn login(
    form: web::Form<CredentialsForm>,
    id: Identity,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    if form.username.is_empty() || form.password.is_empty() {
        return Ok(redirect("/login", Some(Flash::InvalidInput)));
    }
    let user = db
        .get_user_by_username(&form.username)
        .map_err(db_error)?;
    let verified = credentials::verify_account(
        &form.password,
        user.as_ref().map(|user| user.password_hash.as_str()),
    );
    match user {
        Some(user) if verified => {
            auth::login(&id, &user);
            info!("User {} logged in", user.id);
            Ok(redirect("/", Some(Flash::LoggedIn)))
        }
        _ => Ok(redirect("/login", Some(Flash::InvalidCredentials))),
    }
}

async fn signup_form(
    Viewer(viewer): Viewer,
    flash: PendingFlash,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    Page::new(&db, viewer.as_ref(), Some(&flash))?.render(&tera, "signup.html")
}

async fn signup(form: web::Form<CredentialsForm>, db: Db) -> actix_web::Result<HttpResponse> {
    if form.username.is_empty() || form.password.is_empty() {
        return Ok(redirect("/signup", Some(Flash::MissingCredentials)));
    }
    if !valid_username(&form.username) {
        return Ok(redirect("/signup", Some(Flash::InvalidInput)));
    }
    if db
        .get_user_by_username(&form.username)
        .map_err(db_error)?
        .is_some()
    {
        return Ok(redirect("/signup", Some(Flash::UsernameTaken)));
    }
    let digest =
        credentials::hash(&form.password).map_err(|err| log_error(err, "Hashing error"))?;
    match db
        .add_user(&form.username, &form.username, &digest)
        .map_err(db_error)?
    {
        Some(user) => {
            info!("Created user {}", user.id);
            Ok(redirect("/", Some(Flash::SignedUp)))
        }
        // Lost a race against a concurrent signup.
        None => Ok(redirect("/signup", Some(Flash::UsernameTaken))),
    }
}

async fn logout(Authenticated(user): Authenticated, id: Identity) -> HttpResponse {
    auth::logout(&id);
    info!("User {} logged out", user.id);
    redirect("/", Some(Flash::Goodbye))
}

async fn settings_form(
    Authenticated(user): Authenticated,
    flash: PendingFlash,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    Page::new(&db, Some(&user), Some(&flash))?.render(&tera, "settings.html")
}

async fn settings(
    Authenticated(mut user): Authenticated,
    form: web::Form<SettingsForm>,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    if !valid_name(&form.name) {
        return Ok(redirect("/settings", Some(Flash::InvalidName)));
    }
    user.name = form.into_inner().name;
    db.save_user(&user).map_err(db_error)?;
    Ok(redirect("/", Some(Flash::SettingsUpdated)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/", web::post().to(add_movie))
        .route(r"/movie/edit/{id:\d+}", web::get().to(edit_form))
        .route(r"/movie/edit/{id:\d+}", web::post().to(edit_movie))
        .route(r"/movie/delete/{id:\d+}", web::post().to(delete_movie))
        .route("/login", web::get().to(login_form))
        .route("/login", web::post().to(login))
        .route("/signup", web::get().to(signup_form))
        .route("/signup", web::post().to(signup))
        .route("/logout", web::get().to(logout))
        .route("/settings", web::get().to(settings_form))
        .route("/settings", web::post().to(settings))
        .default_service(web::to(not_found));
}
