use crate::database::UserDb;
use crate::flash::{clear_cookie, Flash, PendingFlash};
use crate::log_error;
use crate::model::{User, UserView};
use actix_web::{http::StatusCode, HttpResponse};
use serde::Serialize;

/// Template context for one response.
///
/// Every page sees `owner` (the first account, whose list this is),
/// `current_user` (`null` when anonymous) and `flash` (`null` when there is
/// nothing to show). A page built from a pending flash clears the flash
/// cookie when it renders.
pub struct Page {
    ctx: tera::Context,
    consumes_flash: bool,
}

impl Page {
    pub fn new(
        db: &sled::Db,
        viewer: Option<&User>,
        pending: Option<&PendingFlash>,
    ) -> actix_web::Result<Self> {
        let owner = db
            .first_user()
            .map_err(|err| log_error(err, "Database error"))?;
        let mut ctx = tera::Context::new();
        ctx.insert("owner", &owner.as_ref().map(UserView::from));
        ctx.insert("current_user", &viewer.map(UserView::from));
        let flash = pending.and_then(PendingFlash::flash);
        ctx.insert("flash", &flash.map(Flash::message));
        Ok(Page {
            ctx,
            consumes_flash: pending.map_or(false, PendingFlash::is_pending),
        })
    }

    pub fn insert<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> &mut Self {
        self.ctx.insert(key, value);
        self
    }

    pub fn render(&self, tera: &tera::Tera, template: &str) -> actix_web::Result<HttpResponse> {
        self.render_with_status(tera, template, StatusCode::OK)
    }

    pub fn render_with_status(
        &self,
        tera: &tera::Tera,
        template: &str,
        status: StatusCode,
    ) -> actix_web::Result<HttpResponse> {
        let body = tera
            .render(template, &self.ctx)
            .map_err(|err| log_error(err, "Template error"))?;
        let mut resp = HttpResponse::build(status);
        resp.content_type("text/html; charset=utf-8");
        if self.consumes_flash {
            resp.cookie(clear_cookie());
        }
        Ok(resp.body(body))
    }
}
