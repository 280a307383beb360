//! The `users` collection: a paginated listing and a detail view, contributed to the
//! API root through [`register`].

use actix_web::{web, HttpRequest, HttpResponse};
use sqlx::PgPool;

use crate::auth::AuthenticatedUser;
use crate::config::Settings;
use crate::error::AppError;
use crate::models::User;
use crate::pagination::{request_url, Page, PageQuery, PageRequest};
use crate::routes::{ApiRouter, Handler};

pub const PREFIX: &str = "users";
pub const BASENAME: &str = "user";

pub fn register(router: &mut ApiRouter) {
    router.register(
        PREFIX,
        BASENAME,
        vec![Handler::get(|| web::route().to(list_users))],
        vec![Handler::get(|| web::route().to(retrieve_user))],
    );
}

async fn list_users(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    settings: web::Data<Settings>,
    query: web::Query<PageQuery>,
    _user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let page = PageRequest::from_query(&query, &settings.rest_framework);
    let count = User::count(&pool).await?.max(0) as u64;
    page.ensure_within(count)?;
    let users = User::page(&pool, page.limit(), page.offset()?).await?;

    Ok(HttpResponse::Ok().json(Page::new(users, page, count, &request_url(&req))))
}

async fn retrieve_user(
    pool: web::Data<PgPool>,
    id: web::Path<i32>,
    _user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let user = User::find_by_id(&pool, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}
