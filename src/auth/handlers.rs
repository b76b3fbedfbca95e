use askama::Template;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Form;
use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::session;
use crate::db::models::DEFAULT_PROFILE_PIC;
use crate::db::users::{self, NewUser};
use crate::error::{AppError, AppResult};
use crate::extractors::{get_cookie_value, MaybeUser};
use crate::flash::{self, redirect_with, Flash, IncomingFlash, Level};
use crate::forms::MultipartForm;
use crate::routes::{Page, PageContext};
use crate::state::AppState;
use crate::uploads::{UploadStore, UploadedFile, PROFILES_DIR};

// -- Templates --

#[derive(Template)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub ctx: PageContext,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
}

// -- Request types --

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub profile_pic: Option<UploadedFile>,
}

// -- Registration --

/// Create a Member account. Duplicate usernames or emails are rejected
/// before anything is written; a stored profile picture is removed again if
/// the insert fails.
pub fn register_account(
    conn: &Connection,
    uploads: &UploadStore,
    bcrypt_cost: u32,
    registration: &Registration,
) -> AppResult<i64> {
    if users::username_or_email_taken(conn, &registration.username, &registration.email)? {
        return Err(AppError::BadRequest(
            "Username or email already exists.".into(),
        ));
    }

    let password_hash = hash_password(&registration.password, bcrypt_cost)?;

    let stored_pic = match &registration.profile_pic {
        Some(file) => uploads.save(PROFILES_DIR, &registration.username, file)?,
        None => None,
    };

    let inserted = users::insert(
        conn,
        &NewUser {
            username: &registration.username,
            email: &registration.email,
            password_hash: &password_hash,
            profile_pic_path: stored_pic.as_deref().unwrap_or(DEFAULT_PROFILE_PIC),
        },
    );

    if inserted.is_err() {
        if let Some(path) = stored_pic {
            uploads.remove_all(&[path]);
        }
    }
    inserted
}

/// Page handlers report failures as a flash on the page they came from.
fn flash_error(location: &str, err: AppError) -> Response {
    redirect_with(location, Flash::new(Level::Danger, err.public_message()))
}

/// GET /register
pub async fn register_page(
    MaybeUser(user): MaybeUser,
    IncomingFlash(flash): IncomingFlash,
) -> Response {
    if user.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    Page(RegisterTemplate {
        ctx: PageContext::new(None, flash),
    })
    .into_response()
}

/// POST /register (multipart, optional `profile_pic`)
pub async fn register_submit(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    if user.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => return flash_error("/register", rejection.into()),
    };
    let form = match MultipartForm::read(multipart).await {
        Ok(form) => form,
        Err(e) => return flash_error("/register", e),
    };

    let (Ok(username), Ok(email), Ok(password)) = (
        form.required("username"),
        form.required("email"),
        form.required("password"),
    ) else {
        return redirect_with(
            "/register",
            Flash::new(Level::Danger, "All fields are required."),
        );
    };

    let registration = Registration {
        username,
        email,
        password,
        profile_pic: form.files("profile_pic").first().cloned(),
    };

    let result = state.db.get().map_err(AppError::from).and_then(|conn| {
        register_account(
            &conn,
            &state.uploads,
            state.config.auth.bcrypt_cost,
            &registration,
        )
    });

    match result {
        Ok(id) => {
            tracing::info!("Registered user {} ({})", registration.username, id);
            redirect_with(
                "/login",
                Flash::new(Level::Success, "Registration successful! Please log in."),
            )
        }
        Err(e) => flash_error("/register", e),
    }
}

// -- Login / logout --

/// GET /login
pub async fn login_page(
    MaybeUser(user): MaybeUser,
    IncomingFlash(flash): IncomingFlash,
) -> Response {
    if user.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    Page(LoginTemplate {
        ctx: PageContext::new(None, flash),
    })
    .into_response()
}

fn check_credentials(conn: &Connection, form: &LoginForm) -> AppResult<Option<i64>> {
    let (Some(username), Some(password)) = (form.username.as_deref(), form.password.as_deref())
    else {
        return Ok(None);
    };
    let user = users::find_by_username(conn, username.trim())?;
    Ok(user
        .filter(|u| verify_password(password, &u.password_hash))
        .map(|u| u.id))
}

/// POST /login — create a session and redirect to the dashboard
pub async fn login_submit(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    if user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let conn = state.db.get()?;
    let Some(user_id) = check_credentials(&conn, &form)? else {
        return Ok(redirect_with(
            "/login",
            Flash::new(Level::Danger, "Login failed. Check username and password."),
        ));
    };

    let token = session::create_session(&conn, user_id, state.config.auth.session_hours)?;
    tracing::info!("User {} signed in", user_id);

    Ok((
        StatusCode::SEE_OTHER,
        AppendHeaders([
            (header::LOCATION, "/dashboard".to_string()),
            (header::SET_COOKIE, state.config.session_cookie(&token)),
            (header::SET_COOKIE, flash::clear_cookie()),
        ]),
    )
        .into_response())
}

/// GET /logout — delete the session and go home
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = get_cookie_value(&headers, &state.config.auth.cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }

    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (header::SET_COOKIE, state.config.clear_session_cookie()),
        ],
    )
        .into_response())
}
