//! Account views: sign in, sign out, sign up.

use super::{FormData, LoginInput, RegistrationInput};
use crate::{
    api::{
        ApiError, RequestContext,
        context::clear_session_cookie,
        render::{INDEX_URL, local_redirect_target, redirect, render},
    },
    auth::{authenticate, hash_password},
    forms::{LoginForm, RegistrationForm},
    storage::InsertUserOutcome,
};
use anyhow::{Context, anyhow};
use axum::{
    Form,
    extract::Query,
    http::{Method, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use utoipa::IntoParams;

pub const REGISTER_TEMPLATE: &str = "users/register.html";
pub const LOGIN_TEMPLATE: &str = "users/login.html";

#[derive(Serialize)]
struct FormContext<'a, F> {
    form: &'a F,
}

#[derive(Serialize)]
struct LoginContext<'a> {
    form: &'a LoginForm,
    next: Option<&'a str>,
}

#[derive(Deserialize, IntoParams, Debug, Default)]
pub struct NextQuery {
    /// Local path to continue to after signing in.
    pub next: Option<String>,
}

/// End the current session (if any) and go back to the index.
///
/// Never fails: storage errors while deleting are only logged.
#[instrument(skip_all)]
pub async fn logout_view(ctx: RequestContext) -> Response {
    if let Some(token_hash) = ctx.session_token_hash()
        && let Err(err) = ctx.state().sessions().delete_session(token_hash).await
    {
        error!("Failed to delete session: {err:#}");
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response = redirect(INDEX_URL);
    match clear_session_cookie(ctx.state().config()) {
        Ok(cookie) => {
            response.headers_mut().insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build cookie: {err}"),
    }
    response
}

#[utoipa::path(
    method(get, post),
    path = "/users/register",
    request_body(
        content = RegistrationInput,
        content_type = "application/x-www-form-urlencoded",
        description = "Only read on POST"
    ),
    responses(
        (status = 200, description = "Registration form, with errors after an invalid submission", body = crate::api::Page),
        (status = 302, description = "Account created and signed in; redirects to the index"),
        (status = 500, description = "Storage or hashing failure")
    ),
    tag = "users"
)]
#[instrument(skip_all, fields(method = %method))]
pub async fn register(
    ctx: RequestContext,
    method: Method,
    Form(data): Form<FormData>,
) -> Result<Response, ApiError> {
    if method != Method::POST {
        return render(
            &ctx,
            REGISTER_TEMPLATE,
            FormContext {
                form: &RegistrationForm::new(),
            },
        );
    }

    let state = ctx.state();
    let policy = state.config().password_policy();
    let mut form = RegistrationForm::bind(&data, policy);

    if let Some(username) = form.username()
        && state
            .users()
            .username_exists(username)
            .await
            .context("failed to check username")?
    {
        form.reject_taken_username();
    }

    let account = match form.clean() {
        Ok(account) => account,
        Err(form) => return render(&ctx, REGISTER_TEMPLATE, FormContext { form: &form }),
    };

    let password_hash = hash_password(&account.password)?;
    match state
        .users()
        .insert_user(&account.username, &password_hash)
        .await
        .context("failed to create account")?
    {
        InsertUserOutcome::Created(user) => info!(user_id = %user.id, "Account created"),
        InsertUserOutcome::Conflict => {
            // Lost a race with another registration for the same name.
            let mut form = RegistrationForm::bind(&data, policy);
            form.reject_taken_username();
            return render(&ctx, REGISTER_TEMPLATE, FormContext { form: &form });
        }
    }

    // Sign in through the regular credential check with what was submitted.
    let Some(user) = authenticate(state.users(), &account.username, &account.password).await?
    else {
        return Err(anyhow!("new account {} failed to authenticate", account.username).into());
    };

    let cookie = ctx.login(user.id).await?;
    Ok(([(SET_COOKIE, cookie)], redirect(INDEX_URL)).into_response())
}

#[utoipa::path(
    method(get, post),
    path = "/users/login",
    request_body(
        content = LoginInput,
        content_type = "application/x-www-form-urlencoded",
        description = "Only read on POST"
    ),
    responses(
        (status = 200, description = "Login form, with an error after failed authentication", body = crate::api::Page),
        (status = 302, description = "Signed in; redirects to `next` or the index"),
        (status = 500, description = "Storage failure")
    ),
    tag = "users"
)]
#[instrument(skip_all, fields(method = %method))]
pub async fn login(
    ctx: RequestContext,
    method: Method,
    Query(query): Query<NextQuery>,
    Form(data): Form<FormData>,
) -> Result<Response, ApiError> {
    let next = local_redirect_target(data.get("next").or(query.next.as_ref()).map(String::as_str))
        .map(str::to_string);

    if method != Method::POST {
        return render(
            &ctx,
            LOGIN_TEMPLATE,
            LoginContext {
                form: &LoginForm::new(),
                next: next.as_deref(),
            },
        );
    }

    let mut form = LoginForm::bind(&data);
    let Some(credentials) = form.credentials() else {
        return render(
            &ctx,
            LOGIN_TEMPLATE,
            LoginContext {
                form: &form,
                next: next.as_deref(),
            },
        );
    };

    let Some(user) = authenticate(
        ctx.state().users(),
        &credentials.username,
        &credentials.password,
    )
    .await?
    else {
        form.reject_credentials();
        return render(
            &ctx,
            LOGIN_TEMPLATE,
            LoginContext {
                form: &form,
                next: next.as_deref(),
            },
        );
    };

    let cookie = ctx.login(user.id).await?;
    Ok((
        [(SET_COOKIE, cookie)],
        redirect(next.as_deref().unwrap_or(INDEX_URL)),
    )
        .into_response())
}
