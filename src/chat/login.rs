use super::config::{Config, ConfigStore};
use super::input::{InputEvent, InputSource};
use super::render::Renderer;
use crate::client::ChatApi;
use crate::error::{Error, Result};

/// Returns the saved session token, or logs in with an email and password
/// read from `input` and saves the new token.
///
/// The password is read like any other line and echoes on the terminal.
pub async fn authenticate(
    api: &dyn ChatApi,
    store: &ConfigStore,
    config: &mut Config,
    input: &mut dyn InputSource,
    renderer: &mut dyn Renderer,
) -> Result<String> {
    if let Some(token) = config.token.as_ref().filter(|token| !token.is_empty()) {
        renderer.print_info("Using saved token.");
        return Ok(token.clone());
    }

    renderer.print_heading("Login to Revolt");
    let email = prompt(input, "Email: ").await?;
    let password = prompt(input, "Password: ").await?;
    if email.is_empty() || password.is_empty() {
        return Err(Error::validation("email and password are required", None));
    }

    let token = api.login(&email, &password).await?;
    config.token = Some(token.clone());
    match store.save(config) {
        Ok(()) => renderer.print_success("Login successful! Token saved."),
        Err(err) => {
            tracing::warn!("failed to save token: {err}");
            renderer.print_error(&format!("Login successful, but the token was not saved: {err}"));
        }
    }
    Ok(token)
}

async fn prompt(input: &mut dyn InputSource, prompt: &str) -> Result<String> {
    match input.read_line(prompt).await? {
        InputEvent::Line(line) => Ok(line.trim().to_string()),
        InputEvent::Interrupted | InputEvent::Eof => {
            Err(Error::validation("login cancelled", None))
        }
    }
}
