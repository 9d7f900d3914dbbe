//! Auth CLI commands.

use clap::Parser;
use todosync_core::todolist::LoginArgs;

/// Log in with email and password.
#[derive(Debug, Parser)]
pub struct LoginCommand {
    /// Account email.
    #[arg(long)]
    pub email: String,
    /// Account password.
    #[arg(long, env = "TODOSYNC_PASSWORD", hide_env_values = true)]
    pub password: String,
    /// Keep the session alive.
    #[arg(long)]
    pub remember_me: bool,
    /// Answer to the captcha shown by a previous attempt.
    #[arg(long, requires = "captcha_url")]
    pub captcha: Option<String>,
    /// URL of that captcha, as printed by the previous attempt.
    #[arg(long)]
    pub captcha_url: Option<String>,
}

impl From<LoginCommand> for LoginArgs {
    fn from(command: LoginCommand) -> Self {
        Self {
            email: command.email,
            password: command.password,
            remember_me: command.remember_me,
            captcha: command.captcha,
        }
    }
}
