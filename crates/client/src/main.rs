//! todosync CLI entry point.

use std::sync::Arc;

use clap::Parser;
use todosync_client::cli::auth::LoginCommand;
use todosync_client::cli::tasks::{TasksAction, TasksCommand};
use todosync_client::cli::todolists::{TodolistsAction, TodolistsCommand};
use todosync_client::cli::{Cli, Commands, OutputFormat};
use todosync_client::output::{pretty, render};
use todosync_client::token::FileTokenStore;
use todosync_client::{ClientError, LoginOutcome, TodoApp, TodoClient};
use todosync_core::todolist::{Task, TaskChanges, PAGE_SIZE};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todosync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    let client = TodoClient::from_config(&config)?;
    let tokens = FileTokenStore::new(config.token_path());
    let app = TodoApp::new(Arc::new(client), Arc::new(tokens));

    if let Err(e) = app.initialize().await {
        tracing::warn!(error = %e, "could not restore session");
    }

    match cli.command {
        Commands::Login(command) => login(&app, command, cli.format, cli.quiet).await?,
        Commands::Logout => {
            app.logout().await?;
            if !cli.quiet {
                println!("Logged out");
            }
        }
        Commands::Me => {
            let me = app.me().await?;
            println!("{}", render(&me, cli.format, pretty::format_me)?);
        }
        Commands::Todolists(command) => todolists(&app, command, cli.format, cli.quiet).await?,
        Commands::Tasks(command) => tasks(&app, command, cli.format, cli.quiet).await?,
    }

    Ok(())
}

async fn login(
    app: &TodoApp,
    command: LoginCommand,
    format: OutputFormat,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(url) = command.captcha_url.clone() {
        app.resume_captcha(url).await;
    }

    match app.login(command.into()).await? {
        LoginOutcome::LoggedIn => {
            if !quiet {
                let me = app.me().await?;
                println!("Logged in as {}", render(&me, format, pretty::format_me)?);
            }
            Ok(())
        }
        LoginOutcome::CaptchaRequired {
            captcha_url,
            message,
        } => {
            eprintln!("{}", message);
            if let Some(url) = captcha_url {
                eprintln!("Captcha: {}", url);
            }
            eprintln!("Retry with --captcha <answer> --captcha-url <url>");
            Err(message.into())
        }
        LoginOutcome::Rejected { message } => Err(message.into()),
    }
}

async fn todolists(
    app: &TodoApp,
    command: TodolistsCommand,
    format: OutputFormat,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match command.action {
        TodolistsAction::List => {
            let todolists = app.todolists().await?;
            println!("{}", render(&todolists[..], format, pretty::format_todolists)?);
        }
        TodolistsAction::Create { title } => {
            let todolist = app.add_todolist(&title).await?;
            match format {
                OutputFormat::Json => println!("{}", render(&todolist, format, pretty::format_todolist)?),
                OutputFormat::Pretty => {
                    println!("Created:\n{}", pretty::format_todolist(&todolist))
                }
            }
        }
        TodolistsAction::Rename { id, title } => {
            app.update_todolist_title(id, &title).await?;
            if !quiet {
                println!("Renamed todolist {}", id);
            }
        }
        TodolistsAction::Delete { id } => {
            // Cached first so the delete can flag it as pending.
            app.todolists().await?;
            app.remove_todolist(id).await?;
            if !quiet {
                println!("Deleted todolist {}", id);
            }
        }
    }
    Ok(())
}

async fn tasks(
    app: &TodoApp,
    command: TasksCommand,
    format: OutputFormat,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match command.action {
        TasksAction::List { todolist_id, page } => {
            let tasks = app.tasks(todolist_id, page).await?;
            println!("{}", render(&tasks, format, |t| pretty::format_tasks(t, page))?);
        }
        TasksAction::Add { todolist_id, title } => {
            let task = app.add_task(todolist_id, &title).await?;
            match format {
                OutputFormat::Json => println!("{}", render(&task, format, pretty::format_task)?),
                OutputFormat::Pretty => println!("Created:\n{}", pretty::format_task(&task)),
            }
        }
        TasksAction::Remove {
            todolist_id,
            task_id,
        } => {
            app.remove_task(todolist_id, task_id).await?;
            if !quiet {
                println!("Deleted task {}", task_id);
            }
        }
        TasksAction::Rename {
            todolist_id,
            task_id,
            title,
        } => {
            let task = change_task(app, todolist_id, task_id, TaskChanges::title(title)).await?;
            println!("{}", render(&task, format, pretty::format_task)?);
        }
        TasksAction::Status {
            todolist_id,
            task_id,
            status,
        } => {
            let changes = TaskChanges::status(status.into());
            let task = change_task(app, todolist_id, task_id, changes).await?;
            println!("{}", render(&task, format, pretty::format_task)?);
        }
    }
    Ok(())
}

/// Loads pages of the todolist until the task is cached, then changes it.
async fn change_task(
    app: &TodoApp,
    todolist_id: Uuid,
    task_id: Uuid,
    changes: TaskChanges,
) -> Result<Task, ClientError> {
    let mut page = 1;
    loop {
        let tasks = app.tasks(todolist_id, page).await?;
        if tasks.find(task_id).is_some() {
            break;
        }
        if tasks.items.is_empty() || u64::from(page * PAGE_SIZE) >= tasks.total_count {
            return Err(ClientError::TaskNotCached { task_id });
        }
        page += 1;
    }
    app.change_task(todolist_id, task_id, &changes).await
}
