//! Pretty output formatting.

use todosync_core::todolist::{
    DomainTodolist, EntityStatus, GetTasksResponse, MeData, Task, Todolist, PAGE_SIZE,
};

/// Format the logged-in user for display.
pub fn format_me(me: &MeData) -> String {
    format!("{} <{}>\n  ID: {}", me.login, me.email, me.id)
}

/// Format a todolist for display.
pub fn format_todolist(todolist: &Todolist) -> String {
    format!(
        "{}\n  ID: {}\n  Added: {}",
        todolist.title,
        todolist.id,
        todolist.added_date.format("%Y-%m-%d %H:%M")
    )
}

/// Format todolists for display.
pub fn format_todolists(todolists: &[DomainTodolist]) -> String {
    if todolists.is_empty() {
        return "No todolists found.".to_string();
    }
    let mut output = format!("TODOLISTS ({})\n", todolists.len());
    output.push_str(&"-".repeat(40));
    for todolist in todolists {
        output.push_str(&format!("\n{}", format_todolist(&todolist.todolist)));
        if todolist.entity_status == EntityStatus::Loading {
            output.push_str("\n  (pending)");
        }
        output.push('\n');
    }
    output
}

/// Format a task for display.
pub fn format_task(task: &Task) -> String {
    let mark = if task.status.is_completed() { "x" } else { " " };
    let mut output = format!(
        "[{}] {} ({})\n  ID: {}",
        mark,
        task.title,
        task.status.label(),
        task.id
    );
    if let Some(desc) = &task.description {
        output.push_str(&format!("\n  Description: {}", desc));
    }
    if let Some(deadline) = &task.deadline {
        output.push_str(&format!("\n  Deadline: {}", deadline.format("%Y-%m-%d")));
    }
    output
}

/// Format one page of tasks for display.
pub fn format_tasks(page: &GetTasksResponse, page_number: u32) -> String {
    if page.items.is_empty() {
        return "No tasks found.".to_string();
    }
    let pages = page.total_count.div_ceil(u64::from(PAGE_SIZE)).max(1);
    let mut output = format!(
        "TASKS ({} total, page {}/{})\n",
        page.total_count, page_number, pages
    );
    output.push_str(&"-".repeat(40));
    for task in &page.items {
        output.push_str(&format!("\n{}", format_task(task)));
        output.push('\n');
    }
    output
}
