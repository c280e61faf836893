//! Interactive dashboard shell.
//!
//! Reads one command per line, runs it through the `Session`, and re-renders
//! from the dashboard state afterwards. A session-lost failure ends the shell
//! the same way a logout does.

use std::io::{self, BufRead, Write};

use expense_core::{
    format_amount, Dashboard, DashboardError, Expense, ExpenseDraft, ExpenseId, Session, SignOut,
    Transport,
};
use tracing::debug;

pub const HELP: &str = "\
Commands:
  list                                  show the expense list
  summary                               show total and count
  add <amount> <category> <description>  add an expense
  edit <id>                             start editing an expense
  set <field> <value>                   change description, amount or category
  save                                  submit the edit
  cancel                                discard the edit
  rm <id>                               delete an expense
  refresh                               reload from the server
  logout                                sign out and leave
  help                                  show this help
  quit                                  leave without signing out";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List,
    Summary,
    Add {
        amount: String,
        category: String,
        description: String,
    },
    Edit(ExpenseId),
    Set {
        field: String,
        value: String,
    },
    Save,
    Cancel,
    Remove(ExpenseId),
    Refresh,
    Logout,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command \"{0}\", type help for a list")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Err(ParseError::Empty);
    };
    let rest: Vec<&str> = words.collect();

    match (name.to_ascii_lowercase().as_str(), rest.as_slice()) {
        ("list" | "ls", []) => Ok(Command::List),
        ("summary", []) => Ok(Command::Summary),
        ("add", [amount, category, description @ ..]) if !description.is_empty() => {
            Ok(Command::Add {
                amount: amount.to_string(),
                category: category.to_string(),
                description: description.join(" "),
            })
        }
        ("add", _) => Err(ParseError::Usage("add <amount> <category> <description...>")),
        ("edit", [id]) => Ok(Command::Edit(ExpenseId::new(*id))),
        ("edit", _) => Err(ParseError::Usage("edit <id>")),
        ("set", [field, value @ ..]) => Ok(Command::Set {
            field: field.to_ascii_lowercase(),
            value: value.join(" "),
        }),
        ("set", _) => Err(ParseError::Usage("set <field> <value...>")),
        ("save", []) => Ok(Command::Save),
        ("cancel", []) => Ok(Command::Cancel),
        ("rm" | "delete", [id]) => Ok(Command::Remove(ExpenseId::new(*id))),
        ("rm" | "delete", _) => Err(ParseError::Usage("rm <id>")),
        ("refresh", []) => Ok(Command::Refresh),
        ("logout", []) => Ok(Command::Logout),
        ("help" | "?", _) => Ok(Command::Help),
        ("quit" | "exit", []) => Ok(Command::Quit),
        (other, _) => Err(ParseError::Unknown(other.to_string())),
    }
}

pub fn render_header(dashboard: &Dashboard) -> String {
    let name = dashboard.user().map(|u| u.display_name()).unwrap_or("User");
    format!("Welcome, {name}!")
}

pub fn render_summary(dashboard: &Dashboard) -> String {
    let summary = dashboard.summary();
    format!(
        "Total Expenses     \u{20b9}{}\nTransaction Count  {}",
        summary.formatted_total(),
        summary.count
    )
}

fn render_expense(expense: &Expense) -> String {
    let date = expense
        .created_at
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}  {:<10}  {:<12}  \u{20b9}{:>10}  {}",
        expense.id,
        date,
        expense.category,
        format_amount(expense.amount),
        expense.description
    )
}

pub fn render_list(dashboard: &Dashboard) -> String {
    if dashboard.expenses().is_empty() {
        return "No expenses yet.".to_string();
    }
    dashboard
        .expenses()
        .iter()
        .map(render_expense)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_draft(draft: &ExpenseDraft) -> String {
    format!(
        "  description: {}\n  amount:      {}\n  category:    {}",
        draft.description, draft.amount, draft.category
    )
}

/// How the shell ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Quit,
    SignedOut,
    SessionLost,
}

/// Ask a y/N question on `out` and read the answer from `input`.
fn confirm<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> bool {
    if write!(out, "{question} [y/N] ").and_then(|_| out.flush()).is_err() {
        return false;
    }
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

fn report<W: Write>(out: &mut W, err: &DashboardError) -> io::Result<()> {
    writeln!(out, "error: {err}")
}

/// Run the shell until the user quits, signs out, or the session is lost.
pub fn run<T, R, W>(session: Session<T>, input: &mut R, out: &mut W) -> io::Result<Exit>
where
    T: Transport + Sync,
    R: BufRead,
    W: Write,
{
    let mut session = session;

    if let Err(err) = session.initialize() {
        report(out, &err)?;
        if err.is_session_lost() {
            writeln!(out, "Session expired. Please sign in again.")?;
            return Ok(Exit::SessionLost);
        }
    }
    writeln!(out, "{}", render_header(session.dashboard()))?;
    writeln!(out, "{}", render_summary(session.dashboard()))?;
    writeln!(out, "{}", render_list(session.dashboard()))?;

    loop {
        write!(out, "> ")?;
        out.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(Exit::Quit);
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(ParseError::Empty) => continue,
            Err(err) => {
                writeln!(out, "{err}")?;
                continue;
            }
        };
        debug!(?command, "shell command");

        let result = match command {
            Command::List => Ok(render_list(session.dashboard())),
            Command::Summary => Ok(render_summary(session.dashboard())),
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => return Ok(Exit::Quit),
            Command::Add {
                amount,
                category,
                description,
            } => session
                .create(ExpenseDraft::new(description, amount, category))
                .map(|_| "Expense added.".to_string()),
            Command::Edit(id) => session.begin_edit(&id).map(|_| {
                let draft = session
                    .dashboard()
                    .edit_draft()
                    .map(|edit| render_draft(&edit.draft))
                    .unwrap_or_default();
                format!("Editing {id}\n{draft}")
            }),
            Command::Set { field, value } => match session.edit_draft_mut() {
                Some(draft) => {
                    if draft.set(&field, value) {
                        Ok(render_draft(draft))
                    } else {
                        Ok(format!(
                            "unknown field \"{field}\", expected description, amount or category"
                        ))
                    }
                }
                None => Err(DashboardError::NotEditing),
            },
            Command::Save => session
                .commit_edit()
                .map(|_| "Expense updated.".to_string()),
            Command::Cancel => {
                session.cancel_edit();
                Ok("Edit discarded.".to_string())
            }
            Command::Remove(id) => session
                .delete(&id, |_| {
                    confirm(&mut *input, &mut *out, "Are you sure you want to delete this expense?")
                })
                .map(|_| "Expense deleted.".to_string()),
            Command::Refresh => session
                .initialize()
                .map(|_| render_list(session.dashboard())),
            Command::Logout => match session.end_session() {
                SignOut::SignedOut => {
                    writeln!(out, "Logged out.")?;
                    return Ok(Exit::SignedOut);
                }
                SignOut::Forced(err) => {
                    report(out, &err)?;
                    writeln!(out, "Signed out locally.")?;
                    return Ok(Exit::SignedOut);
                }
                SignOut::Kept(kept, err) => {
                    session = kept;
                    Err(err)
                }
            },
        };

        match result {
            Ok(message) if message.is_empty() => {}
            Ok(message) => writeln!(out, "{message}")?,
            Err(DashboardError::ConfirmationDeclined) => writeln!(out, "Deletion cancelled.")?,
            Err(err) if err.is_session_lost() => {
                report(out, &err)?;
                writeln!(out, "Session expired. Please sign in again.")?;
                return Ok(Exit::SessionLost);
            }
            Err(err) => report(out, &err)?,
        }
    }
}
