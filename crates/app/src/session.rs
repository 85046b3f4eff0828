//! Line-oriented study session on stdin/stdout.

use std::fmt;
use std::io::Write as _;
use std::path::PathBuf;

use coach_core::model::{ChatRole, ProblemId};
use services::{StudyContext, StudyError};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    List,
    Select(String),
    Show,
    Done,
    Hints,
    Hint(usize),
    Solution,
    Lab(PathBuf),
    Recent,
    Ask(String),
    Chat,
    Clear,
    Help,
    Quit,
}

#[derive(Debug, PartialEq, Eq)]
enum CommandError {
    Unknown(String),
    MissingArgument { command: &'static str },
    InvalidHintNumber(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Unknown(word) => write!(f, "unknown command: {word} (try `help`)"),
            CommandError::MissingArgument { command } => {
                write!(f, "{command} requires an argument")
            }
            CommandError::InvalidHintNumber(raw) => write!(f, "invalid hint number: {raw}"),
        }
    }
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));

        let argument = |command: &'static str| {
            if rest.is_empty() {
                Err(CommandError::MissingArgument { command })
            } else {
                Ok(rest.to_string())
            }
        };

        let command = match word {
            "list" | "ls" => Self::List,
            "select" | "open" => Self::Select(argument("select")?),
            "show" => Self::Show,
            "done" | "toggle" => Self::Done,
            "hints" => Self::Hints,
            "hint" => {
                let raw = argument("hint")?;
                let number = raw
                    .parse()
                    .map_err(|_| CommandError::InvalidHintNumber(raw.clone()))?;
                Self::Hint(number)
            }
            "solution" => Self::Solution,
            "lab" => Self::Lab(if rest.is_empty() {
                PathBuf::from(".")
            } else {
                PathBuf::from(rest)
            }),
            "recent" => Self::Recent,
            "ask" => Self::Ask(argument("ask")?),
            "chat" => Self::Chat,
            "clear" => Self::Clear,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn print_help() {
    println!("Commands:");
    println!("  list              problems by group (* = current)");
    println!("  select <id>       make a problem current");
    println!("  show              show the current problem");
    println!("  done              toggle completion of the current problem");
    println!("  hints | hint <n>  list hints, or show hint n");
    println!("  solution          show the solution");
    println!("  lab [dir]         write the lab archive into dir (default .)");
    println!("  recent            recently visited problems");
    println!("  ask <message>     ask the coach about the current problem");
    println!("  chat              show this problem's conversation");
    println!("  clear             clear this problem's conversation");
    println!("  quit");
}

fn prompt() {
    print!("> ");
    // A failed flush only loses the prompt marker.
    let _ = std::io::stdout().flush();
}

/// Drive the session until `quit` or end of input.
///
/// # Errors
///
/// Returns an error if stdin cannot be read or startup storage access fails.
pub async fn run(context: &StudyContext) -> Result<(), Box<dyn std::error::Error>> {
    if context.catalog().is_empty() {
        println!("No problems found.");
        return Ok(());
    }

    let mut current = context
        .resolve_current()
        .await?
        .map(|resolved| resolved.entry.id().clone());
    if let Some(id) = &current {
        context.select(id).await?;
        show(context, id).await?;
    }
    println!("Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }

        if let Err(err) = dispatch(context, &mut current, command).await {
            println!("error: {err}");
        }
    }
    Ok(())
}

async fn dispatch(
    context: &StudyContext,
    current: &mut Option<ProblemId>,
    command: Command,
) -> Result<(), StudyError> {
    match command {
        Command::Help | Command::Quit => print_help(),
        Command::List => list(context).await?,
        Command::Recent => {
            for entry in context.recent_problems().await? {
                println!("  {}  {}", entry.id(), entry.name());
            }
        }
        Command::Select(raw) => {
            let Ok(id) = raw.parse::<ProblemId>() else {
                println!("invalid problem id: {raw}");
                return Ok(());
            };
            context.select(&id).await?;
            show(context, &id).await?;
            *current = Some(id);
        }
        command => {
            let Some(id) = current.as_ref() else {
                println!("No problem selected.");
                return Ok(());
            };
            on_current(context, id, command).await?;
        }
    }
    Ok(())
}

async fn on_current(
    context: &StudyContext,
    id: &ProblemId,
    command: Command,
) -> Result<(), StudyError> {
    match command {
        Command::Show => show(context, id).await?,
        Command::Done => {
            if context.toggle_completion(id).await? {
                println!("Marked complete.");
            } else {
                println!("Marked incomplete.");
            }
        }
        Command::Hints => {
            let names = context.view(id)?.hint_names();
            if names.is_empty() {
                println!("No hints for this problem.");
            }
            for (index, name) in names.iter().enumerate() {
                println!("  {}. {name}", index + 1);
            }
        }
        Command::Hint(number) => println!("{}", context.view(id)?.read_hint(number)?),
        Command::Solution => println!("{}", context.view(id)?.read_solution()?),
        Command::Lab(dir) => {
            let archive = context.lab_archive(id)?;
            let target = dir.join(&archive.file_name);
            match tokio::fs::write(&target, &archive.bytes).await {
                Ok(()) => println!("Wrote {}", target.display()),
                Err(err) => println!("cannot write {}: {err}", target.display()),
            }
        }
        Command::Ask(text) => {
            println!("Thinking...");
            let reply = context.ask(id, &text).await?;
            println!("coach: {}", reply.text);
        }
        Command::Chat => {
            let turns = context.open_chat(id)?;
            if turns.is_empty() {
                println!("No messages yet. Use `ask <message>` to start.");
            }
            for turn in turns {
                let speaker = match turn.role {
                    ChatRole::User => "you",
                    ChatRole::Assistant => "coach",
                    ChatRole::System => continue,
                };
                println!("{speaker}: {}", turn.text);
            }
        }
        Command::Clear => {
            context.coach().clear(id)?;
            println!("Conversation cleared.");
        }
        Command::List | Command::Recent | Command::Select(_) | Command::Help | Command::Quit => {}
    }
    Ok(())
}

async fn list(context: &StudyContext) -> Result<(), StudyError> {
    let catalog = context.catalog();
    for group in catalog.groups() {
        println!("{}", group.name);
        for entry in catalog.group_entries(group) {
            let view = context.view(entry.id())?;
            let label = view.display_label().await?;
            let marker = if view.is_current().await? { '*' } else { ' ' };
            println!(" {marker} {:<32} {label}", entry.id().as_str());
        }
    }
    Ok(())
}

async fn show(context: &StudyContext, id: &ProblemId) -> Result<(), StudyError> {
    let view = context.view(id)?;
    let entry = view.entry();

    println!();
    println!("# {}", view.display_label().await?);
    println!("({} / {})", entry.group(), entry.id());
    println!("Files: {}", entry.directory().display());
    for (key, value) in entry.metadata().display_rows() {
        println!("{key}: {value}");
    }
    println!();
    println!("{}", entry.body());
    println!();

    let mut footer = vec![format!("{} hint(s)", entry.hint_files().len())];
    if entry.has_lab() {
        footer.push("lab available".to_string());
    }
    let messages = context.coach().message_count(id);
    if messages > 0 {
        footer.push(format!("{messages} message(s) with the coach"));
    }
    println!("[{}]", footer.join(" | "));
    Ok(())
}
