use std::io::{BufRead, Write};

use chatty_storage::{MemoryStorage, MessageStore, SqliteStorage, StorageError};
use snafu::{ResultExt, Snafu};

use crate::chat::{
    ConversationAction, ConversationPresenter, ConversationSurface, MessageRow, RowKey,
    ScrollManager,
};
use crate::settings::StoreLocation;

const DEFAULT_SCROLL_STEP: usize = 5;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("message store failed on `{stage}`: {source}"))]
    Store {
        stage: &'static str,
        source: StorageError,
    },
    #[snafu(display("failed to read terminal input on `{stage}`: {source}"))]
    ReadInput {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to draw terminal output on `{stage}`: {source}"))]
    WriteOutput {
        stage: &'static str,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum CommandError {
    #[snafu(display("unknown command `/{name}`; try /delete, /clear, /up, /down, /quit or //text"))]
    UnknownCommand { name: String },
    #[snafu(display("`{raw}` is not a row number"))]
    InvalidRow { raw: String },
    #[snafu(display("`{raw}` is not a scroll step"))]
    InvalidStep { raw: String },
    #[snafu(display("/delete needs at least one row number"))]
    MissingRows,
}

/// Opens the backend named by the settings.
pub fn open_store(location: &StoreLocation) -> Result<Box<dyn MessageStore>, AppError> {
    match location {
        StoreLocation::Memory => {
            tracing::info!("using in-memory message store; nothing will be saved");
            Ok(Box::new(MemoryStorage::new()))
        }
        StoreLocation::Sqlite(database) => {
            let storage = SqliteStorage::open(database).context(StoreSnafu {
                stage: "open-sqlite-store",
            })?;
            Ok(Box::new(storage))
        }
    }
}

/// Maps one input line to an action.
///
/// Lines starting with `/` are commands; anything else is message text.
/// A leading `//` sends the rest as text with a single `/`.
/// Row numbers are 1-based as displayed.
pub fn parse_command(line: &str) -> Result<ConversationAction, CommandError> {
    let body = line.trim_start();
    if body.starts_with("//") {
        let indent = &line[..line.len() - body.len()];
        return Ok(ConversationAction::Submit(format!("{indent}{}", &body[1..])));
    }
    let Some(command) = body.strip_prefix('/') else {
        return Ok(ConversationAction::Submit(line.to_string()));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arguments = parts.collect::<Vec<_>>();

    match name {
        "delete" | "d" => {
            if arguments.is_empty() {
                return MissingRowsSnafu.fail();
            }
            let rows = arguments
                .into_iter()
                .map(parse_row_number)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ConversationAction::DeleteRows(rows))
        }
        "clear" => Ok(ConversationAction::DeleteAll),
        "up" => Ok(ConversationAction::ScrollUp(parse_step(arguments.first())?)),
        "down" => Ok(ConversationAction::ScrollDown(parse_step(arguments.first())?)),
        "quit" | "q" => Ok(ConversationAction::Quit),
        other => UnknownCommandSnafu { name: other }.fail(),
    }
}

fn parse_row_number(raw: &str) -> Result<usize, CommandError> {
    match raw.parse::<usize>() {
        Ok(row) if row > 0 => Ok(row - 1),
        _ => InvalidRowSnafu { raw }.fail(),
    }
}

fn parse_step(raw: Option<&&str>) -> Result<usize, CommandError> {
    match raw {
        None => Ok(DEFAULT_SCROLL_STEP),
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| CommandError::InvalidStep { raw: raw.to_string() }),
    }
}

/// Bottom-anchored message list drawn as plain text lines.
pub struct TerminalSurface<W: Write> {
    writer: W,
    rows: Vec<MessageRow>,
    scroll: ScrollManager,
    height: usize,
    notice: Option<String>,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(writer: W, height: usize) -> Self {
        Self {
            writer,
            rows: Vec::new(),
            scroll: ScrollManager::new(),
            height: height.max(1),
            notice: None,
        }
    }

    pub fn rows(&self) -> &[MessageRow] {
        &self.rows
    }

    pub fn scroll(&self) -> &ScrollManager {
        &self.scroll
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll.scroll_up(rows, self.rows.len(), self.height);
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll.scroll_down(rows);
    }

    /// One-line message shown under the list on the next draw.
    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    /// Text lines of the visible viewport, padding first.
    pub fn frame_lines(&self) -> Vec<String> {
        let viewport = self.scroll.viewport(self.rows.len(), self.height);
        let mut lines = vec![String::new(); viewport.padding];
        lines.extend(
            self.rows[viewport.start..viewport.end]
                .iter()
                .enumerate()
                .map(|(offset, row)| format!("{:>4} | {}", viewport.start + offset + 1, row.text)),
        );
        lines
    }

    pub fn draw(&mut self, placeholder: &str) -> std::io::Result<()> {
        writeln!(self.writer, "---- {} message(s) ----", self.rows.len())?;
        for line in self.frame_lines() {
            writeln!(self.writer, "{line}")?;
        }
        if let Some(notice) = self.notice.take() {
            writeln!(self.writer, "! {notice}")?;
        }
        write!(self.writer, "[{placeholder}] > ")?;
        self.writer.flush()
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<W: Write> ConversationSurface for TerminalSurface<W> {
    fn render_rows(&mut self, rows: &[MessageRow]) {
        self.rows = rows.to_vec();
        self.scroll.clamp(self.rows.len(), self.height);
    }

    fn scroll_to(&mut self, key: &RowKey) {
        if let Some(index) = self.rows.iter().position(|row| &row.key == key) {
            self.scroll.scroll_to_row(index, self.rows.len(), self.height);
        }
    }
}

/// Reads lines until `/quit` or end of input, redrawing after each one.
pub fn run<S, R, W>(
    presenter: &mut ConversationPresenter<S>,
    input: R,
    surface: &mut TerminalSurface<W>,
) -> Result<(), AppError>
where
    S: MessageStore,
    R: BufRead,
    W: Write,
{
    presenter.sync(surface).context(StoreSnafu {
        stage: "initial-sync",
    })?;
    draw(presenter, surface)?;

    for line in input.lines() {
        let line = line.context(ReadInputSnafu { stage: "read-line" })?;

        match parse_command(&line) {
            Ok(ConversationAction::Quit) => break,
            Ok(action) => apply(presenter, surface, action)?,
            Err(error) => surface.set_notice(error.to_string()),
        }

        presenter.sync(surface).context(StoreSnafu { stage: "sync" })?;
        draw(presenter, surface)?;
    }

    Ok(())
}

fn apply<S, W>(
    presenter: &mut ConversationPresenter<S>,
    surface: &mut TerminalSurface<W>,
    action: ConversationAction,
) -> Result<(), AppError>
where
    S: MessageStore,
    W: Write,
{
    match action {
        ConversationAction::Submit(text) => {
            presenter.input_mut().set_text(text);
            presenter
                .submit_input()
                .context(StoreSnafu { stage: "submit" })?;
        }
        ConversationAction::DeleteRows(rows) => {
            let removed = presenter
                .delete_at(&rows)
                .context(StoreSnafu { stage: "delete-rows" })?;
            if removed == 0 {
                surface.set_notice("no such row");
            }
        }
        ConversationAction::DeleteAll => {
            presenter
                .delete_all()
                .context(StoreSnafu { stage: "delete-all" })?;
        }
        ConversationAction::ScrollUp(rows) => surface.scroll_up(rows),
        ConversationAction::ScrollDown(rows) => surface.scroll_down(rows),
        ConversationAction::Quit => {}
    }
    Ok(())
}

fn draw<S, W>(
    presenter: &ConversationPresenter<S>,
    surface: &mut TerminalSurface<W>,
) -> Result<(), AppError>
where
    S: MessageStore,
    W: Write,
{
    surface
        .draw(presenter.input().placeholder())
        .context(WriteOutputSnafu { stage: "draw-frame" })
}
