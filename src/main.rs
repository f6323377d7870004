use std::{
    fs::OpenOptions,
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use nba_stats::{
    data::{ClientConfig, DataClient},
    endpoints::{parse_param, CommonAllPlayers, Endpoint, LeagueDashLineups, RawEndpoint, Season},
    is_valid_json, Dataset, Envelope,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use tui_big_text::{BigText, PixelSize};

/// Widest a column gets before values are cut off.
const MAX_COLUMN_WIDTH: usize = 24;

type FetchUpdate = std::result::Result<(Envelope, DateTime<Local>), String>;

#[derive(Debug, Default)]
struct App {
    should_quit: bool,
    envelope: Option<Envelope>,
    state: ListState,
    hide_empty: bool,
    row_offset: usize,
    last_fetch: Option<DateTime<Local>>,
    last_error: Option<String>,
}

impl App {
    fn new() -> Self {
        let mut app = Self::default();
        app.state.select(Some(0));
        app
    }

    fn next(&mut self) {
        let len = self.visible_datasets().len();
        if len == 0 { return; }

        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
        self.row_offset = 0;
    }

    fn previous(&mut self) {
        let len = self.visible_datasets().len();
        if len == 0 { return; }

        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
        self.row_offset = 0;
    }

    fn toggle_hide_empty(&mut self) {
        self.hide_empty = !self.hide_empty;
        self.state.select(Some(0));
        self.row_offset = 0;
    }

    fn scroll_rows(&mut self, delta: isize) {
        let max = self.selected_dataset().map(|ds| ds.row_count()).unwrap_or(0);
        let next = self.row_offset.saturating_add_signed(delta);
        self.row_offset = next.min(max.saturating_sub(1));
    }

    /// All tables in response order, including repeated names, so every one
    /// of them can be inspected.
    fn visible_datasets(&self) -> Vec<Dataset<'_>> {
        match &self.envelope {
            Some(env) => env
                .datasets()
                .filter(|ds| !self.hide_empty || !ds.is_empty())
                .collect(),
            None => Vec::new(),
        }
    }

    fn selected_dataset(&self) -> Option<Dataset<'_>> {
        let i = self.state.selected().unwrap_or(0);
        self.visible_datasets().get(i).copied()
    }

    fn apply(&mut self, update: FetchUpdate) {
        match update {
            Ok((env, at)) => {
                self.envelope = Some(env);
                self.last_fetch = Some(at);
                self.last_error = None;
                let len = self.visible_datasets().len();
                if self.state.selected().map_or(true, |i| i >= len) {
                    self.state.select(Some(0));
                    self.row_offset = 0;
                }
            }
            Err(e) => self.last_error = Some(e),
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Stats resource to query
    #[arg(short, long, default_value = "leaguedashlineups")]
    endpoint: String,

    /// Query parameter as KEY=VALUE; repeat for more
    #[arg(short = 'p', long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Season start year, used for default parameters
    #[arg(short, long)]
    season: Option<u16>,

    /// Read a saved response instead of calling the API
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Print every dataset as JSON records and exit
    #[arg(long)]
    dump: bool,

    /// Refresh interval in seconds
    #[arg(short, long, default_value_t = 60)]
    interval: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Retries for failed requests
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Where to write logs; the terminal belongs to the UI
    #[arg(long, default_value = "nba-stats.log")]
    log_file: PathBuf,
}

enum Source {
    File(PathBuf),
    Remote(RawEndpoint),
}

impl Source {
    fn from_args(args: &Args) -> Self {
        if let Some(path) = &args.file {
            return Source::File(path.clone());
        }

        let mut endpoint = RawEndpoint::new(args.endpoint.as_str());
        endpoint.params = args.params.clone();
        if endpoint.params.is_empty() {
            let season = args.season.map(Season).unwrap_or_else(Season::current);
            let defaults = if args.endpoint == LeagueDashLineups::RESOURCE {
                LeagueDashLineups::new(season).params()
            } else if args.endpoint == CommonAllPlayers::RESOURCE {
                CommonAllPlayers { season, current_season_only: true }.params()
            } else {
                Vec::new()
            };
            endpoint.params = defaults
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
        }
        Source::Remote(endpoint)
    }

    async fn load(&self, client: &DataClient) -> Result<Envelope> {
        match self {
            Source::File(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                if !is_valid_json(&bytes) {
                    bail!("{} is not valid JSON", path.display());
                }
                Envelope::decode(&bytes)
                    .with_context(|| format!("Failed to decode {}", path.display()))
            }
            Source::Remote(endpoint) => endpoint.call(client).await,
        }
    }
}

fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_file)?;

    let client = Arc::new(DataClient::with_config(ClientConfig {
        timeout: Duration::from_secs(args.timeout),
        retries: args.retries,
        ..ClientConfig::default()
    })?);
    let source = Source::from_args(&args);

    if args.dump {
        let env = source.load(&client).await?;
        println!("{}", serde_json::to_string_pretty(&env.to_normalized())?);
        return Ok(());
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new();

    let (tx, mut rx) = mpsc::channel::<FetchUpdate>(16);
    let interval_secs = args.interval;

    // Background refresh
    tokio::spawn(async move {
        loop {
            let update = match source.load(&client).await {
                Ok(env) => Ok((env, Local::now())),
                Err(e) => {
                    tracing::error!("Fetch failed: {:#}", e);
                    Err(format!("{:#}", e))
                }
            };
            if tx.send(update).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_secs(interval_secs)).await;
        }
    });

    let res = run_app(&mut terminal, &mut app, &mut rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{:?}", err)
    }

    Ok(())
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: &mut mpsc::Receiver<FetchUpdate>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') => app.should_quit = true,
                    KeyCode::Char('f') => app.toggle_hide_empty(),
                    KeyCode::Down | KeyCode::Char('j') => app.next(),
                    KeyCode::Up | KeyCode::Char('k') => app.previous(),
                    KeyCode::PageDown | KeyCode::Char('d') => app.scroll_rows(10),
                    KeyCode::PageUp | KeyCode::Char('u') => app.scroll_rows(-10),
                    _ => {}
                }
            }
        }

        while let Ok(update) = rx.try_recv() {
            app.apply(update);
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25), Constraint::Percentage(75)].as_ref())
        .split(f.area());

    draw_sidebar(f, app, chunks[0]);
    draw_main_panel(f, app, chunks[1]);
}

fn draw_sidebar(f: &mut Frame, app: &mut App, area: Rect) {
    let items: Vec<ListItem> = app
        .visible_datasets()
        .iter()
        .map(|ds| ListItem::new(format!("{}  [{}]", ds.name(), ds.row_count())))
        .collect();

    let title = if app.hide_empty { " DATASETS (non-empty) " } else { " DATASETS " };

    let list = List::new(items)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray).fg(Color::White));

    f.render_stateful_widget(list, area, &mut app.state);
}

fn draw_main_panel(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL);
    let inner_area = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Resource
            Constraint::Min(3),    // Rows
            Constraint::Length(3), // Status Bar
        ].as_ref())
        .split(inner_area);

    let Some(env) = &app.envelope else {
        let msg = app.last_error.as_deref().unwrap_or("Loading...");
        let p = Paragraph::new(msg).alignment(Alignment::Center);
        f.render_widget(p, inner_area);
        return;
    };

    // --- Resource Header ---
    let resource = if env.resource().is_empty() { "?" } else { env.resource() };
    if chunks[0].width as usize >= resource.len() * 4 {
        let title = BigText::builder()
            .pixel_size(PixelSize::Quadrant)
            .style(Style::default().fg(Color::White))
            .lines(vec![resource.to_string().into()])
            .alignment(Alignment::Center)
            .build();
        f.render_widget(title, chunks[0]);
    } else {
        let p = Paragraph::new(resource.to_string())
            .style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center);
        f.render_widget(p, chunks[0]);
    }

    // --- Rows ---
    match app.selected_dataset() {
        Some(ds) => draw_dataset(f, ds, app.row_offset, chunks[1]),
        None => {
            let p = Paragraph::new("No datasets in this response").alignment(Alignment::Center);
            f.render_widget(p, chunks[1]);
        }
    }

    // --- Status Bar ---
    let mut status = vec![];
    if let Some(ds) = app.selected_dataset() {
        status.push(Span::styled(
            format!(" {} ", ds.name()),
            Style::default().bg(Color::White).fg(Color::Black).add_modifier(Modifier::BOLD),
        ));
        status.push(Span::raw(format!(
            "  rows {}-{} of {}",
            (app.row_offset + 1).min(ds.row_count()),
            ds.row_count().min(app.row_offset + chunks[1].height as usize),
            ds.row_count()
        )));
        let mismatched = ds.mismatched_rows();
        if mismatched > 0 {
            status.push(Span::styled(
                format!("  [{} rows do not match {} headers]", mismatched, ds.headers().len()),
                Style::default().fg(Color::Yellow),
            ));
        }
    }
    if let Some(at) = app.last_fetch {
        status.push(Span::styled(format!("  updated {}", at.format("%H:%M:%S")), Style::default().fg(Color::Cyan)));
    }
    if let Some(err) = &app.last_error {
        status.push(Span::styled(format!("  {}", err), Style::default().fg(Color::Red)));
    }
    let status_bar = Paragraph::new(Line::from(status)).block(Block::default().borders(Borders::TOP | Borders::BOTTOM));
    f.render_widget(status_bar, chunks[2]);
}

fn draw_dataset(f: &mut Frame, ds: Dataset<'_>, offset: usize, area: Rect) {
    if ds.headers().is_empty() {
        let p = Paragraph::new(format!("No headers; {} row(s) carry no named values", ds.row_count()))
            .alignment(Alignment::Center);
        f.render_widget(p, area);
        return;
    }

    let visible = area.height.saturating_sub(1) as usize;
    let records: Vec<_> = ds.iter().skip(offset).take(visible).collect();

    // Records keep the first of any repeated header, so columns do the same.
    let mut columns: Vec<&str> = Vec::new();
    for h in ds.headers() {
        if !columns.contains(&h.as_str()) {
            columns.push(h);
        }
    }

    let widths: Vec<Constraint> = columns
        .iter()
        .map(|col| {
            let widest = records
                .iter()
                .filter_map(|r| r.get(*col))
                .map(|v| v.to_string().chars().count())
                .fold(col.chars().count(), usize::max);
            Constraint::Length(widest.min(MAX_COLUMN_WIDTH) as u16)
        })
        .collect();

    let header = Row::new(columns.iter().map(|c| Cell::from(c.to_string())))
        .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Yellow));

    let rows = records.iter().map(|rec| {
        Row::new(columns.iter().map(|col| {
            let cell = rec.get(*col).map(|v| v.to_string()).unwrap_or_default();
            Cell::from(cell)
        }))
    });

    let table = Table::new(rows, widths).header(header).column_spacing(1);
    f.render_widget(table, area);
}
