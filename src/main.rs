use anyhow::{Context, Result};
use clap::Parser;
use covid_map::app::App;
use covid_map::config::{Config, Settings};
use covid_map::data::{self, Dataset, LoadError};
use covid_map::{logging, report, ui};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use log::info;
use ratatui::layout::Rect;
use ratatui::DefaultTerminal;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::oneshot::{self, error::TryRecvError};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// GeoJSON source: an http(s) URL or a local file
    #[arg(short, long, value_name = "URL|PATH")]
    source: Option<String>,

    /// TOML file overriding the built-in configuration
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the total and histogram to stdout instead of opening the map
    #[arg(long)]
    summary: bool,

    /// With --summary, also print this state's time series
    #[arg(long, requires = "summary")]
    state: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    // Logging to stderr would draw over the terminal UI
    let held_log = logging::init(!cli.summary);

    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    if let Some(source) = cli.source {
        config.data.source = source;
    }
    let settings = config.into_settings()?;

    let runtime = Runtime::new().context("Failed to start async runtime")?;

    if cli.summary {
        return print_summary(&runtime, &settings, cli.state.as_deref());
    }

    // The fetch runs in the background; the UI shows "Loading..." until it lands
    let (tx, rx) = oneshot::channel();
    let source = settings.source.clone();
    let names = settings.names.clone();
    runtime.spawn(async move {
        let _ = tx.send(data::load(&source, &names).await);
    });

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    // Enable mouse capture
    execute!(std::io::stdout(), EnableMouseCapture)?;

    // Run the app
    let result = run(&mut terminal, settings, rx);

    // Disable mouse capture and restore terminal
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    let flushed = held_log.drain_to(&mut std::io::stderr());
    result?;
    flushed.context("Failed to write held log records")
}

/// Handle mouse events for panning, zooming and picking
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    // Always track mouse position for cursor marker
    app.set_mouse_pos(mouse.column, mouse.row);

    match mouse.kind {
        // Scroll wheel for zooming towards mouse position
        MouseEventKind::ScrollUp => app.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.zoom_out_at(mouse.column, mouse.row),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),
        // Click selects a state, drag pans
        MouseEventKind::Down(MouseButton::Left) => app.press(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => app.handle_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.release(mouse.column, mouse.row),
        _ => {}
    }
}

fn run(
    terminal: &mut DefaultTerminal,
    settings: Settings,
    mut pending: oneshot::Receiver<Result<Dataset, LoadError>>,
) -> Result<()> {
    let size = terminal.size()?;
    let screen = Rect::new(0, 0, size.width, size.height);
    let mut app = App::new(settings, Rect::default());
    app.resize(ui::map_area(screen, &app));
    app.reset();

    // Main loop
    loop {
        if app.is_loading() {
            match pending.try_recv() {
                Ok(result) => app.finish_loading(result),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Closed) => app.finish_loading(Err(LoadError::Interrupted)),
            }
        }

        // Draw
        terminal.draw(|frame| ui::render(frame, &app))?;

        // Handle events with ~60fps target
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) => {
                    // Only handle key press events (not release)
                    if key.kind == KeyEventKind::Press {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Esc => app.quit(),

                            // Pan with hjkl or arrow keys
                            KeyCode::Left | KeyCode::Char('h') => app.pan(-10, 0),
                            KeyCode::Right | KeyCode::Char('l') => app.pan(10, 0),
                            KeyCode::Up | KeyCode::Char('k') => app.pan(0, -6),
                            KeyCode::Down | KeyCode::Char('j') => app.pan(0, 6),

                            // Zoom
                            KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
                            KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

                            // Layer toggles
                            KeyCode::Char('f') | KeyCode::Char('F') => app.toggle_fill(),
                            KeyCode::Char('b') | KeyCode::Char('B') => app.toggle_outlines(),

                            // Reset view
                            KeyCode::Char('r') | KeyCode::Char('0') => app.reset(),

                            _ => {}
                        }
                    }
                }
                Event::Mouse(mouse) => {
                    handle_mouse(&mut app, mouse);
                }
                Event::Resize(width, height) => {
                    let area = ui::map_area(Rect::new(0, 0, width, height), &app);
                    app.resize(area);
                }
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Load synchronously and print the numbers behind the charts
fn print_summary(runtime: &Runtime, settings: &Settings, state: Option<&str>) -> Result<()> {
    let dataset = runtime
        .block_on(data::load(&settings.source, &settings.names))
        .with_context(|| format!("Failed to load {}", settings.source))?;
    info!("Summarising {} features", dataset.len());

    print!("{}", report::summary(&dataset, settings, state)?);
    Ok(())
}
