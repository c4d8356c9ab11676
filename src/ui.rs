use crate::app::{App, LoadState, Popup};
use crate::braille::BrailleCanvas;
use crate::charts::{compact_tick, format_count, HistogramChart, SeriesChart};
use crate::map::MapLayers;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Clear, Dataset, GraphType,
        Paragraph, Widget,
    },
    Frame,
};

const SIDEBAR_WIDTH: u16 = 44;
const BAR_COLOR: Color = Color::Rgb(0xfd, 0x8d, 0x3c);
const LINE_COLOR: Color = Color::Rgb(0xff, 0x6b, 0x6b);
const ACCENT: Color = Color::Rgb(0xe6, 0x55, 0x0d);

/// Screen regions for one frame
struct Panes {
    map: Rect,
    total: Rect,
    legend: Rect,
    histogram: Rect,
    series: Rect,
    status: Rect,
}

fn panes(area: Rect, legend_rows: u16) -> Panes {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map + sidebar
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(SIDEBAR_WIDTH)])
        .split(rows[0]);

    let sidebar = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(legend_rows + 2),
            Constraint::Length(12),
            Constraint::Min(6),
        ])
        .split(columns[1]);

    Panes {
        map: columns[0],
        total: sidebar[0],
        legend: sidebar[1],
        histogram: sidebar[2],
        series: sidebar[3],
        status: rows[1],
    }
}

fn map_block() -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " COVID-19 cases by state ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

/// Inner map area for a terminal of the given size
pub fn map_area(area: Rect, app: &App) -> Rect {
    let panes = panes(area, app.settings.colors.stops().len() as u16);
    map_block().inner(panes.map)
}

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let panes = panes(frame.area(), app.settings.colors.stops().len() as u16);

    render_map(frame, app, panes.map);
    render_total(frame, app, panes.total);
    render_legend(frame, app, panes.legend);
    render_histogram(frame, app, panes.histogram);
    render_series(frame, app, panes.series);
    render_status_bar(frame, app, panes.status);
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let block = map_block();
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let session = match &app.state {
        LoadState::Ready(session) => session,
        LoadState::Loading => {
            let text = Paragraph::new("Fetching case data...")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(text, centered_row(inner));
            return;
        }
        LoadState::Failed(reason) => {
            let text = Paragraph::new(format!("Error loading data: {}", reason))
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Red));
            frame.render_widget(text, centered_row(inner));
            return;
        }
    };

    // Braille gives 2x4 resolution per character
    let mut viewport = app.viewport.clone();
    viewport.width = inner.width as usize * 2;
    viewport.height = inner.height as usize * 4;

    let layers = session.map.render(
        &session.dataset,
        inner.width as usize,
        inner.height as usize,
        &viewport,
    );

    let cursor_pos = app
        .mouse_pos
        .filter(|&(col, row)| app.to_pixel(col, row).is_some())
        .map(|(col, row)| (col.saturating_sub(inner.x), row.saturating_sub(inner.y)));

    frame.render_widget(MapWidget { layers, cursor_pos }, inner);

    if let Some(popup) = &app.popup {
        render_popup(frame, app, popup, inner);
    }
}

fn centered_row(area: Rect) -> Rect {
    Rect::new(area.x, area.y + area.height / 2, area.width, area.height.min(1))
}

/// Braille choropleth with outlines and cursor overlaid
struct MapWidget {
    layers: MapLayers,
    cursor_pos: Option<(u16, u16)>,
}

impl MapWidget {
    /// Render a braille canvas layer; cells without ink use `default`
    fn render_layer(canvas: &BrailleCanvas, default: Color, area: Rect, buf: &mut Buffer) {
        for (row_idx, row_str) in canvas.rows().enumerate() {
            if row_idx >= area.height as usize {
                break;
            }
            let y = area.y + row_idx as u16;

            for (col_idx, ch) in row_str.chars().enumerate() {
                if col_idx >= area.width as usize {
                    break;
                }
                // Skip empty braille characters (U+2800)
                if ch == '\u{2800}' {
                    continue;
                }
                let x = area.x + col_idx as u16;
                let color = canvas.cell_color(col_idx, row_idx).unwrap_or(default);
                buf[(x, y)].set_char(ch).set_fg(color);
            }
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Self::render_layer(&self.layers.fill, Color::Gray, area, buf);
        Self::render_layer(&self.layers.outlines, Color::White, area, buf);

        if let Some((cx, cy)) = self.cursor_pos {
            let x = area.x + cx;
            let y = area.y + cy;
            if x < area.x + area.width && y < area.y + area.height {
                buf[(x, y)].set_char('╋').set_fg(Color::Red);
            }
        }
    }
}

fn render_popup(frame: &mut Frame, app: &App, popup: &Popup, map: Rect) {
    let lines = vec![
        Line::from(Span::styled(
            popup.name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("Cases as of {}:", app.settings.reference_date)),
        Line::from(Span::styled(
            format_count(popup.cases),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
    ];

    let content_width = lines.iter().map(Line::width).max().unwrap_or(0) as u16;
    let width = (content_width + 4).min(map.width);
    let height = (lines.len() as u16 + 2).min(map.height);

    // Open to the right of the click, shifted back inside the map if needed
    let (col, row) = popup.at;
    let x = (col + 1).min(map.x + map.width - width).max(map.x);
    let y = row.min(map.y + map.height - height).max(map.y);
    let area = Rect::new(x, y, width, height);

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Gray)),
    );
    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn render_total(frame: &mut Frame, app: &App, area: Rect) {
    let style = match app.state {
        LoadState::Failed(_) => Style::default().fg(Color::Red),
        _ => Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
    };
    let paragraph = Paragraph::new(Span::styled(app.count_text(), style))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(format!(" Total cases ({}) ", app.settings.reference_date)),
        );
    frame.render_widget(paragraph, area);
}

fn render_legend(frame: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app
        .settings
        .colors
        .stops()
        .iter()
        .map(|stop| {
            Line::from(vec![
                Span::styled("██ ", Style::default().fg(stop.color())),
                Span::raw(stop.label.clone()),
            ])
        })
        .collect();

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Total Cases "),
    );
    frame.render_widget(paragraph, area);
}

fn render_histogram(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" # of States by case bracket ");

    let Some(chart) = app.dashboard.histogram.get() else {
        frame.render_widget(block, area);
        return;
    };
    frame.render_widget(histogram_widget(chart, block, area.width), area);
}

fn histogram_widget<'a>(chart: &'a HistogramChart, block: Block<'a>, width: u16) -> BarChart<'a> {
    let columns = &chart.columns;
    let n = columns.counts.len().max(1) as u16;
    // Borders take two columns; keep one column of gap between bars
    let bar_width = (width.saturating_sub(2) / n).saturating_sub(1).max(1);

    let bars: Vec<Bar> = columns
        .categories
        .iter()
        .zip(&columns.counts)
        .map(|(label, &value)| {
            Bar::default()
                .value(value)
                .label(Line::from(label.as_str()))
                .style(Style::default().fg(BAR_COLOR))
                .value_style(Style::default().fg(Color::Black).bg(BAR_COLOR))
        })
        .collect();

    BarChart::default()
        .block(block)
        .data(BarGroup::default().bars(&bars))
        .max(chart.max)
        .bar_gap(1)
        .bar_width(bar_width)
}

fn render_series(frame: &mut Frame, app: &App, area: Rect) {
    let Some(chart) = app.dashboard.series.get() else {
        let placeholder = Paragraph::new("Click a state to see its history")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title(" Cases Over Time (click a state) "),
            );
        frame.render_widget(placeholder, area);
        return;
    };
    frame.render_widget(series_widget(chart), area);
}

fn series_widget(chart: &SeriesChart) -> Chart<'_> {
    let dataset = Dataset::default()
        .name(chart.columns.name.as_str())
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(LINE_COLOR))
        .data(&chart.points);

    let [y_min, y_max] = chart.y_bounds;
    let y_labels = vec![
        Line::from(compact_tick(y_min)),
        Line::from(compact_tick((y_min + y_max) / 2.0)),
        Line::from(compact_tick(y_max)),
    ];
    let x_labels: Vec<Line> = chart.x_labels.iter().map(|l| Line::from(l.as_str())).collect();

    Chart::new(vec![dataset])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(format!(" Cases Over Time: {} ", chart.columns.name)),
        )
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds(chart.x_bounds())
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds(chart.y_bounds)
                .labels(y_labels),
        )
        .legend_position(None)
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (show_fill, show_outlines) = app
        .session()
        .map(|s| (s.map.settings.show_fill, s.map.settings.show_outlines))
        .unwrap_or((true, true));

    let toggle = |on: bool, on_text: &'static str, off_text: &'static str| {
        Span::styled(
            if on { on_text } else { off_text },
            Style::default().fg(if on { Color::Green } else { Color::DarkGray }),
        )
    };

    let status = Line::from(vec![
        Span::styled(" Zoom: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        toggle(show_fill, "[F]ill ", "[f]ill "),
        toggle(show_outlines, "[B]orders ", "[b]orders "),
        Span::styled("| ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
        Span::styled(
            " | hjkl:pan +/-:zoom click:state r:reset q:quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    frame.render_widget(Paragraph::new(status), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use ratatui::{backend::TestBackend, Terminal};

    fn buffer_text(buf: &Buffer) -> String {
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_map_area_leaves_room_for_sidebar() {
        let app = App::new(Settings::default(), Rect::default());
        let area = map_area(Rect::new(0, 0, 120, 40), &app);
        assert_eq!(area, Rect::new(1, 1, 120 - SIDEBAR_WIDTH - 2, 40 - 1 - 2));
    }

    #[test]
    fn test_renders_loading_state() {
        let app = App::new(Settings::default(), Rect::new(1, 1, 74, 37));
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|frame| render(frame, &app)).unwrap();

        let text = buffer_text(terminal.backend().buffer());
        assert!(text.contains("Loading..."));
        assert!(text.contains("Cases Over Time (click a state)"));
    }

    #[test]
    fn test_renders_error_state() {
        let mut app = App::new(Settings::default(), Rect::new(1, 1, 74, 37));
        app.finish_loading(Err(crate::data::LoadError::Interrupted));
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|frame| render(frame, &app)).unwrap();

        let text = buffer_text(terminal.backend().buffer());
        assert!(text.contains("Error loading data"));
    }
}
