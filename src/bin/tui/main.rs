mod app;

use std::io;
use std::time::Duration;

use app::{
    format_money, format_pct, format_verdict, truncate, AppState, ConnectionStatus, View,
};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Points},
        Bar, BarChart, BarGroup, Block, Borders, Cell, Paragraph, Row, Table, TableState, Tabs,
        Wrap,
    },
    Frame, Terminal,
};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("failed to build HTTP client");

    let mut app = AppState::new(base_url);

    // Initial fetch before rendering
    app.refresh(&client).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut table_state = TableState::default();

    let result = run_loop(&mut terminal, &mut app, &client, &mut table_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    table_state: &mut TableState,
) -> io::Result<()> {
    let refresh_interval = Duration::from_secs(2);
    let mut last_tick = std::time::Instant::now();

    loop {
        terminal.draw(|f| render(f, app, table_state))?;

        let timeout = refresh_interval
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        let mut refresh_now = false;
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if app.zip_input.is_some() {
                    match key.code {
                        KeyCode::Enter => refresh_now = app.commit_zip_input(),
                        KeyCode::Esc => app.cancel_zip_input(),
                        KeyCode::Backspace => app.pop_zip_char(),
                        KeyCode::Char(c) => app.push_zip_char(c),
                        _ => {}
                    }
                } else {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => refresh_now = true,
                        KeyCode::Tab => {
                            app.view = app.view.next();
                            table_state.select(None);
                        }
                        KeyCode::Char('c') => app.next_condition(),
                        KeyCode::Char(' ') => {
                            if app.toggle_condition() {
                                table_state.select(None);
                                refresh_now = true;
                            }
                        }
                        KeyCode::Char('z') => app.start_zip_input(),
                        KeyCode::Char('x') => {
                            app.clear_filters();
                            table_state.select(None);
                            refresh_now = true;
                        }
                        KeyCode::Right | KeyCode::Char('l') if app.view == View::Clusters => {
                            app.next_cluster()
                        }
                        KeyCode::Left | KeyCode::Char('h') if app.view == View::Clusters => {
                            app.prev_cluster()
                        }
                        KeyCode::Down | KeyCode::Char('j') if app.view == View::Clusters => {
                            app.next_marker()
                        }
                        KeyCode::Up | KeyCode::Char('k') if app.view == View::Clusters => {
                            app.prev_marker()
                        }
                        KeyCode::Right | KeyCode::Char('l') => app.next_insight(),
                        KeyCode::Left | KeyCode::Char('h') => app.prev_insight(),
                        KeyCode::Down | KeyCode::Char('j') => {
                            let max = app.row_count().saturating_sub(1);
                            let next = table_state.selected().map_or(0, |i| (i + 1).min(max));
                            table_state.select(Some(next));
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            let prev = table_state
                                .selected()
                                .map_or(0, |i| i.saturating_sub(1));
                            table_state.select(Some(prev));
                        }
                        _ => {}
                    }
                }
            }
        }

        if refresh_now || last_tick.elapsed() >= refresh_interval {
            app.refresh(client).await;
            last_tick = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, table_state: &mut TableState) {
    let area = f.area();

    // header | tabs | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_tabs(f, app, chunks[1]);
    match app.view {
        View::Buy => render_buy_table(f, app, table_state, chunks[2]),
        View::Pricing => render_pricing_table(f, app, table_state, chunks[2]),
        View::Map => render_map(f, app, chunks[2]),
        View::Clusters => render_clusters(f, app, chunks[2]),
        View::Insights => render_insight(f, app, chunks[2]),
    }
    render_footer(f, app, chunks[3]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };

    let selected = if app.conditions.is_empty() {
        "all".to_string()
    } else {
        app.conditions.iter().cloned().collect::<Vec<_>>().join(",")
    };
    let cursor = app.cursor_condition().unwrap_or("-");
    let zipcodes = if app.zipcodes.is_empty() {
        "all".to_string()
    } else {
        app.zipcodes
            .iter()
            .map(|z| z.to_string())
            .collect::<Vec<_>>()
            .join(",")
    };

    let title_spans = vec![
        Span::styled(
            " House Rocket  ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(
            format!(
                "{} to buy of {} classified",
                app.buy.count,
                app.health.classified.unwrap_or(0)
            ),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("profit {}", format_money(app.pricing.total_profit)),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!(
                "condition: {} [{cursor}]  zipcode: {}",
                truncate(&selected, 30),
                truncate(&zipcodes, 30)
            ),
            Style::default().fg(Color::White),
        ),
    ];

    let paragraph = Paragraph::new(Line::from(title_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    f.render_widget(paragraph, area);
}

fn render_tabs(f: &mut Frame, app: &AppState, area: Rect) {
    let titles: Vec<Line> = View::ALL.iter().map(|v| Line::from(v.title())).collect();
    let selected = View::ALL.iter().position(|v| *v == app.view).unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    Row::new(cells).height(1)
}

fn titled_block(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

fn render_buy_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let rows: Vec<Row> = app
        .buy
        .rows
        .iter()
        .map(|r| {
            Row::new(vec![
                Cell::from(r.id.to_string()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(r.zipcode.to_string()),
                Cell::from(format_money(r.price)),
                Cell::from(format_money(r.price_median)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(r.condition.clone()).style(Style::default().fg(condition_color(&r.condition))),
                Cell::from(r.status.clone()).style(Style::default().fg(Color::Green)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(15),
            Constraint::Length(15),
            Constraint::Length(10),
            Constraint::Length(8),
        ],
    )
    .header(header_row(&["Id", "Zipcode", "Price", "Zip median", "Condition", "Status"]))
    .block(titled_block(format!(
        " PROPERTIES TO BUY ({}) ",
        app.buy.count
    )))
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    f.render_stateful_widget(table, area, state);
}

fn render_pricing_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let rows: Vec<Row> = app
        .pricing
        .rows
        .iter()
        .map(|r| {
            let markup_color = if r.price <= r.price_median_season {
                Color::Green
            } else {
                Color::Yellow
            };
            Row::new(vec![
                Cell::from(r.id.to_string()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(r.zipcode.to_string()),
                Cell::from(format_money(r.price)),
                Cell::from(r.season.clone()),
                Cell::from(format_money(r.price_median_season)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(r.condition.clone()).style(Style::default().fg(condition_color(&r.condition))),
                Cell::from(format_money(r.selling_price)),
                Cell::from(format_money(r.profit)).style(Style::default().fg(markup_color)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(14),
            Constraint::Length(7),
            Constraint::Length(14),
            Constraint::Length(10),
            Constraint::Length(14),
            Constraint::Length(13),
        ],
    )
    .header(header_row(&[
        "Id", "Zipcode", "Price", "Season", "Season med", "Condition", "Sell at", "Profit",
    ]))
    .block(titled_block(format!(
        " SELLING PRICE & PROFIT ({}) │ total {} ",
        app.pricing.count,
        format_money(app.pricing.total_profit)
    )))
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    f.render_stateful_widget(table, area, state);
}

fn render_map(f: &mut Frame, app: &AppState, area: Rect) {
    let coords: Vec<(f64, f64)> = app.points.iter().map(|p| (p.long, p.lat)).collect();
    let (x_bounds, y_bounds) = bounds(&coords);

    let canvas = Canvas::default()
        .block(titled_block(format!(" LOCATION ({} properties) ", coords.len())))
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| {
            ctx.draw(&Points {
                coords: &coords,
                color: Color::LightRed,
            });
        });

    f.render_widget(canvas, area);
}

fn render_clusters(f: &mut Frame, app: &AppState, area: Rect) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(4)])
        .split(area);

    let centres: Vec<(f64, f64)> = app
        .clusters
        .clusters
        .iter()
        .map(|c| (c.long, c.lat))
        .collect();
    let selected = app
        .selected_cluster()
        .map(|c| vec![(c.long, c.lat)])
        .unwrap_or_default();
    let (x_bounds, y_bounds) = bounds(&centres);
    let centre = app
        .clusters
        .center
        .map(|c| format!("centred {:.3}, {:.3}", c.lat, c.long))
        .unwrap_or_else(|| "no markers".to_string());

    let canvas = Canvas::default()
        .block(titled_block(format!(
            " CLUSTERS ({} cells at {} decimals, {centre}) ",
            centres.len(),
            app.clusters.precision
        )))
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| {
            ctx.draw(&Points {
                coords: &centres,
                color: Color::LightBlue,
            });
            for c in &app.clusters.clusters {
                ctx.print(
                    c.long,
                    c.lat,
                    Span::styled(c.count.to_string(), Style::default().fg(Color::White)),
                );
            }
            ctx.draw(&Points {
                coords: &selected,
                color: Color::LightRed,
            });
        });
    f.render_widget(canvas, parts[0]);

    let (title, text) = match (app.selected_cluster(), app.selected_marker()) {
        (Some(c), Some(m)) => (
            format!(
                " cell {} of {} │ marker {} of {} │ id {} ",
                app.cluster_index + 1,
                app.clusters.clusters.len(),
                app.marker_index + 1,
                c.count,
                m.id
            ),
            m.popup.clone(),
        ),
        _ => (" POPUP ".to_string(), "No buy recommendations for this selection".to_string()),
    };
    let popup = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .block(titled_block(title));
    f.render_widget(popup, parts[1]);
}

/// Padded (long, lat) bounds around the points; a default box around King County when empty.
fn bounds(coords: &[(f64, f64)]) -> ([f64; 2], [f64; 2]) {
    if coords.is_empty() {
        return ([-122.6, -121.3], [47.1, 47.8]);
    }
    let (mut min_x, mut max_x) = (f64::MAX, f64::MIN);
    let (mut min_y, mut max_y) = (f64::MAX, f64::MIN);
    for &(x, y) in coords {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    let pad_x = ((max_x - min_x) * 0.05).max(0.01);
    let pad_y = ((max_y - min_y) * 0.05).max(0.01);
    (
        [min_x - pad_x, max_x + pad_x],
        [min_y - pad_y, max_y + pad_y],
    )
}

fn render_insight(f: &mut Frame, app: &AppState, area: Rect) {
    let Some(h) = app.current_insight() else {
        let p = Paragraph::new("No insights loaded").block(titled_block(" INSIGHTS ".to_string()));
        f.render_widget(p, area);
        return;
    };

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    let verdict_color = match h.holds {
        Some(true) => Color::Green,
        Some(false) => Color::Red,
        None => Color::DarkGray,
    };
    let summary = vec![
        Line::from(Span::styled(h.statement.clone(), Style::default().fg(Color::White))),
        Line::from(vec![
            Span::styled(
                format_verdict(h.holds),
                Style::default().fg(verdict_color).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(
                "  observed {}  claimed {}",
                format_pct(h.observed_pct),
                format_pct(Some(h.expected_pct)),
            )),
        ]),
    ];
    let paragraph = Paragraph::new(summary)
        .wrap(Wrap { trim: true })
        .block(titled_block(format!(
            " {} of {} │ {} ",
            h.id,
            app.insights.len(),
            h.category
        )));
    f.render_widget(paragraph, parts[0]);

    let bars: Vec<Bar> = h
        .bars
        .iter()
        .map(|b| {
            Bar::default()
                .value(b.mean.max(0.0).round() as u64)
                .text_value(format_money(b.mean))
                .label(Line::from(format!("{} ({})", b.label, format_pct(b.pct_change))))
        })
        .collect();
    let width = if h.bars.is_empty() {
        1
    } else {
        (parts[1].width / (h.bars.len() as u16 + 1)).clamp(6, 24)
    };
    let chart = BarChart::default()
        .block(titled_block(format!(" mean {} ", h.metric)))
        .bar_width(width)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .data(BarGroup::default().bars(&bars));
    f.render_widget(chart, parts[1]);
}

fn render_footer(f: &mut Frame, app: &AppState, area: Rect) {
    let line = if let Some(input) = &app.zip_input {
        Line::from(vec![
            Span::styled(" zipcode: ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("{input}_  ")),
            Span::styled("[enter] ", Style::default().fg(Color::Yellow)),
            Span::raw("add  "),
            Span::styled("[esc] ", Style::default().fg(Color::Yellow)),
            Span::raw("cancel  "),
            Span::styled(
                format!("{} zipcodes available", app.options.zipcodes.len()),
                Style::default().fg(Color::DarkGray),
            ),
        ])
    } else {
        Line::from(vec![
            Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
            Span::raw("quit  "),
            Span::styled("[tab] ", Style::default().fg(Color::Yellow)),
            Span::raw("view  "),
            Span::styled("[c/space] ", Style::default().fg(Color::Yellow)),
            Span::raw("condition  "),
            Span::styled("[z] ", Style::default().fg(Color::Yellow)),
            Span::raw("zipcode  "),
            Span::styled("[x] ", Style::default().fg(Color::Yellow)),
            Span::raw("clear  "),
            Span::styled("[←→] ", Style::default().fg(Color::Yellow)),
            Span::raw("hypothesis/cell  "),
            Span::styled("auto-refresh: 2s", Style::default().fg(Color::DarkGray)),
        ])
    };
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn condition_color(label: &str) -> Color {
    match label {
        "excellent" => Color::Green,
        "good" => Color::LightGreen,
        "median" => Color::Yellow,
        _ => Color::Red,
    }
}
