use std::{io, thread, time::Duration};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Line as CanvasLine},
        Block, BorderType, Borders, Paragraph, Wrap,
    },
    Frame, Terminal,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::app::{App, InsightTone, Message};
use crate::client::ReadingBackend;
use crate::constants::{CHART_Y_MAX, MAX_SAMPLES, UNIT};
use crate::controller::LiveReadingController;
use crate::error::Result;
use crate::util::{chart_points, format_reading, markdown_lines, time_span_labels};

const INPUT_POLL_MS: u64 = 100;
const PAGE_ROWS: u16 = 10;

pub async fn run<B: ReadingBackend>(
    controller: LiveReadingController<B>,
    endpoint: &str,
    token: CancellationToken,
) -> Result<App> {
    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let tx = controller.sender();
    let _ = tx.send(Message::Resize(terminal.size()?.width));
    let input = spawn_input_thread(tx, token.clone());

    let res = controller
        .run(|app| {
            terminal.draw(|f| draw(f, app, endpoint))?;
            Ok(())
        })
        .await;

    // Cleanup
    token.cancel();
    let _ = input.join();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

// Blocking key reader; quits by cancelling the token, everything else becomes a Message
fn spawn_input_thread(
    tx: UnboundedSender<Message>,
    token: CancellationToken,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let timeout = Duration::from_millis(INPUT_POLL_MS);
        while !token.is_cancelled() {
            let next = match event::poll(timeout) {
                Ok(true) => event::read().map(Some),
                Ok(false) => Ok(None),
                Err(e) => Err(e),
            };
            match next {
                Ok(Some(Event::Key(key))) if is_quit_key(&key) => {
                    info!("Quit requested");
                    token.cancel();
                }
                Ok(Some(Event::Key(key))) => {
                    if let Some(message) = key_message(&key) {
                        let _ = tx.send(message);
                    }
                }
                Ok(Some(Event::Resize(width, _))) => {
                    let _ = tx.send(Message::Resize(width));
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Terminal input failed");
                    token.cancel();
                }
            }
        }
    })
}

fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

fn key_message(key: &KeyEvent) -> Option<Message> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(Message::ScrollUp(1)),
        KeyCode::Down | KeyCode::Char('j') => Some(Message::ScrollDown(1)),
        KeyCode::PageUp => Some(Message::ScrollUp(PAGE_ROWS)),
        KeyCode::PageDown => Some(Message::ScrollDown(PAGE_ROWS)),
        KeyCode::Home => Some(Message::ScrollUp(u16::MAX)),
        KeyCode::End => Some(Message::ScrollDown(u16::MAX)),
        _ => None,
    }
}

pub fn draw(f: &mut Frame, app: &App, endpoint: &str) {
    // ============= whole screen layout ============
    // A settled insight takes half the screen; the countdown needs one line.
    let insight_height = if app.analysis.is_some() {
        Constraint::Percentage(50)
    } else {
        Constraint::Length(5)
    };
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(5), // Reading
            Constraint::Min(6),    // Chart
            insight_height,        // Insight
            Constraint::Length(1), // Status bar
        ].as_ref())
        .split(f.size());

    // ============= Real-time reading ============
    let reading_block = Block::default()
        .borders(Borders::ALL)
        .title(" Turbidity Monitor ")
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Cyan));
    let reading_text = vec![
        Line::from(Span::styled("REAL-TIME READING", Style::default().fg(Color::Cyan))),
        Line::from(vec![
            Span::styled(
                format_reading(app.current_value),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(UNIT, Style::default().fg(Color::Gray)),
        ]),
    ];
    f.render_widget(
        Paragraph::new(reading_text).alignment(Alignment::Center).block(reading_block),
        main_chunks[0],
    );

    // ============= Live chart ============
    let (first, last) = time_span_labels(&app.window);
    let chart_title = if app.window.is_empty() {
        " Live Data ".to_string()
    } else {
        format!(" Live Data [{first} - {last}] ")
    };
    let points = chart_points(&app.window);
    let chart = Canvas::default()
        .block(
            Block::default()
                .title(chart_title)
                .title_style(Style::default().fg(Color::Magenta))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        )
        .marker(Marker::Braille)
        .x_bounds([0.0, (MAX_SAMPLES - 1) as f64])
        .y_bounds([0.0, CHART_Y_MAX])
        .paint(|ctx| {
            for pair in points.windows(2) {
                ctx.draw(&CanvasLine {
                    x1: pair[0].0,
                    y1: pair[0].1,
                    x2: pair[1].0,
                    y2: pair[1].1,
                    color: Color::Cyan,
                });
            }
        });
    f.render_widget(chart, main_chunks[1]);

    // ============= Insight panel ============
    let (insight, tone) = app.insight();
    let insight_color = match tone {
        InsightTone::Pending => Color::Gray,
        InsightTone::Success => Color::LightGreen,
        InsightTone::Error => Color::LightRed,
    };
    let insight_title = if app.analysis.is_some() {
        " Gemini AI Analytics [Up/Down/PgUp/PgDn to scroll] "
    } else {
        " Gemini AI Analytics "
    };
    let insight_style = Style::default().fg(insight_color);
    let insight_panel = Paragraph::new(markdown_lines(&insight, insight_style))
        .style(insight_style)
        .wrap(Wrap { trim: true })
        .scroll((app.scroll, 0))
        .block(
            Block::default()
                .title(insight_title)
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        );
    f.render_widget(insight_panel, main_chunks[2]);

    // ============ Bottom Status Bar ============
    let label = |color: Color| Style::default().fg(color).add_modifier(Modifier::BOLD);
    let status_content = Line::from(vec![
        Span::styled(" SOURCE ", label(Color::Black).bg(Color::White)),
        Span::raw(format!(" {endpoint} | ")),
        Span::styled("TICKS: ", label(Color::Cyan)),
        Span::raw(format!("{} | ", app.elapsed_ticks)),
        Span::styled("WINDOW: ", label(Color::Magenta)),
        Span::raw(format!("{}/{MAX_SAMPLES} | ", app.window.len())),
        Span::styled("FAILED: ", label(Color::Red)),
        Span::raw(format!("{} | ", app.failed_polls)),
        Span::raw("Press 'q' to quit"),
    ]);
    let status_bar =
        Paragraph::new(status_content).style(Style::default().bg(Color::Rgb(20, 20, 20)));
    f.render_widget(status_bar, main_chunks[3]);
}
