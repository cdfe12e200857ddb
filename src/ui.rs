use chrono::{DateTime, Local};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Circle, Line as CanvasLine, Points},
        Block, Borders, Cell, Paragraph, Row, Table, Widget,
    },
    Frame,
};
use time_humanize::{Accuracy, HumanTime, Tense};
use unicode_width::UnicodeWidthStr;

use crate::controller::{StageAttempt, StageOutcome};
use crate::sweep::period_ms;
use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 4;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Playing => render_ring(self, area, buf),
            AppState::Results => render_results(self, area, buf),
            // History has its own renderer driven from the main loop
            AppState::History => {}
        }
    }
}

fn render_ring(app: &App, area: Rect, buf: &mut Buffer) {
    let controller = match app.controller.as_ref() {
        Some(controller) => controller,
        None => return,
    };
    let stage = match controller.active_stage() {
        Some(stage) => stage.clone(),
        None => return,
    };
    let now = app.clock.now_ms();
    let angle = controller.angle_now(now).unwrap_or(0.0);
    let progress = controller.stage_progress(now).unwrap_or(0.0);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(8),
            Constraint::Length(2),
        ])
        .split(area);

    let label = controller
        .session()
        .stage(stage.index)
        .map(|spec| spec.label.to_string())
        .unwrap_or_default();
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(
                "stage {}/{}",
                stage.index + 1,
                controller.session().stage_count()
            ),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  {}  press ", label)),
        Span::styled(
            stage.assigned_key.to_uppercase(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
    ]))
    .alignment(Alignment::Center);
    header.render(chunks[0], buf);

    let canvas_area = square_in(chunks[1]);
    let zone_points = arc_points(stage.zone_start_deg, stage.arc_width_deg);
    let canvas = Canvas::default()
        .marker(Marker::Braille)
        .x_bounds([-1.25, 1.25])
        .y_bounds([-1.25, 1.25])
        .paint(|ctx| {
            ctx.draw(&Circle {
                x: 0.0,
                y: 0.0,
                radius: 1.0,
                color: Color::DarkGray,
            });
            ctx.draw(&Points {
                coords: &zone_points,
                color: Color::Cyan,
            });
            let (x1, y1) = ring_xy(angle, 0.88);
            let (x2, y2) = ring_xy(angle, 1.12);
            ctx.draw(&CanvasLine {
                x1,
                y1,
                x2,
                y2,
                color: Color::Red,
            });
        });
    canvas.render(canvas_area, buf);

    // Key cap drawn over the ring center
    let cap_text = format!(" {} ", stage.assigned_key.to_uppercase());
    let cap_width = (cap_text.width() as u16).min(canvas_area.width.max(1));
    let cap = Rect {
        x: canvas_area.x + (canvas_area.width.saturating_sub(cap_width)) / 2,
        y: canvas_area.y + canvas_area.height / 2,
        width: cap_width,
        height: 1,
    };
    Paragraph::new(Span::styled(
        cap_text,
        Style::default()
            .fg(Color::Black)
            .bg(Color::White)
            .add_modifier(Modifier::BOLD),
    ))
    .render(cap, buf);

    let remaining_ms = (period_ms(stage.speed_multiplier) * (1.0 - progress)).max(0.0) as u64;
    let footer = Paragraph::new(Span::styled(
        format!("{} ms left in this revolution  (esc) cancel", remaining_ms),
        Style::default()
            .add_modifier(Modifier::DIM | Modifier::ITALIC),
    ))
    .alignment(Alignment::Center);
    footer.render(chunks[2], buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines: Vec<Line> = Vec::new();

    match app.reply.map(|r| r.success) {
        Some(true) => lines.push(Line::from(Span::styled(
            "SUCCESS",
            bold.fg(Color::Green),
        ))),
        Some(false) => lines.push(Line::from(Span::styled("FAILED", bold.fg(Color::Red)))),
        None => lines.push(Line::from(Span::styled("NO SESSION", bold))),
    }
    lines.push(Line::default());

    if let Some(rejection) = &app.rejection {
        lines.push(Line::from(Span::styled(
            rejection.to_string(),
            Style::default().fg(Color::Magenta).add_modifier(Modifier::ITALIC),
        )));
        lines.push(Line::default());
    }

    if let Some(controller) = app.controller.as_ref() {
        for attempt in controller.attempts() {
            lines.push(attempt_line(attempt));
        }
        if !controller.attempts().is_empty() {
            lines.push(Line::default());
        }
    }

    lines.push(Line::from(Span::styled(
        "(r)etry (n)ew session (s)tats (esc)ape",
        Style::default()
            .add_modifier(Modifier::DIM | Modifier::ITALIC),
    )));

    let height = lines.len() as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(chunks[1], buf);
}

fn attempt_line(attempt: &StageAttempt) -> Line<'static> {
    let head = format!(
        "stage {}  {}  {} ",
        attempt.index + 1,
        attempt.label,
        attempt.assigned_key.to_uppercase()
    );
    let (text, color) = match attempt.outcome {
        StageOutcome::Hit => (
            format!(
                "hit  {:+.1}\u{b0} off center  {} ms",
                attempt.error_deg.unwrap_or(0.0),
                attempt.reaction_ms.unwrap_or(0)
            ),
            Color::Green,
        ),
        StageOutcome::Miss => (
            format!(
                "miss  {:+.1}\u{b0} off center",
                attempt.error_deg.unwrap_or(0.0)
            ),
            Color::Red,
        ),
        StageOutcome::Timeout => ("timeout".to_string(), Color::Red),
        StageOutcome::Cancelled => ("cancelled".to_string(), Color::Yellow),
    };
    Line::from(vec![
        Span::raw(head),
        Span::styled(text, Style::default().fg(color)),
    ])
}

/// Attempt-history screen: per-difficulty summary plus recent attempts.
pub fn render_history(app: &mut App, f: &mut Frame) {
    let area = f.area();

    let summary_height = (app.history.summaries.len() as u16 + 2).clamp(3, 8);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(summary_height),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let title = Paragraph::new("Attempt History")
        .block(Block::default().borders(Borders::ALL).title("Stats"))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let summary_lines: Vec<Line> = if app.history.summaries.is_empty() {
        vec![Line::from("no attempts recorded yet")]
    } else {
        app.history
            .summaries
            .iter()
            .map(|s| {
                let accuracy = match (s.avg_abs_error_deg, s.error_spread_deg) {
                    (Some(avg), Some(spread)) => {
                        format!("  avg err {:.1}\u{b0} \u{b1} {:.1}", avg, spread)
                    }
                    _ => String::new(),
                };
                let reaction = s
                    .avg_reaction_ms
                    .map(|ms| format!("  avg reaction {:.0} ms", ms))
                    .unwrap_or_default();
                Line::from(format!(
                    "{:8} {:4} attempts  {:3.0}% hit{}{}",
                    s.difficulty, s.attempts, s.hit_rate, accuracy, reaction
                ))
            })
            .collect()
    };
    let summary = Paragraph::new(summary_lines)
        .block(Block::default().borders(Borders::ALL).title("By difficulty"));
    f.render_widget(summary, chunks[1]);

    let table_height = chunks[2].height.saturating_sub(3) as usize;
    let total_rows = app.history.rows.len();
    let max_scroll = total_rows.saturating_sub(table_height);
    if app.history.scroll_offset > max_scroll {
        app.history.scroll_offset = max_scroll;
    }

    let header = Row::new(vec![
        Cell::from("When"),
        Cell::from("Difficulty"),
        Cell::from("Key"),
        Cell::from("Outcome"),
        Cell::from("Off-center"),
    ])
    .style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = app
        .history
        .rows
        .iter()
        .skip(app.history.scroll_offset)
        .take(table_height)
        .map(|row| {
            let outcome_color = match row.outcome.as_str() {
                "hit" => Color::Green,
                "cancelled" => Color::Yellow,
                _ => Color::Red,
            };
            let off_center = row
                .error_deg
                .map(|err| format!("{:+.1}\u{b0}", err))
                .unwrap_or_else(|| "-".to_string());
            Row::new(vec![
                Cell::from(age(&row.timestamp)),
                Cell::from(row.difficulty.clone()),
                Cell::from(row.assigned_key.to_uppercase()),
                Cell::from(row.outcome.clone())
                    .style(Style::default().fg(outcome_color)),
                Cell::from(off_center),
            ])
        })
        .collect();

    let scroll_info = if total_rows > table_height {
        format!(
            " ({}/{} rows)",
            app.history.scroll_offset + rows.len().min(table_height),
            total_rows
        )
    } else {
        String::new()
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(10),
            Constraint::Length(5),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Recent attempts{}", scroll_info)),
    );
    f.render_widget(table, chunks[2]);

    let instructions = Paragraph::new("\u{2191}/\u{2193} scroll | (b)ack (esc)ape")
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC))
        .alignment(Alignment::Center);
    f.render_widget(instructions, chunks[3]);
}

fn age(timestamp: &DateTime<Local>) -> String {
    let secs = (Local::now() - *timestamp).num_seconds().max(0) as u64;
    HumanTime::from(std::time::Duration::from_secs(secs))
        .to_text_en(Accuracy::Rough, Tense::Past)
}

/// Map a ring angle (0 = top, clockwise) to canvas coordinates.
fn ring_xy(angle_deg: f64, radius: f64) -> (f64, f64) {
    let rad = angle_deg.to_radians();
    (radius * rad.sin(), radius * rad.cos())
}

fn arc_points(start_deg: f64, width_deg: f64) -> Vec<(f64, f64)> {
    let steps = ((width_deg * 2.0).ceil() as usize).max(2);
    (0..=steps)
        .map(|i| ring_xy(start_deg + width_deg * i as f64 / steps as f64, 1.0))
        .collect()
}

/// Largest roughly-square region centered in `area`, assuming cells are
/// about twice as tall as they are wide.
fn square_in(area: Rect) -> Rect {
    let side_w = area.width.min(area.height.saturating_mul(2)).max(1);
    let side_h = (side_w / 2).max(1);
    Rect {
        x: area.x + (area.width.saturating_sub(side_w)) / 2,
        y: area.y + (area.height.saturating_sub(side_h)) / 2,
        width: side_w,
        height: side_h,
    }
}
