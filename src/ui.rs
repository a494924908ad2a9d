pub mod charting;

use std::time::Instant;

use chrono::Local;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Wrap},
    Frame,
};
use time_humanize::{Accuracy, HumanTime, Tense};
use unicode_width::UnicodeWidthStr;

use crate::session::Phase;
use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

pub fn draw(app: &App, f: &mut Frame) {
    let area = f.area();
    match app.state {
        AppState::Typing => draw_typing(app, f, area),
        AppState::Results => draw_results(app, f, area),
        AppState::Leaderboard => draw_leaderboard(app, f, area),
    }
}

fn dim_bold() -> Style {
    Style::default()
        .add_modifier(Modifier::BOLD)
        .add_modifier(Modifier::DIM)
}

fn draw_typing(app: &App, f: &mut Frame, area: Rect) {
    if app.test.is_paused() {
        let banner = Paragraph::new(Span::styled(
            "PAUSED - terminal lost focus",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
        f.render_widget(banner, area);
        return;
    }

    let target = app.test.current_line_target();
    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let prompt_lines = ((target.width() as f64 / max_chars_per_line as f64).ceil() as u16).max(1);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length((area.height.saturating_sub(prompt_lines)) / 2),
            Constraint::Length(2),
            Constraint::Length(prompt_lines + 1),
            Constraint::Min(1),
        ])
        .split(area);

    let header = match app.test.phase() {
        Phase::Idle => idle_header(app),
        _ => active_header(app),
    };
    f.render_widget(header, chunks[1]);

    let prompt = Paragraph::new(Line::from(prompt_spans(app)))
        .alignment(if prompt_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: false });
    f.render_widget(prompt, chunks[2]);

    if app.test.line_count() > 1 {
        let upcoming = app
            .test
            .line_index()
            .checked_add(1)
            .filter(|&i| i < app.test.line_count())
            .map(|_| {
                format!(
                    "line {} of {}",
                    app.test.line_index() + 1,
                    app.test.line_count()
                )
            })
            .unwrap_or_default();
        let footer = Paragraph::new(Span::styled(upcoming, dim_bold())).alignment(Alignment::Center);
        f.render_widget(footer, chunks[3]);
    }
}

fn idle_header(app: &App) -> Paragraph<'static> {
    let settings = app.test.settings();
    let mode = if settings.competitive {
        "competitive".to_string()
    } else {
        settings.mode.to_string()
    };
    Paragraph::new(vec![
        Line::from(Span::styled(
            format!("{} / {}", settings.duration, mode),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "start typing to begin - tab: duration  shift+tab: mode  ctrl+k: competitive",
            dim_bold(),
        )),
    ])
    .alignment(Alignment::Center)
}

fn active_header(app: &App) -> Paragraph<'static> {
    let now = Instant::now();
    Paragraph::new(Line::from(Span::styled(
        format!(
            "{} wpm   {}% acc   {:.1}s left",
            app.test.live_wpm(now),
            app.test.live_accuracy(),
            app.test.seconds_remaining(now),
        ),
        dim_bold(),
    )))
    .alignment(Alignment::Center)
}

fn prompt_spans(app: &App) -> Vec<Span<'static>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let green = bold.fg(Color::Green);
    let red = bold.fg(Color::Red);
    let cursor = dim_bold().add_modifier(Modifier::UNDERLINED);

    let target: Vec<char> = app.test.current_line_target().chars().collect();
    let typed: Vec<char> = app.test.current_line_typed().chars().collect();

    let mut spans = Vec::with_capacity(target.len());
    for (idx, expected) in target.iter().enumerate() {
        let span = match typed.get(idx) {
            Some(t) if t == expected => Span::styled(expected.to_string(), green),
            Some(t) => Span::styled(
                match t {
                    ' ' => "\u{b7}".to_string(),
                    c => c.to_string(),
                },
                red,
            ),
            None if idx == typed.len() => Span::styled(expected.to_string(), cursor),
            None => Span::styled(expected.to_string(), dim_bold()),
        };
        spans.push(span);
    }
    spans
}

fn draw_results(app: &App, f: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),    // chart
            Constraint::Length(1), // headline numbers
            Constraint::Length(1), // character outcome breakdown
            Constraint::Length(1), // status
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    let (x_bound, wpm_bound) = charting::chart_bounds(app.test.wpm_points());
    let y_bound = wpm_bound.max(100.0);

    let wpm_data: Vec<(f64, f64)> = app.test.wpm_points().iter().map(|p| (*p).into()).collect();
    let acc_data: Vec<(f64, f64)> = app
        .test
        .accuracy_points()
        .iter()
        .map(|p| (*p).into())
        .collect();

    let datasets = vec![
        Dataset::default()
            .name("wpm")
            .marker(ratatui::symbols::Marker::Braille)
            .style(Style::default().fg(Color::Magenta))
            .graph_type(GraphType::Line)
            .data(&wpm_data),
        Dataset::default()
            .name("acc")
            .marker(ratatui::symbols::Marker::Braille)
            .style(Style::default().fg(Color::Cyan))
            .graph_type(GraphType::Line)
            .data(&acc_data),
    ];

    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("seconds")
                .style(dim_bold())
                .bounds([0.0, x_bound])
                .labels(vec![
                    charting::axis_label(0.0),
                    charting::axis_label(x_bound),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(dim_bold())
                .bounds([0.0, y_bound])
                .labels(vec![
                    charting::axis_label(0.0),
                    charting::axis_label(y_bound / 2.0),
                    charting::axis_label(y_bound),
                ]),
        )
        .block(Block::default().borders(Borders::NONE));
    f.render_widget(chart, chunks[0]);

    if let Some(report) = app.test.report() {
        let consistency = report
            .consistency
            .map_or("-".to_string(), |c| format!("{c:.0}"));
        let headline = Paragraph::new(Span::styled(
            format!(
                "{} wpm   {:.1}% acc   {} consistency   {:.1}s",
                report.wpm,
                report.accuracy,
                consistency,
                report.elapsed.as_secs_f64()
            ),
            Style::default().add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center);
        f.render_widget(headline, chunks[1]);

        let stats = report.character_stats;
        let breakdown = Paragraph::new(Span::styled(
            format!(
                "correct {}   incorrect {}   missed {}   extra {}   keypresses {}",
                stats.correct, stats.incorrect, stats.missed, stats.extra, report.total_keypresses
            ),
            dim_bold(),
        ))
        .alignment(Alignment::Center);
        f.render_widget(breakdown, chunks[2]);
    }

    let status_line = app.status.clone().unwrap_or_else(|| {
        if app.test.is_submitted() {
            "personal best saved".to_string()
        } else {
            String::new()
        }
    });
    let status = Paragraph::new(Span::styled(
        status_line,
        Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center);
    f.render_widget(status, chunks[3]);

    let legend = Paragraph::new(Span::styled(
        "(r)etry (n)ew (s)ubmit (l)eaderboard (t)weet (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center);
    f.render_widget(legend, chunks[5]);
}

fn draw_leaderboard(app: &App, f: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(area);

    let title = Paragraph::new(Span::styled(
        format!("top {} typists", crate::scores::LEADERBOARD_SIZE),
        Style::default().add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let header = Row::new(vec!["#", "name", "wpm", "acc", "mode", "updated"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let now = Local::now();
    let rows: Vec<Row> = app
        .leaderboard
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let age_secs = (now - entry.updated_at).num_seconds().max(0) as u64;
            let updated = HumanTime::from(std::time::Duration::from_secs(age_secs))
                .to_text_en(Accuracy::Rough, Tense::Past);
            let mode = if entry.competitive { "race" } else { "solo" };
            let row = Row::new(vec![
                Cell::from(format!("{}", i + 1)),
                Cell::from(entry.username.clone()),
                Cell::from(format!("{}", entry.wpm)),
                Cell::from(format!("{:.1}%", entry.accuracy)),
                Cell::from(mode),
                Cell::from(updated),
            ]);
            if app
                .highlight_user
                .as_deref()
                .is_some_and(|name| name == entry.username)
            {
                row.style(
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                row
            }
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Min(12),
            Constraint::Length(5),
            Constraint::Length(7),
            Constraint::Length(5),
            Constraint::Min(12),
        ],
    )
    .header(header)
    .column_spacing(2);
    f.render_widget(table, chunks[1]);

    let hint = if app.leaderboard.is_empty() {
        "no scores yet - finish a run and (s)ubmit it"
    } else {
        "(b)ack (r)etry (n)ew"
    };
    let footer = Paragraph::new(Span::styled(
        hint,
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center);
    f.render_widget(footer, chunks[2]);
}
