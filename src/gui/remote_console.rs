use std::{
    io::{self, Stdout},
    time::Instant,
};

use crate::{
    direction::DirectionKey,
    gui::{app::RemoteApp, error::RemoteGuiError},
    link_session::LinkStatus,
    transport::Transport,
};

use crossterm::{
    event::{
        self, Event, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        *,
    },
    Terminal,
};

/// Takes over the terminal and runs the remote until the user quits.
///
/// Key release events are requested from the terminal when it supports them;
/// otherwise [`RemoteApp`] falls back to timing out held keys.
pub fn remote_console<T: Transport>(app: RemoteApp<T>) -> Result<(), RemoteGuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let key_releases = matches!(supports_keyboard_enhancement(), Ok(true));
    if key_releases {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;

    let res = run_app(&mut terminal, app.with_key_releases(key_releases));

    // restore terminal
    if key_releases {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<T: Transport>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut app: RemoteApp<T>,
) -> Result<(), RemoteGuiError> {
    loop {
        terminal.draw(|f| ui(f, &app))?;
        if app.should_quit() {
            return Ok(());
        }
        app.run_pending();

        let timeout = app.next_wakeup(Instant::now());
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => app.handle_key(key, Instant::now()),
                Event::FocusLost => app.release_all(),
                _ => {}
            }
        }
        app.on_tick(Instant::now());
    }
}

fn status_color(status: LinkStatus) -> Color {
    match status {
        LinkStatus::Connecting | LinkStatus::Disconnecting => Color::Yellow,
        LinkStatus::Connected => Color::LightGreen,
        LinkStatus::Disconnected => Color::Red,
        LinkStatus::Unknown => Color::Gray,
    }
}

fn ui<T: Transport>(f: &mut Frame, app: &RemoteApp<T>) {
    let chunks = Layout::vertical([
        Constraint::Min(3),
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Length(3),
    ])
    .split(f.size());

    f.render_widget(radar(app), chunks[0]);
    f.render_widget(sample_line(app), chunks[1]);
    f.render_widget(direction_pad(app), chunks[2]);
    f.render_widget(status_bar(app), chunks[3]);
}

fn radar<T: Transport>(app: &RemoteApp<T>) -> Paragraph<'static> {
    let rows: Vec<Line> = app
        .grid()
        .iter_rows()
        .map(|row| {
            Line::from(
                row.iter()
                    .map(|&filled| {
                        if filled {
                            Span::styled("██", Style::default().fg(Color::Green))
                        } else {
                            Span::styled("· ", Style::default().fg(Color::DarkGray))
                        }
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .collect();

    let block = Block::default()
        .title(Title::from(" Radar ".magenta().bold()).alignment(Alignment::Center))
        .borders(Borders::ALL);
    Paragraph::new(rows)
        .alignment(Alignment::Center)
        .block(block)
}

fn sample_line<T: Transport>(app: &RemoteApp<T>) -> Paragraph<'static> {
    let text = match app.grid().last_update() {
        Some(update) => format!(
            "Column: {}  Distance: {}  Depth: {}",
            update.column, update.distance, update.depth
        ),
        None => "Column: -  Distance: -  Depth: -".to_owned(),
    };
    Paragraph::new(text).alignment(Alignment::Center)
}

fn indicator(label: &'static str, held: bool) -> Span<'static> {
    if held {
        label.black().on_gray()
    } else {
        label.gray()
    }
}

fn direction_pad<T: Transport>(app: &RemoteApp<T>) -> Paragraph<'static> {
    let flags = app.resolver().flags();
    let direction = app.resolver().direction();

    let lines = vec![
        Line::from(indicator(" W ", flags.get(DirectionKey::Forward))),
        Line::from(vec![
            indicator(" A ", flags.get(DirectionKey::Left)),
            Span::raw(format!(" {:^9} ", direction.name())),
            indicator(" D ", flags.get(DirectionKey::Right)),
        ]),
        Line::from(indicator(" S ", flags.get(DirectionKey::Backward))),
    ];
    Paragraph::new(lines).alignment(Alignment::Center)
}

fn status_bar<T: Transport>(app: &RemoteApp<T>) -> Paragraph<'static> {
    let status = app.session().status();
    let button = if status == LinkStatus::Connected {
        " Disconnect "
    } else {
        " Connect "
    };

    let instructions = Title::from(Line::from(vec![
        " Drive ".into(),
        "<W/A/S/D>".magenta().bold(),
        button.into(),
        "<C>".magenta().bold(),
        " Cancel ".into(),
        "<X>".magenta().bold(),
        " Quit ".into(),
        "<Q> ".magenta().bold(),
    ]));
    let block = Block::default()
        .title(
            instructions
                .alignment(Alignment::Center)
                .position(Position::Bottom),
        )
        .borders(Borders::ALL);

    let mut spans = vec![
        Span::raw("BLE Status: "),
        Span::styled(
            status.name(),
            Style::default()
                .fg(status_color(status))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" ● ", Style::default().fg(status_color(status))),
    ];
    if let Some(message) = app.message() {
        spans.push(Span::styled(
            message.to_owned(),
            Style::default().fg(Color::Red),
        ));
    }

    Paragraph::new(Line::from(spans)).block(block)
}
