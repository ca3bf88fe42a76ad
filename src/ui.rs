use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget, Wrap},
};

use crate::app::App;
use crate::clock::Clock;
use crate::plan::Exercise;
use crate::progress::ExerciseMark;
use crate::session::{format_elapsed, SessionStatus};
use crate::storage::KeyValueStore;

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;

const KEY_HELP: &str =
    "(s)tart  (space) pause/resume  (c)omplete  (r)eset  (d)one  (x) skip  (u)nmark  (q)uit";

pub fn status_label(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::NotStarted => "NOT STARTED",
        SessionStatus::InProgress => "IN PROGRESS",
        SessionStatus::Paused => "PAUSED",
        SessionStatus::Completed => "COMPLETED",
    }
}

fn status_color(status: SessionStatus) -> Color {
    match status {
        SessionStatus::NotStarted => Color::Gray,
        SessionStatus::InProgress => Color::Green,
        SessionStatus::Paused => Color::Yellow,
        SessionStatus::Completed => Color::Cyan,
    }
}

/// Table row for one exercise of the plan
pub fn present_row(index: usize, exercise: &Exercise, mark: ExerciseMark, selected: bool) -> Row<'static> {
    let (marker, color) = match mark {
        ExerciseMark::Completed => ("[x]", Color::Green),
        ExerciseMark::Skipped => ("[-]", Color::DarkGray),
        ExerciseMark::Pending => ("[ ]", Color::White),
    };

    let mut name_style = Style::default().fg(color);
    if mark == ExerciseMark::Skipped {
        name_style = name_style.add_modifier(Modifier::CROSSED_OUT);
    }

    let row = Row::new(vec![
        Cell::from(format!("{:>2}", index + 1)),
        Cell::from(marker).style(Style::default().fg(color)),
        Cell::from(exercise.name.clone()).style(name_style),
        Cell::from(exercise.summary()).style(Style::default().add_modifier(Modifier::DIM)),
    ]);

    if selected {
        row.style(Style::default().add_modifier(Modifier::REVERSED))
    } else {
        row
    }
}

impl<S: KeyValueStore, C: Clock> Widget for &App<S, C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let status = self.tracker.status();
        let total = self.exercise_count();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints(
                [
                    Constraint::Length(1), // title
                    Constraint::Length(3), // clock
                    Constraint::Min(3),    // exercises
                    Constraint::Length(1), // message
                    Constraint::Length(1), // legend
                ]
                .as_ref(),
            )
            .split(area);

        let mut title = vec![Span::styled(self.training.name.clone(), bold_style)];
        if let Some(description) = &self.training.description {
            title.push(Span::raw("  "));
            title.push(Span::styled(description.clone(), italic_style));
        }
        Paragraph::new(Line::from(title))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        let progress = if total > 0 {
            format!(
                "   {}/{} exercises",
                self.tracker.progress().completed_count(total),
                total
            )
        } else {
            String::new()
        };
        let clock = Paragraph::new(Line::from(vec![
            Span::styled(
                status_label(status),
                Style::default()
                    .patch(bold_style)
                    .fg(status_color(status)),
            ),
            Span::raw("   "),
            Span::styled(format_elapsed(self.tracker.elapsed_seconds()), bold_style),
            Span::raw(progress),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        clock.render(chunks[1], buf);

        if total == 0 {
            Paragraph::new(Span::styled("no exercises in this plan", italic_style))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .render(chunks[2], buf);
        } else {
            let rows = self
                .training
                .exercises
                .iter()
                .enumerate()
                .map(|(i, ex)| present_row(i, ex, self.tracker.exercise_mark(i), i == self.selected))
                .collect::<Vec<_>>();

            let table = Table::new(
                rows,
                [
                    Constraint::Length(3),
                    Constraint::Length(4),
                    Constraint::Percentage(50),
                    Constraint::Percentage(40),
                ],
            )
            .block(Block::default().borders(Borders::ALL).title("Exercises"));
            Widget::render(table, chunks[2], buf);
        }

        if let Some(message) = &self.message {
            Paragraph::new(Span::styled(
                message.clone(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
        }

        Paragraph::new(Span::styled(KEY_HELP, italic_style))
            .alignment(Alignment::Center)
            .render(chunks[4], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::plan::{parse_plan, Training};
    use crate::storage::MemoryStore;
    use crate::tracker::SessionTracker;

    fn rendered<S: KeyValueStore, C: Clock>(app: &App<S, C>) -> String {
        let area = Rect::new(0, 0, 100, 20);
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    fn plan() -> Training {
        parse_plan(
            r#"{ "id": "t1", "name": "Push day", "exercises": [
                { "name": "Bench press", "sets": 3, "reps": 10 },
                { "name": "Dips" }
            ] }"#,
        )
        .unwrap()
    }

    #[test]
    fn renders_title_status_and_clock() {
        let clock = ManualClock::at_epoch();
        let mut tracker = SessionTracker::new("t1", MemoryStore::new(), &clock);
        let _ = tracker.start();
        clock.advance_secs(65);
        let app = App::new(plan(), tracker);

        let content = rendered(&app);
        assert!(content.contains("Push day"));
        assert!(content.contains("IN PROGRESS"));
        assert!(content.contains("00:01:05"));
        assert!(content.contains("0/2 exercises"));
    }

    #[test]
    fn renders_exercise_markers() {
        let mut tracker = SessionTracker::new("t1", MemoryStore::new(), ManualClock::at_epoch());
        let _ = tracker.mark_exercise_completed(0);
        let app = App::new(plan(), tracker);

        let content = rendered(&app);
        assert!(content.contains("[x]"));
        assert!(content.contains("[ ]"));
        assert!(content.contains("Bench press"));
        assert!(content.contains("3 x 10"));
    }

    #[test]
    fn renders_placeholder_for_empty_plan() {
        let tracker = SessionTracker::new("t1", MemoryStore::new(), ManualClock::at_epoch());
        let app = App::new(Training::untitled("t1"), tracker);

        let content = rendered(&app);
        assert!(content.contains("Training t1"));
        assert!(content.contains("NOT STARTED"));
        assert!(content.contains("no exercises in this plan"));
    }

    #[test]
    fn status_labels_are_distinct() {
        let labels = [
            status_label(SessionStatus::NotStarted),
            status_label(SessionStatus::InProgress),
            status_label(SessionStatus::Paused),
            status_label(SessionStatus::Completed),
        ];
        for (i, a) in labels.iter().enumerate() {
            for b in &labels[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
