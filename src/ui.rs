use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;
use webbrowser::Browser;

use crate::app::App;
use crate::solve::Penalty;
use crate::timer::TimerReadout;
use crate::util::{format_inspection, format_solve_ms, format_stat_ms};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;
const HISTORY_ROWS: usize = 5;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // styles
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);
        let dim_italic_style = Style::default().patch(dim_style).patch(italic_style);

        let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
        let scramble_lines = match &self.scramble {
            Some(s) => {
                ((s.scramble.width() as f64 / max_chars_per_line as f64).ceil() as u16).max(1)
            }
            None => 1,
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints(
                [
                    Constraint::Length(scramble_lines),
                    Constraint::Min(3), // timer, vertically padded
                    Constraint::Length(1), // optimal solution
                    Constraint::Length(1), // stats
                    Constraint::Length(HISTORY_ROWS as u16 + 1),
                    Constraint::Length(1), // message
                    Constraint::Length(1), // legend
                ]
                .as_ref(),
            )
            .split(area);

        let scramble = match &self.scramble {
            Some(s) => Span::styled(s.scramble.clone(), bold_style),
            None if self.scramble_loading => {
                Span::styled("fetching scramble...", dim_italic_style)
            }
            None => Span::styled("no scramble", dim_italic_style),
        };
        Paragraph::new(scramble)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[0], buf);

        let (timer_text, timer_style) = self.timer_display();
        let timer_area = centered_line(chunks[1]);
        Paragraph::new(Span::styled(timer_text, timer_style))
            .alignment(Alignment::Center)
            .render(timer_area, buf);

        if let Some(optimal) = &self.optimal {
            let line = format!("optimal: {} ({} moves)", optimal.solution, optimal.num_moves);
            Paragraph::new(Span::styled(line, Style::default().fg(Color::Cyan)))
                .alignment(Alignment::Center)
                .render(chunks[2], buf);
        }

        let stats = &self.stats;
        let mut stats_line = format!(
            "{} solves   best {}   ao5 {}   ao12 {}   avg {}",
            stats.count,
            format_stat_ms(stats.best_ms),
            format_stat_ms(stats.ao5_ms),
            format_stat_ms(stats.ao12_ms),
            format_stat_ms(stats.avg_ms),
        );
        if let Some(avg_score) = stats.avg_score {
            stats_line.push_str(&format!("   score {:.1}", avg_score));
        }
        Paragraph::new(Span::styled(stats_line, bold_style))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);

        let history: Vec<Line> = self
            .history
            .recent(HISTORY_ROWS)
            .map(|solve| {
                let mut text = match solve.penalty {
                    Penalty::Dnf => format!("DNF ({})", format_solve_ms(solve.elapsed_ms)),
                    Penalty::PlusTwo => {
                        format!("{}+", format_solve_ms(solve.elapsed_ms + 2_000))
                    }
                    Penalty::Ok => format_solve_ms(solve.elapsed_ms),
                };
                if let Some(score) = solve.score.score() {
                    text.push_str(&format!("   score {:.1}", score));
                }
                Line::from(Span::styled(text, dim_style)).alignment(Alignment::Center)
            })
            .collect();
        Paragraph::new(history).render(chunks[4], buf);

        if let Some(message) = &self.message {
            Paragraph::new(Span::styled(
                message.clone(),
                Style::default().fg(Color::Yellow).patch(italic_style),
            ))
            .alignment(Alignment::Center)
            .render(chunks[5], buf);
        } else if self.machine.save_in_flight() {
            Paragraph::new(Span::styled("saving...", dim_italic_style))
                .alignment(Alignment::Center)
                .render(chunks[5], buf);
        }

        let legend = if Browser::is_available() {
            "(space) timer / (n)ew / (o)ptimal / (i)nspection / (s)tats / (r)escore / (0/2/x) penalty / (d)ashboard / (esc)ape"
        } else {
            "(space) timer / (n)ew / (o)ptimal / (i)nspection / (s)tats / (r)escore / (0/2/x) penalty / (esc)ape"
        };
        Paragraph::new(Span::styled(legend, italic_style)).render(chunks[6], buf);
    }
}

impl App {
    /// Text and color of the big readout for the current phase.
    fn timer_display(&self) -> (String, Style) {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        match self.machine.readout(self.now) {
            TimerReadout::Idle => {
                let text = match self.last_result {
                    Some(result) => match result.penalty {
                        Penalty::Dnf => format!("DNF ({})", format_solve_ms(result.elapsed_ms)),
                        Penalty::PlusTwo => {
                            format!("{}+", format_solve_ms(result.elapsed_ms + 2_000))
                        }
                        Penalty::Ok => format_solve_ms(result.elapsed_ms),
                    },
                    None => "0.000".to_string(),
                };
                (text, bold.add_modifier(Modifier::DIM))
            }
            TimerReadout::Arming => ("0.000".to_string(), bold.fg(Color::Red)),
            TimerReadout::Ready => ("0.000".to_string(), bold.fg(Color::Green)),
            TimerReadout::Inspection {
                remaining_ms,
                overrun_ms,
            } => {
                let color = if overrun_ms > 0 {
                    Color::Red
                } else {
                    Color::Yellow
                };
                (format_inspection(remaining_ms, overrun_ms), bold.fg(color))
            }
            TimerReadout::Running { elapsed_ms } => (format_solve_ms(elapsed_ms), bold),
        }
    }
}

/// Middle row of an area, for a vertically centered one-line readout.
fn centered_line(area: Rect) -> Rect {
    let y = area.y + area.height / 2;
    Rect::new(area.x, y, area.width, 1)
}
