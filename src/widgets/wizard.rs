use crate::app::{DialogState, DialogStatus};
use crate::form::progress::missing_required;
use crate::form::{FieldInput, FormField};
use crate::theme::Theme;
use crate::ui::Toast;
use crate::widgets::chrome::{centered_rect, panel_block};
use crate::widgets::form_widget::FormWidget;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap};

const SIDEBAR_W: u16 = 28;
const OPTIONS_VISIBLE: usize = 8;

pub fn draw(
    f: &mut Frame,
    state: &DialogState,
    widget: &FormWidget,
    theme: &Theme,
    tick: u64,
    toast: Option<&Toast>,
) {
    let screen = f.area();
    f.render_widget(Block::default().style(theme.base_style()), screen);

    let outer = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border_unfocused())
        .title(Span::styled(format!(" {} ", state.title()), theme.title_style()));
    let inner = outer.inner(screen);
    f.render_widget(outer, screen);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_W), Constraint::Min(10)])
        .split(rows[0]);

    draw_steps(f, cols[0], state, theme);
    draw_fields(f, cols[1], state, widget, theme, tick % 2 == 0);
    draw_footer(f, &rows[1..], state, theme, tick, toast);

    if let Some(ta) = widget.active_textarea(state) {
        let rect = centered_rect(80, 70, screen);
        f.render_widget(Clear, rect);
        f.render_widget(ta, rect);
    }
}

fn draw_steps(f: &mut Frame, area: Rect, state: &DialogState, theme: &Theme) {
    let items: Vec<ListItem> = state
        .form
        .sections()
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let (filled, total) = state
                .progress
                .per_section
                .get(i)
                .map(|p| (p.filled, p.total))
                .unwrap_or((0, 0));
            let mark = if total > 0 && filled == total { '✓' } else { ' ' };
            let line = Line::from(vec![
                Span::raw(format!("{mark} {}. {} ", i + 1, node.title)),
                Span::styled(format!("{filled}/{total}"), theme.text_muted()),
            ]);
            let item = ListItem::new(line);
            if i == state.step {
                item.style(theme.list_cursor_style())
            } else {
                item
            }
        })
        .collect();
    f.render_widget(List::new(items).block(panel_block("Steps", false, theme)), area);
}

fn draw_fields(
    f: &mut Frame,
    area: Rect,
    state: &DialogState,
    widget: &FormWidget,
    theme: &Theme,
    cursor_on: bool,
) {
    let title = state
        .form
        .sections()
        .get(state.step)
        .map(|s| s.title.as_str())
        .unwrap_or("");
    let block = panel_block(title, state.status == DialogStatus::Open, theme);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();
    if let Some(node) = state.form.sections().get(state.step) {
        if !node.description.is_empty() {
            lines.push(Line::from(Span::styled(
                node.description.clone(),
                theme.text_muted(),
            )));
            lines.push(Line::from(""));
        }
    }

    let fields = state.form.section_fields(state.step);
    let cursor = widget.cursor.min(fields.len().saturating_sub(1));
    for (i, fld) in fields.iter().enumerate() {
        let active = i == cursor;
        let editing = active && widget.editing;
        let sel = if active { '›' } else { ' ' };
        let req = if fld.required { "*" } else { "" };
        let (val, mut style) = display_value(fld, theme);
        let val = if editing && matches!(&fld.input, FieldInput::Text(t) if !t.multiline) {
            style = theme.text_editing_bold();
            let caret = if cursor_on { "_" } else { " " };
            format!("{}{caret}", widget.buffer)
        } else {
            val
        };
        if active && !editing {
            style = theme.text_active_bold();
        }
        lines.push(Line::from(vec![
            Span::raw(format!("{sel} {}{req}: ", fld.label)),
            Span::styled(val, style),
        ]));
        if editing {
            option_lines(fld, widget.option_cursor, theme, &mut lines);
        }
    }
    if fields.is_empty() {
        lines.push(Line::from(Span::styled(
            "No fields in this step.",
            theme.text_muted(),
        )));
    }
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn display_value(fld: &FormField, theme: &Theme) -> (String, Style) {
    if let Some(err) = &fld.load_error {
        return (format!("options unavailable ({err})"), theme.text_error());
    }
    if fld.is_combo() && !fld.options_loaded && fld.input.options().is_empty() {
        return ("loading…".into(), theme.text_muted());
    }
    let shown = match &fld.input {
        FieldInput::Text(t) => {
            let mut it = t.text.lines();
            let first = it.next().unwrap_or("").to_string();
            if it.next().is_some() {
                format!("{first} …")
            } else {
                first
            }
        }
        FieldInput::Select(_) => fld.input.selected_label().unwrap_or_default(),
        FieldInput::Multi(m) => m
            .options
            .iter()
            .zip(&m.checked)
            .filter(|(_, c)| **c)
            .map(|(o, _)| o.label.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    };
    if shown.is_empty() {
        ("-".into(), theme.text_muted())
    } else {
        (shown, Style::default())
    }
}

fn option_lines<'a>(fld: &'a FormField, cursor: usize, theme: &Theme, lines: &mut Vec<Line<'a>>) {
    let offset = cursor.saturating_sub(OPTIONS_VISIBLE - 1);
    match &fld.input {
        FieldInput::Select(sel) => {
            for (i, opt) in sel.options.iter().enumerate().skip(offset).take(OPTIONS_VISIBLE) {
                let mark = if sel.selected == Some(i) { "(•)" } else { "( )" };
                let text = format!("    {mark} {}", opt.label);
                lines.push(option_line(text, i == cursor, theme));
            }
        }
        FieldInput::Multi(multi) => {
            for (i, opt) in multi.options.iter().enumerate().skip(offset).take(OPTIONS_VISIBLE) {
                let on = multi.checked.get(i).copied().unwrap_or(false);
                let mark = if on { "[x]" } else { "[ ]" };
                let text = format!("    {mark} {}", opt.label);
                lines.push(option_line(text, i == cursor, theme));
            }
        }
        FieldInput::Text(_) => {}
    }
}

fn option_line<'a>(text: String, at_cursor: bool, theme: &Theme) -> Line<'a> {
    if at_cursor {
        Line::from(Span::styled(text, theme.list_cursor_style()))
    } else {
        Line::from(Span::raw(text))
    }
}

fn draw_footer(
    f: &mut Frame,
    rows: &[Rect],
    state: &DialogState,
    theme: &Theme,
    tick: u64,
    toast: Option<&Toast>,
) {
    let (filled, total) = state.progress.global;
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(theme.accent).bg(theme.bg))
        .ratio(state.progress.ratio().clamp(0.0, 1.0))
        .label(format!("{filled}/{total} required"));
    f.render_widget(gauge, rows[0]);

    let status = if state.status == DialogStatus::Submitting {
        Span::styled("Saving…", theme.text_editing_bold())
    } else if state.loading {
        let spin = ['|', '/', '-', '\\'][(tick % 4) as usize];
        Span::styled(
            format!("{spin} Loading ({} pending)", state.loads.outstanding()),
            theme.text_muted(),
        )
    } else {
        let missing = missing_required(&state.form);
        if missing.is_empty() {
            Span::styled("All required fields filled", theme.text_success())
        } else {
            Span::styled(format!("Missing: {}", missing.join(", ")), theme.text_error())
        }
    };
    f.render_widget(Paragraph::new(Line::from(status)), rows[1]);

    let line = match toast {
        Some(t) => Line::from(Span::styled(
            t.text.clone(),
            Style::default().fg(theme.notice_color(t.level)),
        )),
        None => Line::from(Span::styled(
            "↑/↓ field  Enter edit  Space toggle  ←/→ or 1-9 step  Ctrl+S save  Esc close",
            theme.text_muted(),
        )),
    };
    f.render_widget(Paragraph::new(line), rows[2]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{update, FormMsg, NoticeLevel};
    use crate::schema::{FieldSpec, FormSchema, SchemaBundle, Section};
    use ratatui::backend::TestBackend;
    use serde_json::json;
    use std::path::PathBuf;

    fn state() -> DialogState {
        let field = |key: &str| FieldSpec {
            key: key.into(),
            label: key.to_uppercase(),
            required: true,
            ..Default::default()
        };
        let schema = FormSchema {
            title_new: "New asset".into(),
            sections: vec![
                Section {
                    title: "General".into(),
                    fields: vec![field("name"), field("owner")],
                    ..Default::default()
                },
                Section {
                    title: "Extra".into(),
                    fields: vec![field("notes")],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let bundle = SchemaBundle::from_parts(schema, PathBuf::from("."), vec![]).unwrap();
        DialogState::new(bundle, None, None)
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buf = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buf.area.height {
            for x in 0..buf.area.width {
                out.push_str(buf[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn renders_steps_fields_and_progress() {
        let mut st = state();
        let _ = update(
            &mut st,
            FormMsg::SetValue {
                key: "name".into(),
                value: json!("Laptop"),
            },
        );
        let backend = TestBackend::new(100, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        let widget = FormWidget::new();
        terminal
            .draw(|f| draw(f, &st, &widget, &Theme::default(), 0, None))
            .unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("New asset"));
        assert!(text.contains("1. General 1/2"));
        assert!(text.contains("2. Extra 0/1"));
        assert!(text.contains("› NAME*: Laptop"));
        assert!(text.contains("1/3 required"));
        assert!(text.contains("Missing: OWNER, NOTES"));
    }

    #[test]
    fn toast_replaces_key_hints() {
        let st = state();
        let toast = Toast {
            text: "New asset saved.".into(),
            level: NoticeLevel::Success,
            expires_at_tick: 10,
        };
        let backend = TestBackend::new(100, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|f| draw(f, &st, &FormWidget::new(), &Theme::default(), 0, Some(&toast)))
            .unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("New asset saved."));
        assert!(!text.contains("Ctrl+S save"));
    }
}
