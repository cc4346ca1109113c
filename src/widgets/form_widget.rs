use crate::app::{DialogState, DialogStatus, FormMsg};
use crate::form::{FieldInput, FormField};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::crossterm::event as rt_event;
use ratatui::widgets::{Block, Borders};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tui_textarea::TextArea;

/// Cursor and in-progress edits for the current wizard step. Committed
/// values go to the engine as `FormMsg`s; nothing here mutates the form.
#[derive(Default)]
pub struct FormWidget {
    pub cursor: usize,
    pub editing: bool,
    pub option_cursor: usize,
    pub buffer: String,
    ta_map: HashMap<String, TextArea<'static>>,
}

impl FormWidget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_field<'a>(&self, state: &'a DialogState) -> Option<&'a FormField> {
        let fields = state.form.section_fields(state.step);
        let idx = self.cursor.min(fields.len().saturating_sub(1));
        fields.get(idx).copied()
    }

    /// Editor for the field being edited, when it is a textarea.
    pub fn active_textarea(&self, state: &DialogState) -> Option<&TextArea<'static>> {
        if !self.editing {
            return None;
        }
        let fld = self.current_field(state)?;
        self.ta_map.get(&fld.key)
    }

    pub fn on_key(&mut self, key: KeyEvent, state: &DialogState) -> Vec<FormMsg> {
        let mut msgs = Vec::new();
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let count = state.form.section_fields(state.step).len();
        if self.cursor >= count {
            self.cursor = count.saturating_sub(1);
        }

        if self.editing {
            let Some(fld) = self.current_field(state) else {
                self.editing = false;
                return msgs;
            };
            let key_name = fld.key.clone();
            if let Some(ta) = self.ta_map.get_mut(&key_name) {
                match key.code {
                    KeyCode::Esc => self.editing = false,
                    KeyCode::Char('s') if ctrl => {
                        let text = ta.lines().join("\n");
                        self.editing = false;
                        msgs.push(FormMsg::SetValue {
                            key: key_name,
                            value: JsonValue::String(text),
                        });
                    }
                    _ => {
                        if let Some(ev) = to_textarea_event(key) {
                            let _ = ta.input(ev);
                        }
                    }
                }
                return msgs;
            }
            match &fld.input {
                FieldInput::Text(_) => match key.code {
                    KeyCode::Esc => self.editing = false,
                    KeyCode::Enter => {
                        self.editing = false;
                        msgs.push(FormMsg::SetValue {
                            key: key_name,
                            value: JsonValue::String(std::mem::take(&mut self.buffer)),
                        });
                    }
                    KeyCode::Backspace => {
                        self.buffer.pop();
                    }
                    KeyCode::Char(c) if !ctrl => self.buffer.push(c),
                    _ => {}
                },
                FieldInput::Select(sel) => match key.code {
                    KeyCode::Esc => self.editing = false,
                    KeyCode::Up => self.option_cursor = self.option_cursor.saturating_sub(1),
                    KeyCode::Down => {
                        if self.option_cursor + 1 < sel.options.len() {
                            self.option_cursor += 1;
                        }
                    }
                    KeyCode::Enter => {
                        self.editing = false;
                        if let Some(opt) = sel.options.get(self.option_cursor) {
                            msgs.push(FormMsg::SetValue {
                                key: key_name,
                                value: opt.id.clone(),
                            });
                        }
                    }
                    _ => {}
                },
                FieldInput::Multi(multi) => match key.code {
                    KeyCode::Esc | KeyCode::Enter => self.editing = false,
                    KeyCode::Up => self.option_cursor = self.option_cursor.saturating_sub(1),
                    KeyCode::Down => {
                        if self.option_cursor + 1 < multi.options.len() {
                            self.option_cursor += 1;
                        }
                    }
                    KeyCode::Char(' ') => {
                        let mut next = multi.clone();
                        next.toggle(self.option_cursor);
                        msgs.push(FormMsg::SetValue {
                            key: key_name,
                            value: JsonValue::Array(next.checked_ids()),
                        });
                    }
                    _ => {}
                },
            }
            return msgs;
        }

        match key.code {
            KeyCode::Char('s') if ctrl => msgs.push(FormMsg::Submit),
            KeyCode::Esc => msgs.push(FormMsg::Cancel),
            KeyCode::Up => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down => {
                if self.cursor + 1 < count {
                    self.cursor += 1;
                }
            }
            KeyCode::Left | KeyCode::PageUp => {
                if state.step > 0 {
                    self.cursor = 0;
                    msgs.push(FormMsg::PrevStep);
                }
            }
            KeyCode::Right | KeyCode::PageDown => {
                if state.step + 1 < state.step_count() {
                    self.cursor = 0;
                    msgs.push(FormMsg::NextStep);
                }
            }
            KeyCode::Char(c @ '1'..='9') => {
                let idx = c as usize - '1' as usize;
                if idx < state.step_count() && idx != state.step {
                    self.cursor = 0;
                    msgs.push(FormMsg::GoToStep(idx));
                }
            }
            KeyCode::Enter => self.begin_edit(state),
            KeyCode::Char(' ') => {
                if let Some(FieldInput::Multi(_)) = self.current_field(state).map(|f| &f.input) {
                    self.begin_edit(state);
                }
            }
            KeyCode::Delete => {
                if let Some(fld) = self.current_field(state) {
                    msgs.push(FormMsg::SetValue {
                        key: fld.key.clone(),
                        value: JsonValue::Null,
                    });
                }
            }
            _ => {}
        }
        msgs
    }

    fn begin_edit(&mut self, state: &DialogState) {
        if state.status != DialogStatus::Open {
            return;
        }
        let Some(fld) = self.current_field(state) else {
            return;
        };
        match &fld.input {
            FieldInput::Text(t) if t.multiline => {
                let mut ta = TextArea::default();
                if !t.text.is_empty() {
                    ta.insert_str(&t.text);
                }
                ta.set_block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(format!("Editing: {} | Ctrl+S Save, Esc Cancel", fld.label)),
                );
                self.ta_map.insert(fld.key.clone(), ta);
            }
            FieldInput::Text(t) => {
                self.ta_map.remove(&fld.key);
                self.buffer = t.text.clone();
            }
            FieldInput::Select(sel) => {
                if sel.options.is_empty() {
                    return;
                }
                self.option_cursor = sel.selected.unwrap_or(0);
            }
            FieldInput::Multi(multi) => {
                if multi.options.is_empty() {
                    return;
                }
                self.option_cursor = 0;
            }
        }
        self.editing = true;
    }
}

/// tui-textarea speaks ratatui's re-exported crossterm; translate the
/// events we forward.
fn to_textarea_event(key: KeyEvent) -> Option<rt_event::KeyEvent> {
    let code = match key.code {
        KeyCode::Char(c) => rt_event::KeyCode::Char(c),
        KeyCode::Enter => rt_event::KeyCode::Enter,
        KeyCode::Backspace => rt_event::KeyCode::Backspace,
        KeyCode::Delete => rt_event::KeyCode::Delete,
        KeyCode::Left => rt_event::KeyCode::Left,
        KeyCode::Right => rt_event::KeyCode::Right,
        KeyCode::Up => rt_event::KeyCode::Up,
        KeyCode::Down => rt_event::KeyCode::Down,
        KeyCode::Home => rt_event::KeyCode::Home,
        KeyCode::End => rt_event::KeyCode::End,
        KeyCode::Tab => rt_event::KeyCode::Tab,
        _ => return None,
    };
    let mods = rt_event::KeyModifiers::from_bits_truncate(key.modifiers.bits());
    Some(rt_event::KeyEvent::new(code, mods))
}
