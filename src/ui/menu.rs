use crate::input::{Button, Input, Trigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKind {
    /// A picks the highlighted item
    List,
    /// A toggles the highlighted checkbox, Plus confirms the whole list
    Checklist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    None,
    Moved,
    Toggled(usize),
    Selected(usize),
    Confirmed,
}

pub struct Menu {
    labels: Vec<String>,
    cursor: usize,
    kind: MenuKind,
}

impl Menu {
    pub fn list(labels: Vec<String>) -> Self {
        Menu { labels, cursor: 0, kind: MenuKind::List }
    }

    pub fn checklist(labels: Vec<String>) -> Self {
        Menu { labels, cursor: 0, kind: MenuKind::Checklist }
    }

    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    // The cursor stops at both ends instead of wrapping.
    fn move_up(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    fn move_down(&mut self) -> bool {
        if self.cursor + 1 < self.labels.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Reacts to this frame's button edges.
    pub fn handle(&mut self, input: &Input) -> MenuAction {
        let mut moved = false;
        if input.get(Trigger::Pressed, Button::Down) {
            moved |= self.move_down();
        }
        if input.get(Trigger::Pressed, Button::Up) {
            moved |= self.move_up();
        }

        match self.kind {
            MenuKind::List if input.get(Trigger::Pressed, Button::A) && !self.is_empty() => {
                return MenuAction::Selected(self.cursor);
            }
            MenuKind::Checklist => {
                if input.get(Trigger::Pressed, Button::Plus) {
                    return MenuAction::Confirmed;
                }
                if input.get(Trigger::Pressed, Button::A) && !self.is_empty() {
                    return MenuAction::Toggled(self.cursor);
                }
            }
            _ => {}
        }

        if moved {
            MenuAction::Moved
        } else {
            MenuAction::None
        }
    }

    /// `is_checked` is only consulted for checklists.
    pub fn lines(&self, is_checked: impl Fn(usize) -> bool) -> Vec<String> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let marker = if i == self.cursor { '>' } else { ' ' };
                match self.kind {
                    MenuKind::List => format!("{} {}", marker, label),
                    MenuKind::Checklist => {
                        let mark = if is_checked(i) { 'x' } else { ' ' };
                        format!("{} [{}] {}", marker, mark, label)
                    }
                }
            })
            .collect()
    }
}
