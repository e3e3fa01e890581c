use macroquad::prelude::*;
use std::collections::VecDeque;

use crate::config::Config;
use crate::utils::string_to_color;

pub mod install_screen;
pub mod menu;

pub const HEADER: &str = "Automatic Wii U Homebrew Setup";
pub const FONT_SIZE: u16 = 20;
const MARGIN_X: f32 = 24.0;
const MARGIN_Y: f32 = 32.0;

/// A fixed-height text console. The oldest line scrolls off the top.
pub struct Console {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Console {
    pub fn new(capacity: usize) -> Self {
        Console {
            lines: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn print(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    /// Prints a progress or result line and mirrors it to the log.
    pub fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!("{}", line);
        self.print(line);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Starts a fresh screen with the title bar.
    pub fn header(&mut self) {
        self.clear();
        self.print(HEADER);
        self.print("");
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn draw(&self, config: &Config) {
        clear_background(BLACK);
        let line_height = screen_height().min(screen_width()) / (self.capacity as f32 + 2.0);
        let mut y = MARGIN_Y;
        for line in self.lines() {
            text_with_config_color(config, line, MARGIN_X, y, FONT_SIZE);
            y += line_height.max(FONT_SIZE as f32);
        }
    }
}

pub fn text_with_config_color(config: &Config, text: &str, x: f32, y: f32, font_size: u16) {
    // Shadow
    draw_text_ex(text, x + 1.0, y + 1.0, TextParams {
        font_size,
        color: Color { r: 0.0, g: 0.0, b: 0.0, a: 0.9 },
        ..Default::default()
    });

    draw_text_ex(text, x, y, TextParams {
        font_size,
        color: string_to_color(&config.font_color),
        ..Default::default()
    });
}
