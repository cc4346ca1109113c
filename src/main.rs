mod app;
mod config;
mod error;
mod form;
mod logging;
mod schema;
mod services;
mod theme;
mod ui;
mod widgets;

use anyhow::Result;

fn main() -> Result<()> {
    ui::run()
}
