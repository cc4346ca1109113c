use crate::app::runtime::{dispatch, pump, Services};
use crate::app::{DialogState, DialogStatus, FormMsg, NoticeLevel};
use crate::config::{Args, Settings};
use crate::schema::SchemaBundle;
use crate::services::cache::OptionCache;
use crate::services::catalog::CatalogService;
use crate::services::gateway::HttpGateway;
use crate::theme::Theme;
use crate::widgets::form_widget::FormWidget;
use crate::widgets::wizard;
use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

// 200ms ticks
const TOAST_TICKS: u64 = 20;

pub struct Toast {
    pub text: String,
    pub level: NoticeLevel,
    pub expires_at_tick: u64,
}

struct Ui {
    state: DialogState,
    widget: FormWidget,
    theme: Theme,
    toast: Option<Toast>,
    seen_notices: usize,
    tick: u64,
}

impl Ui {
    /// Promote notices raised since the last frame to the toast line.
    fn refresh_toast(&mut self) {
        if self.state.notices.len() > self.seen_notices {
            if let Some(n) = self.state.last_notice() {
                self.toast = Some(Toast {
                    text: n.text.clone(),
                    level: n.level,
                    expires_at_tick: self.tick + TOAST_TICKS,
                });
            }
            self.seen_notices = self.state.notices.len();
        }
        if let Some(t) = &self.toast {
            if self.tick >= t.expires_at_tick {
                self.toast = None;
            }
        }
    }

    fn draw(&mut self, f: &mut Frame) {
        self.refresh_toast();
        wizard::draw(
            f,
            &self.state,
            &self.widget,
            &self.theme,
            self.tick,
            self.toast.as_ref(),
        );
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::from_env()?;
    crate::logging::init(&settings.log_file)?;
    tracing::info!(
        schema = %args.schema_path.display(),
        record = ?args.record_id,
        api = %settings.api_base_url,
        "starting"
    );

    let bundle = SchemaBundle::load(&args.schema_path)
        .with_context(|| format!("loading schema {}", args.schema_path.display()))?;
    let gateway = Arc::new(
        HttpGateway::new(
            &settings.api_base_url,
            settings.api_token.clone(),
            settings.http_timeout,
        )
        .context("creating HTTP client")?,
    );
    let cache = Arc::new(OptionCache::new(&settings.cache_path));
    let services = Services {
        catalogs: CatalogService::new(gateway.clone(), cache),
        gateway,
    };

    let mut ui = Ui {
        state: DialogState::new(bundle, args.record_id, settings.user_id.clone()),
        widget: FormWidget::new(),
        theme: Theme::synthwave_dark(),
        toast: None,
        seen_notices: 0,
        tick: 0,
    };
    let (tx, rx) = mpsc::channel::<FormMsg>();
    dispatch(&mut ui.state, &services, &tx, FormMsg::Start);

    let tick_rate = Duration::from_millis(200);
    if settings.headless {
        let backend = ratatui::backend::TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend)?;
        for _ in 0..settings.headless_ticks {
            pump(&mut ui.state, &services, &tx, &rx);
            terminal.draw(|f| ui.draw(f))?;
            std::thread::sleep(tick_rate);
            ui.tick += 1;
        }
        let (filled, total) = ui.state.progress.global;
        let notices: Vec<String> = ui.state.notices.iter().map(|n| n.text.clone()).collect();
        let summary = serde_json::json!({
            "ok": !ui.state.notices.iter().any(|n| n.level == NoticeLevel::Error),
            "title": ui.state.title(),
            "edit": ui.state.is_edit(),
            "steps": ui.state.step_count(),
            "fields": ui.state.form.len(),
            "loading": ui.state.loading,
            "idle": ui.state.loads.is_idle(),
            "complete": ui.state.progress.is_complete(),
            "filled": filled,
            "total": total,
            "notices": notices,
        });
        println!("{summary}");
        return Ok(());
    }

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let mut last_tick = Instant::now();
    let res: Result<()> = loop {
        pump(&mut ui.state, &services, &tx, &rx);
        if ui.state.status == DialogStatus::Closed {
            break Ok(());
        }
        if let Err(e) = terminal.draw(|f| ui.draw(f)) {
            break Err(e.into());
        }
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));
        match event::poll(timeout) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    for msg in ui.widget.on_key(key, &ui.state) {
                        dispatch(&mut ui.state, &services, &tx, msg);
                    }
                }
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }
        if last_tick.elapsed() >= tick_rate {
            ui.tick += 1;
            last_tick = Instant::now();
        }
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    tracing::info!(status = ?ui.state.status, "exiting");
    res
}
