//! pokecards - Pokemon card catalog in the terminal

use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::Terminal;
use tui_dispatch::{
    EffectContext, EffectStoreLike, EffectStoreWithMiddleware, EventBus, EventKind,
    EventRoutingState, HandlerResponse, Keybindings, TaskKey,
};
use tui_dispatch_debug::debug::DebugLayer;
use tui_dispatch_debug::{
    DebugCliArgs, DebugRunOutput, DebugSession, DebugSessionError, ReplayItem,
};

use pokecards::action::Action;
use pokecards::api::{self, CreatureSource, PokeApiClient, DEFAULT_API_BASE, DEFAULT_LANGUAGE};
use pokecards::effect::Effect;
use pokecards::grid::CARD_HEIGHT;
use pokecards::reducer::reducer;
use pokecards::sprite_backend::{self, SpriteBackend};
use pokecards::state::AppState;
use pokecards::ui::CatalogUi;

const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Parser, Debug)]
#[command(name = "pokecards")]
#[command(about = "Browse Pokemon cards from PokeAPI in the terminal")]
struct Args {
    /// Language code for names and descriptions
    #[arg(long, default_value = DEFAULT_LANGUAGE)]
    language: String,

    /// PokeAPI base URL
    #[arg(long, default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Remaining rows below the viewport that trigger the next batch
    #[arg(long, default_value_t = u32::from(CARD_HEIGHT))]
    scroll_threshold: u32,

    /// Draw text placeholders instead of kitty sprites
    #[arg(long)]
    no_sprites: bool,

    /// Log file (the terminal belongs to the UI)
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(flatten)]
    debug: DebugCliArgs,
}

struct RuntimeConfig {
    source: Arc<dyn CreatureSource>,
    language: String,
}

#[derive(tui_dispatch::ComponentId, Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum CatalogComponentId {
    Grid,
    Search,
    Overlay,
}

#[derive(tui_dispatch::BindingContext, Clone, Copy, PartialEq, Eq, Hash)]
enum CatalogContext {
    Grid,
    Search,
    Overlay,
}

impl EventRoutingState<CatalogComponentId, CatalogContext> for AppState {
    fn focused(&self) -> Option<CatalogComponentId> {
        if self.search.active {
            Some(CatalogComponentId::Search)
        } else if self.overlay.is_some() {
            Some(CatalogComponentId::Overlay)
        } else {
            Some(CatalogComponentId::Grid)
        }
    }

    fn modal(&self) -> Option<CatalogComponentId> {
        if self.search.active {
            Some(CatalogComponentId::Search)
        } else if self.overlay.is_some() {
            Some(CatalogComponentId::Overlay)
        } else {
            None
        }
    }

    fn binding_context(&self, id: CatalogComponentId) -> CatalogContext {
        match id {
            CatalogComponentId::Grid => CatalogContext::Grid,
            CatalogComponentId::Search => CatalogContext::Search,
            CatalogComponentId::Overlay => CatalogContext::Overlay,
        }
    }

    fn default_context(&self) -> CatalogContext {
        CatalogContext::Grid
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    let log_path = args
        .log_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("pokecards.log"));
    init_logging(&log_path)?;
    log::info!(
        "starting pokecards (language {}, api {})",
        args.language,
        args.api_base
    );

    let config = RuntimeConfig {
        source: Arc::new(PokeApiClient::new(args.api_base.clone())),
        language: args.language.clone(),
    };
    let scroll_threshold = args.scroll_threshold;
    let sprites_enabled = !args.no_sprites;
    let debug = DebugSession::new(args.debug);

    let state = debug
        .load_state_or_else_async(|| async move {
            let mut state = AppState::new(scroll_threshold, sprites_enabled);
            if let Ok(size) = crossterm::terminal::size() {
                state.terminal_size = size;
            }
            Ok::<AppState, io::Error>(state)
        })
        .await
        .map_err(debug_error)?;
    let replay_actions = debug.load_replay_items().map_err(debug_error)?;
    let (middleware, recorder) = debug.middleware_with_recorder();
    let store = EffectStoreWithMiddleware::new(state, reducer, middleware);

    let use_alt_screen = debug.use_alt_screen();
    let mut stdout = io::stdout();
    if use_alt_screen {
        enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    }
    let backend = SpriteBackend::new(stdout, sprite_backend::sprite_registry());
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &debug, store, replay_actions, config).await;

    if use_alt_screen {
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
    }

    let run_output = result?;
    run_output.write_render_output()?;
    debug.save_actions(recorder.as_ref()).map_err(debug_error)?;
    log::info!("pokecards exited");
    Ok(())
}

fn init_logging(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let default = "info,hyper=warn,hyper_util=warn,reqwest=warn";
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_secs()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init();
    Ok(())
}

fn debug_error(error: DebugSessionError) -> io::Error {
    io::Error::other(format!("debug session error: {error}"))
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    debug: &DebugSession,
    store: impl EffectStoreLike<AppState, Action, Effect>,
    replay_actions: Vec<ReplayItem<Action>>,
    config: RuntimeConfig,
) -> io::Result<DebugRunOutput<AppState>> {
    let config = Arc::new(config);
    let ui = Rc::new(RefCell::new(CatalogUi::new()));
    let mut bus: EventBus<AppState, Action, CatalogComponentId, CatalogContext> = EventBus::new();
    let keybindings: Keybindings<CatalogContext> = Keybindings::new();

    let ui_grid = Rc::clone(&ui);
    bus.register(CatalogComponentId::Grid, move |event, state| {
        ui_grid.borrow_mut().handle_grid_event(&event.kind, state)
    });

    let ui_search = Rc::clone(&ui);
    bus.register(CatalogComponentId::Search, move |event, state| {
        ui_search
            .borrow_mut()
            .handle_search_event(&event.kind, state)
    });

    let ui_overlay = Rc::clone(&ui);
    bus.register(CatalogComponentId::Overlay, move |event, state| {
        ui_overlay
            .borrow_mut()
            .handle_overlay_event(&event.kind, state)
    });

    bus.register_global(|event, state| match event.kind {
        EventKind::Resize(width, height) => {
            HandlerResponse::action(Action::UiTerminalResize(width, height)).with_render()
        }
        EventKind::Key(key) => match key.code {
            crossterm::event::KeyCode::Char('q') if !state.search.active => {
                HandlerResponse::action(Action::Quit)
            }
            crossterm::event::KeyCode::Char('/') if !state.search.active => {
                HandlerResponse::action(Action::SearchStart)
            }
            _ => HandlerResponse::ignored(),
        },
        _ => HandlerResponse::ignored(),
    });

    debug
        .run_effect_app_with_bus(
            terminal,
            store,
            DebugLayer::simple(),
            replay_actions,
            Some(Action::Init),
            Some(Action::Quit),
            |runtime| {
                if debug.render_once() {
                    return;
                }
                runtime
                    .subscriptions()
                    .interval("tick", Duration::from_millis(90), || Action::Tick);
            },
            &mut bus,
            &keybindings,
            |frame, area, state, _render_ctx, event_ctx| {
                let areas = ui.borrow_mut().render(frame, area, state);
                event_ctx.set_component_area(CatalogComponentId::Grid, areas.grid);
                if state.search.active {
                    event_ctx.set_component_area(CatalogComponentId::Search, areas.header);
                }
                if let Some(overlay) = areas.overlay {
                    event_ctx.set_component_area(CatalogComponentId::Overlay, overlay);
                }
            },
            |action| matches!(action, Action::Quit),
            move |effect, ctx| handle_effect(effect, ctx, config.clone()),
        )
        .await
}

fn handle_effect(effect: Effect, ctx: &mut EffectContext<Action>, config: Arc<RuntimeConfig>) {
    match effect {
        Effect::LoadBatch { offset, limit } => {
            let source = Arc::clone(&config.source);
            let language = config.language.clone();
            ctx.tasks().spawn(TaskKey::new("batch"), async move {
                match api::load_batch(source, offset, limit, language).await {
                    Ok(page) => Action::BatchDidLoad {
                        offset,
                        records: page.records,
                        has_more: page.has_more,
                    },
                    Err(err) => Action::BatchDidError {
                        offset,
                        error: err.to_string(),
                    },
                }
            });
        }
        Effect::DebounceSearch { value } => {
            ctx.tasks()
                .debounce("search_input", SEARCH_DEBOUNCE, async move {
                    Action::SearchApply(value)
                });
        }
        Effect::CancelLookup => {
            ctx.tasks().cancel(&TaskKey::new("lookup"));
        }
        Effect::LookupCreature { query, generation } => {
            let source = Arc::clone(&config.source);
            let language = config.language.clone();
            ctx.tasks().spawn(TaskKey::new("lookup"), async move {
                match api::lookup_creature(source.as_ref(), &query, &language).await {
                    Ok(outcome) => Action::LookupDidLoad {
                        generation,
                        outcome,
                    },
                    Err(err) => Action::LookupDidError {
                        generation,
                        error: err.to_string(),
                    },
                }
            });
        }
        Effect::LoadSprite { id, url } => {
            let source = Arc::clone(&config.source);
            let key = format!("sprite_{id}");
            ctx.tasks().spawn(TaskKey::new(key), async move {
                match api::load_sprite(source.as_ref(), &url).await {
                    Ok(sprite) => Action::SpriteDidLoad { id, sprite },
                    Err(error) => Action::SpriteDidError { id, error },
                }
            });
        }
    }
}
