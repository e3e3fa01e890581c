use macroquad::prelude::*;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod extract;
mod fetch;
mod input;
mod installer;
mod lifecycle;
mod profiles;
mod types;
mod ui;
mod utils;

use config::Config;
use error::{Result, SetupError};
use extract::ZipExtractor;
use fetch::HttpFetcher;
use input::{Button, GamepadDevice, Input, Trigger};
use installer::InstallRun;
use lifecycle::{Lifecycle, Platform, WindowPlatform};
use profiles::{FeatureSelection, InstallProfile, ProfileTable};
use types::Screen;
use ui::install_screen::InstallScreen;
use ui::menu::{Menu, MenuAction};
use ui::Console;
use utils::parse_resolution;

const FEATURE_MENU_FOOTER: &str = "(A) Select (+) Start Download";
const DONE_MESSAGE: &str = "Done, press HOME to exit";

fn window_conf() -> Conf {
    let config = Config::load();
    let (window_width, window_height) = parse_resolution(&config.resolution).unwrap_or((854, 480));

    Conf {
        window_title: "Homebrew Setup".to_owned(),
        window_resizable: false,
        window_width,
        window_height,
        high_dpi: false,
        fullscreen: config.fullscreen,

        ..Default::default()
    }
}

fn init_logging(config: &Config) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("[Warn] Logging disabled: {}", e);
    }
}

/// Loads the profile table and makes sure there is somewhere to install to.
fn startup(config: &Config) -> Result<ProfileTable> {
    let table = ProfileTable::load(config)?;
    if !config.storage_root.is_dir() {
        return Err(SetupError::StorageMissing {
            path: config.storage_root.clone(),
        });
    }
    tracing::info!(
        "Installing onto {} with {} profiles",
        config.storage_root.display(),
        table.profiles().len()
    );
    Ok(table)
}

fn main_menu(table: &ProfileTable) -> Screen {
    let titles = table.profiles().iter().map(|p| p.title.clone()).collect();
    Screen::MainMenu(Menu::list(titles))
}

fn start_install(
    table: &ProfileTable,
    profile: &InstallProfile,
    selection: &FeatureSelection,
    config: &Config,
    console: &mut Console,
) -> Screen {
    let plan = table.plan(profile, selection, &config.storage_root, &config.cert_dir);
    let run = InstallRun::new(
        plan,
        HttpFetcher::from_config(config),
        ZipExtractor::new(&config.storage_root),
    );
    console.header();
    Screen::Installing(InstallScreen::new(run))
}

/// Profiles with options get the checklist first; the rest start right away.
fn open_profile(table: &ProfileTable, profile: &InstallProfile, config: &Config, console: &mut Console) -> Screen {
    if profile.features.is_empty() {
        return start_install(table, profile, &FeatureSelection::default(), config, console);
    }
    Screen::FeatureSelect {
        profile: profile.id.clone(),
        menu: Menu::checklist(table.feature_labels(profile)),
        selection: FeatureSelection::default(),
    }
}

fn enter_done(console: &mut Console) -> Screen {
    console.print("");
    console.print(DONE_MESSAGE);
    Screen::Done
}

fn fail_to_done(console: &mut Console, err: &SetupError) -> Screen {
    tracing::error!("{}", err);
    console.header();
    console.print(err.to_string());
    enter_done(console)
}

/// The main menu, or the configured profile when `auto_profile` is set.
fn first_screen(table: &ProfileTable, config: &Config, console: &mut Console) -> Screen {
    let Some(id) = &config.auto_profile else {
        return main_menu(table);
    };
    match table.get(id) {
        Some(profile) => {
            tracing::info!("Running profile '{}' without the menu", id);
            open_profile(table, profile, config, console)
        }
        None => fail_to_done(console, &SetupError::profiles(format!("unknown auto_profile '{}'", id))),
    }
}

/// A pending exit only ends the loop once no install run is in progress.
fn keep_running<P: Platform>(lifecycle: &mut Lifecycle<P>, busy: bool) -> bool {
    lifecycle.poll() && (busy || !lifecycle.exit_requested())
}

fn update(screen: Screen, table: &ProfileTable, input: &Input, config: &Config, console: &mut Console) -> Screen {
    match screen {
        Screen::MainMenu(mut menu) => {
            let action = menu.handle(input);
            console.header();
            for line in menu.lines(|_| false) {
                console.print(line);
            }
            match action {
                MenuAction::Selected(index) => match table.profiles().get(index) {
                    Some(profile) => {
                        tracing::info!("Selected profile '{}'", profile.id);
                        open_profile(table, profile, config, console)
                    }
                    None => Screen::MainMenu(menu),
                },
                _ => Screen::MainMenu(menu),
            }
        }
        Screen::FeatureSelect {
            profile,
            mut menu,
            mut selection,
        } => {
            let Some(install_profile) = table.get(&profile) else {
                return fail_to_done(console, &SetupError::profiles(format!("unknown profile '{}'", profile)));
            };

            match menu.handle(input) {
                MenuAction::Toggled(index) => {
                    if let Some(key) = install_profile.features.get(index) {
                        selection.toggle(key);
                    }
                }
                MenuAction::Confirmed => {
                    return start_install(table, install_profile, &selection, config, console);
                }
                _ => {}
            }

            console.header();
            let keys = &install_profile.features;
            for line in menu.lines(|i| keys.get(i).is_some_and(|key| selection.is_enabled(key))) {
                console.print(line);
            }
            console.print("");
            console.print(FEATURE_MENU_FOOTER);
            Screen::FeatureSelect { profile, menu, selection }
        }
        Screen::Installing(mut install) => {
            if install.update(console) {
                enter_done(console)
            } else {
                Screen::Installing(install)
            }
        }
        Screen::Done => Screen::Done,
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    let config = Config::load();
    init_logging(&config);

    // window close goes through the lifecycle like HOME does
    prevent_quit();
    let mut lifecycle = Lifecycle::new(WindowPlatform::new());
    let exit_signal = lifecycle.exit_signal();
    let ctrlc_signal = exit_signal.clone();
    if let Err(e) = ctrlc::set_handler(move || ctrlc_signal.request_exit()) {
        tracing::warn!("Could not install Ctrl-C handler: {}", e);
    }

    let mut input = Input::new(Box::new(GamepadDevice::new()));
    let mut console = Console::new(config.console_lines);

    let (table, mut screen) = match startup(&config) {
        Ok(table) => {
            let screen = first_screen(&table, &config, &mut console);
            (Some(table), screen)
        }
        Err(e) => (None, fail_to_done(&mut console, &e)),
    };

    loop {
        // blocking calls cannot be interrupted, so any exit waits for the run to end
        let busy = matches!(screen, Screen::Installing(_));
        if !keep_running(&mut lifecycle, busy) {
            break;
        }
        input.refresh();

        if !busy && input.get(Trigger::Pressed, Button::Home) {
            tracing::info!("HOME pressed");
            exit_signal.request_exit();
        }

        if let Some(table) = &table {
            screen = update(screen, table, &input, &config, &mut console);
        }

        console.draw(&config);
        next_frame().await;
    }

    lifecycle.shutdown();
}
