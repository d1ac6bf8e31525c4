//! Navigation state machine for the top-level views.
//!
//! Pure state: transitions only replace the current view and never talk
//! to the engine.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::debug;

/// Top-level screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
    /// Landing screen.
    #[default]
    Welcome,
    /// The board.
    Play,
    /// Settings, see [`SettingsPage`].
    Settings,
}

/// Page within the settings screen.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SettingsPage {
    /// Settings overview.
    #[default]
    Home,
    /// Local user profile.
    Profile,
    /// Engine opponents and ratings.
    Ai,
    /// Saving, loading and export.
    Data,
    /// User management.
    Users,
}

/// Combined view a consumer renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Landing screen.
    Welcome,
    /// The board.
    Play,
    /// A settings page.
    Settings(SettingsPage),
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Welcome => write!(f, "welcome"),
            Self::Play => write!(f, "play"),
            Self::Settings(page) => write!(f, "settings.{}", page),
        }
    }
}

/// Current navigation state.
///
/// The settings page is remembered while outside settings but only
/// meaningful when [`mode`](Self::mode) is [`Mode::Settings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Navigation {
    mode: Mode,
    settings_page: SettingsPage,
}

impl Navigation {
    /// Starts on the welcome screen.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current top-level screen.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Last selected settings page.
    pub fn settings_page(&self) -> SettingsPage {
        self.settings_page
    }

    /// Combined view.
    pub fn view(&self) -> View {
        match self.mode {
            Mode::Welcome => View::Welcome,
            Mode::Play => View::Play,
            Mode::Settings => View::Settings(self.settings_page),
        }
    }

    fn replace(&mut self, mode: Mode, settings_page: SettingsPage) {
        let from = self.view();
        self.mode = mode;
        self.settings_page = settings_page;
        debug!(%from, to = %self.view(), "Navigation transition");
    }

    /// Goes to the welcome screen.
    pub fn go_to_welcome(&mut self) {
        self.replace(Mode::Welcome, self.settings_page);
    }

    /// Goes to the board.
    pub fn go_to_play(&mut self) {
        self.replace(Mode::Play, self.settings_page);
    }

    /// Opens settings on the overview page.
    pub fn go_to_settings(&mut self) {
        self.replace(Mode::Settings, SettingsPage::Home);
    }

    /// Jumps straight to a settings page.
    pub fn go_to_settings_page(&mut self, page: SettingsPage) {
        self.replace(Mode::Settings, page);
    }

    /// Steps back one level.
    ///
    /// A settings sub-page returns to the overview; the overview and the
    /// board return to the welcome screen, which has nowhere further back.
    pub fn go_back(&mut self) {
        match self.view() {
            View::Settings(page) if page != SettingsPage::Home => {
                self.replace(Mode::Settings, SettingsPage::Home)
            }
            View::Settings(_) | View::Play => self.replace(Mode::Welcome, self.settings_page),
            View::Welcome => debug!("Already at the welcome screen"),
        }
    }
}
