use crate::extract::ZipExtractor;
use crate::fetch::HttpFetcher;
use crate::profiles::FeatureSelection;
use crate::ui::install_screen::InstallScreen;
use crate::ui::menu::Menu;

// ===================================
// ENUMS
// ===================================

pub enum Screen {
    /// Pick a profile
    MainMenu(Menu),
    /// Tick the optional packages of one profile
    FeatureSelect {
        profile: String,
        menu: Menu,
        selection: FeatureSelection,
    },
    Installing(InstallScreen<HttpFetcher, ZipExtractor>),
    /// Terminal; waits for HOME
    Done,
}
