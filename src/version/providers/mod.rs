//! Concrete local and remote version providers

pub mod cli;
pub mod editor;
pub mod npm;
pub mod open_vsx;

pub use cli::CliVersionProvider;
pub use editor::EditorExtensionProvider;
pub use npm::NpmRegistry;
pub use open_vsx::OpenVsxRegistry;
