// SPDX-License-Identifier: MPL-2.0

pub mod background;
pub mod controller;
pub mod engine;
pub mod events;
pub mod fade;
pub mod file_watch;
pub mod headless;
pub mod logo;
pub mod overlay;
pub mod placement;
pub mod preview;
pub mod scaler;
pub mod shell;
pub mod signal;
pub mod slideshow;

pub use background::{logo_visible, BackgroundSource};
pub use controller::OverlayController;
pub use engine::{EngineConfig, LogoEngine};
pub use events::{ControllerEvent, Mailbox};
pub use headless::HeadlessShell;
pub use overlay::{BackgroundLogo, OverlayKey, OverlayPhase};
pub use placement::Rect;
pub use preview::{PreviewFrame, PreviewRenderer, PREVIEW_WIDTH};
pub use shell::{Monitor, Shell};
