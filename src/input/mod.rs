/// Text insertion into the foreground application
pub mod insert;
/// Raw keyboard event monitoring (macOS event tap)
#[cfg(target_os = "macos")]
pub mod monitor;
