use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::ui::{OutputFormat, get_output_format};

fn hidden_in_json(pb: ProgressBar) -> ProgressBar {
    if get_output_format() == OutputFormat::Json {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    pb
}

pub fn create_spinner(message: String) -> ProgressBar {
    let pb = hidden_in_json(ProgressBar::new_spinner());
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
        pb.set_style(style.tick_chars("⠁⠉⠙⠚⠒⠂⠂⠒⠲⠴⠤⠄⠄⠤⠠⠠⠤⠦⠖⠒⠐⠐⠒⠓⠋ "));
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Byte progress bar for a download. Falls back to a spinner when the
/// server does not announce a length.
pub fn create_download_bar(total: Option<u64>, message: String) -> ProgressBar {
    let Some(total) = total else {
        return create_spinner(message);
    };
    let pb = hidden_in_json(ProgressBar::new(total));
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg} [{bar:30}] {bytes}/{total_bytes} ({eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(message);
    pb
}
